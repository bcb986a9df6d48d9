//! Tolerance-based change detection

/// Smallest weight difference, in kg, that counts as a change
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Decides whether a fetched weight differs materially from the last one
///
/// The scale reports far more often and more noisily than is worth
/// rendering; differences up to the tolerance are treated as noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeDetector {
    tolerance: f64,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_TOLERANCE)
    }
}

impl ChangeDetector {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// True when `|candidate - previous| > tolerance`
    pub fn has_changed(&self, previous: f64, candidate: f64) -> bool {
        (candidate - previous).abs() > self.tolerance
    }
}
