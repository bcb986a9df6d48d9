//! Backend capabilities consumed by the synchronizer
//!
//! The host framework provides remote field reads, named procedure calls and
//! a bound record. They are modelled as traits so the synchronizer never
//! holds ambient state; [`InMemoryBackend`] and [`SharedRecord`] are the
//! in-process implementations used by the simulator and the tests.

mod binding;
pub mod client;
mod error;
mod memory;

pub use binding::{RecordBinding, SharedRecord};
pub use client::{Backend, FieldMap};
pub use error::BackendError;
pub use memory::InMemoryBackend;
