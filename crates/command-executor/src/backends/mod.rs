//! Backend implementations for different execution contexts
//!
//! Only local execution ships with this crate. Users can plug in their own
//! backends by implementing the [`Backend`](crate::backend::Backend) trait,
//! which is how tests substitute a scripted host.

pub mod local;
pub use local::LocalBackend;
