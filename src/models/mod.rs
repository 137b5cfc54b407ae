//! Data models for the Socios Club membership backend.
//!
//! These models match the frontend contract exactly for seamless interoperability.

mod import;
mod member;
mod status;
mod sync;

pub use import::*;
pub use member::*;
pub use status::*;
pub use sync::*;
