//! Backend HTTP contract
//!
//! Request and response bodies exchanged with the classifier backend.

pub mod types;

pub use types::*;
