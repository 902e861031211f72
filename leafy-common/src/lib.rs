//! # Leafy Common Library
//!
//! Shared code for the leaf classifier client:
//! - Backend wire types (request/response bodies)
//! - Event types (LeafyEvent enum) and the EventBus
//! - Configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
