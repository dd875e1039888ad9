//! Typed access to the training platform's admin resources.

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiError};
