//! # Middleware
//!
//! Tower layers shared by every API route.

pub mod metrics;
pub mod tracing_layer;
