//! Infrastructure layer - External service implementations

pub mod artifacts;
pub mod generation;
pub mod logging;
pub mod services;
