//! Request and response types for the HTTP API

pub mod error;
pub mod generation;

pub use error::{ApiError, ApiErrorResponse};
pub use generation::{DesignBody, FacesResponse, GenerateResponse};
