//! Infrastructure services

mod generation_service;

pub use generation_service::{
    Delivery, FaceDescriptions, FacesOutcome, GenerationOutcome, GenerationService,
    REFERENCE_FALLBACK_MESSAGE,
};
