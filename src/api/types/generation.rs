//! Success bodies for the generation endpoints

use serde::{Deserialize, Serialize};

use crate::infrastructure::services::{Delivery, FacesOutcome, GenerationOutcome};

/// One generated design; absent fields are omitted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glb_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glb_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images_used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_model: Option<bool>,
}

impl From<GenerationOutcome> for DesignBody {
    fn from(outcome: GenerationOutcome) -> Self {
        let (image_url, image_base64) = split(Some(outcome.image));
        let has_model = outcome.model.is_some();
        let (glb_url, glb_base64) = split(outcome.model);

        Self {
            image_url,
            image_base64,
            glb_url,
            glb_base64,
            shape: outcome.shape,
            images_used: outcome.images_used,
            message: outcome.message,
            empty_model: has_model.then_some(outcome.empty_model),
        }
    }
}

fn split(delivery: Option<Delivery>) -> (Option<String>, Option<String>) {
    match delivery {
        Some(Delivery::Url(url)) => (Some(url), None),
        Some(Delivery::Base64(payload)) => (None, Some(payload)),
        None => (None, None),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(flatten)]
    pub design: DesignBody,
}

impl From<GenerationOutcome> for GenerateResponse {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            success: true,
            design: outcome.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacesResponse {
    pub success: bool,
    pub front: DesignBody,
    pub back: DesignBody,
}

impl From<FacesOutcome> for FacesResponse {
    fn from(outcome: FacesOutcome) -> Self {
        Self {
            success: true,
            front: outcome.front.into(),
            back: outcome.back.into(),
        }
    }
}
