//! Fixed prompt templates for coin and patch designs

use std::collections::HashMap;

use super::template::{PromptTemplate, TemplateError};
use crate::domain::DomainError;
use crate::domain::generation::{Face, GenerationRequest, ProductKind};

const COIN_PHOTO_TEMPLATE: &str = "\
Highly realistic custom coin product photo.
Shape: ${var:shape:custom}
Material: ${var:finish:gold}
Engraving: ${var:engraving:none}
Design: ${var:description}
Style: ${var:style:premium commemorative coin}
Lighting: studio lighting
Background: dark neutral
View: centered, ${var:view:front-facing}";

const PATCH_PHOTO_TEMPLATE: &str = "\
Highly realistic custom embroidered patch product photo.
Shape: ${var:shape:round}
Thread colors: ${var:finish:full color}
Border text: ${var:engraving:none}
Design: ${var:description}
Style: ${var:style:premium merrowed-edge patch}
Lighting: soft studio lighting
Background: neutral
View: centered, ${var:view:front-facing}";

const RELIEF_TEMPLATE: &str = "\
Flat black silhouette stencil for a ${var:shape:round} ${var:product} relief.
Design: ${var:description}
Lettering: ${var:engraving:none}
Style: ${var:style:bold simplified shapes}
Pure black shapes on a pure white background, no shading, no gradients, no texture, \
no border frame, ${var:view:front} side, centered.";

const REFERENCE_SUFFIX: &str = "
Reference notes from the customer's images: ${var:reference}";

/// What the generated image will be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptStyle {
    /// Photo-realistic product render returned to the customer
    ProductPhoto,
    /// Two-level artwork that traces cleanly into a 3D relief
    ReliefStencil,
}

/// Composes generation prompts from request fields
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    /// Description-only prompt
    pub fn build(&self, request: &GenerationRequest, style: PromptStyle) -> Result<String, DomainError> {
        let template = PromptTemplate::parse(template_for(request.product, style));
        template
            .render(&slot_values(request, style))
            .map_err(into_validation)
    }

    /// Prompt enriched with notes derived from reference images
    pub fn build_with_reference(
        &self,
        request: &GenerationRequest,
        style: PromptStyle,
        reference_notes: &str,
    ) -> Result<String, DomainError> {
        let content = format!("{}{}", template_for(request.product, style), REFERENCE_SUFFIX);
        let mut values = slot_values(request, style);
        values.insert("reference".to_string(), reference_notes.to_string());

        PromptTemplate::parse(content)
            .render(&values)
            .map_err(into_validation)
    }
}

fn template_for(product: ProductKind, style: PromptStyle) -> &'static str {
    match (style, product) {
        (PromptStyle::ReliefStencil, _) => RELIEF_TEMPLATE,
        (PromptStyle::ProductPhoto, ProductKind::Coin) => COIN_PHOTO_TEMPLATE,
        (PromptStyle::ProductPhoto, ProductKind::Patch) => PATCH_PHOTO_TEMPLATE,
    }
}

fn slot_values(request: &GenerationRequest, style: PromptStyle) -> HashMap<String, String> {
    let mut values = HashMap::new();
    values.insert("description".to_string(), request.description.clone());
    values.insert("product".to_string(), request.product.to_string());

    let optional = [
        ("shape", &request.shape),
        ("finish", &request.finish),
        ("engraving", &request.engraving),
        ("style", &request.style),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            values.insert(name.to_string(), value.clone());
        }
    }

    if let Some(face) = request.face {
        let view = match (style, face) {
            (PromptStyle::ReliefStencil, face) => face.as_str().to_string(),
            (PromptStyle::ProductPhoto, Face::Front) => "front-facing (obverse)".to_string(),
            (PromptStyle::ProductPhoto, Face::Back) => "back side (reverse)".to_string(),
        };
        values.insert("view".to_string(), view);
    }

    values
}

fn into_validation(err: TemplateError) -> DomainError {
    match err {
        TemplateError::MissingVariable { name } if name == "description" => {
            DomainError::validation("Description is required")
        }
        other => DomainError::validation(other.to_string()),
    }
}
