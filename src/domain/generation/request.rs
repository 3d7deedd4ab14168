use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use crate::domain::DomainError;

/// What kind of product the design is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductKind {
    #[default]
    Coin,
    Patch,
}

impl FromStr for ProductKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "coin" => Ok(Self::Coin),
            "patch" => Ok(Self::Patch),
            other => Err(DomainError::validation(format!(
                "Unsupported product '{}', expected 'coin' or 'patch'",
                other
            ))),
        }
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coin => write!(f, "coin"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// Which side of a two-sided object is being designed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Face {
    Front,
    Back,
}

impl Face {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Back => "back",
        }
    }
}

/// Binary image uploaded alongside a description
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub data: Bytes,
    pub media_type: String,
    pub filename: Option<String>,
}

impl ReferenceImage {
    pub fn new(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// `data:` URL form used by vision-capable chat models
    pub fn to_data_url(&self) -> String {
        use base64::Engine as _;
        use base64::engine::general_purpose::STANDARD as BASE64;

        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.data))
    }
}

/// One client request for a generated design
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub description: String,
    pub shape: Option<String>,
    pub finish: Option<String>,
    pub engraving: Option<String>,
    pub style: Option<String>,
    pub product: ProductKind,
    pub face: Option<Face>,
    pub images: Vec<ReferenceImage>,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    pub fn with_finish(mut self, finish: impl Into<String>) -> Self {
        self.finish = Some(finish.into());
        self
    }

    pub fn with_engraving(mut self, engraving: impl Into<String>) -> Self {
        self.engraving = Some(engraving.into());
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_product(mut self, product: ProductKind) -> Self {
        self.product = product;
        self
    }

    pub fn with_face(mut self, face: Face) -> Self {
        self.face = Some(face);
        self
    }

    pub fn with_image(mut self, image: ReferenceImage) -> Self {
        self.images.push(image);
        self
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }

    /// Reject requests the generation logic must never see
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("Description is required"));
        }

        if let Some(image) = self
            .images
            .iter()
            .find(|image| !image.media_type.starts_with("image/"))
        {
            return Err(DomainError::validation(format!(
                "Reference file '{}' is not an image ({})",
                image.filename.as_deref().unwrap_or("upload"),
                image.media_type
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_description_is_rejected() {
        let request = GenerationRequest::new("   ").with_shape("round");
        let err = request.validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
        assert!(err.to_string().contains("Description is required"));
    }

    #[test]
    fn test_non_image_upload_is_rejected() {
        let request = GenerationRequest::new("eagle with shield")
            .with_image(ReferenceImage::new(vec![1, 2, 3], "text/plain").with_filename("notes.txt"));
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_valid_request() {
        let request = GenerationRequest::new("eagle with shield")
            .with_finish("silver")
            .with_image(ReferenceImage::new(vec![0u8; 4], "image/png"));
        assert!(request.validate().is_ok());
        assert!(request.has_images());
    }

    #[test]
    fn test_product_kind_parsing() {
        assert_eq!("Patch".parse::<ProductKind>().unwrap(), ProductKind::Patch);
        assert_eq!("".parse::<ProductKind>().unwrap(), ProductKind::Coin);
        assert!("mug".parse::<ProductKind>().is_err());
    }

    #[test]
    fn test_data_url() {
        let image = ReferenceImage::new(vec![0xff, 0xd8], "image/jpeg");
        assert_eq!(image.to_data_url(), "data:image/jpeg;base64,/9g=");
    }
}
