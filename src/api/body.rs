//! Request body decoding for the generation endpoints
//!
//! Accepts `multipart/form-data` (text fields plus file parts) or a JSON
//! object. Both decode into the same [`ParsedBody`].

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart},
    http::{Request, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;
use tower::{Layer, ServiceExt, service_fn};

use super::types::ApiError;
use crate::domain::{GenerationRequest, ProductKind, ReferenceImage};
use crate::infrastructure::services::FaceDescriptions;

const DEFAULT_IMAGE_TYPE: &str = "image/png";

/// One uploaded file
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub filename: Option<String>,
    pub media_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedBody {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

impl ParsedBody {
    /// Non-blank text field, trying each alias in order
    pub fn field(&self, names: &[&str]) -> Option<String> {
        names
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .map(|value| value.trim())
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// Decode a raw body according to its content type
pub async fn parse_request_body(bytes: Bytes, content_type: Option<&str>) -> Result<ParsedBody, ApiError> {
    let essence = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase());

    match essence.as_deref() {
        Some("multipart/form-data") => parse_multipart(bytes, content_type.unwrap_or_default()).await,
        Some("application/json") => parse_json(&bytes),
        _ if bytes.iter().all(u8::is_ascii_whitespace) => Ok(ParsedBody::default()),
        None => parse_json(&bytes),
        Some(other) => Err(ApiError::bad_request(format!("Unsupported content type '{}'", other))),
    }
}

async fn parse_multipart(bytes: Bytes, content_type: &str) -> Result<ParsedBody, ApiError> {
    let limit = bytes.len();
    let request = Request::builder()
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(bytes))
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart request: {}", e)))?;

    // The body is already bounded by the router; carry that bound over so the
    // extractor does not fall back to its built-in default.
    let extract = service_fn(|request: Request<Body>| async move {
        Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart request: {}", e)))
    });
    let mut multipart = DefaultBodyLimit::max(limit).layer(extract).oneshot(request).await?;

    let mut parsed = ParsedBody::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(|s| s.to_string());
        let declared_type = field.content_type().map(|s| s.to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read field '{}': {}", name, e)))?;

        if filename.is_some() {
            if data.is_empty() {
                continue;
            }
            let media_type = declared_type
                .filter(|t| t != "application/octet-stream")
                .unwrap_or_else(|| guess_media_type(filename.as_deref(), &data));
            parsed.files.push(UploadedFile {
                field: name,
                filename,
                media_type,
                data,
            });
        } else {
            parsed
                .fields
                .insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    Ok(parsed)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonImage {
    data: String,
    #[serde(alias = "media_type", alias = "type")]
    media_type: Option<String>,
    #[serde(alias = "name")]
    filename: Option<String>,
}

fn parse_json(bytes: &[u8]) -> Result<ParsedBody, ApiError> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))?;
    let Value::Object(object) = value else {
        return Err(ApiError::bad_request("JSON body must be an object"));
    };

    let mut parsed = ParsedBody::default();

    for (key, value) in object {
        if key == "images" || key == "image" {
            match value {
                Value::Array(items) => {
                    for item in items {
                        parsed.files.push(json_image(&key, item)?);
                    }
                }
                Value::Null => {}
                item => parsed.files.push(json_image(&key, item)?),
            }
            continue;
        }

        let text = match value {
            Value::String(text) => text,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        parsed.fields.insert(key, text);
    }

    Ok(parsed)
}

fn json_image(field: &str, value: Value) -> Result<UploadedFile, ApiError> {
    let image = match value {
        Value::String(data) => JsonImage {
            data,
            media_type: None,
            filename: None,
        },
        other => serde_json::from_value(other)
            .map_err(|e| ApiError::bad_request(format!("Invalid image entry: {}", e)))?,
    };

    let (data_url_type, payload) = split_data_url(&image.data);
    let data = BASE64
        .decode(payload.trim())
        .map(Bytes::from)
        .map_err(|e| ApiError::bad_request(format!("Image data is not valid base64: {}", e)))?;

    let media_type = image
        .media_type
        .or(data_url_type)
        .unwrap_or_else(|| guess_media_type(image.filename.as_deref(), &data));

    Ok(UploadedFile {
        field: field.to_string(),
        filename: image.filename,
        media_type,
        data,
    })
}

/// `data:image/png;base64,AAAA` → (Some("image/png"), "AAAA")
fn split_data_url(data: &str) -> (Option<String>, &str) {
    let Some(rest) = data.strip_prefix("data:") else {
        return (None, data);
    };
    match rest.split_once(',') {
        Some((meta, payload)) => {
            let media_type = meta.split(';').next().filter(|t| !t.is_empty());
            (media_type.map(str::to_string), payload)
        }
        None => (None, data),
    }
}

fn guess_media_type(filename: Option<&str>, data: &[u8]) -> String {
    if let Some(guess) = filename.and_then(|name| mime_guess::from_path(name).first_raw()) {
        return guess.to_string();
    }
    image::guess_format(data)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| DEFAULT_IMAGE_TYPE.to_string())
}

/// Map decoded fields and files onto a generation request
pub fn into_generation_request(body: ParsedBody) -> Result<(GenerationRequest, FaceDescriptions), ApiError> {
    let product = match body.field(&["product", "type"]) {
        Some(value) => value.parse::<ProductKind>()?,
        None => ProductKind::default(),
    };

    let request = GenerationRequest {
        description: body.field(&["description", "prompt"]).unwrap_or_default(),
        shape: body.field(&["shape"]),
        finish: body.field(&["finish", "material"]),
        engraving: body.field(&["engraving", "text"]),
        style: body.field(&["style"]),
        product,
        face: None,
        images: body
            .files
            .into_iter()
            .map(|file| {
                let image = ReferenceImage::new(file.data, file.media_type);
                match file.filename {
                    Some(name) => image.with_filename(name),
                    None => image,
                }
            })
            .collect(),
    };

    let faces = FaceDescriptions {
        front: body.fields.get("frontDescription").or(body.fields.get("front_description")).cloned(),
        back: body.fields.get("backDescription").or(body.fields.get("back_description")).cloned(),
    };

    Ok((request, faces))
}
