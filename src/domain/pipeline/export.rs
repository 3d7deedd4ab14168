//! Binary glTF 2.0 (GLB) export

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use super::error::{PipelineError, Result};
use super::mesh::{Material, Mesh};

pub const GLB_MEDIA_TYPE: &str = "model/gltf-binary";

const GLB_MAGIC: u32 = 0x4654_6C67;
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_INT: u32 = 5125;
const TRIANGLES: u32 = 4;

const LIGHTS_EXTENSION: &str = "KHR_lights_punctual";

/// Serialized model ready to hand back to a caller
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub bytes: Vec<u8>,
    pub vertex_count: usize,
    pub triangle_count: usize,
}

impl ModelArtifact {
    pub fn media_type(&self) -> &'static str {
        GLB_MEDIA_TYPE
    }

    pub fn is_empty_geometry(&self) -> bool {
        self.triangle_count == 0
    }
}

/// Writes a single-mesh scene as GLB
#[derive(Debug, Clone, Default)]
pub struct GlbExporter {
    /// Adds a directional light node for previews
    pub preview_light: bool,
}

impl GlbExporter {
    pub fn export(&self, mesh: &Mesh, name: &str) -> Result<ModelArtifact> {
        validate_material(&mesh.material)?;

        let mut binary = BytesMut::new();
        let mut document = Document::new(name);

        if !mesh.is_empty() {
            document.add_mesh(mesh, name, &mut binary)?;
        }
        if self.preview_light {
            document.add_preview_light();
        }

        let json = serde_json::to_vec(&document)
            .map_err(|e| PipelineError::Export(format!("failed to serialize glTF JSON: {}", e)))?;
        let bytes = write_glb(json, binary.freeze().to_vec())?;

        debug!(
            bytes = bytes.len(),
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "Model exported"
        );

        Ok(ModelArtifact {
            bytes,
            vertex_count: mesh.vertex_count(),
            triangle_count: mesh.triangle_count(),
        })
    }
}

fn validate_material(material: &Material) -> Result<()> {
    let in_unit_range = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);

    if !material.base_color.iter().all(|&c| in_unit_range(c)) {
        return Err(PipelineError::Export(format!(
            "unsupported base color {:?} on material '{}'",
            material.base_color, material.name
        )));
    }
    if !in_unit_range(material.metallic) || !in_unit_range(material.roughness) {
        return Err(PipelineError::Export(format!(
            "metallic/roughness out of range on material '{}'",
            material.name
        )));
    }
    Ok(())
}

fn write_glb(mut json: Vec<u8>, mut binary: Vec<u8>) -> Result<Vec<u8>> {
    pad_to_four(&mut json, b' ');
    pad_to_four(&mut binary, 0);

    let bin_chunk = if binary.is_empty() { 0 } else { 8 + binary.len() };
    let total = 12 + 8 + json.len() + bin_chunk;
    let total = u32::try_from(total)
        .map_err(|_| PipelineError::Export(format!("model too large: {} bytes", total)))?;

    let mut out = BytesMut::with_capacity(total as usize);
    out.put_u32_le(GLB_MAGIC);
    out.put_u32_le(GLB_VERSION);
    out.put_u32_le(total);

    out.put_u32_le(json.len() as u32);
    out.put_u32_le(CHUNK_JSON);
    out.put_slice(&json);

    if !binary.is_empty() {
        out.put_u32_le(binary.len() as u32);
        out.put_u32_le(CHUNK_BIN);
        out.put_slice(&binary);
    }

    Ok(out.to_vec())
}

fn pad_to_four(data: &mut Vec<u8>, fill: u8) {
    while data.len() % 4 != 0 {
        data.push(fill);
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    asset: Asset,
    scene: usize,
    scenes: Vec<Scene>,
    nodes: Vec<Node>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    meshes: Vec<GltfMesh>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    materials: Vec<GltfMaterial>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<Buffer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffer_views: Vec<BufferView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    accessors: Vec<Accessor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extensions_used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Asset {
    version: &'static str,
    generator: String,
}

#[derive(Debug, Serialize)]
struct Scene {
    name: String,
    nodes: Vec<usize>,
}

#[derive(Debug, Serialize)]
struct Node {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mesh: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rotation: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<Value>,
}

#[derive(Debug, Serialize)]
struct GltfMesh {
    name: String,
    primitives: Vec<Primitive>,
}

#[derive(Debug, Serialize)]
struct Primitive {
    attributes: Attributes,
    indices: usize,
    material: usize,
    mode: u32,
}

#[derive(Debug, Serialize)]
struct Attributes {
    #[serde(rename = "POSITION")]
    position: usize,
    #[serde(rename = "NORMAL")]
    normal: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GltfMaterial {
    name: String,
    pbr_metallic_roughness: PbrMetallicRoughness,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PbrMetallicRoughness {
    base_color_factor: [f32; 4],
    metallic_factor: f32,
    roughness_factor: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Buffer {
    byte_length: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BufferView {
    buffer: usize,
    byte_offset: usize,
    byte_length: usize,
    target: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Accessor {
    buffer_view: usize,
    component_type: u32,
    count: usize,
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<[f32; 3]>,
}

impl Document {
    fn new(name: &str) -> Self {
        Self {
            asset: Asset {
                version: "2.0",
                generator: format!("coinforge {}", env!("CARGO_PKG_VERSION")),
            },
            scene: 0,
            scenes: vec![Scene {
                name: name.to_string(),
                nodes: vec![0],
            }],
            nodes: vec![Node {
                name: name.to_string(),
                mesh: None,
                rotation: None,
                extensions: None,
            }],
            meshes: Vec::new(),
            materials: Vec::new(),
            buffers: Vec::new(),
            buffer_views: Vec::new(),
            accessors: Vec::new(),
            extensions_used: Vec::new(),
            extensions: None,
        }
    }

    fn add_mesh(&mut self, mesh: &Mesh, name: &str, binary: &mut BytesMut) -> Result<()> {
        let vertex_count = mesh.positions.len();
        if mesh.normals.len() != vertex_count {
            return Err(PipelineError::Export(format!(
                "normal count {} does not match vertex count {}",
                mesh.normals.len(),
                vertex_count
            )));
        }
        if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(PipelineError::Export(format!("index {} out of range", bad)));
        }

        let (min, max) = mesh
            .bounds()
            .ok_or_else(|| PipelineError::Export("mesh has indices but no vertices".to_string()))?;

        let positions = self.push_view(binary, ARRAY_BUFFER, |buf| {
            for p in &mesh.positions {
                p.iter().for_each(|&v| buf.put_f32_le(v));
            }
        });
        let normals = self.push_view(binary, ARRAY_BUFFER, |buf| {
            for n in &mesh.normals {
                n.iter().for_each(|&v| buf.put_f32_le(v));
            }
        });
        let indices = self.push_view(binary, ELEMENT_ARRAY_BUFFER, |buf| {
            mesh.indices.iter().for_each(|&i| buf.put_u32_le(i));
        });

        self.accessors.push(Accessor {
            buffer_view: positions,
            component_type: FLOAT,
            count: vertex_count,
            kind: "VEC3",
            min: Some(min),
            max: Some(max),
        });
        self.accessors.push(Accessor {
            buffer_view: normals,
            component_type: FLOAT,
            count: vertex_count,
            kind: "VEC3",
            min: None,
            max: None,
        });
        self.accessors.push(Accessor {
            buffer_view: indices,
            component_type: UNSIGNED_INT,
            count: mesh.indices.len(),
            kind: "SCALAR",
            min: None,
            max: None,
        });

        self.materials.push(GltfMaterial {
            name: mesh.material.name.clone(),
            pbr_metallic_roughness: PbrMetallicRoughness {
                base_color_factor: mesh.material.base_color,
                metallic_factor: mesh.material.metallic,
                roughness_factor: mesh.material.roughness,
            },
        });
        self.meshes.push(GltfMesh {
            name: name.to_string(),
            primitives: vec![Primitive {
                attributes: Attributes {
                    position: 0,
                    normal: 1,
                },
                indices: 2,
                material: 0,
                mode: TRIANGLES,
            }],
        });
        self.nodes[0].mesh = Some(0);
        self.buffers.push(Buffer {
            byte_length: binary.len(),
        });

        Ok(())
    }

    fn push_view(&mut self, binary: &mut BytesMut, target: u32, write: impl FnOnce(&mut BytesMut)) -> usize {
        let byte_offset = binary.len();
        write(binary);
        self.buffer_views.push(BufferView {
            buffer: 0,
            byte_offset,
            byte_length: binary.len() - byte_offset,
            target,
        });
        self.buffer_views.len() - 1
    }

    fn add_preview_light(&mut self) {
        self.extensions_used.push(LIGHTS_EXTENSION.to_string());
        self.extensions = Some(json!({
            LIGHTS_EXTENSION: {
                "lights": [{ "type": "directional", "color": [1.0, 1.0, 1.0], "intensity": 3.0 }]
            }
        }));

        // Tilted 45 degrees about X so the light grazes the relief
        let half = std::f32::consts::FRAC_PI_8;
        self.nodes.push(Node {
            name: "preview-light".to_string(),
            mesh: None,
            rotation: Some([-half.sin(), 0.0, 0.0, half.cos()]),
            extensions: Some(json!({ LIGHTS_EXTENSION: { "light": 0 } })),
        });
        let index = self.nodes.len() - 1;
        self.scenes[0].nodes.push(index);
    }
}
