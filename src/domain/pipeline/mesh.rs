//! Triangle mesh and metallic material

use std::str::FromStr;

use crate::domain::DomainError;

/// PBR metallic-roughness material applied to a whole mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
}

/// Metal finishes offered to customers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Finish {
    #[default]
    Gold,
    Silver,
    Bronze,
    Copper,
}

impl Finish {
    /// Best-effort match of a free-text finish ("antique silver", "brass")
    pub fn from_hint(hint: Option<&str>) -> Self {
        let Some(hint) = hint else {
            return Self::default();
        };
        let hint = hint.to_ascii_lowercase();

        if hint.contains("silver") || hint.contains("nickel") || hint.contains("chrome") {
            Self::Silver
        } else if hint.contains("bronze") || hint.contains("brass") {
            Self::Bronze
        } else if hint.contains("copper") {
            Self::Copper
        } else {
            Self::Gold
        }
    }

    pub fn material(&self) -> Material {
        let (name, base_color, roughness) = match self {
            Self::Gold => ("gold", [1.0, 0.766, 0.336, 1.0], 0.3),
            Self::Silver => ("silver", [0.972, 0.960, 0.915, 1.0], 0.25),
            Self::Bronze => ("bronze", [0.804, 0.498, 0.196, 1.0], 0.4),
            Self::Copper => ("copper", [0.955, 0.637, 0.538, 1.0], 0.35),
        };

        Material {
            name: name.to_string(),
            base_color,
            metallic: 1.0,
            roughness,
        }
    }
}

impl FromStr for Finish {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gold" => Ok(Self::Gold),
            "silver" => Ok(Self::Silver),
            "bronze" => Ok(Self::Bronze),
            "copper" => Ok(Self::Copper),
            other => Err(DomainError::validation(format!("Unknown finish '{}'", other))),
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Finish::default().material()
    }
}

/// Flat-shaded triangle mesh; `indices` reference `positions`/`normals`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub material: Material,
}

impl Mesh {
    pub fn new(material: Material) -> Self {
        Self {
            material,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append one triangle with its face normal; degenerate triangles use `fallback`
    pub fn push_triangle(&mut self, a: [f32; 3], b: [f32; 3], c: [f32; 3], fallback: [f32; 3]) {
        let normal = normalize(cross(sub(b, a), sub(c, a))).unwrap_or(fallback);
        let base = self.positions.len() as u32;

        self.positions.extend_from_slice(&[a, b, c]);
        self.normals.extend_from_slice(&[normal, normal, normal]);
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Axis-aligned bounds as (min, max); `None` for an empty mesh
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(mut min, mut max), p| {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
            (min, max)
        }))
    }

    /// Translate so the bounding-box center sits at the origin
    pub fn center(&mut self) {
        let Some((min, max)) = self.bounds() else {
            return;
        };
        let offset = [
            (min[0] + max[0]) * 0.5,
            (min[1] + max[1]) * 0.5,
            (min[2] + max[2]) * 0.5,
        ];

        for p in &mut self.positions {
            *p = sub(*p, offset);
        }
    }
}

pub(crate) fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub(crate) fn normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    (len > 1e-12).then(|| [v[0] / len, v[1] / len, v[2] / len])
}
