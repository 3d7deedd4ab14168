//! Extrusion of traced outlines into a bevelled solid

use std::f32::consts::FRAC_PI_2;

use geo::orient::{Direction, Orient};
use geo::{Area, Coord, LineString, Polygon, TriangulateEarcut};
use tracing::debug;

use super::error::{PipelineError, Result};
use super::mesh::{Material, Mesh};
use super::trace::{OutlinePath, VectorOutline};

/// Longest allowed miter, as a multiple of the offset distance
const MAX_MITER: f32 = 4.0;

const UP: [f32; 3] = [0.0, 0.0, 1.0];
const DOWN: [f32; 3] = [0.0, 0.0, -1.0];

/// Rounded edge between the caps and the side wall
#[derive(Debug, Clone, PartialEq)]
pub struct BevelParams {
    /// Extent along the extrusion axis, added on both caps
    pub thickness: f32,
    /// Outward offset of the side wall relative to the caps
    pub size: f32,
    pub segments: u32,
}

impl Default for BevelParams {
    fn default() -> Self {
        Self {
            thickness: 0.03,
            size: 0.02,
            segments: 3,
        }
    }
}

/// Sweeps each outline along +Z and merges the solids into one mesh.
///
/// Pixel coordinates are scaled by `unit_scale` and flipped so that image
/// "up" is +Y.
#[derive(Debug, Clone)]
pub struct MeshExtruder {
    pub depth: f32,
    pub unit_scale: f32,
    pub bevel: Option<BevelParams>,
}

impl Default for MeshExtruder {
    fn default() -> Self {
        Self {
            depth: 0.2,
            unit_scale: 0.01,
            bevel: Some(BevelParams::default()),
        }
    }
}

impl MeshExtruder {
    pub fn extrude(&self, outline: &VectorOutline, material: Material) -> Result<Mesh> {
        self.validate()?;

        let layers = self.layers();
        let mut mesh = Mesh::new(material);

        for path in &outline.paths {
            self.extrude_path(path, &layers, &mut mesh);
        }

        mesh.center();

        debug!(
            paths = outline.paths.len(),
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "Outline extruded"
        );

        Ok(mesh)
    }

    fn validate(&self) -> Result<()> {
        if !(self.depth.is_finite() && self.depth > 0.0) {
            return Err(PipelineError::Extrude(format!(
                "depth must be positive, got {}",
                self.depth
            )));
        }
        if !(self.unit_scale.is_finite() && self.unit_scale > 0.0) {
            return Err(PipelineError::Extrude(format!(
                "unit scale must be positive, got {}",
                self.unit_scale
            )));
        }
        if let Some(bevel) = &self.bevel {
            let valid = bevel.thickness.is_finite()
                && bevel.thickness >= 0.0
                && bevel.size.is_finite()
                && bevel.size >= 0.0
                && bevel.segments > 0;
            if !valid {
                return Err(PipelineError::Extrude(format!("invalid bevel {:?}", bevel)));
            }
        }
        Ok(())
    }

    /// Ring layers from back to front as (z, outward offset)
    fn layers(&self) -> Vec<(f32, f32)> {
        let Some(bevel) = &self.bevel else {
            return vec![(0.0, 0.0), (self.depth, 0.0)];
        };

        let segments = bevel.segments;
        let step = |k: u32| k as f32 / segments as f32 * FRAC_PI_2;

        let back = (0..=segments).map(|k| {
            let t = step(k);
            (-bevel.thickness * t.cos(), bevel.size * t.sin())
        });
        let front = (0..=segments).rev().map(|k| {
            let t = step(k);
            (self.depth + bevel.thickness * t.cos(), bevel.size * t.sin())
        });

        back.chain(front).collect()
    }

    fn extrude_path(&self, path: &OutlinePath, layers: &[(f32, f32)], mesh: &mut Mesh) {
        let polygon = Polygon::new(
            self.to_model_ring(&path.exterior),
            path.holes.iter().map(|hole| self.to_model_ring(hole)).collect(),
        )
        .orient(Direction::Default);

        if polygon.unsigned_area() <= f32::EPSILON {
            return;
        }

        let rings = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(open_ring);

        for ring in rings {
            if ring.len() >= 3 {
                push_walls(&ring, layers, mesh);
            }
        }

        self.push_caps(&polygon, layers, mesh);
    }

    fn push_caps(&self, polygon: &Polygon<f32>, layers: &[(f32, f32)], mesh: &mut Mesh) {
        let (Some(&(z_back, _)), Some(&(z_front, _))) = (layers.first(), layers.last()) else {
            return;
        };

        let triangulation = polygon.earcut_triangles_raw();
        let vertex = |index: usize| {
            [
                triangulation.vertices[index * 2],
                triangulation.vertices[index * 2 + 1],
            ]
        };

        for triangle in triangulation.triangle_indices.chunks_exact(3) {
            let (a, mut b, mut c) = (vertex(triangle[0]), vertex(triangle[1]), vertex(triangle[2]));

            let signed = (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0]);
            if signed.abs() <= f32::EPSILON * f32::EPSILON {
                continue;
            }
            if signed < 0.0 {
                std::mem::swap(&mut b, &mut c);
            }

            mesh.push_triangle(lift(a, z_front), lift(b, z_front), lift(c, z_front), UP);
            mesh.push_triangle(lift(a, z_back), lift(c, z_back), lift(b, z_back), DOWN);
        }
    }

    fn to_model_ring(&self, ring: &[[f32; 2]]) -> LineString<f32> {
        ring.iter()
            .map(|&[x, y]| Coord {
                x: x * self.unit_scale,
                y: -y * self.unit_scale,
            })
            .collect::<Vec<_>>()
            .into()
    }
}

/// Side walls between consecutive layers. Rings are oriented so that the
/// right-hand normal of each edge points away from the material.
fn push_walls(ring: &[[f32; 2]], layers: &[(f32, f32)], mesh: &mut Mesh) {
    let offsets = miter_offsets(ring);
    let n = ring.len();

    for pair in layers.windows(2) {
        let (z0, o0) = pair[0];
        let (z1, o1) = pair[1];

        for i in 0..n {
            let j = (i + 1) % n;
            let edge = edge_normal(ring[i], ring[j]);
            let fallback = [edge[0], edge[1], 0.0];

            let a0 = lift(offset(ring[i], offsets[i], o0), z0);
            let a1 = lift(offset(ring[j], offsets[j], o0), z0);
            let b0 = lift(offset(ring[i], offsets[i], o1), z1);
            let b1 = lift(offset(ring[j], offsets[j], o1), z1);

            mesh.push_triangle(a0, a1, b1, fallback);
            mesh.push_triangle(a0, b1, b0, fallback);
        }
    }
}

/// Per-vertex miter vectors: moving a vertex by `m * d` moves both adjacent
/// edges outward by `d`
fn miter_offsets(ring: &[[f32; 2]]) -> Vec<[f32; 2]> {
    let n = ring.len();

    (0..n)
        .map(|i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            let n_in = edge_normal(prev, ring[i]);
            let n_out = edge_normal(ring[i], next);

            let denom = 1.0 + n_in[0] * n_out[0] + n_in[1] * n_out[1];
            if denom < 1e-4 {
                return n_out;
            }

            let miter = [(n_in[0] + n_out[0]) / denom, (n_in[1] + n_out[1]) / denom];
            let length = miter[0].hypot(miter[1]);
            if length > MAX_MITER {
                [miter[0] / length * MAX_MITER, miter[1] / length * MAX_MITER]
            } else {
                miter
            }
        })
        .collect()
}

fn edge_normal(a: [f32; 2], b: [f32; 2]) -> [f32; 2] {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let length = dx.hypot(dy);
    if length <= f32::EPSILON {
        return [0.0, 0.0];
    }
    [dy / length, -dx / length]
}

fn open_ring(ring: &LineString<f32>) -> Vec<[f32; 2]> {
    let mut points: Vec<[f32; 2]> = ring.coords().map(|c| [c.x, c.y]).collect();
    points.dedup();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn offset(point: [f32; 2], direction: [f32; 2], distance: f32) -> [f32; 2] {
    [
        point[0] + direction[0] * distance,
        point[1] + direction[1] * distance,
    ]
}

fn lift(point: [f32; 2], z: f32) -> [f32; 3] {
    [point[0], point[1], z]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f32, y0: f32, side: f32) -> Vec<[f32; 2]> {
        vec![[x0, y0], [x0 + side, y0], [x0 + side, y0 + side], [x0, y0 + side]]
    }

    fn outline(paths: Vec<OutlinePath>) -> VectorOutline {
        VectorOutline {
            paths,
            width: 512,
            height: 512,
        }
    }

    fn flat() -> MeshExtruder {
        MeshExtruder {
            bevel: None,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_outline_gives_empty_mesh() {
        let mesh = MeshExtruder::default()
            .extrude(&outline(vec![]), Material::default())
            .unwrap();
        assert!(mesh.is_empty());
        assert_eq!(mesh.vertex_count(), 0);
    }

    #[test]
    fn test_flat_square_triangle_count() {
        let path = OutlinePath {
            exterior: square(10.0, 10.0, 20.0),
            holes: vec![],
        };
        let mesh = flat().extrude(&outline(vec![path]), Material::default()).unwrap();

        // 4 walls x 2 + 2 caps x 2
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(mesh.indices.len(), 36);
        assert_eq!(mesh.positions.len(), mesh.normals.len());
    }

    #[test]
    fn test_mesh_is_centered() {
        let paths = vec![
            OutlinePath {
                exterior: square(300.0, 40.0, 50.0),
                holes: vec![],
            },
            OutlinePath {
                exterior: square(400.0, 200.0, 30.0),
                holes: vec![],
            },
        ];
        let mesh = MeshExtruder::default()
            .extrude(&outline(paths), Material::default())
            .unwrap();

        let (min, max) = mesh.bounds().unwrap();
        for axis in 0..3 {
            assert!((min[axis] + max[axis]).abs() < 1e-5, "axis {} not centered", axis);
        }
    }

    #[test]
    fn test_bevel_adds_thickness_and_size() {
        let path = OutlinePath {
            exterior: square(0.0, 0.0, 100.0),
            holes: vec![],
        };
        let extruder = MeshExtruder::default();
        let bevel = extruder.bevel.clone().unwrap();
        let mesh = extruder.extrude(&outline(vec![path]), Material::default()).unwrap();

        let (min, max) = mesh.bounds().unwrap();
        let z_extent = max[2] - min[2];
        let x_extent = max[0] - min[0];
        assert!((z_extent - (extruder.depth + 2.0 * bevel.thickness)).abs() < 1e-5);
        assert!((x_extent - (1.0 + 2.0 * bevel.size)).abs() < 1e-4);
    }

    #[test]
    fn test_cap_normals_face_outward() {
        let path = OutlinePath {
            exterior: square(0.0, 0.0, 40.0),
            holes: vec![],
        };
        let mesh = flat().extrude(&outline(vec![path]), Material::default()).unwrap();
        let (min, max) = mesh.bounds().unwrap();

        for (position, normal) in mesh.positions.iter().zip(&mesh.normals) {
            if normal[2] > 0.9 {
                assert!((position[2] - max[2]).abs() < 1e-6);
            }
            if normal[2] < -0.9 {
                assert!((position[2] - min[2]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_wall_normals_point_away_from_center() {
        let path = OutlinePath {
            exterior: square(0.0, 0.0, 40.0),
            holes: vec![],
        };
        let mesh = flat().extrude(&outline(vec![path]), Material::default()).unwrap();

        for (position, normal) in mesh.positions.iter().zip(&mesh.normals) {
            if normal[2].abs() < 0.1 {
                let outward = position[0] * normal[0] + position[1] * normal[1];
                assert!(outward > 0.0);
            }
        }
    }

    #[test]
    fn test_hole_adds_inner_walls() {
        let solid = OutlinePath {
            exterior: square(0.0, 0.0, 60.0),
            holes: vec![],
        };
        let ring = OutlinePath {
            exterior: square(0.0, 0.0, 60.0),
            holes: vec![square(20.0, 20.0, 20.0)],
        };

        let solid_mesh = flat().extrude(&outline(vec![solid]), Material::default()).unwrap();
        let ring_mesh = flat().extrude(&outline(vec![ring]), Material::default()).unwrap();

        let walls = |mesh: &Mesh| mesh.normals.iter().step_by(3).filter(|n| n[2].abs() < 0.1).count();
        assert_eq!(walls(&solid_mesh), 8);
        assert_eq!(walls(&ring_mesh), 16);

        // Front cap covers the annulus only: 0.6² - 0.2²
        let front_area: f32 = ring_mesh
            .positions
            .chunks_exact(3)
            .zip(ring_mesh.normals.iter().step_by(3))
            .filter(|(_, n)| n[2] > 0.9)
            .map(|(t, _)| {
                0.5 * ((t[1][0] - t[0][0]) * (t[2][1] - t[0][1])
                    - (t[1][1] - t[0][1]) * (t[2][0] - t[0][0]))
            })
            .sum();
        assert!((front_area - 0.32).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_path_is_skipped() {
        let path = OutlinePath {
            exterior: vec![[0.0, 0.0], [10.0, 0.0], [20.0, 0.0]],
            holes: vec![],
        };
        let mesh = flat().extrude(&outline(vec![path]), Material::default()).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_invalid_depth_is_rejected() {
        let extruder = MeshExtruder {
            depth: 0.0,
            ..Default::default()
        };
        let result = extruder.extrude(&outline(vec![]), Material::default());
        assert!(matches!(result, Err(PipelineError::Extrude(_))));
    }

    #[test]
    fn test_layers_with_bevel() {
        let extruder = MeshExtruder::default();
        let layers = extruder.layers();
        assert_eq!(layers.len(), 8);
        assert!((layers[0].0 + 0.03).abs() < 1e-6);
        assert_eq!(layers[0].1, 0.0);
        assert!((layers[3].1 - 0.02).abs() < 1e-6);
        assert!((layers[7].0 - 0.23).abs() < 1e-6);
    }
}
