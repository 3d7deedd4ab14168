//! Vector tracing of binary silhouettes

use geo::{Area, Coord, LineString, Polygon, Simplify};
use imageproc::contours::{BorderType, find_contours};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::raster::RasterImage;

/// One closed outline with its holes, in raster pixel coordinates.
///
/// Rings are stored without repeating the first point; the closing edge is
/// implicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlinePath {
    pub exterior: Vec<[f32; 2]>,
    pub holes: Vec<Vec<[f32; 2]>>,
}

impl OutlinePath {
    pub fn point_count(&self) -> usize {
        self.exterior.len() + self.holes.iter().map(Vec::len).sum::<usize>()
    }

    pub fn to_polygon(&self) -> Polygon<f32> {
        Polygon::new(
            ring_to_line_string(&self.exterior),
            self.holes.iter().map(|hole| ring_to_line_string(hole)).collect(),
        )
    }

    pub fn area(&self) -> f32 {
        self.to_polygon().unsigned_area()
    }
}

/// All outlines discovered in one raster, in discovery order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorOutline {
    pub paths: Vec<OutlinePath>,
    pub width: u32,
    pub height: u32,
}

impl VectorOutline {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Boundary tracer with speck suppression and curve simplification
#[derive(Debug, Clone)]
pub struct VectorTracer {
    /// Rings enclosing less area than this (px²) are dropped
    pub speck_area: f32,
    /// Douglas-Peucker tolerance in pixels
    pub tolerance: f32,
}

impl Default for VectorTracer {
    fn default() -> Self {
        Self {
            speck_area: 2.0,
            tolerance: 1.0,
        }
    }
}

impl VectorTracer {
    pub fn trace(&self, raster: &RasterImage) -> VectorOutline {
        let contours = find_contours::<i32>(raster.as_gray());

        let rings: Vec<Option<Vec<[f32; 2]>>> = contours
            .iter()
            .map(|contour| {
                let points: Vec<[f32; 2]> = contour
                    .points
                    .iter()
                    .map(|p| [p.x as f32, p.y as f32])
                    .collect();
                self.clean_ring(points)
            })
            .collect();

        let mut holes_by_parent: Vec<Vec<usize>> = vec![Vec::new(); contours.len()];
        for (index, contour) in contours.iter().enumerate() {
            if contour.border_type == BorderType::Hole {
                if let Some(parent) = contour.parent {
                    holes_by_parent[parent].push(index);
                }
            }
        }

        let mut paths = Vec::new();
        for (index, contour) in contours.iter().enumerate() {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let Some(exterior) = rings[index].clone() else {
                continue;
            };

            let holes = holes_by_parent[index]
                .iter()
                .filter_map(|&hole| rings[hole].clone())
                .collect();

            paths.push(OutlinePath { exterior, holes });
        }

        debug!(
            contours = contours.len(),
            paths = paths.len(),
            points = paths.iter().map(OutlinePath::point_count).sum::<usize>(),
            "Raster traced"
        );

        VectorOutline {
            paths,
            width: raster.width(),
            height: raster.height(),
        }
    }

    fn clean_ring(&self, mut points: Vec<[f32; 2]>) -> Option<Vec<[f32; 2]>> {
        points.dedup();
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        if points.len() < 3 {
            return None;
        }

        let simplified = if self.tolerance > 0.0 {
            let simplified = ring_to_line_string(&points).simplify(&self.tolerance);
            let mut ring: Vec<[f32; 2]> = simplified.coords().map(|c| [c.x, c.y]).collect();
            ring.pop();
            ring
        } else {
            points
        };

        if simplified.len() < 3 {
            return None;
        }

        let area = Polygon::new(ring_to_line_string(&simplified), Vec::new()).unsigned_area();
        if area < self.speck_area.max(f32::EPSILON) {
            return None;
        }

        Some(simplified)
    }
}

fn ring_to_line_string(ring: &[[f32; 2]]) -> LineString<f32> {
    let mut coords: Vec<Coord<f32>> = ring.iter().map(|&[x, y]| Coord { x, y }).collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}
