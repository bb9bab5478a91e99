use glam::Vec3;

use super::{EnvironmentMesh, SpatialHit, SurfaceLayer};
use crate::pose::Ray;

/// One triangle of the environment mesh, tagged with its layer.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub layer: SurfaceLayer,
}

/// Triangle-soup environment mesh.
///
/// Hosts with a real reconstruction pipeline implement `EnvironmentMesh`
/// over their own acceleration structure; this implementation covers tests
/// and simple hosts.
#[derive(Debug, Default, Clone)]
pub struct TriangleMesh {
    triangles: Vec<Triangle>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    /// A square surface centered at `center`, facing `normal`, made of two
    /// triangles. `half_extent` is half the edge length.
    pub fn quad(center: Vec3, normal: Vec3, half_extent: f32, layer: SurfaceLayer) -> Self {
        let normal = normal.normalize();
        let tangent = if normal.x.abs() < 0.9 {
            Vec3::X.cross(normal).normalize()
        } else {
            Vec3::Y.cross(normal).normalize()
        };
        let bitangent = normal.cross(tangent);

        let corner = |u: f32, v: f32| center + tangent * (u * half_extent) + bitangent * (v * half_extent);
        let (p0, p1, p2, p3) = (
            corner(-1.0, -1.0),
            corner(1.0, -1.0),
            corner(1.0, 1.0),
            corner(-1.0, 1.0),
        );

        let mut mesh = Self::new();
        mesh.push(Triangle { a: p0, b: p1, c: p2, layer });
        mesh.push(Triangle { a: p0, b: p2, c: p3, layer });
        mesh
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl EnvironmentMesh for TriangleMesh {
    fn raycast(&self, ray: &Ray, layer: SurfaceLayer) -> Option<SpatialHit> {
        let mut nearest: Option<SpatialHit> = None;

        for triangle in self.triangles.iter().filter(|t| t.layer == layer) {
            if let Some(hit) = intersect(ray, triangle) {
                match &nearest {
                    Some(best) if best.distance <= hit.distance => {}
                    _ => nearest = Some(hit),
                }
            }
        }

        nearest
    }
}

/// Moller-Trumbore ray/triangle intersection. Returns hits on either face,
/// with the normal flipped to oppose the ray.
fn intersect(ray: &Ray, triangle: &Triangle) -> Option<SpatialHit> {
    const EPSILON: f32 = 1e-7;

    let edge1 = triangle.b - triangle.a;
    let edge2 = triangle.c - triangle.a;

    let h = ray.direction.cross(edge2);
    let det = edge1.dot(h);
    if det.abs() < EPSILON {
        // Ray parallel to the triangle plane.
        return None;
    }

    let inv_det = 1.0 / det;
    let s = ray.origin - triangle.a;
    let u = s.dot(h) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(q) * inv_det;
    if t <= EPSILON {
        return None;
    }

    let mut normal = edge1.cross(edge2).normalize();
    if normal.dot(ray.direction) > 0.0 {
        normal = -normal;
    }

    Some(SpatialHit {
        point: ray.point_at(t),
        normal,
        distance: t,
    })
}
