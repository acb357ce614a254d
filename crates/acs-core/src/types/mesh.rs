//! Immutable triangulated surface.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Minimum vertex count for a mesh to span a volume.
pub const MIN_MESH_VERTICES: usize = 4;

/// An owned triangulated surface.
///
/// Fields are private; a `Mesh` is validated once at construction and never
/// mutated afterwards. Transformations return a new mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMesh", into = "RawMesh")]
pub struct Mesh {
    vertices: Vec<[f64; 3]>,
    faces: Vec<[usize; 3]>,
}

/// Unvalidated wire form of a [`Mesh`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMesh {
    pub vertices: Vec<[f64; 3]>,
    #[serde(default)]
    pub faces: Vec<[usize; 3]>,
}

impl TryFrom<RawMesh> for Mesh {
    type Error = CoreError;

    fn try_from(raw: RawMesh) -> CoreResult<Self> {
        Mesh::new(raw.vertices, raw.faces)
    }
}

impl From<Mesh> for RawMesh {
    fn from(mesh: Mesh) -> Self {
        RawMesh {
            vertices: mesh.vertices,
            faces: mesh.faces,
        }
    }
}

impl Mesh {
    /// Build a mesh from vertex and face buffers.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidMesh`] when there are fewer than 4 vertices, a
    /// coordinate is not finite, or a face references a missing vertex.
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[usize; 3]>) -> CoreResult<Self> {
        if vertices.len() < MIN_MESH_VERTICES {
            return Err(CoreError::InvalidMesh(format!(
                "at least {} vertices required, got {}",
                MIN_MESH_VERTICES,
                vertices.len()
            )));
        }

        if let Some(i) = vertices
            .iter()
            .position(|v| v.iter().any(|c| !c.is_finite()))
        {
            return Err(CoreError::InvalidMesh(format!(
                "vertex {} has a non-finite coordinate",
                i
            )));
        }

        let n = vertices.len();
        if let Some(i) = faces.iter().position(|f| f.iter().any(|&idx| idx >= n)) {
            return Err(CoreError::InvalidMesh(format!(
                "face {} references a vertex outside 0..{}",
                i, n
            )));
        }

        Ok(Self { vertices, faces })
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// New mesh with every vertex mapped through `f` and the same faces.
    #[must_use]
    pub fn map_vertices(&self, f: impl Fn([f64; 3]) -> [f64; 3]) -> Mesh {
        Mesh {
            vertices: self.vertices.iter().map(|&v| f(v)).collect(),
            faces: self.faces.clone(),
        }
    }

    /// Per-axis extent (max - min) of the vertex cloud.
    pub fn extents(&self) -> [f64; 3] {
        let mut lo = [f64::INFINITY; 3];
        let mut hi = [f64::NEG_INFINITY; 3];
        for v in &self.vertices {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v[axis]);
                hi[axis] = hi[axis].max(v[axis]);
            }
        }
        [hi[0] - lo[0], hi[1] - lo[1], hi[2] - lo[2]]
    }

    pub fn centroid(&self) -> [f64; 3] {
        let n = self.vertices.len() as f64;
        let mut c = [0.0; 3];
        for v in &self.vertices {
            for axis in 0..3 {
                c[axis] += v[axis];
            }
        }
        [c[0] / n, c[1] / n, c[2] / n]
    }

    fn triangle(&self, face: &[usize; 3]) -> [[f64; 3]; 3] {
        [
            self.vertices[face[0]],
            self.vertices[face[1]],
            self.vertices[face[2]],
        ]
    }

    /// Enclosed volume from signed tetrahedra against the origin.
    ///
    /// Exact for closed, consistently wound surfaces; an approximation
    /// otherwise.
    pub fn volume(&self) -> f64 {
        let signed: f64 = self
            .faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.triangle(f);
                dot(a, cross(b, c)) / 6.0
            })
            .sum();
        signed.abs()
    }

    pub fn surface_area(&self) -> f64 {
        self.faces
            .iter()
            .map(|f| {
                let [a, b, c] = self.triangle(f);
                norm(cross(sub(b, a), sub(c, a))) / 2.0
            })
            .sum()
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned box `[0,x]×[0,y]×[0,z]`, outward winding.
    fn cuboid(x: f64, y: f64, z: f64) -> Mesh {
        let v = vec![
            [0.0, 0.0, 0.0],
            [x, 0.0, 0.0],
            [x, y, 0.0],
            [0.0, y, 0.0],
            [0.0, 0.0, z],
            [x, 0.0, z],
            [x, y, z],
            [0.0, y, z],
        ];
        let f = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [1, 2, 6],
            [1, 6, 5],
            [0, 4, 7],
            [0, 7, 3],
        ];
        Mesh::new(v, f).expect("valid cuboid")
    }

    #[test]
    fn test_rejects_too_few_vertices() {
        let err = Mesh::new(vec![[0.0; 3]; 3], vec![]).unwrap_err();
        assert!(err.to_string().contains("at least 4"));
        println!("[PASS] test_rejects_too_few_vertices");
    }

    #[test]
    fn test_rejects_non_finite_coordinate() {
        let mut v = vec![[0.0; 3]; 4];
        v[2][1] = f64::NAN;
        assert!(Mesh::new(v, vec![]).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_face() {
        let v = vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let err = Mesh::new(v, vec![[0, 1, 4]]).unwrap_err();
        assert!(err.to_string().contains("face 0"));
    }

    #[test]
    fn test_cuboid_volume_and_area() {
        let mesh = cuboid(2.0, 3.0, 4.0);
        assert!((mesh.volume() - 24.0).abs() < 1e-9);
        assert!((mesh.surface_area() - 52.0).abs() < 1e-9);
        assert_eq!(mesh.extents(), [2.0, 3.0, 4.0]);
        println!("[PASS] test_cuboid_volume_and_area - V=24, A=52");
    }

    #[test]
    fn test_map_vertices_keeps_faces() {
        let mesh = cuboid(1.0, 1.0, 1.0);
        let scaled = mesh.map_vertices(|[x, y, z]| [x * 10.0, y * 10.0, z * 10.0]);
        assert_eq!(scaled.faces(), mesh.faces());
        assert!((scaled.volume() - 1000.0).abs() < 1e-6);
        assert_eq!(mesh.extents(), [1.0, 1.0, 1.0], "source mesh untouched");
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"vertices": [[0,0,0],[1,0,0]], "faces": []}"#;
        assert!(serde_json::from_str::<Mesh>(bad).is_err());

        let good = r#"{"vertices": [[0,0,0],[1,0,0],[0,1,0],[0,0,1]], "faces": [[0,1,2]]}"#;
        let mesh: Mesh = serde_json::from_str(good).expect("valid mesh json");
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.face_count(), 1);
    }
}
