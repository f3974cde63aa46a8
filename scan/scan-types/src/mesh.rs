//! Reconstructed surface handle.

use std::sync::Arc;

use glam::Vec3;

use crate::error::ScanTypesError;

/// Vertex and face data behind a [`ScanMesh`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertex positions in meters.
    pub positions: Vec<Vec3>,
    /// Counter-clockwise triangles as vertex indices.
    pub faces: Vec<[u32; 3]>,
    /// Optional per-vertex RGB in `[0, 1]`.
    pub colors: Option<Vec<Vec3>>,
}

/// Shared, immutable handle to a reconstructed mesh.
///
/// Cloning is cheap. Pipeline stages produce new handles rather than
/// mutating an existing one, so a handle seen by the viewer never changes
/// underneath it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScanMesh(Arc<MeshData>);

impl ScanMesh {
    /// Creates a mesh after checking face indices.
    ///
    /// # Errors
    ///
    /// Returns [`ScanTypesError::FaceIndexOutOfRange`] if a face references
    /// a missing vertex.
    pub fn new(positions: Vec<Vec3>, faces: Vec<[u32; 3]>) -> Result<Self, ScanTypesError> {
        Self::from_data(MeshData {
            positions,
            faces,
            colors: None,
        })
    }

    /// Creates a mesh from prepared data after validating it.
    ///
    /// # Errors
    ///
    /// Returns an error for out-of-range face indices or a color list whose
    /// length differs from the vertex count.
    pub fn from_data(data: MeshData) -> Result<Self, ScanTypesError> {
        let vertex_count = data.positions.len();
        for (face, indices) in data.faces.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(ScanTypesError::FaceIndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
        }
        if let Some(colors) = &data.colors {
            if colors.len() != vertex_count {
                return Err(ScanTypesError::ColorCountMismatch {
                    expected: vertex_count,
                    actual: colors.len(),
                });
            }
        }
        Ok(Self(Arc::new(data)))
    }

    /// An empty mesh.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns a new handle with per-vertex colors attached.
    ///
    /// # Errors
    ///
    /// Returns [`ScanTypesError::ColorCountMismatch`] if the color count
    /// differs from the vertex count.
    pub fn with_colors(&self, colors: Vec<Vec3>) -> Result<Self, ScanTypesError> {
        Self::from_data(MeshData {
            positions: self.0.positions.clone(),
            faces: self.0.faces.clone(),
            colors: Some(colors),
        })
    }

    /// Underlying data.
    #[must_use]
    pub fn data(&self) -> &MeshData {
        &self.0
    }

    /// Vertex positions.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.0.positions
    }

    /// Triangle indices.
    #[must_use]
    pub fn faces(&self) -> &[[u32; 3]] {
        &self.0.faces
    }

    /// Per-vertex colors, when present.
    #[must_use]
    pub fn colors(&self) -> Option<&[Vec3]> {
        self.0.colors.as_deref()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.0.positions.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.0.faces.len()
    }

    /// True when there is no usable surface (no vertices or no faces).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.positions.is_empty() || self.0.faces.is_empty()
    }

    /// Whether the mesh carries color.
    #[must_use]
    pub fn is_colorized(&self) -> bool {
        self.0.colors.is_some()
    }

    /// Corner positions of every triangle, in face order.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        let positions = &self.0.positions;
        self.0.faces.iter().map(move |&[a, b, c]| {
            [
                positions[a as usize],
                positions[b as usize],
                positions[c as usize],
            ]
        })
    }

    /// Axis-aligned bounds, `None` for a mesh without vertices.
    #[must_use]
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.0.positions.first()?;
        Some(
            self.0
                .positions
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    /// Whether two handles point at the same mesh instance.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
