//! Conversion of session meshes to binary STL.

use std::path::Path;

use mesh_io::{StlHeader, StlMesh, StlTriangle, save_stl};
use scan_types::ScanMesh;
use tracing::debug;

use crate::error::SessionResult;

/// Header text of exported scans.
pub const EXPORT_HEADER_TEXT: &str = "Binary STL exported by scan-session";

/// Convert a scan mesh to STL triangles, one per face, with computed
/// normals. Vertex colors are dropped.
#[must_use]
pub fn to_stl(mesh: &ScanMesh) -> StlMesh {
    let triangles = mesh
        .triangles()
        .map(|[a, b, c]| StlTriangle::from_vertices([a.to_array(), b.to_array(), c.to_array()]))
        .collect();
    StlMesh {
        header: StlHeader::from_text(EXPORT_HEADER_TEXT),
        triangles,
    }
}

/// Export `mesh` to a binary STL file at `path`.
///
/// # Errors
///
/// Returns [`crate::SessionError::Io`] if the file cannot be written.
pub fn write_stl<P: AsRef<Path>>(mesh: &ScanMesh, path: P) -> SessionResult<()> {
    let stl = to_stl(mesh);
    save_stl(&stl, path.as_ref())?;
    debug!(
        faces = stl.triangle_count(),
        path = %path.as_ref().display(),
        "exported scan mesh"
    );
    Ok(())
}
