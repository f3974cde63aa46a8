//! Bilateral mesh merge.
//!
//! Two binary STL scans (typically a left and a right foot) are combined
//! into one file. The second mesh is shifted along X so the two shapes sit
//! side by side; the first mesh is copied through untouched.

use std::path::Path;

use tracing::info;

use crate::error::IoResult;
use crate::stl::{StlHeader, StlMesh, load_stl, save_stl};

/// Header text written into merged files.
pub const MERGED_HEADER_TEXT: &str = "Merged STL File";

/// Default X spacing applied to the second mesh, in meters.
pub const DEFAULT_SPACING: f32 = 0.25;

/// Parameters for [`merge_meshes`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeParams {
    /// Offset added to every vertex X coordinate of the second mesh.
    pub spacing: f32,
    /// Text for the merged header, space padded to 80 bytes.
    pub header_text: String,
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            spacing: DEFAULT_SPACING,
            header_text: MERGED_HEADER_TEXT.to_string(),
        }
    }
}

impl MergeParams {
    /// Default parameters with a custom spacing.
    #[must_use]
    pub fn with_spacing(spacing: f32) -> Self {
        Self {
            spacing,
            ..Self::default()
        }
    }
}

/// Counts reported after a file merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    /// Triangles taken from the first file.
    pub first_triangles: usize,
    /// Triangles taken from the second file.
    pub second_triangles: usize,
    /// Bytes written to the output file.
    pub bytes_written: u64,
}

impl MergeSummary {
    /// Total triangles in the merged file.
    #[must_use]
    pub const fn total_triangles(&self) -> usize {
        self.first_triangles + self.second_triangles
    }
}

/// Merge two meshes: all triangles of `first`, then all triangles of
/// `second` with their vertices moved by `params.spacing` along X.
///
/// Normals are not modified. A zero spacing copies the second mesh's
/// records bit for bit.
#[must_use]
pub fn merge_meshes(first: &StlMesh, second: &StlMesh, params: &MergeParams) -> StlMesh {
    let mut triangles = Vec::with_capacity(first.triangle_count() + second.triangle_count());
    triangles.extend_from_slice(&first.triangles);

    let offset = [params.spacing, 0.0, 0.0];
    triangles.extend(second.triangles.iter().map(|triangle| {
        let mut moved = *triangle;
        if params.spacing != 0.0 {
            moved.translate(offset);
        }
        moved
    }));

    StlMesh {
        header: StlHeader::from_text(&params.header_text),
        triangles,
    }
}

/// Merge two binary STL files into `output`.
///
/// Both inputs are validated before anything is written, so a malformed
/// input never produces an output file.
///
/// # Errors
///
/// Returns [`crate::IoError::SourceUnreadable`] or a format error for a bad
/// input, and [`crate::IoError::DestinationUnwritable`] if the output cannot
/// be written.
///
/// # Example
///
/// ```no_run
/// use mesh_io::{MergeParams, merge_stl_files};
///
/// let summary = merge_stl_files("left.stl", "right.stl", "merged.stl", &MergeParams::default())
///     .unwrap();
/// println!("{} triangles", summary.total_triangles());
/// ```
pub fn merge_stl_files<P, Q, R>(
    first: P,
    second: Q,
    output: R,
    params: &MergeParams,
) -> IoResult<MergeSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let first_mesh = load_stl(first.as_ref())?;
    let second_mesh = load_stl(second.as_ref())?;

    let merged = merge_meshes(&first_mesh, &second_mesh, params);
    save_stl(&merged, output.as_ref())?;

    let summary = MergeSummary {
        first_triangles: first_mesh.triangle_count(),
        second_triangles: second_mesh.triangle_count(),
        bytes_written: merged.encoded_len(),
    };
    info!(
        first = summary.first_triangles,
        second = summary.second_triangles,
        spacing = params.spacing,
        output = %output.as_ref().display(),
        "merged binary STL files"
    );
    Ok(summary)
}
