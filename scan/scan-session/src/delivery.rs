//! Packaging finished scans and handing them to an upload service.
//!
//! A single-foot scan is exported to STL and optionally zipped together
//! with a preview image. A bilateral order merges a left and a right STL
//! into one file first; a merge failure stops delivery before anything is
//! uploaded.

use std::path::{Path, PathBuf};

use mesh_io::{ArchiveEntry, MergeParams, MergeSummary, merge_stl_files, write_archive};
use scan_types::ScanMesh;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::error::SessionResult;
use crate::export::write_stl;

/// File name of the merged bilateral mesh.
pub const MERGED_FILE_NAME: &str = "merged_output.stl";

/// Archive name of the preview image.
pub const PREVIEW_ENTRY_NAME: &str = "CapturedImage.jpg";

/// Which foot an upload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FootSide {
    /// Left foot.
    Left,
    /// Right foot.
    Right,
    /// Both feet in one merged file.
    Merged,
}

impl FootSide {
    /// Value sent to the order service.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Left => "Left",
            Self::Right => "Right",
            Self::Merged => "Merged",
        }
    }
}

/// Where an artifact is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Order the scan belongs to.
    pub order_id: u64,
    /// Folder inside the order, if any.
    pub folder_id: Option<u64>,
    /// Order status to report with the upload.
    pub order_status: String,
    /// Foot side of the artifact.
    pub foot: FootSide,
}

impl UploadTarget {
    /// Target without a folder.
    #[must_use]
    pub fn new(order_id: u64, order_status: impl Into<String>, foot: FootSide) -> Self {
        Self {
            order_id,
            folder_id: None,
            order_status: order_status.into(),
            foot,
        }
    }

    /// Attach to a folder.
    #[must_use]
    pub const fn with_folder(mut self, folder_id: u64) -> Self {
        self.folder_id = Some(folder_id);
        self
    }
}

/// Kind of uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// A bare binary STL.
    Mesh,
    /// A zip holding the mesh and its preview.
    Archive,
}

impl ArtifactKind {
    /// MIME type for the upload.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Mesh => "model/stl",
            Self::Archive => "application/zip",
        }
    }
}

/// A file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Location on disk.
    pub path: PathBuf,
    /// What the file holds.
    pub kind: ArtifactKind,
}

impl Artifact {
    /// File name sent with the upload.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned())
    }
}

/// What the order service returns for a stored attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    /// Attachment id.
    pub id: u64,
    /// Stored file name.
    pub file_name: String,
    /// Download location, when the service provides one.
    pub url: Option<String>,
}

/// Upload failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UploadError {
    /// The service answered with an error.
    #[error("service rejected upload ({status}): {message}")]
    Rejected {
        /// Service status code.
        status: u16,
        /// Service message.
        message: String,
    },

    /// The request never completed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Something that stores artifacts against an order.
pub trait UploadService {
    /// Upload `artifact` for `target`.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadError`] when the upload fails.
    fn upload(
        &self,
        target: &UploadTarget,
        artifact: &Artifact,
    ) -> Result<AttachmentRecord, UploadError>;
}

/// Export `mesh` as `<name>.stl` in `work_dir`. With `zipped`, bundle it
/// with the optional preview image into `<name>.zip`.
///
/// # Errors
///
/// Returns [`crate::SessionError::Io`] if a file cannot be written or the
/// preview cannot be read.
pub fn package_scan(
    mesh: &ScanMesh,
    preview: Option<&Path>,
    work_dir: &Path,
    name: &str,
    zipped: bool,
) -> SessionResult<Artifact> {
    let stl_path = work_dir.join(format!("{name}.stl"));
    write_stl(mesh, &stl_path)?;
    if !zipped {
        return Ok(Artifact {
            path: stl_path,
            kind: ArtifactKind::Mesh,
        });
    }

    let mut entries = vec![ArchiveEntry::from_path(&stl_path)];
    if let Some(image) = preview {
        entries.push(ArchiveEntry::named(PREVIEW_ENTRY_NAME, image));
    }
    let zip_path = work_dir.join(format!("{name}.zip"));
    let bytes = write_archive(&entries, &zip_path)?;
    info!(path = %zip_path.display(), bytes, entries = entries.len(), "packaged scan");
    Ok(Artifact {
        path: zip_path,
        kind: ArtifactKind::Archive,
    })
}

/// Upload one artifact.
///
/// # Errors
///
/// Returns [`crate::SessionError::Upload`] if the service fails.
pub fn deliver<S: UploadService + ?Sized>(
    service: &S,
    target: &UploadTarget,
    artifact: &Artifact,
) -> SessionResult<AttachmentRecord> {
    info!(
        order = target.order_id,
        foot = target.foot.label(),
        file = %artifact.file_name(),
        "uploading artifact"
    );
    let record = service
        .upload(target, artifact)
        .inspect_err(|e| warn!(order = target.order_id, error = %e, "upload failed"))?;
    Ok(record)
}

/// Merge a left and a right foot STL and upload the result as `Merged`.
///
/// The merged file is written to `work_dir`. Nothing is uploaded if either
/// input is unreadable or malformed.
///
/// # Errors
///
/// Returns [`crate::SessionError::Io`] for a failed merge, or
/// [`crate::SessionError::Upload`] for a failed upload.
pub fn deliver_bilateral<S: UploadService + ?Sized>(
    left: &Path,
    right: &Path,
    work_dir: &Path,
    params: &MergeParams,
    service: &S,
    target: &UploadTarget,
) -> SessionResult<(MergeSummary, AttachmentRecord)> {
    let merged_path = work_dir.join(MERGED_FILE_NAME);
    let summary = merge_stl_files(left, right, &merged_path, params)
        .inspect_err(|e| warn!(error = %e, "bilateral merge failed, nothing uploaded"))?;

    let target = UploadTarget {
        foot: FootSide::Merged,
        ..target.clone()
    };
    let artifact = Artifact {
        path: merged_path,
        kind: ArtifactKind::Mesh,
    };
    let record = deliver(service, &target, &artifact)?;
    Ok((summary, record))
}
