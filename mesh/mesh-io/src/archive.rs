//! Zip packaging of scan artifacts.
//!
//! A delivered scan is a mesh file plus a preview image. When requested the
//! files are bundled into one Deflate-compressed zip before upload.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::error::{IoError, IoResult};

/// A file to place in an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Name inside the archive.
    pub name: String,
    /// File on disk providing the contents.
    pub source: PathBuf,
}

impl ArchiveEntry {
    /// Entry named after the source file name.
    ///
    /// Falls back to `"artifact"` when the path has no file name.
    #[must_use]
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let name = source
            .file_name()
            .map_or_else(|| "artifact".to_string(), |n| n.to_string_lossy().into_owned());
        Self { name, source }
    }

    /// Entry with an explicit archive name.
    #[must_use]
    pub fn named(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

/// Write `entries` into a new zip at `output`.
///
/// Every source is read before the archive is created.
///
/// # Errors
///
/// Returns [`IoError::SourceUnreadable`] for a missing entry,
/// [`IoError::DestinationUnwritable`] if the archive file cannot be written,
/// or [`IoError::Archive`] if the zip writer fails.
pub fn write_archive<P: AsRef<Path>>(entries: &[ArchiveEntry], output: P) -> IoResult<u64> {
    let output = output.as_ref();

    let mut contents = Vec::with_capacity(entries.len());
    for entry in entries {
        let bytes =
            std::fs::read(&entry.source).map_err(|e| IoError::source_unreadable(&entry.source, e))?;
        contents.push((entry.name.as_str(), bytes));
    }

    let file = File::create(output).map_err(|e| IoError::destination_unwritable(output, e))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in &contents {
        zip.start_file(*name, options)?;
        zip.write_all(bytes)
            .map_err(|e| IoError::destination_unwritable(output, e))?;
    }
    zip.finish()?;

    let size = std::fs::metadata(output)
        .map_err(|e| IoError::destination_unwritable(output, e))?
        .len();
    debug!(
        output = %output.display(),
        entries = entries.len(),
        bytes = size,
        "wrote artifact archive"
    );
    Ok(size)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn archive_contains_named_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = dir.path().join("scan.stl");
        let preview = dir.path().join("capture.jpg");
        std::fs::write(&mesh, b"mesh-bytes").unwrap();
        std::fs::write(&preview, b"jpeg-bytes").unwrap();

        let out = dir.path().join("bundle.zip");
        let entries = [
            ArchiveEntry::from_path(&mesh),
            ArchiveEntry::named("Preview.jpg", &preview),
        ];
        let size = write_archive(&entries, &out).unwrap();
        assert!(size > 0);

        let mut archive = ZipArchive::new(File::open(&out).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
        let mut text = String::new();
        archive
            .by_name("Preview.jpg")
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "jpeg-bytes");
        assert!(archive.by_name("scan.stl").is_ok());
    }

    #[test]
    fn missing_source_creates_no_archive() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bundle.zip");
        let entries = [ArchiveEntry::from_path(dir.path().join("absent.stl"))];

        let result = write_archive(&entries, &out);
        assert!(matches!(result, Err(IoError::SourceUnreadable { .. })));
        assert!(!out.exists());
    }
}
