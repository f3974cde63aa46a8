//! Mesh file I/O for the scan pipeline.
//!
//! This crate reads and writes the binary STL triangle soup produced by a
//! scan session, merges two scans into one deliverable file, and bundles
//! artifacts into a zip for upload:
//!
//! - **Codec** - strict binary STL parse/write with byte-exact round trips
//! - **Merge** - left/right scans combined with an X offset on the second
//! - **Archive** - mesh + preview image packaged with Deflate
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **no engine or UI dependencies**. It can be
//! used in:
//! - CLI tools
//! - Upload services
//! - The capture application itself
//!
//! # Example
//!
//! ```no_run
//! use mesh_io::{MergeParams, load_stl, merge_meshes, save_stl};
//!
//! let left = load_stl("left.stl").unwrap();
//! let right = load_stl("right.stl").unwrap();
//!
//! let merged = merge_meshes(&left, &right, &MergeParams::default());
//! save_stl(&merged, "merged.stl").unwrap();
//! ```
//!
//! # Size Invariant
//!
//! A binary STL is accepted only when its length is exactly
//! `84 + 50 * triangle_count`; see [`expected_file_size`].
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod archive;
mod error;
mod merge;
mod stl;

pub use archive::{ArchiveEntry, write_archive};
pub use error::{IoError, IoResult};
pub use merge::{
    DEFAULT_SPACING, MERGED_HEADER_TEXT, MergeParams, MergeSummary, merge_meshes, merge_stl_files,
};
pub use stl::{
    DEFAULT_HEADER_TEXT, HEADER_SIZE, PREFIX_SIZE, StlHeader, StlMesh, StlTriangle, TRIANGLE_SIZE,
    expected_file_size, face_normal, load_stl, save_stl,
};
