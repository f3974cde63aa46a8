//! Binary STL triangle-soup codec.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    – Header (free text, space padded when written here)
//! UINT32       – Number of triangles, little-endian
//! foreach triangle
//!     REAL32[3] – Normal vector
//!     REAL32[3] – Vertex 1
//!     REAL32[3] – Vertex 2
//!     REAL32[3] – Vertex 3
//!     UINT16    – Attribute byte count (usually 0)
//! end
//! ```
//!
//! A file is only accepted when its length is exactly
//! `84 + 50 * triangle_count`. Triangles are kept as an ordered soup: no
//! vertex welding, no deduplication. The header and the attribute bytes of
//! parsed files are kept as-is, so writing a parsed file reproduces it byte
//! for byte.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{IoError, IoResult};

/// STL binary header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Header plus the little-endian triangle count.
pub const PREFIX_SIZE: usize = HEADER_SIZE + 4;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
pub const TRIANGLE_SIZE: usize = 50;

/// Header text used when a mesh is created from scratch.
pub const DEFAULT_HEADER_TEXT: &str = "Binary STL written by mesh-io";

/// Exact file size of a binary STL holding `triangle_count` triangles.
#[must_use]
pub const fn expected_file_size(triangle_count: u32) -> u64 {
    PREFIX_SIZE as u64 + TRIANGLE_SIZE as u64 * triangle_count as u64
}

/// The 80-byte binary STL header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StlHeader([u8; HEADER_SIZE]);

impl StlHeader {
    /// Build a header from text, padded with spaces to 80 bytes.
    ///
    /// Text longer than 80 bytes is truncated.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut bytes = [b' '; HEADER_SIZE];
        let len = text.len().min(HEADER_SIZE);
        bytes[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self(bytes)
    }

    /// Wrap raw header bytes unchanged.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; HEADER_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw header bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; HEADER_SIZE] {
        &self.0
    }

    /// Header text with trailing padding removed.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.0)
            .trim_end_matches([' ', '\0'])
            .to_string()
    }
}

impl Default for StlHeader {
    fn default() -> Self {
        Self::from_text(DEFAULT_HEADER_TEXT)
    }
}

/// One 50-byte binary STL record.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StlTriangle {
    /// Facet normal as stored in the file.
    pub normal: [f32; 3],
    /// The three corner positions.
    pub vertices: [[f32; 3]; 3],
    /// Trailing attribute word; zero unless the producer used it.
    pub attribute: u16,
}

impl StlTriangle {
    /// Create a triangle with an explicit normal.
    #[must_use]
    pub const fn new(normal: [f32; 3], vertices: [[f32; 3]; 3]) -> Self {
        Self {
            normal,
            vertices,
            attribute: 0,
        }
    }

    /// Create a triangle whose normal is computed from the winding.
    ///
    /// Degenerate triangles get a zero normal.
    #[must_use]
    pub fn from_vertices(vertices: [[f32; 3]; 3]) -> Self {
        Self::new(face_normal(&vertices), vertices)
    }

    /// Translate all three vertices. The normal is left untouched.
    pub fn translate(&mut self, offset: [f32; 3]) {
        for vertex in &mut self.vertices {
            vertex[0] += offset[0];
            vertex[1] += offset[1];
            vertex[2] += offset[2];
        }
    }

    fn decode(record: &[u8]) -> Self {
        Self {
            normal: read_vec3(record, 0),
            vertices: [
                read_vec3(record, 12),
                read_vec3(record, 24),
                read_vec3(record, 36),
            ],
            attribute: u16::from_le_bytes([record[48], record[49]]),
        }
    }

    fn encode<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        write_vec3(writer, self.normal)?;
        for vertex in &self.vertices {
            write_vec3(writer, *vertex)?;
        }
        writer.write_all(&self.attribute.to_le_bytes())
    }
}

/// A binary STL file held in memory: header plus ordered triangles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StlMesh {
    /// File header.
    pub header: StlHeader,
    /// Triangles in file order.
    pub triangles: Vec<StlTriangle>,
}

impl StlMesh {
    /// Create an empty mesh with the given header.
    #[must_use]
    pub const fn new(header: StlHeader) -> Self {
        Self {
            header,
            triangles: Vec::new(),
        }
    }

    /// Create a mesh from triangles with the default header.
    #[must_use]
    pub fn from_triangles(triangles: Vec<StlTriangle>) -> Self {
        Self {
            header: StlHeader::default(),
            triangles,
        }
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Whether the mesh holds no triangles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Size in bytes of the encoded file.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        PREFIX_SIZE as u64 + TRIANGLE_SIZE as u64 * self.triangles.len() as u64
    }

    /// Parse a binary STL buffer.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::TooSmall`] when the buffer cannot hold the header
    /// and count, and [`IoError::SizeMismatch`] when the buffer length is
    /// not exactly `84 + 50 * count`.
    pub fn parse(bytes: &[u8]) -> IoResult<Self> {
        let actual = bytes.len() as u64;
        if bytes.len() < PREFIX_SIZE {
            return Err(IoError::TooSmall {
                actual,
                minimum: PREFIX_SIZE as u64,
            });
        }

        let triangle_count = u32::from_le_bytes([
            bytes[HEADER_SIZE],
            bytes[HEADER_SIZE + 1],
            bytes[HEADER_SIZE + 2],
            bytes[HEADER_SIZE + 3],
        ]);
        let expected = expected_file_size(triangle_count);
        if actual != expected {
            return Err(IoError::SizeMismatch {
                triangle_count,
                expected,
                actual,
            });
        }

        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);

        let triangles = bytes[PREFIX_SIZE..]
            .chunks_exact(TRIANGLE_SIZE)
            .map(StlTriangle::decode)
            .collect();

        Ok(Self {
            header: StlHeader(header),
            triangles,
        })
    }

    /// Encode into a writer.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::TooManyTriangles`] if the count does not fit in
    /// u32, or [`IoError::Io`] if the writer fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> IoResult<()> {
        let count = u32::try_from(self.triangles.len()).map_err(|_| IoError::TooManyTriangles {
            count: self.triangles.len(),
        })?;

        writer.write_all(self.header.as_bytes())?;
        writer.write_all(&count.to_le_bytes())?;
        for triangle in &self.triangles {
            triangle.encode(&mut writer)?;
        }
        Ok(())
    }

    /// Encode into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::TooManyTriangles`] if the count does not fit in u32.
    pub fn to_bytes(&self) -> IoResult<Vec<u8>> {
        let capacity = usize::try_from(self.encoded_len()).unwrap_or(0);
        let mut buffer = Vec::with_capacity(capacity);
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }
}

/// Load a binary STL file.
///
/// # Errors
///
/// Returns [`IoError::SourceUnreadable`] if the file cannot be read, or a
/// format error if its size disagrees with its triangle count.
///
/// # Example
///
/// ```no_run
/// use mesh_io::load_stl;
///
/// let mesh = load_stl("left.stl").unwrap();
/// println!("Loaded {} triangles", mesh.triangle_count());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<StlMesh> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| IoError::source_unreadable(path, e))?;
    let mesh = StlMesh::parse(&bytes)?;
    debug!(
        path = %path.display(),
        triangles = mesh.triangle_count(),
        "loaded binary STL"
    );
    Ok(mesh)
}

/// Save a mesh as binary STL.
///
/// # Errors
///
/// Returns [`IoError::DestinationUnwritable`] if the file cannot be created
/// or written.
pub fn save_stl<P: AsRef<Path>>(mesh: &StlMesh, path: P) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| IoError::destination_unwritable(path, e))?;
    let mut writer = BufWriter::new(file);

    mesh.write_to(&mut writer).map_err(|e| match e {
        IoError::Io(source) => IoError::destination_unwritable(path, source),
        other => other,
    })?;
    writer
        .flush()
        .map_err(|e| IoError::destination_unwritable(path, e))?;

    debug!(
        path = %path.display(),
        triangles = mesh.triangle_count(),
        "saved binary STL"
    );
    Ok(())
}

/// Unit normal of a triangle, zero when degenerate.
#[must_use]
pub fn face_normal(vertices: &[[f32; 3]; 3]) -> [f32; 3] {
    let [a, b, c] = vertices;
    let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    let n = [
        e1[1].mul_add(e2[2], -(e1[2] * e2[1])),
        e1[2].mul_add(e2[0], -(e1[0] * e2[2])),
        e1[0].mul_add(e2[1], -(e1[1] * e2[0])),
    ];
    let len = n[2].mul_add(n[2], n[0].mul_add(n[0], n[1] * n[1])).sqrt();
    if len > f32::EPSILON {
        [n[0] / len, n[1] / len, n[2] / len]
    } else {
        [0.0, 0.0, 0.0]
    }
}

fn read_f32(buf: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn read_vec3(buf: &[u8], offset: usize) -> [f32; 3] {
    [
        read_f32(buf, offset),
        read_f32(buf, offset + 4),
        read_f32(buf, offset + 8),
    ]
}

fn write_vec3<W: Write>(writer: &mut W, v: [f32; 3]) -> std::io::Result<()> {
    writer.write_all(&v[0].to_le_bytes())?;
    writer.write_all(&v[1].to_le_bytes())?;
    writer.write_all(&v[2].to_le_bytes())
}
