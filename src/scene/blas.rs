//! Line-oriented text format of a built hierarchy.
//!
//! ```text
//! min <x> <y> <z>
//! max <x> <y> <z>
//! nodes <count>
//! node <min x y z> <max x y z> <leftChild> <primitiveCount>   (count times)
//! triIndex <index>                                            (once per triangle)
//! ```
//!
//! Numbers use the shortest form that parses back to the same `f32`. A mesh
//! without vertices has infinite bounds, written as `inf` and `-inf`; readers
//! expecting `Infinity` have to map those spellings themselves.

use std::fs::{self, File, Permissions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use glam::Vec3;
use log::debug;
use tempfile::NamedTempFile;

use crate::accelerators::aabb::AABB;
use crate::accelerators::bvh::{Bvh, BvhNode};
use crate::error::{BlasError, Location};

/// Contents of a serialized hierarchy.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlasFile {
    pub bounds: AABB,
    pub nodes: Vec<BvhNode>,
    pub triangle_indices: Vec<u32>,
}

impl From<&Bvh> for BlasFile {
    fn from(bvh: &Bvh) -> Self {
        Self {
            bounds: bvh.bounds(),
            nodes: bvh.nodes().to_vec(),
            triangle_indices: bvh.triangle_indices().to_vec(),
        }
    }
}

pub fn write<W: Write>(bvh: &Bvh, writer: &mut W) -> io::Result<()> {
    let bounds = bvh.bounds();
    writeln!(writer, "min {}", Corner(bounds.min))?;
    writeln!(writer, "max {}", Corner(bounds.max))?;
    writeln!(writer, "nodes {}", bvh.nodes_used())?;

    for node in bvh.nodes() {
        writeln!(
            writer,
            "node {} {} {} {}",
            Corner(node.bounds.min),
            Corner(node.bounds.max),
            node.left_child,
            node.primitive_count
        )?;
    }

    for index in bvh.triangle_indices() {
        writeln!(writer, "triIndex {}", index)?;
    }

    Ok(())
}

/// Writes `bvh` to `path`, replacing it only once the whole file is written.
pub fn save(bvh: &Bvh, path: impl AsRef<Path>) -> Result<(), BlasError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(BlasError::io(path))?;
    {
        let mut writer = BufWriter::new(file.as_file_mut());
        write(bvh, &mut writer).map_err(BlasError::io(path))?;
        writer.flush().map_err(BlasError::io(path))?;
    }

    if let Some(permissions) = output_permissions(path) {
        file.as_file()
            .set_permissions(permissions)
            .map_err(BlasError::io(path))?;
    }

    file.persist(path)
        .map_err(|err| BlasError::io(path)(err.error))?;

    debug!("Wrote {} nodes to {}", bvh.nodes_used(), path.display());
    Ok(())
}

/// Permissions of the file being replaced, or `rw-r--r--` for a new one.
/// Temp files start out owner-only.
fn output_permissions(path: &Path) -> Option<Permissions> {
    match fs::metadata(path) {
        Ok(existing) => Some(existing.permissions()),
        #[cfg(unix)]
        Err(_) => {
            use std::os::unix::fs::PermissionsExt;
            Some(Permissions::from_mode(0o644))
        }
        #[cfg(not(unix))]
        Err(_) => None,
    }
}

pub fn load(path: impl AsRef<Path>) -> Result<BlasFile, BlasError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(BlasError::io(path))?;

    read(BufReader::new(file), path)
}

/// Parses a serialized hierarchy. Lines with an unknown keyword are skipped.
pub fn read<R: BufRead>(reader: R, source: impl AsRef<Path>) -> Result<BlasFile, BlasError> {
    let source = source.as_ref();
    let mut blas = BlasFile::default();
    let mut declared_nodes = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(BlasError::io(source))?;
        let mut words = Words {
            tokens: line.split_whitespace(),
            location: || Location::new(source, idx + 1),
            text: line.trim(),
        };

        match words.tokens.next() {
            Some("min") => blas.bounds.min = words.vec3()?,
            Some("max") => blas.bounds.max = words.vec3()?,
            Some("nodes") => declared_nodes = Some(words.value::<usize>()?),
            Some("node") => {
                let min = words.vec3()?;
                let max = words.vec3()?;
                blas.nodes.push(BvhNode {
                    bounds: AABB { min, max },
                    left_child: words.value()?,
                    primitive_count: words.value()?,
                });
            }
            Some("triIndex") => blas.triangle_indices.push(words.value()?),
            _ => {}
        }
    }

    if let Some(declared) = declared_nodes {
        if declared != blas.nodes.len() {
            return Err(BlasError::NodeCountMismatch {
                path: source.to_path_buf(),
                declared,
                found: blas.nodes.len(),
            });
        }
    }

    Ok(blas)
}

struct Corner(Vec3);

impl std::fmt::Display for Corner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.0.x, self.0.y, self.0.z)
    }
}

struct Words<'a, I, L> {
    tokens: I,
    location: L,
    text: &'a str,
}

impl<'a, I, L> Words<'a, I, L>
where
    I: Iterator<Item = &'a str>,
    L: Fn() -> Location,
{
    fn value<T: FromStr>(&mut self) -> Result<T, BlasError> {
        let token = self.tokens.next().ok_or_else(|| self.error("missing value"))?;
        token.parse().map_err(|_| self.error("invalid number"))
    }

    fn vec3(&mut self) -> Result<Vec3, BlasError> {
        Ok(Vec3::new(self.value()?, self.value()?, self.value()?))
    }

    fn error(&self, reason: &'static str) -> BlasError {
        BlasError::Format {
            location: (self.location)(),
            text: self.text.to_string(),
            reason,
        }
    }
}
