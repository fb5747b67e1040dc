use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use glam::Vec3;
use log::trace;

use super::Mesh;
use crate::error::{BlasError, Location, ParseError, RecordKind};

pub fn load_obj(path: impl AsRef<Path>) -> Result<Mesh, BlasError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(BlasError::io(path))?;

    read_obj(BufReader::new(file), path)
}

/// Reads a mesh description. `source` is only used to label errors.
///
/// `v x y z` lines add a vertex, `f d1 d2 .. dk` lines add a fan of `k - 2`
/// triangles around `d1`. Each descriptor is `index` or `index/...` with a
/// 1-based position index. Everything else is skipped.
pub fn read_obj<R: BufRead>(reader: R, source: impl AsRef<Path>) -> Result<Mesh, BlasError> {
    let source = source.as_ref();
    let mut parser = ObjParser::default();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(BlasError::io(source))?;
        parser.parse_line(&Record {
            source,
            line: idx + 1,
            text: line.trim(),
        })?;
    }

    Ok(parser.mesh)
}

#[derive(Default)]
struct ObjParser {
    mesh: Mesh,
}

impl ObjParser {
    fn parse_line(&mut self, record: &Record) -> Result<(), ParseError> {
        let mut tokens = record.text.split_whitespace();

        match tokens.next() {
            Some("v") => self.read_vertex(record, tokens),
            Some("f") => self.read_face(record, tokens),
            _ => Ok(()),
        }
    }

    fn read_vertex<'a>(
        &mut self,
        record: &Record,
        tokens: impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        let tokens: Vec<_> = tokens.take(3).collect();
        if tokens.len() < 3 {
            return Err(record.malformed(RecordKind::Vertex, 3, tokens.len()));
        }

        let mut position = [0.0; 3];
        for (component, token) in position.iter_mut().zip(&tokens) {
            *component = token
                .parse::<f32>()
                .map_err(|_| record.invalid_number(token))?;
        }

        trace!("line {}: vertex {:?}", record.line, position);
        self.mesh.push_vertex(Vec3::from(position));
        Ok(())
    }

    fn read_face<'a>(
        &mut self,
        record: &Record,
        tokens: impl Iterator<Item = &'a str>,
    ) -> Result<(), ParseError> {
        let corners = tokens
            .map(|descriptor| self.read_corner(record, descriptor))
            .collect::<Result<Vec<_>, _>>()?;

        if corners.len() < 3 {
            return Err(record.malformed(RecordKind::Face, 3, corners.len()));
        }

        for i in 0..corners.len() - 2 {
            self.mesh
                .push_triangle([corners[0], corners[i + 1], corners[i + 2]]);
        }

        trace!(
            "line {}: face with {} corners, {} triangles",
            record.line,
            corners.len(),
            corners.len() - 2
        );
        Ok(())
    }

    /// Resolves `index` or `index/...` into a 0-based vertex index.
    fn read_corner(&self, record: &Record, descriptor: &str) -> Result<u32, ParseError> {
        let token = descriptor
            .split_once('/')
            .map_or(descriptor, |(position, _)| position);

        let index = token
            .parse::<i64>()
            .map_err(|_| record.invalid_number(token))?;

        let vertex_count = self.mesh.vertices.len();
        if index < 1 || index as u64 > vertex_count as u64 {
            return Err(ParseError::IndexOutOfRange {
                location: record.location(),
                index,
                vertex_count,
                text: record.text.to_string(),
            });
        }

        Ok((index - 1) as u32)
    }
}

struct Record<'a> {
    source: &'a Path,
    line: usize,
    text: &'a str,
}

impl Record<'_> {
    fn location(&self) -> Location {
        Location::new(self.source, self.line)
    }

    fn malformed(&self, kind: RecordKind, expected: usize, found: usize) -> ParseError {
        ParseError::MalformedRecord {
            location: self.location(),
            kind,
            text: self.text.to_string(),
            expected,
            found,
        }
    }

    fn invalid_number(&self, token: &str) -> ParseError {
        ParseError::InvalidNumber {
            location: self.location(),
            token: token.to_string(),
            text: self.text.to_string(),
        }
    }
}
