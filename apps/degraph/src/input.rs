//! # Vector Input
//!
//! Readers for the vector files accepted by `degraph insert`.
//!
//! - JSON: an array whose items are either bare vectors (`[0.5, 1.0]`) or
//!   records with an explicit id (`{"id": 7, "vector": [0.5, 1.0]}`)
//! - fvecs: the little-endian `i32 dimension, f32 * dimension` record
//!   format used by the common ANN benchmark datasets

use clap::ValueEnum;
use degraph_core::{DegError, TupleId};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Maximum input file size (1 GB).
const MAX_INPUT_FILE_SIZE: u64 = 1024 * 1024 * 1024;

/// Supported vector file formats.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorFormat {
    /// JSON array of vectors or `{id, vector}` records
    #[default]
    Json,
    /// Binary fvecs records
    Fvecs,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRecord {
    Bare(Vec<f32>),
    Keyed { id: TupleId, vector: Vec<f32> },
}

/// Read `(id, vector)` pairs from `path`.
///
/// Items without an explicit id are numbered from `start_id` by their
/// position in the file.
pub fn read_vectors(
    path: &Path,
    format: VectorFormat,
    start_id: TupleId,
) -> Result<Vec<(TupleId, Vec<f32>)>, DegError> {
    let path = validate_file_path(path)?;
    let metadata = std::fs::metadata(&path)
        .map_err(|e| DegError::Io(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        return Err(DegError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        )));
    }

    let contents =
        std::fs::read(&path).map_err(|e| DegError::Io(format!("Read file: {}", e)))?;
    match format {
        VectorFormat::Json => parse_json(&contents, start_id),
        VectorFormat::Fvecs => parse_fvecs(&contents, start_id),
    }
}

/// Parse a JSON vector array.
pub fn parse_json(contents: &[u8], start_id: TupleId) -> Result<Vec<(TupleId, Vec<f32>)>, DegError> {
    let records: Vec<JsonRecord> = serde_json::from_slice(contents)
        .map_err(|e| DegError::Serialization(format!("Invalid vector JSON: {}", e)))?;

    Ok(records
        .into_iter()
        .zip(start_id..)
        .map(|(record, position)| match record {
            JsonRecord::Bare(vector) => (position, vector),
            JsonRecord::Keyed { id, vector } => (id, vector),
        })
        .collect())
}

/// Parse fvecs records.
pub fn parse_fvecs(
    contents: &[u8],
    start_id: TupleId,
) -> Result<Vec<(TupleId, Vec<f32>)>, DegError> {
    let mut vectors = Vec::new();
    let mut rest = contents;

    for id in start_id.. {
        let Some((header, body)) = rest.split_first_chunk::<4>() else {
            if !rest.is_empty() {
                return Err(truncated(id - start_id));
            }
            break;
        };
        let dimension = i32::from_le_bytes(*header);
        if dimension <= 0 {
            return Err(DegError::Serialization(format!(
                "fvecs record {} has invalid dimension {}",
                id - start_id,
                dimension
            )));
        }

        let length = dimension as usize * 4;
        if body.len() < length {
            return Err(truncated(id - start_id));
        }
        let (values, tail) = body.split_at(length);
        vectors.push((
            id,
            values
                .chunks_exact(4)
                .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
                .collect(),
        ));
        rest = tail;
    }

    Ok(vectors)
}

/// Parse a query given as comma separated numbers.
pub fn parse_query(text: &str) -> Result<Vec<f32>, DegError> {
    text.split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|_| {
                DegError::Serialization(format!("Query component '{}' is not a number", part))
            })
        })
        .collect()
}

fn truncated(record: TupleId) -> DegError {
    DegError::Serialization(format!("fvecs record {} is truncated", record))
}

/// Resolve `path` and make sure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, DegError> {
    let canonical = path.canonicalize().map_err(|e| {
        DegError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DegError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn fvecs(records: &[&[f32]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for record in records {
            bytes.extend_from_slice(&(record.len() as i32).to_le_bytes());
            for value in *record {
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn json_bare_and_keyed() {
        let parsed = parse_json(br#"[[1.0, 2.0], {"id": 40, "vector": [3.0, 4.0]}, [5, 6]]"#, 10)
            .unwrap();
        assert_eq!(
            parsed,
            vec![
                (10, vec![1.0, 2.0]),
                (40, vec![3.0, 4.0]),
                (12, vec![5.0, 6.0]),
            ]
        );
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(matches!(
            parse_json(br#"{"vectors": []}"#, 0),
            Err(DegError::Serialization(_))
        ));
    }

    #[test]
    fn fvecs_records() {
        let bytes = fvecs(&[&[1.0, 2.0, 3.0], &[-1.5, 0.0, 8.25]]);
        assert_eq!(
            parse_fvecs(&bytes, 5).unwrap(),
            vec![(5, vec![1.0, 2.0, 3.0]), (6, vec![-1.5, 0.0, 8.25])]
        );
        assert!(parse_fvecs(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn fvecs_truncated() {
        let mut bytes = fvecs(&[&[1.0, 2.0]]);
        bytes.pop();
        assert!(matches!(
            parse_fvecs(&bytes, 0),
            Err(DegError::Serialization(_))
        ));

        let bytes = fvecs(&[&[1.0]]);
        assert!(parse_fvecs(&bytes[..6], 0).is_err());
        assert!(parse_fvecs(&bytes[..2], 0).is_err());
    }

    #[test]
    fn fvecs_invalid_dimension() {
        let bytes = 0i32.to_le_bytes();
        assert!(matches!(
            parse_fvecs(&bytes, 0),
            Err(DegError::Serialization(_))
        ));
    }

    #[test]
    fn query_parsing() {
        assert_eq!(parse_query("1, 2.5,-3").unwrap(), vec![1.0, 2.5, -3.0]);
        assert!(parse_query("1,x").is_err());
        assert!(parse_query("").is_err());
    }

    #[test]
    fn read_missing_file() {
        assert!(matches!(
            read_vectors(Path::new("/nonexistent/vectors.json"), VectorFormat::Json, 0),
            Err(DegError::Io(_))
        ));
    }
}
