//! Hashing utilities.
//!
//! - `ObjectHash`: a truncated 20-character hash identifying a serialized value
//! - `ContentHash`: a full 64-character hash of an artifact on disk
//! - `hash_artifact()`: hashes a jar file or an exploded class directory

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use walkdir::WalkDir;

use crate::consts::OBJ_HASH_PREFIX_LEN;

pub type HashError = serde_json::Error;

/// A content-addressed hash identifying a unique serialized value.
///
/// The hash is a 20-character truncated SHA-256 of the JSON serialization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectHash(pub String);

impl std::fmt::Display for ObjectHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

pub trait Hashable: Serialize {
  fn compute_hash(&self) -> Result<ObjectHash, HashError> {
    let serialized = serde_json::to_string(self)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    let full = format!("{:x}", hasher.finalize());
    Ok(ObjectHash(full[..OBJ_HASH_PREFIX_LEN].to_string()))
  }
}

/// A full 64-character SHA-256 of an artifact's contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

#[derive(Debug, Error)]
pub enum ArtifactHashError {
  #[error("artifact not found: {}", .0.display())]
  Missing(PathBuf),

  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to walk {}: {message}", .path.display())]
  Walk { path: PathBuf, message: String },
}

/// Hash an artifact, which may be a single jar or an exploded directory.
pub fn hash_artifact(path: &Path) -> Result<ContentHash, ArtifactHashError> {
  if !path.exists() {
    return Err(ArtifactHashError::Missing(path.to_path_buf()));
  }
  if path.is_dir() {
    hash_directory(path)
  } else {
    hash_file(path)
  }
}

/// Compute a deterministic hash of a directory's file contents and layout.
///
/// Entries are visited in file-name order; timestamps and permissions are
/// ignored.
pub fn hash_directory(path: &Path) -> Result<ContentHash, ArtifactHashError> {
  let mut hasher = Sha256::new();

  for entry in WalkDir::new(path).sort_by_file_name() {
    let entry = entry.map_err(|e| ArtifactHashError::Walk {
      path: path.to_path_buf(),
      message: e.to_string(),
    })?;

    let rel_path = entry.path().strip_prefix(path).unwrap_or(entry.path());
    if rel_path.as_os_str().is_empty() {
      continue;
    }
    let rel = rel_path.to_string_lossy();

    if entry.file_type().is_file() {
      let content = hash_file(entry.path())?;
      hasher.update(format!("F:{}:{}\n", rel, content.0).as_bytes());
    } else if entry.file_type().is_dir() {
      hasher.update(format!("D:{}\n", rel).as_bytes());
    }
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}

/// Hash a file's contents.
pub fn hash_file(path: &Path) -> Result<ContentHash, ArtifactHashError> {
  let read_err = |source| ArtifactHashError::Read {
    path: path.to_path_buf(),
    source,
  };

  let mut file = fs::File::open(path).map_err(read_err)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer).map_err(read_err)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(format!("{:x}", hasher.finalize())))
}
