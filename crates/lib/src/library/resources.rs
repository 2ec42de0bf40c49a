//! Resource validation, run before any rule of a library is built.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::target::Target;

#[derive(Debug, Error)]
pub enum ResourceError {
  #[error("{target}: resource {} does not exist", .path.display())]
  Missing { target: Target, path: PathBuf },

  #[error("{target}: resource {} is not under resources root {}", .path.display(), .root.display())]
  OutsideRoot {
    target: Target,
    path: PathBuf,
    root: PathBuf,
  },
}

pub trait ResourceValidator {
  fn validate(&self, target: &Target, resources: &BTreeSet<PathBuf>, root: Option<&Path>) -> Result<(), ResourceError>;
}

/// Checks resources against the filesystem, relative to a project root.
#[derive(Debug, Clone)]
pub struct FsResourceValidator {
  project_root: PathBuf,
}

impl FsResourceValidator {
  pub fn new(project_root: impl Into<PathBuf>) -> Self {
    Self {
      project_root: project_root.into(),
    }
  }
}

impl ResourceValidator for FsResourceValidator {
  fn validate(&self, target: &Target, resources: &BTreeSet<PathBuf>, root: Option<&Path>) -> Result<(), ResourceError> {
    for resource in resources {
      if root.is_some_and(|root| !resource.starts_with(root)) {
        return Err(ResourceError::OutsideRoot {
          target: target.clone(),
          path: resource.clone(),
          root: root.map(Path::to_path_buf).unwrap_or_default(),
        });
      }

      if !self.project_root.join(resource).exists() {
        return Err(ResourceError::Missing {
          target: target.clone(),
          path: resource.clone(),
        });
      }
    }
    Ok(())
  }
}
