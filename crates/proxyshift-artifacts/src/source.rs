use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use proxyshift_core::ArtifactError;
use tracing::{debug, warn};

use crate::Artifact;

/// Compiler collaborator: hands out compiled artifacts by contract name.
pub trait ArtifactSource {
    fn artifact(&self, name: &str) -> Result<Artifact, ArtifactError>;
}

impl ArtifactSource for BTreeMap<String, Artifact> {
    fn artifact(&self, name: &str) -> Result<Artifact, ArtifactError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))
    }
}

/// Artifacts laid out by the compiler as `<root>/**/<ContractName>.json`.
#[derive(Debug, Clone)]
pub struct ArtifactDirectory {
    root: PathBuf,
    index: BTreeMap<String, PathBuf>,
}

impl ArtifactDirectory {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        let mut index = BTreeMap::new();
        index_dir(&root, &mut index)?;
        debug!(root = %root.display(), artifacts = index.len(), "indexed artifacts");
        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl ArtifactSource for ArtifactDirectory {
    fn artifact(&self, name: &str) -> Result<Artifact, ArtifactError> {
        let path = self
            .index
            .get(name)
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))?;
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;
        Artifact::from_json_str(&raw).map_err(|err| match err {
            ArtifactError::Parse { message, .. } => ArtifactError::Parse {
                name: format!("{name} ({})", path.display()),
                message,
            },
            other => other,
        })
    }
}

fn index_dir(dir: &Path, index: &mut BTreeMap<String, PathBuf>) -> Result<(), ArtifactError> {
    let entries = fs::read_dir(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        paths.push(entry.path());
    }
    paths.sort();

    for path in paths {
        if path.is_dir() {
            index_dir(&path, index)?;
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|value| value.to_str()) else {
            continue;
        };
        if !file_name.ends_with(".json") || file_name.ends_with(".dbg.json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|value| value.to_str()) else {
            continue;
        };

        if let Some(existing) = index.get(stem) {
            warn!(
                name = stem,
                kept = %existing.display(),
                ignored = %path.display(),
                "duplicate artifact name"
            );
            continue;
        }
        index.insert(stem.to_string(), path.clone());
    }

    Ok(())
}
