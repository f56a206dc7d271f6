//! Build manifest for the CLI.
//!
//! An `althtml.toml` lists header sources (compiled first, for their
//! bindings) and the src/dst pairs to build:
//!
//! ```text
//! headers = ["common.alt"]
//!
//! [[build]]
//! src = "index.alt"
//! dst = "index.html"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Sources whose bindings are shared by every build, in order.
    #[serde(default)]
    pub headers: Vec<PathBuf>,
    #[serde(default)]
    pub build: Vec<BuildPair>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildPair {
    pub src: PathBuf,
    pub dst: PathBuf,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Every file whose change should trigger a rebuild.
    pub fn inputs(&self) -> Vec<PathBuf> {
        self.headers
            .iter()
            .cloned()
            .chain(self.build.iter().map(|pair| pair.src.clone()))
            .collect()
    }
}
