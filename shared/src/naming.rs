//! Profile artifact naming
//!
//! Every participant writes its profile to a file named after its own
//! address, so concurrent sessions on different processes never collide.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::types::endpoint::Endpoint;

/// Fixed suffix of every profile artifact.
pub const ARTIFACT_SUFFIX: &str = "prof";

/// `<ip>.<port>.prof`
pub fn artifact_name(addr: SocketAddr) -> String {
    format!("{}.{}", Endpoint::new(addr).label(), ARTIFACT_SUFFIX)
}

/// Resolves artifact paths, optionally under a common output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactNaming {
    output_dir: Option<PathBuf>,
}

impl ArtifactNaming {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn path_for(&self, addr: SocketAddr) -> String {
        let name = artifact_name(addr);
        match &self.output_dir {
            Some(dir) => dir.join(name).to_string_lossy().into_owned(),
            None => name,
        }
    }

    pub fn path_for_endpoint(&self, endpoint: &Endpoint) -> String {
        self.path_for(endpoint.addr())
    }
}
