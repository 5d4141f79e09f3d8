//! Endpoint directory adapters
//!
//! The directory reports the current fleet membership. It is consulted once
//! per session, when profiling is switched on.

use crate::config::DirectoryConfig;
use async_trait::async_trait;
use shutter_shared::{Endpoint, ToggleError};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[async_trait]
pub trait EndpointDirectory: Send + Sync {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ToggleError>;
}

/// Build the directory described by the configuration.
pub fn from_config(config: &DirectoryConfig) -> Arc<dyn EndpointDirectory> {
    match config {
        DirectoryConfig::Static { endpoints } => Arc::new(StaticDirectory::new(endpoints.clone())),
        DirectoryConfig::File { path } => Arc::new(FileDirectory::new(path.clone())),
    }
}

/// Drop repeated endpoints, keeping first-seen order.
fn dedup(endpoints: impl IntoIterator<Item = Endpoint>) -> Vec<Endpoint> {
    let mut seen = HashSet::new();
    endpoints.into_iter().filter(|e| seen.insert(*e)).collect()
}

/// A fixed membership list.
#[derive(Debug, Clone)]
pub struct StaticDirectory {
    endpoints: Vec<Endpoint>,
}

impl StaticDirectory {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints: dedup(endpoints),
        }
    }
}

#[async_trait]
impl EndpointDirectory for StaticDirectory {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ToggleError> {
        Ok(self.endpoints.clone())
    }
}

/// Membership file with one `host:port` per line; `#` starts a comment.
/// The file is re-read on every query.
#[derive(Debug, Clone)]
pub struct FileDirectory {
    path: PathBuf,
}

impl FileDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Turn one membership entry into an endpoint.
///
/// Literal `ip:port` entries are taken as is; host names go through the
/// runtime's resolver so a slow lookup stays cancellable by the round deadline.
async fn resolve_entry(entry: &str) -> Result<Endpoint, String> {
    if let Ok(addr) = entry.parse::<SocketAddr>() {
        return Ok(Endpoint::new(addr));
    }
    tokio::net::lookup_host(entry)
        .await
        .map_err(|e| format!("invalid endpoint '{}': {}", entry, e))?
        .next()
        .map(Endpoint::new)
        .ok_or_else(|| format!("endpoint '{}' resolved to nothing", entry))
}

/// Parse membership file contents.
pub async fn parse_membership(contents: &str) -> Result<Vec<Endpoint>, ToggleError> {
    let mut endpoints = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let endpoint = resolve_entry(line)
            .await
            .map_err(|e| ToggleError::Directory(format!("line {}: {}", lineno + 1, e)))?;
        endpoints.push(endpoint);
    }
    Ok(dedup(endpoints))
}

#[async_trait]
impl EndpointDirectory for FileDirectory {
    async fn list_endpoints(&self) -> Result<Vec<Endpoint>, ToggleError> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ToggleError::Directory(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        parse_membership(&contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_parse_membership() {
        let contents = "\
# storage tier
10.0.0.1:4500
10.0.0.2:4500   # log server

10.0.0.1:4500
[::1]:4501
";
        let endpoints = parse_membership(contents).await.unwrap();
        let labels: Vec<String> = endpoints.iter().map(Endpoint::label).collect();
        assert_eq!(labels, vec!["10.0.0.1.4500", "10.0.0.2.4500", "::1.4501"]);
    }

    #[tokio::test]
    async fn test_parse_membership_reports_line() {
        let err = parse_membership("10.0.0.1:4500\nbogus\n").await.unwrap_err();
        assert!(err.to_string().contains("line 2"), "{}", err);
    }

    #[tokio::test]
    async fn test_host_names_resolve_asynchronously() {
        let endpoints = parse_membership("localhost:4500\n").await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].addr().port(), 4500);
        assert!(endpoints[0].addr().ip().is_loopback());
    }

    #[tokio::test]
    async fn test_file_directory_reflects_current_contents() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "10.0.0.1:4500").unwrap();
        file.flush().unwrap();

        let directory = FileDirectory::new(file.path());
        assert_eq!(directory.list_endpoints().await.unwrap().len(), 1);

        writeln!(file, "10.0.0.2:4500").unwrap();
        file.flush().unwrap();
        assert_eq!(directory.list_endpoints().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_directory_error() {
        let directory = FileDirectory::new("/nonexistent/shutter/members");
        let err = directory.list_endpoints().await.unwrap_err();
        assert!(matches!(err, ToggleError::Directory(_)));
    }

    #[tokio::test]
    async fn test_static_directory_dedups() {
        let ep: Endpoint = "10.0.0.1:4500".parse().unwrap();
        let directory = StaticDirectory::new(vec![ep, ep]);
        assert_eq!(directory.list_endpoints().await.unwrap(), vec![ep]);
    }
}
