//! Explicit-key artifact cache.
//!
//! Intermediate stage outputs are memoized on disk so an interrupted run
//! resumes where it stopped. Artifacts are addressed by a structured key
//! rather than caller-formatted filename strings, so two call sites can
//! never disagree about where an artifact lives.

use crate::types::{SurgeError, SurgeResult};
use std::path::{Path, PathBuf};

/// Key identifying one cached artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey<'a> {
    /// Pipeline stage that produced the artifact, e.g. "hydro-year"
    pub stage: &'a str,
    pub glacier: Option<&'a str>,
    pub year: Option<i32>,
    /// Free-form parameter discriminator, e.g. the data product name
    pub params: Option<&'a str>,
}

impl<'a> CacheKey<'a> {
    pub fn stage(stage: &'a str) -> Self {
        Self {
            stage,
            glacier: None,
            year: None,
            params: None,
        }
    }

    pub fn with_glacier(mut self, glacier: &'a str) -> Self {
        self.glacier = Some(glacier);
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_params(mut self, params: &'a str) -> Self {
        self.params = Some(params);
        self
    }

    fn file_name(&self) -> String {
        let mut name = sanitize(self.stage);
        if let Some(glacier) = self.glacier {
            name.push('-');
            name.push_str(&sanitize(glacier));
        }
        if let Some(year) = self.year {
            name.push('-');
            name.push_str(&year.to_string());
        }
        if let Some(params) = self.params {
            name.push('-');
            name.push_str(&sanitize(params));
        }
        name.push_str(".csv");
        name
    }
}

/// Keys become file names; strip anything the filesystem may object to.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Disk-backed cache of intermediate pipeline artifacts.
///
/// Single-writer by design: concurrent runs against the same root would
/// race on the existence checks, and partially written artifacts from an
/// interrupted run are not detected.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> SurgeResult<Self> {
        std::fs::create_dir_all(root.as_ref()).map_err(SurgeError::Io)?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    /// Deterministic path of the artifact for `key`.
    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Path of the artifact if it has already been produced.
    pub fn lookup(&self, key: &CacheKey) -> Option<PathBuf> {
        let path = self.path(key);
        if path.is_file() {
            log::debug!("cache hit: {}", path.display());
            Some(path)
        } else {
            None
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_paths_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();
        let key = CacheKey::stage("dh")
            .with_glacier("G016964E77694N")
            .with_year(2021)
            .with_params("atl08");

        let a = cache.path(&key);
        let b = cache.path(&key);
        assert_eq!(a, b);
        assert!(a.ends_with("dh-G016964E77694N-2021-atl08.csv"));
    }

    #[test]
    fn test_sanitize_strips_path_separators() {
        let key = CacheKey::stage("subset").with_glacier("weird/name with spaces");
        assert_eq!(key.file_name(), "subset-weird_name_with_spaces.csv");
    }

    #[test]
    fn test_lookup_misses_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ArtifactCache::new(dir.path()).unwrap();
        let key = CacheKey::stage("nothing-here").with_year(1999);
        assert!(cache.lookup(&key).is_none());
    }
}
