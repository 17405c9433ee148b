//! Corpus discovery: locate the directory holding every analysis subject and
//! enumerate its repositories.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::DiscoveryError;
use crate::model::Repository;

/// Default name of the corpus directory.
pub const DEFAULT_CORPUS_DIR: &str = "repositories";

/// `path` made absolute against the working directory.
///
/// External tools run from their own install directories, so every path
/// handed to them must not depend on the caller's working directory.
pub fn absolute_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Search `start` and each of its ancestors for a directory named `dir_name`.
pub fn find_corpus_dir(start: &Path, dir_name: &str) -> Result<PathBuf, DiscoveryError> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    for ancestor in start.ancestors() {
        let candidate = ancestor.join(dir_name);
        if candidate.is_dir() {
            debug!(corpus = %candidate.display(), "found corpus directory");
            return Ok(candidate);
        }
    }
    Err(DiscoveryError::NotFound {
        dir_name: dir_name.to_string(),
        start,
    })
}

/// Sorted names of the non-hidden immediate subdirectories of `corpus`.
pub fn list_repositories(corpus: &Path) -> Result<Vec<String>, DiscoveryError> {
    let read_err = |source| DiscoveryError::ReadError {
        path: corpus.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in std::fs::read_dir(corpus).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        // Follow symlinks so linked checkouts count as repositories.
        if entry.path().is_dir() {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Discovered corpus root plus its repositories in lexicographic order.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub root: PathBuf,
    pub repositories: Vec<Repository>,
}

impl Corpus {
    /// Find the corpus by ancestor search from `start`.
    pub fn discover(start: &Path, dir_name: &str) -> Result<Self, DiscoveryError> {
        let root = find_corpus_dir(start, dir_name)?;
        Self::open(root)
    }

    /// Use an explicitly given corpus root.
    pub fn open(root: PathBuf) -> Result<Self, DiscoveryError> {
        let root = absolute_path(&root);
        if !root.is_dir() {
            let dir_name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(DiscoveryError::NotFound {
                dir_name,
                start: root,
            });
        }
        let repositories = list_repositories(&root)?
            .into_iter()
            .map(|name| {
                let path = root.join(&name);
                Repository::new(name, path)
            })
            .collect();
        Ok(Self { root, repositories })
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_with(names: &[&str]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().expect("tempdir");
        let corpus = tmp.path().join(DEFAULT_CORPUS_DIR);
        for name in names {
            std::fs::create_dir_all(corpus.join(name)).expect("mkdir");
        }
        std::fs::create_dir_all(&corpus).expect("mkdir corpus");
        tmp
    }

    #[test]
    fn test_find_corpus_from_nested_start() {
        let tmp = corpus_with(&["alpha"]);
        let nested = tmp.path().join("tools").join("deep");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_corpus_dir(&nested, DEFAULT_CORPUS_DIR).expect("found");
        assert!(found.ends_with(DEFAULT_CORPUS_DIR));
    }

    #[test]
    fn test_find_corpus_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = find_corpus_dir(tmp.path(), "no-such-corpus-dir-xyz").unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { .. }));
    }

    #[test]
    fn test_list_sorted_and_hidden_excluded() {
        let tmp = corpus_with(&["zeta", "alpha", ".git", "mid"]);
        let corpus = tmp.path().join(DEFAULT_CORPUS_DIR);
        std::fs::write(corpus.join("README.md"), "not a repo").unwrap();

        let names = list_repositories(&corpus).expect("list");
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_list_missing_dir_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_repositories(&tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, DiscoveryError::ReadError { .. }));
    }

    #[test]
    fn test_corpus_open_builds_repository_paths() {
        let tmp = corpus_with(&["beta", "alpha"]);
        let corpus = Corpus::open(tmp.path().join(DEFAULT_CORPUS_DIR)).expect("open");
        let names: Vec<_> = corpus.repositories.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(corpus.repositories[0].path, corpus.root.join("alpha"));
    }

    #[test]
    fn test_corpus_open_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Corpus::open(tmp.path().join("repositories")).unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound { .. }));
    }

    #[test]
    fn test_absolute_path_anchors_relative_paths() {
        let rel = absolute_path(Path::new("out/smell_detected"));
        assert!(rel.is_absolute());
        assert!(rel.ends_with("out/smell_detected"));
        assert_eq!(absolute_path(Path::new("/srv/corpus")), PathBuf::from("/srv/corpus"));
    }
}
