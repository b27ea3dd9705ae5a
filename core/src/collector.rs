use crate::pool;
use crate::{CompareMode, Error, FileRecord, Result, Snapshot};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// The four filter families applied while collecting: traversal filters match
/// directory names during the walk, file filters match the resulting
/// absolute paths.
#[derive(Debug, Default)]
pub struct FilterSet {
    includes: Vec<Regex>,
    excludes: Vec<Regex>,
    traverse_includes: Vec<Regex>,
    traverse_excludes: Vec<Regex>,
}

impl FilterSet {
    pub fn new(
        includes: &[String],
        excludes: &[String],
        traverse_includes: &[String],
        traverse_excludes: &[String],
    ) -> Result<Self> {
        Ok(Self {
            includes: compile(includes)?,
            excludes: compile(excludes)?,
            traverse_includes: compile(traverse_includes)?,
            traverse_excludes: compile(traverse_excludes)?,
        })
    }

    pub fn none() -> Self {
        Self::default()
    }

    fn accepts_dir(&self, name: &str) -> bool {
        if self.traverse_excludes.iter().any(|re| re.is_match(name)) {
            return false;
        }
        self.traverse_includes.is_empty()
            || self.traverse_includes.iter().any(|re| re.is_match(name))
    }

    fn accepts_file(&self, path: &str) -> bool {
        if self.excludes.iter().any(|re| re.is_match(path)) {
            return false;
        }
        self.includes.is_empty() || self.includes.iter().any(|re| re.is_match(path))
    }
}

// Patterns match from the start of the candidate (the absolute path for
// file filters, the directory name for traversal filters), not anywhere
// inside it.
fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("^(?:{p})")).map_err(|_| Error::InvalidPattern {
                pattern: p.clone(),
            })
        })
        .collect()
}

/// Enumerates `inputs` (files, or directories walked recursively under the
/// traversal filters), filters the surviving paths, and fingerprints each one
/// on the worker pool. Output order is insignificant; the snapshot is keyed
/// by path.
pub async fn collect(
    inputs: &[PathBuf],
    filters: &FilterSet,
    mode: CompareMode,
    workers: usize,
) -> Result<Snapshot> {
    let files = enumerate(inputs, filters)?;
    debug!(files = files.len(), "enumerated input files");

    let outcomes = pool::run_tasks(files, workers, move |path| async move {
        FileRecord::collect(&path, mode).await
    })
    .await;

    let records = pool::collect_results("fingerprint", outcomes)?;
    Ok(Snapshot::from_records(records))
}

fn enumerate(inputs: &[PathBuf], filters: &FilterSet) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_file() {
            files.push(input.clone());
        } else if input.is_dir() {
            walk_dir(input, filters, &mut files)?;
        } else {
            return Err(Error::InvalidInput {
                path: input.display().to_string(),
            });
        }
    }

    files.retain(|path| filters.accepts_file(&path.to_string_lossy()));
    Ok(files)
}

fn walk_dir(root: &Path, filters: &FilterSet, files: &mut Vec<PathBuf>) -> Result<()> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() || entry.path() == root {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            filters.accepts_dir(&name)
        });

    for entry in walker {
        let entry = entry.map_err(|e| {
            Error::Other(format!("failed to walk '{}': {e}", root.display()))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), b"alpha").await.unwrap();
        tokio::fs::write(dir.path().join("b.log"), b"beta").await.unwrap();
        tokio::fs::create_dir(dir.path().join("node_modules")).await.unwrap();
        tokio::fs::write(dir.path().join("node_modules/dep.js"), b"dep")
            .await
            .unwrap();
        tokio::fs::create_dir(dir.path().join("src")).await.unwrap();
        tokio::fs::write(dir.path().join("src/main.rs"), b"fn main() {}")
            .await
            .unwrap();
        dir
    }

    #[tokio::test]
    async fn collects_all_files_without_filters() {
        let dir = fixture().await;
        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &FilterSet::none(),
            CompareMode::SizeAndTime,
            2,
        )
        .await
        .unwrap();

        assert_eq!(snapshot.len(), 4);
        assert!(snapshot.records().iter().all(|r| r.hash.is_none()));
    }

    #[tokio::test]
    async fn traverse_exclude_prunes_directories() {
        let dir = fixture().await;
        let filters =
            FilterSet::new(&[], &[], &[], &["node_modules".to_string()]).unwrap();

        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &filters,
            CompareMode::SizeAndTime,
            2,
        )
        .await
        .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert!(!snapshot
            .records()
            .iter()
            .any(|r| r.path.to_string_lossy().contains("node_modules")));
    }

    #[tokio::test]
    async fn file_filters_apply_to_paths() {
        let dir = fixture().await;
        let filters = FilterSet::new(&[r".*\.txt$".to_string()], &[], &[], &[]).unwrap();

        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &filters,
            CompareMode::Content,
            2,
        )
        .await
        .unwrap();

        assert_eq!(snapshot.len(), 1);
        let record = &snapshot.records()[0];
        assert!(record.path.ends_with("a.txt"));
        assert!(record.hash.is_some());
    }

    #[tokio::test]
    async fn file_filters_match_from_the_path_start() {
        let dir = fixture().await;
        tokio::fs::create_dir(dir.path().join("docs")).await.unwrap();
        tokio::fs::write(dir.path().join("docs/readme.txt"), b"text")
            .await
            .unwrap();

        // A bare name does not match absolute paths: nothing is selected.
        let filters = FilterSet::new(&["docs".to_string()], &[], &[], &[]).unwrap();
        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &filters,
            CompareMode::SizeAndTime,
            2,
        )
        .await
        .unwrap();
        assert_eq!(snapshot.len(), 0);

        // The same name as an exclude removes nothing, either.
        let filters = FilterSet::new(&[], &["docs".to_string()], &[], &[]).unwrap();
        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &filters,
            CompareMode::SizeAndTime,
            2,
        )
        .await
        .unwrap();
        assert_eq!(snapshot.len(), 5);

        // Matching the full prefix selects the subtree.
        let pattern = format!("{}/docs/", dir.path().display());
        let filters = FilterSet::new(&[pattern], &[], &[], &[]).unwrap();
        let snapshot = collect(
            &[dir.path().to_path_buf()],
            &filters,
            CompareMode::SizeAndTime,
            2,
        )
        .await
        .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.records()[0].path.ends_with("docs/readme.txt"));
    }

    #[tokio::test]
    async fn single_file_input_is_accepted() {
        let dir = fixture().await;
        let file = dir.path().join("a.txt");

        let snapshot = collect(&[file], &FilterSet::none(), CompareMode::SizeAndTime, 1)
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn missing_input_is_invalid() {
        let result = collect(
            &[PathBuf::from("/no/such/path")],
            &FilterSet::none(),
            CompareMode::SizeAndTime,
            1,
        )
        .await;

        assert!(matches!(result, Err(Error::InvalidInput { .. })));
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let result = FilterSet::new(&["[unclosed".to_string()], &[], &[], &[]);
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }
}
