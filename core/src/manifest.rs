use crate::{Result, WorkItem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Name of the manifest file written into the offsite output directory.
pub const MANIFEST_NAME: &str = "data.json";

/// Operation recorded for a logical filename in the offsite manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Modify,
    Remove,
}

/// One row of the offsite manifest: the logical view of what the hash-named
/// store objects represent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub filename: String,
    pub hash: String,
    pub operation: Operation,
}

impl ManifestEntry {
    /// Builds the manifest row for a work item. Add/Modify carry the source
    /// record's hash; Remove carries the last committed hash (may be empty
    /// when the committed snapshot held none).
    pub fn from_work_item(item: &WorkItem) -> Self {
        match item {
            WorkItem::Add { source, .. } => Self {
                filename: source.path.display().to_string(),
                hash: source.hash.clone().unwrap_or_default(),
                operation: Operation::Add,
            },
            WorkItem::Modify { source, .. } => Self {
                filename: source.path.display().to_string(),
                hash: source.hash.clone().unwrap_or_default(),
                operation: Operation::Modify,
            },
            WorkItem::Remove { dest } => Self {
                filename: dest.path.display().to_string(),
                hash: dest.hash.clone().unwrap_or_default(),
                operation: Operation::Remove,
            },
        }
    }
}

pub async fn write_manifest(dir: &Path, entries: &[ManifestEntry]) -> Result<()> {
    let data = serde_json::to_vec(entries)?;
    fs::write(dir.join(MANIFEST_NAME), data).await?;
    Ok(())
}

pub async fn load_manifest(dir: &Path) -> Result<Vec<ManifestEntry>> {
    let data = fs::read(dir.join(MANIFEST_NAME)).await?;
    Ok(serde_json::from_slice(&data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileRecord;
    use std::path::PathBuf;

    #[tokio::test]
    async fn manifest_round_trips_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            ManifestEntry {
                filename: "/src/a".to_string(),
                hash: "abc".to_string(),
                operation: Operation::Add,
            },
            ManifestEntry {
                filename: "/src/b".to_string(),
                hash: "def".to_string(),
                operation: Operation::Remove,
            },
        ];

        write_manifest(dir.path(), &entries).await.unwrap();

        // The on-disk operation tags are lowercase strings.
        let raw = fs::read_to_string(dir.path().join(MANIFEST_NAME)).await.unwrap();
        assert!(raw.contains(r#""operation":"add""#));
        assert!(raw.contains(r#""operation":"remove""#));

        let loaded = load_manifest(dir.path()).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].operation, Operation::Add);
    }

    #[test]
    fn remove_rows_come_from_the_destination_record() {
        let item = WorkItem::Remove {
            dest: FileRecord {
                path: PathBuf::from("/gone"),
                size: 1,
                mtime: 0.0,
                hash: Some("xyz".to_string()),
            },
        };

        let entry = ManifestEntry::from_work_item(&item);
        assert_eq!(entry.filename, "/gone");
        assert_eq!(entry.hash, "xyz");
        assert_eq!(entry.operation, Operation::Remove);
    }
}
