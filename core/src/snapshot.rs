use crate::{Error, FileRecord, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The full set of file fingerprints for one side of a sync at a point in
/// time. Records are unique by path; a path index keeps insertion O(1)
/// across large collections.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    records: Vec<FileRecord>,
    index: HashMap<PathBuf, usize>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<FileRecord>) -> Self {
        let mut snapshot = Self::new();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Inserts a record, replacing any existing record with the same path.
    pub fn insert(&mut self, record: FileRecord) {
        match self.index.get(&record.path) {
            Some(&slot) => self.records[slot] = record,
            None => {
                self.index.insert(record.path.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Path-keyed index for the diff pass.
    pub fn by_path(&self) -> HashMap<&Path, &FileRecord> {
        self.records
            .iter()
            .map(|r| (r.path.as_path(), r))
            .collect()
    }

    /// All content hashes known to this snapshot.
    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.records.iter().filter_map(|r| r.hash.as_deref())
    }
}

// The persisted form is the record list alone; the index is rebuilt on load.
impl Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.records.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let records = Vec::<FileRecord>::deserialize(deserializer)?;
        Ok(Snapshot::from_records(records))
    }
}

/// Persists snapshots per backup name with a two-phase layout:
/// `<name>.backup` is the committed state, `<name>.backup.pending` is the
/// in-flight state written by a run and promoted only by [`commit`].
///
/// [`commit`]: SnapshotStore::commit
pub struct SnapshotStore {
    data_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn committed_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.backup"))
    }

    pub fn pending_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.backup.pending"))
    }

    /// Loads the committed snapshot. `Ok(None)` when no snapshot has been
    /// committed; `Err(CorruptSnapshot)` when one exists but cannot be
    /// decoded. The caller decides whether corruption is recoverable.
    pub async fn load(&self, name: &str) -> Result<Option<Snapshot>> {
        let path = self.committed_path(name);

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|_| Error::CorruptSnapshot {
                path: path.display().to_string(),
            })
    }

    /// Writes `snapshot` as the pending state for `name`. The committed
    /// snapshot is not touched.
    pub async fn save_pending(&self, name: &str, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.data_dir).await?;

        let data = serde_json::to_vec(snapshot)?;
        fs::write(self.pending_path(name), data).await?;
        Ok(())
    }

    pub async fn has_pending(&self, name: &str) -> bool {
        self.pending_path(name).exists()
    }

    /// Promotes the pending snapshot to committed by removing the old
    /// committed file and renaming pending over it. The rename makes the
    /// promotion atomic from a reader's perspective.
    pub async fn commit(&self, name: &str) -> Result<()> {
        let pending = self.pending_path(name);

        if !pending.exists() {
            return Err(Error::NoPendingData {
                name: name.to_string(),
            });
        }

        let committed = self.committed_path(name);
        if committed.exists() {
            fs::remove_file(&committed).await?;
        }

        fs::rename(&pending, &committed).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompareMode;

    fn record(path: &str, size: u64) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            mtime: 1000.0,
            hash: None,
        }
    }

    #[test]
    fn insert_replaces_same_path() {
        let mut snapshot = Snapshot::new();
        snapshot.insert(record("/a/one", 10));
        snapshot.insert(record("/a/one", 20));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records()[0].size, 20);
    }

    #[test]
    fn index_survives_replacements_across_many_records() {
        let records: Vec<FileRecord> = (0..1000)
            .map(|i| record(&format!("/a/{}", i % 500), i))
            .collect();
        let snapshot = Snapshot::from_records(records);

        // 500 unique paths; later inserts replaced the earlier ones in place.
        assert_eq!(snapshot.len(), 500);
        let index = snapshot.by_path();
        assert_eq!(index.len(), 500);
        assert_eq!(index[Path::new("/a/0")].size, 500);
        assert_eq!(index[Path::new("/a/499")].size, 999);
    }

    #[test]
    fn deserialization_restores_path_uniqueness() {
        // Persisted form is the bare record list; duplicates collapse on load.
        let blob = serde_json::to_vec(&vec![record("/a/one", 10), record("/a/one", 20)])
            .unwrap();
        let snapshot: Snapshot = serde_json::from_slice(&blob).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records()[0].size, 20);
    }

    #[tokio::test]
    async fn load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert!(store.load("b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn commit_promotes_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let snapshot = Snapshot::from_records(vec![record("/a/one", 10)]);
        store.save_pending("b1", &snapshot).await.unwrap();

        // Pending data is not visible until committed.
        assert!(store.load("b1").await.unwrap().is_none());
        assert!(store.has_pending("b1").await);

        store.commit("b1").await.unwrap();

        let loaded = store.load("b1").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(!store.has_pending("b1").await);
    }

    #[tokio::test]
    async fn commit_without_pending_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        match store.commit("b1").await {
            Err(Error::NoPendingData { name }) => assert_eq!(name, "b1"),
            other => panic!("expected NoPendingData, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        fs::write(store.committed_path("b1"), b"not json")
            .await
            .unwrap();

        assert!(matches!(
            store.load("b1").await,
            Err(Error::CorruptSnapshot { .. })
        ));
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut original = Snapshot::new();
        original.insert(FileRecord {
            path: PathBuf::from("/a/one"),
            size: 42,
            mtime: 1234.5,
            hash: Some("deadbeef".to_string()),
        });

        store.save_pending("b1", &original).await.unwrap();
        store.commit("b1").await.unwrap();

        let loaded = store.load("b1").await.unwrap().unwrap();
        assert!(loaded.records()[0].matches(&original.records()[0], CompareMode::Content));
    }
}
