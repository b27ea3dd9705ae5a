use crate::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha224};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::io::AsyncReadExt;

/// Modification times within this many seconds are considered identical.
/// Filesystems round mtimes differently, so exact float equality is too strict.
pub const MTIME_EPSILON: f64 = 1e-5;

const HASH_READ_SIZE: usize = 8192;

/// How two file records are compared during a diff. Fixed once per run and
/// applied uniformly to both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Size and modification time only.
    SizeAndTime,
    /// Size, modification time, and content hash.
    Content,
}

impl CompareMode {
    pub fn needs_hash(&self) -> bool {
        matches!(self, CompareMode::Content)
    }
}

/// The fingerprint of one file at collection time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub mtime: f64,
    pub hash: Option<String>,
}

impl FileRecord {
    /// Stats `path` and, when `mode` compares content, streams it through
    /// SHA-224 in fixed-size reads. The hash is computed here once per run.
    pub async fn collect<P: AsRef<Path>>(path: P, mode: CompareMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;

        let mtime = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        let hash = if mode.needs_hash() {
            Some(hash_file(&path).await?)
        } else {
            None
        };

        Ok(Self {
            path,
            size: metadata.len(),
            mtime,
            hash,
        })
    }

    /// Equality contract: sizes match, mtimes agree within [`MTIME_EPSILON`],
    /// and hashes match when `mode` compares content.
    pub fn matches(&self, other: &FileRecord, mode: CompareMode) -> bool {
        self.size == other.size
            && (self.mtime - other.mtime).abs() <= MTIME_EPSILON
            && (!mode.needs_hash() || self.hash == other.hash)
    }
}

/// Streams a file through SHA-224 and returns the hex digest.
pub async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha224::new();
    let mut buffer = [0u8; HASH_READ_SIZE];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}
