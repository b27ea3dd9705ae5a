use crate::{CompareMode, FileRecord, PathMapper, Result, Snapshot};
use std::fmt;
use tracing::debug;

/// One unit of required change, produced only by [`diff`].
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// `source` has no counterpart at the destination.
    Add {
        source: FileRecord,
        dest_path: std::path::PathBuf,
    },
    /// `source` and `dest` exist but differ under the run's compare mode.
    Modify { source: FileRecord, dest: FileRecord },
    /// `dest` has no counterpart at the source.
    Remove { dest: FileRecord },
}

/// Aggregate classification counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub matched: usize,
}

impl DiffStats {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed + self.matched
    }

    fn percent(&self, count: usize) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64 * 100.0
        }
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "- {} to add ({:.2}%)", plural(self.added), self.percent(self.added))?;
        writeln!(
            f,
            "- {} to modify ({:.2}%)",
            plural(self.modified),
            self.percent(self.modified)
        )?;
        writeln!(
            f,
            "- {} to remove ({:.2}%)",
            plural(self.removed),
            self.percent(self.removed)
        )?;
        write!(f, "- {} matched ({:.2}%)", plural(self.matched), self.percent(self.matched))
    }
}

fn plural(count: usize) -> String {
    if count == 1 {
        "1 file".to_string()
    } else {
        format!("{count} files")
    }
}

/// Terminal result of a pipeline run. "Nothing to do" is distinguished from
/// success so callers can tell that no syncing was needed.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Completed(DiffStats),
    NothingToDo,
}

/// The full set of work items for one run plus the counts used for reporting.
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    pub items: Vec<WorkItem>,
    pub stats: DiffStats,
}

impl DiffResult {
    /// True when nothing needs syncing.
    pub fn is_noop(&self) -> bool {
        self.items.is_empty()
    }
}

/// Classifies every source record against `dest` in one two-sided pass over
/// path-keyed indices. Matches are counted but not retained as work items.
pub fn diff(
    source: &Snapshot,
    dest: &Snapshot,
    mapper: &PathMapper,
    mode: CompareMode,
) -> Result<DiffResult> {
    let source_index = source.by_path();
    let dest_index = dest.by_path();

    let mut items = Vec::new();
    let mut stats = DiffStats::default();

    for record in source.records() {
        let dest_path = mapper.to_dest(&record.path)?;

        match dest_index.get(dest_path.as_path()) {
            None => {
                debug!(path = %record.path.display(), "add: no destination record");
                items.push(WorkItem::Add {
                    source: record.clone(),
                    dest_path,
                });
                stats.added += 1;
            }
            Some(existing) if record.matches(existing, mode) => {
                stats.matched += 1;
            }
            Some(existing) => {
                debug!(path = %record.path.display(), "modify: destination differs");
                items.push(WorkItem::Modify {
                    source: record.clone(),
                    dest: (*existing).clone(),
                });
                stats.modified += 1;
            }
        }
    }

    for record in dest.records() {
        let source_path = mapper.from_dest(&record.path)?;

        if !source_index.contains_key(source_path.as_path()) {
            debug!(path = %record.path.display(), "remove: no source record");
            items.push(WorkItem::Remove {
                dest: record.clone(),
            });
            stats.removed += 1;
        }
    }

    Ok(DiffResult { items, stats })
}
