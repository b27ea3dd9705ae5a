use crate::collector::{self, FilterSet};
use crate::ops::FileOps;
use crate::{diff, pool, CompareMode, DiffResult, Outcome, PathMapper, Result, Snapshot, WorkItem};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::info;

/// Parameters for one mirror run.
pub struct MirrorOptions {
    pub destination: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub force: bool,
    pub simple_compare: bool,
    pub filters: FilterSet,
}

/// A mirror run's decisions: the classified work to apply.
pub struct MirrorPlan {
    pub diff: DiffResult,
}

/// Direct, non-versioned synchronization of a source set onto a destination
/// tree. No snapshot is persisted; the destination filesystem is the state,
/// so both sides are collected fresh each run.
pub struct MirrorPipeline {
    ops: Arc<dyn FileOps>,
    workers: usize,
}

impl MirrorPipeline {
    pub fn new(ops: Arc<dyn FileOps>, workers: usize) -> Self {
        Self { ops, workers }
    }

    /// Collects both sides under one compare mode and diffs them through the
    /// common-prefix mapper. Inputs and destination are normalized first so
    /// relative and `..`-laden paths map consistently. `force` (or a missing
    /// destination) skips the destination scan and treats it as empty.
    pub async fn plan(&self, opts: &MirrorOptions) -> Result<MirrorPlan> {
        let mode = if opts.simple_compare {
            CompareMode::SizeAndTime
        } else {
            CompareMode::Content
        };

        let destination = normalize(&opts.destination)?;
        let inputs = opts
            .inputs
            .iter()
            .map(|p| normalize(p))
            .collect::<Result<Vec<_>>>()?;

        let source = collector::collect(&inputs, &opts.filters, mode, self.workers).await?;
        info!(files = source.len(), "collected source records");

        let dest = if !opts.force && destination.is_dir() {
            let snapshot = collector::collect(
                &[destination.clone()],
                &FilterSet::none(),
                mode,
                self.workers,
            )
            .await?;
            info!(files = snapshot.len(), "collected destination records");
            snapshot
        } else {
            Snapshot::new()
        };

        let mapper = PathMapper::for_destination(source.records(), &destination)?;
        let diff = diff::diff(&source, &dest, &mapper, mode)?;

        Ok(MirrorPlan { diff })
    }

    /// Applies a plan: copies first, then removals, each strictly serialized
    /// to avoid destination-tree races between a removal and a copy into a
    /// just-created parent directory.
    pub async fn apply(&self, opts: &MirrorOptions, plan: MirrorPlan) -> Result<Outcome> {
        if plan.diff.is_noop() {
            info!("destination already matches the source");
            return Ok(Outcome::NothingToDo);
        }

        fs::create_dir_all(normalize(&opts.destination)?).await?;

        let mut copies: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut removals: Vec<PathBuf> = Vec::new();

        for item in &plan.diff.items {
            match item {
                WorkItem::Add { source, dest_path } => {
                    copies.push((source.path.clone(), dest_path.clone()));
                }
                WorkItem::Modify { source, dest } => {
                    copies.push((source.path.clone(), dest.path.clone()));
                }
                WorkItem::Remove { dest } => {
                    removals.push(dest.path.clone());
                }
            }
        }

        if !copies.is_empty() {
            info!(files = copies.len(), "copying");

            let ops = Arc::clone(&self.ops);
            let outcomes = pool::run_tasks(copies, 1, move |(src, dst)| {
                let ops = Arc::clone(&ops);
                async move { ops.copy_file(&src, &dst).await }
            })
            .await;

            pool::collect_results("copy", outcomes)?;
        }

        if !removals.is_empty() {
            info!(files = removals.len(), "removing");

            let ops = Arc::clone(&self.ops);
            let outcomes = pool::run_tasks(removals, 1, move |path| {
                let ops = Arc::clone(&ops);
                async move { ops.remove_file(&path).await }
            })
            .await;

            pool::collect_results("remove", outcomes)?;
        }

        Ok(Outcome::Completed(plan.diff.stats))
    }

    pub async fn run(&self, opts: &MirrorOptions) -> Result<Outcome> {
        let plan = self.plan(opts).await?;
        self.apply(opts, plan).await
    }
}

/// Lexically resolves a path to an absolute form with no `.` or `..`
/// components. Relative paths are taken against the current directory.
/// Purely textual, so it never touches the filesystem and works for
/// destinations that do not exist yet.
fn normalize(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    Ok(out)
}
