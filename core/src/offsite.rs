use crate::collector::{self, FilterSet};
use crate::manifest::{self, ManifestEntry};
use crate::ops::FileOps;
use crate::{
    diff, pool, CompareMode, DiffResult, Error, Outcome, PathMapper, Result, Snapshot,
    SnapshotStore, WorkItem,
};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

/// Parameters for one offsite run.
pub struct OffsiteOptions {
    pub name: String,
    pub output_dir: PathBuf,
    pub inputs: Vec<PathBuf>,
    pub force: bool,
    pub use_links: bool,
    pub auto_commit: bool,
    pub filters: FilterSet,
}

/// Everything an offsite run decided before mutating anything: the fresh
/// source snapshot, its diff against the committed state, and the hashes the
/// committed state already holds.
pub struct OffsitePlan {
    pub source: Snapshot,
    pub diff: DiffResult,
    committed_hashes: HashSet<String>,
}

/// Content-addressed backup with a two-phase commit: `apply` stages new
/// store objects and writes the pending snapshot; `commit` promotes pending
/// to committed. An external upload/verification step can run between the
/// two without the recorded state diverging from what was transferred.
pub struct OffsitePipeline {
    store: SnapshotStore,
    ops: Arc<dyn FileOps>,
    workers: usize,
}

impl OffsitePipeline {
    pub fn new(store: SnapshotStore, ops: Arc<dyn FileOps>, workers: usize) -> Self {
        Self {
            store,
            ops,
            workers,
        }
    }

    /// Collects the source set (content mode), loads the committed snapshot,
    /// and diffs the two. A corrupt committed snapshot is downgraded to a
    /// warning and treated as empty; the run then redoes the full transfer.
    pub async fn plan(&self, opts: &OffsiteOptions) -> Result<OffsitePlan> {
        let source =
            collector::collect(&opts.inputs, &opts.filters, CompareMode::Content, self.workers)
                .await?;
        info!(files = source.len(), "collected source records");

        let committed = if opts.force {
            Snapshot::new()
        } else {
            match self.store.load(&opts.name).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => Snapshot::new(),
                Err(Error::CorruptSnapshot { path }) => {
                    warn!(
                        path = %path,
                        "previously saved data appears to be corrupt and will not be used"
                    );
                    Snapshot::new()
                }
                Err(e) => return Err(e),
            }
        };

        let committed_hashes = committed.hashes().map(String::from).collect();
        let diff = diff::diff(&source, &committed, &PathMapper::identity(), CompareMode::Content)?;

        Ok(OffsitePlan {
            source,
            diff,
            committed_hashes,
        })
    }

    /// Applies a plan: rebuilds the output directory with one object per
    /// content hash not already committed, writes the manifest, and persists
    /// the source snapshot as pending. The committed snapshot is untouched
    /// unless `auto_commit` is set.
    pub async fn apply(&self, opts: &OffsiteOptions, plan: OffsitePlan) -> Result<Outcome> {
        if plan.diff.is_noop() {
            info!("no content to apply");
            return Ok(Outcome::NothingToDo);
        }

        let entries: Vec<ManifestEntry> = plan
            .diff
            .items
            .iter()
            .map(ManifestEntry::from_work_item)
            .collect();

        // One store object per unique content hash; paths whose content is
        // already committed only appear in the manifest.
        let mut known = plan.committed_hashes;
        let mut transfers: Vec<(PathBuf, PathBuf)> = Vec::new();

        for item in &plan.diff.items {
            let source = match item {
                WorkItem::Add { source, .. } | WorkItem::Modify { source, .. } => source,
                WorkItem::Remove { .. } => continue,
            };
            let hash = source.hash.as_ref().ok_or_else(|| {
                Error::Other(format!("missing content hash for '{}'", source.path.display()))
            })?;

            if known.insert(hash.clone()) {
                transfers.push((source.path.clone(), opts.output_dir.join(hash)));
            }
        }

        // Full content-store rebuild per run: the output directory holds only
        // this run's staging objects.
        if opts.output_dir.exists() {
            fs::remove_dir_all(&opts.output_dir).await?;
        }
        fs::create_dir_all(&opts.output_dir).await?;

        if !transfers.is_empty() {
            info!(objects = transfers.len(), "writing content store");

            let ops = Arc::clone(&self.ops);
            let use_links = opts.use_links;
            let outcomes = pool::run_tasks(transfers, self.workers, move |(src, dst)| {
                let ops = Arc::clone(&ops);
                async move {
                    if use_links {
                        ops.create_link(&dst, &src).await
                    } else {
                        ops.copy_file(&src, &dst).await
                    }
                }
            })
            .await;

            pool::collect_results("store write", outcomes)?;
        }

        manifest::write_manifest(&opts.output_dir, &entries).await?;

        self.store.save_pending(&opts.name, &plan.source).await?;
        info!(name = %opts.name, "pending snapshot written");

        if opts.auto_commit {
            self.commit(&opts.name).await?;
        }

        Ok(Outcome::Completed(plan.diff.stats))
    }

    pub async fn run(&self, opts: &OffsiteOptions) -> Result<Outcome> {
        let plan = self.plan(opts).await?;
        self.apply(opts, plan).await
    }

    /// Promotes the pending snapshot for `name` to committed. Fails with
    /// [`Error::NoPendingData`] when no run has staged anything.
    pub async fn commit(&self, name: &str) -> Result<()> {
        self.store.commit(name).await?;
        info!(name = %name, "pending data committed");
        Ok(())
    }
}
