pub mod commit;
pub mod mirror;
pub mod offsite;

use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use offsync_core::{DiffResult, SnapshotStore, WorkItem};
use std::path::PathBuf;

/// Resolves the directory holding persisted snapshots: `--data-dir` /
/// `OFFSYNC_DATA_DIR`, or the platform data directory.
pub fn snapshot_store(cli: &crate::Cli) -> Result<SnapshotStore> {
    let dir = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => directories::ProjectDirs::from("", "", "offsync")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| anyhow!("Unable to determine a data directory (set --data-dir)"))?,
    };
    Ok(SnapshotStore::new(dir))
}

pub fn scan_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb
}

/// Prints the operations a run would take, grouped by classification. Used
/// by `--display-only`; mirror runs show the destination for each copy.
pub fn print_plan(diff: &DiffResult, show_dest: bool) {
    let mut added: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut modified: Vec<(PathBuf, PathBuf)> = Vec::new();
    let mut removed: Vec<PathBuf> = Vec::new();

    for item in &diff.items {
        match item {
            WorkItem::Add { source, dest_path } => {
                added.push((source.path.clone(), dest_path.clone()));
            }
            WorkItem::Modify { source, dest } => {
                modified.push((source.path.clone(), dest.path.clone()));
            }
            WorkItem::Remove { dest } => removed.push(dest.path.clone()),
        }
    }

    print_group("Files to Add", &added, show_dest);
    print_group("Files to Modify", &modified, show_dest);

    let header = format!("Files to Remove ({})", removed.len());
    println!("{header}");
    println!("{}", "-".repeat(header.len()));
    for path in &removed {
        println!("    {}", path.display());
    }
    println!();
}

fn print_group(label: &str, entries: &[(PathBuf, PathBuf)], show_dest: bool) {
    let header = format!("{label} ({})", entries.len());
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for (source, dest) in entries {
        if show_dest {
            println!("    {:<100} -> {}", source.display(), dest.display());
        } else {
            println!("    {}", source.display());
        }
    }
    println!();
}
