use anyhow::Result;
use clap::Args;
use offsync_core::collector::FilterSet;
use offsync_core::mirror::{MirrorOptions, MirrorPipeline};
use offsync_core::ops::LocalOps;
use offsync_core::{pool, Outcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct MirrorCommand {
    #[arg(help = "Destination directory")]
    destination: PathBuf,

    #[arg(required = true, help = "Files or directories to parse for input")]
    inputs: Vec<PathBuf>,

    #[arg(long, help = "Ignore the destination's contents when calculating work")]
    force: bool,

    #[arg(
        long,
        help = "Compare via file size and modified date rather than with a hash. \
                Faster, but more error prone when detecting changes"
    )]
    simple_compare: bool,

    #[arg(long, help = "Regular expressions selecting filenames to include")]
    include: Vec<String>,

    #[arg(long, help = "Regular expressions selecting filenames to exclude")]
    exclude: Vec<String>,

    #[arg(long, help = "Regular expressions selecting directory names to traverse")]
    traverse_include: Vec<String>,

    #[arg(long, help = "Regular expressions selecting directory names to skip")]
    traverse_exclude: Vec<String>,

    #[arg(long, help = "Display the operations without performing them")]
    display_only: bool,
}

impl MirrorCommand {
    pub async fn run(&self, _cli: &crate::Cli) -> Result<Outcome> {
        let filters = FilterSet::new(
            &self.include,
            &self.exclude,
            &self.traverse_include,
            &self.traverse_exclude,
        )?;

        let opts = MirrorOptions {
            destination: self.destination.clone(),
            inputs: self.inputs.clone(),
            force: self.force,
            simple_compare: self.simple_compare,
            filters,
        };

        let pipeline = MirrorPipeline::new(Arc::new(LocalOps), pool::default_workers());

        info!(destination = %self.destination.display(), "starting mirror run");

        let pb = super::scan_spinner("Collecting and diffing...");
        let plan = pipeline.plan(&opts).await?;
        pb.finish_with_message(format!(
            "{} operations calculated",
            plan.diff.items.len()
        ));

        println!("{}", plan.diff.stats);
        println!();

        if self.display_only {
            super::print_plan(&plan.diff, true);
            return Ok(Outcome::Completed(plan.diff.stats));
        }

        let outcome = pipeline.apply(&opts, plan).await?;

        if matches!(outcome, Outcome::NothingToDo) {
            println!("The destination already matches the source; nothing to do.");
        }

        Ok(outcome)
    }
}
