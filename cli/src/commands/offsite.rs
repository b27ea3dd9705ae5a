use anyhow::Result;
use clap::Args;
use offsync_core::collector::FilterSet;
use offsync_core::offsite::{OffsiteOptions, OffsitePipeline};
use offsync_core::ops::LocalOps;
use offsync_core::{pool, Outcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args)]
pub struct OffsiteCommand {
    #[arg(help = "Name used to uniquely identify the backup")]
    name: String,

    #[arg(help = "Output directory that will contain the staged content")]
    output_dir: PathBuf,

    #[arg(required = true, help = "Files or directories to parse for input")]
    inputs: Vec<PathBuf>,

    #[arg(long, help = "Ignore previously committed data when calculating work")]
    force: bool,

    #[arg(long, help = "Create symbolic links rather than copying files")]
    use_links: bool,

    #[arg(long, help = "Commit the pending data immediately")]
    auto_commit: bool,

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

impl OffsiteCommand {
    pub async fn run(&self, cli: &crate::Cli) -> Result<Outcome> {
        let filters = FilterSet::new(
            &self.include,
            &self.exclude,
            &self.traverse_include,
            &self.traverse_exclude,
        )?;

        let opts = OffsiteOptions {
            name: self.name.clone(),
            output_dir: self.output_dir.clone(),
            inputs: self.inputs.clone(),
            force: self.force,
            use_links: self.use_links,
            auto_commit: self.auto_commit,
            filters,
        };

        let store = super::snapshot_store(cli)?;
        let pipeline = OffsitePipeline::new(store, Arc::new(LocalOps), pool::default_workers());

        info!(name = %self.name, "starting offsite run");

        let pb = super::scan_spinner("Collecting and diffing...");
        let plan = pipeline.plan(&opts).await?;
        pb.finish_with_message(format!("Processed {} source files", plan.source.len()));

        println!("{}", plan.diff.stats);
        println!();

        if self.display_only {
            super::print_plan(&plan.diff, false);
            return Ok(Outcome::Completed(plan.diff.stats));
        }

        let outcome = pipeline.apply(&opts, plan).await?;

        match outcome {
            Outcome::NothingToDo => println!("No content to apply."),
            Outcome::Completed(_) if self.auto_commit => {
                println!("Content staged and committed for '{}'.", self.name);
            }
            Outcome::Completed(_) => {
                println!(
                    "Pending data has been written, but will not be considered official \
                     until it is committed via 'commit-offsite {}'.",
                    self.name
                );
            }
        }

        Ok(outcome)
    }
}
