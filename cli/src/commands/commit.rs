use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct CommitOffsiteCommand {
    #[arg(help = "Name used to uniquely identify the backup")]
    name: String,
}

impl CommitOffsiteCommand {
    /// Promotes pending data written by a previous offsite run. Useful when
    /// additional steps (for example, an upload) must succeed before the
    /// backup counts as official.
    pub async fn run(&self, cli: &crate::Cli) -> Result<()> {
        let store = super::snapshot_store(cli)?;
        store.commit(&self.name).await?;

        println!("The pending data has been committed.");
        Ok(())
    }
}
