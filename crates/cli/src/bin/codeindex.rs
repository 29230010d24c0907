use anyhow::Result;
use clap::Parser;
use codeindex_cli::{init_logging, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let output = cli.run().await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
