use anyhow::Result;
use localai::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
