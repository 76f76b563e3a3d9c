use anyhow::Result;
use ucp_chat::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::run().await
}
