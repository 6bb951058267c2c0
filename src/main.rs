use soulbrowser_cli::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run().await.map_err(Into::into)
}
