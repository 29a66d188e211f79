use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    kb_cli::main_entry().await
}
