#[tokio::main]
async fn main() -> std::io::Result<()> {
    spacehub::run_with_config().await
}
