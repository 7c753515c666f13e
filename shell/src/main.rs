use shell::config::ShellConfig;
use shell::runtime::ShellRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Starting Gurasu app host runtime");

    let config = ShellConfig::from_env()?;
    let runtime = ShellRuntime::start(config).await?;

    tracing::info!("Shell runtime up; Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown();
    Ok(())
}
