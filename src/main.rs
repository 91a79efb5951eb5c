use anyhow::Context;
use cosmos_probe::RunOptions;
use probe_kernel::Settings;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load probe settings")?;
    probe_telemetry::init(&settings.telemetry)?;

    tracing::info!(env = ?settings.environment, "cosmos-probe starting");

    let mut stdout = std::io::stdout();
    cosmos_probe::run(&settings, &RunOptions::default(), &mut stdout).await?;

    Ok(())
}
