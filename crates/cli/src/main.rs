use anyhow::Context;
use clap::Parser;
use cosmos_probe::RunOptions;
use probe_kernel::{ExposeSecret, Settings};

/// Check that a Cosmos DB account is reachable with ambient AAD credentials.
#[derive(Parser, Debug)]
#[command(name = "cosmos-probe-cli", version, about)]
struct Args {
    /// Read the database and container from the service instead of only
    /// resolving handles
    #[arg(long)]
    validate: bool,

    /// Print the resolved settings (account key redacted) and exit
    #[arg(long)]
    show_config: bool,

    /// Log filter directive, e.g. "probe_db=debug" (overrides RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,

    /// Database to probe instead of the configured one
    #[arg(long)]
    database: Option<String>,

    /// Container to probe instead of the configured one
    #[arg(long)]
    container: Option<String>,
}

fn render_settings(settings: &Settings) -> String {
    let cosmos = &settings.cosmos;
    let key = if cosmos.key.expose_secret().is_empty() {
        "(unset)"
    } else {
        "***"
    };
    format!(
        "environment: {:?}\nendpoint: {}\nkey: {}\ndatabase: {}\ncontainer: {}\nlog_format: {:?}\nlog_filter: {}",
        settings.environment,
        cosmos.endpoint,
        key,
        cosmos.database,
        cosmos.container,
        settings.telemetry.log_format,
        settings.telemetry.filter,
    )
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load().with_context(|| "failed to load probe settings")?;
    if let Some(database) = args.database {
        settings.cosmos.database = database;
    }
    if let Some(container) = args.container {
        settings.cosmos.container = container;
    }

    probe_telemetry::init_with_filter(&settings.telemetry, args.log_filter.as_deref())?;

    if args.show_config {
        println!("{}", render_settings(&settings));
        return Ok(());
    }

    tracing::info!(env = ?settings.environment, "cosmos-probe-cli starting");

    let options = RunOptions {
        validate: args.validate,
    };
    let mut stdout = std::io::stdout();
    cosmos_probe::run(&settings, &options, &mut stdout).await?;

    Ok(())
}
