use anyhow::Context;
use labbox::cli::{self, Args, Commands, ConfigDiscovery, RunArgs, RunConfig};
use labbox::engine;
use labbox::report::Presenter;
use labbox::sandbox::Supervisor;
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli::log_filter(args.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let result = match args.command {
        Commands::Run(run_args) => run(run_args).await,
        Commands::ShowConfig => {
            ConfigDiscovery::show_discovery_info();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let settings = ConfigDiscovery::load(args.config.as_deref())?;
    let config = RunConfig::resolve(settings, &args)?;

    info!(
        "Running {} submission(s) in {} (timeout {}s, isolation {})",
        config.submissions.len(),
        config.launch.image,
        config.supervisor.timeout.as_secs(),
        if config.launch.isolation.is_some() { "on" } else { "off" }
    );

    let engine = engine::connect(config.engine.backend, &config.engine.executable)
        .await
        .context("Failed to open container engine")?;

    let supervisor = Supervisor::new(engine, config.launch, config.supervisor)?;
    let results = supervisor
        .run(&config.submissions)
        .await
        .context("Run aborted")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    Presenter::new(config.format)
        .render(&results, &mut out)
        .context("Failed to write report")?;
    out.flush()?;

    Ok(())
}
