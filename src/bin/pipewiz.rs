use clap::Parser;
use pipewiz::config::WizardConfig;
use pipewiz::error::{Result, WizardError};
use pipewiz::pipeline::Pipeline;
use pipewiz::preflight;
use pipewiz::render::{Renderer, Restorer, TerminalGuard};
use pipewiz::service::create_service;
use pipewiz::steps;
use std::io::stdout;
use std::panic;
use std::process::ExitCode;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "pipewiz")]
#[command(author, version, about = "Stepwise build wizard with live terminal progress")]
struct Args {
    /// Path to wizard config file (default: /etc/pipewiz/wizard.toml)
    #[arg(long)]
    config: Option<String>,

    /// Log commands and downloads without running them
    #[arg(long)]
    dryrun: bool,

    /// Disable a phase by name (repeatable)
    #[arg(long = "skip", value_name = "PHASE")]
    skip: Vec<String>,

    /// Log file path (logging disabled if not specified)
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Stdout belongs to the renderer, so logs only ever go to a file
    if let Some(ref log_path) = args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .ok();

        if let Some(file) = file {
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"));

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .init();

            info!("Starting pipewiz");
        }
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(WizardError::Interrupted) => {
            eprintln!("pipewiz: interrupted");
            // Blocking step threads are not joined on the way out
            std::process::exit(EXIT_INTERRUPTED.into());
        }
        Err(e) => {
            error!("Wizard error: {}", e);
            eprintln!("pipewiz: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = match args.config.as_deref() {
        Some(path) => WizardConfig::load_from(path)?,
        None => WizardConfig::load()?,
    };

    // --dryrun flag overrides config
    if args.dryrun {
        config.general.dryrun = true;
    }
    for phase in &args.skip {
        if !config.disable(phase) {
            return Err(WizardError::Environment(format!("unknown phase: {phase}")));
        }
    }

    if !config.general.dryrun {
        preflight::check_root(config.general.require_root)?;
        preflight::check_required_tools(config.general.required_tools.as_slice())?;
    }
    let workdir = preflight::create_workdir(config.general.workdir_base.as_deref())?;

    let (session, phases) = steps::build_session(&config, &workdir)?;
    let service = create_service(config.general.dryrun);
    let renderer = Renderer::new(Box::new(stdout()));
    let restorer = Restorer::new(renderer.rows());
    // An abandoned step thread must not draw over the restored terminal
    let renderer = renderer.with_restorer(restorer.clone());

    // Set up panic handler to restore terminal
    let hook_restorer = restorer.clone();
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        hook_restorer.restore(&mut stdout());
        original_hook(panic_info);
    }));

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut pipeline = Pipeline::new(session, renderer, service, workdir);
    let guard_restorer = restorer.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        let _guard = TerminalGuard::new(guard_restorer, stdout());
        pipeline.run(phases)
    });

    let result = tokio::select! {
        joined = &mut handle => joined
            .map_err(|e| WizardError::Terminal(format!("pipeline thread failed: {e}")))
            .and_then(|r| r),
        _ = sigint.recv() => {
            warn!("Received SIGINT, aborting");
            Err(WizardError::Interrupted)
        }
        _ = sigterm.recv() => {
            warn!("Received SIGTERM, aborting");
            Err(WizardError::Interrupted)
        }
    };

    restorer.restore(&mut stdout());
    result
}
