mod cli;

use adforge::{config, presets, specfile, HttpStageBackend};
use adforge_core::config::Config;
use adforge_core::{Error, MediaLocator};
use adforge_pipeline::{
    DownloadFinalizer, Phase, PipelineOrchestrator, ProgressSender, ProgressUpdate, RunContext,
    StageBackend, StagePolicies,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, RunArgs};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "adforge=trace,adforge_pipeline=trace,adforge_core=debug".to_string()
        } else {
            "adforge=info,adforge_pipeline=info,adforge_core=info".to_string()
        }
    });

    // Logs and progress go to stderr; stdout carries results only.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run(args) => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_pipeline(config, args))
        }
        Commands::Download {
            locator,
            output_dir,
        } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(download(config, &locator, output_dir))
        }
        Commands::Presets => {
            list_presets();
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("adforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Exit code of the first adforge error in the chain, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

async fn run_pipeline(config: Config, args: RunArgs) -> Result<()> {
    let spec = match (args.preset, &args.spec) {
        (Some(preset), _) => preset.spec(),
        (None, Some(path)) => specfile::load_spec(path)?,
        (None, None) => {
            return Err(Error::Validation("either --preset or --spec is required".into()).into())
        }
    };

    let inputs = args
        .inputs
        .iter()
        .map(|s| s.parse::<MediaLocator>())
        .collect::<adforge_core::Result<Vec<_>>>()?;

    let backend: Arc<dyn StageBackend> = Arc::new(HttpStageBackend::new(&config.backend));
    let orchestrator =
        PipelineOrchestrator::new(backend.clone(), StagePolicies::from(&config.polling));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run; remote jobs keep running");
            interrupt.cancel();
        }
    });

    let ctx = RunContext::new()
        .with_cancellation(cancel)
        .with_progress(ProgressSender::new(render_progress));

    eprintln!(
        "Running pipeline {} ({} stages) against {}",
        spec.display_name(),
        spec.len(),
        config.backend.url
    );
    let run = orchestrator.run(spec, inputs, &ctx).await;
    if let Some(elapsed) = run.elapsed() {
        eprintln!(
            "Pipeline {} after {:.1}s",
            run.phase(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
    }

    let Some(locator) = run.final_locator().cloned() else {
        return run.into_result().map(|_| ()).map_err(Into::into);
    };
    println!("Final artifact: {locator}");

    if args.no_download {
        return Ok(());
    }

    let output_dir = args.output_dir.unwrap_or(config.download.output_dir);
    let finalizer =
        DownloadFinalizer::new(backend, output_dir).with_prefix(config.download.file_prefix);
    match finalizer.finalize(&run).await {
        Ok(artifact) => {
            println!("Saved: {} ({} bytes)", artifact.path.display(), artifact.bytes);
            Ok(())
        }
        Err(e) => {
            eprintln!("The artifact is still available remotely. Retry with: adforge download {locator}");
            Err(e.into())
        }
    }
}

fn render_progress(update: &ProgressUpdate) {
    let stage = update.stage_kind.map_or("-", |k| k.label());
    let position = format!("[{}/{}]", update.stage_index + 1, update.stage_count);
    match update.phase {
        Phase::Failed => eprintln!(
            "{position} {stage} failed: {}",
            update.error_message.as_deref().unwrap_or("unknown error")
        ),
        Phase::Cancelled => eprintln!("{position} {stage} cancelled"),
        Phase::Completed => eprintln!("{position} done"),
        phase => eprintln!(
            "{position} {stage:<24} {:<11} {:>3}%",
            phase.name(),
            update.progress_percent
        ),
    }
}

async fn download(config: Config, locator: &str, output_dir: Option<PathBuf>) -> Result<()> {
    let locator: MediaLocator = locator.parse()?;
    let backend = Arc::new(HttpStageBackend::new(&config.backend));
    let output_dir = output_dir.unwrap_or(config.download.output_dir);

    let finalizer =
        DownloadFinalizer::new(backend, output_dir).with_prefix(config.download.file_prefix);
    let artifact = finalizer.fetch(&locator, None).await?;

    println!("Saved: {} ({} bytes)", artifact.path.display(), artifact.bytes);
    Ok(())
}

fn list_presets() {
    for preset in presets::all() {
        let stages: Vec<String> = preset
            .spec()
            .stages
            .iter()
            .map(|s| s.params.summary())
            .collect();
        println!("{:<22} {}", preset.name(), preset.description());
        println!("{:<22} {}", "", stages.join(" -> "));
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Backend: {}", config.backend.url);
    println!(
        "  Auth: {}",
        if config.backend.api_key.as_deref().is_some_and(|k| !k.is_empty()) {
            "bearer token"
        } else {
            "none"
        }
    );
    for (name, cadence) in [
        ("concatenate", config.polling.concatenate),
        ("interpolate", config.polling.interpolate),
        ("upscale", config.polling.upscale),
    ] {
        println!(
            "  Polling {name}: every {}s, up to {} attempts ({}s budget)",
            cadence.interval_secs,
            cadence.max_attempts,
            cadence.budget().as_secs()
        );
    }
    println!("  Downloads: {}", config.download.output_dir.display());

    for warning in config.warnings() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
