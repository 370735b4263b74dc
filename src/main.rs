//! Converge CLI entrypoint.
//!
//! This is the main entrypoint for the converge command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use kube_converge::cli::{Cli, Commands, OutputFormatter};
use kube_converge::config::{ClusterConfig, ConfigParser, ConfigValidator, find_config_file};
use kube_converge::dns::{Ingress, LogSink, Scope, Zone, ZoneFile, ZoneSink};
use kube_converge::error::{ConfigError, ConvergeError, Result};
use kube_converge::reconciler::Reconciler;
use kube_converge::watch::{FixedBackoff, KubeSource, Source, WatchLoop};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Main async entry point. Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Plan => cmd_plan(cli.config.as_ref(), &formatter),
        Commands::Render { out } => cmd_render(cli.config.as_ref(), out.as_deref(), &formatter).await,
        Commands::Apply => cmd_apply(cli.config.as_ref(), &formatter),
        Commands::Dns { zone_file } => cmd_dns(cli.config.as_ref(), zone_file).await,
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let config = parse_config(&config_file)?;
    let result = ConfigValidator::new().check(&config);
    eprintln!("{}", formatter.format_validation(&result, show_warnings));

    if result.is_valid() {
        eprintln!("\nConfiguration summary:");
        eprintln!("  Cluster: {}", config.cluster.name);
        eprintln!("  Resources: {}", config.resource_count());
        eprintln!(
            "  DNS scopes: {}",
            config.dns.as_ref().map_or(0, |dns| dns.scopes.len())
        );
    }

    Ok(result.is_valid())
}

/// Show the execution order.
fn cmd_plan(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let config = load_config(config_path)?;
    let tasks = Reconciler::new(&config).plan()?;
    eprintln!("{}", formatter.format_plan(&tasks));
    Ok(true)
}

/// Generate the declarative document.
async fn cmd_render(
    config_path: Option<&PathBuf>,
    out: Option<&Path>,
    formatter: &OutputFormatter,
) -> Result<bool> {
    let config = load_config(config_path)?;
    let (report, document) = Reconciler::new(&config).render(None).await?;

    let content = serde_json::to_string_pretty(&document)
        .map_err(|e| ConvergeError::internal(format!("Failed to serialize document: {e}")))?;
    match out {
        Some(path) => {
            tokio::fs::write(path, content).await?;
            info!("Wrote generated document to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{content}")?;
        }
    }

    eprintln!("{}", formatter.format_report(&report));
    Ok(report.is_success())
}

/// Apply to live infrastructure.
fn cmd_apply(config_path: Option<&PathBuf>, formatter: &OutputFormatter) -> Result<bool> {
    let config = load_config(config_path)?;
    let tasks = Reconciler::new(&config).plan()?;
    eprintln!("{}", formatter.format_plan(&tasks));

    Err(ConvergeError::internal(
        "No cloud provider is bundled with this binary. Embed the library and pass a \
         CloudProvider implementation to Reconciler::apply.",
    ))
}

/// Run the DNS watch loops until interrupted.
async fn cmd_dns(config_path: Option<&PathBuf>, zone_file: Option<PathBuf>) -> Result<bool> {
    let config = load_config(config_path)?;
    let dns = config
        .dns
        .ok_or_else(|| ConfigError::validation("No dns section is configured", "dns"))?;

    let sink: Arc<dyn ZoneSink> = match zone_file.or_else(|| dns.zone_file.map(PathBuf::from)) {
        Some(path) => {
            info!("Publishing zone {} to {}", dns.zone, path.display());
            Arc::new(ZoneFile::new(path))
        }
        None => Arc::new(LogSink),
    };
    let zone = Arc::new(Zone::new(&dns.zone, sink));
    let source: Arc<dyn Source<Ingress>> = Arc::new(KubeSource::from_config(&dns.kubernetes).await?);
    let retry = Duration::from_secs(dns.retry_interval_secs);

    let cancel = CancellationToken::new();
    let mut loops = Vec::with_capacity(dns.scopes.len());
    for name in &dns.scopes {
        let scope = Scope::new(name.clone(), zone.clone());
        let watch = WatchLoop::new(source.clone(), scope, Box::new(FixedBackoff::new(retry)));
        loops.push(tokio::spawn(watch.run(cancel.child_token())));
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, stopping watch loops");
    cancel.cancel();

    let mut clean = true;
    for handle in loops {
        match handle.await {
            Ok(scope) => debug!("Stopped {scope:?}"),
            Err(e) => {
                error!("Watch loop failed: {e}");
                clean = false;
            }
        }
    }
    info!("Zone {} holds {} record(s)", zone.name(), zone.records().await.len());
    Ok(clean)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Loads `.env` next to the configuration and parses it with substitution.
fn parse_config(config_file: &Path) -> Result<ClusterConfig> {
    let parser = ConfigParser::new().with_base_path(
        config_file
            .parent()
            .unwrap_or_else(|| Path::new(".")),
    );
    parser.load_dotenv()?;
    parser.load_with_env(config_file)
}

/// Loads and validates the configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<ClusterConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let config = parse_config(&config_file)?;
    ConfigValidator::new().validate(&config)?;
    Ok(config)
}
