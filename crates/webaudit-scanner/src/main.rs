//! WebAudit - Web security audit runner
//!
//! Reads an audit request, drives the scanning engine through every
//! target and writes the report JSON to stdout. Logs go to stderr.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use webaudit_common::logging::{init_logging_with_config, LogConfig};
use webaudit_common::Config;
use webaudit_engine::{EngineClient, EngineConfig, ScanEngine};
use webaudit_orchestrator::{AuditRequest, Orchestrator, OrchestratorConfig};

const DEFAULT_CONFIG: &str = "webaudit.toml";

/// WebAudit security audit runner
#[derive(Parser, Debug)]
#[command(name = "webaudit")]
#[command(version)]
#[command(about = "Audit web applications through an external scanning engine", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Audit request JSON file (`{"endpoints": [...], "options": {...}}`)
    #[arg(short, long, conflicts_with = "url")]
    request: Option<String>,

    /// Target URL (repeatable)
    #[arg(short, long)]
    url: Vec<String>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,

    /// Log format (pretty, json, compact); overrides config
    #[arg(long)]
    log_format: Option<String>,

    /// Scan mode (fast, normal); overrides config
    #[arg(long)]
    mode: Option<String>,

    /// URLs per batch; overrides the request
    #[arg(long)]
    batch_size: Option<usize>,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("loading {}", path))?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(DEFAULT_CONFIG)?,
        None => Config::default(),
    };
    let mut config = config.merge_env();

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
    if let Some(mode) = &args.mode {
        config.engine.mode = mode.clone();
    }

    config.validate()?;
    Ok(config)
}

fn load_request(args: &Args) -> Result<AuditRequest> {
    let mut request = match &args.request {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading request file {}", path))?;
            AuditRequest::from_json(&json)?
        }
        None if !args.url.is_empty() => AuditRequest::new(args.url.iter().cloned()),
        None => anyhow::bail!("either --request or at least one --url is required"),
    };

    if let Some(batch_size) = args.batch_size {
        request.options.batch_size = batch_size;
    }
    Ok(request)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging_with_config(LogConfig::from(&config.logging));

    info!("WebAudit {} starting", env!("CARGO_PKG_VERSION"));

    let request = load_request(&args)?;
    let engine_config = EngineConfig::from(&config);
    info!("Scanning engine at {} ({} mode)", engine_config.base_url(), engine_config.mode);

    let engine = Arc::new(EngineClient::new(engine_config)?);
    let orchestrator = Orchestrator::new(engine.clone(), OrchestratorConfig::from(&config));

    let report = tokio::select! {
        result = orchestrator.audit(&request) => match result {
            Ok(report) => report,
            Err(e) => {
                error!("Audit failed [{}]: {}", e.code(), e);
                return Err(e.into());
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; shutting down the scanning engine");
            engine.shutdown().await;
            anyhow::bail!("audit interrupted");
        }
    };

    info!(
        "Audit complete: {} issues, score {} (grade {})",
        report.summary.total_issues, report.summary.overall_security_score, report.summary.grade
    );

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    Ok(())
}
