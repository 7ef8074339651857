use cactus_redirector::logging::init_logging;
use cactus_redirector::resolver::ChainedResolver;
use cactus_redirector::{RedirectorConfig, TestRegistry, start_redirector};
use clap::Parser;
use std::{collections::BTreeMap, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Standalone redirector.
///
/// Answers the connectivity, version and session services and runs the
/// framework's test wrappers. Applications that register their own test
/// classes embed the library and call `start_redirector` themselves.
#[derive(Parser, Debug)]
#[command(name = "cactus_redirector")]
#[command(version, about)]
struct Args {
    /// Address to bind the HTTP server.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind_addr: SocketAddr,

    /// Context path of the web application.
    #[arg(long, default_value = "/test")]
    context_path: String,

    #[arg(long, default_value = "ServletRedirector")]
    servlet_redirector_name: String,

    #[arg(long, default_value = "JspRedirector")]
    jsp_redirector_name: String,

    #[arg(long, default_value = "EjbRedirector")]
    ejb_redirector_name: String,

    /// Servlet init parameter, as `name=value`. Repeatable.
    #[arg(long = "init-param", value_parser = parse_init_param)]
    init_params: Vec<(String, String)>,

    /// Idle seconds after which a session expires.
    #[arg(long, default_value_t = 1800)]
    session_timeout_secs: u64,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write logs to a daily rolling file in this directory instead of stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn parse_init_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got [{raw}]")),
    }
}

fn check_context_path(path: &str) -> anyhow::Result<()> {
    if path.is_empty() || path.starts_with('/') {
        Ok(())
    } else {
        anyhow::bail!("context path [{path}] must be empty or start with '/'")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _guard = init_logging(&args.log_level, args.log_dir.as_deref())?;
    check_context_path(&args.context_path)?;

    let config = RedirectorConfig {
        bind_addr: args.bind_addr,
        context_path: args.context_path,
        servlet_redirector_name: args.servlet_redirector_name,
        jsp_redirector_name: args.jsp_redirector_name,
        ejb_redirector_name: args.ejb_redirector_name,
        init_parameters: args.init_params.into_iter().collect::<BTreeMap<_, _>>(),
        session_timeout: Duration::from_secs(args.session_timeout_secs),
    };

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            on_signal.cancel();
        }
    });

    tracing::info!("Starting redirector on {}", config.bind_addr);
    let resolver = Arc::new(ChainedResolver::with_registry(TestRegistry::new()));
    start_redirector(config, resolver, shutdown).await?;
    Ok(())
}
