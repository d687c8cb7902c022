#![forbid(unsafe_code)]

use clap::Parser;
use pulse_mux_core::net::{run as run_net, ServerConfig};
use pulse_mux_core::{sources_from_config, AppendFileArchive, Mux, MuxConfig};
use pulse_proto::exitcode;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Collects telemetry from authorized probes and fans it out to
/// subscribers and archive files.
#[derive(Parser, Debug)]
#[command(name = "pulse-mux")]
struct Cli {
    /// Run in the foreground instead of daemonizing
    #[arg(short = 'd', long)]
    debug: bool,

    /// Path to the configuration file
    #[arg(short = 'f', long = "config", value_name = "FILE", default_value = "pulse-mux.toml")]
    config: PathBuf,

    /// Parse the configuration file and exit
    #[arg(short = 't', long = "test")]
    test_config: bool,

    /// Print version and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// List the archive files this configuration writes to, then exit
    #[arg(short = 'l', long = "list")]
    list: bool,
}

fn init_fallback_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}

fn write_pid_file(path: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.version {
        init_fallback_tracing();
        println!("pulse-mux {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(exitcode::OK as u8);
    }

    let cfg: MuxConfig = match pulse_mux_core::load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            init_fallback_tracing();
            error!(%err, path = ?cli.config, "failed to load configuration");
            return ExitCode::from(exitcode::USAGE as u8);
        }
    };

    if let Err(err) = pulse_mux_core::telemetry::init_tracing_with_otel(
        cfg.mux.logging.level.clone(),
        cfg.mux.logging.show_target,
        cfg.mux.logging.otel_log_level.clone(),
    ) {
        eprintln!("failed to initialize tracing: {err}");
        return ExitCode::from(exitcode::SOFTWARE as u8);
    }

    if cli.list {
        for source in &cfg.mux.sources {
            for accepted in &source.accepted {
                if let Some(archive) = &accepted.archive {
                    println!("{}", archive.display());
                }
            }
        }
        return ExitCode::from(exitcode::OK as u8);
    }

    if cli.test_config {
        info!("configuration is valid");
        return ExitCode::from(exitcode::OK as u8);
    }

    if cli.debug {
        info!("running in the foreground");
    }

    if let Some(pid_file) = &cfg.mux.pid_file {
        if let Err(err) = write_pid_file(pid_file) {
            error!(%err, path = ?pid_file, "failed to write pid file");
            return ExitCode::from(exitcode::SOFTWARE as u8);
        }
    }

    let outcome = run(cfg).await;
    pulse_mux_core::telemetry::shutdown_tracing();
    if let Err(err) = outcome {
        error!(%err, "pulse-mux exited with an error");
        return ExitCode::from(exitcode::SOFTWARE as u8);
    }
    ExitCode::from(exitcode::OK as u8)
}

async fn run(cfg: MuxConfig) -> std::io::Result<()> {
    let sources = sources_from_config(&cfg.mux)
        .map_err(std::io::Error::other)?;
    let mut mux = Mux::new(sources, Arc::new(AppendFileArchive));

    let metrics_registry = if let Some(metrics_port) = cfg.mux.metrics_port {
        match pulse_mux_core::telemetry::init_metrics() {
            Ok((metrics, registry)) => {
                mux = mux.with_metrics(metrics);
                Some((metrics_port, registry))
            }
            Err(err) => {
                error!(%err, "failed to initialize metrics");
                None
            }
        }
    } else {
        None
    };
    let mux = Arc::new(mux);

    let server_cfg = ServerConfig {
        udp_bind: cfg.mux.udp_bind,
        tcp_bind: cfg.mux.tcp_bind,
        subscriber_bind: cfg.mux.subscriber_bind,
    };

    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        let _ = shutdown_tx.send(true);
    });

    if let Some((metrics_port, registry)) = metrics_registry {
        tokio::spawn(async move {
            if let Err(err) = pulse_mux_core::telemetry::start_metrics_server(metrics_port, registry).await {
                error!(%err, "metrics server exited with an error");
            }
        });
    }

    run_net(server_cfg, mux, shutdown_rx).await
}
