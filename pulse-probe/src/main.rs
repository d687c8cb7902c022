#![forbid(unsafe_code)]

use clap::Parser;
use pulse_probe_core::process::inventory::FixtureInventory;
#[cfg(target_os = "linux")]
use pulse_probe_core::process::inventory::ProcfsInventory;
use pulse_probe_core::process::ProcessSampler;
use pulse_probe_core::stub::StubSampler;
use pulse_probe_core::{ProbeConfig, ProbeError, Sampler, Scheduler, Transport};
use pulse_proto::{exitcode, Arg, RecordType, MAX_SUPPORTED_VERSION};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

const MAX_PACKET_SIZE: usize = 1400;
const RECORD_TYPE_NAMES: &[&str] = &[
    "cpu",
    "cpu-weighted",
    "interface",
    "diskio",
    "filesystem",
    "memory",
    "process",
    "sensor",
    "smart",
    "load",
    "flukso",
    "io1",
    "mbuf",
    "test",
    "pf",
    "pfq",
    "wg",
    "rtt",
    "eot",
];

/// Samples this host and streams readings to a pulse-mux collector.
#[derive(Parser, Debug)]
#[command(name = "pulse-probe")]
struct Cli {
    /// Run in the foreground instead of daemonizing
    #[arg(short = 'd', long)]
    debug: bool,

    /// Path to the configuration file
    #[arg(short = 'f', long = "config", value_name = "FILE", default_value = "pulse-probe.toml")]
    config: PathBuf,

    /// Parse the configuration file and exit
    #[arg(short = 't', long = "test")]
    test_config: bool,

    /// Print version and exit
    #[arg(short = 'v', long)]
    version: bool,

    /// List the record types this build accepts, then exit
    #[arg(short = 'l', long = "list")]
    list: bool,

    /// Drop privileges to this user after startup
    #[arg(short = 'u', long)]
    user: Option<String>,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}

fn resolve_user(name: &str) -> bool {
    matches!(nix::unistd::User::from_name(name), Ok(Some(_)))
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    if cli.version {
        println!("pulse-probe {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::from(exitcode::OK as u8);
    }
    if cli.list {
        for name in RECORD_TYPE_NAMES {
            println!("{name}");
        }
        return ExitCode::from(exitcode::OK as u8);
    }
    if cli.debug {
        info!("running in the foreground");
    }

    let cfg = match pulse_probe_core::load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, path = ?cli.config, "failed to load configuration");
            return ExitCode::from(exitcode::USAGE as u8);
        }
    };

    let user = cli.user.as_deref().or(cfg.probe.user.as_deref());
    if let Some(user) = user {
        if !resolve_user(user) {
            error!(user, "configured user does not resolve on this host");
            return ExitCode::from(exitcode::USAGE as u8);
        }
    }

    if cli.test_config {
        info!("configuration is valid");
        return ExitCode::from(exitcode::OK as u8);
    }

    if let Err(err) = run(cfg).await {
        error!(%err, "pulse-probe exited with an error");
        return ExitCode::from(exitcode::SOFTWARE as u8);
    }
    ExitCode::from(exitcode::OK as u8)
}

fn new_sampler(record_type: RecordType) -> Box<dyn Sampler> {
    if record_type == RecordType::Process {
        #[cfg(target_os = "linux")]
        {
            Box::new(ProcessSampler::new(Box::new(ProcfsInventory::new())))
        }
        #[cfg(not(target_os = "linux"))]
        {
            Box::new(ProcessSampler::new(Box::new(FixtureInventory::default())))
        }
    } else {
        Box::new(StubSampler::new(record_type))
    }
}

async fn run(cfg: ProbeConfig) -> pulse_probe_core::Result<()> {
    let mut streams_by_type: HashMap<RecordType, Vec<Arg>> = HashMap::new();
    for stream in &cfg.probe.streams {
        let record_type = RecordType::from_config_name(&stream.record_type)
            .expect("stream type was validated at config load");
        let arg = Arg::new(&stream.arg).map_err(|e| ProbeError::Config(e.to_string()))?;
        streams_by_type.entry(record_type).or_default().push(arg);
    }

    let transport = Transport::connect(cfg.probe.destination, cfg.probe.protocol.clone()).await?;
    let mut scheduler = Scheduler::new(transport, MAX_PACKET_SIZE, MAX_SUPPORTED_VERSION);

    for (record_type, args) in &streams_by_type {
        let mut sampler = new_sampler(*record_type);
        sampler.init(args)?;
        scheduler.register_sampler(*record_type, sampler);
        for arg in args {
            scheduler.bind_stream(*record_type, *arg);
        }
    }

    if let Some(metrics_port) = cfg.probe.metrics_port {
        match pulse_probe_core::telemetry::init_metrics() {
            Ok((metrics, registry)) => {
                scheduler = scheduler.with_metrics(metrics);
                tokio::spawn(async move {
                    if let Err(err) = pulse_probe_core::telemetry::start_metrics_server(metrics_port, registry).await {
                        error!(%err, "metrics server exited with an error");
                    }
                });
            }
            Err(err) => error!(%err, "failed to initialize metrics"),
        }
    }

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

    scheduler.run(Duration::from_secs(cfg.probe.interval_secs), shutdown_rx).await
}
