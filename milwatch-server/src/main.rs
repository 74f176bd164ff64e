//! milwatch: alerts for military and other aircraft of interest seen on a
//! local SBS (BaseStation) feed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use milwatch_core::config::{self, expand_path, Config};
use milwatch_core::{AlertTracker, LocationProvider, RuleTable};

mod dispatch;
mod gps;
mod pipeline;
mod selftest;
mod sinks;
mod web;

use dispatch::Dispatcher;
use gps::GpsReader;
use pipeline::Pipeline;
use sinks::{AlertBuffer, ConsoleSink, CsvLogSink, PushSink, SpeechSink, WebSink};

/// How long test mode waits for a first GPS fix.
const TEST_GPS_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "milwatch", version, about = "Aircraft-of-interest alerts from an SBS feed")]
struct Cli {
    /// Config file (default: ~/.milwatch/config.yaml)
    #[arg(long, global = true, env = "MILWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the feed and raise alerts until interrupted
    Run {
        /// Feed host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Feed port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Replay SBS lines from a file ("-" for stdin) instead of the feed
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Send canned alerts through every sink and report sink health
    Test,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Init { force } => cmd_init(cli.config.as_deref(), force),
        Commands::Test => cmd_test(cli.config.as_deref()).await,
        Commands::Run { host, port, input } => {
            cmd_run(cli.config.as_deref(), host, port, input).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<ExitCode, Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Startup wiring
// ---------------------------------------------------------------------------

fn load_rules(config: &Config) -> Result<RuleTable, milwatch_core::RuleLoadError> {
    let rules = RuleTable::from_files(
        &expand_path(&config.rules.military),
        &expand_path(&config.rules.local_interest),
        &expand_path(&config.rules.callsigns),
    )?;
    tracing::info!(
        military = rules.count(milwatch_core::MatchCategory::MilitaryRange) as u64,
        local_interest = rules.count(milwatch_core::MatchCategory::LocalInterest) as u64,
        callsigns = rules.count(milwatch_core::MatchCategory::Callsign) as u64,
        "Rules loaded"
    );
    Ok(rules)
}

/// Register sinks in their fixed order: console, web, speech, push, csv-log.
fn build_dispatcher(config: &Config, buffer: &Arc<AlertBuffer>) -> Dispatcher {
    let mut dispatcher = Dispatcher::new(Duration::from_secs(config.dispatch.sink_timeout_secs));
    dispatcher.register(Box::new(ConsoleSink));
    if config.web.enabled {
        dispatcher.register(Box::new(WebSink::new(Arc::clone(buffer))));
    }
    if config.speech.enabled {
        dispatcher.register(Box::new(SpeechSink::new(
            &config.speech.program,
            config.speech.args.clone(),
            Duration::from_secs(config.speech.timeout_secs),
        )));
    }
    if config.push.enabled {
        match PushSink::new(&config.push.url, Duration::from_secs(config.push.timeout_secs)) {
            Ok(sink) => dispatcher.register(Box::new(sink)),
            Err(e) => tracing::warn!(error = %e, "Push sink disabled"),
        }
    }
    dispatcher.register(Box::new(CsvLogSink::new(expand_path(&config.log.path))));
    dispatcher
}

fn spawn_gps(config: &Config, provider: &Arc<LocationProvider>, stop: &CancellationToken) {
    let Some(device) = config.gps.device.as_deref() else {
        tracing::info!("No GPS device configured; using fallback location");
        return;
    };
    let reader = GpsReader::new(
        expand_path(device),
        Arc::clone(provider),
        Duration::from_secs(config.gps.fix_timeout_secs),
        Duration::from_secs(config.gps.interval_secs),
    );
    tokio::spawn(reader.run(stop.clone()));
}

fn build_tracker(config: &Config, rules: RuleTable, provider: &Arc<LocationProvider>) -> AlertTracker {
    AlertTracker::new(rules, Arc::clone(provider), config.suppression_policy())
        .with_require_position(config.alerts.require_position)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_init(path: Option<&Path>, force: bool) -> CmdResult {
    let target = path.map(Path::to_path_buf).unwrap_or_else(config::config_file);
    if target.exists() && !force {
        eprintln!("{} already exists (use --force to overwrite)", target.display());
        return Ok(ExitCode::FAILURE);
    }
    let written = config::save_config(&Config::default(), Some(&target))?;
    println!("Wrote {}", written.display());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_test(path: Option<&Path>) -> CmdResult {
    let config = config::load_config(path)?;
    let rules = load_rules(&config)?;
    let provider = Arc::new(LocationProvider::new(config.home_coord()));

    let stop = CancellationToken::new();
    spawn_gps(&config, &provider, &stop);
    if config.gps.device.is_some() {
        let waited = tokio::time::timeout(TEST_GPS_WAIT, async {
            while !provider.has_fix() {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;
        if waited.is_err() {
            tracing::warn!("No GPS fix within {}s; testing with fallback", TEST_GPS_WAIT.as_secs());
        }
    }

    let buffer = Arc::new(AlertBuffer::new(config.web.capacity));
    let dispatcher = build_dispatcher(&config, &buffer);
    let mut tracker = build_tracker(&config, rules, &provider);

    let report = selftest::run(&mut tracker, &dispatcher).await;
    stop.cancel();

    println!("{}", report.render());
    if report.passed() {
        println!("All sinks OK");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("One or more sinks failed");
        Ok(ExitCode::FAILURE)
    }
}

async fn cmd_run(
    path: Option<&Path>,
    host: Option<String>,
    port: Option<u16>,
    input: Option<PathBuf>,
) -> CmdResult {
    let mut config = config::load_config(path)?;
    if let Some(host) = host {
        config.feed.host = host;
    }
    if let Some(port) = port {
        config.feed.port = port;
    }

    let rules = load_rules(&config)?;
    let provider = Arc::new(LocationProvider::new(config.home_coord()));
    let buffer = Arc::new(AlertBuffer::new(config.web.capacity));

    let stop = CancellationToken::new();
    let interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; stopping after current line");
            interrupt.cancel();
        }
    });

    spawn_gps(&config, &provider, &stop);

    if config.web.enabled {
        let state = Arc::new(web::AppState {
            alerts: Arc::clone(&buffer),
            location: Arc::clone(&provider),
        });
        let host = config.web.host.clone();
        let port = config.web.port;
        tokio::spawn(async move {
            if let Err(e) = web::serve(state, &host, port).await {
                tracing::error!(error = %e, "Alert viewer stopped");
            }
        });
    }

    let dispatcher = build_dispatcher(&config, &buffer);
    tracing::info!(sinks = ?dispatcher.sink_names(), "Sinks registered");
    let mut pipeline = Pipeline::new(build_tracker(&config, rules, &provider), dispatcher);

    let outcome = match input {
        Some(file) => {
            let reader = open_input(&file).await?;
            pipeline.run_stream(reader, &stop).await.map(|_| ())
        }
        None => {
            tracing::info!(host = %config.feed.host, port = config.feed.port, "Watching feed");
            pipeline
                .run_feed(
                    &config.feed.host,
                    config.feed.port,
                    Duration::from_secs(config.feed.reconnect_secs),
                    &stop,
                )
                .await
        }
    };

    pipeline.log_summary();
    outcome?;
    Ok(ExitCode::SUCCESS)
}

async fn open_input(file: &Path) -> std::io::Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    if file.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(tokio::io::stdin())))
    } else {
        let f = tokio::fs::File::open(file).await?;
        Ok(Box::new(BufReader::new(f)))
    }
}
