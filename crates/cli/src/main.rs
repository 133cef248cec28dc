use clap::{Parser, Subcommand};
use relay_core::broadcast::Broadcaster;
use relay_core::config::{self, Config, ReplyMode, StyleLanguage};
use relay_core::relay::Relay;
use relay_core::shutdown::{self, ShutdownTrigger};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Relay CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config.json, messages.txt).
    Init {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Poll the configured channels and answer new messages until interrupted.
    Run {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Channel id to poll; repeat for several. Replaces platform.channels.
        #[arg(long = "channel", value_name = "ID")]
        channels: Vec<String>,

        /// Seconds to wait after polling each channel
        #[arg(long, value_name = "SECS")]
        read_delay: Option<u64>,

        /// Seconds to wait before sending a reply
        #[arg(long, value_name = "SECS")]
        reply_delay: Option<u64>,

        /// `reply` (threaded) or `send` (plain)
        #[arg(long, value_name = "MODE")]
        mode: Option<String>,

        /// Reply language: id, en or pt
        #[arg(long, value_name = "CODE")]
        language: Option<String>,

        /// Do not call the generation service; answer with static lines
        #[arg(long)]
        no_generation: bool,

        /// Use a static line when generation falls back
        #[arg(long)]
        static_fallback: bool,

        /// Append log records to this file as well as stderr
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },

    /// Periodically post a random line from the messages file to every channel.
    Broadcast {
        /// Config file path (default: RELAY_CONFIG_PATH or ~/.relay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Channel id to post to; repeat for several. Replaces platform.channels.
        #[arg(long = "channel", value_name = "ID")]
        channels: Vec<String>,

        /// Seconds between rounds
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,

        /// Append log records to this file as well as stderr
        #[arg(long, value_name = "PATH")]
        log_file: Option<PathBuf>,
    },
}

/// Overrides collected from `relay run` flags.
struct RunOverrides {
    channels: Vec<String>,
    read_delay: Option<u64>,
    reply_delay: Option<u64>,
    mode: Option<String>,
    language: Option<String>,
    no_generation: bool,
    static_fallback: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("relay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            init_logging(None);
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run {
            config,
            channels,
            read_delay,
            reply_delay,
            mode,
            language,
            no_generation,
            static_fallback,
            log_file,
        }) => {
            let overrides = RunOverrides {
                channels,
                read_delay,
                reply_delay,
                mode,
                language,
                no_generation,
                static_fallback,
            };
            if let Err(e) = run_relay(config, overrides, log_file).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Broadcast {
            config,
            channels,
            interval,
            log_file,
        }) => {
            if let Err(e) = run_broadcast(config, channels, interval, log_file).await {
                log::error!("broadcast failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Writes every record to the log file and echoes it to the console.
/// A failing file write is reported but never suppresses the echo.
struct Tee<F, C> {
    file: F,
    console: C,
}

impl<F: Write, C: Write> Write for Tee<F, C> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.file.write_all(buf);
        let _ = self.console.write_all(buf);
        written.map(|()| buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let flushed = self.file.flush();
        let _ = self.console.flush();
        flushed
    }
}

fn init_logging(log_file: Option<&Path>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(Tee {
                    file,
                    console: std::io::stderr(),
                })));
            }
            Err(e) => eprintln!("cannot open log file {}: {}", path.display(), e),
        }
    }
    builder.init();
}

/// Load config and start logging; the log file comes from the flag or `logging.file`.
fn load_with_logging(
    config_path: Option<PathBuf>,
    log_file: Option<PathBuf>,
) -> anyhow::Result<(Config, PathBuf)> {
    let loaded = config::load_config(config_path);
    let file = log_file.or_else(|| {
        loaded
            .as_ref()
            .ok()
            .and_then(|(config, _)| config.logging.file.clone())
    });
    init_logging(file.as_deref());
    loaded
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(config::default_config_path);
    let dir = relay_core::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

fn apply_overrides(config: &mut Config, overrides: RunOverrides) -> anyhow::Result<()> {
    if !overrides.channels.is_empty() {
        config.platform.channels = overrides.channels;
    }
    if let Some(secs) = overrides.read_delay {
        config.reply.read_delay_secs = secs;
    }
    if let Some(secs) = overrides.reply_delay {
        config.reply.reply_delay_secs = secs;
    }
    if let Some(mode) = overrides.mode {
        config.reply.mode = ReplyMode::from_code(&mode)
            .ok_or_else(|| anyhow::anyhow!("unknown reply mode {:?} (expected reply or send)", mode))?;
    }
    if let Some(language) = overrides.language {
        config.reply.language = StyleLanguage::from_code(&language);
    }
    if overrides.no_generation {
        config.generation.enabled = false;
    }
    if overrides.static_fallback {
        config.reply.use_static_fallback = true;
    }
    Ok(())
}

/// Flip the shutdown flag on Ctrl+C or SIGTERM.
fn spawn_signal_listener(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    log::warn!("failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        log::info!("shutdown signal received, stopping");
        trigger.trigger();
    });
}

async fn run_relay(
    config_path: Option<PathBuf>,
    overrides: RunOverrides,
    log_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (mut config, path) = load_with_logging(config_path, log_file)?;
    apply_overrides(&mut config, overrides)?;

    let (trigger, shutdown) = shutdown::channel();
    spawn_signal_listener(trigger);
    let mut relay = Relay::from_config(&config, &path, &shutdown).await?;
    relay.run(shutdown).await;
    Ok(())
}

async fn run_broadcast(
    config_path: Option<PathBuf>,
    channels: Vec<String>,
    interval: Option<u64>,
    log_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (mut config, path) = load_with_logging(config_path, log_file)?;
    if !channels.is_empty() {
        config.platform.channels = channels;
    }
    if let Some(secs) = interval {
        config.broadcast.interval_secs = secs;
    }

    let (trigger, shutdown) = shutdown::channel();
    spawn_signal_listener(trigger);
    let mut broadcaster = Broadcaster::from_config(&config, &path, &shutdown)?;
    broadcaster.run(shutdown).await;
    Ok(())
}
