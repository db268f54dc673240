//! ptyline
//!
//! Run a program on a pseudo-terminal from the command line.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use clap::{Parser, Subcommand};
use ptyline::config::{default_config_path, Config};
use ptyline::{ExitEvent, NativeBackend, Pty, PtyBackend, Session, Signal, SpawnOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

/// ptyline - run programs on a pseudo-terminal.
#[derive(Parser, Debug)]
#[command(name = "ptyline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Spawn a program and attach stdin/stdout to it
    Run {
        /// Terminal width (default from config)
        #[arg(long)]
        cols: Option<u16>,

        /// Terminal height (default from config)
        #[arg(long)]
        rows: Option<u16>,

        /// Working directory for the program
        #[arg(long, value_name = "DIR")]
        cwd: Option<String>,

        /// Terminal type exported as TERM
        #[arg(long, value_name = "TERM")]
        name: Option<String>,

        /// Extra environment variable (repeatable)
        #[arg(long, short, value_name = "KEY=VALUE", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Program to run (default from config)
        file: Option<String>,

        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print the effective configuration
    Config {
        /// Print the configuration file path instead
        #[arg(long)]
        path: bool,
    },
}

fn parse_env_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&config_path)?;
    config.apply_env_overrides();
    config.validate()?;

    init_logging(cli.verbose, &config.logging.level);
    tracing::debug!(path = %config_path.display(), "Configuration loaded");

    match cli.command {
        Commands::Run {
            cols,
            rows,
            cwd,
            name,
            env,
            file,
            args,
        } => {
            let mut options = SpawnOptions::from_config(&config);
            if let Some(cols) = cols {
                options.cols = Some(i32::from(cols));
            }
            if let Some(rows) = rows {
                options.rows = Some(i32::from(rows));
            }
            if name.is_some() {
                options.name = name;
            }
            options.cwd = cwd;
            if !env.is_empty() {
                options.env = Some(env.into_iter().collect());
            }

            let file = file.unwrap_or_else(|| config.session.default_file.clone());
            let code = run(&file, &args, options).await?;
            std::process::exit(code);
        }
        Commands::Config { path } => {
            if path {
                println!("{}", config_path.display());
            } else {
                print!("{}", config.to_toml()?);
            }
        }
    }

    Ok(())
}

/// Initialize tracing. `RUST_LOG` wins over the configured level.
fn init_logging(verbose: bool, level: &str) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Run one session to completion and return the process exit status.
async fn run(file: &str, args: &[String], options: SpawnOptions) -> anyhow::Result<i32> {
    let backend: Arc<dyn PtyBackend> = Arc::new(NativeBackend::new());
    let session = Session::spawn(backend, Some(file), args, options)
        .with_context(|| format!("Failed to start {file}"))?;

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    session.on_data().subscribe(move |text: &String| {
        let _ = out_tx.send(text.clone());
    });

    let (exit_tx, mut exit_rx) = oneshot::channel::<ExitEvent>();
    let exit_tx = Mutex::new(Some(exit_tx));
    session.on_exit().subscribe(move |exit: &ExitEvent| {
        if let Some(tx) = exit_tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(exit.clone());
        }
    });
    session.start();

    let input = session.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            input.write(&format!("{line}\r"));
        }
    });

    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            Some(text) = out_rx.recv() => {
                stdout.write_all(text.as_bytes()).await?;
                stdout.flush().await?;
            }
            exit = &mut exit_rx => {
                // Every data event is published before the exit event.
                while let Ok(text) = out_rx.try_recv() {
                    stdout.write_all(text.as_bytes()).await?;
                }
                stdout.flush().await?;
                let exit = exit.context("Session ended without an exit event")?;
                return Ok(exit_status(&exit));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(session_id = %session.id(), "Interrupted, killing session");
                session.kill(None);
            }
        }
    }
}

/// Shell-style exit status: the child's code, or 128 + signal number.
fn exit_status(exit: &ExitEvent) -> i32 {
    match &exit.signal {
        None => exit.exit_code,
        Some(Signal::Number(n)) => 128 + n,
        Some(Signal::Name(name)) => {
            let number = match name.as_str() {
                "SIGHUP" => 1,
                "SIGINT" => 2,
                "SIGQUIT" => 3,
                "SIGKILL" => 9,
                _ => 15,
            };
            128 + number
        }
    }
}
