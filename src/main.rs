use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley::chat::{ChatError, WriterMessage, handle_message};
use parley::config::Config;
use parley::llm::HttpClientFactory;
use parley::llm::selector::{GOOGLE_GEMINI_API_KEY, OPENAI_API_KEY};
use parley::profile::profiles;
use parley::server::{self, AppState};
use parley::session::{Credentials, SessionStore, start_session};

#[derive(Parser)]
#[command(name = "parley", version, about = "Streaming chat with OpenAI or Gemini")]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, global = true, default_value = "parley.yaml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat in the terminal, one question per line
    Chat {
        /// Profile to chat with (OpenAI or Gemini)
        #[arg(short, long, default_value = "OpenAI")]
        profile: String,
    },
    /// List the available profiles
    Profiles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load(&cli.config)
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Chat { profile } => chat(config, &profile).await,
        Command::Profiles => {
            for profile in profiles() {
                println!("{:<8} {}", profile.name, profile.description);
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or(config.server.host);
    let port = port.unwrap_or(config.server.port);

    let state = AppState {
        sessions: SessionStore::new(),
        factory: Arc::new(HttpClientFactory::new(config.providers)),
        keep_alive_interval_seconds: config.server.keep_alive_interval_seconds,
    };
    let app = server::build_app(state, config.server.request_timeout_seconds);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn chat(config: Config, profile: &str) -> Result<()> {
    let factory = HttpClientFactory::new(config.providers);
    let credentials = Credentials::from_env(&[OPENAI_API_KEY, GOOGLE_GEMINI_API_KEY]);
    let mut out = WriterMessage::new(tokio::io::stdout());

    let session = start_session(profile, &credentials, &factory, &mut out).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match handle_message(session.pipeline(), question, &mut out).await {
            Ok(()) => {}
            Err(ChatError::Sink(_)) => break,
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "chat turn failed");
                eprintln!("\nerror: {e}");
            }
        }
    }

    Ok(())
}
