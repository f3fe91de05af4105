use chatcal::infrastructure::config::{AppConfig, CONFIG_FILE, ConfigOverrides};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Chat with a local Ollama model; replies that mention scheduling book a
/// one-hour event tomorrow at 10:00 in Google Calendar.
#[derive(Debug, Parser)]
#[command(name = "chatcal", version, about)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Ollama model name.
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the Ollama server.
    #[arg(long, value_name = "URL")]
    ollama_url: Option<String>,

    /// Google OAuth client-secret JSON file.
    #[arg(long, value_name = "PATH")]
    client_secret: Option<PathBuf>,

    /// IANA timezone for created events, e.g. Europe/Berlin.
    #[arg(long)]
    timezone: Option<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CHATCAL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let working_dir = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(error) => {
            eprintln!("failed to resolve current directory: {error}");
            return ExitCode::FAILURE;
        }
    };
    let config_path = cli
        .config
        .map(|path| working_dir.join(path))
        .unwrap_or_else(|| working_dir.join(CONFIG_FILE));
    let overrides = ConfigOverrides {
        model: cli.model,
        ollama_url: cli.ollama_url,
        client_secret_file: cli.client_secret,
        timezone: cli.timezone,
    };

    let config = match AppConfig::load(&working_dir, &config_path, overrides) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("invalid configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    match chatcal::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, "session_failed");
            ExitCode::FAILURE
        }
    }
}
