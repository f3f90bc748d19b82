use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use pageforge::github::GitHubClient;
use pageforge::llm::LlmClient;
use pageforge::session::SessionState;
use pageforge::web_server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web server and UI.
    Start {
        #[arg(long, default_value_t = 8700, help = "Port for the web server.")]
        port: u16,
        #[arg(
            long,
            env = "PAGEFORGE_SESSION_FILE",
            default_value = "pageforge-session.json",
            help = "Path of the persisted session."
        )]
        session_file: PathBuf,
    },
    /// Wipe the persisted session (code and transcript).
    Reset {
        #[arg(
            long,
            env = "PAGEFORGE_SESSION_FILE",
            default_value = "pageforge-session.json",
            help = "Path of the persisted session."
        )]
        session_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for API keys and OAuth credentials)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,pageforge=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { port, session_file } => {
            let session = SessionState::load(&session_file)
                .context("Failed to load persisted session")?;
            let state = web_server::AppState::new(
                session,
                session_file,
                LlmClient::from_env(),
                GitHubClient::from_env(),
            )
            .context("Failed to initialize application state")?;

            let mut server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = &mut server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !server_handle.is_finished() {
                server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Reset { session_file } => {
            let mut session = SessionState::load(&session_file)
                .context("Failed to load persisted session")?;
            session.clear();
            session
                .save(&session_file)
                .context("Failed to save cleared session")?;
            println!("Session reset: {}", session_file.display());
        }
    }

    Ok(())
}
