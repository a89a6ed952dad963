use anyhow::{Context, Result};
use clap::Parser;
use std::{net::IpAddr, path::PathBuf, sync::Arc, time::Duration};
use tracing::{error, info};

use groq_chat::{
    chat, constants,
    web_server::{self, WebOptions},
    ChatSession, CompletionClient, GroqClient, ProviderArgs,
};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the chat web server.
    Start {
        #[arg(long, default_value_t = constants::DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
        #[arg(long, default_value = "127.0.0.1", help = "Address to bind.")]
        bind: IpAddr,
        #[arg(long, help = "Serve templates from this directory and reload them on change.")]
        templates_dir: Option<PathBuf>,
        #[arg(long, default_value = "static", help = "Directory with static assets.")]
        static_dir: PathBuf,
        #[arg(long, default_value_t = constants::DEFAULT_SESSION_TTL_SECS, help = "Drop sessions idle for this many seconds.")]
        session_ttl: u64,
    },
    /// Chat with the model from the terminal.
    Chat,
}

// The main entry point of the application, using tokio's async runtime
#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,groq_chat=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // A missing key stops us here, before anything is served.
    let config = cli
        .provider
        .into_config()
        .context("Invalid configuration")?;
    info!(?config, "Configuration loaded");

    let client: Arc<dyn CompletionClient> = Arc::new(GroqClient::new(config));

    match cli.command {
        Commands::Start {
            port,
            bind,
            templates_dir,
            static_dir,
            session_ttl,
        } => {
            let options = WebOptions {
                addr: (bind, port).into(),
                templates_dir,
                static_dir,
                session_ttl: Duration::from_secs(session_ttl),
            };
            info!("Starting chat server on {}...", options.addr);

            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(options, client).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            tokio::select! {
                _ = &mut ctrl_c => {
                    info!("Ctrl-C received, initiating shutdown...");
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }

            if !web_server_handle.is_finished() {
                info!("Aborting web server task...");
                web_server_handle.abort();
            }
            info!("Shutdown complete.");
        }
        Commands::Chat => {
            let session = ChatSession::new(client);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chat::run_chat(&session, stdin, tokio::io::stdout())
                .await
                .context("Chat session failed")?;
        }
    }

    Ok(())
}
