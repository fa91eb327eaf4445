use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nova_core::config::{ProxyConfig, SPREADSHEET_NAME, WORKSHEET_NAME};
use nova_core::sheets::SHEETS_SCOPES;
use nova_core::{GeminiClient, ServiceAccountAuth, SheetsClient};
use nova_proxy::http_server;
use nova_proxy::log_store::SheetsLogStore;
use nova_proxy::model::GeminiChatModel;
use nova_proxy::session::{InMemorySessionStore, SessionStore, SessionStoreRef};
use nova_proxy::ChatProxyService;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Longest pause between sweeps for idle sessions
const MAX_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "nova-proxy", about = "Chat proxy relaying messages to Gemini")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,

    /// Port to listen on (overrides PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting NOVA chat proxy");

    // Parse command line args
    let args = Args::parse();

    let mut config = match ProxyConfig::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(anyhow::anyhow!("Configuration error: {}", e));
        }
    };

    if let Some(port) = args.port {
        config.port = port;
    }

    // Initialize Gemini client
    let gemini_client = match GeminiClient::new(config.gemini.clone()) {
        Ok(client) => {
            info!(model = client.model_name(), "Initialized Gemini client");
            client
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Gemini client");
            return Err(anyhow::anyhow!("Failed to initialize Gemini client: {}", e));
        }
    };

    // Authorize against Google Sheets and open the log worksheet
    let auth = ServiceAccountAuth::new(config.credentials.clone(), SHEETS_SCOPES)?;
    info!(client_email = auth.client_email(), "Loaded service account");

    let sheets = SheetsClient::new(auth);
    let worksheet = match sheets.open_worksheet(SPREADSHEET_NAME, WORKSHEET_NAME).await {
        Ok(worksheet) => worksheet,
        Err(e) => {
            error!(error = %e, "Failed to open conversation log");
            return Err(anyhow::anyhow!("Failed to open conversation log: {}", e));
        }
    };

    // Per-session conversations with idle expiry
    let store = Arc::new(InMemorySessionStore::new(config.session_ttl));
    let sessions: SessionStoreRef = store.clone();
    spawn_session_cleanup(store, config.session_ttl.min(MAX_CLEANUP_INTERVAL));

    let service = Arc::new(ChatProxyService::new(
        config.context.clone(),
        Arc::new(GeminiChatModel::new(gemini_client, sessions)),
        Arc::new(SheetsLogStore::new(worksheet)),
    ));

    let addr = SocketAddr::new(args.host, config.port);
    if let Err(e) = http_server::run_server(service, addr).await {
        error!(error = %e, "HTTP server failed");
        return Err(e);
    }

    info!("NOVA chat proxy shutting down");
    Ok(())
}

fn spawn_session_cleanup(store: Arc<InMemorySessionStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = store.cleanup_expired_sessions().await {
                warn!(error = %e, "Failed to clean up expired sessions");
            }
        }
    });
}
