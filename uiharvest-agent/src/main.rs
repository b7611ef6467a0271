use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uiharvest::{create_platform, KeywordTable};
use uiharvest_agent::utils::init_logging;
use uiharvest_agent::{router, Agent, AgentConfig, AppState};

#[derive(Parser, Debug)]
#[command(
    name = "uiharvest-agent",
    version,
    about = "HTTP agent that launches, captures and closes desktop applications"
)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "UIHARVEST_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "UIHARVEST_PORT", default_value = "5000")]
    port: u16,

    /// Directory screenshots are saved to and served from
    #[arg(long, env = "UIHARVEST_SHARED_DIR", default_value = "shared")]
    shared_dir: PathBuf,

    /// JSON file of extra window-title keywords ({"family": ["keyword", ...]})
    #[arg(long, env = "UIHARVEST_KEYWORDS")]
    keywords: Option<PathBuf>,

    /// Base URL used in screenshot links (defaults to the request's Host)
    #[arg(long, env = "UIHARVEST_PUBLIC_URL")]
    public_url: Option<String>,

    /// Wait after spawning an application before resolving its window
    #[arg(long, env = "UIHARVEST_LAUNCH_SETTLE_MS", default_value = "2000")]
    launch_settle_ms: u64,

    /// Wait after each termination step
    #[arg(long, env = "UIHARVEST_CLOSE_SETTLE_MS", default_value = "1000")]
    close_settle_ms: u64,

    /// Enable CORS for all origins
    #[arg(long)]
    cors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging()?;

    info!("Starting uiharvest-agent v{}", env!("CARGO_PKG_VERSION"));

    let keywords = match &args.keywords {
        Some(path) => KeywordTable::load_with_overrides(path)
            .with_context(|| format!("Failed to load keywords from {}", path.display()))?,
        None => KeywordTable::builtin(),
    };
    info!("Keyword table: {} application families", keywords.len());

    let platform = create_platform().context("Failed to initialize platform")?;
    std::fs::create_dir_all(&args.shared_dir)
        .with_context(|| format!("Failed to create {}", args.shared_dir.display()))?;

    let config = AgentConfig {
        shared_dir: args.shared_dir.clone(),
        launch_settle: Duration::from_millis(args.launch_settle_ms),
        close_settle: Duration::from_millis(args.close_settle_ms),
        self_pid: std::process::id(),
    };
    let state = AppState {
        agent: Arc::new(Agent::new(platform, Arc::new(keywords), config)),
        public_url: args.public_url.clone(),
    };
    let app = router(state, args.cors);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Shared directory: {}", args.shared_dir.display());
    info!("CORS: {}", if args.cors { "enabled" } else { "disabled" });
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
