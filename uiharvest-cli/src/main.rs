use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::info;
use uiharvest::KeywordTable;
use uiharvest_agent::utils::init_logging;
use uiharvest_cli::orchestrator::minimum_duration;
use uiharvest_cli::picker::RandomPicker;
use uiharvest_cli::{ExploreConfig, HttpAgentClient, Orchestrator};

#[derive(Parser)]
#[command(name = "uiharvest", version)]
#[command(about = "Explore desktop applications through a uiharvest agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser, Debug)]
struct ExploreArgs {
    /// Session config file (YAML or JSON)
    #[clap(long, short = 'c')]
    config: Option<PathBuf>,

    /// Application name, used for window matching and the artifact folder
    #[clap(long)]
    app_name: Option<String>,

    /// Executable path on the agent's machine
    #[clap(long)]
    exe_path: Option<String>,

    /// Seconds to wait after each launch
    #[clap(long)]
    wait_time: Option<u64>,

    /// Agent base URL
    #[clap(long, env = "UIHARVEST_AGENT_URL")]
    agent_url: Option<String>,

    /// Directory artifacts are written under
    #[clap(long)]
    data_root: Option<PathBuf>,

    /// Number of capture cycles after the baseline
    #[clap(long)]
    cycles: Option<u32>,

    /// Capture attempts before a capture is given up
    #[clap(long)]
    capture_attempts: Option<u32>,

    /// Click a random baseline element each cycle
    #[clap(long)]
    interact: bool,

    /// Seed for the element picker
    #[clap(long)]
    seed: Option<u64>,

    /// Skip overlay images
    #[clap(long)]
    no_overlay: bool,
}

impl ExploreArgs {
    fn into_config(self) -> Result<ExploreConfig> {
        let mut config = match &self.config {
            Some(path) => ExploreConfig::load(path)?,
            None => ExploreConfig::new(
                self.app_name.clone().unwrap_or_default(),
                self.exe_path.clone().unwrap_or_default(),
            ),
        };
        if let Some(app_name) = self.app_name {
            config.app_name = app_name;
        }
        if let Some(exe_path) = self.exe_path {
            config.exe_path = exe_path;
        }
        if let Some(wait_time) = self.wait_time {
            config.wait_time_secs = wait_time;
        }
        if let Some(agent_url) = self.agent_url {
            config.agent_url = agent_url;
        }
        if let Some(data_root) = self.data_root {
            config.data_root = data_root;
        }
        if let Some(cycles) = self.cycles {
            config.cycles = cycles;
        }
        if let Some(capture_attempts) = self.capture_attempts {
            config.capture_attempts = capture_attempts;
        }
        if self.interact {
            config.interact = true;
        }
        if self.no_overlay {
            config.overlay = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Parser, Debug)]
struct KeywordsArgs {
    /// Extra keyword families merged over the built-in table
    #[clap(long)]
    file: Option<PathBuf>,

    /// Only print this family
    #[clap(long)]
    family: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an exploration session against an agent
    Explore(ExploreArgs),
    /// Print the effective window-title keyword table as JSON
    Keywords(KeywordsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Commands::Explore(args) => explore(args).await,
        Commands::Keywords(args) => print_keywords(args),
    }
}

async fn explore(args: ExploreArgs) -> Result<()> {
    let seed = args.seed;
    let config = args.into_config()?;
    info!(
        "Exploring {} via {} ({} cycles, at least {:?})",
        config.app_name,
        config.agent_url,
        config.cycles,
        minimum_duration(&config)
    );

    let client = HttpAgentClient::new(&config.agent_url)?;
    let picker = match seed {
        Some(seed) => RandomPicker::seeded(seed),
        None => RandomPicker::new(),
    };
    let mut orchestrator = Orchestrator::new(client, config)?.with_picker(Box::new(picker));
    let report = orchestrator
        .run_session()
        .await
        .context("Failed to write session report")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.is_completed() {
        bail!("Session aborted");
    }
    Ok(())
}

fn print_keywords(args: KeywordsArgs) -> Result<()> {
    let table = match &args.file {
        Some(path) => KeywordTable::load_with_overrides(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => KeywordTable::builtin(),
    };

    let output = match &args.family {
        Some(family) => serde_json::to_string_pretty(&table.keywords_for(family))?,
        None => {
            let all: BTreeMap<&str, &[String]> = table.iter().collect();
            serde_json::to_string_pretty(&all)?
        }
    };
    println!("{output}");
    Ok(())
}
