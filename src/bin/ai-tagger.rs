//! AI tagger CLI
//!
//! Usage:
//!   ai-tagger [plugin]                      (invocation JSON on stdin)
//!   ai-tagger tag-images [--server-url URL] [--api-key KEY] [--config PATH]
//!   ai-tagger tag-scenes [--server-url URL] [--api-key KEY] [--config PATH]

use ai_tagger::config::CONFIG_FILE_NAME;
use ai_tagger::plugin::{self, HostProgress, PluginMode, PluginOutput, ServerConnection};
use ai_tagger::{
    logging, HttpAiClient, LogProgress, ProgressReporter, RunSummary, StashClient, Tagger,
    TaggerConfig, TaggerError, TaggerResult,
};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "ai-tagger",
    version,
    about = "Tag media library images and scenes with an AI inference service"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run as a host plugin, reading the invocation from stdin (default)
    Plugin,
    /// Tag every image carrying the tagme tag
    TagImages(DirectArgs),
    /// Tag every scene carrying the tagme tag
    TagScenes(DirectArgs),
}

#[derive(Args)]
struct DirectArgs {
    /// Media library base URL
    #[arg(long, default_value = "http://localhost:9999")]
    server_url: String,
    /// Media library API key
    #[arg(long)]
    api_key: Option<String>,
    /// Path to the YAML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Plugin) {
        Commands::Plugin => run_plugin().await,
        Commands::TagImages(args) => run_direct(args, PluginMode::TagImages).await,
        Commands::TagScenes(args) => run_direct(args, PluginMode::TagScenes).await,
    }
}

/// Default config location for direct runs (~/.config/ai-tagger/ai_tagger.yml).
fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("ai-tagger").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

async fn connect(
    connection: &ServerConnection,
    config: TaggerConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> TaggerResult<Tagger> {
    let library = StashClient::from_connection(connection).map_err(TaggerError::Connect)?;
    tracing::debug!(endpoint = library.endpoint(), "media library");
    let ai = HttpAiClient::new(
        config.api_base_url.clone(),
        config.frame_interval,
        config.ai_video_threshold,
    )?;
    Tagger::initialize(Arc::new(library), Arc::new(ai), config, reporter).await
}

async fn run_mode(tagger: &Tagger, mode: PluginMode) -> TaggerResult<Option<RunSummary>> {
    match mode {
        PluginMode::TagImages => tagger.tag_images().await.map(Some),
        PluginMode::TagScenes => tagger.tag_scenes().await.map(Some),
        PluginMode::Idle => {
            tracing::info!("no mode requested; nothing to tag");
            Ok(None)
        }
    }
}

async fn run_plugin() -> anyhow::Result<()> {
    logging::init_plugin_logging()?;

    let result = async {
        let input = plugin::read_input(std::io::stdin().lock())?;
        if let Some(dir) = &input.server_connection.plugin_dir {
            std::env::set_current_dir(dir).map_err(|source| TaggerError::WorkingDirectory {
                path: dir.clone(),
                source,
            })?;
        }
        let config = TaggerConfig::load(Path::new(CONFIG_FILE_NAME))?;
        let tagger = connect(&input.server_connection, config, Arc::new(HostProgress)).await?;
        run_mode(&tagger, input.mode()).await?;
        Ok::<_, TaggerError>(())
    }
    .await;

    if let Err(e) = &result {
        tracing::error!(error = %e, "run aborted");
    }
    result?;

    plugin::write_output(std::io::stdout().lock(), &PluginOutput::ok())?;
    Ok(())
}

async fn run_direct(args: DirectArgs, mode: PluginMode) -> anyhow::Result<()> {
    logging::init_cli_logging()?;

    let config_path = args.config.unwrap_or_else(default_config_path);
    let config = TaggerConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let connection = ServerConnection::from_url(&args.server_url, args.api_key);

    let tagger = connect(&connection, config, Arc::new(LogProgress)).await?;
    if let Some(summary) = run_mode(&tagger, mode).await? {
        println!(
            "{} units: {} tagged, {} errored, {} skipped",
            summary.units, summary.tagged, summary.errored, summary.skipped
        );
    }
    Ok(())
}
