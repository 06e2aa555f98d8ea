mod config_commands;
mod host;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    parley_auto_reply::{Assistant, RequestProcessor},
    parley_channels::PermissionChecker,
    parley_config::{ConfigStore, ParleyConfig},
    parley_providers::{ImageRequest, ProviderRegistry},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::host::{EmptyConversations, StdoutSink, TeamRoster};

#[derive(Parser)]
#[command(name = "parley", about = "Parley: an LLM assistant for team chat")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to load instead of searching the standard locations.
    #[arg(long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Send one prompt to the configured language model.
    Ask {
        #[arg(short, long)]
        message: String,
    },
    /// Generate images with the configured generator.
    Imagine {
        #[arg(short, long)]
        prompt: String,
        /// Image size such as 1024x1024.
        #[arg(long)]
        size: Option<String>,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Feed recorded chat events through the assistant, printing replies.
    Replay {
        /// JSON-lines file of `{"message": .., "channel": ..}` events.
        #[arg(long)]
        events: PathBuf,
        /// User id of the assistant's own account.
        #[arg(long, env = "PARLEY_BOT_ID", default_value = "parley-bot")]
        bot_id: String,
        /// JSON object mapping team ids to member user ids.
        #[arg(long)]
        roster: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so replies on stdout stay clean.
    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one.
fn load(path: Option<&Path>) -> anyhow::Result<ParleyConfig> {
    match path {
        Some(path) => parley_config::load_config(path),
        None => Ok(parley_config::discover_and_load()),
    }
}

fn build_assistant(
    config: ParleyConfig,
    bot_id: &str,
    permissions: Arc<dyn PermissionChecker>,
) -> Assistant {
    let processor = RequestProcessor::new(
        bot_id,
        Arc::new(ProviderRegistry::with_defaults()),
        permissions,
        Arc::new(StdoutSink),
        Arc::new(EmptyConversations),
    );
    Assistant::new(Arc::new(ConfigStore::new(config)), processor)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "parley starting");

    match cli.command {
        Commands::Config { action } => config_commands::handle_config(action),
        Commands::Ask { ref message } => {
            let assistant = build_assistant(
                load(cli.config.as_deref())?,
                "parley-cli",
                Arc::new(TeamRoster::default()),
            );
            match assistant.ask(message).await? {
                Some(text) => println!("{text}"),
                None => eprintln!("(empty response)"),
            }
            Ok(())
        },
        Commands::Imagine {
            ref prompt,
            ref size,
            count,
        } => {
            let assistant = build_assistant(
                load(cli.config.as_deref())?,
                "parley-cli",
                Arc::new(TeamRoster::default()),
            );
            let mut request = ImageRequest::new(prompt.as_str());
            request.size = size.clone();
            request.count = count.max(1);
            let images = assistant.generate_image(&request).await?;
            println!("{}", serde_json::to_string_pretty(&images)?);
            Ok(())
        },
        Commands::Replay {
            ref events,
            ref bot_id,
            ref roster,
        } => replay(load(cli.config.as_deref())?, events, bot_id, roster.as_deref()).await,
    }
}

async fn replay(
    config: ParleyConfig,
    events: &Path,
    bot_id: &str,
    roster: Option<&Path>,
) -> anyhow::Result<()> {
    let roster = match roster {
        Some(path) => TeamRoster::from_file(path)?,
        None => TeamRoster::default(),
    };
    let raw = std::fs::read_to_string(events)
        .with_context(|| format!("failed to read events {}", events.display()))?;
    let events = host::parse_events(&raw)?;

    let assistant = build_assistant(config, bot_id, Arc::new(roster));
    let mut tally: BTreeMap<&'static str, usize> = BTreeMap::new();
    for event in &events {
        let outcome = assistant.on_message(&event.message, &event.channel).await;
        eprintln!("{} -> {outcome:?}", event.message.id);
        *tally.entry(outcome.as_str()).or_default() += 1;
    }

    info!(events = events.len(), ?tally, "replay finished");
    Ok(())
}
