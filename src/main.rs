//! Main module for the rag_chatbot CLI application (ragbot).
//!
//! Parses the command line, loads the configuration, indexes the corpus and
//! either reports the index or enters the chat loop.
//!
//! # Examples
//!
//! ```sh
//! ragbot init
//! ragbot --documents "documents/*.pdf"
//! ragbot ingest --document-log off
//! RUST_LOG=rag_chatbot=debug ragbot chat
//! ```

use clap::Parser;
use once_cell::sync::OnceCell;
use std::{
    error::Error,
    fs,
    io::{IsTerminal, stdout},
    path::Path,
    sync::Arc,
};
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rag_chatbot::{
    advisor::documents::stdout_writer,
    client::ChatClient,
    commands::{Cli, Commands},
    config::{self, ChatbotConfig},
    config_dir,
    embedding, ingest,
    model::OpenAiChatModel,
    repl::ChatLoop,
};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

/// Main asynchronous function of the ragbot CLI application.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the corpus cannot
/// be indexed, or the terminal cannot be read or written.
async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_default();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.yaml"),
    };

    if command == Commands::Init {
        return init(&config_path);
    }

    debug!("Loading config from: {}", config_path.display());
    let mut chatbot_config = config::load_config(&config_path.to_string_lossy())?;
    cli.apply_overrides(&mut chatbot_config);
    chatbot_config.validate()?;
    debug!("Config loaded: {:?}", chatbot_config);

    let embedder = embedding::from_config(&chatbot_config)?;
    let (store, report) = ingest::ingest(&chatbot_config, embedder.as_ref()).await?;
    info!("Ingestion finished: {:?}", report);

    match command {
        Commands::Ingest => {
            let origin = if report.reused_snapshot { " (from snapshot)" } else { "" };
            println!(
                "Indexed {} chunk(s) from {} file(s){}",
                report.chunks, report.files, origin
            );
        }
        Commands::Chat | Commands::Init => {
            let model = OpenAiChatModel::new(
                embedding::openai_client(&chatbot_config),
                chatbot_config.model.clone(),
            )
            .with_temperature(chatbot_config.temperature);
            let client = ChatClient::from_config(
                &chatbot_config,
                embedder,
                Arc::new(store),
                Arc::new(model),
                stdout_writer(),
            );
            debug!("Advisor chain: {:?}", client.advisor_names());

            let mut out = stdout();
            let styled = out.is_terminal();
            ChatLoop::new(&client, chatbot_config.application_name.clone())
                .styled(styled)
                .run(BufReader::new(tokio::io::stdin()), &mut out)
                .await?;
        }
    }

    Ok(())
}

/// Write a default configuration file to `config_path`, keeping any existing one.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        return Ok(());
    }
    if let Some(parent) = config_path.parent() {
        info!("Creating config directory: {}", parent.display());
        fs::create_dir_all(parent)?;
    }

    info!("Creating config file: {}", config_path.display());
    // api_key stays empty so OPENAI_API_KEY is used until the file sets one
    let config_yaml = serde_yaml::to_string(&ChatbotConfig::default())?;
    fs::write(config_path, config_yaml)?;
    println!("Wrote default config to {}", config_path.display());
    Ok(())
}
