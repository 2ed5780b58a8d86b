use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use loom_core::locale::Locale;
use loom_core::task::OutputFormat;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::context::AppContext;

const DEFAULT_LOG_FILTER: &str =
    "warn,loom_cli=info,loom_core=info,loom_application=info,loom_infrastructure=info,loom_interaction=info";

#[derive(Parser)]
#[command(name = "loom")]
#[command(about = "Loom - stream AI-generated documents into a local workspace", long_about = None)]
struct Cli {
    /// Directory holding the workspace and settings files
    #[arg(long, global = true, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Interface language for prompts and derived names (zh, en)
    #[arg(long, global = true)]
    locale: Option<Locale>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage workspace documents
    Doc {
        #[command(subcommand)]
        action: DocAction,
    },
    /// Show or edit the stored generation task
    Task {
        /// What the document should be
        #[arg(long)]
        description: Option<String>,
        /// Constraints for the output
        #[arg(long)]
        requirements: Option<String>,
        /// Output format (plaintext, markdown, csv, json)
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Manage API settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Stream a generation into the active document
    Generate {
        /// Document to activate before generating (id, id prefix or name)
        #[arg(long)]
        document: Option<String>,
        /// Overrides the stored task description
        #[arg(long)]
        description: Option<String>,
        /// Overrides the stored requirements
        #[arg(long)]
        requirements: Option<String>,
        /// Output format; derived from the document name when omitted
        #[arg(long)]
        format: Option<OutputFormat>,
    },
    /// Delete every document and clear the stored task
    Reset,
}

#[derive(Subcommand)]
pub enum DocAction {
    /// Create a document
    New {
        name: String,
        /// Make the new document active
        #[arg(long)]
        activate: bool,
    },
    /// List documents
    List,
    /// Print a document's content
    Show { document: String },
    /// Delete a document
    Rm { document: String },
    /// Rename a document
    Rename { document: String, name: String },
    /// Duplicate a document
    Dup { document: String },
    /// Set the active document (generation target)
    Activate {
        document: Option<String>,
        /// Clear the active document instead
        #[arg(long, conflicts_with = "document")]
        none: bool,
    },
    /// Add a document to the prompt context
    Include { document: String },
    /// Remove a document from the prompt context
    Exclude { document: String },
    /// Replace a document's content from a file or stdin
    Write {
        document: String,
        /// Read content from this file instead of stdin
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the settings with the API key masked
    Show,
    /// Update individual settings
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        /// Base URL of an OpenAI-compatible API
        #[arg(long)]
        api_endpoint: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        theme: Option<String>,
    },
    /// Restore default settings
    Reset,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// Single-threaded so that a failure notification is already queued when the
// session's phase change wakes the command.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let ctx = AppContext::open(cli.config_dir, cli.locale).await?;

    match cli.command {
        Commands::Doc { action } => commands::doc::run(&ctx, action).await?,
        Commands::Task {
            description,
            requirements,
            format,
        } => commands::task::run(&ctx, description, requirements, format).await?,
        Commands::Settings { action } => commands::settings::run(&ctx, action).await?,
        Commands::Generate {
            document,
            description,
            requirements,
            format,
        } => {
            let overrides = commands::generate::TaskOverrides {
                description,
                requirements,
                format,
            };
            commands::generate::run(&ctx, document, overrides).await?
        }
        Commands::Reset => {
            ctx.workspace.reset().await?;
            println!("✅ Workspace cleared");
        }
    }

    Ok(())
}
