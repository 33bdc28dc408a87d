//! CLI module: command parsing and dispatch

mod agents;
mod chat;
mod common;
mod config;
mod sessions;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use agentry::config::RuntimeSettings;

#[derive(Parser)]
#[command(name = "agentry")]
#[command(version)]
#[command(about = "Registry and orchestration runtime for configuration-driven agents")]
struct Cli {
    /// Settings file (default: ~/.agentry/settings.yaml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information
    Version,
    /// Inspect registered agents
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },
    /// Send one request to an agent and print the response envelope
    Chat {
        /// Agent to route the request to
        #[arg(short, long)]
        agent: String,
        /// Plain-text query
        #[arg(short, long, conflicts_with = "json")]
        query: Option<String>,
        /// Structured query as a JSON object or a list of conversation turns
        #[arg(long)]
        json: Option<String>,
        /// User identifier (random if omitted)
        #[arg(long)]
        user: Option<String>,
        /// Session identifier (random if omitted)
        #[arg(long)]
        session: Option<String>,
        /// Feature override as name=value; repeatable
        #[arg(short, long = "feature", value_name = "NAME=VALUE")]
        features: Vec<String>,
    },
    /// Inspect conversation sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Validate agent configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum AgentsAction {
    /// List registered agents
    List,
    /// Show one agent and construct it to report its tools
    Describe {
        /// Agent name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List sessions of one agent or of every registered agent
    List {
        /// Restrict to this agent
        #[arg(long)]
        agent: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check an agent YAML file for errors and warnings
    Check {
        /// Path to the agent.yaml file
        path: PathBuf,
    },
    /// Print the effective runtime settings
    Show,
}

/// Entry point for the CLI, called from main().
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => RuntimeSettings::load_from_path(path)?,
        None => RuntimeSettings::load()?,
    };
    agentry::utils::logging::init_logging(&settings.logging)?;

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Version) => {
            cmd_version();
        }
        Some(Commands::Agents { action }) => {
            agents::cmd_agents(settings, action).await?;
        }
        Some(Commands::Chat {
            agent,
            query,
            json,
            user,
            session,
            features,
        }) => {
            let args = chat::ChatArgs {
                agent,
                query,
                json,
                user,
                session,
                features,
            };
            chat::cmd_chat(settings, args).await?;
        }
        Some(Commands::Sessions { action }) => {
            sessions::cmd_sessions(settings, action).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(&settings, action)?;
        }
    }

    Ok(())
}

fn cmd_version() {
    println!("agentry {}", env!("CARGO_PKG_VERSION"));
}
