//! Chatterbox - Peer-to-peer contact messaging
//!
//! Main entry point for the Chatterbox CLI. Runs a single node against a
//! filesystem store with an in-process loopback channel.

use chatterbox::config::{validate_config_result, ChatterboxConfig};
use chatterbox::messages::{CancellationToken, FeedError, Message, PeerHistory};
use chatterbox::peers::{PeerDirectory, PeerUpdate};
use chatterbox::pubsub::LocalHub;
use chatterbox::store::FilesystemStore;
use chatterbox::{Chatterbox, ChatterboxError};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// Chatterbox - broadcast short messages, keep history for friends
#[derive(Parser, Debug)]
#[command(name = "chatterbox")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/chatterbox/config.yaml)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory holding persisted state (default: platform data dir)
    #[arg(short, long, env = "CHATTERBOX_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Peer ID to act as
    #[arg(short, long, env = "CHATTERBOX_PEER_ID", default_value = "self")]
    peer_id: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Broadcast a message to everyone listening
    Broadcast {
        /// Message text
        text: String,
    },

    /// Show the stored history for a peer
    History {
        /// Peer ID (default: yourself)
        peer: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a peer's history every time it changes (Ctrl-C to stop)
    Watch {
        /// Peer ID (default: yourself)
        peer: Option<String>,
    },

    /// Manage friends
    #[command(subcommand)]
    Friend(FriendCommands),

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum FriendCommands {
    /// Mark a peer as a friend
    Add {
        /// Peer ID
        peer: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Stop keeping extended history for a peer
    Remove {
        /// Peer ID
        peer: String,
    },

    /// List friends
    List,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write a default configuration file
    Init,
}

fn main() {
    // Initialize logging
    if let Err(e) = chatterbox::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> chatterbox::Result<()> {
    let config_file = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(ChatterboxConfig::default_path);

    // Config commands don't need a node
    if let Commands::Config(ref cmd) = cli.command {
        return handle_config_command(cmd, &config_file);
    }

    let config = ChatterboxConfig::load_or_default(&config_file)?;
    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tracing::debug!(data_dir = %data_dir.display(), peer_id = %cli.peer_id, "Starting node");

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let hub = LocalHub::new();
        let node = Chatterbox::open(
            Arc::new(hub.node(cli.peer_id.clone())),
            Arc::new(FilesystemStore::new(data_dir)),
            config,
        )
        .await?;

        let result = execute(&node, cli.command).await;
        node.destroy().await?;
        result
    })
}

async fn execute(node: &Chatterbox, command: Commands) -> chatterbox::Result<()> {
    match command {
        Commands::Broadcast { text } => {
            let message = node.messages().broadcast(&text).await?;
            println!("✓ Sent {}", message.id);
        }

        Commands::History { peer, json } => {
            let peer = peer.unwrap_or_else(|| node.peer_id().to_string());
            let history = node.messages().list(&peer).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&history)?);
            } else {
                print_history(&peer, &history);
            }
        }

        Commands::Watch { peer } => {
            let peer = peer.unwrap_or_else(|| node.peer_id().to_string());
            watch(node, &peer).await?;
        }

        Commands::Friend(cmd) => handle_friend_command(node, cmd).await?,

        // Handled before the node starts
        Commands::Config(_) => {}
    }
    Ok(())
}

async fn watch(node: &Chatterbox, peer: &str) -> chatterbox::Result<()> {
    let token = CancellationToken::new();
    let mut feed = node.messages().feed(peer, token.clone())?;

    let ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    while let Some(item) = feed.next().await {
        match item {
            Ok(history) => print_history(peer, &history),
            Err(FeedError::Aborted) => break,
            Err(e) => eprintln!("⚠️  {}", e),
        }
    }
    Ok(())
}

async fn handle_friend_command(node: &Chatterbox, cmd: FriendCommands) -> chatterbox::Result<()> {
    let peers = node.peers();
    match cmd {
        FriendCommands::Add { peer, name } => {
            let mut update = PeerUpdate::friend(true);
            if let Some(name) = name {
                update = update.with_name(name);
            }
            peers.set(&peer, update).await?;
            println!("✓ Added friend '{}'", peer);
        }

        FriendCommands::Remove { peer } => {
            if !peers.is_friend(&peer).await? {
                return Err(ChatterboxError::Other(format!("'{}' is not a friend", peer)));
            }
            peers.set_friend(&peer, false).await?;
            println!("✓ Removed friend '{}'", peer);
        }

        FriendCommands::List => {
            let friends = peers.list_friends().await?;
            if friends.is_empty() {
                println!("No friends yet.");
                println!();
                println!("Add one with:");
                println!("  chatterbox friend add <peer-id>");
            } else {
                println!("Friends ({}):", friends.len());
                for peer_id in friends {
                    let info = peers.get(&peer_id).await?.unwrap_or_default();
                    match info.name {
                        Some(name) => println!("  {} ({})", peer_id, name),
                        None => println!("  {}", peer_id),
                    }
                }
            }
        }
    }
    Ok(())
}

fn handle_config_command(cmd: &ConfigCommands, config_file: &Path) -> chatterbox::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = ChatterboxConfig::load_or_default(config_file)?;
            validate_config_result(&config)?;
            println!("# {}", config_file.display());
            print!("{}", serde_yaml::to_string(&config)?);
        }

        ConfigCommands::Init => {
            if config_file.exists() {
                println!("Configuration already exists at {}", config_file.display());
                return Ok(());
            }
            ChatterboxConfig::new().save(config_file)?;
            println!("✓ Created configuration at {}", config_file.display());
        }
    }
    Ok(())
}

fn default_data_dir() -> chatterbox::Result<PathBuf> {
    let mut path = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("No data directory found; pass --data-dir"))?;
    path.push("chatterbox");
    Ok(path)
}

fn print_history(peer: &str, history: &PeerHistory) {
    println!("{} ({} messages, {} unread)", peer, history.len(), history.unread_count());
    for message in history.iter() {
        print_message(message);
    }
}

fn print_message(message: &Message) {
    let when = message
        .received_time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "?".to_string());
    let marker = if message.is_read() { " " } else { "*" };
    println!("  {} [{}] {}", marker, when, message.text);
}
