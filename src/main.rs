use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meshbot_gateway::transport::{Destination, MeshTransport, MockTransport, TcpTransport};
use meshbot_gateway::{Config, Daemon, TransportKind, db};

/// MeshBot - conversational AI relay for LoRa mesh networks
#[derive(Parser)]
#[command(name = "meshbot", version, about)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "MESHBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Transport kind ("tcp" or "mock")
    #[arg(short, long, env = "MESHBOT_TRANSPORT")]
    transport: Option<String>,

    /// Companion bridge host
    #[arg(long, env = "MESHBOT_HOST")]
    host: Option<String>,

    /// Companion bridge port
    #[arg(long, env = "MESHBOT_PORT")]
    port: Option<u16>,

    /// LLM model to use (e.g. "gpt-4o-mini")
    #[arg(short, long, env = "LLM_MODEL")]
    model: Option<String>,

    /// Data directory (database, system prompt)
    #[arg(long, env = "MESHBOT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Send one message and exit
    Send {
        /// Destination: channel number or node public key
        destination: String,
        /// Message text
        message: String,
    },
    /// List contacts known to the radio
    Contacts,
    /// Show stored relay statistics
    Status,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,meshbot_gateway=info",
        1 => "info,meshbot_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Setup must work before a valid config exists
    if matches!(cli.command, Some(Command::Setup)) {
        return meshbot_gateway::setup::run_setup();
    }

    let mut config = Config::load(cli.config.as_deref())?;

    // CLI flags win over file and environment
    if let Some(transport) = &cli.transport {
        config.transport.kind = transport.parse()?;
    }
    if let Some(host) = cli.host {
        config.transport.host = Some(host);
    }
    if let Some(port) = cli.port {
        config.transport.port = port;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.validate()?;

    if let Some(command) = cli.command {
        return match command {
            Command::Send {
                destination,
                message,
            } => cmd_send(&config, &destination, &message).await,
            Command::Contacts => cmd_contacts(&config).await,
            Command::Status => cmd_status(&config),
            Command::Setup => unreachable!("handled above"),
        };
    }

    tracing::info!(
        transport = %config.transport.kind,
        model = %config.llm.model,
        "starting mesh relay"
    );

    let daemon = Daemon::new(config)?;
    daemon.run().await?;

    Ok(())
}

/// Connect the configured transport for a one-shot command
async fn connect_transport(config: &Config) -> anyhow::Result<Box<dyn MeshTransport>> {
    match config.transport.kind {
        TransportKind::Mock => {
            let mut transport = MockTransport::new();
            transport.connect().await?;
            Ok(Box::new(transport))
        }
        TransportKind::Tcp => {
            let host = config
                .transport
                .host
                .clone()
                .ok_or_else(|| anyhow::anyhow!("tcp transport requires a host"))?;
            let mut transport = TcpTransport::new(host, config.transport.port);
            transport.connect().await?;
            Ok(Box::new(transport))
        }
    }
}

/// Send one message and exit
async fn cmd_send(config: &Config, destination: &str, message: &str) -> anyhow::Result<()> {
    let transport = connect_transport(config).await?;
    let destination = Destination::parse(destination);

    transport.send(&destination, message).await?;
    println!("Message sent to {destination}");
    Ok(())
}

/// List contacts known to the radio
async fn cmd_contacts(config: &Config) -> anyhow::Result<()> {
    let transport = connect_transport(config).await?;
    let contacts = transport.contacts().await?;

    if contacts.is_empty() {
        println!("No contacts available");
        return Ok(());
    }

    println!("Available contacts:");
    for contact in contacts {
        let prefix: String = contact.public_key.chars().take(16).collect();
        match contact.name {
            Some(name) => println!("  {name} ({prefix}...)"),
            None => println!("  {prefix}..."),
        }
    }
    Ok(())
}

/// Show stored relay statistics without connecting the radio
fn cmd_status(config: &Config) -> anyhow::Result<()> {
    let db_path = config.data_dir.join("meshbot.db");
    if !db_path.exists() {
        println!("No database yet at {}", db_path.display());
        return Ok(());
    }

    let pool = db::init(&db_path)?;
    let messages = db::MessageRepo::new(pool.clone());
    let nodes = db::NodeRepo::new(pool);

    println!("Model: {}", config.llm.model);
    println!("Transport: {}", config.transport.kind);
    println!("Messages stored: {}", messages.total()?);
    println!("Nodes tracked: {}", nodes.count()?);
    Ok(())
}
