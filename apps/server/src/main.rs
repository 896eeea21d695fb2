mod client;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use courier_config::{load as load_config, AppConfig};
use courier_database::{Contact, Direction, Message, MessageRecord, MessageStatus};
use courier_gateway::build_router;
use courier_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

use crate::client::CourierClient;

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Courier conversation sync server (serves by default)")]
struct Cli {
    /// Base URL of a running server, for `send` and `watch`
    #[arg(long, global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Serve,
    /// Print every conversation stored in the database
    DumpData,
    /// Post a message to a running server's receive webhook
    Send {
        /// Contact identifier the message belongs to
        #[arg(long)]
        conversation: String,
        #[arg(long)]
        content: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Defaults to the conversation identifier
        #[arg(long)]
        number: Option<String>,
        /// Generated when omitted
        #[arg(long)]
        message_id: Option<String>,
        #[arg(long, default_value = "outgoing")]
        direction: Direction,
        #[arg(long, default_value = "sent")]
        status: MessageStatus,
    },
    /// Follow a running server's live events
    Watch {
        /// Conversation whose typing signals are shown
        #[arg(long)]
        conversation: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;
    let base_url = cli
        .url
        .unwrap_or_else(|| format!("http://{}:{}", config.http.address, config.http.port));

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(&config).await,
        Commands::DumpData => dump_data(&config).await,
        Commands::Send {
            conversation,
            content,
            name,
            number,
            message_id,
            direction,
            status,
        } => {
            let record = MessageRecord::new(
                Contact {
                    name,
                    number: number.unwrap_or_else(|| conversation.clone()),
                },
                Message {
                    conversation_id: conversation,
                    message_id: message_id.unwrap_or_else(cuid2::create_id),
                    direction,
                    content,
                    timestamp: Utc::now(),
                    status,
                },
            );
            send_message(&base_url, record).await
        }
        Commands::Watch { conversation } => {
            client::watch(
                CourierClient::new(base_url),
                conversation,
                config.realtime.typing_timeout(),
            )
            .await
        }
    }
}

async fn run_server(config: &AppConfig) -> anyhow::Result<()> {
    info!("starting Courier sync server");

    let services = BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")?;

    let app = build_router(services.gateway_state(config));

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(courier_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    info!("server shut down");
    Ok(())
}

async fn dump_data(config: &AppConfig) -> anyhow::Result<()> {
    info!("dumping conversations from database");

    let services = BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")?;

    let conversations = services.engine.history().await;

    println!("=== CONVERSATIONS ===");
    if conversations.is_empty() {
        println!("No conversations found in database");
        return Ok(());
    }

    println!("Found {} conversations:", conversations.len());
    for conversation in conversations {
        println!(
            "\n{} ({}, {} messages)",
            conversation.conversation_id,
            if conversation.name.is_empty() {
                conversation.number.as_str()
            } else {
                conversation.name.as_str()
            },
            conversation.messages.len()
        );
        println!(
            "{:<28} {:<10} {:<10} {:<32} {:<50}",
            "Message ID", "Direction", "Status", "Timestamp", "Content (truncated)"
        );
        println!("{}", "-".repeat(130));

        for message in conversation.messages {
            println!(
                "{:<28} {:<10} {:<10} {:<32} {:<50}",
                message.message_id,
                message.direction.as_str(),
                message.status.as_str(),
                message.timestamp.to_rfc3339(),
                truncate(&message.content, 47)
            );
        }
    }

    Ok(())
}

async fn send_message(base_url: &str, record: MessageRecord) -> anyhow::Result<()> {
    let client = CourierClient::new(base_url);
    let response = client.send_message(&record).await?;

    if response.duplicate {
        println!(
            "Message {} was already stored in {}",
            record.message_id(),
            record.conversation_id()
        );
    } else {
        println!(
            "Sent message {} to {}",
            record.message_id(),
            record.conversation_id()
        );
    }
    Ok(())
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() > max_chars {
        let prefix: String = content.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{prefix}...")
    } else {
        content.to_string()
    }
}
