mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use fastmail_mcp::mcp;
use fastmail_mcp::models::Output;
use std::io;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fastmail-mcp")]
#[command(version, about = "Read-only MCP server and CLI for Fastmail's JMAP API", long_about = None)]
struct Cli {
    /// Account ID (default: primary account)
    #[arg(long, global = true)]
    account: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server over stdio
    Serve,

    /// Verify a Fastmail API token and save it to the config file
    Auth {
        /// API token from Fastmail settings
        token: String,
    },

    /// Read email messages
    #[command(subcommand)]
    Messages(MessageCommands),

    /// Read the address book
    #[command(subcommand)]
    Contacts(ContactCommands),

    /// Read calendars
    #[command(subcommand)]
    Events(EventCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum MessageCommands {
    /// List messages in a mailbox, newest first
    List {
        /// Mailbox name or role (default: INBOX)
        #[arg(short, long)]
        mailbox: Option<String>,

        /// Maximum results (default 25)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Only messages with attachments
        #[arg(long)]
        has_attachment: Option<bool>,
    },

    /// Search messages
    Search {
        /// Sender address or name fragment
        #[arg(long)]
        from: Option<String>,

        /// Subject text
        #[arg(long)]
        subject: Option<String>,

        /// Mailbox name or role
        #[arg(short, long)]
        mailbox: Option<String>,

        /// Read state
        #[arg(long)]
        read: Option<bool>,

        /// Attachment presence
        #[arg(long)]
        has_attachment: Option<bool>,

        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Maximum results (default 25)
        #[arg(short, long)]
        limit: Option<u32>,

        /// Results to skip
        #[arg(long)]
        offset: Option<u32>,

        /// receivedAt, sentAt or subject
        #[arg(long)]
        sort_by: Option<String>,

        /// Oldest first
        #[arg(long)]
        ascending: bool,
    },

    /// Get a message with its body
    Get {
        /// Message ID
        message_id: String,
    },
}

#[derive(Subcommand)]
enum ContactCommands {
    /// List contacts
    List {
        /// Maximum results (default 25)
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum EventCommands {
    /// List events, soonest first
    List {
        /// Calendar name (default: all calendars)
        #[arg(short, long)]
        calendar: Option<String>,

        /// Maximum results (default 25)
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() {
    // stdout carries MCP frames and JSON output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let account = cli.account.as_deref();

    let result = match cli.command {
        Commands::Serve => {
            if let Err(e) = mcp::run_server().await {
                Output::<()>::error(e.to_string(), None).print();
                std::process::exit(1);
            }
            return;
        }

        Commands::Auth { token } => commands::auth(&token).await,

        Commands::Messages(cmd) => match cmd {
            MessageCommands::List {
                mailbox,
                limit,
                has_attachment,
            } => commands::list_messages(mailbox.as_deref(), limit, has_attachment, account).await,
            MessageCommands::Search {
                from,
                subject,
                mailbox,
                read,
                has_attachment,
                since,
                until,
                limit,
                offset,
                sort_by,
                ascending,
            } => {
                commands::search_messages(commands::SearchArgs {
                    account: cli.account.clone(),
                    sender: from,
                    subject,
                    mailbox,
                    read,
                    has_attachment,
                    date_start: since,
                    date_end: until,
                    limit,
                    offset,
                    sort_by,
                    ascending,
                })
                .await
            }
            MessageCommands::Get { message_id } => commands::get_message(&message_id, account).await,
        },

        Commands::Contacts(ContactCommands::List { limit }) => {
            commands::list_contacts(limit, account).await
        }

        Commands::Events(EventCommands::List { calendar, limit }) => {
            commands::list_events(calendar.as_deref(), limit, account).await
        }

        Commands::Completions { shell } => {
            generate(
                shell,
                &mut Cli::command(),
                "fastmail-mcp",
                &mut io::stdout(),
            );
            return;
        }
    };

    if let Err(e) = result {
        Output::<()>::error(e.to_string(), Some(e.code())).print();
        std::process::exit(1);
    }
}
