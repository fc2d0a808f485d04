use cardkeep_lib::CardType;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cardkeep")]
#[command(about = "Import, copy and sync card codes")]
pub struct Cli {
    /// Base URL of the card server
    #[arg(long, env = "CARDKEEP_API_URL", global = true)]
    pub api_url: Option<String>,
    /// Local cache database
    #[arg(long, env = "CARDKEEP_CACHE", global = true)]
    pub cache: Option<PathBuf>,
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve GET/PUT /api/cards
    Serve {
        #[arg(long, env = "CARDKEEP_BIND")]
        bind: Option<SocketAddr>,
        #[arg(long, env = "CARDKEEP_DB")]
        db: Option<PathBuf>,
    },
    Status,
    List {
        #[arg(long = "type")]
        type_id: Option<String>,
    },
    Pull,
    /// Retry sending the local state to the server
    Push,
    /// Import codes from TEXT, or stdin when omitted
    Import {
        #[arg(long = "type")]
        type_id: String,
        text: Option<String>,
    },
    Copy {
        #[arg(long = "type")]
        type_id: String,
        index: usize,
    },
    ClearCopied {
        #[arg(long = "type")]
        type_id: Option<String>,
    },
    AddType {
        name: String,
        #[arg(long)]
        allow_duplicate: bool,
        #[arg(long, default_value_t = 1)]
        count: i64,
    },
    /// Change duplicate settings; omitted flags keep the current value
    EditType {
        type_id: String,
        #[arg(long, value_name = "true|false")]
        allow_duplicate: Option<bool>,
        #[arg(long)]
        count: Option<i64>,
    },
    RenameType {
        type_id: String,
        name: String,
    },
    DeleteType {
        type_id: String,
    },
    /// Set a type's copy template; an empty TEXT restores the default
    Template {
        type_id: String,
        text: String,
    },
}

/// Settings for `edit-type`, taking unset flags from the type as it is now
pub fn edit_settings(
    current: &CardType,
    allow_duplicate: Option<bool>,
    count: Option<i64>,
) -> (bool, i64) {
    (
        allow_duplicate.unwrap_or(current.allow_duplicate),
        count.unwrap_or(i64::from(current.duplicate_count)),
    )
}
