mod cli;

use anyhow::Context;
use cardkeep_lib::cache::{CacheDb, LocalCache};
use cardkeep_lib::commands::CommandError;
use cardkeep_lib::config::{self, ClientConfig, ServerConfig};
use cardkeep_lib::remote::HttpRemote;
use cardkeep_lib::{server, SyncController};
use clap::Parser;
use cli::{Cli, Command};

type Controller = SyncController<HttpRemote, CacheDb>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cardkeep_lib::init_tracing();
    let data_dir = config::data_dir();

    match cli.cmd {
        Command::Serve { bind, db } => {
            let config = ServerConfig::resolve(bind, db, &data_dir);
            server::start_server(&config).await?;
            Ok(())
        }
        cmd => {
            let config = ClientConfig::resolve(cli.api_url, cli.cache, &data_dir);
            run_client(&config, cmd).await
        }
    }
}

async fn run_client(config: &ClientConfig, cmd: Command) -> anyhow::Result<()> {
    let cache = CacheDb::new(&config.cache_path)
        .with_context(|| format!("Failed to open local cache {:?}", config.cache_path))?;
    let mut controller: Controller =
        SyncController::open(HttpRemote::new(&config.api_url), LocalCache::new(cache));

    // refresh from the server first, like a fresh page load; a manual push
    // must send the local copy as it is
    let pulled = match cmd {
        Command::Push => Ok(()),
        _ => controller.pull().await,
    };

    match cmd {
        Command::Serve { .. } => anyhow::bail!("serve is not a client command"),
        Command::Status => print_status(&controller),
        Command::Pull => {
            pulled?;
            print_status(&controller);
        }
        Command::Push => controller.push().await?,
        Command::List { type_id } => {
            let type_id = type_id.unwrap_or_else(|| controller.active_type().to_string());
            controller.select_type(&type_id)?;
            print_list(&controller, &type_id);
        }
        Command::Import { type_id, text } => {
            let raw = match text {
                Some(text) => text,
                None => std::io::read_to_string(std::io::stdin())
                    .context("Failed to read cards from stdin")?,
            };
            let added = controller.import(&type_id, &raw).await?;
            println!("Imported {} cards into {}", added, type_id);
        }
        Command::Copy { type_id, index } => {
            let copied = controller.copy(&type_id, index).await?;
            println!("{}", copied.text);
        }
        Command::ClearCopied { type_id } => {
            if let Some(type_id) = type_id {
                controller.select_type(&type_id)?;
            }
            let removed = controller.clear_copied().await?;
            println!("Removed {} copied cards from {}", removed, controller.active_type());
        }
        Command::AddType {
            name,
            allow_duplicate,
            count,
        } => {
            let id = controller.add_type(&name, allow_duplicate, count).await?;
            println!("Added type {}", id);
        }
        Command::EditType {
            type_id,
            allow_duplicate,
            count,
        } => {
            let current = controller
                .store()
                .card_type(&type_id)
                .cloned()
                .ok_or_else(|| CommandError::UnknownType(type_id.clone()))?;
            let (allow_duplicate, count) = cli::edit_settings(&current, allow_duplicate, count);
            let removed = controller
                .update_type_settings(&type_id, allow_duplicate, count)
                .await?;
            if removed > 0 {
                println!("Removed {} duplicate cards from {}", removed, type_id);
            }
        }
        Command::RenameType { type_id, name } => controller.rename_type(&type_id, &name).await?,
        Command::DeleteType { type_id } => controller.delete_type(&type_id).await?,
        Command::Template { type_id, text } => controller.update_template(&type_id, &text).await?,
    }

    eprintln!("Sync status: {}", controller.status());
    Ok(())
}

fn print_status(controller: &Controller) {
    for card_type in &controller.store().card_types {
        let summary = controller.summary(&card_type.id);
        let duplicates = if card_type.allow_duplicate {
            format!(", duplicates x{}", card_type.duplicate_count)
        } else {
            String::new()
        };
        println!(
            "{} ({}): {} cards, {} copied{}",
            card_type.id, card_type.name, summary.total, summary.copied, duplicates
        );
    }
}

fn print_list(controller: &Controller, type_id: &str) {
    let cards = controller.store().cards_of(type_id);
    if cards.is_empty() {
        println!("No cards yet, import some first.");
        return;
    }
    for (index, card) in cards.iter().enumerate() {
        let marker = if card.copied { "copied" } else { "" };
        println!("{:>4}  {:<6}  {}", index, marker, card.value);
    }
    let summary = controller.summary(type_id);
    println!("{} cards, {} copied", summary.total, summary.copied);
}
