//! A thin interactive exerciser for the vault engine: enough surface to
//! create a vault, unlock it, add/list/search/delete items, and lock it
//! again. Not a feature-complete password manager UI.

use clap::{Parser, Subcommand};
use dodopass_vault::engine::Vault;
use dodopass_vault::events::{EventSinks, TracingAuditSink};
use dodopass_vault::item::{Item, ItemFields, SecretString};
use dodopass_vault::storage::FileStorageDriver;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Parser, Debug)]
#[command(
    name = "dodopass",
    about = "DodoPass vault engine exerciser",
    long_about = "A minimal command-line front end for the DodoPass vault engine.\n\n\
                  Run with no subcommand to open (or create) the default vault and drop into an\n\
                  interactive session with add/list/search/favorite/delete/lock/quit commands."
)]
struct Cli {
    /// Path to the vault container file.
    #[arg(long, global = true)]
    vault_path: Option<PathBuf>,

    /// Number of rotated backups to retain.
    #[arg(long, default_value_t = 10, global = true)]
    max_backups: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the vault's current state (empty/locked/unlocked) without unlocking.
    Status,
    /// Delete the vault file after confirmation.
    Destroy,
}

fn main() -> dodopass_vault::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let vault_path = cli
        .vault_path
        .clone()
        .unwrap_or_else(|| dodopass_vault::config::VaultConfig::default().vault_path);
    let storage = FileStorageDriver::new(vault_path.clone(), cli.max_backups);
    let client_id = hostname_client_id();
    let events = EventSinks::new(Arc::new(TracingAuditSink));
    let mut vault = Vault::open(storage, events, client_id)?;

    match cli.command {
        Some(Command::Status) => {
            println!("{:?} ({})", vault.state(), vault_path.display());
            Ok(())
        }
        Some(Command::Destroy) => {
            if matches!(vault.state(), dodopass_vault::VaultState::Locked) {
                let password = prompt_password("Master password: ")?;
                vault.unlock(&password)?;
            }
            vault.destroy()?;
            println!("vault destroyed");
            Ok(())
        }
        None => run_session(&mut vault),
    }
}

fn run_session(vault: &mut Vault<FileStorageDriver>) -> dodopass_vault::Result<()> {
    match vault.state() {
        dodopass_vault::VaultState::Empty => {
            println!("no vault found — creating one");
            let password = prompt_password("New master password: ")?;
            let confirm = prompt_password("Confirm master password: ")?;
            if password != confirm {
                eprintln!("passwords did not match");
                return Ok(());
            }
            vault.create(&password, now())?;
        }
        dodopass_vault::VaultState::Locked => {
            let password = prompt_password("Master password: ")?;
            vault.unlock(&password)?;
        }
        dodopass_vault::VaultState::Unlocked => {}
    }

    println!("unlocked. type `help` for commands.");
    repl(vault)
}

fn repl(vault: &mut Vault<FileStorageDriver>) -> dodopass_vault::Result<()> {
    loop {
        print!("dodopass> ");
        io::stdout().flush().ok();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        let mut parts = line.splitn(2, ' ');
        match parts.next().unwrap_or("") {
            "" => {}
            "help" => print_help(),
            "list" => {
                for item in vault.items()? {
                    println!("{}  {}  [{}]", item.id, item.title, item.fields.category());
                }
            }
            "search" => {
                let query = parts.next().unwrap_or("").trim();
                for id in vault.search(query)? {
                    println!("{id}");
                }
            }
            "add" => {
                let title = parts.next().unwrap_or("").trim();
                if title.is_empty() {
                    eprintln!("usage: add <title>");
                    continue;
                }
                let username = prompt_line("username: ")?;
                let password = prompt_password("password: ")?;
                let item = Item::new(
                    title,
                    ItemFields::Login {
                        username,
                        password: SecretString::new(password),
                        urls: vec![],
                        totp_secret: None,
                        notes: String::new(),
                        password_history: vec![],
                    },
                    now(),
                );
                let id = vault.add_item(item, now())?;
                println!("added {id}");
            }
            "delete" => {
                let id = parts.next().unwrap_or("").trim();
                match id.parse() {
                    Ok(id) => vault.delete_item(id, now())?,
                    Err(_) => {
                        eprintln!("usage: delete <uuid>");
                        continue;
                    }
                }
            }
            "lock" => {
                vault.lock();
                println!("locked");
                break;
            }
            "quit" | "exit" => break,
            other => eprintln!("unknown command: {other} (try `help`)"),
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        "commands:\n  list\n  search <query>\n  add <title>\n  delete <uuid>\n  lock\n  quit"
    );
}

fn prompt_line(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(prompt: &str) -> io::Result<String> {
    rpassword::prompt_password(prompt)
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

fn hostname_client_id() -> String {
    std::env::var("DODOPASS_CLIENT_ID").unwrap_or_else(|_| {
        hostname_or_fallback()
    })
}

fn hostname_or_fallback() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "dodopass-client".to_string())
}
