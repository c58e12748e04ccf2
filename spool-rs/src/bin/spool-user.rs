//! Operator tool for the local directory and the blacklist
//!
//! # Usage
//!
//! ```bash
//! # Manage local directory users
//! spool-user add alice password123 --db sqlite://users.db
//! spool-user delete alice
//! spool-user list
//! spool-user exists alice
//!
//! # Inspect or clean up the blacklist
//! spool-user blacklist list --file ./blacklist.txt
//! spool-user blacklist prune
//! ```

use anyhow::bail;
use clap::{Parser, Subcommand};
use spool_rs::config::StorageConfig;
use spool_rs::security::LocalDirectory;
use spool_rs::storage::BlacklistStore;
use spool_rs::utils::validate_username;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spool-user")]
#[command(about = "Manage spool-rs users and the blacklist", long_about = None)]
struct Cli {
    /// Local directory database URL
    #[arg(short, long, default_value = "sqlite://users.db")]
    db: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Directory(DirectoryCommands),
    /// Blacklist maintenance
    Blacklist {
        /// Blacklist file (defaults to the server's default location)
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[command(subcommand)]
        command: BlacklistCommands,
    },
}

#[derive(Subcommand)]
enum DirectoryCommands {
    /// Add a new user
    Add {
        username: String,
        password: String,
    },
    /// Delete a user
    Delete { username: String },
    /// List all users
    List,
    /// Check if user exists
    Exists { username: String },
}

#[derive(Subcommand)]
enum BlacklistCommands {
    /// Show all entries
    List,
    /// Remove expired entries
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Blacklist { file, command } => {
            let path = file.unwrap_or_else(|| StorageConfig::default().blacklist_file());
            run_blacklist(BlacklistStore::new(path), command).await
        }
        Commands::Directory(command) => {
            let directory = LocalDirectory::new(&cli.db).await?;
            run_directory(&directory, command).await
        }
    }
}

async fn run_directory(directory: &LocalDirectory, command: DirectoryCommands) -> anyhow::Result<()> {
    match command {
        DirectoryCommands::Add { username, password } => {
            validate_username(&username)?;
            println!("Adding user: {}", username);

            if directory.user_exists(&username).await? {
                bail!("User {} already exists", username);
            }

            directory.add_user(&username, &password).await?;
            println!("✓ User {} added successfully", username);
        }
        DirectoryCommands::Delete { username } => {
            println!("Deleting user: {}", username);

            if !directory.delete_user(&username).await? {
                bail!("User {} does not exist", username);
            }
            println!("✓ User {} deleted successfully", username);
        }
        DirectoryCommands::List => {
            let users = directory.list_users().await?;

            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<10} {:<20} {:<20}", "Username", "Created At", "Last Login");
                println!("{:-<50}", "");

                for (username, created_at, last_login) in &users {
                    let last_login = last_login.as_deref().unwrap_or("Never");
                    println!("{:<10} {:<20} {:<20}", username, created_at, last_login);
                }

                println!("\nTotal: {} user(s)", users.len());
            }
        }
        DirectoryCommands::Exists { username } => {
            if directory.user_exists(&username).await? {
                println!("✓ User {} exists", username);
            } else {
                println!("✗ User {} does not exist", username);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_blacklist(store: BlacklistStore, command: BlacklistCommands) -> anyhow::Result<()> {
    match command {
        BlacklistCommands::List => {
            let entries = store.entries().await?;
            let now = chrono::Utc::now().timestamp();

            if entries.is_empty() {
                println!("Blacklist {} is empty.", store.path().display());
                return Ok(());
            }

            println!("{:<40} {:<26} {:<8}", "Address", "Expires", "Status");
            println!("{:-<76}", "");

            for entry in &entries {
                let expires = match entry.expires_at {
                    Some(ts) => chrono::DateTime::from_timestamp(ts, 0)
                        .map(|dt| dt.to_rfc3339())
                        .unwrap_or_else(|| ts.to_string()),
                    None => "never".to_string(),
                };
                let status = if entry.is_active(now) { "active" } else { "expired" };
                println!("{:<40} {:<26} {:<8}", entry.address, expires, status);
            }

            println!("\nTotal: {} entr(ies)", entries.len());
        }
        BlacklistCommands::Prune => {
            let removed = store.prune().await?;
            println!("✓ Removed {} expired entr(ies) from {}", removed, store.path().display());
        }
    }

    Ok(())
}
