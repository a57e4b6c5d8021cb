//! `encdb` command-line front end for encrypted databases.

#![warn(clippy::pedantic, clippy::nursery)]

use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use directories::BaseDirs;
use encdict::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

/// Pepper baked into this build; every database it creates depends on it.
const DEFAULT_PEPPER_HEX: &str = "ebf20414c784cd8b8fc70539031d2182";

#[derive(Parser)]
#[command(name = "encdb")]
#[command(version, about = "Password-protected encrypted key-value database", long_about = None)]
struct Cli {
    /// Database file (default: ~/.encdb)
    #[arg(short, long, env = "ENCDB_FILE")]
    file: Option<PathBuf>,

    /// Read the password from stdin instead of prompting
    #[arg(long)]
    password_stdin: bool,

    /// Hex-encoded application pepper
    #[arg(
        long,
        env = "ENCDB_PEPPER",
        default_value = DEFAULT_PEPPER_HEX,
        hide_default_value = true
    )]
    pepper_hex: String,

    /// Open the database read-only
    #[arg(long)]
    read_only: bool,

    /// Argon2id memory cost in KiB
    #[arg(long, env = "ENCDB_KDF_MEMORY_KIB", hide = true)]
    kdf_memory_kib: Option<u32>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Key to look up
        key: String,
    },
    /// Store a value under a key
    Put {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
    },
    /// List keys matching a regular expression
    Filter {
        /// Pattern matched against the start of each key
        pattern: String,
    },
    /// Remove a key
    Delete {
        /// Key to remove
        key: String,
    },
    /// Change the database password
    Passwd,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut config = Config::from_hex_pepper(&cli.pepper_hex).context("invalid pepper")?;
    if let Some(memory_kib) = cli.kdf_memory_kib {
        let kdf = KdfParams { memory_kib, ..*config.kdf_params() };
        config = config.with_kdf_params(kdf);
    }
    let path = match cli.file {
        Some(path) => path,
        None => default_path()?,
    };
    let mode = if cli.read_only { OpenMode::Read } else { OpenMode::Create };
    debug!(path = %path.display(), ?mode, "opening database");

    let password = read_password(cli.password_stdin, "Password: ")?;
    let mut db = EncryptedDatabase::open(&path, &password, &config, mode)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut stdout = io::stdout().lock();
    match command {
        Commands::Get { key } => {
            let value = db.get(key.as_bytes())?.unwrap_or_default();
            stdout.write_all(&value)?;
            writeln!(stdout)?;
        }
        Commands::Put { key, value } => db.put(key.as_bytes(), value)?,
        Commands::Filter { pattern } => {
            for key in db.filter(&pattern)? {
                stdout.write_all(&key?)?;
                writeln!(stdout)?;
            }
        }
        Commands::Delete { key } => db.delete(key.as_bytes())?,
        Commands::Passwd => {
            if cli.password_stdin {
                bail!("passwd requires an interactive terminal");
            }
            let new_password = read_new_password()?;
            db.change_password(&password, &new_password).context("password change failed")?;
            debug!("password changed");
        }
    }

    db.close().context("failed to close database")?;
    Ok(())
}

fn default_path() -> Result<PathBuf> {
    let dirs = BaseDirs::new().context("cannot determine home directory")?;
    Ok(dirs.home_dir().join(".encdb"))
}

/// Reads the password from stdin or the terminal. Non-UTF-8 input is rejected.
fn read_password(from_stdin: bool, prompt: &str) -> Result<Zeroizing<String>> {
    if from_stdin {
        let mut raw = Zeroizing::new(Vec::new());
        io::stdin().read_to_end(&mut raw).context("failed to read password from stdin")?;
        return strip_line_ending(&raw);
    }
    let password = rpassword::prompt_password(prompt).context("failed to read password")?;
    Ok(Zeroizing::new(password))
}

/// Drops one trailing `\n` or `\r\n` from a password read off a pipe.
fn strip_line_ending(raw: &[u8]) -> Result<Zeroizing<String>> {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let password = std::str::from_utf8(line).context("password is not valid UTF-8")?;
    Ok(Zeroizing::new(password.to_owned()))
}

fn read_new_password() -> Result<Zeroizing<String>> {
    let first = read_password(false, "New password: ")?;
    let second = read_password(false, "Confirm new password: ")?;
    if first != second {
        bail!("passwords do not match");
    }
    Ok(first)
}
