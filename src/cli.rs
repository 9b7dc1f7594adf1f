//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::quote_http::HttpQuoteAdapter;
use crate::adapters::sqlite_store::SqliteLedgerStore;
use crate::adapters::web::{build_router, AppState};
use crate::domain::error::PapertradeError;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "papertrade", about = "Simulated stock-trading ledger")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the web server
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Create the ledger database schema and exit
    InitDb {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Output an argon2 hash for a password read from stdin
    HashPassword,
    /// Output a fresh hex session secret for the config file
    GenSessionSecret,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Serve { config } => run_serve(&config),
        Command::InitDb { config } => run_init_db(&config),
        Command::HashPassword => run_hash_password(),
        Command::GenSessionSecret => run_gen_session_secret(),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = PapertradeError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    use std::net::SocketAddr;

    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    // quote service API key is environment-only and startup-fatal when absent
    let api_key = match std::env::var("API_KEY") {
        Ok(k) if !k.trim().is_empty() => k,
        _ => {
            eprintln!("error: API_KEY not set");
            return ExitCode::from(2);
        }
    };

    let store = match SqliteLedgerStore::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };
    if let Err(e) = store.initialize_schema() {
        eprintln!("error: {e}");
        return ExitCode::from(&e);
    }

    let addr: SocketAddr = config
        .get_string("web", "listen")
        .unwrap_or_else(|| "127.0.0.1:3000".to_string())
        .parse()
        .unwrap_or_else(|_| "127.0.0.1:3000".parse().unwrap());

    let quotes = HttpQuoteAdapter::from_config(&config, api_key);

    let state = AppState {
        store: Arc::new(store),
        quotes: Arc::new(quotes),
        config: Arc::new(config),
    };

    let router = match build_router(state) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    eprintln!("Starting web server on {addr}");
    log::info!("listening on {addr}");

    tokio::runtime::Runtime::new()
        .unwrap()
        .block_on(async {
            let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
            axum::serve(listener, router).await.unwrap();
        });

    ExitCode::SUCCESS
}

fn run_init_db(config_path: &PathBuf) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let store = match SqliteLedgerStore::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(&e);
        }
    };

    match store.initialize_schema() {
        Ok(()) => {
            eprintln!("Schema initialized");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn run_hash_password() -> ExitCode {
    use argon2::{
        password_hash::SaltString, Algorithm, Argon2, Params, PasswordHasher, Version,
    };
    use rand::rngs::OsRng;
    use std::io::{self, BufRead};

    eprintln!("Enter password to hash:");
    let stdin = io::stdin();
    let password = stdin
        .lock()
        .lines()
        .next()
        .unwrap_or(Ok(String::new()))
        .unwrap();

    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default());
    let hash = argon2.hash_password(password.as_bytes(), &salt).unwrap();

    println!("{hash}");
    ExitCode::SUCCESS
}

fn run_gen_session_secret() -> ExitCode {
    use rand::RngCore;

    let mut secret = [0u8; 64];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    println!("{}", hex::encode(secret));
    ExitCode::SUCCESS
}
