//! `palace-cli` – terminal front end for the memory palace store.
//!
//! This binary:
//!
//! 1. Reads `~/.palace/config.toml`, writing the defaults on first run.
//! 2. Opens the SQLite-backed palace collection at the configured path
//!    (falling back to an in-memory store if the database cannot be opened).
//! 3. Drops the user into an **interactive REPL** with slash-commands for
//!    building palaces, placing objects and taking quizzes.
//! 4. Exits cleanly on `/quit`, end of input, or **Ctrl-C**.

mod config;
mod repl;

use colored::Colorize;
use tracing::warn;

use palace_storage::{PalaceRepository, SqliteKvStore};
use palace_store::PalaceStore;

#[tokio::main]
async fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); PALACE_LOG_FORMAT=json
    // switches to newline-delimited JSON.  User-facing output stays on
    // println!.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("PALACE_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => write_default_config(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Durable store ─────────────────────────────────────────────────────
    let repo = match SqliteKvStore::open(&cfg.data_path) {
        Ok(kv) => {
            println!(
                "  Palaces stored in {}",
                cfg.data_path.display().to_string().bold()
            );
            PalaceRepository::new(kv)
        }
        Err(e) => {
            warn!(path = %cfg.data_path.display(), error = %e, "failed to open palace database");
            println!(
                "  {} Nothing will be saved after exit.",
                "Could not open the palace database.".yellow()
            );
            PalaceRepository::in_memory()
        }
    };
    let store = PalaceStore::new(repo);

    let saved = store.saved_palaces().len();
    println!("  {} saved palace(s).", saved.to_string().bold());
    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive REPL ──────────────────────────────────────────────────
    repl::run(store, cfg).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// First run
// ─────────────────────────────────────────────────────────────────────────────

fn write_default_config() -> config::Config {
    println!();
    println!("  No configuration found.  Writing defaults.");
    let mut cfg = config::Config::default();
    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___       __              "#.bold().cyan());
    println!("{}", r#"  / _ \___ _/ /__ ________   "#.bold().cyan());
    println!("{}", r#" / ___/ _ `/ / _ `/ __/ -_)  "#.bold().cyan());
    println!("{}", r#"/_/   \_,_/_/\_,_/\__/\__/   "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Palace".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Method-of-loci memory trainer");
    println!();
}
