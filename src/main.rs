// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use expense_ledger::{Config, ExpenseCategory, ExpenseStore, KeyValueStore, SqliteStore};

const USAGE: &str = "
Expense Ledger

Usage:
  expense-ledger [tui]
  expense-ledger add <category> <amount> <date>
  expense-ledger list
  expense-ledger summary [--json]
  expense-ledger clear
  expense-ledger categories
  expense-ledger help

Dates are YYYY-MM-DD or RFC 3339. Configure with EXPENSES_DB_PATH,
EXPENSES_STORAGE_KEY, EXPENSES_LOG_FILE and RUST_LOG (or a .env file).
";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("tui");

    let config = Config::new()?;
    init_tracing(&config, command == "tui")?;

    match command {
        "tui" => run_ui_mode(&config)?,
        "add" => run_add(&config, &args[1..])?,
        "list" => run_list(&config)?,
        "summary" => run_summary(&config, args.iter().any(|a| a == "--json"))?,
        "clear" => run_clear(&config)?,
        "categories" => {
            for category in ExpenseCategory::ALL {
                println!("{}", category);
            }
        }
        "help" | "-h" | "--help" => println!("{}", USAGE),
        other => {
            eprintln!("❌ Unknown command: {}", other);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Logs go to a file while the terminal form owns the screen, stderr otherwise
fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into());

    if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<ExpenseStore<SqliteStore>> {
    let storage = SqliteStore::open(&config.db_path)?;
    tracing::debug!(db = %config.db_path.display(), key = %config.storage_key, "storage opened");

    let store = ExpenseStore::open(storage, config.storage_key.clone());
    if let Some(err) = store.load_error() {
        eprintln!("⚠️  Saved history could not be read: {}", err);
        eprintln!("   It will not be overwritten; new expenses are saved once it is readable.");
    }
    Ok(store)
}

fn run_add(config: &Config, args: &[String]) -> Result<()> {
    let mut store = open_store(config)?;
    let code = add_expense(&mut store, args);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// `add <category> <amount> <date>`; returns the process exit code
fn add_expense<S: KeyValueStore>(store: &mut ExpenseStore<S>, args: &[String]) -> i32 {
    let category = match args.first() {
        Some(text) => match text.parse::<ExpenseCategory>() {
            Ok(category) => Some(category),
            Err(err) => {
                eprintln!("❌ {}", err);
                eprintln!("   Run: expense-ledger categories");
                return 1;
            }
        },
        None => None,
    };
    let amount = args.get(1).map(String::as_str).unwrap_or("");
    let date = args.get(2).map(String::as_str).unwrap_or("");

    match store.add(category, amount, date) {
        Ok(record) => {
            println!(
                "✓ Added {} {:.2} on {} UTC ({})",
                record.category,
                record.amount,
                record.calendar_date(),
                record.id
            );
            match store.last_persist_error() {
                Some(err) => {
                    eprintln!("⚠️  Not saved: {}", err);
                    1
                }
                None => 0,
            }
        }
        Err(err) => {
            eprintln!("❌ Invalid {}: {}", err.field(), err);
            1
        }
    }
}

fn run_list(config: &Config) -> Result<()> {
    let store = open_store(config)?;

    if store.is_empty() {
        println!("No expenses recorded");
        return Ok(());
    }

    for record in store.records() {
        println!(
            "{}  {:<14} {:>10.2}  {}",
            record.date.to_rfc3339(),
            record.category,
            record.amount,
            record.id
        );
    }

    Ok(())
}

fn run_summary(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let view = store.grouped();

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if view.is_empty() {
        println!("No expenses recorded");
        return Ok(());
    }

    println!("Grouped by UTC date");
    for group in &view.groups {
        println!("{}  ({:.2})", group.label(), group.total());
        for total in &group.categories {
            println!("    {:<14} {:>10.2}", total.category, total.total);
        }
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Total: {:.2}", view.grand_total());

    Ok(())
}

fn run_clear(config: &Config) -> Result<()> {
    let mut store = open_store(config)?;
    let count = store.len();
    store.clear()?;
    println!("✓ Cleared {} expenses", count);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    tracing::info!(count = store.len(), "starting terminal form");

    let mut app = ui::App::new(store);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: expense-ledger add | list | summary | clear");
    std::process::exit(1);
}
