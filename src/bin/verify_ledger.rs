use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use tracing::info;

use fiduciary_ledger::ledger::{verify_ledger, LedgerEvent, LedgerStore, GENESIS_PREVIOUS_HASH};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("verify-ledger")
        .version("0.1.0")
        .about("Verify fiduciary ledger integrity")
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("PATH")
                .help("Path to the ledger data directory")
                .required(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let data_dir = matches.get_one::<String>("data-dir").unwrap();
    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    info!("Verifying ledger at {}", data_dir);

    let store = LedgerStore::open(data_dir)?;
    let entries = store.load_events()?;

    if entries.is_empty() {
        return Err(anyhow!("Ledger is empty: {}", data_dir));
    }

    if verbose {
        println!("Loaded {} ledger entries", entries.len());
    }

    let report = verify_ledger(&entries)?;
    if !report.valid {
        eprintln!("{}", report.summary());
        std::process::exit(1);
    }

    if verbose {
        println!("✓ Hash chain integrity verified");
        print_summary(&entries);
    }

    check_ledger_health(&entries, verbose)?;

    if !quiet {
        println!("✓ Ledger verification completed successfully");
    }

    Ok(())
}

fn print_summary(entries: &[LedgerEvent]) {
    // Newest-first storage: last element is genesis.
    println!("\nLedger Summary:");
    println!("  Total entries: {}", entries.len());
    println!("  First entry: {}", entries[entries.len() - 1].timestamp);
    println!("  Last entry: {}", entries[0].timestamp);
    println!("  Head hash: {}", entries[0].hash);
}

fn check_ledger_health(entries: &[LedgerEvent], verbose: bool) -> Result<()> {
    info!("Checking ledger health");

    // Exactly one genesis sentinel, at the oldest position.
    let sentinel_count = entries
        .iter()
        .filter(|e| e.previous_hash == GENESIS_PREVIOUS_HASH)
        .count();
    if sentinel_count != 1 {
        return Err(anyhow!(
            "Expected exactly one genesis entry, found {}",
            sentinel_count
        ));
    }

    if verbose {
        println!("✓ Single genesis entry present");
    }

    // Acceptance timestamps should not run backwards.
    let mut regressions = 0;
    for i in 1..entries.len() {
        if entries[i - 1].timestamp < entries[i].timestamp {
            regressions += 1;
        }
    }
    if regressions > 0 && verbose {
        println!("⚠ Found {} timestamp regressions (clock drift?)", regressions);
    }

    // Action distribution.
    if verbose {
        let mut actions = std::collections::HashMap::new();
        for entry in entries {
            *actions.entry(entry.action.as_str()).or_insert(0) += 1;
        }
        println!("\nAction distribution:");
        for (action, count) in actions {
            println!("  {}: {}", action, count);
        }
    }

    Ok(())
}
