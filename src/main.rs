// src/main.rs
// =============================================================================
// CLI entry point.
//
// Exit codes:
//   0 = snapshot produced
//   1 = snapshot failed (bad input, upstream refused, nothing to archive)
//   2 = internal error
// =============================================================================

mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use sitepack::{SnapshotConfig, SnapshotError, SnapshotReceipt, SnapshotService};

#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity; nothing below warn by default so the
    // receipt output stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            2
        }
    };

    std::process::exit(exit_code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Snap { url, json, output } => handle_snap(&url, json, output).await,
    }
}

async fn handle_snap(url: &str, json: bool, output: Option<PathBuf>) -> Result<i32> {
    let service = SnapshotService::new(SnapshotConfig::default())?;

    let receipt = match service.submit(url).await {
        Ok(receipt) => receipt,
        Err(e @ SnapshotError::InvalidInput(_)) => {
            eprintln!("❌ {e}");
            service.shutdown();
            return Ok(1);
        }
        Err(e) => {
            eprintln!("❌ Snapshot failed: {e}");
            service.shutdown();
            return Ok(1);
        }
    };

    // Pull the archive back out of the store and land it next to the user.
    let bytes = service.retrieve(&receipt.download_ref).await?;
    let target_dir = output.unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&target_dir)?;
    let target = target_dir.join(format!("{}.zip", receipt.job_id));
    std::fs::write(&target, &bytes)?;

    print_receipt(&receipt, &target, json)?;

    service.shutdown();
    Ok(0)
}

fn print_receipt(receipt: &SnapshotReceipt, archive: &PathBuf, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(receipt)?);
    } else {
        println!("✅ Snapshot complete");
        println!("   📦 Archive:   {}", archive.display());
        println!("   📄 Resources: {}", receipt.resource_count);
        println!("   💾 Size:      {} bytes", receipt.byte_size);
        println!("   ⏱️  Elapsed:   {} ms", receipt.elapsed_ms);
        if receipt.truncated {
            println!("   ⚠️  Archive hit the size cap; some files were left out");
        }
    }
    Ok(())
}
