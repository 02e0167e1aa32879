use anyhow::{Context, Result};
use clap::Parser;
use lockwatch::{DeadlockInfo, DeadlockKind, Detector, LogEntry, format_report};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Lockwatch - replay a lock event log through a fresh deadlock detector"
)]
struct Cli {
    /// Path to the log file
    log_file: PathBuf,

    /// Exit with a non-zero status if any violation is found
    #[arg(long)]
    strict: bool,
}

type Reports = Arc<Mutex<Vec<(DeadlockKind, Vec<DeadlockInfo>)>>>;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let file = File::open(&cli.log_file)
        .with_context(|| format!("Failed to open log file {}", cli.log_file.display()))?;

    let reports: Reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let detector = Detector::with_callback(Arc::new(
        move |kind: DeadlockKind, infos: Vec<DeadlockInfo>| {
            println!("{}", format_report(kind, &infos));
            if let Ok(mut reports) = sink.lock() {
                reports.push((kind, infos));
            }
        },
    ));

    let mut replayed = 0usize;
    let mut recorded = 0usize;
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read log file")?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(LogEntry::Op { thread_id, op, .. }) => {
                detector.record_op(thread_id, op);
                replayed += 1;
            }
            Ok(LogEntry::Deadlock { .. }) => recorded += 1,
            Err(e) => eprintln!("Warning: skipping malformed line {}: {e}", index + 1),
        }
    }

    let (self_relocks, cycles) = match reports.lock() {
        Ok(reports) => (
            reports
                .iter()
                .filter(|(kind, _)| *kind == DeadlockKind::SelfRelock)
                .count(),
            reports
                .iter()
                .filter(|(kind, _)| *kind == DeadlockKind::Cyclic)
                .count(),
        ),
        Err(_) => anyhow::bail!("Report collector poisoned"),
    };

    println!(
        "Replayed {replayed} operations: {self_relocks} self re-lock(s), {cycles} lock-order cycle(s) \
         ({recorded} recorded during the run)"
    );

    if cli.strict && self_relocks + cycles > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
