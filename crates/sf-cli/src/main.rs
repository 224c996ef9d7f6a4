//! SampleForge command console
//!
//! Usage:
//!   sampleforge                       - read commands from stdin
//!   sampleforge --script edits.txt    - run a command file
//!   sampleforge --tracks 4 --length 96000 --budget-mb 8
//!
//! Every line is one edit command such as `select_range(100, 200)`,
//! `delete()` or `undo()`. Lines starting with `#` are comments. The
//! console words `status`, `history` and `quit` are handled here.

use std::f64::consts::TAU;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use sf_core::{Sample, sample_from_f64};
use sf_state::{EditorPreferences, SignalManager};

#[derive(Parser)]
#[command(name = "sampleforge", about = "SampleForge command console")]
struct Cli {
    /// Number of tracks in the generated document
    #[arg(short, long, default_value_t = 2)]
    tracks: usize,

    /// Samples per track
    #[arg(short, long, default_value_t = 48_000)]
    length: u64,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = 48_000.0)]
    rate: f64,

    /// Bits per sample
    #[arg(short, long, default_value_t = 24)]
    bits: u32,

    /// Test tone frequency of the first track in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f64,

    /// Undo memory budget in MiB, overrides the preferences file
    #[arg(long)]
    budget_mb: Option<usize>,

    /// Preferences file instead of the per-user one
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Command file, stdin when omitted
    #[arg(short, long)]
    script: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.tracks == 0 {
        bail!("a document needs at least one track");
    }

    let mut preferences = match &cli.preferences {
        Some(path) => EditorPreferences::load_from(path),
        None => EditorPreferences::load(),
    };
    if let Some(mb) = cli.budget_mb {
        preferences.undo.memory_budget_mb = mb;
    }

    let manager = SignalManager::with_preferences(preferences);
    generate_tone(&manager, &cli).context("failed to create the test document")?;
    print_status(&manager);

    let input: Box<dyn BufRead> = match &cli.script {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    run_console(&manager, input)
}

/// New document with one sine per track, each an octave above the previous
fn generate_tone(manager: &SignalManager, cli: &Cli) -> Result<()> {
    manager.new_signal(cli.length, cli.rate, cli.bits, cli.tracks)?;
    for track in 0..cli.tracks {
        let frequency = cli.frequency * f64::from(1u32 << track.min(16));
        let step = TAU * frequency / cli.rate;
        let tone: Vec<Sample> = (0..cli.length)
            .map(|i| sample_from_f64(0.5 * (step * i as f64).sin()))
            .collect();
        manager.signal().overwrite_samples(track, 0, &tone)?;
    }
    // the generated tone is the document's starting point
    manager.set_modified(false);
    log::info!(
        "generated {} tracks x {} samples at {} Hz",
        cli.tracks,
        cli.length,
        cli.rate
    );
    Ok(())
}

fn run_console(manager: &SignalManager, input: Box<dyn BufRead>) -> Result<()> {
    for (number, line) in input.lines().enumerate() {
        let line = line.context("failed to read command")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line {
            "quit" | "exit" => break,
            "status" => print_status(manager),
            "history" => print_history(manager),
            command => match manager.execute_command(command) {
                Ok(()) => print_status(manager),
                Err(err) => eprintln!("line {}: {}: {}", number + 1, command, err),
            },
        }
    }
    Ok(())
}

fn print_status(manager: &SignalManager) {
    let status = manager.status();
    let selection = manager.selection();
    let seconds = if status.rate > 0.0 { status.length as f64 / status.rate } else { 0.0 };
    println!(
        "{} tracks x {} samples ({:.3}s, {} Hz, {} bit) | selection {}+{} on {:?}{}",
        status.tracks,
        status.length,
        seconds,
        status.rate,
        status.bits,
        selection.offset,
        selection.length,
        manager.selected_tracks(),
        if manager.is_modified() { " | modified" } else { "" },
    );
}

fn print_history(manager: &SignalManager) {
    println!(
        "undo: {} ({}), redo: {} ({}), memory {} of {} bytes",
        manager.undo_count(),
        manager.undo_description().as_deref().unwrap_or("-"),
        manager.redo_count(),
        manager.redo_description().as_deref().unwrap_or("-"),
        manager.used_undo_memory(),
        manager.undo_memory_budget(),
    );
}
