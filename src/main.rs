use anyhow::{Context, Result};
use bog_exposures::config::DEFAULT_CLI_CACHE_CAPACITY;
use bog_exposures::{classify, output_path, save_workbook, Dataset, DatasetCache, Settings};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Classify bank exposures into BoG reporting categories
#[derive(Parser, Debug)]
#[command(name = "bog-exposures", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify an exposures file and write the category workbook
    Classify(RunArgs),
    /// Browse the category tables interactively
    Preview(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Exposures spreadsheet (.xlsx, .xls, .ods or .csv)
    input: PathBuf,

    /// Minimum CRNT_BAL; records must be strictly above it
    #[arg(long)]
    min_balance: Option<u64>,

    /// JSON settings file (categories, suffix, default threshold)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Workbook path (default: <input>_processed.xlsx next to the input)
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn subscriber() -> impl tracing::Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Classify(args) => {
            tracing::subscriber::set_global_default(subscriber())
                .context("Failed to install logger")?;
            run_classify(args)
        }
        Command::Preview(args) => run_preview_mode(args),
    }
}

struct Prepared {
    settings: Settings,
    dataset: Arc<Dataset>,
    min_balance: u64,
    output: PathBuf,
}

fn prepare(args: RunArgs) -> Result<Prepared> {
    let settings = match &args.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut cache = DatasetCache::new(settings.cache_capacity.unwrap_or(DEFAULT_CLI_CACHE_CAPACITY));
    let dataset = cache
        .get_or_load(&bytes, &file_name)
        .with_context(|| format!("Failed to load exposures from {}", args.input.display()))?;

    let min_balance = args.min_balance.unwrap_or(settings.min_balance);
    let output = args
        .output
        .unwrap_or_else(|| output_path(&args.input, &settings.processed_suffix));

    Ok(Prepared {
        settings,
        dataset,
        min_balance,
        output,
    })
}

fn run_classify(args: RunArgs) -> Result<()> {
    println!("🗂️  Exposures to BoG - Classification");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let prepared = prepare(args)?;
    let engine = prepared.settings.rule_engine().context("Invalid category configuration")?;

    println!("\n📂 Loaded {} records from {}", prepared.dataset.len(), prepared.dataset.file_name);

    let classification = classify(&prepared.dataset.exposures, &engine, prepared.min_balance);

    println!("\n🔍 Categories (CRNT_BAL > {}):", prepared.min_balance);
    for (name, rows) in classification.summary() {
        println!("   {:<24} n={}", name, rows);
    }

    let bytes = save_workbook(&classification, &prepared.output)
        .with_context(|| format!("Failed to write {}", prepared.output.display()))?;

    println!("\n💾 Wrote {} ({} bytes)", prepared.output.display(), bytes);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_preview_mode(args: RunArgs) -> Result<()> {
    use bog_exposures::ui;

    // log only while loading; the alternate screen owns the terminal afterwards
    let prepared = tracing::subscriber::with_default(subscriber(), || prepare(args))?;
    let engine = prepared.settings.rule_engine().context("Invalid category configuration")?;

    println!("✓ Loaded {} records", prepared.dataset.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(prepared.dataset, engine, prepared.min_balance, prepared.output);
    ui::run_ui(&mut app)?;

    if let Some(message) = app.message {
        println!("{}", message);
    }
    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_preview_mode(_args: RunArgs) -> Result<()> {
    eprintln!("❌ Preview mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web UI: cargo run --bin bog-server --features server");
    std::process::exit(1);
}
