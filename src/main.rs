// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use omnicard::{
    clean_file, filter_records, init_file_logging, init_logging, load_translator, AppConfig,
    CardRecord, CatalogStore, CategoryFilter, FilterSpec, CFPB_HEADER_ROW,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "omnicard")]
#[command(about = "Find a credit card by intent or by structured filters", long_about = None)]
struct Cli {
    /// Config file (JSON); missing file means defaults
    #[arg(long, global = true, default_value = omnicard::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Cleaned catalog CSV, overrides the config file
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Ui,
    /// Translate a free-text wish into filters and list matching cards
    Ask {
        query: String,
    },
    /// List cards matching structured filters
    Filter {
        /// Substring of institution or product name
        #[arg(short, long, default_value = "")]
        text: String,

        /// Reward category, "All" for any
        #[arg(short, long, default_value = CategoryFilter::WILDCARD)]
        category: String,

        /// Only cards without an annual fee
        #[arg(short = 'z', long)]
        zero_fee: bool,
    },
    /// List the reward categories present in the catalog
    Categories,
    /// Show the active intent rules in evaluation order
    Rules,
    /// Turn a raw CFPB export (.csv or .xlsx) into the cleaned catalog
    Clean {
        raw: PathBuf,
        out: PathBuf,

        /// Rows preceding the header in the raw export
        #[arg(long, default_value_t = CFPB_HEADER_ROW)]
        header_row: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)?;
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }

    // The terminal UI owns the screen, so its logs go to a file
    let interactive = matches!(cli.command, None | Some(Commands::Ui));
    if interactive {
        init_file_logging("warn", &config.log_path)?;
    } else {
        init_logging("info");
    }

    match cli.command.unwrap_or(Commands::Ui) {
        Commands::Ui => run_ui_mode(&config),
        Commands::Ask { query } => run_ask(&config, &query),
        Commands::Filter {
            text,
            category,
            zero_fee,
        } => {
            let spec = FilterSpec::new(text, CategoryFilter::from_label(&category), zero_fee);
            run_filter(&config, &spec)
        }
        Commands::Categories => run_categories(&config),
        Commands::Rules => run_rules(&config),
        Commands::Clean {
            raw,
            out,
            header_row,
        } => run_clean(&raw, &out, header_row),
    }
}

fn load_catalog(config: &AppConfig) -> Result<CatalogStore> {
    CatalogStore::load_csv(&config.catalog_path)
        .with_context(|| format!("Failed to load catalog {:?}", config.catalog_path))
}

fn run_ask(config: &AppConfig, query: &str) -> Result<()> {
    let catalog = load_catalog(config)?;
    let translator = load_translator(config)?;

    let result = translator.explain(query);
    println!("🧭 \"{}\"", query);
    if !result.fired.is_empty() {
        println!("   Rules: {}", result.fired.join(", "));
    }

    let cards = filter_records(&result.spec, catalog.records());
    print_cards(&result.spec, &cards, config.summary_length);
    Ok(())
}

fn run_filter(config: &AppConfig, spec: &FilterSpec) -> Result<()> {
    let catalog = load_catalog(config)?;
    let cards = filter_records(spec, catalog.records());
    print_cards(spec, &cards, config.summary_length);
    Ok(())
}

fn run_categories(config: &AppConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    for category in catalog.reward_types() {
        println!("{}", category);
    }
    Ok(())
}

fn run_rules(config: &AppConfig) -> Result<()> {
    let translator = load_translator(config)?;

    println!("🧭 Intent rules ({})", translator.rule_count());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for rule in translator.rules() {
        let stage = format!("{:?}", rule.stage);
        println!(
            "{:<12} {:<8} p{:<3} {:?} → {:?}",
            rule.id,
            stage,
            rule.priority,
            rule.keywords,
            rule.effect
        );
        if let Some(description) = &rule.description {
            println!("   {}", description);
        }
    }
    Ok(())
}

fn run_clean(raw: &Path, out: &Path, header_row: usize) -> Result<()> {
    println!("🧹 Cleaning raw card export");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let report = clean_file(raw, out, header_row)?;

    println!("✓ Wrote {} cards to {:?}", report.rows_written, out);
    println!("✓ Student cards: {}", report.student_cards);
    println!("✓ ITIN-friendly cards: {}", report.itin_cards);
    for (reward_type, count) in &report.by_reward_type {
        println!("   {:<10} {}", reward_type, count);
    }
    if report.blank_rows_skipped > 0 {
        println!("⚠️  Skipped {} blank rows", report.blank_rows_skipped);
    }

    Ok(())
}

fn print_cards(spec: &FilterSpec, cards: &[&CardRecord], summary_length: usize) {
    println!("🔎 Filter: {}", spec.summary());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Top Recommendations ({} matching)\n", cards.len());

    for card in cards {
        println!("{} | {}", card.institution(), card.product());
        println!(
            "   {} | Annual fee: {}",
            card.reward_type_label(),
            card.fee_display()
        );
        println!("   {}", card.rewards_summary(summary_length));
        println!("   {}\n", card.apply_url());
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    let catalog = load_catalog(config)?;
    let translator = load_translator(config)?;

    println!("💳 Loaded {} cards. Starting UI... (Esc to quit)", catalog.len());

    let session = omnicard::QuerySession::new(translator);
    let mut app = ui::App::new(catalog, session, config.summary_length);
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: omnicard ask \"<what you need>\"");
    std::process::exit(1);
}
