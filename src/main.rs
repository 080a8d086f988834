// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;

use cashback_ranker::{
    format_percent, init_logging, AppConfig, Catalog, Ranking, RewardRanker, SpendChannel,
    TransactionContext, WILDCARD,
};

#[derive(Parser, Debug)]
#[command(name = "cashback-ranker", version, about = "Rank credit cards by estimated cashback for one purchase")]
struct Cli {
    /// Config file (defaults to $CASHBACK_CONFIG or ./cashback.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cards CSV (requires --rules-csv)
    #[arg(long, global = true, requires = "rules_csv")]
    cards_csv: Option<PathBuf>,

    /// Rules CSV (requires --cards-csv)
    #[arg(long, global = true, requires = "cards_csv")]
    rules_csv: Option<PathBuf>,

    /// JSON catalog with cards and rules
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank cards for one purchase
    Recommend {
        #[command(flatten)]
        purchase: PurchaseArgs,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the cards in the catalog
    Cards,
    /// Interactive comparison view
    Tui {
        #[command(flatten)]
        purchase: PurchaseArgs,
    },
}

#[derive(Args, Debug)]
struct PurchaseArgs {
    /// Merchant name (matched case-insensitively against rule keywords)
    #[arg(short, long)]
    merchant: String,

    /// Transaction amount
    #[arg(short, long)]
    amount: Decimal,

    /// Spend channel: online, offline or all
    #[arg(long, default_value = "offline")]
    channel: SpendChannel,

    /// Merchant category tag
    #[arg(long, default_value = WILDCARD)]
    category: String,

    /// Comma-separated card ids to compare (default: every card)
    #[arg(long, value_delimiter = ',')]
    cards: Vec<String>,
}

impl PurchaseArgs {
    fn context(&self) -> TransactionContext {
        TransactionContext::new(self.merchant.clone(), self.channel, self.category.clone())
    }

    fn rank(&self, catalog: &Catalog, ranker: &RewardRanker) -> Result<Ranking> {
        let selection = if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.as_slice())
        };

        let ranking = catalog
            .rank(ranker, selection, &self.context(), self.amount)
            .context("Failed to rank cards")?;
        Ok(ranking)
    }
}

fn main() -> Result<()> {
    init_logging("warn");

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(AppConfig::default_path);
    let mut config = AppConfig::load(&config_path)?;

    // Command-line catalog flags override the config file
    if cli.catalog.is_some() {
        config.catalog_path = cli.catalog.clone();
    }
    if cli.cards_csv.is_some() {
        config.cards_path = cli.cards_csv.clone();
        config.rules_path = cli.rules_csv.clone();
    }

    let catalog = config.load_catalog()?;
    let ranker = config.ranker();

    match cli.command {
        Command::Recommend { purchase, json } => run_recommend(&catalog, &ranker, &purchase, json),
        Command::Cards => run_cards(&catalog),
        Command::Tui { purchase } => run_ui_mode(&catalog, &ranker, &purchase),
    }
}

fn run_recommend(catalog: &Catalog, ranker: &RewardRanker, purchase: &PurchaseArgs, json: bool) -> Result<()> {
    let ranking = purchase.rank(catalog, ranker)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ranking)?);
        return Ok(());
    }

    println!("💳 Cashback recommendation");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "Merchant: {}  Amount: {}  Channel: {}  Category: {}",
        ranking.merchant, ranking.amount, purchase.channel, purchase.category
    );

    let best = &ranking.best;
    println!(
        "\n✅ Best card: {} {} → {} ({})",
        best.bank,
        best.display_name,
        best.reward_amount,
        format_percent(best.rate_percent)
    );
    println!("   {}", best.explanation());

    println!("\n📊 Full comparison");
    for entry in &ranking.entries {
        println!(
            "  {:>2}. {:<10} {:<16} {:>8} {:>10}  {}",
            entry.rank,
            entry.bank,
            entry.display_name,
            format_percent(entry.rate_percent),
            entry.reward_amount,
            entry.description
        );
    }

    Ok(())
}

fn run_cards(catalog: &Catalog) -> Result<()> {
    println!("📚 {} cards, {} reward rules", catalog.card_count(), catalog.rule_count());
    if let Some(provenance) = &catalog.provenance {
        println!("   source: {} (loaded {})", provenance.source, provenance.loaded_at.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for card in &catalog.cards {
        let base = card
            .general_rate_percent
            .map(format_percent)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "✓ {:<16} {:<10} {:<16} base {:>6}  rules {}",
            card.card_id,
            card.bank,
            card.display_name(),
            base,
            catalog.rules_for(&card.card_id).len()
        );
    }

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(catalog: &Catalog, ranker: &RewardRanker, purchase: &PurchaseArgs) -> Result<()> {
    let ranking = purchase.rank(catalog, ranker)?;

    let mut app = ui::App::new(ranking, purchase.channel, purchase.category.clone());
    ui::run_ui(&mut app)?;

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_catalog: &Catalog, _ranker: &RewardRanker, _purchase: &PurchaseArgs) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: cashback-ranker recommend --merchant <name> --amount <n>");
    std::process::exit(1);
}
