// 📚 Card Catalog - Reference data loading
// Cards and reward rules from CSV or JSON, validated once and then read-only

use crate::entities::{Card, RewardRule, TransactionContext};
use crate::error::{EngineError, EngineResult};
use crate::ranker::{Ranking, RewardRanker};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::Path;

const DEMO_CARDS_CSV: &str = include_str!("../data/cards.csv");
const DEMO_RULES_CSV: &str = include_str!("../data/rules.csv");

// ============================================================================
// PROVENANCE
// ============================================================================

/// Where a catalog came from and when it was loaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
}

impl Provenance {
    fn now(source: impl Into<String>) -> Self {
        Provenance {
            source: source.into(),
            loaded_at: Utc::now(),
        }
    }
}

// ============================================================================
// CATALOG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub cards: Vec<Card>,

    /// Flat, ordered rule collection keyed by `card_id`
    pub rules: Vec<RewardRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

impl Catalog {
    /// Build a validated catalog.
    ///
    /// Rejects malformed records and duplicate `card_id`s. Rules pointing at
    /// unknown cards are kept (they simply never match) but logged.
    pub fn new(cards: Vec<Card>, rules: Vec<RewardRule>) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        for card in &cards {
            card.validate()?;
            if !seen.insert(card.card_id.as_str()) {
                return Err(EngineError::DuplicateCard(card.card_id.clone()));
            }
        }

        for rule in &rules {
            rule.validate()?;
            if !seen.contains(rule.card_id.as_str()) {
                tracing::warn!(
                    card_id = %rule.card_id,
                    rule = %rule.rule_name,
                    "reward rule references unknown card"
                );
            }
        }

        Ok(Catalog {
            cards,
            rules,
            provenance: None,
        })
    }

    /// Load cards and rules from two CSV files
    pub fn from_csv_files<P: AsRef<Path>>(cards_path: P, rules_path: P) -> Result<Self> {
        let cards = load_cards_csv(cards_path.as_ref())?;
        let rules = load_rules_csv(rules_path.as_ref())?;

        let mut catalog = Catalog::new(cards, rules).context("Invalid card catalog")?;
        catalog.provenance = Some(Provenance::now(format!(
            "{} + {}",
            cards_path.as_ref().display(),
            rules_path.as_ref().display()
        )));
        catalog.log_loaded();
        Ok(catalog)
    }

    /// Load a catalog from a JSON file: `{ "cards": [...], "rules": [...] }`
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file: {:?}", path.as_ref()))?;

        let raw: Catalog = serde_json::from_str(&content).context("Failed to parse catalog JSON")?;

        let mut catalog = Catalog::new(raw.cards, raw.rules).context("Invalid card catalog")?;
        catalog.provenance = Some(Provenance::now(path.as_ref().display().to_string()));
        catalog.log_loaded();
        Ok(catalog)
    }

    /// Built-in demo catalog (a handful of Taiwanese cashback cards)
    pub fn demo() -> Result<Self> {
        let cards = read_cards_csv(DEMO_CARDS_CSV.as_bytes()).context("Demo cards are malformed")?;
        let rules = read_rules_csv(DEMO_RULES_CSV.as_bytes()).context("Demo rules are malformed")?;

        let mut catalog = Catalog::new(cards, rules).context("Invalid demo catalog")?;
        catalog.provenance = Some(Provenance::now("built-in demo"));
        Ok(catalog)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.cards.iter().find(|card| card.card_id == card_id)
    }

    /// Rules of one card, in catalog order
    pub fn rules_for(&self, card_id: &str) -> Vec<&RewardRule> {
        self.rules.iter().filter(|rule| rule.belongs_to(card_id)).collect()
    }

    /// Cards in the requested order. Unknown ids fail the whole selection.
    pub fn select<S: AsRef<str>>(&self, card_ids: &[S]) -> EngineResult<Vec<Card>> {
        card_ids
            .iter()
            .map(|id| {
                let id = id.as_ref().trim();
                self.card(id)
                    .cloned()
                    .ok_or_else(|| EngineError::UnknownCard(id.to_string()))
            })
            .collect()
    }

    /// Rank the selected cards (all cards when `card_ids` is `None`)
    pub fn rank<S: AsRef<str>>(
        &self,
        ranker: &RewardRanker,
        card_ids: Option<&[S]>,
        ctx: &TransactionContext,
        amount: Decimal,
    ) -> EngineResult<Ranking> {
        let cards = match card_ids {
            Some(ids) => self.select(ids)?,
            None => self.cards.clone(),
        };
        ranker.rank(&cards, &self.rules, ctx, amount)
    }

    pub fn card_count(&self) -> usize {
        self.cards.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn log_loaded(&self) {
        tracing::info!(
            cards = self.cards.len(),
            rules = self.rules.len(),
            source = self.provenance.as_ref().map(|p| p.source.as_str()).unwrap_or("-"),
            "loaded card catalog"
        );
    }
}

// ============================================================================
// CSV LOADING
// ============================================================================

/// Load cards from CSV: `card_id,bank,card_name,display_name,general_rate_percent`
pub fn load_cards_csv(csv_path: &Path) -> Result<Vec<Card>> {
    let file = fs::File::open(csv_path)
        .with_context(|| format!("Failed to open cards CSV: {:?}", csv_path))?;
    read_cards_csv(file)
}

/// Load rules from CSV:
/// `card_id,rule_name,spend_channel,merchant_category,merchant_keywords,priority,rate_percent[,general]`
pub fn load_rules_csv(csv_path: &Path) -> Result<Vec<RewardRule>> {
    let file = fs::File::open(csv_path)
        .with_context(|| format!("Failed to open rules CSV: {:?}", csv_path))?;
    read_rules_csv(file)
}

pub fn read_cards_csv<R: Read>(reader: R) -> Result<Vec<Card>> {
    let mut rdr = csv_reader(reader);

    let mut cards = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        let card: Card = result.with_context(|| format!("Failed to deserialize card on row {}", index + 1))?;
        cards.push(card);
    }

    Ok(cards)
}

pub fn read_rules_csv<R: Read>(reader: R) -> Result<Vec<RewardRule>> {
    let mut rdr = csv_reader(reader);

    let mut rules = Vec::new();
    for (index, result) in rdr.deserialize().enumerate() {
        let rule: RewardRule = result.with_context(|| format!("Failed to deserialize reward rule on row {}", index + 1))?;
        rules.push(rule);
    }

    Ok(rules)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

// ============================================================================
// TESTS
// ============================================================================
