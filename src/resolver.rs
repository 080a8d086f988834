// 🎯 Rate Resolver - Tiered reward-rate lookup
//
// Tiers are evaluated in order and the first one that yields a result wins:
//   1. special match   (channel + category + merchant keyword, smallest priority)
//   2. general fallback (general-spending rules, largest priority)
//   3. card default    (Card::general_rate_percent)
//   4. no rule         (rate 0)
//
// Priority direction differs between tiers 1 and 2 on purpose: the most
// specific promotion wins, but the strongest catch-all wins among catch-alls.

use crate::entities::{Card, RewardRule, SpendChannel, TransactionContext, DEFAULT_GENERAL_SENTINEL};
use crate::error::EngineResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// RESOLUTION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    SpecialMatch,
    GeneralFallback,
    CardDefault,
    NoRule,
    /// A tier inserted by the embedding application
    Extension,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::SpecialMatch => "special_match",
            TierKind::GeneralFallback => "general_fallback",
            TierKind::CardDefault => "card_default",
            TierKind::NoRule => "no_rule",
            TierKind::Extension => "extension",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    #[serde(with = "rust_decimal::serde::str")]
    pub rate_percent: Decimal,

    /// Provenance shown to users: which rule produced the rate
    pub description: String,

    pub tier: TierKind,

    /// Name of the rule that produced the rate (tiers 1 and 2 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
}

impl ResolutionResult {
    fn from_special(rule: &RewardRule) -> Self {
        ResolutionResult {
            rate_percent: rule.rate_percent,
            description: format!("{} ({})", rule.rule_name, format_percent(rule.rate_percent)),
            tier: TierKind::SpecialMatch,
            rule_name: Some(rule.rule_name.clone()),
        }
    }

    fn from_general(rule: &RewardRule) -> Self {
        ResolutionResult {
            rate_percent: rule.rate_percent,
            description: format!(
                "{} ({}), general spending fallback",
                rule.rule_name,
                format_percent(rule.rate_percent)
            ),
            tier: TierKind::GeneralFallback,
            rule_name: Some(rule.rule_name.clone()),
        }
    }

    fn from_card_default(rate: Decimal) -> Self {
        ResolutionResult {
            rate_percent: rate,
            description: format!("card base rate ({})", format_percent(rate)),
            tier: TierKind::CardDefault,
            rule_name: None,
        }
    }

    /// Tier 4 outcome. Not an error.
    pub fn no_rule() -> Self {
        ResolutionResult {
            rate_percent: Decimal::ZERO,
            description: "no matching reward rule found".to_string(),
            tier: TierKind::NoRule,
            rule_name: None,
        }
    }

    pub fn is_no_rule(&self) -> bool {
        self.tier == TierKind::NoRule
    }
}

/// Format a percent rate with exactly two decimals, e.g. `5.00%`
pub fn format_percent(rate: Decimal) -> String {
    let mut shown = rate.round_dp(2);
    shown.rescale(2);
    format!("{}%", shown)
}

// ============================================================================
// TIERS
// ============================================================================

/// One fallback level.
///
/// `rules` holds only the card's own rules, in catalog order. Returning `None`
/// hands the decision to the next tier.
pub trait Tier: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        card: &Card,
        rules: &[&RewardRule],
        ctx: &TransactionContext,
    ) -> Option<ResolutionResult>;
}

/// Tier 1: channel, category and merchant keyword all match
#[derive(Debug, Clone, Default)]
pub struct SpecialMatchTier;

impl Tier for SpecialMatchTier {
    fn name(&self) -> &'static str {
        "special_match"
    }

    fn resolve(
        &self,
        _card: &Card,
        rules: &[&RewardRule],
        ctx: &TransactionContext,
    ) -> Option<ResolutionResult> {
        // min_by_key keeps the first of equal minimums
        rules
            .iter()
            .copied()
            .filter(|rule| {
                rule.matches_channel(ctx.spend_channel)
                    && rule.matches_category(&ctx.merchant_category)
                    && rule.matches_merchant(&ctx.merchant_name)
            })
            .min_by_key(|rule| rule.priority)
            .map(ResolutionResult::from_special)
    }
}

/// Tier 2: general-spending rules
#[derive(Debug, Clone)]
pub struct GeneralFallbackTier {
    sentinel: String,
}

impl GeneralFallbackTier {
    pub fn new(sentinel: impl Into<String>) -> Self {
        GeneralFallbackTier {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }
}

impl Default for GeneralFallbackTier {
    fn default() -> Self {
        Self::new(DEFAULT_GENERAL_SENTINEL)
    }
}

impl Tier for GeneralFallbackTier {
    fn name(&self) -> &'static str {
        "general_fallback"
    }

    fn resolve(
        &self,
        _card: &Card,
        rules: &[&RewardRule],
        _ctx: &TransactionContext,
    ) -> Option<ResolutionResult> {
        // Largest priority wins; `>=` keeps the earlier rule on ties
        rules
            .iter()
            .copied()
            .filter(|rule| rule.is_general(&self.sentinel))
            .fold(None::<&RewardRule>, |best, rule| match best {
                Some(current) if current.priority >= rule.priority => Some(current),
                _ => Some(rule),
            })
            .map(ResolutionResult::from_general)
    }
}

/// Tier 3: the card's own base rate
#[derive(Debug, Clone, Default)]
pub struct CardDefaultTier;

impl Tier for CardDefaultTier {
    fn name(&self) -> &'static str {
        "card_default"
    }

    fn resolve(
        &self,
        card: &Card,
        _rules: &[&RewardRule],
        _ctx: &TransactionContext,
    ) -> Option<ResolutionResult> {
        card.general_rate_percent.map(ResolutionResult::from_card_default)
    }
}

/// Tier 4: nothing applies
#[derive(Debug, Clone, Default)]
pub struct NoRuleTier;

impl Tier for NoRuleTier {
    fn name(&self) -> &'static str {
        "no_rule"
    }

    fn resolve(
        &self,
        _card: &Card,
        _rules: &[&RewardRule],
        _ctx: &TransactionContext,
    ) -> Option<ResolutionResult> {
        Some(ResolutionResult::no_rule())
    }
}

// ============================================================================
// RATE RESOLVER
// ============================================================================

/// Ordered list of tiers. Cheap to clone and safe to share between threads.
#[derive(Debug, Clone)]
pub struct RateResolver {
    tiers: Vec<Arc<dyn Tier>>,
}

impl RateResolver {
    /// Standard four tiers with the default general-spending sentinel
    pub fn new() -> Self {
        Self::with_sentinel(DEFAULT_GENERAL_SENTINEL)
    }

    pub fn with_sentinel(sentinel: impl Into<String>) -> Self {
        RateResolver {
            tiers: vec![
                Arc::new(SpecialMatchTier),
                Arc::new(GeneralFallbackTier::new(sentinel)),
                Arc::new(CardDefaultTier),
                Arc::new(NoRuleTier),
            ],
        }
    }

    /// Insert a tier right before the general-spending fallback
    /// (spend caps, promotional periods, payment-method modifiers).
    pub fn insert_tier_before_general(&mut self, tier: Arc<dyn Tier>) {
        let index = self
            .tiers
            .iter()
            .position(|t| t.name() == "general_fallback")
            .unwrap_or(self.tiers.len());
        self.tiers.insert(index, tier);
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Resolve the effective rate of `card` for one transaction.
    ///
    /// Fails only on malformed input: a card without `card_id` or a rule
    /// collection with an invalid record. Everything else degrades through
    /// the tiers down to a rate of 0.
    pub fn resolve(
        &self,
        card: &Card,
        rules: &[RewardRule],
        ctx: &TransactionContext,
    ) -> EngineResult<ResolutionResult> {
        card.validate()?;
        for rule in rules {
            rule.validate()?;
        }

        let card_rules: Vec<&RewardRule> = rules
            .iter()
            .filter(|rule| rule.belongs_to(&card.card_id))
            .collect();

        for tier in &self.tiers {
            if let Some(result) = tier.resolve(card, &card_rules, ctx) {
                tracing::debug!(
                    card_id = %card.card_id,
                    tier = tier.name(),
                    rate = %result.rate_percent,
                    "resolved reward rate"
                );
                return Ok(result);
            }
        }

        Ok(ResolutionResult::no_rule())
    }
}

impl Default for RateResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve with the standard tiers
pub fn resolve(
    card: &Card,
    rules: &[RewardRule],
    merchant_name: &str,
    spend_channel: SpendChannel,
    merchant_category: &str,
) -> EngineResult<ResolutionResult> {
    let ctx = TransactionContext::new(merchant_name, spend_channel, merchant_category);
    RateResolver::new().resolve(card, rules, &ctx)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::WILDCARD;
    use crate::error::EngineError;
    use crate::test_support::{example_card_c1, example_rules, pct};
    use proptest::prelude::*;

    fn online(merchant: &str) -> TransactionContext {
        TransactionContext::new(merchant, SpendChannel::Online, "online_digital")
    }

    #[test]
    fn test_special_match_wins() {
        let result = resolve(&example_card_c1(), &example_rules(), "YouTube", SpendChannel::Online, "online_digital").unwrap();

        assert_eq!(result.rate_percent, pct("5.0"));
        assert_eq!(result.tier, TierKind::SpecialMatch);
        assert_eq!(result.description, "影音串流加碼 (5.00%)");
    }

    #[test]
    fn test_unmatched_merchant_falls_to_general() {
        let result = resolve(&example_card_c1(), &example_rules(), "Amazon", SpendChannel::Online, "online_digital").unwrap();

        assert_eq!(result.rate_percent, pct("1.0"));
        assert_eq!(result.tier, TierKind::GeneralFallback);
        assert!(result.description.contains("general spending fallback"));
        assert_eq!(result.rule_name.as_deref(), Some("一般消費"));
    }

    #[test]
    fn test_general_fallback_beats_card_default() {
        let card = Card::new("c1", "Bank A", "Base Card").with_general_rate(pct("9"));
        let rules = vec![RewardRule::new("c1", "一般消費", SpendChannel::All, WILDCARD, 1, pct("1"))];

        let result = RateResolver::new().resolve(&card, &rules, &online("Amazon")).unwrap();

        assert_eq!(result.tier, TierKind::GeneralFallback);
        assert_eq!(result.rate_percent, pct("1"));
    }

    #[test]
    fn test_card_default_rate() {
        let card = Card::new("c2", "Bank B", "Base Card").with_general_rate(pct("0.8"));
        let result = RateResolver::new().resolve(&card, &example_rules(), &online("anything")).unwrap();

        assert_eq!(result.rate_percent, pct("0.8"));
        assert_eq!(result.tier, TierKind::CardDefault);
        assert_eq!(result.description, "card base rate (0.80%)");
    }

    #[test]
    fn test_no_rule_found_is_not_an_error() {
        let card = Card::new("c3", "Bank C", "Bare Card");
        let result = RateResolver::new().resolve(&card, &example_rules(), &online("YouTube")).unwrap();

        assert_eq!(result.rate_percent, Decimal::ZERO);
        assert!(result.is_no_rule());
        assert!(result.description.contains("no matching reward rule"));
    }

    #[test]
    fn test_smallest_priority_wins_among_special_rules() {
        let rules = vec![
            RewardRule::new("c1", "broad", SpendChannel::All, WILDCARD, 5, pct("2.0")).with_keywords("youtube"),
            RewardRule::new("c1", "narrow", SpendChannel::Online, "online_digital", 1, pct("3.0")).with_keywords("youtube"),
            RewardRule::new("c1", "narrow twin", SpendChannel::Online, WILDCARD, 1, pct("4.0")).with_keywords("youtube"),
        ];

        let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("youtube")).unwrap();
        assert_eq!(result.rule_name.as_deref(), Some("narrow"));
        assert_eq!(result.rate_percent, pct("3.0"));
    }

    #[test]
    fn test_largest_priority_wins_among_general_rules() {
        let rules = vec![
            RewardRule::new("c1", "一般消費 A", SpendChannel::All, WILDCARD, 3, pct("1.0")),
            RewardRule::new("c1", "一般消費 B", SpendChannel::All, WILDCARD, 9, pct("0.5")),
            RewardRule::new("c1", "一般消費 C", SpendChannel::All, WILDCARD, 9, pct("2.0")),
        ];

        let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("nowhere")).unwrap();
        assert_eq!(result.rule_name.as_deref(), Some("一般消費 B"));
        assert_eq!(result.rate_percent, pct("0.5"));
    }

    #[test]
    fn test_channel_and_category_must_both_match() {
        let rules = vec![
            RewardRule::new("c1", "實體加碼", SpendChannel::Offline, WILDCARD, 1, pct("6.0")).with_keywords("starbucks"),
            RewardRule::new("c1", "餐飲加碼", SpendChannel::All, "dining", 1, pct("4.0")).with_keywords("starbucks"),
        ];
        let card = example_card_c1().with_general_rate(pct("0.3"));

        let online_cafe = TransactionContext::new("Starbucks", SpendChannel::Online, "cafe");
        let result = RateResolver::new().resolve(&card, &rules, &online_cafe).unwrap();
        assert_eq!(result.tier, TierKind::CardDefault);

        let offline_cafe = TransactionContext::new("Starbucks", SpendChannel::Offline, "cafe");
        let result = RateResolver::new().resolve(&card, &rules, &offline_cafe).unwrap();
        assert_eq!(result.rule_name.as_deref(), Some("實體加碼"));
    }

    #[test]
    fn test_other_cards_rules_are_ignored() {
        let rules = vec![
            RewardRule::new("other", "影音", SpendChannel::All, WILDCARD, 1, pct("9.0")).with_keywords("youtube"),
        ];
        let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("youtube")).unwrap();
        assert!(result.is_no_rule());
    }

    #[test]
    fn test_general_flag_overrides_sentinel() {
        let rules = vec![
            RewardRule::new("c1", "一般消費活動", SpendChannel::All, WILDCARD, 9, pct("3.0")).with_general_flag(false),
            RewardRule::new("c1", "base spend", SpendChannel::All, WILDCARD, 1, pct("1.2")).with_general_flag(true),
        ];
        let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("nowhere")).unwrap();
        assert_eq!(result.rule_name.as_deref(), Some("base spend"));
    }

    #[test]
    fn test_custom_sentinel() {
        let rules = vec![RewardRule::new("c1", "General spending", SpendChannel::All, WILDCARD, 1, pct("1.1"))];

        let default = RateResolver::new().resolve(&example_card_c1(), &rules, &online("x")).unwrap();
        assert!(default.is_no_rule());

        let english = RateResolver::with_sentinel("General spending").resolve(&example_card_c1(), &rules, &online("x")).unwrap();
        assert_eq!(english.tier, TierKind::GeneralFallback);
    }

    #[test]
    fn test_missing_card_id_is_schema_error() {
        let card = Card::new("", "Bank", "Broken");
        let err = RateResolver::new().resolve(&card, &example_rules(), &online("YouTube")).unwrap_err();
        assert!(matches!(err, EngineError::Schema { record: "card", .. }));
    }

    #[test]
    fn test_malformed_rule_is_schema_error() {
        let mut rules = example_rules();
        rules.push(RewardRule::new("", "orphan", SpendChannel::All, WILDCARD, 1, pct("1.0")));

        let err = RateResolver::new().resolve(&example_card_c1(), &rules, &online("YouTube")).unwrap_err();
        assert!(matches!(err, EngineError::Schema { record: "reward rule", .. }));
    }

    #[derive(Debug)]
    struct PromoTier;

    impl Tier for PromoTier {
        fn name(&self) -> &'static str {
            "promo"
        }

        fn resolve(&self, _card: &Card, _rules: &[&RewardRule], _ctx: &TransactionContext) -> Option<ResolutionResult> {
            Some(ResolutionResult {
                rate_percent: pct("7.0"),
                description: "promo".to_string(),
                tier: TierKind::Extension,
                rule_name: None,
            })
        }
    }

    #[test]
    fn test_inserted_tier_runs_between_special_and_general() {
        let mut resolver = RateResolver::new();
        resolver.insert_tier_before_general(Arc::new(PromoTier));
        assert_eq!(
            resolver.tier_names(),
            vec!["special_match", "promo", "general_fallback", "card_default", "no_rule"]
        );

        let special = resolver.resolve(&example_card_c1(), &example_rules(), &online("YouTube")).unwrap();
        assert_eq!(special.tier, TierKind::SpecialMatch);

        let promo = resolver.resolve(&example_card_c1(), &example_rules(), &online("Amazon")).unwrap();
        assert_eq!(promo.tier, TierKind::Extension);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(pct("5")), "5.00%");
        assert_eq!(format_percent(pct("0.8")), "0.80%");
        assert_eq!(format_percent(pct("1.256")), "1.26%");
    }

    proptest! {
        #[test]
        fn prop_resolve_is_total(
            merchant in ".{0,12}",
            category in "[a-z_]{0,10}",
            offline in any::<bool>(),
        ) {
            let channel = if offline { SpendChannel::Offline } else { SpendChannel::Online };
            let cards = [
                example_card_c1(),
                Card::new("c2", "B", "Base").with_general_rate(pct("0.8")),
                Card::new("c3", "C", "Bare"),
            ];
            for card in &cards {
                let result = resolve(card, &example_rules(), &merchant, channel, &category);
                prop_assert!(result.is_ok());
                prop_assert!(result.unwrap().rate_percent >= Decimal::ZERO);
            }
        }

        #[test]
        fn prop_special_tier_takes_minimum_priority(priorities in proptest::collection::vec(-50i32..50, 1..8)) {
            let rules: Vec<RewardRule> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    RewardRule::new("c1", format!("r{}", i), SpendChannel::All, WILDCARD, *p, Decimal::from(i as i64))
                        .with_keywords("shop")
                })
                .collect();

            let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("shop")).unwrap();
            let min = priorities.iter().min().copied().unwrap();
            let first_min = priorities.iter().position(|p| *p == min).unwrap();
            prop_assert_eq!(result.rule_name, Some(format!("r{}", first_min)));
        }

        #[test]
        fn prop_general_tier_takes_maximum_priority(priorities in proptest::collection::vec(-50i32..50, 1..8)) {
            let rules: Vec<RewardRule> = priorities
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    RewardRule::new("c1", format!("一般消費 {}", i), SpendChannel::All, WILDCARD, *p, Decimal::from(i as i64))
                })
                .collect();

            let result = RateResolver::new().resolve(&example_card_c1(), &rules, &online("shop")).unwrap();
            let max = priorities.iter().max().copied().unwrap();
            let first_max = priorities.iter().position(|p| *p == max).unwrap();
            prop_assert_eq!(result.rule_name, Some(format!("一般消費 {}", first_max)));
        }
    }
}
