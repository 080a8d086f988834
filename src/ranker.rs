// 🏆 Reward Ranker - Compare cards for one purchase
//
// One resolver call per card, in input order, then a stable sort:
// reward desc → rate desc → input order.

use crate::entities::{Card, RewardRule, SpendChannel, TransactionContext};
use crate::error::{EngineError, EngineResult};
use crate::resolver::{format_percent, RateResolver, TierKind};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency display precision used when nothing else is configured
pub const DEFAULT_REWARD_SCALE: u32 = 2;

// ============================================================================
// RANKED ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1 = best
    pub rank: usize,
    pub card_id: String,
    pub bank: String,
    pub display_name: String,
    pub merchant: String,

    #[serde(with = "rust_decimal::serde::str")]
    pub rate_percent: Decimal,

    /// amount × rate / 100, rounded to the ranker's scale
    #[serde(with = "rust_decimal::serde::str")]
    pub reward_amount: Decimal,

    pub description: String,
    pub tier: TierKind,
}

impl RankedEntry {
    pub fn is_best(&self) -> bool {
        self.rank == 1
    }

    /// One-line explanation for display, e.g.
    /// `國泰 CUBE at YouTube: 5.00%, estimated reward 25.00 (影音串流加碼 (5.00%))`
    pub fn explanation(&self) -> String {
        format!(
            "{} at {}: {}, estimated reward {} ({})",
            self.display_name,
            self.merchant,
            format_percent(self.rate_percent),
            self.reward_amount,
            self.description
        )
    }
}

impl fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {} → {}",
            self.rank,
            self.bank,
            self.display_name,
            format_percent(self.rate_percent),
            self.reward_amount
        )
    }
}

// ============================================================================
// RANKING
// ============================================================================

/// Result of one ranking call. `entries` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub merchant: String,

    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,

    /// First entry of `entries`
    pub best: RankedEntry,

    pub entries: Vec<RankedEntry>,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// REWARD RANKER
// ============================================================================

#[derive(Debug, Clone)]
pub struct RewardRanker {
    resolver: RateResolver,
    reward_scale: u32,
}

impl RewardRanker {
    pub fn new() -> Self {
        RewardRanker {
            resolver: RateResolver::new(),
            reward_scale: DEFAULT_REWARD_SCALE,
        }
    }

    pub fn with_resolver(mut self, resolver: RateResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Decimal places kept in `reward_amount`
    pub fn with_reward_scale(mut self, scale: u32) -> Self {
        self.reward_scale = scale;
        self
    }

    pub fn resolver(&self) -> &RateResolver {
        &self.resolver
    }

    /// Rank `cards` for one purchase.
    ///
    /// All-or-nothing: an empty selection, a negative amount or any malformed
    /// card/rule fails the whole call.
    pub fn rank(
        &self,
        cards: &[Card],
        rules: &[RewardRule],
        ctx: &TransactionContext,
        amount: Decimal,
    ) -> EngineResult<Ranking> {
        if cards.is_empty() {
            return Err(EngineError::EmptySelection);
        }
        if amount < Decimal::ZERO {
            return Err(EngineError::InvalidAmount(amount));
        }

        let merchant = ctx.merchant().to_string();
        let mut entries = Vec::with_capacity(cards.len());

        for card in cards {
            let resolution = self.resolver.resolve(card, rules, ctx)?;
            let reward_amount = self.reward_for(amount, resolution.rate_percent)?;

            entries.push(RankedEntry {
                rank: 0,
                card_id: card.card_id.clone(),
                bank: card.bank.clone(),
                display_name: card.display_name().to_string(),
                merchant: merchant.clone(),
                rate_percent: resolution.rate_percent,
                reward_amount,
                description: resolution.description,
                tier: resolution.tier,
            });
        }

        // sort_by is stable: full ties keep input order
        entries.sort_by(|a, b| {
            b.reward_amount
                .cmp(&a.reward_amount)
                .then_with(|| b.rate_percent.cmp(&a.rate_percent))
        });

        for (index, entry) in entries.iter_mut().enumerate() {
            entry.rank = index + 1;
        }

        let best = entries
            .first()
            .cloned()
            .ok_or(EngineError::EmptySelection)?;

        tracing::debug!(
            merchant = %merchant,
            cards = entries.len(),
            best = %best.card_id,
            reward = %best.reward_amount,
            "ranked cards"
        );

        Ok(Ranking {
            merchant,
            amount,
            best,
            entries,
        })
    }

    /// amount × rate / 100, banker's rounding to the configured scale
    fn reward_for(&self, amount: Decimal, rate_percent: Decimal) -> EngineResult<Decimal> {
        let raw = amount
            .checked_mul(rate_percent)
            .and_then(|product| product.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(EngineError::RewardOverflow {
                amount,
                rate: rate_percent,
            })?;

        let mut reward = raw.round_dp_with_strategy(self.reward_scale, RoundingStrategy::MidpointNearestEven);
        reward.rescale(self.reward_scale);
        Ok(reward)
    }
}

impl Default for RewardRanker {
    fn default() -> Self {
        Self::new()
    }
}

/// Rank with the standard tiers and two-decimal rewards
pub fn rank(
    cards: &[Card],
    rules: &[RewardRule],
    merchant_name: &str,
    spend_channel: SpendChannel,
    merchant_category: &str,
    amount: Decimal,
) -> EngineResult<Ranking> {
    let ctx = TransactionContext::new(merchant_name, spend_channel, merchant_category);
    RewardRanker::new().rank(cards, rules, &ctx, amount)
}

// ============================================================================
// TESTS
// ============================================================================
