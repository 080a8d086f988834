// 🏷️ Reward Rules - Conditional reward clauses as data
// Each rule belongs to exactly one card and is matched against a transaction context

use crate::error::{EngineError, EngineResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field value meaning "matches any value of this attribute"
pub const WILDCARD: &str = "all";

/// Rule-name tag that marks a general-spending (catch-all) rule
pub const DEFAULT_GENERAL_SENTINEL: &str = "一般消費";

// ============================================================================
// SPEND CHANNEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendChannel {
    /// Card-not-present purchase
    Online,

    /// In-store purchase
    Offline,

    /// Wildcard: the rule applies to every channel
    All,
}

impl SpendChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendChannel::Online => "online",
            SpendChannel::Offline => "offline",
            SpendChannel::All => WILDCARD,
        }
    }

    /// Rule-side check: a rule channel accepts the transaction channel
    pub fn accepts(&self, channel: SpendChannel) -> bool {
        *self == SpendChannel::All || *self == channel
    }
}

impl fmt::Display for SpendChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpendChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(SpendChannel::Online),
            "offline" => Ok(SpendChannel::Offline),
            WILDCARD => Ok(SpendChannel::All),
            other => Err(format!(
                "unknown spend channel '{}' (expected online, offline or all)",
                other
            )),
        }
    }
}

// ============================================================================
// REWARD RULE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRule {
    /// Owning card
    pub card_id: String,

    /// Free text; general-spending rules carry the sentinel tag in their name
    pub rule_name: String,

    pub spend_channel: SpendChannel,

    /// Classification tag or the wildcard "all"
    pub merchant_category: String,

    /// Substrings matched case-insensitively (e.g. "youtube,netflix")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_keywords: Option<String>,

    /// Lower = more specific among special rules
    pub priority: i32,

    #[serde(with = "rust_decimal::serde::str")]
    pub rate_percent: Decimal,

    /// Explicit general-spending flag; overrides the name sentinel when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general: Option<bool>,
}

impl RewardRule {
    pub fn new(
        card_id: impl Into<String>,
        rule_name: impl Into<String>,
        spend_channel: SpendChannel,
        merchant_category: impl Into<String>,
        priority: i32,
        rate_percent: Decimal,
    ) -> Self {
        RewardRule {
            card_id: card_id.into(),
            rule_name: rule_name.into(),
            spend_channel,
            merchant_category: merchant_category.into(),
            merchant_keywords: None,
            priority,
            rate_percent,
            general: None,
        }
    }

    pub fn with_keywords(mut self, keywords: impl Into<String>) -> Self {
        self.merchant_keywords = Some(keywords.into());
        self
    }

    pub fn with_general_flag(mut self, general: bool) -> Self {
        self.general = Some(general);
        self
    }

    pub fn belongs_to(&self, card_id: &str) -> bool {
        self.card_id == card_id
    }

    pub fn matches_channel(&self, channel: SpendChannel) -> bool {
        self.spend_channel.accepts(channel)
    }

    pub fn matches_category(&self, category: &str) -> bool {
        self.merchant_category == WILDCARD || self.merchant_category == category
    }

    /// The keyword field contains the merchant name (case-insensitive).
    ///
    /// Missing or blank keywords never match, and neither does a blank merchant.
    pub fn matches_merchant(&self, merchant_name: &str) -> bool {
        let merchant = merchant_name.trim().to_lowercase();
        if merchant.is_empty() {
            return false;
        }

        match self.merchant_keywords.as_deref() {
            Some(keywords) if !keywords.trim().is_empty() => {
                keywords.to_lowercase().contains(&merchant)
            }
            _ => false,
        }
    }

    /// Whether this is a general-spending rule.
    ///
    /// The explicit `general` flag wins; otherwise the rule name is checked
    /// for the sentinel substring.
    pub fn is_general(&self, sentinel: &str) -> bool {
        match self.general {
            Some(flag) => flag,
            None => !sentinel.is_empty() && self.rule_name.contains(sentinel),
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.card_id.trim().is_empty() {
            return Err(EngineError::schema("reward rule", "card_id", "is required"));
        }

        if self.rule_name.trim().is_empty() {
            return Err(EngineError::schema(
                "reward rule",
                "rule_name",
                format!("is required (card {})", self.card_id),
            ));
        }

        if self.rate_percent < Decimal::ZERO {
            return Err(EngineError::schema(
                "reward rule",
                "rate_percent",
                format!("must be non-negative, got {} ({})", self.rate_percent, self.rule_name),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// TRANSACTION CONTEXT
// ============================================================================

/// What the caller knows about one purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionContext {
    pub merchant_name: String,
    pub spend_channel: SpendChannel,
    pub merchant_category: String,
}

impl TransactionContext {
    pub fn new(
        merchant_name: impl Into<String>,
        spend_channel: SpendChannel,
        merchant_category: impl Into<String>,
    ) -> Self {
        TransactionContext {
            merchant_name: merchant_name.into(),
            spend_channel,
            merchant_category: merchant_category.into(),
        }
    }

    /// Merchant name as shown back to users (surrounding whitespace removed)
    pub fn merchant(&self) -> &str {
        self.merchant_name.trim()
    }
}

// ============================================================================
// TESTS
// ============================================================================
