// 💳 Card Entity - Reference data for one card product
//
// Loaded once per session by the catalog and never mutated by the engine.
// `card_id` is the identity every RewardRule points at.

use crate::error::{EngineError, EngineResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// CARD ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Unique key (foreign key target of RewardRule::card_id)
    pub card_id: String,

    /// Issuer name (e.g., "國泰世華")
    pub bank: String,

    /// Product name as the issuer calls it
    pub card_name: String,

    /// Presentation alias; falls back to `card_name` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Catch-all rate used when no rule matches (percent, 0.8 = 0.8%)
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub general_rate_percent: Option<Decimal>,
}

impl Card {
    /// Create a card without display alias or base rate
    pub fn new(card_id: impl Into<String>, bank: impl Into<String>, card_name: impl Into<String>) -> Self {
        Card {
            card_id: card_id.into(),
            bank: bank.into(),
            card_name: card_name.into(),
            display_name: None,
            general_rate_percent: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_general_rate(mut self, rate_percent: Decimal) -> Self {
        self.general_rate_percent = Some(rate_percent);
        self
    }

    /// Name shown to users: the alias if set and non-blank, otherwise `card_name`
    pub fn display_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(alias) if !alias.trim().is_empty() => alias,
            _ => &self.card_name,
        }
    }

    /// Check the required keys and value ranges
    pub fn validate(&self) -> EngineResult<()> {
        if self.card_id.trim().is_empty() {
            return Err(EngineError::schema("card", "card_id", "is required"));
        }

        if let Some(rate) = self.general_rate_percent {
            if rate < Decimal::ZERO {
                return Err(EngineError::schema(
                    "card",
                    "general_rate_percent",
                    format!("must be non-negative, got {} (card {})", rate, self.card_id),
                ));
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
