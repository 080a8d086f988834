// ⚠️ Engine Errors
// Only malformed input escapes the engine. "No rule found" is a normal result.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by the rate resolver, the ranker and catalog validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A card or reward rule record is missing a required key or carries an
    /// invalid value.
    #[error("schema error in {record}: {field} {message}")]
    Schema {
        /// Which kind of record (`card`, `reward rule`).
        record: &'static str,
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The ranker was called with zero cards.
    #[error("no cards selected for ranking")]
    EmptySelection,

    /// The transaction amount is negative.
    #[error("transaction amount must be non-negative, got {0}")]
    InvalidAmount(Decimal),

    /// amount × rate does not fit in a decimal.
    #[error("reward for amount {amount} at {rate}% is out of range")]
    RewardOverflow {
        /// Transaction amount.
        amount: Decimal,
        /// Resolved rate percent.
        rate: Decimal,
    },

    /// A card id was requested that the catalog does not contain.
    #[error("unknown card: {0}")]
    UnknownCard(String),

    /// Two cards in one catalog share a `card_id`.
    #[error("duplicate card_id in catalog: {0}")]
    DuplicateCard(String),
}

impl EngineError {
    /// Creates a schema error.
    pub fn schema(record: &'static str, field: &'static str, message: impl Into<String>) -> Self {
        EngineError::Schema {
            record,
            field,
            message: message.into(),
        }
    }

    /// True for errors caused by a malformed record rather than a bad request.
    pub fn is_schema(&self) -> bool {
        matches!(self, EngineError::Schema { .. } | EngineError::DuplicateCard(_))
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_message() {
        let err = EngineError::schema("card", "card_id", "is required");
        assert_eq!(err.to_string(), "schema error in card: card_id is required");
        assert!(err.is_schema());
    }

    #[test]
    fn test_request_errors_are_not_schema_errors() {
        assert!(!EngineError::EmptySelection.is_schema());
        assert!(!EngineError::UnknownCard("x".to_string()).is_schema());
        assert!(!EngineError::InvalidAmount(Decimal::NEGATIVE_ONE).is_schema());
    }

    #[test]
    fn test_reward_overflow_message_names_amount_and_rate() {
        let err = EngineError::RewardOverflow {
            amount: Decimal::MAX,
            rate: Decimal::from(50),
        };
        assert_eq!(
            err.to_string(),
            format!("reward for amount {} at 50% is out of range", Decimal::MAX)
        );
        assert!(!err.is_schema());
    }
}
