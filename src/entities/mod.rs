// Entity Models
//
// Cards and reward rules are immutable reference data supplied by the catalog.
// Rules stay a flat ordered collection keyed by `card_id`; input order is what
// breaks priority ties, so nothing here re-sorts them.

pub mod card;
pub mod rule;

pub use card::Card;
pub use rule::{RewardRule, SpendChannel, TransactionContext, DEFAULT_GENERAL_SENTINEL, WILDCARD};
