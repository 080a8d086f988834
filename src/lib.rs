// Cashback Ranker - Core Library
// Exposes the reward-rate engine for use in CLI, API server, and tests

pub mod entities;       // Cards, reward rules, transaction context
pub mod error;          // Engine error taxonomy
pub mod resolver;       // Rate Resolver - tiered fallback
pub mod ranker;         // Reward Ranker - stable ordering across cards
pub mod catalog;        // Reference data loading (CSV / JSON / demo)
pub mod config;         // JSON config file
pub mod logging;        // tracing subscriber setup

#[cfg(feature = "server")]
pub mod api;            // REST API (axum)

// Re-export commonly used types
pub use entities::{
    Card, RewardRule, SpendChannel, TransactionContext,
    DEFAULT_GENERAL_SENTINEL, WILDCARD,
};
pub use error::{EngineError, EngineResult};
pub use resolver::{
    resolve, format_percent,
    RateResolver, ResolutionResult, Tier, TierKind,
    SpecialMatchTier, GeneralFallbackTier, CardDefaultTier, NoRuleTier,
};
pub use ranker::{rank, RankedEntry, Ranking, RewardRanker, DEFAULT_REWARD_SCALE};
pub use catalog::{Catalog, Provenance, load_cards_csv, load_rules_csv};
pub use config::AppConfig;
pub use logging::init_logging;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
