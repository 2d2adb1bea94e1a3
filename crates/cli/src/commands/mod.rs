//! Command handlers for the Sewana CLI.

pub mod ask;
pub mod chat;
pub mod learn;
pub mod query;
pub mod setup;
pub mod stats;

pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use learn::LearnCommand;
pub use query::QueryCommand;
pub use stats::StatsCommand;
