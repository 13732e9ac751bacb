//! Core domain for the pricebot agent.
//!
//! Holds the pieces the other crates share: application configuration, the
//! price-record data model, and the catalog filter grammar (validation plus
//! the deterministic query-broadening strategy). Everything here is pure and
//! synchronous; network concerns live in the `catalog` and `agent` crates.

pub mod config;
pub mod domain;
pub mod filter;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use domain::{PriceRecord, PriceResultSet, SavingsPlanRate, ToolInvocation};
pub use filter::{broaden, validate, FilterSyntaxError, ParsedFilter};
