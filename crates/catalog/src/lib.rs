//! Read-only client for the public price catalog.
//!
//! `CatalogClient` executes one validated filter query, following the
//! next-page link until the result set is exhausted. `lookup_with_broadening`
//! wraps it with the bounded zero-result retry strategy from
//! `pricebot_core::filter::broaden`.

pub mod client;
pub mod retry;

pub use client::{CatalogClient, CatalogError, HttpPageFetcher, PageFetcher, PricePage};
pub use retry::lookup_with_broadening;
