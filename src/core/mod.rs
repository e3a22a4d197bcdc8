//! Core module - symbol registry, ticker cache, staleness watchdog, session
//!
//! This module uses **explicit re-exports** instead of glob exports
//! (`pub use module::*`) so the public surface stays deliberate.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{SymbolRegistry, TickerCache, TickerSession};
//! ```

pub mod cache;
pub mod conversion;
pub mod ranking;
pub mod registry;
pub mod runtime;
pub mod watchdog;

pub use cache::{SubscriptionSet, TickerCache, TickerConsumer};
pub use conversion::VolumeConverter;
pub use ranking::rank_by_volume;
pub use registry::SymbolRegistry;
pub use runtime::{StopReason, TerminalSize, TickerSession, TickerSummary};
pub use watchdog::{StalenessPolicy, StalenessWatchdog, Verdict};
