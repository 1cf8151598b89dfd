//! Budget accounting subsystem.
//!
//! # Data Flow
//! ```text
//! Admission request (tenant, estimated cost):
//!     → pricing.rs (optional: estimate cost from model + token counts)
//!     → ledger.rs (validate cost, resolve tenant limit, build key)
//!     → store.rs (atomic increment-and-compare with period TTL)
//!         → memory.rs (single process)
//!         → redis_store.rs (shared, Lua scripts)
//!
//! On failed or refused call:
//!     ledger.rs rollback → store.rs atomic decrement
//! ```
//!
//! # Design Decisions
//! - Spend is stored in integer micro-units so rollback never drifts
//! - Reservation is optimistic: an over-limit charge is recorded and denied
//! - Reserve fails closed, status fails open

pub mod ledger;
pub mod memory;
pub mod pricing;
#[cfg(feature = "redis_backend")]
pub mod redis_store;
pub mod store;

pub use ledger::{BudgetLedger, BudgetStatus, LedgerError, Outcome, SpendSnapshot};
pub use memory::InMemorySpendStore;
pub use pricing::PricingTable;
#[cfg(feature = "redis_backend")]
pub use redis_store::RedisSpendStore;
pub use store::{PeriodId, ReserveResult, SpendStore, StoreError};
