//! Admission gate.
//!
//! Ties the budget ledger and the circuit breaker registry together around
//! a single upstream call.

pub mod admission;
pub mod error;
pub mod guard;

pub use admission::AdmissionGate;
pub use error::GateError;
pub use guard::ReservationGuard;
