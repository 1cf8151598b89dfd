//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast to admin server, config watcher → drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - Triggering twice is harmless
//! - In-flight admissions are not cancelled by shutdown; they finish or are
//!   dropped with the runtime. Refunds for reservations dropped while the
//!   runtime shuts down may never run, so those charges stay until the
//!   period ends

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
