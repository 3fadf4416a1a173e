//! # House Points Reconciler Library
//!
//! Periodic standings check: recounts every house total from the results
//! ledger, warns about drift, and optionally repairs it.
//!
//! ## Modules
//!
//! - `config`: environment configuration
//! - `reconciler`: the interval loop
//!
//! ## Example
//!
//! ```no_run
//! use housepoints_reconciler::reconciler::{Reconciler, ReconcilerSettings};
//! use housepoints_shared::store::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let reconciler = Reconciler::new(Arc::new(MemoryStore::new()), ReconcilerSettings::default());
//! let report = reconciler.run_once().await;
//! # }
//! ```

pub mod config;
pub mod reconciler;
