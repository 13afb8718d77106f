//! # Checkdesk
//!
//! Implementation checklist dashboard.
//!
//! This library provides:
//! - A fixed task manifest with per-task status, assignee and estimate
//! - Status persistence reconciled between a remote store and a local cache
//! - Change notifications posted to an automation webhook
//! - An HTTP API for the dashboard front end
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │            Dashboard             │
//!        │  (tasks, stats, busy, activity)  │
//!        └───────┬──────────────────┬───────┘
//!                │                  │
//!                ▼                  ▼
//!       ┌─────────────────┐  ┌─────────────────┐
//!       │   Reconciler    │  │    Notifier     │
//!       └───┬─────────┬───┘  │   (webhook)     │
//!           │         │      └─────────────────┘
//!           ▼         ▼
//!     ┌──────────┐ ┌──────────┐
//!     │  Remote  │ │  Local   │
//!     │  store   │ │  cache   │
//!     └──────────┘ └──────────┘
//! ```
//!
//! ## Status Change Flow
//! 1. Update the task in memory
//! 2. Persist the full status map (local first, then remote)
//! 3. Recompute progress from the pre-change counters
//! 4. Post a status-change event
//!
//! ## Modules
//! - `checklist`: Task model, manifest, statistics and filtering
//! - `store`: Local cache, remote store and reconciliation
//! - `dashboard`: Controller driving every mutation
//! - `notify`: Outbound events

pub mod activity;
pub mod api;
pub mod checklist;
pub mod collaborators;
pub mod config;
pub mod dashboard;
pub mod estimates;
pub mod export;
pub mod github;
pub mod notify;
pub mod repository;
pub mod store;

pub use config::Config;
pub use dashboard::Dashboard;
