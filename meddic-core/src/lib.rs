// src/lib.rs
//! MEDDIC qualification records.
//!
//! - [`models`]: the fiche record, its raw form, status and priority.
//! - [`scoring`]: completion score, priority tier and recommendations.
//! - [`services`]: the audited SQLite store, analytics and backups.
//! - [`export`]: CSV and paginated document rendering.
//!
//! Open one [`FicheStore`] per process and pass it to whatever needs it.

pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod scoring;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::CoreConfig;
pub use error::{Error, Result};
pub use models::{Fiche, FicheForm, FicheId, MeddicField, Priority, Status};
pub use scoring::{Advice, MeddicRecord, completion_score, priority_level, recommendations};
pub use services::FicheStore;
