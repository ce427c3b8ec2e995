// src/services/mod.rs

pub mod analytics;
pub mod audit;
pub mod backup;   // file-only snapshots of the store
pub mod store;    // the ONLY SQLite writer

// Public API
pub use analytics::{
    CommercialPerformance, CorrelationStrength, FieldCompletion, PipelineOverview, Statistics,
    UrgentAction, UrgentKind, Urgency, commercial_performance,
    completion_qualification_correlation, daily_creations, executive_summary, field_completion,
    top_companies, urgent_actions, weakest_fields,
};
pub use audit::{AuditAction, AuditEntry, FieldChange};
pub use backup::{BackupReport, Backups};
pub use store::{FicheStore, ListFilter, ListedFiche};
