// src/scoring.rs
//! Scoring engine: completion, priority tier and recommendations.
//!
//! - Pure functions over anything implementing [`MeddicRecord`], so a saved
//!   [`Fiche`](crate::models::Fiche) and an in-progress
//!   [`FicheForm`](crate::models::FicheForm) score the same way.
//! - Never fails: missing fields count as empty and an unreadable update date
//!   falls to the lowest recency tier.
//! - `now` is always passed in; nothing here reads the system clock.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use crate::models::field::{MeddicField, is_filled};
use crate::models::fiche::Fiche;
use crate::models::status::{Priority, Status};

/// The read-only view scoring needs from a record.
pub trait MeddicRecord {
    fn meddic_field(&self, field: MeddicField) -> Option<&str>;

    /// `None` when the status is not a member of [`Status`].
    fn status(&self) -> Option<Status>;

    /// Date of the last update; `None` when absent or unparseable.
    fn last_update(&self) -> Option<NaiveDate>;
}

/// Number of filled MEDDIC fields (0..=6).
pub fn filled_count<R: MeddicRecord + ?Sized>(record: &R) -> usize {
    MeddicField::ALL
        .into_iter()
        .filter(|f| is_filled(record.meddic_field(*f)))
        .count()
}

/// Percentage of filled MEDDIC fields: `100 * k / 6`.
pub fn completion_score<R: MeddicRecord + ?Sized>(record: &R) -> f64 {
    filled_count(record) as f64 / MeddicField::ALL.len() as f64 * 100.0
}

/// The three tiers behind a priority decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityScore {
    pub completion_tier: u8,
    pub status_tier: u8,
    pub recency_tier: u8,
}

impl PriorityScore {
    pub fn total(&self) -> u8 {
        self.completion_tier + self.status_tier + self.recency_tier
    }

    pub fn level(&self) -> Priority {
        Priority::from_total(self.total())
    }
}

pub fn completion_tier(completion: f64) -> u8 {
    if completion >= 80.0 {
        3
    } else if completion >= 50.0 {
        2
    } else {
        1
    }
}

pub fn status_tier(status: Option<Status>) -> u8 {
    match status {
        Some(Status::Qualified) => 3,
        Some(Status::InProgress) => 2,
        _ => 1,
    }
}

/// 3 within a week, 2 within a month, 1 beyond that or when unknown.
pub fn recency_tier(last_update: Option<NaiveDate>, now: DateTime<Utc>) -> u8 {
    let Some(updated) = last_update else {
        return 1;
    };
    let days = (now.date_naive() - updated).num_days();
    if days <= 7 {
        3
    } else if days <= 30 {
        2
    } else {
        1
    }
}

pub fn priority_breakdown<R: MeddicRecord + ?Sized>(record: &R, now: DateTime<Utc>) -> PriorityScore {
    PriorityScore {
        completion_tier: completion_tier(completion_score(record)),
        status_tier: status_tier(record.status()),
        recency_tier: recency_tier(record.last_update(), now),
    }
}

/// Priority tier as of `now`. The same record drifts down as it goes stale.
pub fn priority_level<R: MeddicRecord + ?Sized>(record: &R, now: DateTime<Utc>) -> Priority {
    priority_breakdown(record, now).level()
}

/// One advisory produced by [`recommendations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advice {
    CompleteMissingData,
    FinalizeQualification,
    DefineMetrics,
    IdentifyEconomicBuyer,
    DevelopChampion,
    MapDecisionProcess,
    ProposeDemonstration,
    FollowUpBlockers,
}

impl Advice {
    pub fn message(&self) -> &'static str {
        match self {
            Advice::CompleteMissingData => "High priority: complete the missing MEDDIC data",
            Advice::FinalizeQualification => "Finalize the MEDDIC qualification",
            Advice::DefineMetrics => "Define quantifiable metrics with the client",
            Advice::IdentifyEconomicBuyer => "Identify and qualify the economic buyer",
            Advice::DevelopChampion => "Develop an internal champion",
            Advice::MapDecisionProcess => "Map the decision process",
            Advice::ProposeDemonstration => "Opportunity well qualified: propose a demonstration",
            Advice::FollowUpBlockers => "Follow up with the contact and identify blockers",
        }
    }

    /// True for advisories about a specific empty MEDDIC field.
    pub fn is_field_specific(&self) -> bool {
        matches!(
            self,
            Advice::DefineMetrics
                | Advice::IdentifyEconomicBuyer
                | Advice::DevelopChampion
                | Advice::MapDecisionProcess
        )
    }
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Advisories in rule order, most urgent first. Rules fire independently.
pub fn recommendations<R: MeddicRecord + ?Sized>(record: &R) -> Vec<Advice> {
    let completion = completion_score(record);
    let empty = |field| !is_filled(record.meddic_field(field));
    let mut out = Vec::new();

    if completion < 50.0 {
        out.push(Advice::CompleteMissingData);
    } else if completion < 80.0 {
        out.push(Advice::FinalizeQualification);
    }

    if empty(MeddicField::Metrics) {
        out.push(Advice::DefineMetrics);
    }
    if empty(MeddicField::EconomicBuyer) {
        out.push(Advice::IdentifyEconomicBuyer);
    }
    if empty(MeddicField::Champion) {
        out.push(Advice::DevelopChampion);
    }
    if empty(MeddicField::DecisionProcess) {
        out.push(Advice::MapDecisionProcess);
    }

    match record.status() {
        Some(Status::InProgress) if completion >= 80.0 => out.push(Advice::ProposeDemonstration),
        Some(Status::Waiting) => out.push(Advice::FollowUpBlockers),
        _ => {}
    }

    out
}

/// Markdown summary of one record.
pub fn fiche_summary(fiche: &Fiche) -> String {
    let or_na = |v: Option<&str>| v.filter(|s| !s.trim().is_empty()).unwrap_or("N/A").to_string();

    let mut out = format!("## MEDDIC Summary - {}\n\n", fiche.company);
    out.push_str(&format!("**Client:** {}\n", fiche.client_name));
    out.push_str(&format!("**Commercial:** {}\n", or_na(fiche.commercial.as_deref())));
    out.push_str(&format!(
        "**Meeting date:** {}\n",
        fiche.formatted_meeting_date().unwrap_or_else(|| "N/A".into())
    ));
    out.push_str(&format!("**Status:** {}\n\n", fiche.status));
    out.push_str(&format!("**Completion score:** {:.0}%\n\n", completion_score(fiche)));

    for field in MeddicField::ALL {
        out.push_str(&format!("### {}\n", field.label().to_uppercase()));
        match fiche.field(field).filter(|s| !s.trim().is_empty()) {
            Some(text) => out.push_str(&format!("{text}\n\n")),
            None => out.push_str("*Not provided*\n\n"),
        }
    }

    if let Some(notes) = fiche.notes.as_deref().filter(|s| !s.is_empty()) {
        out.push_str(&format!("### NOTES\n{notes}\n\n"));
    }
    out
}
