// src/services/analytics.rs
//! Aggregates over a loaded set of fiches. Nothing here touches SQLite.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::field::is_filled;
use crate::models::fiche::DISPLAY_DATE_FORMAT;
use crate::models::{Fiche, FicheId, MeddicField, Priority, Status};
use crate::scoring::{Advice, completion_score, priority_level, recommendations};

/// Mean completion under which a commercial is flagged for coaching.
pub const COACHING_THRESHOLD: f64 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_fiches: usize,
    pub avg_completion: f64,
    /// Fiches at 100% completion.
    pub complete_fiches: usize,
    pub status_distribution: BTreeMap<Status, usize>,
    pub companies_count: usize,
    pub commercials_count: usize,
    /// Share of fiches with status Qualified, in percent.
    pub qualified_rate: f64,
    pub avg_completion_by_status: BTreeMap<Status, f64>,
}

impl Statistics {
    /// `None` for an empty set.
    pub fn compute(fiches: &[Fiche]) -> Option<Self> {
        if fiches.is_empty() {
            return None;
        }
        let total = fiches.len();
        let scores: Vec<f64> = fiches.iter().map(completion_score).collect();

        let mut status_distribution = BTreeMap::new();
        let mut sum_by_status: BTreeMap<Status, f64> = BTreeMap::new();
        for (fiche, score) in fiches.iter().zip(&scores) {
            *status_distribution.entry(fiche.status).or_insert(0) += 1;
            *sum_by_status.entry(fiche.status).or_insert(0.0) += score;
        }
        let avg_completion_by_status = sum_by_status
            .into_iter()
            .map(|(status, sum)| (status, sum / status_distribution[&status] as f64))
            .collect();

        let companies: BTreeSet<&str> = fiches.iter().map(|f| f.company.as_str()).collect();
        let commercials: BTreeSet<&str> = fiches
            .iter()
            .filter_map(|f| f.commercial.as_deref())
            .filter(|c| !c.trim().is_empty())
            .collect();
        let qualified = status_distribution
            .get(&Status::Qualified)
            .copied()
            .unwrap_or(0);

        Some(Self {
            total_fiches: total,
            avg_completion: scores.iter().sum::<f64>() / total as f64,
            complete_fiches: scores.iter().filter(|s| **s >= 100.0).count(),
            status_distribution,
            companies_count: companies.len(),
            commercials_count: commercials.len(),
            qualified_rate: qualified as f64 / total as f64 * 100.0,
            avg_completion_by_status,
        })
    }
}

/// Markdown overview for a management audience.
pub fn executive_summary(stats: Option<&Statistics>) -> String {
    let mut out = String::from("# MEDDIC Executive Summary\n\n## Overview\n");
    let Some(stats) = stats else {
        out.push_str("- **Total opportunities:** 0\n");
        return out;
    };
    out.push_str(&format!("- **Total opportunities:** {}\n", stats.total_fiches));
    out.push_str(&format!("- **Qualification rate:** {:.1}%\n", stats.qualified_rate));
    out.push_str(&format!("- **Average completion:** {:.1}%\n", stats.avg_completion));
    out.push_str(&format!("- **Unique companies:** {}\n\n", stats.companies_count));

    out.push_str("## Status breakdown\n");
    for (status, count) in &stats.status_distribution {
        let pct = *count as f64 / stats.total_fiches as f64 * 100.0;
        out.push_str(&format!("- **{status}:** {count} ({pct:.1}%)\n"));
    }
    out
}

/// Headline counts for the recommendations view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineOverview {
    /// Below 100% completion.
    pub to_complete: usize,
    /// High priority as of `now`.
    pub high_priority: usize,
    pub waiting: usize,
    /// In Progress with completion at or above 80%.
    pub ready_to_qualify: usize,
}

impl PipelineOverview {
    pub fn compute(fiches: &[Fiche], now: DateTime<Utc>) -> Self {
        let mut overview = Self {
            to_complete: 0,
            high_priority: 0,
            waiting: 0,
            ready_to_qualify: 0,
        };
        for fiche in fiches {
            let completion = completion_score(fiche);
            if completion < 100.0 {
                overview.to_complete += 1;
            }
            if priority_level(fiche, now) == Priority::High {
                overview.high_priority += 1;
            }
            match fiche.status {
                Status::Waiting => overview.waiting += 1,
                Status::InProgress if completion >= 80.0 => overview.ready_to_qualify += 1,
                _ => {}
            }
        }
        overview
    }
}

// ---------- per-field and per-commercial ----------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldCompletion {
    pub field: MeddicField,
    /// Percent of fiches with this field filled.
    pub rate: f64,
}

/// One entry per MEDDIC field, in `MeddicField::ALL` order.
pub fn field_completion(fiches: &[Fiche]) -> Vec<FieldCompletion> {
    MeddicField::ALL
        .into_iter()
        .map(|field| {
            let filled = fiches.iter().filter(|f| is_filled(f.field(field))).count();
            let rate = if fiches.is_empty() {
                0.0
            } else {
                filled as f64 / fiches.len() as f64 * 100.0
            };
            FieldCompletion { field, rate }
        })
        .collect()
}

/// The `n` least filled fields, lowest first. Stable on ties.
pub fn weakest_fields(fiches: &[Fiche], n: usize) -> Vec<FieldCompletion> {
    let mut rates = field_completion(fiches);
    rates.sort_by(|a, b| a.rate.total_cmp(&b.rate));
    rates.truncate(n);
    rates
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommercialPerformance {
    pub commercial: String,
    pub fiche_count: usize,
    pub avg_completion: f64,
    pub qualified_count: usize,
    pub qualification_rate: f64,
    /// Mean completion below [`COACHING_THRESHOLD`].
    pub needs_coaching: bool,
}

/// Grouped by commercial name (blank names skipped), ordered by name.
pub fn commercial_performance(fiches: &[Fiche]) -> Vec<CommercialPerformance> {
    let mut groups: BTreeMap<&str, (usize, f64, usize)> = BTreeMap::new();
    for fiche in fiches {
        let Some(name) = fiche.commercial.as_deref().filter(|c| !c.trim().is_empty()) else {
            continue;
        };
        let entry = groups.entry(name).or_insert((0, 0.0, 0));
        entry.0 += 1;
        entry.1 += completion_score(fiche);
        if fiche.status == Status::Qualified {
            entry.2 += 1;
        }
    }
    groups
        .into_iter()
        .map(|(name, (count, sum, qualified))| {
            let avg_completion = sum / count as f64;
            CommercialPerformance {
                commercial: name.to_string(),
                fiche_count: count,
                avg_completion,
                qualified_count: qualified,
                qualification_rate: qualified as f64 / count as f64 * 100.0,
                needs_coaching: avg_completion < COACHING_THRESHOLD,
            }
        })
        .collect()
}

// ---------- urgent actions ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Urgency {
    Critical,
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UrgentKind {
    /// Under half complete yet stored as High priority.
    Qualify(Advice),
    FollowUp { waiting_since: NaiveDate },
    ProposeDemo { completion: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UrgentAction {
    pub fiche_id: FicheId,
    pub company: String,
    pub client_name: String,
    pub commercial: Option<String>,
    pub kind: UrgentKind,
}

impl UrgentAction {
    fn new(fiche: &Fiche, kind: UrgentKind) -> Self {
        Self {
            fiche_id: fiche.id,
            company: fiche.company.clone(),
            client_name: fiche.client_name.clone(),
            commercial: fiche.commercial.clone(),
            kind,
        }
    }

    pub fn urgency(&self) -> Urgency {
        match self.kind {
            UrgentKind::Qualify(_) => Urgency::Critical,
            UrgentKind::FollowUp { .. } => Urgency::High,
            UrgentKind::ProposeDemo { .. } => Urgency::Medium,
        }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            UrgentKind::Qualify(advice) => advice.message().to_string(),
            UrgentKind::FollowUp { waiting_since } => format!(
                "Follow up with {} - {} (waiting since {})",
                self.company,
                self.client_name,
                waiting_since.format(DISPLAY_DATE_FORMAT)
            ),
            UrgentKind::ProposeDemo { completion } => format!(
                "Propose a demonstration to {} (qualification at {completion:.0}%)",
                self.company
            ),
        }
    }
}

/// Urgent qualifications, then follow-ups, then demo proposals; at most `limit`.
pub fn urgent_actions(fiches: &[Fiche], limit: usize) -> Vec<UrgentAction> {
    let mut out = Vec::new();
    for fiche in fiches {
        if completion_score(fiche) < 50.0 && fiche.priority == Priority::High {
            out.extend(
                recommendations(fiche)
                    .into_iter()
                    .take(2)
                    .map(|advice| UrgentAction::new(fiche, UrgentKind::Qualify(advice))),
            );
        }
    }
    for fiche in fiches.iter().filter(|f| f.status == Status::Waiting) {
        let waiting_since = fiche.updated_at.date_naive();
        out.push(UrgentAction::new(fiche, UrgentKind::FollowUp { waiting_since }));
    }
    for fiche in fiches.iter().filter(|f| f.status == Status::InProgress) {
        let completion = completion_score(fiche);
        if completion >= 80.0 {
            out.push(UrgentAction::new(fiche, UrgentKind::ProposeDemo { completion }));
        }
    }
    out.truncate(limit);
    out
}

// ---------- companies, activity, correlation ----------

/// Companies by descending fiche count, ties by name; at most `n`.
pub fn top_companies(fiches: &[Fiche], n: usize) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for fiche in fiches {
        *counts.entry(fiche.company.as_str()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(company, count)| (company.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Fiches created per UTC calendar day.
pub fn daily_creations(fiches: &[Fiche]) -> BTreeMap<NaiveDate, usize> {
    let mut days = BTreeMap::new();
    for fiche in fiches {
        *days.entry(fiche.created_at.date_naive()).or_insert(0) += 1;
    }
    days
}

/// Fewer records than this yield no correlation.
const MIN_CORRELATION_SAMPLE: usize = 6;

/// Pearson correlation between completion and being Qualified.
///
/// `None` with 5 records or fewer, or when either series is constant.
pub fn completion_qualification_correlation(fiches: &[Fiche]) -> Option<f64> {
    if fiches.len() < MIN_CORRELATION_SAMPLE {
        return None;
    }
    let n = fiches.len() as f64;
    let xs: Vec<f64> = fiches.iter().map(completion_score).collect();
    let ys: Vec<f64> = fiches
        .iter()
        .map(|f| if f.status == Status::Qualified { 1.0 } else { 0.0 })
        .collect();
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(&ys) {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn of(coefficient: f64) -> Self {
        if coefficient > 0.6 {
            Self::Strong
        } else if coefficient > 0.3 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}
