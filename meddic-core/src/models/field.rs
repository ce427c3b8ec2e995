// src/models/field.rs
//! The six MEDDIC criteria as one enumerable constant.
//!
//! Completion scoring, search, CSV columns and document sections all iterate
//! [`MeddicField::ALL`], so adding or renaming a criterion happens here only.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeddicField {
    Metrics,
    EconomicBuyer,
    DecisionCriteria,
    DecisionProcess,
    IdentifyPain,
    Champion,
}

impl MeddicField {
    /// Every criterion, in framework order (M, E, D, D, I, C).
    pub const ALL: [MeddicField; 6] = [
        MeddicField::Metrics,
        MeddicField::EconomicBuyer,
        MeddicField::DecisionCriteria,
        MeddicField::DecisionProcess,
        MeddicField::IdentifyPain,
        MeddicField::Champion,
    ];

    /// SQLite column / CSV header name.
    pub fn column(&self) -> &'static str {
        match self {
            MeddicField::Metrics => "metrics",
            MeddicField::EconomicBuyer => "economic_buyer",
            MeddicField::DecisionCriteria => "decision_criteria",
            MeddicField::DecisionProcess => "decision_process",
            MeddicField::IdentifyPain => "identify_pain",
            MeddicField::Champion => "champion",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MeddicField::Metrics => "Metrics",
            MeddicField::EconomicBuyer => "Economic Buyer",
            MeddicField::DecisionCriteria => "Decision Criteria",
            MeddicField::DecisionProcess => "Decision Process",
            MeddicField::IdentifyPain => "Identify Pain",
            MeddicField::Champion => "Champion",
        }
    }

    /// Example input shown in an empty form field.
    pub fn placeholder(&self) -> &'static str {
        match self {
            MeddicField::Metrics => {
                "e.g. Cut costs by 20%, raise productivity by 30%, 150% ROI within 18 months..."
            }
            MeddicField::EconomicBuyer => {
                "e.g. Jean Dupont, CFO, jean.dupont@company.com, final sign-off on budgets >100k"
            }
            MeddicField::DecisionCriteria => {
                "e.g. Price <100k, SAP compatibility, 24/7 support, industry references..."
            }
            MeddicField::DecisionProcess => {
                "e.g. 1) Technical validation (IT), 2) Budget approval (CFO), 3) Final signature (CEO). Timeline: 8 weeks"
            }
            MeddicField::IdentifyPain => {
                "e.g. Time-consuming manual process (2h/day), frequent errors (15%), no real-time visibility..."
            }
            MeddicField::Champion => {
                "e.g. Marie Martin, Head of Operations, keen on automation, influence over the IT team"
            }
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MeddicField::Metrics => "Define quantifiable, measurable metrics",
            MeddicField::EconomicBuyer => "Identify the person who can sign off the budget",
            MeddicField::DecisionCriteria => "List every criterion that will drive the purchase decision",
            MeddicField::DecisionProcess => "Describe the full decision process and its stakeholders",
            MeddicField::IdentifyPain => "Identify concrete problems and their business impact",
            MeddicField::Champion => "Identify your internal ally and what motivates them",
        }
    }

    pub fn from_column(column: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.column() == column)
    }
}

impl fmt::Display for MeddicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A field counts as filled iff it is non-empty after trimming.
pub fn is_filled(value: Option<&str>) -> bool {
    value.map(|v| !v.trim().is_empty()).unwrap_or(false)
}
