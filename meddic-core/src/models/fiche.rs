// src/models/fiche.rs
//! Fiche records: the raw form a caller submits and the typed record the store returns.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::field::MeddicField;
use crate::models::status::{Priority, Status};
use crate::scoring::MeddicRecord;

pub type FicheId = i64;

/// Calendar format used for meeting dates on input and in storage.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Display format for meeting dates.
pub const DISPLAY_DATE_FORMAT: &str = "%d/%m/%Y";

/// A persisted opportunity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiche {
    pub id: FicheId,
    pub client_name: String,
    pub company: String,
    pub meeting_date: Option<NaiveDate>,
    pub commercial: Option<String>,
    pub metrics: Option<String>,
    pub economic_buyer: Option<String>,
    pub decision_criteria: Option<String>,
    pub decision_process: Option<String>,
    pub identify_pain: Option<String>,
    pub champion: Option<String>,
    pub status: Status,
    /// Tier computed by the store at save time.
    pub priority: Priority,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fiche {
    pub fn field(&self, field: MeddicField) -> Option<&str> {
        match field {
            MeddicField::Metrics => self.metrics.as_deref(),
            MeddicField::EconomicBuyer => self.economic_buyer.as_deref(),
            MeddicField::DecisionCriteria => self.decision_criteria.as_deref(),
            MeddicField::DecisionProcess => self.decision_process.as_deref(),
            MeddicField::IdentifyPain => self.identify_pain.as_deref(),
            MeddicField::Champion => self.champion.as_deref(),
        }
    }

    /// Meeting date as `DD/MM/YYYY`, if any.
    pub fn formatted_meeting_date(&self) -> Option<String> {
        self.meeting_date
            .map(|d| d.format(DISPLAY_DATE_FORMAT).to_string())
    }

    /// Every text-bearing column searched by the store, in search order.
    pub fn searchable_text(&self) -> impl Iterator<Item = &str> {
        [Some(self.company.as_str()), Some(self.client_name.as_str()), self.commercial.as_deref()]
            .into_iter()
            .chain(MeddicField::ALL.into_iter().map(|f| self.field(f)))
            .chain(std::iter::once(self.notes.as_deref()))
            .flatten()
    }
}

impl MeddicRecord for Fiche {
    fn meddic_field(&self, field: MeddicField) -> Option<&str> {
        self.field(field)
    }

    fn status(&self) -> Option<Status> {
        Some(self.status)
    }

    fn last_update(&self) -> Option<NaiveDate> {
        Some(self.updated_at.date_naive())
    }
}

/// Caller input for `save`: insert when `id` is `None`, update otherwise.
///
/// Dates and status arrive as text and are only trusted after validation.
/// Has no priority field: the store derives it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FicheForm {
    #[serde(default)]
    pub id: Option<FicheId>,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub commercial: Option<String>,
    #[serde(default)]
    pub metrics: Option<String>,
    #[serde(default)]
    pub economic_buyer: Option<String>,
    #[serde(default)]
    pub decision_criteria: Option<String>,
    #[serde(default)]
    pub decision_process: Option<String>,
    #[serde(default)]
    pub identify_pain: Option<String>,
    #[serde(default)]
    pub champion: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Only used for live scoring of an unsaved edit; ignored by `save`.
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl FicheForm {
    pub fn new(client_name: impl Into<String>, company: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            company: company.into(),
            ..Self::default()
        }
    }

    pub fn field(&self, field: MeddicField) -> Option<&str> {
        match field {
            MeddicField::Metrics => self.metrics.as_deref(),
            MeddicField::EconomicBuyer => self.economic_buyer.as_deref(),
            MeddicField::DecisionCriteria => self.decision_criteria.as_deref(),
            MeddicField::DecisionProcess => self.decision_process.as_deref(),
            MeddicField::IdentifyPain => self.identify_pain.as_deref(),
            MeddicField::Champion => self.champion.as_deref(),
        }
    }

    pub fn field_mut(&mut self, field: MeddicField) -> &mut Option<String> {
        match field {
            MeddicField::Metrics => &mut self.metrics,
            MeddicField::EconomicBuyer => &mut self.economic_buyer,
            MeddicField::DecisionCriteria => &mut self.decision_criteria,
            MeddicField::DecisionProcess => &mut self.decision_process,
            MeddicField::IdentifyPain => &mut self.identify_pain,
            MeddicField::Champion => &mut self.champion,
        }
    }

    /// Builder-style setter for one MEDDIC criterion.
    pub fn with(mut self, field: MeddicField, value: impl Into<String>) -> Self {
        *self.field_mut(field) = Some(value.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Check every rule and collect all failures before returning.
    pub fn validate(&self) -> Result<ValidFiche, ValidationErrors> {
        let mut errors = Vec::new();

        if self.client_name.trim().is_empty() {
            errors.push(FieldError::new("client_name", "is required"));
        }
        if self.company.trim().is_empty() {
            errors.push(FieldError::new("company", "is required"));
        }

        let meeting_date = match self.meeting_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
                Ok(d) => Some(d),
                Err(_) => {
                    errors.push(FieldError::new(
                        "meeting_date",
                        format!("invalid date {raw:?}, expected YYYY-MM-DD"),
                    ));
                    None
                }
            },
        };

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => Status::default(),
            Some(raw) => match raw.parse::<Status>() {
                Ok(s) => s,
                Err(e) => {
                    errors.push(FieldError::new("status", e.to_string()));
                    Status::default()
                }
            },
        };

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        Ok(ValidFiche {
            client_name: self.client_name.clone(),
            company: self.company.clone(),
            meeting_date,
            commercial: self.commercial.clone(),
            metrics: self.metrics.clone(),
            economic_buyer: self.economic_buyer.clone(),
            decision_criteria: self.decision_criteria.clone(),
            decision_process: self.decision_process.clone(),
            identify_pain: self.identify_pain.clone(),
            champion: self.champion.clone(),
            status,
            notes: self.notes.clone(),
        })
    }
}

impl From<&Fiche> for FicheForm {
    fn from(f: &Fiche) -> Self {
        Self {
            id: Some(f.id),
            client_name: f.client_name.clone(),
            company: f.company.clone(),
            meeting_date: f.meeting_date.map(|d| d.format(DATE_FORMAT).to_string()),
            commercial: f.commercial.clone(),
            metrics: f.metrics.clone(),
            economic_buyer: f.economic_buyer.clone(),
            decision_criteria: f.decision_criteria.clone(),
            decision_process: f.decision_process.clone(),
            identify_pain: f.identify_pain.clone(),
            champion: f.champion.clone(),
            status: Some(f.status.as_str().to_string()),
            notes: f.notes.clone(),
            updated_at: Some(f.updated_at.to_rfc3339()),
        }
    }
}

impl MeddicRecord for FicheForm {
    fn meddic_field(&self, field: MeddicField) -> Option<&str> {
        self.field(field)
    }

    /// Absent means the default status; an unknown label yields `None`.
    fn status(&self) -> Option<Status> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Some(Status::default()),
            Some(raw) => raw.parse().ok(),
        }
    }

    fn last_update(&self) -> Option<NaiveDate> {
        let raw = self.updated_at.as_deref()?.trim();
        let day = raw.get(..10)?;
        NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
    }
}

/// A form that passed validation, with typed date and status.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidFiche {
    pub client_name: String,
    pub company: String,
    pub meeting_date: Option<NaiveDate>,
    pub commercial: Option<String>,
    pub metrics: Option<String>,
    pub economic_buyer: Option<String>,
    pub decision_criteria: Option<String>,
    pub decision_process: Option<String>,
    pub identify_pain: Option<String>,
    pub champion: Option<String>,
    pub status: Status,
    pub notes: Option<String>,
}

impl ValidFiche {
    pub fn field(&self, field: MeddicField) -> Option<&str> {
        match field {
            MeddicField::Metrics => self.metrics.as_deref(),
            MeddicField::EconomicBuyer => self.economic_buyer.as_deref(),
            MeddicField::DecisionCriteria => self.decision_criteria.as_deref(),
            MeddicField::DecisionProcess => self.decision_process.as_deref(),
            MeddicField::IdentifyPain => self.identify_pain.as_deref(),
            MeddicField::Champion => self.champion.as_deref(),
        }
    }

    /// Attach identity, timestamps and the derived priority.
    pub fn into_fiche(
        self,
        id: FicheId,
        priority: Priority,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Fiche {
        Fiche {
            id,
            client_name: self.client_name,
            company: self.company,
            meeting_date: self.meeting_date,
            commercial: self.commercial,
            metrics: self.metrics,
            economic_buyer: self.economic_buyer,
            decision_criteria: self.decision_criteria,
            decision_process: self.decision_process,
            identify_pain: self.identify_pain,
            champion: self.champion,
            status: self.status,
            priority,
            notes: self.notes,
            created_at,
            updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every failing field of one rejected save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_names_every_failing_field() {
        let form = FicheForm {
            client_name: "   ".into(),
            meeting_date: Some("31/12/2024".into()),
            status: Some("Pending".into()),
            ..FicheForm::default()
        };
        let errs = form.validate().unwrap_err();
        let fields: Vec<_> = errs.fields().collect();
        assert_eq!(fields, vec!["client_name", "company", "meeting_date", "status"]);
    }

    #[test]
    fn blank_date_and_status_take_defaults() {
        let form = FicheForm {
            meeting_date: Some("  ".into()),
            status: Some(String::new()),
            ..FicheForm::new("Jean Dupont", "Acme")
        };
        let valid = form.validate().unwrap();
        assert_eq!(valid.meeting_date, None);
        assert_eq!(valid.status, Status::InProgress);
    }

    #[test]
    fn form_last_update_reads_date_prefix() {
        let mut form = FicheForm::new("a", "b");
        form.updated_at = Some("2024-03-05T10:11:12+00:00".into());
        assert_eq!(form.last_update(), NaiveDate::from_ymd_opt(2024, 3, 5));
        form.updated_at = Some("yesterday".into());
        assert_eq!(form.last_update(), None);
    }
}
