// src/models/status.rs
//! Pipeline status (user-chosen) and priority tier (always derived).

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Colour used for labels nothing else claims.
pub const FALLBACK_COLOR: &str = "#808080";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseLabelError {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Qualified")]
    Qualified,
    #[serde(rename = "Not Qualified")]
    NotQualified,
    #[serde(rename = "Waiting")]
    Waiting,
    #[serde(rename = "Closed-Won")]
    ClosedWon,
    #[serde(rename = "Closed-Lost")]
    ClosedLost,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::InProgress,
        Status::Qualified,
        Status::NotQualified,
        Status::Waiting,
        Status::ClosedWon,
        Status::ClosedLost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::InProgress => "In Progress",
            Status::Qualified => "Qualified",
            Status::NotQualified => "Not Qualified",
            Status::Waiting => "Waiting",
            Status::ClosedWon => "Closed-Won",
            Status::ClosedLost => "Closed-Lost",
        }
    }

    /// Kebab-case form accepted on the command line (`in-progress`, `closed-won`).
    pub fn slug(&self) -> &'static str {
        match self {
            Status::InProgress => "in-progress",
            Status::Qualified => "qualified",
            Status::NotQualified => "not-qualified",
            Status::Waiting => "waiting",
            Status::ClosedWon => "closed-won",
            Status::ClosedLost => "closed-lost",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Status::InProgress => "#FFA500",
            Status::Qualified => "#32CD32",
            Status::NotQualified => "#FF6347",
            Status::Waiting => "#87CEEB",
            Status::ClosedWon => "#228B22",
            Status::ClosedLost => "#8B0000",
        }
    }
}

impl FromStr for Status {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Status::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(needle) || st.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ParseLabelError {
                kind: "status",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Colour for a raw status label; unknown labels fall back to grey.
pub fn status_color(label: &str) -> &'static str {
    label.parse::<Status>().map(|s| s.color()).unwrap_or(FALLBACK_COLOR)
}

/// Derived urgency tier. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Map a heuristic total (3..=9) to its tier. Lower bounds are inclusive.
    pub fn from_total(total: u8) -> Self {
        if total >= 8 {
            Priority::High
        } else if total >= 6 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Priority::High => "#FF4B4B",
            Priority::Medium => "#FFA500",
            Priority::Low => "#00D4AA",
        }
    }
}

impl FromStr for Priority {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Priority::High, Priority::Medium, Priority::Low]
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseLabelError {
                kind: "priority",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

// ----------- SQLite mapping (stored as labels) -----------

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for Priority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Priority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_labels_and_slugs() {
        assert_eq!("Qualified".parse::<Status>().unwrap(), Status::Qualified);
        assert_eq!("closed-won".parse::<Status>().unwrap(), Status::ClosedWon);
        assert_eq!(" in progress ".parse::<Status>().unwrap(), Status::InProgress);
        assert!("Maybe".parse::<Status>().is_err());
    }

    #[test]
    fn unknown_status_colour_is_grey() {
        assert_eq!(status_color("Waiting"), "#87CEEB");
        assert_eq!(status_color("nope"), FALLBACK_COLOR);
    }

    #[test]
    fn priority_tier_boundaries() {
        assert_eq!(Priority::from_total(9), Priority::High);
        assert_eq!(Priority::from_total(8), Priority::High);
        assert_eq!(Priority::from_total(7), Priority::Medium);
        assert_eq!(Priority::from_total(6), Priority::Medium);
        assert_eq!(Priority::from_total(5), Priority::Low);
        assert_eq!(Priority::from_total(3), Priority::Low);
    }
}
