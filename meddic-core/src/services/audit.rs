//! services/audit.rs
//! Append-only audit trail for fiche create/update/delete.
//!
//! - Lives in the `audit_log` table next to the records it describes.
//! - Entries reference a fiche id only; they survive the fiche's deletion.
//! - Writers take the caller's open transaction so the entry commits (or rolls
//!   back) together with the record write.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, Row, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::{Fiche, FicheId, MeddicField, ValidFiche};
use crate::services::store::{format_ts, parse_ts};

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
  id             INTEGER PRIMARY KEY AUTOINCREMENT,
  fiche_id       INTEGER NOT NULL,   -- weak reference, no cascade
  action         TEXT NOT NULL,      -- CREATE | UPDATE | DELETE
  field_changed  TEXT,
  old_value      TEXT,
  new_value      TEXT,
  timestamp      TEXT NOT NULL       -- RFC3339 UTC
);

CREATE INDEX IF NOT EXISTS idx_audit_fiche ON audit_log(fiche_id);
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl ToSql for AuditAction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AuditAction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// Field-level detail of an update.
///
/// `field` lists every changed column (comma separated). `old_value` and
/// `new_value` are only set when exactly one column changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub fiche_id: FicheId,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<FieldChange>,
    pub timestamp: DateTime<Utc>,
}

/// Append one entry inside `tx`.
pub(crate) fn record(
    tx: &Transaction<'_>,
    fiche_id: FicheId,
    action: AuditAction,
    change: Option<&FieldChange>,
    at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO audit_log(fiche_id, action, field_changed, old_value, new_value, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        (
            fiche_id,
            action,
            change.map(|c| c.field.as_str()),
            change.and_then(|c| c.old_value.as_deref()),
            change.and_then(|c| c.new_value.as_deref()),
            format_ts(at),
        ),
    )?;
    Ok(())
}

/// Entries for one fiche, oldest first.
pub(crate) fn history(db: &Connection, fiche_id: FicheId) -> rusqlite::Result<Vec<AuditEntry>> {
    let mut stmt = db.prepare(
        "SELECT id, fiche_id, action, field_changed, old_value, new_value, timestamp
         FROM audit_log WHERE fiche_id=?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([fiche_id], entry_from_row)?;
    rows.collect()
}

/// Newest entries across all fiches.
pub(crate) fn recent(db: &Connection, limit: usize) -> rusqlite::Result<Vec<AuditEntry>> {
    let mut stmt = db.prepare(
        "SELECT id, fiche_id, action, field_changed, old_value, new_value, timestamp
         FROM audit_log ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map([limit as i64], entry_from_row)?;
    rows.collect()
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let field: Option<String> = row.get(3)?;
    let change = field.map(|field| -> rusqlite::Result<FieldChange> {
        Ok(FieldChange {
            field,
            old_value: row.get(4)?,
            new_value: row.get(5)?,
        })
    });
    Ok(AuditEntry {
        id: row.get(0)?,
        fiche_id: row.get(1)?,
        action: row.get(2)?,
        change: change.transpose()?,
        timestamp: parse_ts(6, &row.get::<_, String>(6)?)?,
    })
}

/// Compare the stored record with the incoming values.
pub(crate) fn diff(old: &Fiche, new: &ValidFiche) -> Option<FieldChange> {
    let mut changed: Vec<(&'static str, Option<String>, Option<String>)> = Vec::new();
    let mut push = |name: &'static str, a: Option<String>, b: Option<String>| {
        if a != b {
            changed.push((name, a, b));
        }
    };

    push("client_name", Some(old.client_name.clone()), Some(new.client_name.clone()));
    push("company", Some(old.company.clone()), Some(new.company.clone()));
    push(
        "meeting_date",
        old.meeting_date.map(|d| d.to_string()),
        new.meeting_date.map(|d| d.to_string()),
    );
    push("commercial", old.commercial.clone(), new.commercial.clone());
    for field in MeddicField::ALL {
        push(
            field.column(),
            old.field(field).map(str::to_string),
            new.field(field).map(str::to_string),
        );
    }
    push(
        "status",
        Some(old.status.as_str().to_string()),
        Some(new.status.as_str().to_string()),
    );
    push("notes", old.notes.clone(), new.notes.clone());

    match changed.len() {
        0 => None,
        1 => {
            let (field, old_value, new_value) = changed.remove(0);
            Some(FieldChange {
                field: field.to_string(),
                old_value,
                new_value,
            })
        }
        _ => Some(FieldChange {
            field: changed.iter().map(|c| c.0).collect::<Vec<_>>().join(","),
            old_value: None,
            new_value: None,
        }),
    }
}
