// src/services/store.rs
//! Single-writer fiche store.
//!
//! - Owns the only SQLite connection (WAL); open once per process and pass it around.
//! - Every write runs in one transaction with its audit entry.
//! - Priority is recomputed on every save from the final values; completion
//!   is never stored.

use chrono::{DateTime, NaiveDate, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::error::{Error, Result};
use crate::models::fiche::DATE_FORMAT;
use crate::models::{Fiche, FicheForm, FicheId, Priority, Status};
use crate::scoring::{completion_score, priority_level};
use crate::services::audit::{self, AuditAction, AuditEntry};

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS meddic_fiches (
  id                 INTEGER PRIMARY KEY AUTOINCREMENT,
  client_name        TEXT NOT NULL,
  company            TEXT NOT NULL,
  meeting_date       TEXT,              -- YYYY-MM-DD
  commercial         TEXT,
  metrics            TEXT,
  economic_buyer     TEXT,
  decision_criteria  TEXT,
  decision_process   TEXT,
  identify_pain      TEXT,
  champion           TEXT,
  status             TEXT NOT NULL DEFAULT 'In Progress',
  notes              TEXT,
  priority           TEXT NOT NULL,     -- derived at save time
  created_at         TEXT NOT NULL,     -- RFC3339 UTC
  updated_at         TEXT NOT NULL      -- RFC3339 UTC
);
"#;

const SELECT_FICHE: &str = "SELECT id, client_name, company, meeting_date, commercial,
        metrics, economic_buyer, decision_criteria, decision_process, identify_pain, champion,
        status, notes, priority, created_at, updated_at
 FROM meddic_fiches";

/// A listed fiche with its read-time annotations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedFiche {
    #[serde(flatten)]
    pub fiche: Fiche,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted_date: Option<String>,
}

impl ListedFiche {
    fn new(fiche: Fiche, with_scores: bool) -> Self {
        let (completion_score, formatted_date) = if with_scores {
            (Some(completion_score(&fiche)), fiche.formatted_meeting_date())
        } else {
            (None, None)
        };
        Self {
            fiche,
            completion_score,
            formatted_date,
        }
    }
}

/// Listing criteria; every `Some` must match. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<Status>,
    /// Exact company name.
    pub company: Option<String>,
    /// Exact commercial name.
    pub commercial: Option<String>,
    /// Same semantics as [`FicheStore::search`].
    pub search: Option<String>,
}

impl ListFilter {
    pub fn matches(&self, fiche: &Fiche) -> bool {
        self.status.is_none_or(|s| fiche.status == s)
            && self.company.as_deref().is_none_or(|c| fiche.company == c)
            && self
                .commercial
                .as_deref()
                .is_none_or(|c| fiche.commercial.as_deref() == Some(c))
            && matches_term(fiche, self.search.as_deref())
    }
}

pub struct FicheStore {
    pub(crate) db: Connection,
    path: PathBuf,
    audit_enabled: bool,
    clock: Box<dyn Clock>,
}

impl FicheStore {
    /// Open/create the SQLite DB and ensure both tables exist.
    ///
    /// Creates the parent directory if missing.
    pub fn open(db_path: impl AsRef<Path>, audit_enabled: bool) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Connection::open(&path)?;
        db.execute_batch(SCHEMA)?;
        db.execute_batch(audit::SCHEMA)?;

        tracing::debug!(path = %path.display(), audit_enabled, "fiche store opened");
        Ok(Self {
            db,
            path,
            audit_enabled,
            clock: Box::new(SystemClock),
        })
    }

    pub fn from_config(cfg: &CoreConfig) -> Result<Self> {
        Self::open(&cfg.database.path, cfg.audit.enabled)
    }

    /// Replace the clock used for stamping and priority.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    /// Current time at storage precision.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().trunc_subsecs(6)
    }

    /// Insert when `form.id` is `None`, otherwise update that id.
    ///
    /// Behavior:
    /// - Validates first; a rejected form touches nothing.
    /// - Updating an unknown id is `NotFound`, never an insert.
    /// - `updated_at` is set to now before priority is derived.
    pub fn save(&mut self, form: &FicheForm) -> Result<Fiche> {
        let valid = form.validate().inspect_err(|e| {
            tracing::warn!(errors = %e, "fiche rejected");
        })?;
        let now = self.now();
        let tx = self.db.transaction()?;

        let fiche = match form.id {
            None => {
                let mut fiche = valid.into_fiche(0, Priority::Low, now, now);
                fiche.priority = priority_level(&fiche, now);
                tx.execute(
                    r#"
                    INSERT INTO meddic_fiches(client_name, company, meeting_date, commercial,
                      metrics, economic_buyer, decision_criteria, decision_process, identify_pain,
                      champion, status, notes, priority, created_at, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
                    "#,
                    (
                        &fiche.client_name,
                        &fiche.company,
                        fiche.meeting_date.map(format_date),
                        &fiche.commercial,
                        &fiche.metrics,
                        &fiche.economic_buyer,
                        &fiche.decision_criteria,
                        &fiche.decision_process,
                        &fiche.identify_pain,
                        &fiche.champion,
                        fiche.status,
                        &fiche.notes,
                        fiche.priority,
                        format_ts(now),
                    ),
                )?;
                fiche.id = tx.last_insert_rowid();
                if self.audit_enabled {
                    audit::record(&tx, fiche.id, AuditAction::Create, None, now)?;
                }
                tracing::info!(fiche_id = fiche.id, company = %fiche.company, "fiche created");
                fiche
            }
            Some(id) => {
                let old = find(&tx, id)?.ok_or(Error::NotFound(id))?;
                let change = audit::diff(&old, &valid);
                let mut fiche = valid.into_fiche(id, Priority::Low, old.created_at, now);
                fiche.priority = priority_level(&fiche, now);
                tx.execute(
                    r#"
                    UPDATE meddic_fiches SET
                      client_name=?1, company=?2, meeting_date=?3, commercial=?4,
                      metrics=?5, economic_buyer=?6, decision_criteria=?7, decision_process=?8,
                      identify_pain=?9, champion=?10, status=?11, notes=?12, priority=?13,
                      updated_at=?14
                    WHERE id=?15
                    "#,
                    (
                        &fiche.client_name,
                        &fiche.company,
                        fiche.meeting_date.map(format_date),
                        &fiche.commercial,
                        &fiche.metrics,
                        &fiche.economic_buyer,
                        &fiche.decision_criteria,
                        &fiche.decision_process,
                        &fiche.identify_pain,
                        &fiche.champion,
                        fiche.status,
                        &fiche.notes,
                        fiche.priority,
                        format_ts(now),
                        id,
                    ),
                )?;
                if self.audit_enabled {
                    audit::record(&tx, id, AuditAction::Update, change.as_ref(), now)?;
                }
                tracing::info!(fiche_id = id, priority = %fiche.priority, "fiche updated");
                fiche
            }
        };

        tx.commit()?;
        Ok(fiche)
    }

    pub fn get(&self, id: FicheId) -> Result<Fiche> {
        tracing::debug!(fiche_id = id, "get fiche");
        find(&self.db, id)?.ok_or(Error::NotFound(id))
    }

    /// All fiches, most recently updated first (ties: newest id first).
    pub fn fiches(&self) -> Result<Vec<Fiche>> {
        let mut stmt = self
            .db
            .prepare(&format!("{SELECT_FICHE} ORDER BY updated_at DESC, id DESC"))?;
        let rows = stmt.query_map([], fiche_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Same order as [`fiches`](Self::fiches); `with_scores` attaches completion
    /// and the display meeting date.
    pub fn list_all(&self, with_scores: bool) -> Result<Vec<ListedFiche>> {
        Ok(self
            .fiches()?
            .into_iter()
            .map(|fiche| ListedFiche::new(fiche, with_scores))
            .collect())
    }

    /// [`list_all`](Self::list_all) restricted to fiches matching `filter`.
    pub fn list(&self, filter: &ListFilter, with_scores: bool) -> Result<Vec<ListedFiche>> {
        Ok(self
            .fiches()?
            .into_iter()
            .filter(|f| filter.matches(f))
            .map(|fiche| ListedFiche::new(fiche, with_scores))
            .collect())
    }

    /// Append a DELETE entry and remove the row, atomically.
    ///
    /// Returns `false` (and records nothing) when the id does not exist.
    pub fn delete(&mut self, id: FicheId) -> Result<bool> {
        let now = self.now();
        let tx = self.db.transaction()?;
        if self.audit_enabled {
            audit::record(&tx, id, AuditAction::Delete, None, now)?;
        }
        let removed = tx.execute("DELETE FROM meddic_fiches WHERE id=?1", [id])?;
        if removed == 0 {
            tx.rollback()?;
            tracing::debug!(fiche_id = id, "delete of missing fiche ignored");
            return Ok(false);
        }
        tx.commit()?;
        tracing::info!(fiche_id = id, "fiche deleted");
        Ok(true)
    }

    /// Case-insensitive substring match over every text column, OR'd.
    /// An absent or empty term returns everything in listing order.
    pub fn search(&self, term: Option<&str>) -> Result<Vec<Fiche>> {
        Ok(self
            .fiches()?
            .into_iter()
            .filter(|f| matches_term(f, term))
            .collect())
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self
            .db
            .query_row("SELECT COUNT(*) FROM meddic_fiches", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    /// Audit entries for one fiche, oldest first. Kept after deletion.
    pub fn history(&self, id: FicheId) -> Result<Vec<AuditEntry>> {
        Ok(audit::history(&self.db, id)?)
    }

    pub fn recent_activity(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        Ok(audit::recent(&self.db, limit)?)
    }
}

fn matches_term(fiche: &Fiche, term: Option<&str>) -> bool {
    let Some(term) = term.filter(|t| !t.is_empty()) else {
        return true;
    };
    let needle = term.to_lowercase();
    fiche
        .searchable_text()
        .any(|t| t.to_lowercase().contains(&needle))
}

fn find(db: &Connection, id: FicheId) -> rusqlite::Result<Option<Fiche>> {
    db.query_row(&format!("{SELECT_FICHE} WHERE id=?1"), [id], fiche_from_row)
        .optional()
}

fn fiche_from_row(row: &Row<'_>) -> rusqlite::Result<Fiche> {
    let meeting_date = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(parse_date(3, &raw)?),
        None => None,
    };
    Ok(Fiche {
        id: row.get(0)?,
        client_name: row.get(1)?,
        company: row.get(2)?,
        meeting_date,
        commercial: row.get(4)?,
        metrics: row.get(5)?,
        economic_buyer: row.get(6)?,
        decision_criteria: row.get(7)?,
        decision_process: row.get(8)?,
        identify_pain: row.get(9)?,
        champion: row.get(10)?,
        status: row.get(11)?,
        notes: row.get(12)?,
        priority: row.get(13)?,
        created_at: parse_ts(14, &row.get::<_, String>(14)?)?,
        updated_at: parse_ts(15, &row.get::<_, String>(15)?)?,
    })
}

fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Fixed-width RFC3339 so text order matches time order.
pub(crate) fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
