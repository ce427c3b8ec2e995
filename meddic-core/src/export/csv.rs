// src/export/csv.rs
//! Flat CSV dump of every record column.

use chrono::{DateTime, Utc};
use std::io::Write;

use crate::error::Result;
use crate::models::{Fiche, MeddicField};
use crate::models::fiche::DATE_FORMAT;
use crate::services::store::format_ts;

/// `meddic_export_YYYYMMDD_HHMMSS.csv`
pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("meddic_export_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

pub fn headers() -> Vec<&'static str> {
    let mut cols = vec!["id", "client_name", "company", "meeting_date", "commercial"];
    cols.extend(MeddicField::ALL.iter().map(|f| f.column()));
    cols.extend(["status", "notes", "priority", "created_at", "updated_at"]);
    cols
}

/// Write a header row plus one row per fiche. Returns the number of data rows.
pub fn write_csv<W: Write>(fiches: &[Fiche], out: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(headers())?;
    for fiche in fiches {
        wtr.write_record(row(fiche))?;
    }
    wtr.flush()?;
    Ok(fiches.len())
}

/// Whole export as a string.
pub fn to_csv_string(fiches: &[Fiche]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(fiches, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn row(f: &Fiche) -> Vec<String> {
    let text = |v: Option<&str>| v.unwrap_or_default().to_string();
    let mut cols = vec![
        f.id.to_string(),
        f.client_name.clone(),
        f.company.clone(),
        f.meeting_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default(),
        text(f.commercial.as_deref()),
    ];
    cols.extend(MeddicField::ALL.iter().map(|field| text(f.field(*field))));
    cols.extend([
        f.status.as_str().to_string(),
        text(f.notes.as_deref()),
        f.priority.as_str().to_string(),
        format_ts(f.created_at),
        format_ts(f.updated_at),
    ]);
    cols
}
