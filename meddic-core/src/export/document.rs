// src/export/document.rs
//! Fixed-layout, paginated plain-text rendering of one fiche.
//!
//! Layout: a title line, a general-information block, then one titled section
//! per MEDDIC field. Long free-text lines are word-wrapped to the configured
//! width; pages hold a fixed number of lines and are joined with a form feed.

use crate::config::ExportConfig;
use crate::models::{Fiche, MeddicField};

const PAGE_BREAK: char = '\u{000C}';
const NOT_PROVIDED: &str = "(Not provided)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub line_width: usize,
    pub lines_per_page: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            line_width: 80,
            lines_per_page: 60,
        }
    }
}

impl From<&ExportConfig> for Layout {
    fn from(cfg: &ExportConfig) -> Self {
        Self {
            line_width: cfg.line_width.max(1),
            lines_per_page: cfg.lines_per_page.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub pages: Vec<Vec<String>>,
}

impl Document {
    pub fn layout(fiche: &Fiche, layout: Layout) -> Self {
        let mut lines = vec![format!("MEDDIC Record - {}", fiche.company), String::new()];

        lines.push("General Information".to_string());
        lines.push(format!("Client: {}", fiche.client_name));
        lines.push(format!("Company: {}", fiche.company));
        lines.push(format!(
            "Commercial: {}",
            fiche.commercial.as_deref().unwrap_or_default()
        ));
        lines.push(format!(
            "Meeting date: {}",
            fiche.formatted_meeting_date().unwrap_or_default()
        ));
        lines.push(String::new());

        for field in MeddicField::ALL {
            lines.push(field.label().to_string());
            match fiche.field(field).filter(|s| !s.is_empty()) {
                Some(text) => {
                    for line in text.split('\n') {
                        lines.extend(wrap_line(line, layout.line_width));
                    }
                }
                None => lines.push(NOT_PROVIDED.to_string()),
            }
            lines.push(String::new());
        }

        let pages = lines
            .chunks(layout.lines_per_page)
            .map(<[String]>::to_vec)
            .collect();
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn render(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.join("\n"))
            .collect::<Vec<_>>()
            .join(&format!("\n{PAGE_BREAK}\n"))
    }
}

/// Greedy word wrap. Lines no longer than `width` pass through untouched;
/// longer ones are split so each emitted line stays below `width`.
/// A single word wider than the page is emitted on its own line.
pub fn wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.chars().count() <= width {
        return vec![line.to_string()];
    }
    let mut out = Vec::new();
    let mut current = String::new();
    for word in line.split(' ') {
        if current.chars().count() + word.chars().count() < width {
            current.push_str(word);
            current.push(' ');
        } else {
            let done = current.trim();
            if !done.is_empty() {
                out.push(done.to_string());
            }
            current = format!("{word} ");
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        out.push(rest.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_lines_pass_through() {
        assert_eq!(wrap_line("hello world", 80), vec!["hello world"]);
        assert_eq!(wrap_line("", 80), vec![""]);
    }

    #[test]
    fn long_lines_wrap_below_width() {
        let line = "word ".repeat(40);
        let wrapped = wrap_line(line.trim_end(), 20);
        assert!(wrapped.len() > 1);
        for l in &wrapped {
            assert!(l.chars().count() < 20, "{l:?} too wide");
        }
        assert_eq!(wrapped.join(" "), line.trim_end());
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let long = "x".repeat(30);
        let wrapped = wrap_line(&format!("a {long} b"), 10);
        assert_eq!(wrapped, vec!["a".to_string(), long, "b".to_string()]);
    }
}
