// src/export/mod.rs
//! Presentation exports built on the core types: CSV dump and fiche document.

pub mod csv;
pub mod document;

pub use self::csv::{export_file_name, to_csv_string, write_csv};
pub use self::document::{Document, Layout, wrap_line};
