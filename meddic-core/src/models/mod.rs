// src/models/mod.rs

pub mod fiche;
pub mod field;
pub mod status;

pub use fiche::{Fiche, FicheForm, FicheId, FieldError, ValidFiche, ValidationErrors};
pub use field::MeddicField;
pub use status::{Priority, Status};
