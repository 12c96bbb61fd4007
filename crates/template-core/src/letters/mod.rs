//! Letter file parsing and validation.
//!
//! Uploaded letters consist of a PDF template and an optional CSV of test
//! personalisation data. Both are parsed here; [`validate_letter_template_files`]
//! decides whether the pair can be used.

mod csv;
mod pdf;
mod validate;

pub use self::csv::TestDataCsv;
pub use self::pdf::TemplatePdf;
pub use self::validate::{validate_letter_template_files, DEFAULT_PERSONALISATION};

use thiserror::Error;

/// Why an uploaded letter file could not be parsed.
#[derive(Debug, Error)]
pub enum LetterFileError {
    #[error("File is not a PDF document")]
    NotPdf,

    #[error("PDF document has no %%EOF trailer")]
    MissingTrailer,

    #[error("CSV file is empty")]
    EmptyCsv,

    #[error("CSV header {0} is empty")]
    EmptyHeader(usize),

    #[error("CSV header {0} is duplicated")]
    DuplicateHeader(String),

    #[error("Invalid CSV: {0}")]
    Csv(#[from] ::csv::Error),
}
