use once_cell::sync::Lazy;
use regex::Regex;

use super::LetterFileError;
use crate::markers::{classify_markers, ClassifiedMarkers};

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}\r\n]+)\}").unwrap());

const PDF_HEADER: &[u8] = b"%PDF-";
const PDF_TRAILER: &[u8] = b"%%EOF";

/// A parsed letter template PDF.
#[derive(Debug, Clone)]
pub struct TemplatePdf {
    markers: ClassifiedMarkers,
}

impl TemplatePdf {
    /// Parse a PDF and classify the markers found in its text.
    ///
    /// # Errors
    ///
    /// Returns [`LetterFileError::NotPdf`] if the `%PDF-` header is missing and
    /// [`LetterFileError::MissingTrailer`] if the document is truncated.
    pub fn parse(bytes: &[u8]) -> Result<Self, LetterFileError> {
        if !bytes.starts_with(PDF_HEADER) {
            return Err(LetterFileError::NotPdf);
        }
        if !bytes
            .windows(PDF_TRAILER.len())
            .any(|window| window == PDF_TRAILER)
        {
            return Err(LetterFileError::MissingTrailer);
        }

        let text = String::from_utf8_lossy(bytes);
        let tokens = MARKER
            .captures_iter(&text)
            .filter_map(|captures| captures.get(1))
            .map(|token| token.as_str().trim())
            .filter(|token| !token.is_empty());

        Ok(Self {
            markers: classify_markers(tokens),
        })
    }

    /// Valid marker names in document order.
    pub fn personalisation_parameters(&self) -> &[String] {
        &self.markers.valid
    }

    pub fn markers(&self) -> &ClassifiedMarkers {
        &self.markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(body: &str) -> Vec<u8> {
        format!("%PDF-1.7\n1 0 obj\n({})\nendobj\n%%EOF\n", body).into_bytes()
    }

    #[test]
    fn test_extracts_markers_in_order() {
        let parsed = TemplatePdf::parse(&pdf(
            "Dear {d.firstName} {d.lastName}, {d.firstName} your ref {d.nhsNumber}",
        ))
        .unwrap();

        assert_eq!(
            parsed.personalisation_parameters(),
            ["firstName", "lastName", "nhsNumber"]
        );
    }

    #[test]
    fn test_keeps_invalid_markers_separately() {
        let parsed = TemplatePdf::parse(&pdf("{d.ok} {c.if_thing} {plain} { }")).unwrap();
        let markers = parsed.markers();

        assert_eq!(markers.valid, vec!["ok"]);
        assert_eq!(markers.invalid_non_renderable, vec!["c.if_thing"]);
        assert_eq!(markers.invalid_renderable, vec!["plain"]);
    }

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(
            TemplatePdf::parse(b"hello world"),
            Err(LetterFileError::NotPdf)
        ));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        assert!(matches!(
            TemplatePdf::parse(b"%PDF-1.7\n1 0 obj"),
            Err(LetterFileError::MissingTrailer)
        ));
    }
}
