use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{TemplatePdf, TestDataCsv};
use crate::markers::ADDRESS_LINES;

/// Personalisation supplied for every recipient without test data.
pub const DEFAULT_PERSONALISATION: [&str; 15] = [
    "fullName",
    "firstName",
    "lastName",
    "middleNames",
    "namePrefix",
    "nameSuffix",
    "nhsNumber",
    "date",
    "address_line_1",
    "address_line_2",
    "address_line_3",
    "address_line_4",
    "address_line_5",
    "address_line_6",
    "address_line_7",
];

const ADDRESS_LINE_PREFIX: &str = "address_line_";

static CUSTOM_PARAMETER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// Whether a parsed PDF and optional test data CSV form a usable letter.
///
/// The PDF must personalise exactly `address_line_1..7` in order and contain
/// no non-renderable markers. Custom (non-default) parameters must be plain
/// identifiers and must match the CSV header set exactly; a letter without
/// custom parameters must not carry CSV headers.
pub fn validate_letter_template_files(pdf: &TemplatePdf, csv: Option<&TestDataCsv>) -> bool {
    if !pdf.markers().invalid_non_renderable.is_empty() {
        return false;
    }

    let parameters = pdf.personalisation_parameters();

    let address_lines: Vec<&str> = parameters
        .iter()
        .map(String::as_str)
        .filter(|name| name.starts_with(ADDRESS_LINE_PREFIX))
        .collect();
    if address_lines != ADDRESS_LINES {
        return false;
    }

    let custom: BTreeSet<&str> = parameters
        .iter()
        .map(String::as_str)
        .filter(|name| !DEFAULT_PERSONALISATION.contains(name))
        .collect();
    if !custom.iter().all(|name| CUSTOM_PARAMETER.is_match(name)) {
        return false;
    }

    let headers: BTreeSet<&str> = csv
        .map(|csv| csv.parameters().iter().map(String::as_str).collect())
        .unwrap_or_default();

    if custom.is_empty() {
        headers.is_empty()
    } else {
        csv.is_some() && headers == custom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(markers: &[&str]) -> TemplatePdf {
        let body: String = markers.iter().map(|m| format!("{{{}}} ", m)).collect();
        TemplatePdf::parse(format!("%PDF-1.4\n({})\n%%EOF", body).as_bytes()).unwrap()
    }

    fn address() -> Vec<String> {
        ADDRESS_LINES.iter().map(|line| format!("d.{}", line)).collect()
    }

    fn with_address(extra: &[&str]) -> TemplatePdf {
        let mut markers = address();
        markers.extend(extra.iter().map(|m| m.to_string()));
        let refs: Vec<&str> = markers.iter().map(String::as_str).collect();
        pdf(&refs)
    }

    #[test]
    fn test_defaults_only_without_csv() {
        assert!(validate_letter_template_files(
            &with_address(&["d.firstName", "d.nhsNumber"]),
            None
        ));
    }

    #[test]
    fn test_missing_address_line_fails() {
        let markers = address();
        let refs: Vec<&str> = markers[..6].iter().map(String::as_str).collect();
        assert!(!validate_letter_template_files(&pdf(&refs), None));
    }

    #[test]
    fn test_address_lines_out_of_order_fail() {
        let mut markers = address();
        markers.swap(0, 1);
        let refs: Vec<&str> = markers.iter().map(String::as_str).collect();
        assert!(!validate_letter_template_files(&pdf(&refs), None));
    }

    #[test]
    fn test_custom_parameters_need_matching_csv() {
        let template = with_address(&["d.clinic", "d.appointmentDate"]);
        let matching = TestDataCsv::parse(b"appointmentDate,clinic\n").unwrap();
        let partial = TestDataCsv::parse(b"clinic\n").unwrap();

        assert!(validate_letter_template_files(&template, Some(&matching)));
        assert!(!validate_letter_template_files(&template, Some(&partial)));
        assert!(!validate_letter_template_files(&template, None));
    }

    #[test]
    fn test_csv_without_custom_parameters_fails() {
        let csv = TestDataCsv::parse(b"clinic\n").unwrap();
        assert!(!validate_letter_template_files(&with_address(&[]), Some(&csv)));
    }

    #[test]
    fn test_dashed_custom_parameter_fails() {
        let template = with_address(&["d.clinic-name"]);
        let csv = TestDataCsv::parse(b"clinic-name\n").unwrap();
        assert!(!validate_letter_template_files(&template, Some(&csv)));
    }

    #[test]
    fn test_non_renderable_marker_fails() {
        assert!(!validate_letter_template_files(
            &with_address(&["c.show_if"]),
            None
        ));
    }

    #[test]
    fn test_renderable_invalid_marker_is_ignored() {
        assert!(validate_letter_template_files(
            &with_address(&["d.foo.bar"]),
            None
        ));
    }
}
