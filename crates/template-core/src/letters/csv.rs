use std::collections::HashSet;

use super::LetterFileError;

/// Header row of a test personalisation data CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDataCsv {
    parameters: Vec<String>,
}

impl TestDataCsv {
    /// Read and check the header row.
    ///
    /// # Errors
    ///
    /// Fails on an empty file, an empty header cell, a duplicated header, or
    /// malformed CSV.
    pub fn parse(bytes: &[u8]) -> Result<Self, LetterFileError> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(::csv::Trim::All)
            .from_reader(bytes);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(LetterFileError::EmptyCsv);
        }

        let mut seen = HashSet::new();
        let mut parameters = Vec::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            if header.is_empty() {
                return Err(LetterFileError::EmptyHeader(index + 1));
            }
            if !seen.insert(header) {
                return Err(LetterFileError::DuplicateHeader(header.to_string()));
            }
            parameters.push(header.to_string());
        }

        // Data rows must at least be well-formed.
        for record in reader.records() {
            record?;
        }

        Ok(Self { parameters })
    }

    /// Header names in file order.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_trimmed_headers() {
        let csv = TestDataCsv::parse(b"appointmentDate , clinic\n2024-01-01,North\n").unwrap();
        assert_eq!(csv.parameters(), ["appointmentDate", "clinic"]);
    }

    #[test]
    fn test_empty_file_fails() {
        assert!(matches!(
            TestDataCsv::parse(b""),
            Err(LetterFileError::EmptyCsv)
        ));
    }

    #[test]
    fn test_empty_header_fails() {
        assert!(matches!(
            TestDataCsv::parse(b"a,,c\n1,2,3\n"),
            Err(LetterFileError::EmptyHeader(2))
        ));
    }

    #[test]
    fn test_duplicate_header_fails() {
        assert!(matches!(
            TestDataCsv::parse(b"a,b,a\n"),
            Err(LetterFileError::DuplicateHeader(name)) if name == "a"
        ));
    }

    #[test]
    fn test_ragged_rows_fail() {
        assert!(matches!(
            TestDataCsv::parse(b"a,b\n1,2,3\n"),
            Err(LetterFileError::Csv(_))
        ));
    }
}
