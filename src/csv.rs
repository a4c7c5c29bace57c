//! CSV row parsing for bulk certificate import.
//!
//! Produces a sequence of header→value mappings: headers lowercased and
//! trimmed, cell values trimmed, blank lines skipped, and rows shorter than
//! the header count padded with empty strings. Fewer than two lines (no data
//! rows) yields an empty result rather than an error.
//!
//! Unlike a naive comma split, quoted fields containing commas parse
//! correctly; that choice is pinned by the tests below.

use std::collections::BTreeMap;

/// One parsed data row, keyed by lowercased header name.
pub type CsvRow = BTreeMap<String, String>;

/// Parse raw CSV text into row mappings. Pure function of the input text;
/// malformed lines degrade to zero rows rather than failing the whole parse.
pub fn parse_rows(text: &str) -> Vec<CsvRow> {
    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let headers: Vec<String> = match records.next() {
        Some(Ok(header_row)) => header_row
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect(),
        _ => return Vec::new(),
    };

    let mut rows = Vec::new();
    for record in records {
        let record = match record {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(?err, "skipping malformed CSV line");
                continue;
            }
        };
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let mut row = CsvRow::new();
        for (i, header) in headers.iter().enumerate() {
            let value = record.get(i).map(str::trim).unwrap_or("");
            row.insert(header.clone(), value.to_string());
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_csv_maps_headers_to_values() {
        let rows = parse_rows(
            "id,name,event,position,date,issued by\n\
             SPT-001,Jane Doe,Regatta,Winner,2025-01-01,Sportify\n",
        );
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.len(), 6);
        assert_eq!(row["id"], "SPT-001");
        assert_eq!(row["name"], "Jane Doe");
        assert_eq!(row["event"], "Regatta");
        assert_eq!(row["position"], "Winner");
        assert_eq!(row["date"], "2025-01-01");
        assert_eq!(row["issued by"], "Sportify");
    }

    #[test]
    fn empty_and_header_only_inputs_yield_no_rows() {
        assert!(parse_rows("").is_empty());
        assert!(parse_rows("id,name").is_empty());
        assert!(parse_rows("id,name\n").is_empty());
    }

    #[test]
    fn headers_are_lowercased_and_trimmed() {
        let rows = parse_rows("ID , Student Name\nSPT-002,Bob\n");
        assert_eq!(rows[0]["id"], "SPT-002");
        assert_eq!(rows[0]["student name"], "Bob");
    }

    #[test]
    fn short_rows_pad_missing_trailing_fields() {
        let rows = parse_rows("id,name,event\nSPT-003,Carol\n");
        assert_eq!(rows[0]["id"], "SPT-003");
        assert_eq!(rows[0]["name"], "Carol");
        assert_eq!(rows[0]["event"], "");
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows = parse_rows("id,name\nSPT-004,Dave\n\n\nSPT-005,Eve\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["id"], "SPT-005");
    }

    #[test]
    fn crlf_line_endings_are_handled() {
        let rows = parse_rows("id,name\r\nSPT-006,Frank\r\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Frank");
    }

    #[test]
    fn quoted_field_keeps_embedded_comma() {
        let rows = parse_rows("id,name,event\nSPT-007,\"Doe, Jane\",Regatta\n");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Doe, Jane");
        assert_eq!(rows[0]["event"], "Regatta");
    }
}
