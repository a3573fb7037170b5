//! Tabular file reading
//!
//! Files are headerless and may be comma, semicolon or tab separated; rows may
//! have different widths. Content that is not valid UTF-8 is decoded as
//! Windows-1252, the usual encoding of spreadsheet exports.

use std::path::Path;

use super::error::ImportResult;
use super::normalize::Row;

const DELIMITER_CANDIDATES: [u8; 3] = [b',', b';', b'\t'];
const SNIFF_LINES: usize = 10;

/// Decode raw bytes into text
pub fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        },
    }
}

/// Pick the delimiter that splits the leading lines most consistently.
///
/// Falls back to a comma when no candidate yields more than one field.
pub fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for delimiter in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = sample
            .iter()
            .map(|line| field_count(line, delimiter))
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }

        let consistent = counts.iter().filter(|&&c| c == target).count();
        let score = consistent * target;
        if score > best_score {
            best_score = score;
            best = delimiter;
        }
    }

    best
}

fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(|r| r.ok())
        .map(|r| r.len())
        .unwrap_or(1)
}

/// Split text into rows of trimmed cells
pub fn parse_rows(content: &str) -> ImportResult<Vec<Row>> {
    let delimiter = sniff_delimiter(content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows)
}

/// Read and parse a file from disk
pub async fn read_rows(path: &Path) -> ImportResult<Vec<Row>> {
    let bytes = tokio::fs::read(path).await?;
    parse_rows(&decode(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("Fakeblock,90776,fakeblock.com\nBluth,92660,"), b',');
        assert_eq!(sniff_delimiter("Fakeblock;90776;fakeblock.com\nBluth;92660;"), b';');
        assert_eq!(sniff_delimiter("Fakeblock\t90776\nBluth\t92660"), b'\t');
        assert_eq!(sniff_delimiter("single column"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_semicolon_with_commas_in_names() {
        let content = "Foo, Inc.;12345;foo.com\nBar & Co.;54321;bar.com\n";
        assert_eq!(sniff_delimiter(content), b';');

        let rows = parse_rows(content).unwrap();
        assert_eq!(rows[0], vec!["Foo, Inc.", "12345", "foo.com"]);
    }

    #[test]
    fn test_parse_rows_flexible_and_trimmed() {
        let rows = parse_rows("Fakeblock , 90776, https://fakeblock.com\nBluth,92660\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["Fakeblock", "90776", "https://fakeblock.com"]);
        assert_eq!(rows[1], vec!["Bluth", "92660"]);
    }

    #[test]
    fn test_parse_quoted_cells() {
        let rows = parse_rows("\"Sitwell, Enterprises\",92661,sitwell.com\n").unwrap();
        assert_eq!(rows[0][0], "Sitwell, Enterprises");
    }

    #[test]
    fn test_empty_content_yields_no_rows() {
        assert!(parse_rows("").unwrap().is_empty());
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // "Société" with é encoded as 0xE9
        let bytes = vec![b'S', b'o', b'c', b'i', 0xE9, b't', 0xE9];
        assert_eq!(decode(bytes), "Société");
        assert_eq!(decode(b"plain".to_vec()), "plain");
    }

    #[tokio::test]
    async fn test_read_rows_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("companies.csv");
        tokio::fs::write(&path, "Fakeblock,90776\n").await.unwrap();

        let rows = read_rows(&path).await.unwrap();
        assert_eq!(rows, vec![vec!["Fakeblock".to_string(), "90776".to_string()]]);
    }
}
