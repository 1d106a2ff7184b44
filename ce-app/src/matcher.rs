//! Client-side document lookup over a directory dataset.

use crate::validation::clean_document;
use ce_data::{CellValue, Dataset, Row};
use serde::Serialize;

pub use crate::validation::clean_document as normalize_document;

/// Column-name fragments that mark a column as holding document numbers.
pub const DOCUMENT_COLUMN_KEYWORDS: [&str; 10] = [
    "nit",
    "cedula",
    "documento",
    "doc_number",
    "identification",
    "tax_id",
    "client_id",
    "customer_id",
    "id_number",
    "cc",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentMatch {
    pub row: Row,
    pub matched_column: String,
    pub matched_value: CellValue,
    /// Column names in dataset order, for rendering the row.
    #[serde(skip)]
    pub column_order: Vec<String>,
}

/// Columns whose lower-cased name contains a document keyword. When none do,
/// every column is a candidate.
pub fn document_columns(dataset: &Dataset) -> Vec<&str> {
    let keyed: Vec<&str> = dataset
        .column_names()
        .filter(|name| {
            let lower = name.to_lowercase();
            DOCUMENT_COLUMN_KEYWORDS.iter().any(|kw| lower.contains(kw))
        })
        .collect();
    if keyed.is_empty() {
        dataset.column_names().collect()
    } else {
        keyed
    }
}

/// Every row whose first matching candidate column equals the query after
/// normalization. A row contributes at most one match.
pub fn find_document(dataset: &Dataset, raw_document: &str) -> Vec<DocumentMatch> {
    let query = clean_document(raw_document);
    if query.is_empty() {
        return Vec::new();
    }
    let columns = document_columns(dataset);
    let column_order: Vec<String> = dataset.column_names().map(str::to_string).collect();

    dataset
        .rows
        .iter()
        .filter_map(|row| {
            columns.iter().find_map(|column| {
                let value = row.get(column)?;
                if !value.has_value() {
                    return None;
                }
                (clean_document(&value.to_display_string()) == query).then(|| DocumentMatch {
                    row: row.clone(),
                    matched_column: (*column).to_string(),
                    matched_value: value.clone(),
                    column_order: column_order.clone(),
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{document_columns, find_document, normalize_document};
    use crate::validation::clean_document;
    use ce_data::{CellValue, Column, Dataset, Row};

    fn dataset(columns: &[&str], rows: Vec<Vec<(&str, CellValue)>>) -> Dataset {
        Dataset::new(
            columns.iter().map(|c| Column::named(*c)).collect(),
            rows.into_iter().map(|r| r.into_iter().collect::<Row>()).collect(),
        )
    }

    #[test]
    fn formatting_differences_normalize_away() {
        assert_eq!(normalize_document("901-234.567"), normalize_document("901234567"));
        assert_eq!(normalize_document(" 12 345 678 "), "12345678");
        assert_eq!(normalize_document("80.012-345"), clean_document("80.012-345"));

        let ds = dataset(
            &["nit", "nombre"],
            vec![vec![("nit", "901.234.567".into()), ("nombre", "ACME".into())]],
        );
        let a = find_document(&ds, "901-234.567");
        let b = find_document(&ds, "901234567");
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
        assert_eq!(a[0].matched_column, "nit");
        assert_eq!(a[0].matched_value, CellValue::from("901.234.567"));
        assert_eq!(a[0].column_order, vec!["nit", "nombre"]);
    }

    #[test]
    fn numeric_cells_compare_by_their_digits() {
        let ds = dataset(&["cedula"], vec![vec![("cedula", 12345678_i64.into())]]);
        assert_eq!(find_document(&ds, "12.345.678").len(), 1);
    }

    #[test]
    fn keyword_columns_are_preferred_over_others() {
        let ds = dataset(
            &["Customer_ID", "telefono", "NIT_empresa"],
            vec![vec![
                ("Customer_ID", "1".into()),
                ("telefono", "901234567".into()),
                ("NIT_empresa", "2".into()),
            ]],
        );
        assert_eq!(document_columns(&ds), vec!["Customer_ID", "NIT_empresa"]);
        assert!(find_document(&ds, "901234567").is_empty());
    }

    #[test]
    fn without_keyword_columns_every_column_is_searched() {
        let ds = dataset(
            &["razon", "telefono"],
            vec![vec![("razon", "ACME".into()), ("telefono", "901234567".into())]],
        );
        let matches = find_document(&ds, "901234567");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_column, "telefono");
    }

    #[test]
    fn each_row_matches_once_via_first_column_and_all_rows_are_returned() {
        let ds = dataset(
            &["nit", "cedula"],
            vec![
                vec![("nit", "555555".into()), ("cedula", "555555".into())],
                vec![("nit", CellValue::Null), ("cedula", "555-555".into())],
                vec![("nit", "111111".into()), ("cedula", "222222".into())],
            ],
        );
        let matches = find_document(&ds, "555555");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].matched_column, "nit");
        assert_eq!(matches[1].matched_column, "cedula");
    }

    #[test]
    fn empty_or_blank_cells_never_match() {
        let ds = dataset(
            &["nit"],
            vec![vec![("nit", "".into())], vec![("nit", CellValue::Null)]],
        );
        assert!(find_document(&ds, "").is_empty());
        assert!(find_document(&ds, "123456").is_empty());
    }
}
