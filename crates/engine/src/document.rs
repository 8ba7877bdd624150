// In-memory table decoded from a spreadsheet: a header of unique column
// names and rows of cell values aligned with it.

use serde::Serialize;

use crate::cell::CellValue;
use crate::error::DocumentError;

/// Ordered columns and ordered rows. Every row holds exactly one value per
/// column, positionally aligned with `columns`; a missing value is
/// `CellValue::Empty`, never a short row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TabularDocument {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl TabularDocument {
    /// Create a document with the given header and no rows.
    pub fn new<I, S>(columns: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self::default();
        for name in columns {
            let name = name.into();
            if doc.column_index(&name).is_some() {
                return Err(DocumentError::DuplicateColumn(name));
            }
            doc.columns.push(name);
        }
        Ok(doc)
    }

    /// Append a row. Short rows are padded with `Empty`.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) -> Result<(), DocumentError> {
        if cells.len() > self.columns.len() {
            return Err(DocumentError::RowTooWide {
                width: cells.len(),
                columns: self.columns.len(),
            });
        }
        cells.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(cells);
        Ok(())
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Rows in order, each aligned with `column_names()`.
    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Resolve `(row, column)` to positions, checking range before column.
    fn locate(&self, row: usize, column: &str) -> Result<(usize, usize), DocumentError> {
        if row >= self.rows.len() {
            return Err(DocumentError::OutOfRange {
                row: i64::try_from(row).unwrap_or(i64::MAX),
                row_count: self.rows.len(),
            });
        }
        let col = self
            .column_index(column)
            .ok_or_else(|| DocumentError::UnknownColumn(column.to_string()))?;
        Ok((row, col))
    }

    pub fn get_cell(&self, row: usize, column: &str) -> Result<&CellValue, DocumentError> {
        let (r, c) = self.locate(row, column)?;
        Ok(&self.rows[r][c])
    }

    pub fn set_cell(
        &mut self,
        row: usize,
        column: &str,
        value: CellValue,
    ) -> Result<(), DocumentError> {
        let (r, c) = self.locate(row, column)?;
        self.rows[r][c] = value;
        Ok(())
    }

    /// Append a column, filling every existing row with `default`.
    pub fn add_column(&mut self, name: &str, default: CellValue) -> Result<(), DocumentError> {
        if self.has_column(name) {
            return Err(DocumentError::DuplicateColumn(name.to_string()));
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(default.clone());
        }
        Ok(())
    }

    /// Remove a column from the header and from every row.
    pub fn delete_column(&mut self, name: &str) -> Result<(), DocumentError> {
        let col = self
            .column_index(name)
            .ok_or_else(|| DocumentError::UnknownColumn(name.to_string()))?;
        self.columns.remove(col);
        for row in &mut self.rows {
            row.remove(col);
        }
        Ok(())
    }

    /// Drop trailing rows whose cells are all empty. Neither container can
    /// represent them, so decoded documents never have any.
    pub fn trim_trailing_empty_rows(&mut self) {
        while self
            .rows
            .last()
            .is_some_and(|r| r.iter().all(CellValue::is_empty))
        {
            self.rows.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TabularDocument {
        let mut doc = TabularDocument::new(["name", "qty"]).unwrap();
        doc.push_row(vec!["apple".into(), 3.0.into()]).unwrap();
        doc.push_row(vec!["pear".into(), 10.0.into()]).unwrap();
        doc.push_row(vec!["plum".into()]).unwrap();
        doc
    }

    #[test]
    fn test_new_rejects_duplicate_header() {
        let err = TabularDocument::new(["a", "b", "a"]).unwrap_err();
        assert_eq!(err, DocumentError::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn test_empty_document() {
        let doc = TabularDocument::new(Vec::<String>::new()).unwrap();
        assert_eq!(doc.row_count(), 0);
        assert_eq!(doc.column_count(), 0);
        assert!(doc.column_names().is_empty());
    }

    #[test]
    fn test_short_rows_are_padded() {
        let doc = sample();
        assert_eq!(doc.get_cell(2, "qty").unwrap(), &CellValue::Empty);
        assert!(doc.rows().all(|r| r.len() == 2));
    }

    #[test]
    fn test_wide_row_rejected() {
        let mut doc = TabularDocument::new(["a"]).unwrap();
        let err = doc.push_row(vec![1.0.into(), 2.0.into()]).unwrap_err();
        assert_eq!(err, DocumentError::RowTooWide { width: 2, columns: 1 });
        assert_eq!(doc.row_count(), 0);
    }

    #[test]
    fn test_get_cell_checks() {
        let doc = sample();
        assert_eq!(doc.get_cell(1, "qty").unwrap(), &CellValue::Number(10.0));
        assert_eq!(
            doc.get_cell(3, "qty").unwrap_err(),
            DocumentError::OutOfRange { row: 3, row_count: 3 }
        );
        assert_eq!(
            doc.get_cell(0, "price").unwrap_err(),
            DocumentError::UnknownColumn("price".to_string())
        );
    }

    #[test]
    fn test_set_cell() {
        let mut doc = sample();
        doc.set_cell(1, "qty", CellValue::Number(42.0)).unwrap();
        assert_eq!(doc.get_cell(1, "qty").unwrap(), &CellValue::Number(42.0));
        assert_eq!(doc.get_cell(0, "qty").unwrap(), &CellValue::Number(3.0));

        let before = doc.clone();
        assert!(doc.set_cell(9, "qty", CellValue::Empty).is_err());
        assert!(doc.set_cell(0, "nope", CellValue::Empty).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_add_column_fills_rows() {
        let mut doc = sample();
        doc.add_column("status", CellValue::text("ok")).unwrap();
        assert_eq!(doc.column_names(), ["name", "qty", "status"]);
        assert_eq!(doc.row_count(), 3);
        for row in doc.rows() {
            assert_eq!(row[2], CellValue::text("ok"));
        }
    }

    #[test]
    fn test_add_duplicate_column_is_noop() {
        let mut doc = sample();
        let before = doc.clone();
        let err = doc.add_column("qty", CellValue::Empty).unwrap_err();
        assert_eq!(err, DocumentError::DuplicateColumn("qty".to_string()));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_delete_column() {
        let mut doc = sample();
        doc.delete_column("name").unwrap();
        assert_eq!(doc.column_names(), ["qty"]);
        assert_eq!(doc.get_cell(1, "qty").unwrap(), &CellValue::Number(10.0));

        let before = doc.clone();
        assert_eq!(
            doc.delete_column("name").unwrap_err(),
            DocumentError::UnknownColumn("name".to_string())
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_add_column_on_header_only_document() {
        let mut doc = TabularDocument::new(["a"]).unwrap();
        doc.add_column("b", CellValue::Number(1.0)).unwrap();
        assert_eq!(doc.column_count(), 2);
        assert_eq!(doc.row_count(), 0);
    }

    #[test]
    fn test_trim_trailing_empty_rows() {
        let mut doc = sample();
        doc.push_row(vec![CellValue::Empty, CellValue::Empty]).unwrap();
        doc.push_row(vec![]).unwrap();
        assert_eq!(doc.row_count(), 5);
        doc.trim_trailing_empty_rows();
        assert_eq!(doc.row_count(), 3);
    }
}
