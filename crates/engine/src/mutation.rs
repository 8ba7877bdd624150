// Structured edits against a TabularDocument.
//
// A request is parsed into a `Mutation` before the document is touched,
// then validated against the document, then applied. Each mutation makes
// at most one structural change, so a rejected mutation leaves the
// document exactly as it was.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::cell::CellValue;
use crate::document::TabularDocument;
use crate::error::{DocumentError, MutationError};

/// The closed set of edit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    AddColumn,
    UpdateCell,
    DeleteColumn,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::AddColumn => "add_column",
            MutationKind::UpdateCell => "update_cell",
            MutationKind::DeleteColumn => "delete_column",
        }
    }
}

impl FromStr for MutationKind {
    type Err = MutationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "add_column" | "AddColumn" => Ok(MutationKind::AddColumn),
            "update_cell" | "UpdateCell" => Ok(MutationKind::UpdateCell),
            "delete_column" | "DeleteColumn" => Ok(MutationKind::DeleteColumn),
            other => Err(invalid(format!("Unknown modification type '{other}'."))),
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire form of an edit request, as received from a caller. Every field is
/// optional here; `parse` decides what the kind requires.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationRequest {
    #[serde(default, alias = "modification_type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub column_name: Option<String>,
    #[serde(default)]
    pub row_index: Option<serde_json::Value>,
    #[serde(default)]
    pub new_value: Option<serde_json::Value>,
}

/// A validated-shape edit. Document-level checks happen in `apply`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    AddColumn { column_name: String, new_value: CellValue },
    UpdateCell { column_name: String, row_index: i64, new_value: CellValue },
    DeleteColumn { column_name: String },
}

fn invalid(msg: impl Into<String>) -> MutationError {
    MutationError::InvalidRequest(msg.into())
}

const MISSING_PARAMETERS: &str = "Invalid modification type or missing parameters.";

impl MutationRequest {
    pub fn add_column(column_name: &str, new_value: serde_json::Value) -> Self {
        Self {
            kind: Some(MutationKind::AddColumn.as_str().to_string()),
            column_name: Some(column_name.to_string()),
            row_index: None,
            new_value: Some(new_value),
        }
    }

    pub fn update_cell(column_name: &str, row_index: i64, new_value: serde_json::Value) -> Self {
        Self {
            kind: Some(MutationKind::UpdateCell.as_str().to_string()),
            column_name: Some(column_name.to_string()),
            row_index: Some(serde_json::Value::from(row_index)),
            new_value: Some(new_value),
        }
    }

    pub fn delete_column(column_name: &str) -> Self {
        Self {
            kind: Some(MutationKind::DeleteColumn.as_str().to_string()),
            column_name: Some(column_name.to_string()),
            row_index: None,
            new_value: None,
        }
    }

    /// Check that the kind is known and that every field it requires is
    /// present and well-formed. Does not look at any document.
    pub fn parse(&self) -> Result<Mutation, MutationError> {
        let kind: MutationKind = self
            .kind
            .as_deref()
            .ok_or_else(|| invalid(MISSING_PARAMETERS))?
            .parse()?;

        let column_name = self
            .column_name
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| invalid(MISSING_PARAMETERS))?
            .to_string();

        match kind {
            MutationKind::AddColumn => Ok(Mutation::AddColumn {
                column_name,
                new_value: self.required_value()?,
            }),
            MutationKind::UpdateCell => {
                let raw_index = self
                    .row_index
                    .as_ref()
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| invalid(MISSING_PARAMETERS))?;
                let new_value = self.required_value()?;
                Ok(Mutation::UpdateCell {
                    column_name,
                    row_index: parse_row_index(raw_index)?,
                    new_value,
                })
            }
            MutationKind::DeleteColumn => Ok(Mutation::DeleteColumn { column_name }),
        }
    }

    fn required_value(&self) -> Result<CellValue, MutationError> {
        let raw = self
            .new_value
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(|| invalid(MISSING_PARAMETERS))?;
        CellValue::from_json(raw)
            .ok_or_else(|| invalid("New value must be a string, number, or boolean."))
    }
}

fn parse_row_index(raw: &serde_json::Value) -> Result<i64, MutationError> {
    const NOT_AN_INTEGER: &str = "Row index must be an integer.";
    match raw {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| invalid(NOT_AN_INTEGER)),
        serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid(NOT_AN_INTEGER)),
        _ => Err(invalid(NOT_AN_INTEGER)),
    }
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::AddColumn { .. } => MutationKind::AddColumn,
            Mutation::UpdateCell { .. } => MutationKind::UpdateCell,
            Mutation::DeleteColumn { .. } => MutationKind::DeleteColumn,
        }
    }

    pub fn column_name(&self) -> &str {
        match self {
            Mutation::AddColumn { column_name, .. }
            | Mutation::UpdateCell { column_name, .. }
            | Mutation::DeleteColumn { column_name } => column_name,
        }
    }

    /// Check the mutation against the document without changing it.
    pub fn validate(&self, doc: &TabularDocument) -> Result<(), DocumentError> {
        match self {
            Mutation::AddColumn { column_name, .. } => {
                if doc.has_column(column_name) {
                    return Err(DocumentError::DuplicateColumn(column_name.clone()));
                }
            }
            Mutation::UpdateCell { column_name, row_index, .. } => {
                checked_row(*row_index, doc.row_count())?;
                if !doc.has_column(column_name) {
                    return Err(DocumentError::UnknownColumn(column_name.clone()));
                }
            }
            Mutation::DeleteColumn { column_name } => {
                if !doc.has_column(column_name) {
                    return Err(DocumentError::UnknownColumn(column_name.clone()));
                }
            }
        }
        Ok(())
    }

    /// Human-readable description of the change, used in success responses.
    pub fn describe(&self) -> String {
        match self {
            Mutation::AddColumn { column_name, new_value } => {
                format!("Added column '{column_name}' with value '{new_value}'.")
            }
            Mutation::UpdateCell { column_name, row_index, new_value } => format!(
                "Updated cell at row {row_index}, column '{column_name}' to '{new_value}'."
            ),
            Mutation::DeleteColumn { column_name } => format!("Deleted column '{column_name}'."),
        }
    }
}

fn checked_row(row_index: i64, row_count: usize) -> Result<usize, DocumentError> {
    usize::try_from(row_index)
        .ok()
        .filter(|r| *r < row_count)
        .ok_or(DocumentError::OutOfRange { row: row_index, row_count })
}

/// Validate then apply. On error the document is untouched.
pub fn apply(doc: &mut TabularDocument, mutation: &Mutation) -> Result<String, MutationError> {
    mutation.validate(doc)?;

    match mutation {
        Mutation::AddColumn { column_name, new_value } => {
            doc.add_column(column_name, new_value.clone())?;
        }
        Mutation::UpdateCell { column_name, row_index, new_value } => {
            let row = checked_row(*row_index, doc.row_count())?;
            doc.set_cell(row, column_name, new_value.clone())?;
        }
        Mutation::DeleteColumn { column_name } => {
            doc.delete_column(column_name)?;
        }
    }

    log::debug!(
        "applied {} on column '{}' ({} rows x {} columns)",
        mutation.kind(),
        mutation.column_name(),
        doc.row_count(),
        doc.column_count()
    );
    Ok(mutation.describe())
}

/// Parse, validate, and apply a wire request in one step.
pub fn apply_request(
    doc: &mut TabularDocument,
    request: &MutationRequest,
) -> Result<String, MutationError> {
    let mutation = request.parse()?;
    apply(doc, &mutation)
}
