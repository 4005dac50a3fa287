//! Workbook metadata model produced by [`crate::parser`].
//!
//! Everything here is plain serializable data. Sets that the source format
//! encodes redundantly (`fields_used`, dashboard `worksheets`) are stored as
//! insertion-ordered, deduplicated vectors.

use serde::{Deserialize, Serialize};

/// References extracted from a calculation formula.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct References {
    /// Bracketed field tokens, e.g. `"[Sales]"`.
    pub fields: Vec<String>,
    /// Parameter names without brackets or colon.
    pub parameters: Vec<String>,
}

impl References {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.parameters.is_empty()
    }
}

/// Formula text plus its calculation class (`tableau`, `categorical-bin`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calculation {
    pub formula: String,
    pub class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Internal identifier as written in the workbook, e.g. `[Calculation_12]`.
    pub id: String,
    pub caption: Option<String>,
    /// Caption, else the bracket-stripped id, else an ordinal label.
    pub display_name: String,
    pub datatype: Option<String>,
    pub role: Option<String>,
    pub default_aggregation: Option<String>,
    pub is_calculated: bool,
    pub calculation: Option<Calculation>,
    pub references: Option<References>,
}

/// A connection descriptor attached to a datasource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub class: String,
    pub server: Option<String>,
    pub dbname: Option<String>,
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datasource {
    pub id: String,
    pub caption: String,
    pub connections: Vec<Connection>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    pub caption: String,
    pub datatype: Option<String>,
    pub current_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worksheet {
    pub id: String,
    pub caption: String,
    pub fields_used: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: String,
    pub caption: String,
    pub worksheets: Vec<String>,
}

/// A directed lineage pair recorded at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineagePair {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkbookMetadata {
    pub datasources: Vec<Datasource>,
    pub parameters: Vec<Parameter>,
    pub worksheets: Vec<Worksheet>,
    pub dashboards: Vec<Dashboard>,
    /// Referenced field token → calculated field display name.
    pub field_to_field: Vec<LineagePair>,
    /// Field caption → worksheet caption.
    pub field_to_sheet: Vec<LineagePair>,
}

impl WorkbookMetadata {
    /// Every field across all datasources, paired with its datasource.
    pub fn all_fields(&self) -> impl Iterator<Item = (&Datasource, &Field)> {
        self.datasources
            .iter()
            .flat_map(|ds| ds.fields.iter().map(move |f| (ds, f)))
    }

    #[must_use]
    pub fn calculated_field_count(&self) -> usize {
        self.all_fields().filter(|(_, f)| f.is_calculated).count()
    }
}

/// Push `value` unless an equal value is already present.
pub(crate) fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}
