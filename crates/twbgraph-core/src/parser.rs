//! Workbook markup → [`WorkbookMetadata`].
//!
//! # Layout of a workbook
//!
//! ```text
//! <workbook>
//!   <datasources>
//!     <datasource name='Parameters'>      parameters live in a pseudo-datasource
//!     <datasource name='federated.x' caption='Orders'>
//!       <connection class='federated'> … <metadata-records> …
//!       <column name='[Sales]' …/>
//!       <column name='[Calculation_1]' caption='Profit Ratio'>
//!         <calculation class='tableau' formula='SUM([Profit])/SUM([Sales])'/>
//!   <worksheets>
//!     <worksheet name='Overview'>
//!       … <datasource-dependencies> <column …/> …    usage, location 1
//!       … <column …/> / <column-instance column='[Sales]'/>   usage, location 2
//!   <dashboards>
//!     <dashboard name='Exec'>
//!       … <worksheet name='Overview'/>   explicit reference
//!       … <zone name='Overview'/>        layout reference
//! ```
//!
//! Both usage locations (and both dashboard reference styles) encode the same
//! facts; they are merged into one deduplicated list per entity.
//!
//! Missing names never abort parsing: an ordinal label such as `Field 3` or
//! `Worksheet 1` is synthesized instead. Only a document whose root is not
//! `<workbook>` is rejected.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::document::{Document, Element};
use crate::error::FormatError;
use crate::model::{
    Calculation, Connection, Dashboard, Datasource, Field, LineagePair, Parameter, Worksheet,
    WorkbookMetadata, push_unique,
};
use crate::refs::extract_references;

/// Name of the pseudo-datasource holding workbook parameters.
pub const PARAMETERS_DATASOURCE: &str = "Parameters";

/// Remove one layer of surrounding square brackets and trim.
#[must_use]
pub fn strip_brackets(raw: &str) -> &str {
    let trimmed = raw.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);
    inner.trim()
}

/// Parse a decoded workbook document.
///
/// # Errors
///
/// Returns [`FormatError::MissingWorkbookRoot`] if the root element is not
/// `<workbook>`.
#[instrument(skip(document))]
pub fn parse_workbook(document: &Document) -> Result<WorkbookMetadata, FormatError> {
    let root = &document.root;
    if root.name != "workbook" {
        return Err(FormatError::MissingWorkbookRoot(root.name.clone()));
    }

    let mut ordinals = Ordinals::default();
    let mut datasources = Vec::new();
    let mut parameters = Vec::new();

    for ds_el in section(root, "datasources", "datasource") {
        if ds_el.attr("name") == Some(PARAMETERS_DATASOURCE) {
            parameters.extend(parse_parameters(ds_el, &mut ordinals));
        } else {
            datasources.push(parse_datasource(ds_el, &mut ordinals));
        }
    }

    let field_labels = FieldLabels::new(&datasources);

    let worksheets: Vec<Worksheet> = section(root, "worksheets", "worksheet")
        .enumerate()
        .map(|(i, ws_el)| parse_worksheet(ws_el, i + 1, &field_labels))
        .collect();

    let sheet_names: HashSet<&str> = worksheets.iter().map(|w| w.caption.as_str()).collect();

    let dashboards: Vec<Dashboard> = section(root, "dashboards", "dashboard")
        .enumerate()
        .map(|(i, db_el)| parse_dashboard(db_el, i + 1, &sheet_names))
        .collect();

    let mut metadata = WorkbookMetadata {
        datasources,
        parameters,
        worksheets,
        dashboards,
        field_to_field: Vec::new(),
        field_to_sheet: Vec::new(),
    };
    metadata.field_to_field = field_to_field_pairs(&metadata);
    metadata.field_to_sheet = field_to_sheet_pairs(&metadata);

    debug!(
        datasources = metadata.datasources.len(),
        parameters = metadata.parameters.len(),
        worksheets = metadata.worksheets.len(),
        dashboards = metadata.dashboards.len(),
        calculated = metadata.calculated_field_count(),
        "workbook parsed"
    );

    Ok(metadata)
}

// ---------------------------------------------------------------------------
// Datasources and fields
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Ordinals {
    datasource: usize,
    field: usize,
    parameter: usize,
}

impl Ordinals {
    fn next_datasource(&mut self) -> usize {
        self.datasource += 1;
        self.datasource
    }

    fn next_field(&mut self) -> usize {
        self.field += 1;
        self.field
    }

    fn next_parameter(&mut self) -> usize {
        self.parameter += 1;
        self.parameter
    }
}

fn section<'a>(
    root: &'a Element,
    container: &'a str,
    item: &'a str,
) -> impl Iterator<Item = &'a Element> + 'a {
    root.children_named(container)
        .flat_map(move |c| c.children_named(item))
}

fn parse_datasource(el: &Element, ordinals: &mut Ordinals) -> Datasource {
    let ordinal = ordinals.next_datasource();
    let id = el
        .non_empty_attr("name")
        .map_or_else(|| format!("Datasource {ordinal}"), str::to_string);
    let caption = el
        .non_empty_attr("caption")
        .map_or_else(|| id.clone(), str::to_string);

    let mut fields: Vec<Field> = el
        .children_named("column")
        .map(|col| parse_field(col, ordinals))
        .collect();

    // Physical columns are often only described by metadata records.
    let declared: HashSet<String> = fields.iter().map(|f| f.id.clone()).collect();
    for record in el.descendants_named("metadata-record") {
        if record.attr("class") != Some("column") {
            continue;
        }
        let Some(local_name) = record.child("local-name").map(|n| n.text.trim()) else {
            continue;
        };
        if local_name.is_empty() || declared.contains(local_name) {
            continue;
        }
        fields.push(field_from_metadata_record(record, local_name, ordinals));
    }

    Datasource {
        id,
        caption,
        connections: parse_connections(el),
        fields,
    }
}

fn parse_connections(ds_el: &Element) -> Vec<Connection> {
    ds_el
        .descendants_named("connection")
        .into_iter()
        .filter_map(|conn| {
            let class = conn.non_empty_attr("class")?;
            Some(Connection {
                class: class.to_string(),
                server: conn.non_empty_attr("server").map(str::to_string),
                dbname: conn.non_empty_attr("dbname").map(str::to_string),
                filename: conn.non_empty_attr("filename").map(str::to_string),
            })
        })
        .collect()
}

fn parse_field(col: &Element, ordinals: &mut Ordinals) -> Field {
    let ordinal = ordinals.next_field();
    let id = col.attr("name").map(str::trim).unwrap_or_default().to_string();
    let caption = col.non_empty_attr("caption").map(str::to_string);
    let display_name = display_name(caption.as_deref(), &id, "Field", ordinal);

    let calculation = col.child("calculation").and_then(|calc| {
        let formula = calc.non_empty_attr("formula")?;
        Some(Calculation {
            formula: formula.to_string(),
            class: calc.non_empty_attr("class").map(str::to_string),
        })
    });
    let references = calculation
        .as_ref()
        .map(|calc| extract_references(&calc.formula));

    Field {
        id,
        caption,
        display_name,
        datatype: col.non_empty_attr("datatype").map(str::to_string),
        role: col.non_empty_attr("role").map(str::to_string),
        default_aggregation: col
            .non_empty_attr("aggregation")
            .or_else(|| col.non_empty_attr("default-aggregation"))
            .map(str::to_string),
        is_calculated: calculation.is_some(),
        calculation,
        references,
    }
}

fn field_from_metadata_record(record: &Element, local_name: &str, ordinals: &mut Ordinals) -> Field {
    let ordinal = ordinals.next_field();
    let text_of = |tag: &str| {
        record
            .child(tag)
            .map(|el| el.text.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    Field {
        id: local_name.to_string(),
        caption: None,
        display_name: display_name(None, local_name, "Field", ordinal),
        datatype: text_of("local-type"),
        role: None,
        default_aggregation: text_of("aggregation"),
        is_calculated: false,
        calculation: None,
        references: None,
    }
}

fn parse_parameters(ds_el: &Element, ordinals: &mut Ordinals) -> Vec<Parameter> {
    ds_el
        .children_named("column")
        .map(|col| {
            let ordinal = ordinals.next_parameter();
            let id = col.attr("name").map(str::trim).unwrap_or_default().to_string();
            let caption = display_name(col.non_empty_attr("caption"), &id, "Parameter", ordinal);
            let current_value = col.non_empty_attr("value").map(str::to_string).or_else(|| {
                col.child("calculation")
                    .and_then(|calc| calc.non_empty_attr("formula"))
                    .map(str::to_string)
            });
            Parameter {
                id,
                caption,
                datatype: col.non_empty_attr("datatype").map(str::to_string),
                current_value,
            }
        })
        .collect()
}

fn display_name(caption: Option<&str>, id: &str, kind: &str, ordinal: usize) -> String {
    if let Some(caption) = caption {
        return caption.to_string();
    }
    let stripped = strip_brackets(id);
    if stripped.is_empty() {
        format!("{kind} {ordinal}")
    } else {
        stripped.to_string()
    }
}

/// Internal field id → display name.
///
/// `Calculation_NNNN` ids repeat across datasources (a duplicated datasource
/// keeps them), so a lookup is scoped to the datasource whenever the markup
/// names one. The workbook-wide map, first declaration wins, only serves
/// columns with no datasource context.
#[derive(Debug, Default)]
struct FieldLabels {
    scoped: HashMap<(String, String), String>,
    global: HashMap<String, String>,
}

impl FieldLabels {
    fn new(datasources: &[Datasource]) -> Self {
        let mut labels = Self::default();
        for ds in datasources {
            for field in ds.fields.iter().filter(|f| !f.id.is_empty()) {
                labels
                    .scoped
                    .entry((ds.id.clone(), field.id.clone()))
                    .or_insert_with(|| field.display_name.clone());
                labels
                    .global
                    .entry(field.id.clone())
                    .or_insert_with(|| field.display_name.clone());
            }
        }
        labels
    }

    fn get(&self, datasource: Option<&str>, id: &str) -> Option<&str> {
        match datasource {
            Some(ds) => self.scoped.get(&(ds.to_string(), id.to_string())),
            None => self.global.get(id),
        }
        .map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Worksheets
// ---------------------------------------------------------------------------

fn parse_worksheet(el: &Element, ordinal: usize, labels: &FieldLabels) -> Worksheet {
    let name = el
        .non_empty_attr("name")
        .map_or_else(|| format!("Worksheet {ordinal}"), str::to_string);

    let mut declared = Vec::new();
    let mut inline = Vec::new();
    collect_worksheet_usage(el, false, None, labels, &mut declared, &mut inline);

    let mut fields_used = Vec::with_capacity(declared.len() + inline.len());
    for label in declared.into_iter().chain(inline) {
        push_unique(&mut fields_used, label);
    }

    Worksheet {
        id: name.clone(),
        caption: name,
        fields_used,
    }
}

/// Walk a worksheet subtree, splitting column labels by where they appear.
/// `datasource` is the enclosing dependency block's datasource, if named.
fn collect_worksheet_usage(
    el: &Element,
    in_dependencies: bool,
    datasource: Option<&str>,
    labels: &FieldLabels,
    declared: &mut Vec<String>,
    inline: &mut Vec<String>,
) {
    for child in &el.children {
        match child.name.as_str() {
            "datasource-dependencies" => {
                let scope = child.non_empty_attr("datasource");
                if scope != Some(PARAMETERS_DATASOURCE) {
                    collect_worksheet_usage(child, true, scope, labels, declared, inline);
                }
            }
            "column" => {
                let label =
                    column_label(child.attr("caption"), child.attr("name"), datasource, labels);
                if let Some(label) = label {
                    if in_dependencies {
                        declared.push(label);
                    } else {
                        inline.push(label);
                    }
                }
            }
            "column-instance" if !in_dependencies => {
                if let Some(label) = column_label(None, child.attr("column"), None, labels) {
                    inline.push(label);
                }
            }
            _ => collect_worksheet_usage(
                child,
                in_dependencies,
                datasource,
                labels,
                declared,
                inline,
            ),
        }
    }
}

fn column_label(
    caption: Option<&str>,
    name: Option<&str>,
    datasource: Option<&str>,
    labels: &FieldLabels,
) -> Option<String> {
    if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
        return Some(caption.to_string());
    }
    let name = name.map(str::trim).filter(|n| !n.is_empty())?;
    if let Some(label) = labels.get(datasource, name) {
        return Some(label.to_string());
    }
    let stripped = strip_brackets(name);
    // `[:Measure Names]` and friends are Tableau pseudo-columns.
    if stripped.is_empty() || stripped.starts_with(':') {
        None
    } else {
        Some(stripped.to_string())
    }
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

fn parse_dashboard(el: &Element, ordinal: usize, sheet_names: &HashSet<&str>) -> Dashboard {
    let name = el
        .non_empty_attr("name")
        .map_or_else(|| format!("Dashboard {ordinal}"), str::to_string);

    let mut worksheets = Vec::new();

    for reference in el.descendants_named("worksheet") {
        if let Some(sheet) = reference.non_empty_attr("name") {
            push_unique(&mut worksheets, sheet.to_string());
        }
    }

    // Zones also hold text, images and filters; only names that match a
    // worksheet count as references.
    for zone in el.descendants_named("zone") {
        if let Some(sheet) = zone.non_empty_attr("name") {
            if sheet_names.contains(sheet) {
                push_unique(&mut worksheets, sheet.to_string());
            }
        }
    }

    Dashboard {
        id: name.clone(),
        caption: name,
        worksheets,
    }
}

// ---------------------------------------------------------------------------
// Lineage projections
// ---------------------------------------------------------------------------

fn field_to_field_pairs(metadata: &WorkbookMetadata) -> Vec<LineagePair> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for (_, field) in metadata.all_fields() {
        let Some(refs) = &field.references else {
            continue;
        };
        for token in &refs.fields {
            let pair = LineagePair {
                from: strip_brackets(token).to_string(),
                to: field.display_name.clone(),
            };
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
    }
    pairs
}

fn field_to_sheet_pairs(metadata: &WorkbookMetadata) -> Vec<LineagePair> {
    let mut seen = HashSet::new();
    let mut pairs = Vec::new();
    for sheet in &metadata.worksheets {
        for field in &sheet.fields_used {
            let pair = LineagePair {
                from: field.clone(),
                to: sheet.caption.clone(),
            };
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }
    }
    pairs
}
