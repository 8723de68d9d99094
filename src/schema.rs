use log::{debug, trace};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::formula::{self, Formula};
use crate::naming;

mod order;
mod raw;

use raw::{RawField, RawTable};

/// Stored type of a field value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    String,
    Number,
    Integer,
    Decimal,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
        };
        write!(f, "{s}")
    }
}

/// How a field gets its value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Stored as is.
    #[default]
    Raw,

    /// Stored key of a row in another table.
    Relationship,

    /// Value of another table's row, found by key.
    Lookup,

    /// Arithmetic over the record's own fields.
    Calculated,

    /// Count or extremum over rows of another table.
    Aggregation,
}

impl FieldType {
    /// Whether the value comes from a formula rather than from storage.
    pub fn is_calculated(&self) -> bool {
        matches!(
            self,
            FieldType::Lookup | FieldType::Calculated | FieldType::Aggregation
        )
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FieldType::Raw => "raw",
            FieldType::Relationship => "relationship",
            FieldType::Lookup => "lookup",
            FieldType::Calculated => "calculated",
            FieldType::Aggregation => "aggregation",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    datatype: DataType,
    field_type: FieldType,
    formula: Option<String>,
    description: String,
    is_primary_key: bool,
    related_to: Option<String>,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Formula text as written, including the leading `=`.
    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    /// Table this relationship field points to.
    pub fn related_to(&self) -> Option<&str> {
        self.related_to.as_deref()
    }

    pub fn is_calculated(&self) -> bool {
        self.field_type.is_calculated()
    }

    /// Names of the record's own fields the formula references. Empty if there is
    /// no formula.
    pub fn dependencies(&self) -> Vec<String> {
        self.formula
            .as_deref()
            .map(formula::dependencies)
            .unwrap_or_default()
    }
}

impl From<RawField> for Field {
    fn from(raw: RawField) -> Self {
        Field {
            name: raw.name,
            datatype: raw.datatype,
            field_type: raw.field_type,
            formula: raw.formula,
            description: raw.description.unwrap_or_default(),
            is_primary_key: raw.is_primary_key,
            related_to: raw.related_to,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    description: String,
    primary_key: Vec<String>,
    fields: Vec<Field>,
    rows: Vec<Map<String, Value>>,
}

impl Table {
    fn from_raw(name: String, raw: RawTable) -> Self {
        Table {
            name,
            description: raw.description.unwrap_or_default(),
            primary_key: raw.primary_key,
            fields: raw.schema.into_iter().map(Field::from).collect(),
            rows: raw.data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Data rows as written in the document.
    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    /// First field with the given name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Stored fields, that is raw and relationship ones.
    pub fn raw_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| !f.is_calculated())
    }

    pub fn calculated_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_calculated())
    }

    /// Calculated fields ordered so that each comes after the calculated fields of this
    /// table it depends on.
    pub fn calculation_order(&self) -> Result<Vec<&Field>, CircularDependency> {
        order::calculation_order(self)
    }
}

/// Relationship field resolved against the table it points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relationship<'r> {
    pub field: &'r str,
    pub related_table: &'r str,

    /// First primary key field of the related table.
    pub related_field: &'r str,
}

/// The whole rulebook document.
#[derive(Debug, Clone)]
pub struct Rulebook {
    model_name: String,
    description: String,

    /// Tables in document order.
    tables: Vec<Table>,
}

impl Rulebook {
    pub fn from_json_str(s: &str) -> Result<Rulebook, ParseError> {
        let value: Value = serde_json::from_str(s)?;
        Self::from_json_value(value)
    }

    pub fn from_yaml_str(s: &str) -> Result<Rulebook, ParseError> {
        let value: Value = serde_yml::from_str(s)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Rulebook, ParseError> {
        let Value::Object(document) = value else {
            return Err(ParseError::NotAMapping);
        };

        let model_name = document
            .get("model_name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_owned();
        let description = document
            .get("Description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let mut tables = Vec::new();
        for (key, value) in document {
            if raw::is_reserved(&key) {
                trace!("Skipping reserved key `{key}`");
                continue;
            }
            if !value.is_object() {
                trace!("Skipping `{key}`, not a table mapping");
                continue;
            }

            let raw: RawTable = serde_json::from_value(value).map_err(|source| {
                ParseError::Table {
                    table: key.clone(),
                    source,
                }
            })?;
            tables.push(Table::from_raw(key, raw));
        }

        debug!("Parsed rulebook `{model_name}` with {} tables", tables.len());
        Ok(Rulebook {
            model_name,
            description,
            tables,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name())
    }

    /// Relationship fields of every table that point to a known table with a primary
    /// key. Tables without such fields are left out.
    pub fn relationships(&self) -> Vec<(&str, Vec<Relationship>)> {
        self.tables
            .iter()
            .filter_map(|table| {
                let found: Vec<Relationship> = table
                    .fields
                    .iter()
                    .filter(|f| f.field_type == FieldType::Relationship)
                    .filter_map(|f| {
                        let related = self.table(f.related_to()?)?;
                        let key = related.primary_key.first()?;
                        Some(Relationship {
                            field: f.name(),
                            related_table: related.name(),
                            related_field: key.as_str(),
                        })
                    })
                    .collect();

                (!found.is_empty()).then_some((table.name(), found))
            })
            .collect()
    }

    /// Human-readable issues found in the document. Nothing here stops the document
    /// from being used.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        for table in &self.tables {
            let t = table.name();

            if table.primary_key.is_empty() {
                issues.push(format!("Table '{t}' has no primary key defined"));
            }

            if let Err(e) = table.calculation_order() {
                issues.push(format!("Table '{t}': {e}"));
            }

            for field in &table.fields {
                let f = field.name();

                if !naming::is_identifier(f) {
                    issues.push(format!(
                        "Field '{t}.{f}' cannot be referenced from formulas, its name is not an identifier"
                    ));
                }

                if field.field_type == FieldType::Relationship {
                    match field.related_to() {
                        None => issues.push(format!(
                            "Field '{t}.{f}' is a relationship but has no RelatedTo"
                        )),
                        Some(related) if self.table(related).is_none() => issues.push(format!(
                            "Field '{t}.{f}' relates to unknown table '{related}'"
                        )),
                        Some(_) => {}
                    }
                }

                match field.formula() {
                    None if field.is_calculated() => issues.push(format!(
                        "Field '{t}.{f}' is a {} field but has no formula",
                        field.field_type
                    )),
                    None => {}
                    Some(text) => {
                        if let Err(e) = Formula::parse(text) {
                            issues.push(format!("Field '{t}.{f}' has an unparsable formula: {e}"));
                        }
                        for dep in field.dependencies() {
                            if table.field(&dep).is_none() {
                                issues.push(format!(
                                    "Field '{t}.{f}' references unknown field '{dep}'"
                                ));
                            }
                        }
                    }
                }
            }
        }

        debug!("Validation found {} issues", issues.len());
        issues
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid JSON. {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML. {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Rulebook document must be a mapping of table names to tables")]
    NotAMapping,

    #[error("Table `{table}` is malformed. {source}")]
    Table {
        table: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Circular dependency detected for field: {field}")]
pub struct CircularDependency {
    /// Table the cycle is in.
    pub table: String,

    /// Field that was reached again while its own dependencies were being resolved.
    pub field: String,
}
