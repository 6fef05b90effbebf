//! Typed field values for material records and tables.

use crate::domain::{Composition, NkData, ParamError, ParamResult};
use crate::units::{Parameter, Quantity};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Parameter(Parameter),
    Composition(Composition),
    Sources(Vec<String>),
    Nk(NkData),
}

impl FieldValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Parameter(_) => "parameter",
            Self::Composition(_) => "composition",
            Self::Sources(_) => "sources",
            Self::Nk(_) => "nk",
        }
    }

    /// The value as a parameter, if it is one: numbers are dimensionless and
    /// text must read as `"<number> <unit>"`. Formulas and labels are not
    /// parameters.
    pub fn as_parameter(&self) -> Option<Parameter> {
        match self {
            Self::Parameter(parameter) => Some(parameter.clone()),
            Self::Number(value) => Some(Parameter::dimensionless(*value)),
            Self::Text(text) => Quantity::parse(text).ok().map(Parameter::from),
            _ => None,
        }
    }

    pub fn to_parameter(&self, field: &str) -> ParamResult<Parameter> {
        self.as_parameter().ok_or_else(|| {
            ParamError::invalid_input(
                "INPUT.FIELD_TYPE",
                format!("field '{field}' holds {} data, not a parameter", self.kind()),
            )
        })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<Parameter> for FieldValue {
    fn from(value: Parameter) -> Self {
        Self::Parameter(value)
    }
}

impl From<Composition> for FieldValue {
    fn from(value: Composition) -> Self {
        Self::Composition(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::Sources(value)
    }
}

impl From<NkData> for FieldValue {
    fn from(value: NkData) -> Self {
        Self::Nk(value)
    }
}

/// Ordered `field -> value` mapping; inserting an existing field replaces
/// its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialRecord {
    fields: Vec<(String, FieldValue)>,
}

impl MaterialRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(name, _)| name == field)?;
        Some(self.fields.remove(index).1)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl IntoIterator for MaterialRecord {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl Serialize for MaterialRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Columnar table of material records. Cells a record lacks are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaterialTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<FieldValue>>>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MaterialRecord>,
    {
        let mut table = Self::new();
        for record in records {
            table.push(record);
        }
        table
    }

    pub fn push(&mut self, record: MaterialRecord) {
        for field in record.keys() {
            if !self.columns.iter().any(|column| column == field) {
                self.columns.push(field.to_string());
                for row in &mut self.rows {
                    row.push(None);
                }
            }
        }
        let row = self
            .columns
            .iter()
            .map(|column| record.get(column).cloned())
            .collect();
        self.rows.push(row);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index)?.as_ref()
    }

    /// The row at `index` as a record, skipping empty cells.
    pub fn row(&self, index: usize) -> Option<MaterialRecord> {
        let row = self.rows.get(index)?;
        let mut record = MaterialRecord::new();
        for (column, cell) in self.columns.iter().zip(row) {
            if let Some(value) = cell {
                record.insert(column, value.clone());
            }
        }
        Some(record)
    }
}
