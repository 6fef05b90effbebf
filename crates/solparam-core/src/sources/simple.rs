//! JSON-backed parameter source.
//!
//! A source document has a `reference` string, a `descriptions` object and
//! one object per material. Material entries map parameter keys to raw
//! entries; an entry carrying an `x` marker is an alloy resolved from its
//! `parent0`, `parent1`, ... materials, and an optional `nk` object holds
//! `wavelength`, `n` and `k` columns.

use super::ParameterSource;
use crate::domain::{
    ALLOY_X_KEY, ALLOY_Y_KEY, Composition, NK_KEY, NkData, ParamError, ParamResult, parent_key,
};
use crate::units::{Inputs, Parameter, Quantity, RawEntry, Unit};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Deepest alloy-in-alloy nesting accepted before decomposition is
/// reported as circular.
pub const MAX_ALLOY_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
struct SourceDocument {
    #[serde(default)]
    reference: String,
    #[serde(default)]
    descriptions: BTreeMap<String, String>,
    #[serde(flatten)]
    materials: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct NkEntry {
    wavelength: Vec<f64>,
    n: Vec<f64>,
    k: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SimpleSource {
    name: String,
    priority: u32,
    reference: String,
    descriptions: BTreeMap<String, String>,
    data: Map<String, Value>,
}

impl SimpleSource {
    /// Reads and parses the source file at `path`.
    pub fn load(name: &str, path: &Path, priority: u32) -> ParamResult<Self> {
        let text = fs::read_to_string(path).map_err(|source| {
            ParamError::io_system(
                "IO.SOURCE_READ",
                format!(
                    "failed to read source '{}' from '{}': {}",
                    name,
                    path.display(),
                    source
                ),
            )
        })?;
        let source = Self::from_json_str(name, priority, &text)?;
        debug!(
            source = name,
            path = %path.display(),
            priority,
            materials = source.data.len(),
            "loaded parameter source"
        );
        Ok(source)
    }

    pub fn from_json_str(name: &str, priority: u32, text: &str) -> ParamResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(|error| {
            ParamError::invalid_input(
                "SOURCE.PARSE",
                format!("source '{name}' is not valid JSON: {error}"),
            )
        })?;
        Self::from_value(name, priority, value)
    }

    pub fn from_value(name: &str, priority: u32, value: Value) -> ParamResult<Self> {
        let document: SourceDocument = serde_json::from_value(value).map_err(|error| {
            ParamError::invalid_input(
                "SOURCE.SCHEMA",
                format!("source '{name}' does not match the source layout: {error}"),
            )
        })?;

        let mut data = Map::new();
        for (key, entry) in document.materials {
            if entry.is_object() {
                data.insert(key, entry);
            } else {
                debug!(source = name, key = %key, "skipping top-level entry that is not a material");
            }
        }

        Ok(Self {
            name: name.to_string(),
            priority,
            reference: document.reference,
            descriptions: document.descriptions,
            data,
        })
    }

    pub fn descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    /// Normalizes a raw entry and stamps this source's provenance on it.
    pub fn to_param(&self, raw: &RawEntry, parameter: &str, inputs: &Inputs) -> ParamResult<Parameter> {
        let param = raw.to_param(inputs)?;
        Ok(param.with_provenance(&self.name, self.description(parameter)))
    }

    /// Resolves `parameter` for an alloy entry by interpolating its parents.
    pub fn get_parameter_alloy(
        &self,
        material: &str,
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<Parameter> {
        let entry = self.entry(material)?;
        let raw = self.raw_entry(material, entry, parameter)?;
        let inputs = formula_inputs(comp, inputs);
        let mut chain = Vec::new();
        self.resolve_alloy(material, entry, raw, parameter, comp, &inputs, &mut chain)
    }

    fn entry(&self, material: &str) -> ParamResult<&Map<String, Value>> {
        self.data
            .get(material)
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ParamError::parameter_missing(
                    "PARAM.MISSING_MATERIAL",
                    format!("Material '{material}' not available in source '{}'.", self.name),
                )
            })
    }

    fn raw_entry<'a>(
        &self,
        material: &str,
        entry: &'a Map<String, Value>,
        parameter: &str,
    ) -> ParamResult<&'a Value> {
        entry.get(parameter).ok_or_else(|| {
            ParamError::parameter_missing(
                "PARAM.MISSING_PARAMETER",
                format!(
                    "Parameter '{parameter}' not available for '{material}' in source '{}'.",
                    self.name
                ),
            )
        })
    }

    fn classify(&self, material: &str, parameter: &str, raw: &Value) -> ParamResult<RawEntry> {
        RawEntry::from_json(raw).map_err(|error| {
            ParamError::invalid_input(
                error.code(),
                format!(
                    "{} ('{parameter}' for '{material}' in source '{}')",
                    error.message(),
                    self.name
                ),
            )
        })
    }

    fn marker<'a>(&self, material: &str, entry: &'a Map<String, Value>, key: &str) -> ParamResult<&'a str> {
        match entry.get(key) {
            Some(Value::String(element)) => Ok(element.as_str()),
            Some(_) => Err(ParamError::invalid_input(
                "SOURCE.ALLOY_MARKER",
                format!(
                    "alloy marker '{key}' of '{material}' in source '{}' must name an element",
                    self.name
                ),
            )),
            None => Err(ParamError::invalid_input(
                "SOURCE.ALLOY_MARKER",
                format!(
                    "alloy '{material}' in source '{}' needs a '{key}' marker",
                    self.name
                ),
            )),
        }
    }

    fn parents(&self, material: &str, entry: &Map<String, Value>) -> ParamResult<Vec<String>> {
        let mut parents = Vec::new();
        while let Some(value) = entry.get(&parent_key(parents.len())) {
            let Some(parent) = value.as_str() else {
                return Err(ParamError::invalid_input(
                    "SOURCE.ALLOY_MARKER",
                    format!(
                        "'{}' of '{material}' in source '{}' must name a material",
                        parent_key(parents.len()),
                        self.name
                    ),
                ));
            };
            parents.push(parent.to_string());
        }
        if parents.is_empty() {
            return Err(ParamError::parameter_missing(
                "PARAM.MISSING_PARENT",
                format!(
                    "Alloy '{material}' in source '{}' has no '{}' entry.",
                    self.name,
                    parent_key(0)
                ),
            ));
        }
        Ok(parents)
    }

    fn resolve(
        &self,
        material: &str,
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
        chain: &mut Vec<String>,
    ) -> ParamResult<Parameter> {
        let entry = self.entry(material)?;
        let raw = self.raw_entry(material, entry, parameter)?;
        if entry.contains_key(ALLOY_X_KEY) {
            return self.resolve_alloy(material, entry, raw, parameter, comp, inputs, chain);
        }
        let raw = self.classify(material, parameter, raw)?;
        self.to_param(&raw, parameter, inputs)
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_alloy(
        &self,
        material: &str,
        entry: &Map<String, Value>,
        raw: &Value,
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
        chain: &mut Vec<String>,
    ) -> ParamResult<Parameter> {
        let x_element = self.marker(material, entry, ALLOY_X_KEY)?;
        let parents = self.parents(material, entry)?;

        chain.push(material.to_string());
        let resolved = self.resolve_parents(&parents, parameter, comp, inputs, chain);
        chain.pop();
        let parent_values = resolved?;

        let x = comp
            .get(x_element)
            .ok_or_else(|| ParamError::input_argument_missing(x_element))?;
        let bowing = self.to_param(&self.classify(material, parameter, raw)?, parameter, inputs)?;

        let combined = match parent_values.len() {
            2 => interpolate(&parent_values, &[1.0 - x, x], &bowing, x * (1.0 - x))?,
            3 => {
                let y_element = self.marker(material, entry, ALLOY_Y_KEY)?;
                let y = comp
                    .get(y_element)
                    .ok_or_else(|| ParamError::input_argument_missing(y_element))?;
                let z = 1.0 - x - y;
                interpolate(&parent_values, &[z, x, y], &bowing, x * y + x * z + y * z)?
            }
            count => {
                return Err(ParamError::invalid_input(
                    "ALLOY.UNSUPPORTED",
                    format!(
                        "alloy '{material}' in source '{}' has {count} parents; only 2 or 3 are supported",
                        self.name
                    ),
                ));
            }
        };

        debug!(
            source = %self.name,
            material,
            parameter,
            parents = ?parents,
            "interpolated alloy parameter"
        );
        self.to_param(&RawEntry::Built(combined), parameter, inputs)
    }

    fn resolve_parents(
        &self,
        parents: &[String],
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
        chain: &mut Vec<String>,
    ) -> ParamResult<Vec<Parameter>> {
        let mut values = Vec::with_capacity(parents.len());
        for parent in parents {
            if chain.iter().any(|seen| seen == parent) || chain.len() > MAX_ALLOY_DEPTH {
                return Err(ParamError::invalid_input(
                    "ALLOY.CIRCULAR",
                    format!(
                        "circular alloy decomposition in source '{}': {} -> {}",
                        self.name,
                        chain.join(" -> "),
                        parent
                    ),
                ));
            }
            values.push(self.resolve(parent, parameter, comp, inputs, chain)?);
        }
        Ok(values)
    }
}

impl ParameterSource for SimpleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn reference(&self) -> &str {
        &self.reference
    }

    fn materials(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn parameters(&self, material: &str) -> Vec<String> {
        self.data
            .get(material)
            .and_then(Value::as_object)
            .map(|entry| entry.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn description(&self, parameter: &str) -> Option<&str> {
        self.descriptions.get(parameter).map(String::as_str)
    }

    fn get_parameter(
        &self,
        material: &str,
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<Parameter> {
        let inputs = formula_inputs(comp, inputs);
        let mut chain = Vec::new();
        self.resolve(material, parameter, comp, &inputs, &mut chain)
    }

    fn get_nk(&self, material: &str, _comp: &Composition, _inputs: &Inputs) -> ParamResult<NkData> {
        let entry = self.entry(material)?;
        let Some(raw) = entry.get(NK_KEY) else {
            return Err(ParamError::parameter_missing(
                "PARAM.MISSING_NK",
                format!("nk data not available for '{material}' in source '{}'.", self.name),
            ));
        };
        let columns: NkEntry = serde_json::from_value(raw.clone()).map_err(|error| {
            ParamError::invalid_input(
                "SOURCE.NK_ENTRY",
                format!(
                    "nk entry of '{material}' in source '{}' is malformed: {error}",
                    self.name
                ),
            )
        })?;
        NkData::from_columns(columns.wavelength, &columns.n, &columns.k)
    }
}

/// Caller inputs extended with composition bindings: the positional
/// placeholders `x`, `y`, `z` and each element symbol. Caller inputs win.
pub fn formula_inputs(comp: &Composition, inputs: &Inputs) -> Inputs {
    let mut merged = inputs.clone();
    for (placeholder, fraction) in comp.placeholders() {
        merged
            .entry(placeholder.to_string())
            .or_insert_with(|| Parameter::dimensionless(fraction));
    }
    for (element, fraction) in comp.iter() {
        merged
            .entry(element.to_string())
            .or_insert_with(|| Parameter::dimensionless(fraction));
    }
    merged
}

/// Weighted sum of `parents` minus `bowing_weight * bowing`, in the unit of
/// the first parent. A bowing value without a unit is read in that unit.
fn interpolate(
    parents: &[Parameter],
    weights: &[f64],
    bowing: &Parameter,
    bowing_weight: f64,
) -> ParamResult<Parameter> {
    let unit: Unit = parents[0].unit().clone();
    let mut value = 0.0;
    for (parent, weight) in parents.iter().zip(weights) {
        value += parent.quantity().to(&unit)?.magnitude() * weight;
    }

    let bowing_unit = bowing.unit();
    let bowing = if bowing_unit.is_dimensionless() && bowing_unit.scale() == 1.0 {
        bowing.magnitude()
    } else {
        bowing.quantity().to(&unit)?.magnitude()
    };
    value -= bowing * bowing_weight;

    Ok(Parameter::from_quantity(Quantity::new(value, unit)))
}
