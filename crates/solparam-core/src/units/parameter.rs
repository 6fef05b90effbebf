use super::formula::{Formula, FormulaError};
use super::{Quantity, Unit, UnitError};
use crate::domain::{ParamError, ParamResult};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Named values available to formulas: caller inputs, cached material
/// parameters and composition placeholders.
pub type Inputs = BTreeMap<String, Parameter>;

/// A [`Quantity`] with provenance.
///
/// Equality ignores provenance: two parameters are equal when their
/// quantities are equal after unit normalization.
#[derive(Debug, Clone)]
pub struct Parameter {
    quantity: Quantity,
    source: Option<String>,
    description: Option<String>,
}

impl Parameter {
    pub fn new(magnitude: f64, unit: &str) -> ParamResult<Self> {
        Ok(Self::from_quantity(Quantity::with_unit(magnitude, unit)?))
    }

    pub fn dimensionless(magnitude: f64) -> Self {
        Self::from_quantity(Quantity::dimensionless(magnitude))
    }

    pub fn from_quantity(quantity: Quantity) -> Self {
        Self {
            quantity,
            source: None,
            description: None,
        }
    }

    /// Parses `"<number> <unit>"` or a constant formula such as `"2*21 eV"`.
    pub fn parse(text: &str) -> ParamResult<Self> {
        Self::evaluate(text, &Inputs::new())
    }

    /// Evaluates a formula string, substituting `inputs` for its free
    /// variables, and attaches the trailing unit.
    pub fn evaluate(text: &str, inputs: &Inputs) -> ParamResult<Self> {
        let formula = Formula::parse(text)?;
        let magnitude = formula.evaluate(|name| inputs.get(name).map(Parameter::magnitude))?;
        let unit = Unit::parse(formula.unit_text())?;
        Ok(Self::from_quantity(Quantity::new(magnitude, unit)))
    }

    pub fn with_provenance(mut self, source: &str, description: Option<&str>) -> Self {
        self.source = Some(source.to_string());
        self.description = description.map(str::to_string);
        self
    }

    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    pub fn magnitude(&self) -> f64 {
        self.quantity.magnitude()
    }

    pub fn unit(&self) -> &Unit {
        self.quantity.unit()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn to(&self, unit: &str) -> ParamResult<Self> {
        let quantity = self.quantity.to_unit(unit)?;
        Ok(Self {
            quantity,
            source: self.source.clone(),
            description: self.description.clone(),
        })
    }

    pub fn try_add(&self, rhs: &Parameter) -> ParamResult<Self> {
        Ok(Self::from_quantity(self.quantity.try_add(&rhs.quantity)?))
    }

    pub fn try_sub(&self, rhs: &Parameter) -> ParamResult<Self> {
        Ok(Self::from_quantity(self.quantity.try_sub(&rhs.quantity)?))
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::from_quantity(self.quantity.scale(factor))
    }
}

impl From<Quantity> for Parameter {
    fn from(quantity: Quantity) -> Self {
        Self::from_quantity(quantity)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.quantity == other.quantity
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.quantity.fmt(f)
    }
}

impl FromStr for Parameter {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Parameter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Parameter", 4)?;
        state.serialize_field("magnitude", &self.magnitude())?;
        state.serialize_field("unit", self.unit().name())?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("description", &self.description)?;
        state.end()
    }
}

/// One stored parameter entry before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawEntry {
    Literal(f64),
    UnitString(String),
    Formula(String),
    Built(Parameter),
}

impl RawEntry {
    /// Classifies a string: `"<number> <unit>"` is a unit string, anything
    /// else is treated as a formula.
    pub fn from_text(text: &str) -> Self {
        if Quantity::parse(text).is_ok() {
            Self::UnitString(text.to_string())
        } else {
            Self::Formula(text.to_string())
        }
    }

    pub fn from_json(value: &Value) -> ParamResult<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(Self::Literal).ok_or_else(|| {
                ParamError::invalid_input(
                    "SOURCE.RAW_ENTRY",
                    format!("numeric entry {number} is not representable as f64"),
                )
            }),
            Value::String(text) => Ok(Self::from_text(text)),
            other => Err(ParamError::invalid_input(
                "SOURCE.RAW_ENTRY",
                format!("entry {other} is neither a number nor a string"),
            )),
        }
    }

    /// Normalizes the entry into a [`Parameter`] without provenance.
    pub fn to_param(&self, inputs: &Inputs) -> ParamResult<Parameter> {
        match self {
            Self::Literal(value) => Ok(Parameter::dimensionless(*value)),
            Self::UnitString(text) => Ok(Parameter::from_quantity(Quantity::parse(text)?)),
            Self::Formula(text) => Parameter::evaluate(text, inputs),
            Self::Built(parameter) => Ok(parameter.clone()),
        }
    }
}

impl From<Parameter> for RawEntry {
    fn from(parameter: Parameter) -> Self {
        Self::Built(parameter)
    }
}

impl From<f64> for RawEntry {
    fn from(value: f64) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for RawEntry {
    fn from(text: &str) -> Self {
        Self::from_text(text)
    }
}

impl From<UnitError> for ParamError {
    fn from(error: UnitError) -> Self {
        let code = match error {
            UnitError::UnknownUnit(_) => "UNIT.UNKNOWN",
            UnitError::Malformed { .. } => "UNIT.MALFORMED",
            UnitError::DimensionMismatch { .. } => "UNIT.DIMENSION_MISMATCH",
            UnitError::MalformedQuantity(_) => "UNIT.MALFORMED_QUANTITY",
        };
        ParamError::invalid_input(code, error.to_string())
    }
}

impl From<FormulaError> for ParamError {
    fn from(error: FormulaError) -> Self {
        match error {
            FormulaError::UnboundVariable(name) => ParamError::input_argument_missing(&name),
            FormulaError::Malformed { .. } => {
                ParamError::invalid_input("FORMULA.MALFORMED", error.to_string())
            }
            FormulaError::NonFinite(_) => {
                ParamError::invalid_input("FORMULA.NON_FINITE", error.to_string())
            }
        }
    }
}
