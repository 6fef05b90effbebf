//! Dimensioned values: units, quantities, formulas and parameters.

pub mod dimension;
pub mod formula;
pub mod parameter;
pub mod quantity;

pub use dimension::{Dimension, Unit, UnitError};
pub use formula::{Formula, FormulaError};
pub use parameter::{Inputs, Parameter, RawEntry};
pub use quantity::Quantity;
