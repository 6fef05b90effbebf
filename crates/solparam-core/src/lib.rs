//! Materials-parameter resolution for photovoltaic device simulation.
//!
//! A [`Material`] asks the [`ParameterManager`] for a parameter; the manager
//! walks its registered [`ParameterSource`]s by priority and the first source
//! that knows the material answers, interpolating alloys from their parent
//! compounds when needed.

pub mod domain;
pub mod field;
pub mod manager;
pub mod material;
pub mod sources;
pub mod units;

pub use domain::{Composition, NkData, ParamError, ParamErrorCategory, ParamResult};
pub use field::{FieldValue, MaterialRecord, MaterialTable};
pub use manager::ParameterManager;
pub use material::{FactoryRequest, Material};
pub use sources::{ParameterSource, SimpleSource, SourceLocations};
pub use units::{Inputs, Parameter, Quantity, RawEntry, Unit};
