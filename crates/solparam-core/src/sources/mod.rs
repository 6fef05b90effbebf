//! Parameter sources and how they are found.

pub mod discovery;
pub mod registry;
pub mod simple;

pub use discovery::{
    DiscoveryError, EMBEDDED_SOURCES, SourceIndex, SourceLocations, TIER_WIDTH, app_dir,
    populate_sources,
};
pub use registry::{SourceRegistry, SourceSummary};
pub use simple::SimpleSource;

use crate::domain::{Composition, NkData, ParamError, ParamResult};
use crate::units::{Inputs, Parameter};
use std::fmt::Debug;

/// A named, prioritized provider of material parameters.
///
/// Lower `priority` values are searched first by the manager. Implementations
/// must report a miss with a `ParameterMissing` error so the manager can fall
/// through to the next source; any other error aborts the search.
pub trait ParameterSource: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn priority(&self) -> u32;

    fn reference(&self) -> &str {
        ""
    }

    /// Material names in stored order.
    fn materials(&self) -> Vec<String>;

    /// Parameter keys stored for `material`; empty when it is unknown.
    fn parameters(&self, material: &str) -> Vec<String>;

    fn description(&self, _parameter: &str) -> Option<&str> {
        None
    }

    fn get_parameter(
        &self,
        material: &str,
        parameter: &str,
        comp: &Composition,
        inputs: &Inputs,
    ) -> ParamResult<Parameter>;

    fn get_nk(&self, material: &str, _comp: &Composition, _inputs: &Inputs) -> ParamResult<NkData> {
        Err(ParamError::parameter_missing(
            "PARAM.MISSING_NK",
            format!(
                "nk data not available for '{material}' in source '{}'.",
                self.name()
            ),
        ))
    }
}
