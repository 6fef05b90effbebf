pub mod composition;
pub mod errors;
pub mod nk;

pub use composition::{COMPOSITION_PLACEHOLDERS, Composition};
pub use errors::{ParamError, ParamErrorCategory, ParamResult};
pub use nk::{NkData, WAVELENGTH};

/// Key under which nk data is requested in `include` lists and stored in
/// material records.
pub const NK_KEY: &str = "nk";

/// Alloy marker naming the element whose fraction drives interpolation.
pub const ALLOY_X_KEY: &str = "x";

/// Alloy marker naming the second interpolation element (three-parent alloys).
pub const ALLOY_Y_KEY: &str = "y";

/// Prefix of the alloy endpoint markers `parent0`, `parent1`, ...
pub const PARENT_KEY_PREFIX: &str = "parent";

pub fn parent_key(index: usize) -> String {
    format!("{PARENT_KEY_PREFIX}{index}")
}
