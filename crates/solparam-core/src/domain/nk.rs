//! Wavelength-indexed complex refractive index data.
//!
//! [`NkData`] is a small labelled array: named dimensions, named coordinate
//! vectors and a flat vector of complex values `n + ik`. The default value is
//! the empty dataset, which materials use to mean "not resolved yet".

use super::{ParamError, ParamResult};
use num_complex::Complex64;
use serde::Serialize;
use std::collections::BTreeMap;

pub const WAVELENGTH: &str = "wavelength";

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NkData {
    dims: Vec<String>,
    coords: BTreeMap<String, Vec<f64>>,
    #[serde(serialize_with = "serialize_complex")]
    values: Vec<Complex64>,
}

impl NkData {
    /// Arbitrary labelled data; use [`NkData::validate`] to check it is
    /// usable as refractive index data.
    pub fn new(dims: Vec<String>, coords: BTreeMap<String, Vec<f64>>, values: Vec<Complex64>) -> Self {
        Self {
            dims,
            coords,
            values,
        }
    }

    /// Unlabelled values with no dimensions or coordinates.
    pub fn unlabelled(values: Vec<Complex64>) -> Self {
        Self {
            dims: Vec::new(),
            coords: BTreeMap::new(),
            values,
        }
    }

    /// A valid dataset indexed by wavelength (nm).
    pub fn from_wavelength(wavelength: Vec<f64>, values: Vec<Complex64>) -> ParamResult<Self> {
        let mut coords = BTreeMap::new();
        coords.insert(WAVELENGTH.to_string(), wavelength);
        let data = Self::new(vec![WAVELENGTH.to_string()], coords, values);
        data.validate()?;
        Ok(data)
    }

    /// Builds from separate `n` and `k` columns.
    pub fn from_columns(wavelength: Vec<f64>, n: &[f64], k: &[f64]) -> ParamResult<Self> {
        if n.len() != k.len() {
            return Err(ParamError::invalid_input(
                "INPUT.NK_SHAPE",
                format!("n has {} values but k has {}", n.len(), k.len()),
            ));
        }
        let values = n
            .iter()
            .zip(k.iter())
            .map(|(real, imag)| Complex64::new(*real, *imag))
            .collect();
        Self::from_wavelength(wavelength, values)
    }

    pub fn is_empty(&self) -> bool {
        self.dims.is_empty() && self.values.is_empty()
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn coord(&self, name: &str) -> Option<&[f64]> {
        self.coords.get(name).map(Vec::as_slice)
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    pub fn wavelength(&self) -> Option<&[f64]> {
        self.coord(WAVELENGTH)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks that `wavelength` is both a dimension and a coordinate whose
    /// length matches the data.
    pub fn validate(&self) -> ParamResult<()> {
        let has_dim = self.dims.iter().any(|dim| dim == WAVELENGTH);
        let Some(wavelength) = self.coords.get(WAVELENGTH).filter(|_| has_dim) else {
            return Err(ParamError::invalid_input(
                "INPUT.NK_WAVELENGTH",
                "'wavelength' is not a DataArray dimension and coordinate",
            ));
        };
        if wavelength.len() != self.values.len() {
            return Err(ParamError::invalid_input(
                "INPUT.NK_SHAPE",
                format!(
                    "'wavelength' coordinate has {} entries but the data has {}",
                    wavelength.len(),
                    self.values.len()
                ),
            ));
        }
        Ok(())
    }
}

fn serialize_complex<S>(values: &[Complex64], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;

    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        seq.serialize_element(&[value.re, value.im])?;
    }
    seq.end()
}
