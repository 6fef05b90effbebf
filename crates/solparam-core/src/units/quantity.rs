use super::dimension::{Unit, UnitError, approx_eq};
use std::fmt::{Display, Formatter};
use std::ops::{Div, Mul};
use std::str::FromStr;

/// A magnitude tagged with a [`Unit`].
///
/// Equality compares the SI-normalized magnitudes, so `1 eV == 1000 meV`.
#[derive(Debug, Clone)]
pub struct Quantity {
    magnitude: f64,
    unit: Unit,
}

impl Quantity {
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self { magnitude, unit }
    }

    pub fn dimensionless(magnitude: f64) -> Self {
        Self::new(magnitude, Unit::dimensionless())
    }

    pub fn with_unit(magnitude: f64, unit: &str) -> Result<Self, UnitError> {
        Ok(Self::new(magnitude, Unit::parse(unit)?))
    }

    /// Parses `"<number> <unit>"`; the unit part may be omitted.
    pub fn parse(text: &str) -> Result<Self, UnitError> {
        let trimmed = text.trim();
        let split = trimmed
            .find(char::is_whitespace)
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        let magnitude = number
            .parse::<f64>()
            .map_err(|_| UnitError::MalformedQuantity(text.to_string()))?;
        Ok(Self::new(magnitude, Unit::parse(unit)?))
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn is_dimensionless(&self) -> bool {
        self.unit.is_dimensionless()
    }

    /// Magnitude in the coherent SI unit of this dimension.
    pub fn si_magnitude(&self) -> f64 {
        self.magnitude * self.unit.scale()
    }

    pub fn to(&self, target: &Unit) -> Result<Quantity, UnitError> {
        let factor = self.unit.conversion_factor(target)?;
        Ok(Quantity::new(self.magnitude * factor, target.clone()))
    }

    pub fn to_unit(&self, target: &str) -> Result<Quantity, UnitError> {
        self.to(&Unit::parse(target)?)
    }

    pub fn scale(&self, factor: f64) -> Quantity {
        Quantity::new(self.magnitude * factor, self.unit.clone())
    }

    /// Sum expressed in `self`'s unit.
    pub fn try_add(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let rhs = rhs.to(&self.unit)?;
        Ok(Quantity::new(self.magnitude + rhs.magnitude, self.unit.clone()))
    }

    /// Difference expressed in `self`'s unit.
    pub fn try_sub(&self, rhs: &Quantity) -> Result<Quantity, UnitError> {
        let rhs = rhs.to(&self.unit)?;
        Ok(Quantity::new(self.magnitude - rhs.magnitude, self.unit.clone()))
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.unit.dimension() == other.unit.dimension()
            && approx_eq(self.si_magnitude(), other.si_magnitude())
    }
}

impl Mul for &Quantity {
    type Output = Quantity;

    fn mul(self, rhs: Self) -> Self::Output {
        Quantity::new(self.magnitude * rhs.magnitude, &self.unit * &rhs.unit)
    }
}

impl Div for &Quantity {
    type Output = Quantity;

    fn div(self, rhs: Self) -> Self::Output {
        Quantity::new(self.magnitude / rhs.magnitude, &self.unit / &rhs.unit)
    }
}

impl Mul<f64> for &Quantity {
    type Output = Quantity;

    fn mul(self, rhs: f64) -> Self::Output {
        self.scale(rhs)
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.unit.is_dimensionless() && self.unit.scale() == 1.0 {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.unit)
        }
    }
}

impl FromStr for Quantity {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::Quantity;
    use crate::units::{Dimension, UnitError};

    #[test]
    fn parse_reads_magnitude_and_unit() {
        let gap = Quantity::parse("1.42 eV").expect("quantity should parse");
        assert_eq!(gap.magnitude(), 1.42);
        assert_eq!(gap.unit().name(), "electron_volt");

        let bare = Quantity::parse("3.5").expect("bare number should parse");
        assert!(bare.is_dimensionless());

        assert!(matches!(
            Quantity::parse("eV 42"),
            Err(UnitError::MalformedQuantity(_))
        ));
    }

    #[test]
    fn equality_normalizes_units() {
        let ev = Quantity::with_unit(1.0, "eV").expect("eV should parse");
        let mev = Quantity::with_unit(1000.0, "meV").expect("meV should parse");
        assert_eq!(ev, mev);

        let kelvin = Quantity::with_unit(1.0, "K").expect("K should parse");
        assert_ne!(ev, kelvin);
    }

    #[test]
    fn addition_converts_into_left_unit() {
        let ev = Quantity::with_unit(1.0, "eV").expect("eV should parse");
        let mev = Quantity::with_unit(500.0, "meV").expect("meV should parse");
        let sum = ev.try_add(&mev).expect("energies should add");
        assert!((sum.magnitude() - 1.5).abs() < 1.0e-12);
        assert_eq!(sum.unit().name(), "electron_volt");

        let kelvin = Quantity::with_unit(300.0, "K").expect("K should parse");
        assert!(matches!(
            ev.try_sub(&kelvin),
            Err(UnitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn products_compose_dimensions() {
        let energy = Quantity::with_unit(2.0, "eV").expect("eV should parse");
        let temperature = Quantity::with_unit(4.0, "K").expect("K should parse");
        let ratio = &energy / &temperature;
        assert_eq!(ratio.magnitude(), 0.5);
        assert_eq!(
            ratio.unit().dimension(),
            Dimension::ENERGY / Dimension::TEMPERATURE
        );
        assert_eq!(ratio.unit().name(), "electron_volt / kelvin");

        let doubled = &energy * 2.0;
        assert_eq!(doubled.magnitude(), 4.0);
    }
}
