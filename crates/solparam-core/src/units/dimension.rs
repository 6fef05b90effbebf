//! Physical dimensions and the unit registry.
//!
//! A [`Unit`] is a dimension vector over the SI base dimensions, a scale
//! factor to the coherent SI unit of that dimension and a display name. Unit
//! strings from parameter files (`eV`, `cm^-3`, `cm^2/(V*s)`, ...) are parsed
//! against a fixed table of named units.

use std::fmt::{Display, Formatter};
use std::ops::{Div, Mul};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
    #[error("malformed unit expression '{text}': {reason}")]
    Malformed { text: String, reason: String },
    #[error("cannot convert between '{left}' and '{right}': dimensions differ")]
    DimensionMismatch { left: String, right: String },
    #[error("malformed quantity '{0}'; expected '<number> <unit>'")]
    MalformedQuantity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimension {
    pub length: i8,
    pub mass: i8,
    pub time: i8,
    pub current: i8,
    pub temperature: i8,
    pub amount: i8,
}

impl Dimension {
    pub const DIMENSIONLESS: Self = Self::new(0, 0, 0, 0, 0, 0);
    pub const LENGTH: Self = Self::new(1, 0, 0, 0, 0, 0);
    pub const MASS: Self = Self::new(0, 1, 0, 0, 0, 0);
    pub const TIME: Self = Self::new(0, 0, 1, 0, 0, 0);
    pub const CURRENT: Self = Self::new(0, 0, 0, 1, 0, 0);
    pub const TEMPERATURE: Self = Self::new(0, 0, 0, 0, 1, 0);
    pub const AMOUNT: Self = Self::new(0, 0, 0, 0, 0, 1);
    pub const ENERGY: Self = Self::new(2, 1, -2, 0, 0, 0);

    pub const fn new(length: i8, mass: i8, time: i8, current: i8, temperature: i8, amount: i8) -> Self {
        Self {
            length,
            mass,
            time,
            current,
            temperature,
            amount,
        }
    }

    pub fn powi(self, exponent: i8) -> Self {
        Self {
            length: self.length * exponent,
            mass: self.mass * exponent,
            time: self.time * exponent,
            current: self.current * exponent,
            temperature: self.temperature * exponent,
            amount: self.amount * exponent,
        }
    }

    pub fn is_dimensionless(self) -> bool {
        self == Self::DIMENSIONLESS
    }
}

impl Mul for Dimension {
    type Output = Dimension;

    fn mul(self, rhs: Self) -> Self::Output {
        Dimension {
            length: self.length + rhs.length,
            mass: self.mass + rhs.mass,
            time: self.time + rhs.time,
            current: self.current + rhs.current,
            temperature: self.temperature + rhs.temperature,
            amount: self.amount + rhs.amount,
        }
    }
}

impl Div for Dimension {
    type Output = Dimension;

    fn div(self, rhs: Self) -> Self::Output {
        Dimension {
            length: self.length - rhs.length,
            mass: self.mass - rhs.mass,
            time: self.time - rhs.time,
            current: self.current - rhs.current,
            temperature: self.temperature - rhs.temperature,
            amount: self.amount - rhs.amount,
        }
    }
}

struct UnitDef {
    aliases: &'static [&'static str],
    canonical: &'static str,
    dimension: Dimension,
    scale: f64,
}

const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
const VOLT: Dimension = Dimension::new(2, 1, -3, -1, 0, 0);
const POWER: Dimension = Dimension::new(2, 1, -3, 0, 0, 0);

const UNIT_TABLE: &[UnitDef] = &[
    UnitDef {
        aliases: &["dimensionless"],
        canonical: "dimensionless",
        dimension: Dimension::DIMENSIONLESS,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["percent", "%"],
        canonical: "percent",
        dimension: Dimension::DIMENSIONLESS,
        scale: 1.0e-2,
    },
    UnitDef {
        aliases: &["m", "meter", "metre"],
        canonical: "meter",
        dimension: Dimension::LENGTH,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["cm", "centimeter", "centimetre"],
        canonical: "centimeter",
        dimension: Dimension::LENGTH,
        scale: 1.0e-2,
    },
    UnitDef {
        aliases: &["mm", "millimeter", "millimetre"],
        canonical: "millimeter",
        dimension: Dimension::LENGTH,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["um", "µm", "micrometer", "micron"],
        canonical: "micrometer",
        dimension: Dimension::LENGTH,
        scale: 1.0e-6,
    },
    UnitDef {
        aliases: &["nm", "nanometer", "nanometre"],
        canonical: "nanometer",
        dimension: Dimension::LENGTH,
        scale: 1.0e-9,
    },
    UnitDef {
        aliases: &["angstrom", "Å", "Angstrom"],
        canonical: "angstrom",
        dimension: Dimension::LENGTH,
        scale: 1.0e-10,
    },
    UnitDef {
        aliases: &["kg", "kilogram"],
        canonical: "kilogram",
        dimension: Dimension::MASS,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["g", "gram"],
        canonical: "gram",
        dimension: Dimension::MASS,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["m_e", "electron_mass"],
        canonical: "electron_mass",
        dimension: Dimension::MASS,
        scale: 9.109_383_701_5e-31,
    },
    UnitDef {
        aliases: &["s", "second"],
        canonical: "second",
        dimension: Dimension::TIME,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["ms", "millisecond"],
        canonical: "millisecond",
        dimension: Dimension::TIME,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["us", "µs", "microsecond"],
        canonical: "microsecond",
        dimension: Dimension::TIME,
        scale: 1.0e-6,
    },
    UnitDef {
        aliases: &["ns", "nanosecond"],
        canonical: "nanosecond",
        dimension: Dimension::TIME,
        scale: 1.0e-9,
    },
    UnitDef {
        aliases: &["ps", "picosecond"],
        canonical: "picosecond",
        dimension: Dimension::TIME,
        scale: 1.0e-12,
    },
    UnitDef {
        aliases: &["fs", "femtosecond"],
        canonical: "femtosecond",
        dimension: Dimension::TIME,
        scale: 1.0e-15,
    },
    UnitDef {
        aliases: &["Hz", "hertz"],
        canonical: "hertz",
        dimension: Dimension::new(0, 0, -1, 0, 0, 0),
        scale: 1.0,
    },
    UnitDef {
        aliases: &["A", "ampere"],
        canonical: "ampere",
        dimension: Dimension::CURRENT,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["mA", "milliampere"],
        canonical: "milliampere",
        dimension: Dimension::CURRENT,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["C", "coulomb"],
        canonical: "coulomb",
        dimension: Dimension::new(0, 0, 1, 1, 0, 0),
        scale: 1.0,
    },
    UnitDef {
        aliases: &["V", "volt"],
        canonical: "volt",
        dimension: VOLT,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["mV", "millivolt"],
        canonical: "millivolt",
        dimension: VOLT,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["W", "watt"],
        canonical: "watt",
        dimension: POWER,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["mW", "milliwatt"],
        canonical: "milliwatt",
        dimension: POWER,
        scale: 1.0e-3,
    },
    UnitDef {
        aliases: &["ohm", "Ω"],
        canonical: "ohm",
        dimension: Dimension::new(2, 1, -3, -2, 0, 0),
        scale: 1.0,
    },
    UnitDef {
        aliases: &["J", "joule"],
        canonical: "joule",
        dimension: Dimension::ENERGY,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["eV", "electron_volt"],
        canonical: "electron_volt",
        dimension: Dimension::ENERGY,
        scale: ELEMENTARY_CHARGE,
    },
    UnitDef {
        aliases: &["meV", "millielectron_volt"],
        canonical: "millielectron_volt",
        dimension: Dimension::ENERGY,
        scale: ELEMENTARY_CHARGE * 1.0e-3,
    },
    UnitDef {
        aliases: &["K", "kelvin"],
        canonical: "kelvin",
        dimension: Dimension::TEMPERATURE,
        scale: 1.0,
    },
    UnitDef {
        aliases: &["mol", "mole"],
        canonical: "mole",
        dimension: Dimension::AMOUNT,
        scale: 1.0,
    },
];

fn lookup_unit(symbol: &str) -> Option<&'static UnitDef> {
    UNIT_TABLE
        .iter()
        .find(|definition| definition.aliases.contains(&symbol) || definition.canonical == symbol)
}

/// A physical unit: dimension, scale to SI and display name.
#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    dimension: Dimension,
    scale: f64,
}

impl Unit {
    pub fn dimensionless() -> Self {
        Self {
            name: "dimensionless".to_string(),
            dimension: Dimension::DIMENSIONLESS,
            scale: 1.0,
        }
    }

    pub fn parse(text: &str) -> Result<Self, UnitError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Self::dimensionless());
        }
        let tokens = tokenize_unit(trimmed)?;
        let mut parser = UnitParser {
            text: trimmed,
            tokens,
            position: 0,
        };
        let unit = parser.parse_product()?;
        if parser.position != parser.tokens.len() {
            return Err(parser.malformed("unexpected trailing input"));
        }
        Ok(unit)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn is_dimensionless(&self) -> bool {
        self.dimension.is_dimensionless()
    }

    /// Factor `f` such that `value [self] == value * f [target]`.
    pub fn conversion_factor(&self, target: &Unit) -> Result<f64, UnitError> {
        if self.dimension != target.dimension {
            return Err(UnitError::DimensionMismatch {
                left: self.name.clone(),
                right: target.name.clone(),
            });
        }
        Ok(self.scale / target.scale)
    }

    pub fn powi(&self, exponent: i8) -> Unit {
        if exponent == 1 {
            return self.clone();
        }
        Unit {
            name: format!("{} ** {}", wrap_compound(&self.name), exponent),
            dimension: self.dimension.powi(exponent),
            scale: self.scale.powi(i32::from(exponent)),
        }
    }

    fn is_plain_one(&self) -> bool {
        self.name.is_empty()
    }

    fn plain_one() -> Self {
        Self {
            name: String::new(),
            dimension: Dimension::DIMENSIONLESS,
            scale: 1.0,
        }
    }
}

fn wrap_compound(name: &str) -> String {
    if name.contains(' ') {
        format!("({name})")
    } else {
        name.to_string()
    }
}

fn is_neutral(unit: &Unit) -> bool {
    unit.is_plain_one() || (unit.name == "dimensionless" && unit.scale == 1.0)
}

impl Mul for &Unit {
    type Output = Unit;

    fn mul(self, rhs: Self) -> Self::Output {
        if is_neutral(self) {
            return rhs.clone();
        }
        if is_neutral(rhs) {
            return self.clone();
        }
        Unit {
            name: format!("{} * {}", self.name, rhs.name),
            dimension: self.dimension * rhs.dimension,
            scale: self.scale * rhs.scale,
        }
    }
}

impl Div for &Unit {
    type Output = Unit;

    fn div(self, rhs: Self) -> Self::Output {
        if is_neutral(rhs) {
            return self.clone();
        }
        let numerator = if is_neutral(self) { "1" } else { self.name.as_str() };
        Unit {
            name: format!("{} / {}", numerator, wrap_compound(&rhs.name)),
            dimension: self.dimension / rhs.dimension,
            scale: self.scale / rhs.scale,
        }
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.dimension == other.dimension && approx_eq(self.scale, other.scale)
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

pub(crate) fn approx_eq(left: f64, right: f64) -> bool {
    if left == right {
        return true;
    }
    let scale = left.abs().max(right.abs());
    (left - right).abs() <= scale * 1.0e-12
}

#[derive(Debug, Clone, PartialEq)]
enum UnitToken {
    Symbol(String),
    Integer(i32),
    Times,
    Divide,
    Power,
    Minus,
    Open,
    Close,
}

fn tokenize_unit(text: &str) -> Result<Vec<UnitToken>, UnitError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        match ch {
            c if c.is_whitespace() => index += 1,
            '*' if chars.get(index + 1) == Some(&'*') => {
                tokens.push(UnitToken::Power);
                index += 2;
            }
            '*' | '·' => {
                tokens.push(UnitToken::Times);
                index += 1;
            }
            '^' => {
                tokens.push(UnitToken::Power);
                index += 1;
            }
            '/' => {
                tokens.push(UnitToken::Divide);
                index += 1;
            }
            '-' => {
                tokens.push(UnitToken::Minus);
                index += 1;
            }
            '(' => {
                tokens.push(UnitToken::Open);
                index += 1;
            }
            ')' => {
                tokens.push(UnitToken::Close);
                index += 1;
            }
            c if c.is_ascii_digit() => {
                let start = index;
                while index < chars.len() && chars[index].is_ascii_digit() {
                    index += 1;
                }
                let digits: String = chars[start..index].iter().collect();
                let value = digits.parse::<i32>().map_err(|_| UnitError::Malformed {
                    text: text.to_string(),
                    reason: format!("integer '{digits}' is out of range"),
                })?;
                tokens.push(UnitToken::Integer(value));
            }
            c if is_symbol_char(c) => {
                let start = index;
                while index < chars.len() && is_symbol_char(chars[index]) {
                    index += 1;
                }
                tokens.push(UnitToken::Symbol(chars[start..index].iter().collect()));
            }
            other => {
                return Err(UnitError::Malformed {
                    text: text.to_string(),
                    reason: format!("unexpected character '{other}'"),
                });
            }
        }
    }
    Ok(tokens)
}

fn is_symbol_char(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '%' || ch == 'µ' || ch == 'Ω' || ch == 'Å'
}

struct UnitParser<'a> {
    text: &'a str,
    tokens: Vec<UnitToken>,
    position: usize,
}

impl UnitParser<'_> {
    fn malformed(&self, reason: &str) -> UnitError {
        UnitError::Malformed {
            text: self.text.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&UnitToken> {
        self.tokens.get(self.position)
    }

    fn parse_product(&mut self) -> Result<Unit, UnitError> {
        let mut unit = self.parse_power()?;
        loop {
            match self.peek() {
                Some(UnitToken::Times) => {
                    self.position += 1;
                    let rhs = self.parse_power()?;
                    unit = &unit * &rhs;
                }
                Some(UnitToken::Divide) => {
                    self.position += 1;
                    let rhs = self.parse_power()?;
                    unit = &unit / &rhs;
                }
                Some(UnitToken::Symbol(_)) | Some(UnitToken::Open) => {
                    let rhs = self.parse_power()?;
                    unit = &unit * &rhs;
                }
                _ => return Ok(unit),
            }
        }
    }

    fn parse_power(&mut self) -> Result<Unit, UnitError> {
        let base = self.parse_atom()?;
        if self.peek() != Some(&UnitToken::Power) {
            return Ok(base);
        }
        self.position += 1;
        let exponent = self.parse_exponent()?;
        Ok(base.powi(exponent))
    }

    fn parse_exponent(&mut self) -> Result<i8, UnitError> {
        let parenthesized = self.peek() == Some(&UnitToken::Open);
        if parenthesized {
            self.position += 1;
        }
        let negative = self.peek() == Some(&UnitToken::Minus);
        if negative {
            self.position += 1;
        }
        let value = match self.peek() {
            Some(UnitToken::Integer(value)) => *value,
            _ => return Err(self.malformed("expected an integer exponent")),
        };
        self.position += 1;
        if parenthesized {
            if self.peek() != Some(&UnitToken::Close) {
                return Err(self.malformed("unclosed exponent parenthesis"));
            }
            self.position += 1;
        }
        let signed = if negative { -value } else { value };
        i8::try_from(signed).map_err(|_| self.malformed("exponent is out of range"))
    }

    fn parse_atom(&mut self) -> Result<Unit, UnitError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| self.malformed("unexpected end of unit"))?;
        self.position += 1;
        match token {
            UnitToken::Symbol(symbol) => {
                let definition = lookup_unit(&symbol).ok_or(UnitError::UnknownUnit(symbol))?;
                Ok(Unit {
                    name: definition.canonical.to_string(),
                    dimension: definition.dimension,
                    scale: definition.scale,
                })
            }
            UnitToken::Integer(1) => Ok(Unit::plain_one()),
            UnitToken::Open => {
                let inner = self.parse_product()?;
                if self.peek() != Some(&UnitToken::Close) {
                    return Err(self.malformed("unclosed parenthesis"));
                }
                self.position += 1;
                Ok(inner)
            }
            _ => Err(self.malformed("expected a unit symbol")),
        }
    }
}
