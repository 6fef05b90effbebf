//! Closed expression grammar for formula-valued parameter entries.
//!
//! ```text
//! formula := sum [unit]
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | power
//! power   := atom (("^" | "**") unary)?
//! atom    := number | identifier | "(" sum ")"
//! ```
//!
//! The longest prefix that forms an expression is the value; whatever
//! follows is kept verbatim as the unit text.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("malformed formula '{text}': {reason}")]
    Malformed { text: String, reason: String },
    #[error("variable '{0}' has no value")]
    UnboundVariable(String),
    #[error("formula '{0}' does not evaluate to a finite number")]
    NonFinite(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Self::Negate(inner) => inner.collect_variables(names),
            Self::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
        }
    }

    fn evaluate<F>(&self, lookup: &F) -> Result<f64, FormulaError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Variable(name) => {
                lookup(name).ok_or_else(|| FormulaError::UnboundVariable(name.clone()))
            }
            Self::Negate(inner) => Ok(-inner.evaluate(lookup)?),
            Self::Binary { op, lhs, rhs } => {
                let lhs = lhs.evaluate(lookup)?;
                let rhs = rhs.evaluate(lookup)?;
                Ok(match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                    BinaryOp::Pow => lhs.powf(rhs),
                })
            }
        }
    }
}

/// A parsed formula: expression plus trailing unit text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    expr: Expr,
    unit: String,
}

impl Formula {
    pub fn parse(text: &str) -> Result<Self, FormulaError> {
        let mut parser = FormulaParser { text, position: 0 };
        let expr = parser.parse_sum()?;
        let unit = text[parser.position..].trim().to_string();
        Ok(Self {
            source: text.trim().to_string(),
            expr,
            unit,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn unit_text(&self) -> &str {
        &self.unit
    }

    /// Free variables in order of first appearance.
    pub fn free_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.expr.collect_variables(&mut names);
        names
    }

    pub fn is_constant(&self) -> bool {
        self.free_variables().is_empty()
    }

    pub fn evaluate<F>(&self, lookup: F) -> Result<f64, FormulaError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let value = self.expr.evaluate(&lookup)?;
        if !value.is_finite() {
            return Err(FormulaError::NonFinite(self.source.clone()));
        }
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Open,
    Close,
    Other,
}

struct FormulaParser<'a> {
    text: &'a str,
    position: usize,
}

impl FormulaParser<'_> {
    fn malformed(&self, reason: impl Into<String>) -> FormulaError {
        FormulaError::Malformed {
            text: self.text.to_string(),
            reason: reason.into(),
        }
    }

    /// Lexes the next token without consuming it; returns it with its end offset.
    fn peek(&self) -> Option<(Token, usize)> {
        let rest = &self.text[self.position..];
        let offset = rest.len() - rest.trim_start().len();
        let start = self.position + offset;
        let rest = &self.text[start..];
        let mut chars = rest.chars();
        let first = chars.next()?;
        let single = |token| Some((token, start + first.len_utf8()));
        match first {
            '+' => single(Token::Plus),
            '-' => single(Token::Minus),
            '/' => single(Token::Slash),
            '^' => single(Token::Caret),
            '(' => single(Token::Open),
            ')' => single(Token::Close),
            '*' if rest.starts_with("**") => Some((Token::Caret, start + 2)),
            '*' => single(Token::Star),
            c if c.is_ascii_digit() || c == '.' => {
                let length = number_length(rest);
                if length == 0 {
                    return single(Token::Other);
                }
                let value = rest[..length].parse::<f64>().ok()?;
                Some((Token::Number(value), start + length))
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let length = rest
                    .char_indices()
                    .find(|(_, ch)| !(ch.is_ascii_alphanumeric() || *ch == '_'))
                    .map(|(index, _)| index)
                    .unwrap_or(rest.len());
                Some((Token::Ident(rest[..length].to_string()), start + length))
            }
            _ => single(Token::Other),
        }
    }

    fn advance(&mut self, end: usize) {
        self.position = end;
    }

    fn parse_sum(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some((Token::Plus, end)) => (BinaryOp::Add, end),
                Some((Token::Minus, end)) => (BinaryOp::Sub, end),
                _ => return Ok(expr),
            };
            self.advance(op.1);
            let rhs = self.parse_product()?;
            expr = Expr::Binary {
                op: op.0,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_product(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some((Token::Star, end)) => (BinaryOp::Mul, end),
                Some((Token::Slash, end)) => (BinaryOp::Div, end),
                _ => return Ok(expr),
            };
            self.advance(op.1);
            let rhs = self.parse_unary()?;
            expr = Expr::Binary {
                op: op.0,
                lhs: Box::new(expr),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some((Token::Minus, end)) = self.peek() {
            self.advance(end);
            let inner = self.parse_unary()?;
            return Ok(Expr::Negate(Box::new(inner)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_atom()?;
        if let Some((Token::Caret, end)) = self.peek() {
            self.advance(end);
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, FormulaError> {
        let Some((token, end)) = self.peek() else {
            return Err(self.malformed("unexpected end of formula"));
        };
        match token {
            Token::Number(value) => {
                self.advance(end);
                Ok(Expr::Number(value))
            }
            Token::Ident(name) => {
                self.advance(end);
                Ok(Expr::Variable(name))
            }
            Token::Open => {
                self.advance(end);
                let inner = self.parse_sum()?;
                match self.peek() {
                    Some((Token::Close, close_end)) => {
                        self.advance(close_end);
                        Ok(inner)
                    }
                    _ => Err(self.malformed("unclosed parenthesis")),
                }
            }
            _ => Err(self.malformed(format!(
                "expected a number, name or '(' at offset {}",
                self.position
            ))),
        }
    }
}

fn number_length(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() && bytes[index].is_ascii_digit() {
        index += 1;
    }
    if index < bytes.len() && bytes[index] == b'.' {
        index += 1;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }
    }
    if index == 0 || (index == 1 && bytes[0] == b'.') {
        return 0;
    }
    if index < bytes.len() && (bytes[index] == b'e' || bytes[index] == b'E') {
        let mut exponent = index + 1;
        if exponent < bytes.len() && (bytes[exponent] == b'+' || bytes[exponent] == b'-') {
            exponent += 1;
        }
        let digits_start = exponent;
        while exponent < bytes.len() && bytes[exponent].is_ascii_digit() {
            exponent += 1;
        }
        if exponent > digits_start {
            index = exponent;
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::{Formula, FormulaError};

    #[test]
    fn plain_quantity_splits_value_and_unit() {
        let formula = Formula::parse("42 eV").expect("formula should parse");
        assert!(formula.is_constant());
        assert_eq!(formula.unit_text(), "eV");
        assert_eq!(formula.evaluate(|_| None), Ok(42.0));

        let density = Formula::parse("1e17 cm^-3").expect("scientific literal should parse");
        assert_eq!(density.evaluate(|_| None), Ok(1.0e17));
        assert_eq!(density.unit_text(), "cm^-3");
    }

    #[test]
    fn free_variables_are_reported_in_order() {
        let formula = Formula::parse("1.519 - 5.405e-4*T**2/(T+beta) eV")
            .expect("varshni formula should parse");
        assert_eq!(formula.free_variables(), ["T", "beta"]);
        assert_eq!(formula.unit_text(), "eV");

        let missing = formula.evaluate(|name| (name == "T").then_some(300.0));
        assert_eq!(missing, Err(FormulaError::UnboundVariable("beta".to_string())));

        let value = formula
            .evaluate(|name| match name {
                "T" => Some(300.0),
                "beta" => Some(204.0),
                _ => None,
            })
            .expect("bound formula should evaluate");
        let expected = 1.519 - 5.405e-4 * 300.0_f64.powi(2) / (300.0 + 204.0);
        assert!((value - expected).abs() < 1.0e-12);
    }

    #[test]
    fn precedence_and_unary_minus_follow_arithmetic_rules() {
        let formula = Formula::parse("2 + 3*x^2 - -1").expect("formula should parse");
        assert_eq!(formula.evaluate(|_| Some(2.0)), Ok(15.0));

        let negated_power = Formula::parse("-x^2").expect("formula should parse");
        assert_eq!(negated_power.evaluate(|_| Some(3.0)), Ok(-9.0));
        assert_eq!(negated_power.unit_text(), "");
    }

    #[test]
    fn malformed_formulas_are_rejected() {
        assert!(matches!(
            Formula::parse("(1 + 2"),
            Err(FormulaError::Malformed { .. })
        ));
        assert!(matches!(Formula::parse("* 2"), Err(FormulaError::Malformed { .. })));
        assert!(matches!(Formula::parse(""), Err(FormulaError::Malformed { .. })));
    }

    #[test]
    fn division_by_zero_is_not_finite() {
        let formula = Formula::parse("1/x").expect("formula should parse");
        assert!(matches!(
            formula.evaluate(|_| Some(0.0)),
            Err(FormulaError::NonFinite(_))
        ));
    }
}
