use super::CliError;
use anyhow::Context;
use serde::Serialize;
use solparam_core::domain::{Composition, NkData, ParamError};
use solparam_core::manager::ParameterManager;
use solparam_core::units::{Inputs, Parameter};
use std::sync::Arc;

pub(super) fn load_manager() -> Result<Arc<ParameterManager>, CliError> {
    ParameterManager::global().map_err(CliError::Compute)
}

/// Parses `--comp` entries of the form `In=0.53`, keeping the order given.
pub(super) fn parse_composition(entries: &[String]) -> Result<Composition, CliError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for entry in entries {
        let (element, fraction) = split_assignment(entry, "--comp")?;
        let fraction: f64 = fraction.parse().map_err(|_| {
            CliError::Compute(ParamError::invalid_input(
                "INPUT.CLI_COMPOSITION",
                format!("fraction for '{element}' must be a number, got '{fraction}'"),
            ))
        })?;
        pairs.push((element.to_string(), fraction));
    }
    Composition::new(pairs).map_err(CliError::Compute)
}

/// Parses `--input` entries of the form `T=300 K` into named parameters.
pub(super) fn parse_inputs(entries: &[String]) -> Result<Inputs, CliError> {
    let mut inputs = Inputs::new();
    for entry in entries {
        let (name, value) = split_assignment(entry, "--input")?;
        let parameter = Parameter::parse(value).map_err(CliError::Compute)?;
        inputs.insert(name.to_string(), parameter);
    }
    Ok(inputs)
}

fn split_assignment<'a>(entry: &'a str, flag: &str) -> Result<(&'a str, &'a str), CliError> {
    match entry.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() && !value.trim().is_empty() => {
            Ok((name.trim(), value.trim()))
        }
        _ => Err(CliError::Usage(format!(
            "{flag} expects NAME=VALUE, got '{entry}'"
        ))),
    }
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{rendered}");
    Ok(())
}

pub(super) fn render_parameter_line(name: &str, parameter: &Parameter) -> String {
    match parameter.source() {
        Some(source) => format!("{name} = {parameter} [{source}]"),
        None => format!("{name} = {parameter}"),
    }
}

/// `wavelength n k` rows, one per sample.
pub(super) fn render_nk_table(nk: &NkData) -> Vec<String> {
    let mut lines = vec!["wavelength n k".to_string()];
    let wavelength = nk.wavelength().unwrap_or_default();
    for (lambda, value) in wavelength.iter().zip(nk.values()) {
        lines.push(format!("{lambda} {} {}", value.re, value.im));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{parse_composition, parse_inputs, render_nk_table};
    use crate::cli::CliError;
    use solparam_core::domain::NkData;

    #[test]
    fn composition_entries_keep_their_order() {
        let comp = parse_composition(&["In=0.53".to_string(), "Al=0.1".to_string()])
            .expect("composition should parse");
        let elements: Vec<&str> = comp.iter().map(|(element, _)| element).collect();
        assert_eq!(elements, ["In", "Al"]);
        assert_eq!(comp.get("In"), Some(0.53));
    }

    #[test]
    fn malformed_assignments_are_usage_errors() {
        let error = parse_composition(&["In".to_string()]).expect_err("missing '=' should fail");
        assert!(matches!(error, CliError::Usage(_)));

        let error = parse_composition(&["In=lots".to_string()]).expect_err("fraction should be numeric");
        assert!(matches!(error, CliError::Compute(_)));
    }

    #[test]
    fn inputs_carry_units() {
        let inputs = parse_inputs(&["T=300 K".to_string()]).expect("input should parse");
        assert_eq!(inputs["T"].magnitude(), 300.0);
        assert_eq!(inputs["T"].unit().name(), "kelvin");
    }

    #[test]
    fn nk_table_lists_one_row_per_wavelength() {
        let nk = NkData::from_columns(vec![400.0, 500.0], &[4.3, 4.2], &[2.1, 0.4])
            .expect("nk should build");
        assert_eq!(render_nk_table(&nk), ["wavelength n k", "400 4.3 2.1", "500 4.2 0.4"]);
    }
}
