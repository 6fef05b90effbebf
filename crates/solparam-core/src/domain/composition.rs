use super::{ParamError, ParamResult};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Placeholder names bound to the first, second and third composition entries.
pub const COMPOSITION_PLACEHOLDERS: [&str; 3] = ["x", "y", "z"];

/// Ordered element -> fraction mapping of an alloy.
///
/// Keys are unique and the order is the order given at construction; the
/// first element is exposed to formulas as `x`, the second as `y`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Composition {
    entries: Vec<(String, f64)>,
}

impl Composition {
    pub fn new<I, S>(entries: I) -> ParamResult<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let mut collected: Vec<(String, f64)> = Vec::new();
        for (element, fraction) in entries {
            let element = element.into();
            if element.trim().is_empty() {
                return Err(ParamError::invalid_input(
                    "INPUT.COMPOSITION_ELEMENT",
                    "composition element symbols must not be empty",
                ));
            }
            if !fraction.is_finite() {
                return Err(ParamError::invalid_input(
                    "INPUT.COMPOSITION_FRACTION",
                    format!("fraction for '{element}' must be finite, got {fraction}"),
                ));
            }
            if collected.iter().any(|(existing, _)| *existing == element) {
                return Err(ParamError::invalid_input(
                    "INPUT.COMPOSITION_DUPLICATE",
                    format!("element '{element}' appears more than once in the composition"),
                ));
            }
            collected.push((element, fraction));
        }
        Ok(Self { entries: collected })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, element: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == element)
            .map(|(_, fraction)| *fraction)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.get(element).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(element, fraction)| (element.as_str(), *fraction))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Positional bindings `x`, `y`, `z` for the first three entries.
    pub fn placeholders(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        COMPOSITION_PLACEHOLDERS
            .iter()
            .zip(self.entries.iter())
            .map(|(placeholder, (_, fraction))| (*placeholder, *fraction))
    }
}

impl Serialize for Composition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (element, fraction) in &self.entries {
            map.serialize_entry(element, fraction)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::Composition;
    use crate::domain::ParamErrorCategory;

    #[test]
    fn composition_keeps_insertion_order_and_placeholders() {
        let comp = Composition::new([("In", 0.17), ("P", 0.4)]).expect("composition should build");
        let elements: Vec<&str> = comp.iter().map(|(element, _)| element).collect();
        assert_eq!(elements, ["In", "P"]);

        let placeholders: Vec<(&str, f64)> = comp.placeholders().collect();
        assert_eq!(placeholders, [("x", 0.17), ("y", 0.4)]);
        assert_eq!(comp.get("P"), Some(0.4));
        assert_eq!(comp.get("Ga"), None);
    }

    #[test]
    fn duplicate_elements_are_rejected() {
        let error = Composition::new([("In", 0.1), ("In", 0.2)])
            .expect_err("duplicate element should fail");
        assert_eq!(error.category(), ParamErrorCategory::InvalidInput);
        assert!(error.message().contains("'In'"));
    }

    #[test]
    fn composition_serializes_as_ordered_json_object() {
        let comp = Composition::new([("Ga", 0.5), ("Al", 0.2)]).expect("composition should build");
        let rendered = serde_json::to_string(&comp).expect("composition should serialize");
        assert_eq!(rendered, r#"{"Ga":0.5,"Al":0.2}"#);
    }
}
