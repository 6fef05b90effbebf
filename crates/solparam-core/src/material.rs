//! Material records with lazily resolved, cached parameters.
//!
//! A [`Material`] is identified by its name, composition and source list.
//! Those fields are fixed at construction and have no setters. The only
//! state that changes is the private cache, which grows as parameters are
//! requested through [`Material::get`] and [`Material::nk`]; entries are
//! never replaced or removed.

use crate::domain::{Composition, NK_KEY, NkData, ParamError, ParamResult};
use crate::field::{FieldValue, MaterialRecord, MaterialTable};
use crate::manager::ParameterManager;
use crate::units::{Inputs, Parameter};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

const NAME_FIELD: &str = "name";
const COMP_FIELD: &str = "comp";
const SOURCES_FIELD: &str = "sources";

/// Everything [`Material::factory`] needs; built fluently.
#[derive(Debug, Clone, Default)]
pub struct FactoryRequest {
    name: String,
    comp: Composition,
    include: Vec<String>,
    sources: Vec<String>,
    inputs: Inputs,
    nk: NkData,
    manager: Option<Arc<ParameterManager>>,
}

impl FactoryRequest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn comp(mut self, comp: Composition) -> Self {
        self.comp = comp;
        self
    }

    /// Parameters to resolve eagerly; `"nk"` requests refractive index data.
    pub fn include<I, S>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    /// Pins a parameter value; pinned values take precedence over resolved
    /// ones and feed into every later resolution.
    pub fn input(mut self, name: &str, value: Parameter) -> Self {
        self.inputs.insert(name.to_string(), value);
        self
    }

    pub fn inputs(mut self, inputs: Inputs) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn nk(mut self, nk: NkData) -> Self {
        self.nk = nk;
        self
    }

    pub fn manager(mut self, manager: Arc<ParameterManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn build(self) -> ParamResult<Material> {
        Material::factory(self)
    }
}

#[derive(Debug)]
pub struct Material {
    name: String,
    comp: Composition,
    sources: Vec<String>,
    manager: Option<Arc<ParameterManager>>,
    params: Mutex<FieldCache>,
    nk: Mutex<Option<Arc<NkData>>>,
}

/// Cached fields in insertion order. Parameters feed later resolutions;
/// verbatim fields are kept exactly as given and only travel through
/// [`Material::to_dict`].
#[derive(Debug, Default)]
struct FieldCache {
    parameters: Inputs,
    verbatim: BTreeMap<String, FieldValue>,
    order: Vec<String>,
}

impl FieldCache {
    fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name) || self.verbatim.contains_key(name)
    }

    fn insert_parameter(&mut self, name: String, value: Parameter) {
        if !self.contains(&name) {
            self.order.push(name.clone());
        }
        self.verbatim.remove(&name);
        self.parameters.insert(name, value);
    }

    fn insert_verbatim(&mut self, name: String, value: FieldValue) {
        if !self.contains(&name) {
            self.order.push(name.clone());
        }
        self.parameters.remove(&name);
        self.verbatim.insert(name, value);
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn fields(&self) -> impl Iterator<Item = (&str, FieldValue)> {
        self.order.iter().filter_map(|name| {
            let value = match self.parameters.get(name) {
                Some(parameter) => FieldValue::Parameter(parameter.clone()),
                None => self.verbatim.get(name)?.clone(),
            };
            Some((name.as_str(), value))
        })
    }
}

impl Material {
    fn with_cache(
        name: String,
        comp: Composition,
        sources: Vec<String>,
        manager: Option<Arc<ParameterManager>>,
        params: FieldCache,
        nk: Option<NkData>,
    ) -> Self {
        Self {
            name,
            comp,
            sources,
            manager,
            params: Mutex::new(params),
            nk: Mutex::new(nk.map(Arc::new)),
        }
    }

    /// Builds a material, resolving `include` up front and overlaying the
    /// pinned inputs. A non-empty `nk` is validated instead of resolved.
    pub fn factory(request: FactoryRequest) -> ParamResult<Self> {
        let FactoryRequest {
            name,
            comp,
            include,
            sources,
            inputs,
            nk,
            manager,
        } = request;

        let wants_nk = include.iter().any(|parameter| parameter == NK_KEY);
        let scalar: Vec<String> = include
            .into_iter()
            .filter(|parameter| parameter != NK_KEY)
            .collect();
        let needs_manager = !scalar.is_empty() || (wants_nk && nk.is_empty());
        let resolver = match (&manager, needs_manager) {
            (Some(manager), _) => Some(Arc::clone(manager)),
            (None, true) => Some(ParameterManager::global()?),
            (None, false) => None,
        };

        let mut resolved = match &resolver {
            Some(resolver) if !scalar.is_empty() => {
                resolver.get_multiple_parameters(&name, &scalar, &sources, &comp, &inputs)?
            }
            _ => BTreeMap::new(),
        };
        let mut params = FieldCache::default();
        for parameter in scalar {
            if let Some(value) = resolved.remove(&parameter) {
                params.insert_parameter(parameter, value);
            }
        }
        for (parameter, value) in inputs {
            params.insert_parameter(parameter, value);
        }

        let nk = if !nk.is_empty() {
            nk.validate()?;
            Some(nk)
        } else if let (true, Some(resolver)) = (wants_nk, &resolver) {
            Some(resolver.get_nk(&name, &sources, &comp, &params.parameters)?)
        } else {
            None
        };

        debug!(
            material = %name,
            params = params.len(),
            nk = nk.is_some(),
            "built material"
        );
        Ok(Self::with_cache(name, comp, sources, manager, params, nk))
    }

    /// Builds from a flat record. `name` is required; `comp`, `sources` and
    /// `nk` are taken out and every other field goes into the cache as is.
    /// Numbers and `"<number> <unit>"` text become parameters; anything else
    /// is kept verbatim. Nothing is resolved.
    pub fn from_dict(record: MaterialRecord) -> ParamResult<Self> {
        Self::from_record(record, "dictionary")
    }

    /// Builds from row `index` of a table; `nk`, when non-empty, is used in
    /// place of any nk column.
    pub fn from_dataframe(table: &MaterialTable, index: usize, nk: NkData) -> ParamResult<Self> {
        let mut record = table.row(index).ok_or_else(|| {
            ParamError::invalid_input(
                "INPUT.TABLE_ROW",
                format!("row {index} is out of range for a table of {} rows", table.len()),
            )
        })?;
        if !nk.is_empty() {
            record.insert(NK_KEY, nk);
        }
        Self::from_record(record, "dataframe")
    }

    fn from_record(mut record: MaterialRecord, context: &str) -> ParamResult<Self> {
        let name = match record.remove(NAME_FIELD) {
            Some(FieldValue::Text(name)) => name,
            Some(other) => return Err(field_type_error(NAME_FIELD, "text", &other)),
            None => return Err(ParamError::missing_field(NAME_FIELD, context)),
        };
        let comp = match record.remove(COMP_FIELD) {
            Some(FieldValue::Composition(comp)) => comp,
            Some(other) => return Err(field_type_error(COMP_FIELD, "composition", &other)),
            None => Composition::empty(),
        };
        let sources = match record.remove(SOURCES_FIELD) {
            Some(FieldValue::Sources(sources)) => sources,
            Some(FieldValue::Text(source)) => vec![source],
            Some(other) => return Err(field_type_error(SOURCES_FIELD, "sources", &other)),
            None => Vec::new(),
        };
        let nk = match record.remove(NK_KEY) {
            Some(FieldValue::Nk(nk)) if nk.is_empty() => None,
            Some(FieldValue::Nk(nk)) => {
                nk.validate()?;
                Some(nk)
            }
            Some(other) => return Err(field_type_error(NK_KEY, "nk", &other)),
            None => None,
        };

        let mut params = FieldCache::default();
        for (field, value) in record {
            match value.as_parameter() {
                Some(parameter) => params.insert_parameter(field, parameter),
                None => params.insert_verbatim(field, value),
            }
        }
        Ok(Self::with_cache(name, comp, sources, None, params, nk))
    }

    /// Resolves against `manager` instead of the process-wide one.
    pub fn with_manager(mut self, manager: Arc<ParameterManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comp(&self) -> &Composition {
        &self.comp
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    fn manager(&self) -> ParamResult<Arc<ParameterManager>> {
        match &self.manager {
            Some(manager) => Ok(Arc::clone(manager)),
            None => ParameterManager::global(),
        }
    }

    fn cache(&self) -> MutexGuard<'_, FieldCache> {
        self.params
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns `parameter`, resolving it on first access.
    ///
    /// Resolution runs with every cached parameter as input and holds the
    /// cache lock, so a key is resolved at most once per material. Sources
    /// must not call back into the same material.
    pub fn get(&self, parameter: &str) -> ParamResult<Parameter> {
        let mut cache = self.cache();
        if let Some(cached) = cache.parameters.get(parameter) {
            trace!(material = %self.name, parameter, "parameter cache hit");
            return Ok(cached.clone());
        }
        if let Some(stored) = cache.verbatim.get(parameter) {
            return Err(ParamError::invalid_input(
                "INPUT.FIELD_TYPE",
                format!(
                    "field '{parameter}' of '{}' holds {} data, not a parameter",
                    self.name,
                    stored.kind()
                ),
            ));
        }

        let resolved = self.manager()?.get_parameter(
            &self.name,
            parameter,
            &self.sources,
            &self.comp,
            &cache.parameters,
        )?;
        cache.insert_parameter(parameter.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Refractive index data, resolved on first call and cached.
    pub fn nk(&self) -> ParamResult<Arc<NkData>> {
        let mut slot = self.nk.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(cached) = slot.as_ref() {
            trace!(material = %self.name, "nk cache hit");
            return Ok(Arc::clone(cached));
        }

        let inputs = self.cache().parameters.clone();
        let nk = self
            .manager()?
            .get_nk(&self.name, &self.sources, &self.comp, &inputs)?;
        let nk = Arc::new(nk);
        *slot = Some(Arc::clone(&nk));
        Ok(nk)
    }

    /// Names cached so far, in the order they were added.
    pub fn params(&self) -> Vec<String> {
        self.cache().order.clone()
    }

    /// A cached field as stored, parameters included.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        let cache = self.cache();
        match cache.parameters.get(name) {
            Some(parameter) => Some(FieldValue::Parameter(parameter.clone())),
            None => cache.verbatim.get(name).cloned(),
        }
    }

    /// Name with composition fractions inlined after each element symbol,
    /// e.g. `FeO` with `Fe = 0.1` gives `Fe0.1O`.
    pub fn material_str(&self) -> String {
        let mut rendered = self.name.clone();
        for (element, fraction) in self.comp.iter() {
            rendered = rendered.replace(element, &format!("{element}{}", format_fraction(fraction)));
        }
        rendered
    }

    pub fn to_dict(&self) -> MaterialRecord {
        let nk = self
            .nk
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_deref()
            .cloned()
            .unwrap_or_default();
        let mut record = MaterialRecord::new()
            .with(NAME_FIELD, self.name.clone())
            .with(COMP_FIELD, self.comp.clone())
            .with(SOURCES_FIELD, self.sources.clone())
            .with(NK_KEY, nk);
        for (name, value) in self.cache().fields() {
            record.insert(name, value);
        }
        record
    }

    /// Single-row table without the nk data.
    pub fn to_dataframe(&self) -> MaterialTable {
        let mut record = self.to_dict();
        record.remove(NK_KEY);
        MaterialTable::from_records([record])
    }
}

impl Display for Material {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "<material {}", self.material_str())?;
        if !self.sources.is_empty() {
            write!(f, " sources=[{}]", self.sources.join(", "))?;
        }
        f.write_str(">")
    }
}

fn field_type_error(field: &str, expected: &str, found: &FieldValue) -> ParamError {
    ParamError::invalid_input(
        "INPUT.FIELD_TYPE",
        format!("field '{field}' must hold {expected} data, got {}", found.kind()),
    )
}

/// Two significant digits; fixed notation keeps at least one decimal and
/// very small or large values switch to exponent notation (`1e-05`).
fn format_fraction(value: f64) -> String {
    const SIGNIFICANT: i32 = 2;
    if value == 0.0 {
        return "0.0".to_string();
    }

    let scientific = format!("{:.*e}", (SIGNIFICANT - 1) as usize, value);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= SIGNIFICANT {
        let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.abs());
    }

    let decimals = (SIGNIFICANT - 1 - exponent).max(0) as usize;
    let fixed = format!("{value:.decimals$}");
    if !fixed.contains('.') {
        return format!("{fixed}.0");
    }
    let trimmed = fixed.trim_end_matches('0');
    if trimmed.ends_with('.') {
        format!("{trimmed}0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{Material, format_fraction};
    use crate::domain::{Composition, NkData, ParamErrorCategory};
    use crate::field::{FieldValue, MaterialRecord};
    use num_complex::Complex64;

    #[test]
    fn fractions_use_two_significant_digits() {
        assert_eq!(format_fraction(0.1), "0.1");
        assert_eq!(format_fraction(0.25), "0.25");
        assert_eq!(format_fraction(0.333), "0.33");
        assert_eq!(format_fraction(1.0), "1.0");
        assert_eq!(format_fraction(12.0), "12.0");
        assert_eq!(format_fraction(0.00001), "1e-05");
        assert_eq!(format_fraction(0.0), "0.0");
    }

    #[test]
    fn material_str_inlines_fractions() {
        let record = MaterialRecord::new()
            .with("name", "FeO")
            .with("comp", Composition::new([("Fe", 0.1)]).expect("composition should build"));
        let material = Material::from_dict(record).expect("material should build");
        assert_eq!(material.material_str(), "Fe0.1O");
        assert_eq!(material.to_string(), "<material Fe0.1O>");
    }

    #[test]
    fn from_dict_requires_name() {
        let record = MaterialRecord::new().with("T", 300.0);
        let error = Material::from_dict(record).expect_err("missing name should fail");
        assert_eq!(error.category(), ParamErrorCategory::MissingField);
        assert!(error.message().contains("'name'"));
    }

    #[test]
    fn from_dict_caches_remaining_fields_without_resolution() {
        let record = MaterialRecord::new()
            .with("name", "GaAs")
            .with("sources", vec!["simple".to_string()])
            .with("T", "300 K")
            .with("doping", 1.0e17);
        let material = Material::from_dict(record).expect("material should build");

        assert_eq!(material.sources(), ["simple"]);
        assert_eq!(material.params(), ["T", "doping"]);
        let temperature = material.get("T").expect("cached value should not resolve");
        assert_eq!(temperature.magnitude(), 300.0);
        assert_eq!(temperature.unit().name(), "kelvin");
    }

    #[test]
    fn from_dict_keeps_labels_and_formulas_verbatim() {
        let record = MaterialRecord::new()
            .with("name", "GaAs")
            .with("label", "substrate")
            .with("doping", 1.0e17)
            .with("gap_model", "2*T K");
        let material = Material::from_dict(record).expect("labels should not be resolved");

        assert_eq!(material.field("label"), Some(FieldValue::from("substrate")));
        assert_eq!(material.field("gap_model"), Some(FieldValue::from("2*T K")));
        let error = material.get("label").expect_err("a label is not a parameter");
        assert_eq!(error.code(), "INPUT.FIELD_TYPE");
        assert!(error.message().contains("'label'"));

        let record = material.to_dict();
        assert_eq!(record.get("label"), Some(&FieldValue::from("substrate")));
        let rebuilt = Material::from_dict(record).expect("record should rebuild");
        assert_eq!(rebuilt.field("gap_model"), Some(FieldValue::from("2*T K")));
    }

    #[test]
    fn cached_fields_keep_insertion_order() {
        let record = MaterialRecord::new()
            .with("name", "GaAs")
            .with("zeta", 1.0)
            .with("label", "substrate")
            .with("alpha", "5 eV");
        let material = Material::from_dict(record).expect("material should build");

        assert_eq!(material.params(), ["zeta", "label", "alpha"]);
        let keys: Vec<String> = material.to_dict().keys().map(str::to_string).collect();
        assert_eq!(keys, ["name", "comp", "sources", "nk", "zeta", "label", "alpha"]);
    }

    #[test]
    fn from_dict_validates_nk() {
        let unlabelled = NkData::unlabelled(vec![Complex64::new(1.0, 0.0)]);
        let record = MaterialRecord::new()
            .with("name", "GaAs")
            .with("nk", unlabelled);
        let error = Material::from_dict(record).expect_err("unlabelled nk should fail");
        assert_eq!(error.category(), ParamErrorCategory::InvalidInput);

        let record = MaterialRecord::new()
            .with("name", "GaAs")
            .with("comp", FieldValue::Number(1.0));
        let error = Material::from_dict(record).expect_err("wrong comp type should fail");
        assert_eq!(error.code(), "INPUT.FIELD_TYPE");
    }
}
