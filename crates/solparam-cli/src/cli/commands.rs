use super::CliError;
use super::helpers::*;
use serde_json::{Map, Value, json};
use solparam_core::material::FactoryRequest;

#[derive(clap::Args)]
pub(super) struct SourcesArgs {
    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct MaterialsArgs {
    /// Source identifier
    source: String,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct ParametersArgs {
    /// Source identifier
    source: String,

    /// Material name
    material: String,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
pub(super) struct GetArgs {
    /// Material name
    material: String,

    /// Parameters to resolve
    #[arg(required = true)]
    parameters: Vec<String>,

    #[command(flatten)]
    lookup: LookupFlags,
}

#[derive(clap::Args)]
pub(super) struct NkArgs {
    /// Material name
    material: String,

    #[command(flatten)]
    lookup: LookupFlags,
}

#[derive(clap::Args, Default)]
struct LookupFlags {
    /// Alloy composition entry, e.g. In=0.53 (repeatable)
    #[arg(long = "comp", value_name = "ELEMENT=FRACTION")]
    comp: Vec<String>,

    /// Restrict the search to these sources, in this order (repeatable)
    #[arg(long = "source", value_name = "SOURCE")]
    sources: Vec<String>,

    /// Formula input, e.g. T="300 K" (repeatable)
    #[arg(long = "input", value_name = "NAME=VALUE")]
    inputs: Vec<String>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

impl LookupFlags {
    fn request(&self, material: &str) -> Result<FactoryRequest, CliError> {
        Ok(FactoryRequest::new(material)
            .comp(parse_composition(&self.comp)?)
            .sources(self.sources.iter().map(String::as_str))
            .inputs(parse_inputs(&self.inputs)?)
            .manager(load_manager()?))
    }
}

pub(super) fn run_sources_command(args: SourcesArgs) -> Result<i32, CliError> {
    let manager = load_manager()?;
    let summaries = manager.sources();

    if args.json {
        let listing: Vec<Value> = summaries
            .iter()
            .map(|summary| {
                json!({
                    "name": summary.name,
                    "priority": summary.priority,
                    "path": summary.path.as_ref().map(|path| path.display().to_string()),
                })
            })
            .collect();
        print_json(&listing)?;
        return Ok(0);
    }

    for summary in &summaries {
        match &summary.path {
            Some(path) => println!("{:>4}  {}  {}", summary.priority, summary.name, path.display()),
            None => println!("{:>4}  {}", summary.priority, summary.name),
        }
    }
    Ok(0)
}

pub(super) fn run_materials_command(args: MaterialsArgs) -> Result<i32, CliError> {
    let source = load_manager()?.source(&args.source)?;
    let materials = source.materials();

    if args.json {
        print_json(&materials)?;
    } else {
        for material in &materials {
            println!("{material}");
        }
    }
    Ok(0)
}

pub(super) fn run_parameters_command(args: ParametersArgs) -> Result<i32, CliError> {
    let source = load_manager()?.source(&args.source)?;
    let parameters = source.parameters(&args.material);

    if args.json {
        let mut listing = Map::new();
        for parameter in &parameters {
            let description = source.description(parameter).map(str::to_string);
            listing.insert(parameter.clone(), json!(description));
        }
        print_json(&listing)?;
        return Ok(0);
    }

    for parameter in &parameters {
        match source.description(parameter) {
            Some(description) => println!("{parameter}: {description}"),
            None => println!("{parameter}"),
        }
    }
    Ok(0)
}

pub(super) fn run_get_command(args: GetArgs) -> Result<i32, CliError> {
    let material = args.lookup.request(&args.material)?.build()?;
    tracing::debug!(material = %material, "resolving parameters");

    let mut resolved = Vec::with_capacity(args.parameters.len());
    for name in &args.parameters {
        resolved.push((name.as_str(), material.get(name)?));
    }

    if args.lookup.json {
        let mut listing = Map::new();
        for (name, parameter) in &resolved {
            listing.insert(
                name.to_string(),
                serde_json::to_value(parameter).map_err(anyhow::Error::from)?,
            );
        }
        print_json(&listing)?;
        return Ok(0);
    }

    for (name, parameter) in &resolved {
        println!("{}", render_parameter_line(name, parameter));
    }
    Ok(0)
}

pub(super) fn run_nk_command(args: NkArgs) -> Result<i32, CliError> {
    let material = args.lookup.request(&args.material)?.build()?;
    let nk = material.nk()?;

    if args.lookup.json {
        print_json(nk.as_ref())?;
        return Ok(0);
    }

    for line in render_nk_table(&nk) {
        println!("{line}");
    }
    Ok(0)
}
