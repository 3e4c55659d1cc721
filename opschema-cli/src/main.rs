use std::collections::VecDeque;
use std::error::Error;
use std::fs;

use opschema::{
    Attributes, InferOptions, NodeInfo, OpSchema, ParamOption, SchemaRegistry, SupportLevel,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

mod value_spec;

use value_spec::{coerce_attr, parse_attr, parse_value_type};

enum Command {
    /// List registered schemas.
    List,

    /// Describe one schema.
    Show { op: String },

    /// Run inference for one node.
    Infer { op: Option<String> },
}

struct Args {
    command: Command,

    /// Operator domain. Defaults to the ONNX domain.
    domain: String,

    /// Operator version.
    version: u32,

    /// Attributes of the node, for `infer`.
    attrs: Attributes,

    /// Input descriptors of the node, for `infer`.
    inputs: Vec<String>,

    /// Number of node outputs, for `infer`.
    num_outputs: Option<usize>,

    /// JSON file containing a node description, for `infer`.
    node_file: Option<String>,

    /// Print results as JSON.
    json: bool,

    /// Treat reads of undeclared attributes as absent instead of as errors.
    lenient: bool,

    /// Only list experimental operators.
    experimental: bool,

    /// Enable debug logging.
    verbose: bool,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    use lexopt::prelude::*;

    let mut values = VecDeque::new();
    let mut domain = String::new();
    let mut version = 1;
    let mut attrs = Attributes::new();
    let mut inputs = Vec::new();
    let mut num_outputs = None;
    let mut node_file = None;
    let mut json = false;
    let mut lenient = false;
    let mut experimental = false;
    let mut verbose = false;

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        match arg {
            Value(val) => values.push_back(val.string()?),
            Short('d') | Long("domain") => domain = parser.value()?.string()?,
            Short('V') | Long("version") => version = parser.value()?.parse()?,
            Short('a') | Long("attr") => {
                let (name, value) = parse_attr(&parser.value()?.string()?)?;
                attrs.set(&name, value);
            }
            Short('i') | Long("input") => inputs.push(parser.value()?.string()?),
            Short('o') | Long("outputs") => num_outputs = Some(parser.value()?.parse()?),
            Long("node") => node_file = Some(parser.value()?.string()?),
            Long("json") => json = true,
            Long("lenient") => lenient = true,
            Long("experimental") => experimental = true,
            Short('v') | Long("verbose") => verbose = true,
            Short('h') | Long("help") => {
                println!(
                    "Inspect operator schemas and run type and shape inference.

Usage:
  {bin_name} list [--domain <domain>] [--experimental]
  {bin_name} show <op> [--domain <domain>] [--version <n>] [--json]
  {bin_name} infer <op> [OPTIONS]
  {bin_name} infer --node <file.json>

Options:
  -d, --domain <domain>  Operator domain (default: ONNX)
  -V, --version <n>      Operator version (default: 1)
  -a, --attr <name=val>  Set a node attribute, eg. `axes=[0,1]`
  -i, --input <spec>     Add a node input, eg. `float[2,batch,?]`
  -o, --outputs <n>      Number of node outputs (default: 1)
      --node <file>      Read the node from a JSON file
      --json             Print output as JSON
      --lenient          Allow inference to read undeclared attributes
      --experimental     Only list experimental operators
  -v, --verbose          Enable debug logging
  -h, --help             Print help

Attribute values are INT, FLOAT, STRING or lists of these in brackets.
Whole numbers are converted to FLOAT if the operator declares a FLOAT
attribute, so `scale=2` and `scale=2.0` are equivalent. Quote a value to
force it to be a STRING. Attributes in --node files are used as written.

Set OPSCHEMA_STRICT_ATTRS=0 to make --lenient the default.
",
                    bin_name = parser.bin_name().unwrap_or("opschema")
                );
                std::process::exit(0);
            }
            _ => return Err(arg.unexpected().into()),
        }
    }

    let command = match values.pop_front().as_deref() {
        Some("list") => Command::List,
        Some("show") => Command::Show {
            op: values.pop_front().ok_or("missing `<op>` arg")?,
        },
        Some("infer") => Command::Infer {
            op: values.pop_front(),
        },
        Some(cmd) => return Err(format!("unknown command \"{}\"", cmd).into()),
        None => return Err("missing command. Use --help for usage.".into()),
    };
    if let Some(extra) = values.pop_front() {
        return Err(format!("unexpected argument \"{}\"", extra).into());
    }

    Ok(Args {
        command,
        domain,
        version,
        attrs,
        inputs,
        num_outputs,
        node_file,
        json,
        lenient,
        experimental,
        verbose,
    })
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn list_schemas(registry: &SchemaRegistry, args: &Args) {
    let domain = opschema::normalize_domain(&args.domain);
    for schema in registry.iter() {
        if !args.domain.is_empty() && schema.domain() != domain {
            continue;
        }
        if args.experimental && schema.support_level() != SupportLevel::Experimental {
            continue;
        }
        let level = match schema.support_level() {
            SupportLevel::Common => "",
            SupportLevel::Experimental => "experimental",
        };
        println!("{:<32} {}", schema.id(), level);
    }
}

fn format_arity(min: usize, max: usize) -> String {
    if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("{} or more", min)
    } else {
        format!("{} to {}", min, max)
    }
}

fn print_schema(schema: &OpSchema) {
    println!("{}", schema.id());
    if schema.support_level() == SupportLevel::Experimental {
        println!("  (experimental)");
    }
    if let Some(doc) = schema.doc() {
        println!();
        for line in doc.lines() {
            println!("  {}", line);
        }
    }

    let print_params = |title: &str, params: &[opschema::FormalParameter], min, max| {
        println!();
        println!("{} ({}):", title, format_arity(min, max));
        for (i, param) in params.iter().enumerate() {
            let option = match param.option() {
                ParamOption::Single => "",
                ParamOption::Optional => " (optional)",
                ParamOption::Variadic => " (variadic)",
            };
            println!("  {}: {}: {}{}", i, param.name(), param.type_str(), option);
        }
    };
    print_params(
        "Inputs",
        schema.inputs(),
        schema.min_inputs(),
        schema.max_inputs(),
    );
    print_params(
        "Outputs",
        schema.outputs(),
        schema.min_outputs(),
        schema.max_outputs(),
    );

    if !schema.type_constraints().is_empty() {
        println!();
        println!("Type constraints:");
        for tc in schema.type_constraints() {
            let types: Vec<_> = tc.allowed().iter().map(|dt| dt.to_string()).collect();
            println!("  {}: {}", tc.name(), types.join(", "));
        }
    }

    if !schema.attrs().is_empty() || schema.allows_unchecked_attrs() {
        println!();
        println!("Attributes:");
        for attr in schema.attrs() {
            match (attr.default_value(), attr.is_required()) {
                (Some(default), _) => {
                    println!("  {}: {} = {}", attr.name(), attr.attr_type(), default)
                }
                (None, true) => println!("  {}: {} (required)", attr.name(), attr.attr_type()),
                (None, false) => println!("  {}: {} (optional)", attr.name(), attr.attr_type()),
            }
        }
        if schema.allows_unchecked_attrs() {
            println!("  (any other attributes are allowed)");
        }
    }

    if !schema.has_inference() {
        println!();
        println!("No type and shape inference.");
    }
}

fn read_node(
    registry: &SchemaRegistry,
    args: &Args,
    op: Option<&str>,
) -> Result<NodeInfo, Box<dyn Error>> {
    if let Some(path) = &args.node_file {
        let json = fs::read_to_string(path)?;
        let node: NodeInfo = serde_json::from_str(&json)?;
        return Ok(node);
    }

    let op = op.ok_or("missing `<op>` arg")?;
    let inputs = args
        .inputs
        .iter()
        .map(|spec| parse_value_type(spec))
        .collect::<Result<Vec<_>, _>>()?;

    // Attribute values on the command line don't say which kind they are,
    // so use the kinds the schema declares.
    let schema = registry.lookup(&args.domain, op, args.version);
    let mut attrs = Attributes::new();
    for (name, value) in args.attrs.iter() {
        let value = match schema.and_then(|schema| schema.attr(name)) {
            Some(spec) => coerce_attr(value.clone(), spec.attr_type()),
            None => value.clone(),
        };
        attrs.set(name, value);
    }

    let mut node = NodeInfo::new(op, args.version)
        .with_domain(&args.domain)
        .with_attrs(attrs)
        .with_inputs(inputs);
    if let Some(num_outputs) = args.num_outputs {
        node = node.with_num_outputs(num_outputs);
    }
    Ok(node)
}

fn infer(registry: &SchemaRegistry, args: &Args, op: Option<&str>) -> Result<(), Box<dyn Error>> {
    let node = read_node(registry, args, op)?;
    let op_id = node.op_id();
    let schema = registry
        .lookup(&op_id.domain, &op_id.name, op_id.version)
        .ok_or_else(|| format!("no schema registered for {}", op_id))?;

    if let Err(err) = schema.verify(&node) {
        warn!(op = %op_id, "node does not match schema: {}", err);
    }

    let mut options = InferOptions::from_env();
    if args.lenient {
        options.strict_attrs = false;
    }
    let outputs = registry
        .infer_node_with_options(&node, &options)
        .ok_or_else(|| format!("no schema registered for {}", op_id))??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        for (i, output) in outputs.iter().enumerate() {
            println!("output {}: {}", i, output);
        }
    }

    Ok(())
}

/// Tool for inspecting the operator schema registry and running type and
/// shape inference for individual nodes.
///
/// ```text
/// opschema list
/// opschema show ReduceSum
/// opschema infer ReduceSum -a axes=[1] -a keepdims=0 -i 'float[2,3,4]'
/// ```
fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;
    init_logging(args.verbose);

    let registry = SchemaRegistry::with_all_ops();

    match &args.command {
        Command::List => list_schemas(&registry, &args),
        Command::Show { op } => {
            let schema = registry
                .lookup(&args.domain, op, args.version)
                .ok_or_else(|| format!("no schema registered for {}-{}", op, args.version))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(schema)?);
            } else {
                print_schema(schema);
            }
        }
        Command::Infer { op } => infer(&registry, &args, op.as_deref())?,
    }

    Ok(())
}
