mod output;

use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use yang_resolver_core::{FindingType, ResolverConfig, Schema, UnitInput, YangIdentity};

use crate::output::{OutputFormat, ResolveReport, format_identities, format_report};

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Table,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(fmt: CliOutputFormat) -> Self {
        match fmt {
            CliOutputFormat::Json => Self::Json,
            CliOutputFormat::Yaml => Self::Yaml,
            CliOutputFormat::Table => Self::Table,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "yang-resolve")]
#[command(about = "Semantic resolution of parsed YANG modules")]
#[command(version)]
struct Cli {
    /// Log every resolution pass.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve parsed modules and print the findings.
    Resolve(ResolveArgs),
    /// Print an identity together with every identity derived from it.
    Identities(IdentitiesArgs),
    /// Write the default resolver configuration as YAML.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Parsed unit files (.json, .yaml, .yml) and/or directories containing them.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Resolver configuration YAML. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
    /// Comma-separated finding types that make the command fail.
    #[arg(long, value_delimiter = ',', value_parser = parse_finding_type)]
    fail_on: Vec<FindingType>,
}

#[derive(Debug, Args)]
struct IdentitiesArgs {
    #[command(flatten)]
    input: InputArgs,
    /// Identity to expand, as module:name.
    #[arg(long)]
    identity: String,
    /// Output format.
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Output YAML path.
    path: PathBuf,
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Resolve(args) => run_resolve(args),
        Command::Identities(args) => run_identities(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_resolve(args: ResolveArgs) -> Result<(), String> {
    let schema = resolve_inputs(&args.input)?;
    let report = ResolveReport::from_schema(&schema);
    print_output(&format_report(&report, args.format.into())?);

    let failing: Vec<&str> = args
        .fail_on
        .iter()
        .filter(|finding_type| schema.findings().has_finding_of_type(**finding_type))
        .map(|finding_type| finding_type.as_str())
        .collect();
    if !failing.is_empty() {
        return Err(format!(
            "findings of failing type(s) reported: {}",
            failing.join(", ")
        ));
    }
    Ok(())
}

fn run_identities(args: IdentitiesArgs) -> Result<(), String> {
    let (module, name) = args
        .identity
        .split_once(':')
        .ok_or_else(|| format!("Identity '{}' must be given as module:name", args.identity))?;

    let schema = resolve_inputs(&args.input)?;
    let registry = schema.identity_registry();
    let identity = registry
        .identities()
        .find(|id| id.module.as_deref() == Some(module) && id.name == name)
        .cloned()
        .ok_or_else(|| format!("Identity '{module}:{name}' is not declared by any input"))?;

    let closure: Vec<YangIdentity> = registry
        .identity_and_derived_recursively(&identity)
        .into_iter()
        .collect();
    print_output(&format_identities(&closure, args.format.into())?);
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), String> {
    if args.path.exists() && !args.force {
        return Err(format!(
            "'{}' already exists; pass --force to overwrite",
            args.path.display()
        ));
    }
    if let Some(parent) = args.path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| {
                format!(
                    "Failed to create output directory '{}': {err}",
                    parent.display()
                )
            })?;
        }
    }
    ResolverConfig::default()
        .save(&args.path)
        .map_err(|err| format!("Failed to write '{}': {err}", args.path.display()))?;
    println!("Wrote default configuration to '{}'.", args.path.display());
    Ok(())
}

fn resolve_inputs(args: &InputArgs) -> Result<Schema, String> {
    let config = match &args.config {
        Some(path) => ResolverConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => ResolverConfig::default(),
    };

    let paths = collect_input_paths(&args.inputs)?;
    let mut inputs = Vec::with_capacity(paths.len());
    for path in &paths {
        let input = UnitInput::load(path)
            .map_err(|err| format!("Failed to load '{}': {err}", path.display()))?;
        debug!(source = %input.source, "loaded input");
        inputs.push(input);
    }

    let mut schema = Schema::new(config);
    schema.parse_into_schema(inputs).map_err(|err| err.to_string())?;
    info!(
        units = schema.module_registry().len(),
        findings = schema.findings().len(),
        "resolution finished"
    );
    Ok(schema)
}

fn collect_input_paths(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, String> {
    let mut paths = BTreeSet::new();
    for input in inputs {
        if input.is_dir() {
            let entries = fs::read_dir(input)
                .map_err(|err| format!("Failed to read '{}': {err}", input.display()))?;
            for entry in entries {
                let path = entry
                    .map_err(|err| format!("Failed to read '{}': {err}", input.display()))?
                    .path();
                if is_unit_file(&path) {
                    paths.insert(path);
                }
            }
            continue;
        }

        if input.is_file() {
            if !is_unit_file(input) {
                return Err(format!(
                    "Input '{}' must end in .json, .yaml or .yml",
                    input.display()
                ));
            }
            paths.insert(input.clone());
            continue;
        }

        return Err(format!("Input path '{}' does not exist", input.display()));
    }
    Ok(paths.into_iter().collect())
}

fn is_unit_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(OsStr::to_str),
        Some("json" | "yaml" | "yml")
    )
}

fn parse_finding_type(raw: &str) -> Result<FindingType, String> {
    raw.trim().parse()
}

fn print_output(raw: &str) {
    if raw.ends_with('\n') {
        print!("{raw}");
    } else {
        println!("{raw}");
    }
}
