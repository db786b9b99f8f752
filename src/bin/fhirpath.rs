//! Command-line evaluator: run an expression against a JSON resource file.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use fhirpath_engine::core::{Collection, CollectingTracer, FhirPathValue, TypeRegistry};
use fhirpath_engine::model::JsonElement;
use fhirpath_engine::{EvaluationContext, Expression, evaluate};

#[derive(Parser)]
#[command(
    name = "fhirpath",
    about = "Evaluate a FHIRPath expression against a JSON resource",
    version
)]
struct Cli {
    /// The FHIRPath expression to evaluate
    expression: String,

    /// Path to the JSON resource file; stdin when omitted
    #[arg(short, long)]
    resource: Option<PathBuf>,

    /// Environment variable bindings, as name=value strings
    #[arg(short = 'e', long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,

    /// Print trace() output to stderr
    #[arg(long)]
    trace: bool,

    /// Print the parsed expression instead of evaluating
    #[arg(long)]
    parse_only: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let expression = match Expression::parse(&cli.expression) {
        Ok(expression) => expression,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };
    if cli.parse_only {
        println!("{:#?}", expression.root());
        return ExitCode::SUCCESS;
    }

    let json = match read_resource(cli.resource.as_deref()) {
        Ok(json) => json,
        Err(error) => {
            eprintln!("error: {error}");
            return ExitCode::FAILURE;
        }
    };

    let tracer = CollectingTracer::new();
    let mut ctx = EvaluationContext::new().with_tracer(tracer.clone());
    for binding in &cli.env {
        let Some((name, value)) = binding.split_once('=') else {
            eprintln!("error: --env expects NAME=VALUE, got '{binding}'");
            return ExitCode::FAILURE;
        };
        ctx = match ctx.with_env(
            name,
            Collection::single(FhirPathValue::String(value.to_string())),
        ) {
            Ok(ctx) => ctx,
            Err(error) => {
                eprintln!("error: {error}");
                return ExitCode::FAILURE;
            }
        };
    }

    let root = JsonElement::resource_value(json, TypeRegistry::standard());
    match evaluate(&ctx, root, &expression) {
        Ok(result) => {
            if cli.trace {
                for (name, collection) in tracer.take() {
                    eprintln!("TRACE[{name}] {}", collection.to_json_value());
                }
            }
            match serde_json::to_string_pretty(&result.to_json_value()) {
                Ok(rendered) => println!("{rendered}"),
                Err(error) => {
                    eprintln!("error: {error}");
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn read_resource(path: Option<&std::path::Path>) -> Result<serde_json::Value, String> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?,
        None => {
            use std::io::Read;
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .map_err(|e| format!("cannot read stdin: {e}"))?;
            buffer
        }
    };
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON: {e}"))
}
