//! wasmgate - CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wasmgate::util::logger;
use wasmgate::{check_script, run_binary_export, Value, ValueType, NAME, VERSION};

/// Embeddable WebAssembly interpreter with a stable C-callable boundary
#[derive(Parser, Debug)]
#[command(name = "wasmgate")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a binary module and invoke one of its exports
    Run {
        /// Binary module to load
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Export to invoke
        #[arg(long, value_name = "NAME")]
        invoke: String,

        /// Argument as type:value, e.g. i32:2 or f64:1.5 (repeatable)
        #[arg(long = "arg", value_name = "TYPE:VALUE")]
        args: Vec<String>,
    },

    /// Parse a script and check that every name resolves
    Check {
        /// Script file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        logger::init_debug();
    } else {
        logger::init();
    }

    match args.command {
        Commands::Run { file, invoke, args } => {
            let wasm = std::fs::read(&file)
                .with_context(|| format!("Failed to read: {}", file.display()))?;
            let values = args
                .iter()
                .map(|text| parse_arg(text))
                .collect::<Result<Vec<Value>>>()?;
            let results = run_binary_export(&wasm, &invoke, &values)
                .with_context(|| format!("Failed to run: {}", file.display()))?;
            for value in results {
                println!("{}", value);
            }
        }
        Commands::Check { file } => {
            let source = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read: {}", file.display()))?;
            check_script(&source)
                .with_context(|| format!("Failed to check: {}", file.display()))?;
            eprintln!("Check passed!");
        }
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
        }
    }

    Ok(())
}

/// Parse a `type:value` argument from the command line
fn parse_arg(text: &str) -> Result<Value> {
    let (ty, literal) = text
        .split_once(':')
        .with_context(|| format!("Expected type:value, got {:?}", text))?;
    let ty = match ty {
        "i32" => ValueType::I32,
        "i64" => ValueType::I64,
        "f32" => ValueType::F32,
        "f64" => ValueType::F64,
        other => anyhow::bail!("Unknown value type {:?}", other),
    };
    let value = match ty {
        ValueType::I32 => Value::I32(
            literal
                .parse::<i64>()
                .with_context(|| format!("Invalid i32 literal {:?}", literal))? as u32,
        ),
        ValueType::I64 => Value::I64(
            literal
                .parse::<i128>()
                .with_context(|| format!("Invalid i64 literal {:?}", literal))? as u64,
        ),
        ValueType::F32 => Value::from_f32(
            literal
                .parse::<f32>()
                .with_context(|| format!("Invalid f32 literal {:?}", literal))?,
        ),
        ValueType::F64 => Value::from_f64(
            literal
                .parse::<f64>()
                .with_context(|| format!("Invalid f64 literal {:?}", literal))?,
        ),
    };
    Ok(value)
}
