//! Shadegraph compiler CLI.
//!
//! Provides the `shadegraph` binary. `compile` loads an IR document from
//! JSON, compiles it for the chosen entry point, writes the emitted source
//! to the output file (or stdout), and always prints the machine-readable
//! descriptor (resource order + shader refs) as JSON to stdout.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use shadegraph_codegen::{CompileError, CompileResult};
use shadegraph_core::IrDocument;

/// Shadegraph compiler and tools.
#[derive(Parser)]
#[command(name = "shadegraph", about = "Shadegraph IR compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Compile an IR document to target source.
    Compile {
        /// Path to the IR JSON document.
        #[arg(short, long)]
        input: PathBuf,

        /// Entry function id (default: the document's entry_point_id).
        #[arg(short, long)]
        entry: Option<String>,

        /// Output path for the emitted source (default: stdout).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Compile {
            input,
            entry,
            output,
        } => {
            let exit_code = run_compile(&input, entry.as_deref(), output.as_deref());
            process::exit(exit_code);
        }
    }
}

/// Execute the compile subcommand.
///
/// Returns exit code: 0 = success, 1 = compilation error, 3 = I/O error.
fn run_compile(
    input: &std::path::Path,
    entry: Option<&str>,
    output: Option<&std::path::Path>,
) -> i32 {
    let text = match fs::read_to_string(input) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", input.display(), e);
            return 3;
        }
    };

    let doc: IrDocument = match serde_json::from_str(&text) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: invalid IR document '{}': {}", input.display(), e);
            return 3;
        }
    };

    let entry_id = match entry.or(doc.entry_point_id.as_deref()) {
        Some(id) => id.to_string(),
        None => {
            eprintln!("Error: no entry point: pass --entry or set entry_point_id");
            return 1;
        }
    };

    let result = match shadegraph_codegen::compile(&doc, &entry_id) {
        Ok(r) => r,
        Err(e) => return report_compile_error(&e),
    };

    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, &result.code) {
                eprintln!("Error: failed to write '{}': {}", path.display(), e);
                return 3;
            }
        }
        None => println!("{}", result.code),
    }
    // The descriptor is part of the contract on every successful compile,
    // wherever the source itself went.
    print_descriptor(&result);
    0
}

/// Print the resource order and shader descriptors as JSON for downstream
/// tooling.
fn print_descriptor(result: &CompileResult) {
    let descriptor = serde_json::json!({
        "resource_ids": result.resource_ids,
        "shader_refs": result.shader_refs,
    });
    match serde_json::to_string_pretty(&descriptor) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: failed to serialize descriptor: {e}"),
    }
}

fn report_compile_error(err: &CompileError) -> i32 {
    match err {
        CompileError::Recursion { path } => {
            eprintln!("Compilation error: recursive call chain:");
            for id in path {
                eprintln!("  -> {id}");
            }
        }
        other => eprintln!("Compilation error: {other}"),
    }
    1
}
