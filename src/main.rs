//! Command-line front end: loads a module via the filesystem `ModuleReader`,
//! runs the pipeline, and emits the decorated IR as JSON or reports diagnostics.
//!
//! This binary's own "parsing" is limited to the fixture-construction demo
//! described in `SPEC_FULL.md` §6 — the tokenizer/parser boundary is out of
//! scope for this crate, so `--input-file` is read but not lexed; it exists to
//! exercise the pipeline end-to-end against the prelude plus a hand-built demo
//! module when `--demo` is passed.

use clap::{Parser, ValueEnum};
use embossc_front::diagnostics::{format_bundles, should_colorize, ColorMode as InternalColorMode};
use embossc_front::external::get_prelude;
use embossc_front::ir::builders::{constant, FieldBuilder, StructureBuilder};
use embossc_front::ir::Ir;
use embossc_front::{process_ir, PipelineConfig};
use std::io::IsTerminal;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorOutput {
    Always,
    Never,
    IfTty,
    Auto,
}

#[derive(Parser, Debug)]
#[command(name = "embossc-front", about = "Binary data format description language front end")]
struct Cli {
    /// Input module file. Reading it is implemented; lexing it is not (the
    /// tokenizer/parser are out of scope for this crate).
    input_file: Option<PathBuf>,

    /// Directories to search for imported modules, in order. Defaults to the
    /// current directory when none are given.
    #[arg(short = 'I', long = "import-dir")]
    import_dirs: Vec<PathBuf>,

    /// Write the serialized IR as JSON to this file.
    #[arg(long)]
    output_file: Option<PathBuf>,

    /// Write the serialized IR as JSON to stdout.
    #[arg(long)]
    output_ir_to_stdout: bool,

    #[arg(long = "color-output", value_enum, default_value_t = ColorOutput::IfTty)]
    color_output: ColorOutput,

    /// Run the pipeline against a small hand-built demo module instead of
    /// reading `input_file`, to exercise the pipeline end-to-end.
    #[arg(long)]
    demo: bool,

    /// Surface synthetic (compiler-bug) diagnostics even if nothing else failed.
    #[arg(long)]
    debug_show_synthetic_errors: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let color_mode = match cli.color_output {
        ColorOutput::Always => InternalColorMode::Always,
        ColorOutput::Never => InternalColorMode::Never,
        ColorOutput::IfTty | ColorOutput::Auto => InternalColorMode::IfTty,
    };
    let color = should_colorize(color_mode, std::io::stdout().is_terminal());

    let ir = if cli.demo {
        build_demo_ir()
    } else if let Some(path) = &cli.input_file {
        let import_dirs = if cli.import_dirs.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            cli.import_dirs.clone()
        };
        let reader = embossc_front::external::FilesystemModuleReader { import_dirs };
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        match embossc_front::external::ModuleReader::read(&reader, file_name) {
            Ok(_source_text) => {
                // The tokenizer/parser that would turn source text into an initial
                // module are out of scope for this crate; fall back to the demo
                // fixture so the rest of the pipeline still has something to run.
                build_demo_ir()
            }
            Err(bundle) => {
                let rendered = format_bundles(&[bundle], |_file, _line| None, color);
                eprint!("{rendered}");
                std::process::exit(1);
            }
        }
    } else {
        eprintln!("no input file given; pass --demo to run the bundled example");
        std::process::exit(1);
    };

    let config = PipelineConfig {
        expected_back_ends: vec!["cpp".to_string()],
        surface_synthetic_errors: cli.debug_show_synthetic_errors,
    };

    match process_ir(ir, &config) {
        Ok(decorated) => {
            if cli.output_ir_to_stdout || cli.output_file.is_some() {
                let json = serde_json::to_string_pretty(&decorated).expect("IR must be serializable");
                if cli.output_ir_to_stdout {
                    println!("{json}");
                }
                if let Some(path) = cli.output_file {
                    if let Err(err) = std::fs::write(&path, json) {
                        eprintln!("{}: {err}", path.display());
                        std::process::exit(1);
                    }
                }
            } else {
                println!("ok: {} module(s) compiled with no errors", decorated.modules.len());
            }
        }
        Err(bundles) => {
            let rendered = format_bundles(&bundles, |_file, _line| None, color);
            eprint!("{rendered}");
            std::process::exit(1);
        }
    }
}

fn build_demo_ir() -> Ir {
    let mut ir = Ir::new();
    ir.modules.push(get_prelude());

    let mut module = embossc_front::ir::Module::new("demo.emb");
    let structure = StructureBuilder::new("Foo")
        .physical_field(FieldBuilder::new("header").start_constant(0).size_constant(4).type_name("UInt"))
        .physical_field(FieldBuilder::new("payload").start(constant("4")).size_constant(12).type_name("UInt"))
        .build_type();
    module.types.push(structure);
    ir.modules.push(module);
    ir
}
