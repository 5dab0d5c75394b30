//! PolyScan Command Line Interface
//!
//! Usage:
//!   polyscan [OPTIONS] <input-file>
//!   polyscan --help
//!
//! Examples:
//!   polyscan square.scan                       # Print the C loop nest
//!   polyscan --emit=structure square.scan      # Dump the loop tree
//!   polyscan --emit=points --params 10 a.scan  # List executed statement instances
//!   polyscan --backend=check square.scan       # Run both backends and compare
//!   polyscan --compilable 10 a.scan            # Complete C program with parameters set to 10

use clap::{Parser, ValueEnum};
use polyscan::codegen::{self, CCodeGen, Emit, Program};
use polyscan::polyhedral::BackendChoice;
use polyscan::utils::errors::ParseError;
use polyscan::utils::{print_input, SourceMap};
use polyscan::{frontend, GenerationOptions};
use std::fs;
use std::path::PathBuf;
use anyhow::{Context, Result};
use log::{debug, error, info};

/// PolyScan - Loop generation for unions of polyhedra
#[derive(Parser, Debug)]
#[command(name = "polyscan")]
#[command(author = "PolyScan Contributors")]
#[command(version)]
#[command(about = "Generates loop nests scanning unions of parametric polyhedra", long_about = None)]
struct Cli {
    /// Input file in the textual program format
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// What to emit
    #[arg(long, default_value = "code")]
    emit: EmitKind,

    /// Polyhedral backend
    #[arg(long, default_value = "dd")]
    backend: BackendArg,

    /// Row limit for intermediate constraint systems
    #[arg(long, value_name = "ROWS")]
    max_rows: Option<usize>,

    /// Do not merge statements into blocks
    #[arg(long)]
    noblocks: bool,

    /// Do not extract scalar dimensions
    #[arg(long)]
    noscalars: bool,

    /// Do not simplify loop domains
    #[arg(long)]
    nosimplify: bool,

    /// First depth at which domains are separated
    #[arg(short = 'f', long, value_name = "DEPTH", default_value_t = 1)]
    first_level: usize,

    /// Last depth at which domains are separated (unlimited by default)
    #[arg(short = 'l', long, value_name = "DEPTH")]
    last_level: Option<usize>,

    /// Print a complete C program with every parameter set to VALUE
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    compilable: Option<i64>,

    /// Parameter values for --emit=points (comma-separated)
    #[arg(long, value_delimiter = ',', num_args = 1.., allow_negative_numbers = true)]
    params: Vec<i64>,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress warnings)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EmitKind {
    /// Generated C code
    Code,
    /// Loop tree dump
    Structure,
    /// The input, re-printed in the textual format
    Input,
    /// JSON dump of the program
    Json,
    /// Executed statement instances for --params
    Points,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    /// Double description
    Dd,
    /// Fourier-Motzkin
    Fm,
    /// Both, comparing every result
    Check,
}

impl From<BackendArg> for BackendChoice {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Dd => BackendChoice::DoubleDescription,
            BackendArg::Fm => BackendChoice::FourierMotzkin,
            BackendArg::Check => BackendChoice::CrossCheck,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        log::LevelFilter::Error
    } else {
        match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    info!("PolyScan v{}", polyscan::VERSION);
    debug!("Input file: {:?}", cli.input);

    // Read input file
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read input file: {:?}", cli.input))?;

    info!("Reading...");
    let input = match frontend::read_program(&source) {
        Ok(input) => input,
        Err(e) => {
            report_parse_error(&source, &e);
            return Err(e).with_context(|| format!("Failed to read program from {:?}", cli.input));
        }
    };
    debug!("Input:\n{}", print_input(&input));

    // Handle --emit=input early exit
    if matches!(cli.emit, EmitKind::Input) {
        write_output(&cli.output, &frontend::write_program(&input))?;
        return Ok(());
    }

    let options = build_options(&cli);
    debug!("Generation options: {:?}", options);

    info!("Generating loops...");
    let program = match Program::build(&input, &options) {
        Ok(program) => program,
        Err(e) => {
            error!("Loop generation failed: {}", e);
            return Err(e.into());
        }
    };
    info!("Generated {} top-level loop(s)", program.loops().len());

    let output = match cli.emit {
        EmitKind::Code => {
            let name = cli.input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            CCodeGen::new(&program).with_source(&name).generate()
        }
        EmitKind::Structure => codegen::render(&program, Emit::Structure)?,
        EmitKind::Json => codegen::render(&program, Emit::Json)?,
        EmitKind::Points => format_points(&program, &cli.params)?,
        EmitKind::Input => frontend::write_program(&input),
    };
    write_output(&cli.output, &output)
}

fn build_options(cli: &Cli) -> GenerationOptions {
    let mut options = GenerationOptions::default()
        .backend(cli.backend.into())
        .noblocks(cli.noblocks)
        .noscalars(cli.noscalars)
        .nosimplify(cli.nosimplify)
        .first_level(cli.first_level);
    if let Some(rows) = cli.max_rows {
        options = options.max_rows(rows);
    }
    if let Some(level) = cli.last_level {
        options = options.last_level(level);
    }
    if let Some(value) = cli.compilable {
        options = options.compilable(value);
    }
    options
}

fn format_points(program: &Program, params: &[i64]) -> Result<String> {
    let points = program
        .points(params)
        .with_context(|| format!("Failed to enumerate points for parameters {:?}", params))?;
    let mut out = String::new();
    for (statement, coords) in points {
        let coords: Vec<String> = coords.iter().map(|c| c.to_string()).collect();
        out.push_str(&format!("{}({})\n", statement, coords.join(",")));
    }
    Ok(out)
}

fn report_parse_error(source: &str, e: &ParseError) {
    error!("{}", e);
    if let Some(excerpt) = SourceMap::new(source).excerpt(&e.span) {
        eprintln!("{}", excerpt);
    }
}

fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content)
                .with_context(|| format!("Failed to write output file: {:?}", p))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
