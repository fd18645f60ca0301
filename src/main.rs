use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kiln::config::{Config, ConfigArgs};
use kiln::diagnostic::registry;
use kiln::object::Object;
use kiln::session::{self, Session};
use kiln::{compiler, repl};

/// Stack for serializing the AST, which recurses once per nesting level.
const AST_JSON_STACK: usize = 64 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "kiln", version)]
#[command(about = "Compile kiln source to bytecode and run it on a stack VM")]
struct Cli {
    /// Source file to run. Starts the REPL when omitted.
    file: Option<PathBuf>,

    /// Run CODE instead of a file
    #[arg(short, long, value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// Print an intermediate form instead of running
    #[arg(long, value_enum)]
    emit: Option<Emit>,

    /// Explain an error code, e.g. K-R001
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Emit {
    /// The parsed program as JSON
    Ast,
    /// Disassembled instructions and the constant pool
    Bytecode,
}

fn init_logging(config: &Config) {
    let filter = match config.verbosity {
        0 => EnvFilter::try_from_env("KILN_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("kiln=debug"),
        _ => EnvFilter::new("kiln=trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(config.color))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = Config::from_args(&cli.config);
    init_logging(&config);

    if let Some(code) = &cli.explain {
        return explain(code);
    }

    let source = match (&cli.eval, &cli.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: cannot read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        (None, None) if cli.emit.is_some() => {
            eprintln!("error: --emit needs a FILE or --eval CODE");
            return ExitCode::FAILURE;
        }
        (None, None) => {
            return match repl::start(&config) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            };
        }
    };

    let outcome = match cli.emit {
        Some(emit) => emit_source(&source, emit),
        None => run_source(&source, &config),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut stderr = std::io::stderr().lock();
            for d in e.diagnostics(&source) {
                let _ = stderr.write_all(config.render(&d).as_bytes());
            }
            ExitCode::FAILURE
        }
    }
}

fn run_source(source: &str, config: &Config) -> Result<(), session::Error> {
    let mut session = Session::with_config(config.vm_config());
    match session.eval(source)? {
        None | Some(Object::Null) => {}
        Some(value) => println!("{value}"),
    }
    Ok(())
}

fn emit_source(source: &str, emit: Emit) -> Result<(), session::Error> {
    let program = session::parse(source)?;
    match emit {
        Emit::Ast => {
            let json = stacker::grow(AST_JSON_STACK, || serde_json::to_string_pretty(&program));
            match json {
                Ok(json) => println!("{json}"),
                Err(e) => eprintln!("error: cannot serialize AST: {e}"),
            }
        }
        Emit::Bytecode => print!("{}", compiler::compile(&program)?),
    }
    Ok(())
}

fn explain(code: &str) -> ExitCode {
    match registry::lookup(code) {
        Some(entry) => {
            print!("{}", entry.long);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("error: unknown error code '{code}'. Known codes:");
            for entry in registry::REGISTRY {
                eprintln!("  {:<7} {}", entry.code, entry.short);
            }
            ExitCode::FAILURE
        }
    }
}
