use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::diagnostic::{Diagnostic, ansi::AnsiRenderer, json};
use crate::vm::{STACK_SIZE, VmConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiagnosticFormat {
    /// Human-readable, with source snippets
    Ansi,
    /// One JSON object per line
    Json,
}

/// Flags shared by every mode of the binary.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Number of VM stack slots
    #[arg(long, env = "KILN_STACK_SIZE", default_value_t = STACK_SIZE, value_parser = parse_stack_size)]
    pub stack_size: usize,

    /// How errors are printed
    #[arg(long, value_enum, default_value_t = DiagnosticFormat::Ansi)]
    pub format: DiagnosticFormat,

    /// Disable colored output (also honours NO_COLOR)
    #[arg(long)]
    pub no_color: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// REPL history file
    #[arg(long, env = "KILN_HISTORY", value_name = "PATH")]
    pub history: Option<PathBuf>,
}

fn parse_stack_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("stack size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Runtime settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub stack_size: usize,
    pub format: DiagnosticFormat,
    pub color: bool,
    pub verbosity: u8,
    pub history: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            stack_size: STACK_SIZE,
            format: DiagnosticFormat::Ansi,
            color: false,
            verbosity: 0,
            history: default_history_path(),
        }
    }
}

fn default_history_path() -> PathBuf {
    std::env::temp_dir().join("kiln_history")
}

impl Config {
    pub fn from_args(args: &ConfigArgs) -> Self {
        let no_color_env = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
        Self::resolve(args, no_color_env, std::io::stderr().is_terminal())
    }

    fn resolve(args: &ConfigArgs, no_color_env: bool, is_tty: bool) -> Self {
        Config {
            stack_size: args.stack_size,
            format: args.format,
            color: is_tty && !args.no_color && !no_color_env && args.format == DiagnosticFormat::Ansi,
            verbosity: args.verbose,
            history: args.history.clone().unwrap_or_else(default_history_path),
        }
    }

    pub fn vm_config(&self) -> VmConfig {
        VmConfig { stack_size: self.stack_size }
    }

    /// Render one diagnostic in the configured format, newline-terminated.
    pub fn render(&self, d: &Diagnostic) -> String {
        match self.format {
            DiagnosticFormat::Ansi => AnsiRenderer { use_color: self.color }.render(d),
            DiagnosticFormat::Json => json::render(d) + "\n",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    fn args(argv: &[&str]) -> ConfigArgs {
        let mut full = vec!["kiln"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().config
    }

    #[test]
    fn flags_override_defaults() {
        let a = args(&["--stack-size", "16", "--format", "json", "-vv", "--history", "/tmp/h"]);
        assert_eq!(a.stack_size, 16);
        let c = Config::resolve(&a, false, true);
        assert_eq!(c.vm_config(), VmConfig { stack_size: 16 });
        assert_eq!(c.format, DiagnosticFormat::Json);
        assert_eq!(c.verbosity, 2);
        assert_eq!(c.history, PathBuf::from("/tmp/h"));
    }

    #[test]
    fn zero_stack_size_is_rejected() {
        let mut argv = vec!["kiln", "--stack-size", "0"];
        assert!(TestCli::try_parse_from(argv.clone()).is_err());
        argv[2] = "many";
        assert!(TestCli::try_parse_from(argv.clone()).is_err());
    }

    #[test]
    fn color_needs_a_terminal() {
        let a = args(&["--stack-size", "8"]);
        assert!(Config::resolve(&a, false, true).color);
        assert!(!Config::resolve(&a, false, false).color);
    }

    #[test]
    fn color_can_be_disabled() {
        assert!(!Config::resolve(&args(&["--no-color", "--stack-size", "8"]), false, true).color);
        assert!(!Config::resolve(&args(&["--stack-size", "8"]), true, true).color);
        assert!(!Config::resolve(&args(&["--format", "json", "--stack-size", "8"]), false, true).color);
    }

    #[test]
    fn json_rendering_is_line_terminated() {
        let c = Config { format: DiagnosticFormat::Json, ..Config::default() };
        let out = c.render(&Diagnostic::error("boom").with_code("K-R006"));
        assert!(out.ends_with("}\n"));
        assert_eq!(out.lines().count(), 1);
    }
}
