use tracing::debug;

use crate::ast::{Program, Stmt};
use crate::compiler::{CompileError, Compiler, SymbolTable};
use crate::diagnostic::Diagnostic;
use crate::lexer::{self, LexError};
use crate::object::Object;
use crate::parser::{self, ParseError};
use crate::vm::{Vm, VmConfig, VmError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("{} parse error(s)", .0.len())]
    Parse(Vec<ParseError>),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] VmError),
}

impl Error {
    /// One diagnostic per underlying error, each carrying `source` for
    /// snippet rendering.
    pub fn diagnostics(&self, source: &str) -> Vec<Diagnostic> {
        let diags = match self {
            Error::Lex(e) => vec![Diagnostic::from(e)],
            Error::Parse(errors) => errors.iter().map(Diagnostic::from).collect(),
            Error::Compile(e) => vec![Diagnostic::from(e)],
            Error::Runtime(e) => vec![Diagnostic::from(e)],
        };
        diags.into_iter().map(|d| d.with_source(source)).collect()
    }
}

/// Lex and parse one input, failing on the first lex error or on any
/// parse error.
pub fn parse(source: &str) -> Result<Program, Error> {
    let tokens = lexer::lex(source)?;
    let (mut program, errors) = parser::parse(tokens);
    if !errors.is_empty() {
        return Err(Error::Parse(errors));
    }
    program.source = Some(source.to_string());
    Ok(program)
}

/// Compiler and VM state carried from one input to the next.
///
/// Each call to [`Session::eval`] is all-or-nothing: when any stage fails,
/// the symbol table, constant pool and globals stay exactly as they were.
#[derive(Debug)]
pub struct Session {
    symbols: SymbolTable,
    constants: Vec<Object>,
    globals: Vec<Object>,
    vm_config: VmConfig,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    pub fn with_config(vm_config: VmConfig) -> Self {
        Session {
            symbols: SymbolTable::with_builtins(),
            constants: Vec::new(),
            globals: Vec::new(),
            vm_config,
        }
    }

    /// Run one input. Returns the value of the final statement when it is
    /// an expression statement, `None` when the input ends with `let` or
    /// is empty.
    pub fn eval(&mut self, source: &str) -> Result<Option<Object>, Error> {
        let program = parse(source)?;

        let mut compiler = Compiler::new_with_state(self.symbols.clone(), self.constants.clone());
        compiler.compile(&program)?;
        let bytecode = compiler.bytecode();

        let mut vm = Vm::with_config(bytecode, self.vm_config).with_globals(self.globals.clone());
        if let Err(e) = vm.run() {
            debug!(code = e.code(), "run failed, session state unchanged");
            return Err(e.into());
        }

        let result = match program.statements.last() {
            Some(Stmt::Expr { .. }) => Some(vm.last_popped_stack_elem()),
            _ => None,
        };
        let (symbols, constants) = compiler.into_state();
        self.symbols = symbols;
        self.constants = constants;
        self.globals = vm.into_globals();
        debug!(
            constants = self.constants.len(),
            globals = self.globals.len(),
            "input committed"
        );
        Ok(result)
    }
}
