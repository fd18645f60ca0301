use tracing::debug;

use crate::ast::*;
use crate::code::{Bytecode, Instructions, Opcode, make};
use crate::object::Object;
use crate::parser::{STACK_GROW_SIZE, STACK_RED_ZONE};

pub mod symbol_table;
pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

/// Largest constant pool an `OpConstant` operand can address.
pub const MAX_CONSTANTS: usize = u16::MAX as usize + 1;
/// Largest number of globals an `OpGetGlobal`/`OpSetGlobal` operand can address.
pub const MAX_GLOBALS: usize = u16::MAX as usize + 1;
const MAX_ARRAY_LEN: usize = u16::MAX as usize;
const MAX_CALL_ARGS: usize = u8::MAX as usize;

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String, span: Span },
    #[error("{kind} is not supported by the bytecode compiler")]
    UnsupportedNode { kind: &'static str, span: Span },
    #[error("unknown operator: {operator}")]
    UnknownOperator { operator: String, span: Span },
    #[error("too many constants: the pool holds at most {limit}")]
    ConstantPoolOverflow { limit: usize, span: Span },
    #[error("too many {what}: {count} exceeds the limit of {limit}")]
    OperandOverflow { what: &'static str, count: usize, limit: usize, span: Span },
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::UndefinedVariable { span, .. }
            | CompileError::UnsupportedNode { span, .. }
            | CompileError::UnknownOperator { span, .. }
            | CompileError::ConstantPoolOverflow { span, .. }
            | CompileError::OperandOverflow { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UndefinedVariable { .. } => "K-C001",
            CompileError::UnsupportedNode { .. } => "K-C002",
            CompileError::UnknownOperator { .. } => "K-C003",
            CompileError::ConstantPoolOverflow { .. } => "K-C004",
            CompileError::OperandOverflow { .. } => "K-C005",
        }
    }
}

type Result<T> = std::result::Result<T, CompileError>;

// ── Compiler ─────────────────────────────────────────────────────────

/// Lowers a program to one instruction stream plus a constant pool.
///
/// A compiler can be seeded with the symbol table and constants of an
/// earlier compile (see [`Compiler::new_with_state`]) so that successive
/// REPL inputs keep referring to the same globals and constant indices.
pub struct Compiler {
    instructions: Instructions,
    constants: Vec<Object>,
    symbols: SymbolTable,
    /// Span of the statement being compiled, attached to errors.
    span: Span,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::new_with_state(SymbolTable::with_builtins(), Vec::new())
    }

    pub fn new_with_state(symbols: SymbolTable, constants: Vec<Object>) -> Self {
        Compiler {
            instructions: Instructions::new(),
            constants,
            symbols,
            span: Span::UNKNOWN,
        }
    }

    pub fn compile(&mut self, program: &Program) -> Result<()> {
        for stmt in &program.statements {
            self.compile_stmt(stmt)?;
        }
        debug!(
            statements = program.statements.len(),
            instructions = self.instructions.len(),
            constants = self.constants.len(),
            globals = self.symbols.num_globals(),
            "compiled program"
        );
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    pub fn into_bytecode(self) -> Bytecode {
        Bytecode {
            instructions: self.instructions,
            constants: self.constants,
        }
    }

    /// The symbol table and constant pool to seed the next compile with.
    pub fn into_state(self) -> (SymbolTable, Vec<Object>) {
        (self.symbols, self.constants)
    }

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        self.span = stmt.span();
        match stmt {
            Stmt::Let { name, value, .. } => {
                self.compile_expr(value)?;
                let symbol = self.symbols.define(name);
                if symbol.index >= MAX_GLOBALS {
                    return Err(self.overflow("globals", symbol.index + 1, MAX_GLOBALS));
                }
                self.emit(Opcode::SetGlobal, &[symbol.index]);
            }
            Stmt::Expr { expr, .. } => {
                self.compile_expr(expr)?;
                self.emit(Opcode::Pop, &[]);
            }
        }
        Ok(())
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<()> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.compile_expr_inner(expr))
    }

    fn compile_expr_inner(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Integer(n) => {
                let index = self.add_constant(Object::Integer(*n))?;
                self.emit(Opcode::Constant, &[index]);
            }

            Expr::Str(s) => {
                let index = self.add_constant(Object::string(s.as_str()))?;
                self.emit(Opcode::Constant, &[index]);
            }

            Expr::Boolean(true) => {
                self.emit(Opcode::True, &[]);
            }

            Expr::Boolean(false) => {
                self.emit(Opcode::False, &[]);
            }

            Expr::Ident(name) => {
                let symbol = self.symbols.resolve(name).cloned().ok_or_else(|| {
                    CompileError::UndefinedVariable { name: name.clone(), span: self.span }
                })?;
                match symbol.scope {
                    SymbolScope::Global => self.emit(Opcode::GetGlobal, &[symbol.index]),
                    SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[symbol.index]),
                };
            }

            Expr::Prefix { op, right } => {
                self.compile_expr(right)?;
                match op {
                    PrefixOp::Not => self.emit(Opcode::Bang, &[]),
                    PrefixOp::Negate => self.emit(Opcode::Minus, &[]),
                };
            }

            // `a < b` is `b > a`: operands are pushed in swapped order
            Expr::Infix { op: InfixOp::LessThan, left, right } => {
                self.compile_expr(right)?;
                self.compile_expr(left)?;
                self.emit(Opcode::GreaterThan, &[]);
            }

            Expr::Infix { op, left, right } => {
                let opcode = self.infix_opcode(*op)?;
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(opcode, &[]);
            }

            Expr::Array(items) => {
                if items.len() > MAX_ARRAY_LEN {
                    return Err(self.overflow("array elements", items.len(), MAX_ARRAY_LEN));
                }
                for item in items {
                    self.compile_expr(item)?;
                }
                self.emit(Opcode::Array, &[items.len()]);
            }

            Expr::Call { function, args } => {
                if args.len() > MAX_CALL_ARGS {
                    return Err(self.overflow("call arguments", args.len(), MAX_CALL_ARGS));
                }
                self.compile_expr(function)?;
                for arg in args {
                    self.compile_expr(arg)?;
                }
                self.emit(Opcode::Call, &[args.len()]);
            }

            Expr::Index { .. } | Expr::If { .. } => {
                return Err(CompileError::UnsupportedNode { kind: expr.kind(), span: self.span });
            }
        }
        Ok(())
    }

    fn infix_opcode(&self, op: InfixOp) -> Result<Opcode> {
        match op {
            InfixOp::Add => Ok(Opcode::Add),
            InfixOp::Subtract => Ok(Opcode::Sub),
            InfixOp::Multiply => Ok(Opcode::Mul),
            InfixOp::Divide => Ok(Opcode::Div),
            InfixOp::Equals => Ok(Opcode::Equal),
            InfixOp::NotEquals => Ok(Opcode::NotEqual),
            InfixOp::GreaterThan => Ok(Opcode::GreaterThan),
            InfixOp::LessThan | InfixOp::Modulo => Err(CompileError::UnknownOperator {
                operator: op.to_string(),
                span: self.span,
            }),
        }
    }

    fn add_constant(&mut self, value: Object) -> Result<usize> {
        if self.constants.len() >= MAX_CONSTANTS {
            return Err(CompileError::ConstantPoolOverflow { limit: MAX_CONSTANTS, span: self.span });
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    fn emit(&mut self, op: Opcode, operands: &[usize]) -> usize {
        self.instructions.push(&make(op, operands))
    }

    fn overflow(&self, what: &'static str, count: usize, limit: usize) -> CompileError {
        CompileError::OperandOverflow { what, count, limit, span: self.span }
    }
}

/// Compile a whole program with a fresh symbol table.
pub fn compile(program: &Program) -> Result<Bytecode> {
    let mut compiler = Compiler::new();
    compiler.compile(program)?;
    Ok(compiler.into_bytecode())
}

// ── Tests ────────────────────────────────────────────────────────────
