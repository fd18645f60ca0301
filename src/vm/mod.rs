use tracing::{debug, trace};

use crate::code::{Bytecode, Instructions, Opcode, read_u8, read_u16};
use crate::object::builtins::BUILTINS;
use crate::object::{NULL, Object};

/// Default number of stack slots.
pub const STACK_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    pub stack_size: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig { stack_size: STACK_SIZE }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VmError {
    #[error("stack overflow: the stack holds at most {capacity} values")]
    StackOverflow { capacity: usize },
    #[error("stack underflow: pop from an empty stack")]
    StackUnderflow,
    #[error("unsupported types for {operator}: {left} {right}")]
    UnsupportedTypes { operator: &'static str, left: &'static str, right: &'static str },
    #[error("unsupported type for {operator}: {operand}")]
    UnsupportedType { operator: &'static str, operand: &'static str },
    #[error("unknown operator: {left} {operator} {right}")]
    UnknownOperator { operator: &'static str, left: &'static str, right: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow: {expr}")]
    IntegerOverflow { expr: String },
    #[error("unknown opcode {op} at offset {offset}")]
    UnknownOpcode { op: u8, offset: usize },
    #[error("calling non-function: {type_name}")]
    CallingNonFunction { type_name: &'static str },
}

impl VmError {
    pub fn code(&self) -> &'static str {
        match self {
            VmError::StackOverflow { .. } => "K-R001",
            VmError::StackUnderflow => "K-R002",
            VmError::UnsupportedTypes { .. } => "K-R003",
            VmError::UnsupportedType { .. } => "K-R004",
            VmError::UnknownOperator { .. } => "K-R005",
            VmError::DivisionByZero => "K-R006",
            VmError::IntegerOverflow { .. } => "K-R007",
            VmError::UnknownOpcode { .. } => "K-R008",
            VmError::CallingNonFunction { .. } => "K-R009",
        }
    }
}

type VmResult<T> = Result<T, VmError>;

fn operator_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        Opcode::GreaterThan => ">",
        Opcode::Minus => "-",
        Opcode::Bang => "!",
        other => other.definition().name,
    }
}

// ── VM ───────────────────────────────────────────────────────────────

/// Stack machine executing one bytecode unit.
///
/// `sp` always names the next free slot. The slot at `sp` keeps the most
/// recently popped value until something is pushed over it;
/// [`Vm::last_popped_stack_elem`] reads it from there. Every slot above `sp`
/// holds `NULL`, so dead values are released as soon as they are popped.
pub struct Vm {
    constants: Vec<Object>,
    instructions: Instructions,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
}

impl Vm {
    pub fn new(bytecode: Bytecode) -> Self {
        Self::with_config(bytecode, VmConfig::default())
    }

    pub fn with_config(bytecode: Bytecode, config: VmConfig) -> Self {
        Vm {
            constants: bytecode.constants,
            instructions: bytecode.instructions,
            stack: vec![NULL; config.stack_size],
            sp: 0,
            globals: Vec::new(),
        }
    }

    /// Start from globals left behind by an earlier run.
    pub fn with_globals(mut self, globals: Vec<Object>) -> Self {
        self.globals = globals;
        self
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn stack_top(&self) -> Option<&Object> {
        self.sp.checked_sub(1).map(|top| &self.stack[top])
    }

    /// The value discarded by the most recent pop. Only meaningful right
    /// after a run whose last instruction was `OpPop`.
    pub fn last_popped_stack_elem(&self) -> Object {
        self.stack.get(self.sp).cloned().unwrap_or(NULL)
    }

    pub fn run(&mut self) -> VmResult<()> {
        let mut ip = 0;
        while ip < self.instructions.len() {
            let byte = self.instructions.as_bytes()[ip];
            let op = Opcode::try_from(byte).map_err(|op| VmError::UnknownOpcode { op, offset: ip })?;
            trace!(ip, %op, sp = self.sp, "dispatch");
            ip += 1;

            match op {
                Opcode::Constant => {
                    let index = read_u16(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 2;
                    let value = self.constants[index].clone();
                    self.push(value)?;
                }

                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => {
                    self.execute_arithmetic(op)?;
                }

                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => {
                    self.execute_comparison(op)?;
                }

                Opcode::True => self.push(Object::from_bool(true))?,
                Opcode::False => self.push(Object::from_bool(false))?,
                Opcode::Null => self.push(NULL)?,

                Opcode::Bang => {
                    let operand = self.pop()?;
                    let negated = match operand {
                        Object::Boolean(b) => !b,
                        Object::Null => true,
                        _ => false,
                    };
                    self.push(Object::from_bool(negated))?;
                }

                Opcode::Minus => match self.pop()? {
                    Object::Integer(n) => {
                        let negated = n.checked_neg().ok_or_else(|| VmError::IntegerOverflow {
                            expr: format!("-({})", n),
                        })?;
                        self.push(Object::Integer(negated))?;
                    }
                    other => {
                        return Err(VmError::UnsupportedType {
                            operator: operator_symbol(op),
                            operand: other.type_name(),
                        });
                    }
                },

                Opcode::Pop => {
                    self.pop()?;
                }

                Opcode::Array => {
                    let count = read_u16(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 2;
                    if count > self.sp {
                        return Err(VmError::StackUnderflow);
                    }
                    let start = self.sp - count;
                    let items = self.stack[start..self.sp].to_vec();
                    self.truncate(start);
                    self.push(Object::array(items))?;
                }

                Opcode::SetGlobal => {
                    let index = read_u16(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 2;
                    let value = self.pop()?;
                    if index >= self.globals.len() {
                        self.globals.resize(index + 1, NULL);
                    }
                    self.globals[index] = value;
                }

                Opcode::GetGlobal => {
                    let index = read_u16(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 2;
                    let value = self.globals.get(index).cloned().unwrap_or(NULL);
                    self.push(value)?;
                }

                Opcode::GetBuiltin => {
                    let index = read_u8(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 1;
                    self.push(Object::Builtin(&BUILTINS[index]))?;
                }

                Opcode::Call => {
                    let argc = read_u8(&self.instructions.as_bytes()[ip..]) as usize;
                    ip += 1;
                    self.execute_call(argc)?;
                }
            }
        }
        debug!(sp = self.sp, globals = self.globals.len(), "run complete");
        Ok(())
    }

    fn push(&mut self, value: Object) -> VmResult<()> {
        if self.sp >= self.stack.len() {
            return Err(VmError::StackOverflow { capacity: self.stack.len() });
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Object> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        if let Some(stale) = self.stack.get_mut(self.sp + 1) {
            *stale = NULL;
        }
        Ok(self.stack[self.sp].clone())
    }

    /// Discard everything from `new_sp` up, including the last popped value.
    fn truncate(&mut self, new_sp: usize) {
        let end = (self.sp + 1).min(self.stack.len());
        self.stack[new_sp..end].fill(NULL);
        self.sp = new_sp;
    }

    fn execute_arithmetic(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let (l, r) = match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => (*l, *r),
            _ => {
                return Err(VmError::UnsupportedTypes {
                    operator: operator_symbol(op),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        };
        let result = match op {
            Opcode::Add => l.checked_add(r),
            Opcode::Sub => l.checked_sub(r),
            Opcode::Mul => l.checked_mul(r),
            Opcode::Div if r == 0 => return Err(VmError::DivisionByZero),
            Opcode::Div => l.checked_div(r),
            other => unreachable!("{other} is not an arithmetic opcode"),
        };
        let value = result.ok_or_else(|| VmError::IntegerOverflow {
            expr: format!("{} {} {}", l, operator_symbol(op), r),
        })?;
        self.push(Object::Integer(value))
    }

    /// Integers compare by value. Anything else supports only `==`/`!=`,
    /// which compare identity.
    fn execute_comparison(&mut self, op: Opcode) -> VmResult<()> {
        let right = self.pop()?;
        let left = self.pop()?;
        let result = match (&left, &right, op) {
            (Object::Integer(l), Object::Integer(r), Opcode::Equal) => l == r,
            (Object::Integer(l), Object::Integer(r), Opcode::NotEqual) => l != r,
            (Object::Integer(l), Object::Integer(r), Opcode::GreaterThan) => l > r,
            (_, _, Opcode::Equal) => left.is_identical(&right),
            (_, _, Opcode::NotEqual) => !left.is_identical(&right),
            _ => {
                return Err(VmError::UnknownOperator {
                    operator: operator_symbol(op),
                    left: left.type_name(),
                    right: right.type_name(),
                });
            }
        };
        self.push(Object::from_bool(result))
    }

    /// Stack layout: callee, arg1..argN. The callee and its arguments are
    /// replaced by the result.
    fn execute_call(&mut self, argc: usize) -> VmResult<()> {
        if argc >= self.sp {
            return Err(VmError::StackUnderflow);
        }
        let callee_slot = self.sp - 1 - argc;
        let builtin = match &self.stack[callee_slot] {
            Object::Builtin(builtin) => *builtin,
            other => return Err(VmError::CallingNonFunction { type_name: other.type_name() }),
        };
        let result = (builtin.func)(&self.stack[callee_slot + 1..self.sp]);
        trace!(builtin = builtin.name, argc, error = result.is_error(), "builtin call");
        self.truncate(callee_slot);
        self.push(result)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::make;
    use crate::compiler;
    use crate::lexer;
    use crate::object::{FALSE, TRUE};
    use crate::parser;

    fn compile_source(source: &str) -> Bytecode {
        let (program, errors) = parser::parse(lexer::lex(source).unwrap());
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        compiler::compile(&program).unwrap()
    }

    fn run_vm(source: &str) -> Result<Vm, VmError> {
        let mut vm = Vm::new(compile_source(source));
        vm.run()?;
        Ok(vm)
    }

    fn vm_eval(source: &str) -> Object {
        run_vm(source).unwrap().last_popped_stack_elem()
    }

    fn vm_err(source: &str) -> VmError {
        match run_vm(source) {
            Ok(vm) => panic!("expected error for {source:?}, got {}", vm.last_popped_stack_elem()),
            Err(e) => e,
        }
    }

    fn run_bytecode(instructions: Vec<Vec<u8>>) -> Result<Vm, VmError> {
        let bytecode = Bytecode {
            instructions: instructions.into_iter().collect(),
            constants: Vec::new(),
        };
        let mut vm = Vm::new(bytecode);
        vm.run()?;
        Ok(vm)
    }

    #[test]
    fn integer_literals() {
        for n in [0, 1, 42, 9_223_372_036_854_775_807] {
            assert_eq!(vm_eval(&format!("{n};")), Object::Integer(n));
        }
    }

    #[test]
    fn arithmetic_matches_native() {
        let pairs = [(1, 2), (10, 3), (-7, 2), (7, -2), (0, 5), (123456, 789)];
        for (a, b) in pairs {
            assert_eq!(vm_eval(&format!("{a} + {b}")), Object::Integer(a + b));
            assert_eq!(vm_eval(&format!("{a} - {b}")), Object::Integer(a - b));
            assert_eq!(vm_eval(&format!("{a} * {b}")), Object::Integer(a * b));
            assert_eq!(vm_eval(&format!("{a} / {b}")), Object::Integer(a / b));
        }
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(vm_eval("2 * (5 + 10)"), Object::Integer(30));
        assert_eq!(vm_eval("5 + 2 * 10"), Object::Integer(25));
        assert_eq!(vm_eval("-50 + 100 + -50"), Object::Integer(0));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(vm_err("1 / 0"), VmError::DivisionByZero);
        assert_eq!(VmError::DivisionByZero.code(), "K-R006");
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(matches!(vm_err("9223372036854775807 + 1"), VmError::IntegerOverflow { .. }));
        assert!(matches!(vm_err("9223372036854775807 * 2"), VmError::IntegerOverflow { .. }));
        let min = "let m = -9223372036854775807 - 1;";
        assert!(matches!(vm_err(&format!("{min} m / -1")), VmError::IntegerOverflow { .. }));
        assert!(matches!(vm_err(&format!("{min} -m")), VmError::IntegerOverflow { .. }));
    }

    #[test]
    fn boolean_equality_uses_singletons() {
        for a in [true, false] {
            for b in [true, false] {
                assert!(vm_eval(&format!("{a} == {b}")).is_identical(&Object::from_bool(a == b)));
                assert!(vm_eval(&format!("{a} != {b}")).is_identical(&Object::from_bool(a != b)));
            }
        }
    }

    #[test]
    fn integer_comparisons() {
        assert!(vm_eval("1 < 2").is_identical(&TRUE));
        assert!(vm_eval("2 < 1").is_identical(&FALSE));
        assert!(vm_eval("2 > 1").is_identical(&TRUE));
        assert!(vm_eval("1 == 1").is_identical(&TRUE));
        assert!(vm_eval("1 != 1").is_identical(&FALSE));
        assert!(vm_eval("(1 < 2) == true").is_identical(&TRUE));
    }

    #[test]
    fn bang_negates_truthiness() {
        assert!(vm_eval("!true").is_identical(&FALSE));
        assert!(vm_eval("!false").is_identical(&TRUE));
        assert!(vm_eval("!5").is_identical(&FALSE));
        assert!(vm_eval("!!5").is_identical(&TRUE));
        let vm = run_bytecode(vec![make(Opcode::Null, &[]), make(Opcode::Bang, &[]), make(Opcode::Pop, &[])]).unwrap();
        assert!(vm.last_popped_stack_elem().is_identical(&TRUE));
    }

    #[test]
    fn minus_requires_integer() {
        assert_eq!(vm_eval("-5"), Object::Integer(-5));
        assert_eq!(vm_eval("--5"), Object::Integer(5));
        let err = vm_err("-true");
        assert_eq!(err, VmError::UnsupportedType { operator: "-", operand: "BOOLEAN" });
        assert_eq!(err.code(), "K-R004");
    }

    #[test]
    fn binary_ops_require_integers() {
        let err = vm_err(r#""a" + "b""#);
        assert_eq!(err, VmError::UnsupportedTypes { operator: "+", left: "STRING", right: "STRING" });
        assert_eq!(err.to_string(), "unsupported types for +: STRING STRING");
        assert!(matches!(vm_err("1 * true"), VmError::UnsupportedTypes { left: "INTEGER", right: "BOOLEAN", .. }));
    }

    #[test]
    fn greater_than_on_booleans_is_unknown_operator() {
        let err = vm_err("true > false");
        assert_eq!(err, VmError::UnknownOperator { operator: ">", left: "BOOLEAN", right: "BOOLEAN" });
        assert_eq!(err.to_string(), "unknown operator: BOOLEAN > BOOLEAN");
    }

    #[test]
    fn non_integer_equality_falls_back_to_identity() {
        assert!(vm_eval(r#""a" == "a""#).is_identical(&FALSE));
        assert!(vm_eval(r#"let s = "a"; s == s"#).is_identical(&TRUE));
        assert!(vm_eval("[1] == [1]").is_identical(&FALSE));
        assert!(vm_eval("let a = [1]; a != a").is_identical(&FALSE));
        assert!(vm_eval("1 == true").is_identical(&FALSE));
    }

    #[test]
    fn stack_is_empty_after_statements() {
        let vm = run_vm("1; 2; 3 + 4;").unwrap();
        assert_eq!(vm.sp(), 0);
        assert!(vm.stack_top().is_none());
        assert_eq!(vm.last_popped_stack_elem(), Object::Integer(7));
    }

    #[test]
    fn string_and_array_values() {
        assert_eq!(vm_eval(r#""kiln""#), Object::string("kiln"));
        assert_eq!(vm_eval("[1, 2 * 3, 4 + 5]").to_string(), "[1, 6, 9]");
        assert_eq!(vm_eval("[]").to_string(), "[]");
    }

    #[test]
    fn globals() {
        assert_eq!(vm_eval("let one = 1; one"), Object::Integer(1));
        assert_eq!(vm_eval("let one = 1; let two = one + one; one + two"), Object::Integer(3));
        assert_eq!(vm_eval("let a = 1; let a = a + 10; a"), Object::Integer(11));
    }

    #[test]
    fn globals_carry_over_between_runs() {
        let mut first = compiler::Compiler::new();
        let (program, _) = parser::parse(lexer::lex("let x = 40;").unwrap());
        first.compile(&program).unwrap();
        let mut vm = Vm::new(first.bytecode());
        vm.run().unwrap();
        let globals = vm.into_globals();

        let (symbols, constants) = first.into_state();
        let mut second = compiler::Compiler::new_with_state(symbols, constants);
        let (program, _) = parser::parse(lexer::lex("x + 2").unwrap());
        second.compile(&program).unwrap();
        let mut vm = Vm::new(second.bytecode()).with_globals(globals);
        vm.run().unwrap();
        assert_eq!(vm.last_popped_stack_elem(), Object::Integer(42));
    }

    #[test]
    fn builtin_calls() {
        assert_eq!(vm_eval(r#"len("four")"#), Object::Integer(4));
        assert_eq!(vm_eval("len([1, 2, 3])"), Object::Integer(3));
        assert_eq!(vm_eval("first([7, 8])"), Object::Integer(7));
        assert_eq!(vm_eval("last([7, 8])"), Object::Integer(8));
        assert_eq!(vm_eval("rest([7, 8, 9])").to_string(), "[8, 9]");
        assert_eq!(vm_eval("pop([7, 8, 9])").to_string(), "[7, 8]");
        assert!(vm_eval("print()").is_identical(&NULL));
    }

    #[test]
    fn push_leaves_original_unchanged() {
        assert_eq!(vm_eval("push([1, 2], 3)").to_string(), "[1, 2, 3]");
        assert_eq!(vm_eval("let a = [1, 2]; let b = push(a, 3); a").to_string(), "[1, 2]");
        assert_eq!(vm_eval("let a = [1, 2]; let b = push(a, 3); b").to_string(), "[1, 2, 3]");
    }

    #[test]
    fn empty_and_single_element_edges() {
        assert!(vm_eval("first([])").is_identical(&NULL));
        assert!(vm_eval("last([])").is_identical(&NULL));
        assert!(vm_eval("rest([])").is_identical(&NULL));
        assert!(vm_eval("pop([1])").is_identical(&NULL));
        assert!(vm_eval("pop([])").is_identical(&NULL));
    }

    #[test]
    fn string_join() {
        assert_eq!(vm_eval(r#"string_join(["a", "b", "c"], "-")"#), Object::string("a-b-c"));
        assert!(vm_eval(r#"string_join([], "-")"#).is_identical(&NULL));
    }

    #[test]
    fn builtin_errors_are_values() {
        let result = vm_eval("len(1)");
        assert!(result.is_error());
        assert_eq!(result.to_string(), "ERROR: argument to `len` not supported, got INTEGER");
        let result = vm_eval("first(1, 2)");
        assert_eq!(result.to_string(), "ERROR: wrong number of arguments. got=2, want=1");
    }

    #[test]
    fn builtins_are_first_class() {
        assert_eq!(vm_eval("let size = len; size([1, 2])"), Object::Integer(2));
        assert_eq!(vm_eval("len").to_string(), "builtin function");
    }

    #[test]
    fn calling_non_function() {
        let err = vm_err("let x = 5; x(1)");
        assert_eq!(err, VmError::CallingNonFunction { type_name: "INTEGER" });
        assert_eq!(err.code(), "K-R009");
    }

    #[test]
    fn stack_overflow_at_default_capacity() {
        let items = vec!["1"; STACK_SIZE + 1].join(", ");
        let err = vm_err(&format!("[{items}]"));
        assert_eq!(err, VmError::StackOverflow { capacity: STACK_SIZE });

        let items = vec!["1"; STACK_SIZE].join(", ");
        match vm_eval(&format!("[{items}]")) {
            Object::Array(items) => assert_eq!(items.len(), STACK_SIZE),
            other => panic!("expected array, got {other}"),
        }
    }

    #[test]
    fn stack_overflow_with_small_stack() {
        let config = VmConfig { stack_size: 2 };
        let mut vm = Vm::with_config(compile_source("1 + (2 + 3)"), config);
        assert_eq!(vm.run().unwrap_err(), VmError::StackOverflow { capacity: 2 });

        let mut vm = Vm::with_config(compile_source("1 + 2"), config);
        vm.run().unwrap();
        assert_eq!(vm.last_popped_stack_elem(), Object::Integer(3));
    }

    fn nested_sum(depth: usize) -> String {
        format!("{}1{}", "1 + (".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn stack_overflow_from_nesting() {
        assert_eq!(vm_eval(&nested_sum(2000)), Object::Integer(2001));
        let err = vm_err(&nested_sum(STACK_SIZE + 50));
        assert_eq!(err, VmError::StackOverflow { capacity: STACK_SIZE });
    }

    #[test]
    fn popped_values_are_released() {
        let vm = run_vm(r#"[1, 2, 3]; string_join(["a", "b"], "-"); let x = [4]; len(x) + 1"#).unwrap();
        assert_eq!(vm.last_popped_stack_elem(), Object::Integer(2));
        assert!(
            vm.stack[vm.sp + 1..].iter().all(|slot| matches!(slot, Object::Null)),
            "stale values above sp"
        );
        match &vm.globals[0] {
            Object::Array(items) => assert_eq!(std::rc::Rc::strong_count(items), 1),
            other => panic!("expected array, got {other}"),
        }
    }

    #[test]
    fn pop_on_empty_stack_is_underflow() {
        let err = run_bytecode(vec![make(Opcode::Pop, &[])]).err().unwrap();
        assert_eq!(err, VmError::StackUnderflow);
        assert_eq!(err.code(), "K-R002");
        let err = run_bytecode(vec![make(Opcode::True, &[]), make(Opcode::Add, &[])]).err().unwrap();
        assert_eq!(err, VmError::StackUnderflow);
    }

    #[test]
    fn unknown_opcode() {
        let bytecode = Bytecode {
            instructions: Instructions::from(vec![Opcode::True as u8, 0xFE]),
            constants: Vec::new(),
        };
        let mut vm = Vm::new(bytecode);
        assert_eq!(vm.run().unwrap_err(), VmError::UnknownOpcode { op: 0xFE, offset: 1 });
    }

    #[test]
    fn last_popped_is_null_before_any_run() {
        let vm = Vm::new(Bytecode::default());
        assert!(vm.last_popped_stack_elem().is_identical(&NULL));
    }
}
