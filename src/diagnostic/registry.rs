/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,
    pub long: &'static str, // full explanation for --explain
}

/// All stable error codes kiln reports.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Lexer ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "K-L001",
        short: "unrecognised input",
        long: r#"## K-L001: unrecognised input

The lexer met text that is not part of kiln: a stray character, a
string literal with no closing quote, or an integer literal too large
for a signed 64-bit integer.

**Example:**

    let x = 1 & 2;

kiln has no `&` operator.
"#,
    },

    // ── Parser ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "K-P001",
        short: "expected an expression",
        long: r#"## K-P001: expected an expression

A token appeared where an expression had to start.

**Example:**

    let x = );
"#,
    },
    ErrorEntry {
        code: "K-P002",
        short: "input ended inside an expression",
        long: r#"## K-P002: input ended inside an expression

The source ended where an expression was still expected, usually
after a trailing operator.

**Example:**

    1 +
"#,
    },
    ErrorEntry {
        code: "K-P003",
        short: "unexpected token",
        long: r#"## K-P003: unexpected token

A specific token was required (for example `=` after `let x`, or a
closing `)`), but a different one was found.

**Example:**

    let x 5;

**Fix:**

    let x = 5;
"#,
    },
    ErrorEntry {
        code: "K-P004",
        short: "unclosed construct",
        long: r#"## K-P004: unclosed construct

The input ended before a required token such as `]`, `)` or `}`.

**Example:**

    [1, 2
"#,
    },
    ErrorEntry {
        code: "K-P005",
        short: "expected identifier",
        long: r#"## K-P005: expected identifier

`let` must be followed by a name made of letters, digits and `_`,
not starting with a digit.

**Example:**

    let 1 = 2;
"#,
    },
    ErrorEntry {
        code: "K-P006",
        short: "expression nested too deeply",
        long: r#"## K-P006: expression nested too deeply

The parser accepts at most 10000 levels of nested expressions
(parentheses, operands, array elements and call arguments each add a
level). Bind intermediate results with `let` to flatten the expression.

**Example:**

    let x = ((((...1...))));   // with 10000 or more `(`
"#,
    },

    // ── Compiler ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "K-C001",
        short: "undefined variable",
        long: r#"## K-C001: undefined variable

A name was used that is neither a global bound with `let` nor a
builtin. A `let` binding is only visible after its own statement, so
`let x = x;` fails for a fresh `x`.

**Example:**

    let total = count + 1;
"#,
    },
    ErrorEntry {
        code: "K-C002",
        short: "unsupported expression",
        long: r#"## K-C002: unsupported expression

The parser accepts index expressions (`a[0]`) and `if` expressions,
but the bytecode compiler has no lowering for them yet.
"#,
    },
    ErrorEntry {
        code: "K-C003",
        short: "operator has no opcode",
        long: r#"## K-C003: operator has no opcode

The operator parses but no instruction implements it. `%` is the
only such operator today.
"#,
    },
    ErrorEntry {
        code: "K-C004",
        short: "constant pool full",
        long: r#"## K-C004: constant pool full

Constants are addressed by a 16-bit operand, so one session can hold
at most 65536 integer and string literals. Each literal occurrence
takes its own slot. Start a new session to reset the pool.
"#,
    },
    ErrorEntry {
        code: "K-C005",
        short: "operand out of range",
        long: r#"## K-C005: operand out of range

An instruction operand would not fit its encoding: an array literal
with more than 65535 elements, a call with more than 255 arguments,
or more than 65536 globals.
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "K-R001",
        short: "stack overflow",
        long: r#"## K-R001: stack overflow

The program needed more stack slots than the VM has. Very large array
literals and deeply nested expressions push one slot per pending
value.

Raise the limit with `--stack-size N` or `KILN_STACK_SIZE=N`
(default 2048).
"#,
    },
    ErrorEntry {
        code: "K-R002",
        short: "stack underflow",
        long: r#"## K-R002: stack underflow

An instruction tried to pop from an empty stack. Compiled programs
never do this; it indicates malformed bytecode.
"#,
    },
    ErrorEntry {
        code: "K-R003",
        short: "unsupported operand types",
        long: r#"## K-R003: unsupported operand types

`+ - * /` only work on integers.

**Example:**

    "a" + "b"
"#,
    },
    ErrorEntry {
        code: "K-R004",
        short: "unsupported operand type",
        long: r#"## K-R004: unsupported operand type

Prefix `-` only works on integers.

**Example:**

    -true
"#,
    },
    ErrorEntry {
        code: "K-R005",
        short: "unknown operator for operand types",
        long: r#"## K-R005: unknown operator for operand types

`>` and `<` compare integers only. `==` and `!=` accept any values;
for non-integers they compare identity, so two separately written
string literals are never equal.

**Example:**

    true > false
"#,
    },
    ErrorEntry {
        code: "K-R006",
        short: "division by zero",
        long: r#"## K-R006: division by zero

The right operand of `/` was zero.
"#,
    },
    ErrorEntry {
        code: "K-R007",
        short: "integer overflow",
        long: r#"## K-R007: integer overflow

An arithmetic result did not fit in a signed 64-bit integer. This
includes negating, or dividing by -1, the smallest integer.
"#,
    },
    ErrorEntry {
        code: "K-R008",
        short: "unknown opcode",
        long: r#"## K-R008: unknown opcode

The VM found a byte that is not a kiln opcode. This indicates a
compiler bug, not a user error.
"#,
    },
    ErrorEntry {
        code: "K-R009",
        short: "calling a non-function",
        long: r#"## K-R009: calling a non-function

Only builtins can be called.

**Example:**

    let x = 5; x(1)
"#,
    },
];

/// Look up an error entry by code (e.g. `"K-R001"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}
