use std::fmt;

use crate::object::Object;

// ── Opcodes ──────────────────────────────────────────────────────────
//
// One opcode byte followed by fixed-width big-endian operands. The width
// of each operand is a property of the opcode alone (see `definition`).

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Constant = 0,
    Add,
    Sub,
    Mul,
    Div,
    True,
    False,
    Equal,
    NotEqual,
    GreaterThan,
    Minus,
    Bang,
    Pop,
    Null,
    Array,
    GetGlobal,
    SetGlobal,
    GetBuiltin,
    Call,
}

/// Indexed by opcode byte.
const OPCODES: [Opcode; 19] = [
    Opcode::Constant,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::True,
    Opcode::False,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::Minus,
    Opcode::Bang,
    Opcode::Pop,
    Opcode::Null,
    Opcode::Array,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::GetBuiltin,
    Opcode::Call,
];

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        OPCODES.get(byte as usize).copied().ok_or(byte)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    const fn new(name: &'static str, operand_widths: &'static [usize]) -> Self {
        Definition { name, operand_widths }
    }

    /// Opcode byte plus all operand bytes.
    pub fn instruction_len(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

impl Opcode {
    pub fn definition(self) -> Definition {
        match self {
            Opcode::Constant => Definition::new("OpConstant", &[2]),
            Opcode::Add => Definition::new("OpAdd", &[]),
            Opcode::Sub => Definition::new("OpSub", &[]),
            Opcode::Mul => Definition::new("OpMul", &[]),
            Opcode::Div => Definition::new("OpDiv", &[]),
            Opcode::True => Definition::new("OpTrue", &[]),
            Opcode::False => Definition::new("OpFalse", &[]),
            Opcode::Equal => Definition::new("OpEqual", &[]),
            Opcode::NotEqual => Definition::new("OpNotEqual", &[]),
            Opcode::GreaterThan => Definition::new("OpGreaterThan", &[]),
            Opcode::Minus => Definition::new("OpMinus", &[]),
            Opcode::Bang => Definition::new("OpBang", &[]),
            Opcode::Pop => Definition::new("OpPop", &[]),
            Opcode::Null => Definition::new("OpNull", &[]),
            Opcode::Array => Definition::new("OpArray", &[2]),
            Opcode::GetGlobal => Definition::new("OpGetGlobal", &[2]),
            Opcode::SetGlobal => Definition::new("OpSetGlobal", &[2]),
            Opcode::GetBuiltin => Definition::new("OpGetBuiltin", &[1]),
            Opcode::Call => Definition::new("OpCall", &[1]),
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

// ── Encoding ─────────────────────────────────────────────────────────

/// Encode one instruction. Operands must already fit their width; the
/// compiler checks this before emitting.
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let def = op.definition();
    let mut ins = Vec::with_capacity(def.instruction_len());
    ins.push(op as u8);
    for (&operand, &width) in operands.iter().zip(def.operand_widths) {
        match width {
            1 => ins.push(operand as u8),
            2 => ins.extend_from_slice(&(operand as u16).to_be_bytes()),
            other => unreachable!("no opcode has a {other}-byte operand"),
        }
    }
    ins
}

/// Decode the operands of one instruction. `ins` starts at the first operand
/// byte. Returns the operands and the number of bytes consumed.
pub fn read_operands(def: &Definition, ins: &[u8]) -> (Vec<usize>, usize) {
    let mut operands = Vec::with_capacity(def.operand_widths.len());
    let mut offset = 0;
    for &width in def.operand_widths {
        match width {
            1 => operands.push(read_u8(&ins[offset..]) as usize),
            2 => operands.push(read_u16(&ins[offset..]) as usize),
            other => unreachable!("no opcode has a {other}-byte operand"),
        }
        offset += width;
    }
    (operands, offset)
}

#[inline(always)]
pub fn read_u16(ins: &[u8]) -> u16 {
    u16::from_be_bytes([ins[0], ins[1]])
}

#[inline(always)]
pub fn read_u8(ins: &[u8]) -> u8 {
    ins[0]
}

// ── Instruction stream ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instructions(pub Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Instructions(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Append an encoded instruction, returning its starting offset.
    pub fn push(&mut self, ins: &[u8]) -> usize {
        let pos = self.0.len();
        self.0.extend_from_slice(ins);
        pos
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Instructions(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<I: IntoIterator<Item = Vec<u8>>>(iter: I) -> Self {
        Instructions(iter.into_iter().flatten().collect())
    }
}

/// Disassembly, one instruction per line: `0003 OpConstant 1`.
impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut i = 0;
        while i < self.0.len() {
            let op = match Opcode::try_from(self.0[i]) {
                Ok(op) => op,
                Err(byte) => {
                    writeln!(f, "{:04} ERROR: unknown opcode {}", i, byte)?;
                    i += 1;
                    continue;
                }
            };
            let def = op.definition();
            if i + def.instruction_len() > self.0.len() {
                writeln!(f, "{:04} ERROR: truncated {}", i, def.name)?;
                break;
            }
            let (operands, read) = read_operands(&def, &self.0[i + 1..]);
            write!(f, "{:04} {}", i, def.name)?;
            for operand in operands {
                write!(f, " {}", operand)?;
            }
            writeln!(f)?;
            i += 1 + read;
        }
        Ok(())
    }
}

// ── Bytecode unit ────────────────────────────────────────────────────

/// What the compiler hands to the VM: an instruction stream and the
/// constants it refers to by index.
#[derive(Debug, Clone, Default)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instructions)?;
        if !self.constants.is_empty() {
            writeln!(f, "constants:")?;
            for (i, constant) in self.constants.iter().enumerate() {
                writeln!(f, "{:04} {} {}", i, constant.type_name(), constant)?;
            }
        }
        Ok(())
    }
}
