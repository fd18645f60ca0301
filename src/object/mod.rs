use std::fmt;
use std::rc::Rc;

use crate::code::Instructions;

pub mod builtins;
pub use builtins::Builtin;

/// A runtime value. Heap-backed variants share their payload through `Rc`,
/// so cloning an `Object` never copies a string or an array, and two clones
/// are identical in the sense of [`Object::is_identical`].
#[derive(Debug, Clone)]
pub enum Object {
    Integer(i64),
    Boolean(bool),
    String(Rc<str>),
    Array(Rc<[Object]>),
    Null,
    /// Language-level error value produced by builtins. Not a host error.
    Error(Rc<str>),
    Builtin(&'static Builtin),
    CompiledFunction(Rc<CompiledFunction>),
}

/// The only `true` the VM ever produces.
pub const TRUE: Object = Object::Boolean(true);
/// The only `false` the VM ever produces.
pub const FALSE: Object = Object::Boolean(false);
pub const NULL: Object = Object::Null;

/// A function body lowered to its own instruction stream.
#[derive(Debug)]
pub struct CompiledFunction {
    pub instructions: Instructions,
    pub num_locals: usize,
}

impl Object {
    pub fn from_bool(value: bool) -> Object {
        if value { TRUE } else { FALSE }
    }

    pub fn string(value: impl Into<Rc<str>>) -> Object {
        Object::String(value.into())
    }

    pub fn array(items: Vec<Object>) -> Object {
        Object::Array(items.into())
    }

    pub fn error(message: impl Into<Rc<str>>) -> Object {
        Object::Error(message.into())
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Integer(_) => "INTEGER",
            Object::Boolean(_) => "BOOLEAN",
            Object::String(_) => "STRING",
            Object::Array(_) => "ARRAY",
            Object::Null => "NULL",
            Object::Error(_) => "ERROR",
            Object::Builtin(_) => "BUILTIN",
            Object::CompiledFunction(_) => "COMPILED_FUNCTION",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Object::Error(_))
    }

    /// Identity comparison. Integers compare by value and booleans/null by
    /// singleton; every heap-backed value is identical only to clones of
    /// itself, so two separately built strings with equal text are not
    /// identical.
    pub fn is_identical(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Null, Object::Null) => true,
            (Object::String(a), Object::String(b)) => Rc::ptr_eq(a, b),
            (Object::Array(a), Object::Array(b)) => Rc::ptr_eq(a, b),
            (Object::Error(a), Object::Error(b)) => Rc::ptr_eq(a, b),
            (Object::Builtin(a), Object::Builtin(b)) => std::ptr::eq(*a, *b),
            (Object::CompiledFunction(a), Object::CompiledFunction(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Integers and strings compare by value, booleans and null by singleton.
/// Everything else falls back to identity.
impl PartialEq for Object {
    fn eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::String(a), Object::String(b)) => a == b,
            _ => self.is_identical(other),
        }
    }
}

impl From<i64> for Object {
    fn from(value: i64) -> Self {
        Object::Integer(value)
    }
}

impl From<bool> for Object {
    fn from(value: bool) -> Self {
        Object::from_bool(value)
    }
}

impl From<&str> for Object {
    fn from(value: &str) -> Self {
        Object::string(value)
    }
}

/// Rendering shown by the REPL and the CLI.
impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Integer(n) => write!(f, "{}", n),
            Object::Boolean(b) => write!(f, "{}", b),
            Object::String(s) => write!(f, "{}", s),
            Object::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Object::Null => write!(f, "null"),
            Object::Error(message) => write!(f, "ERROR: {}", message),
            Object::Builtin(_) => write!(f, "builtin function"),
            Object::CompiledFunction(_) => write!(f, "compiled function"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_come_from_singletons() {
        assert!(Object::from_bool(true).is_identical(&TRUE));
        assert!(Object::from_bool(false).is_identical(&FALSE));
        assert!(!TRUE.is_identical(&FALSE));
    }

    #[test]
    fn integers_compare_by_value() {
        assert_eq!(Object::Integer(7), Object::Integer(7));
        assert!(Object::Integer(7).is_identical(&Object::Integer(7)));
        assert_ne!(Object::Integer(7), Object::Integer(8));
    }

    #[test]
    fn strings_equal_by_value_but_identical_only_when_shared() {
        let a = Object::string("hi");
        let b = Object::string("hi");
        assert_eq!(a, b);
        assert!(!a.is_identical(&b));
        assert!(a.is_identical(&a.clone()));
    }

    #[test]
    fn arrays_compare_by_identity() {
        let a = Object::array(vec![Object::Integer(1)]);
        let b = Object::array(vec![Object::Integer(1)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn mixed_variants_never_equal() {
        assert_ne!(Object::Integer(1), TRUE);
        assert_ne!(NULL, FALSE);
        assert_ne!(Object::string("1"), Object::Integer(1));
    }

    #[test]
    fn type_names() {
        assert_eq!(Object::Integer(1).type_name(), "INTEGER");
        assert_eq!(TRUE.type_name(), "BOOLEAN");
        assert_eq!(Object::string("").type_name(), "STRING");
        assert_eq!(Object::array(vec![]).type_name(), "ARRAY");
        assert_eq!(NULL.type_name(), "NULL");
        assert_eq!(Object::error("x").type_name(), "ERROR");
        let f = CompiledFunction { instructions: Instructions::default(), num_locals: 0 };
        assert_eq!(Object::CompiledFunction(Rc::new(f)).type_name(), "COMPILED_FUNCTION");
    }

    #[test]
    fn inspect_rendering() {
        let nested = Object::array(vec![
            Object::Integer(1),
            Object::string("two"),
            Object::array(vec![TRUE, NULL]),
        ]);
        assert_eq!(nested.to_string(), "[1, two, [true, null]]");
        assert_eq!(Object::Integer(-3).to_string(), "-3");
        assert_eq!(Object::error("boom").to_string(), "ERROR: boom");
        assert_eq!(Object::array(vec![]).to_string(), "[]");
    }

    #[test]
    fn builtin_inspect_and_identity() {
        let len = builtins::lookup("len").unwrap();
        let a = Object::Builtin(len);
        let b = Object::Builtin(builtins::lookup("len").unwrap());
        assert!(a.is_identical(&b));
        assert_eq!(a.to_string(), "builtin function");
        assert_eq!(a.type_name(), "BUILTIN");
    }

    #[test]
    fn conversions() {
        assert_eq!(Object::from(5), Object::Integer(5));
        assert!(Object::from(true).is_identical(&TRUE));
        assert_eq!(Object::from("s"), Object::string("s"));
    }
}
