use std::io::Write;

use tracing::debug;

use super::{NULL, Object};

pub type BuiltinFn = fn(&[Object]) -> Object;

/// A host function callable from kiln code.
#[derive(Debug)]
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// Every builtin, in the order the compiler assigns their indices.
pub static BUILTINS: [Builtin; 8] = [
    Builtin { name: "len", func: len },
    Builtin { name: "first", func: first },
    Builtin { name: "last", func: last },
    Builtin { name: "rest", func: rest },
    Builtin { name: "push", func: push },
    Builtin { name: "pop", func: pop },
    Builtin { name: "print", func: print },
    Builtin { name: "string_join", func: string_join },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

pub fn get(index: usize) -> Option<&'static Builtin> {
    BUILTINS.get(index)
}

fn wrong_arg_count(got: usize, want: usize) -> Object {
    Object::error(format!("wrong number of arguments. got={}, want={}", got, want))
}

fn check_arity(args: &[Object], want: usize) -> Result<(), Object> {
    if args.len() == want { Ok(()) } else { Err(wrong_arg_count(args.len(), want)) }
}

fn array_arg<'a>(name: &str, args: &'a [Object], slot: usize) -> Result<&'a [Object], Object> {
    match &args[slot] {
        Object::Array(items) => Ok(&items[..]),
        other => Err(Object::error(format!(
            "argument[{}] to `{}` must be ARRAY, got {}",
            slot,
            name,
            other.type_name()
        ))),
    }
}

fn len(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match &args[0] {
        Object::Array(items) => Object::Integer(items.len() as i64),
        Object::String(s) => Object::Integer(s.len() as i64),
        other => Object::error(format!("argument to `len` not supported, got {}", other.type_name())),
    }
}

fn first(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("first", args, 0) {
        Ok(items) => items.first().cloned().unwrap_or(NULL),
        Err(e) => e,
    }
}

fn last(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("last", args, 0) {
        Ok(items) => items.last().cloned().unwrap_or(NULL),
        Err(e) => e,
    }
}

fn rest(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("rest", args, 0) {
        Ok([]) => NULL,
        Ok([_, tail @ ..]) => Object::array(tail.to_vec()),
        Err(e) => e,
    }
}

fn push(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 2) {
        return e;
    }
    match array_arg("push", args, 0) {
        Ok(items) => {
            let mut grown = Vec::with_capacity(items.len() + 1);
            grown.extend_from_slice(items);
            grown.push(args[1].clone());
            Object::array(grown)
        }
        Err(e) => e,
    }
}

/// Drops the last element. Arrays of zero or one element both give null.
fn pop(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 1) {
        return e;
    }
    match array_arg("pop", args, 0) {
        Ok(items) if items.len() > 1 => Object::array(items[..items.len() - 1].to_vec()),
        Ok(_) => NULL,
        Err(e) => e,
    }
}

fn print(args: &[Object]) -> Object {
    print_to(&mut std::io::stdout().lock(), args)
}

/// One line per argument. A failed write (closed pipe) ends the output
/// but not the program.
fn print_to(out: &mut impl Write, args: &[Object]) -> Object {
    for arg in args {
        if let Err(e) = writeln!(out, "{arg}") {
            debug!(error = %e, "print output dropped");
            break;
        }
    }
    NULL
}

fn string_join(args: &[Object]) -> Object {
    if let Err(e) = check_arity(args, 2) {
        return e;
    }
    let items = match array_arg("string_join", args, 0) {
        Ok(items) => items,
        Err(e) => return e,
    };
    let sep = match &args[1] {
        Object::String(s) => &s[..],
        other => {
            return Object::error(format!(
                "argument[1] to `string_join` must be STRING, got {}",
                other.type_name()
            ));
        }
    };
    if items.is_empty() {
        return NULL;
    }

    let mut parts: Vec<&str> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Object::String(s) => parts.push(&s[..]),
            other => {
                return Object::error(format!(
                    "argument[0] to `string_join` must contain only STRING, got {}",
                    other.type_name()
                ));
            }
        }
    }
    Object::string(parts.join(sep))
}
