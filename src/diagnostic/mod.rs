pub mod ansi;
pub mod json;
pub mod registry;

use crate::ast::Span;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// A user-facing error report. Every error the pipeline can produce
/// converts into one of these; renderers never look at the original error.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<&'static str>,
    pub message: String,
    pub label: Option<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            label: None,
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.label = Some(Label { span, message: label.into() });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for pipeline error types ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let span = Span {
            start: e.position,
            end: e.position + e.snippet.len().max(1),
        };
        let mut d = Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code(e.code())
            .with_span(span, "here");
        if !e.suggestion.is_empty() {
            d = d.with_suggestion(e.suggestion.clone());
        }
        d
    }
}

impl From<&crate::parser::ParseError> for Diagnostic {
    fn from(e: &crate::parser::ParseError) -> Self {
        Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, "here")
    }
}

impl From<&crate::compiler::CompileError> for Diagnostic {
    fn from(e: &crate::compiler::CompileError) -> Self {
        use crate::compiler::CompileError;

        let mut d = Diagnostic::error(e.to_string()).with_code(e.code());
        if e.span() != Span::UNKNOWN {
            d = d.with_span(e.span(), "in this statement");
        }
        match e {
            CompileError::UnknownOperator { .. } => {
                d.with_note("only + - * / == != < > have opcodes")
            }
            CompileError::UnsupportedNode { .. } => {
                d.with_note("this form parses but has no bytecode lowering yet")
            }
            _ => d,
        }
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        use crate::vm::VmError;

        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            VmError::StackOverflow { .. } => {
                d.with_suggestion("raise the limit with --stack-size or KILN_STACK_SIZE")
            }
            VmError::UnknownOpcode { .. } | VmError::StackUnderflow => {
                d.with_note("the bytecode is malformed; this is a compiler bug")
            }
            _ => d,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.message, "something went wrong");
        assert!(d.code.is_none());
        assert!(d.label.is_none());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_with_span() {
        let d = Diagnostic::error("bad token").with_span(Span { start: 5, end: 8 }, "here");
        let label = d.label.unwrap();
        assert_eq!(label.span, Span { start: 5, end: 8 });
        assert_eq!(label.message, "here");
    }

    #[test]
    fn diagnostic_with_note_and_suggestion() {
        let d = Diagnostic::error("type mismatch")
            .with_note("left operand is a string")
            .with_suggestion("use len() instead");
        assert_eq!(d.notes, vec!["left operand is a string"]);
        assert_eq!(d.suggestion.as_deref(), Some("use len() instead"));
    }

    #[test]
    fn from_lex_error() {
        let e = crate::lexer::lex("let x = 1 & 2;").unwrap_err();
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("K-L001"));
        assert!(d.message.contains('&'));
        assert_eq!(d.label.as_ref().map(|l| l.span), Some(Span { start: 10, end: 11 }));
        assert!(d.suggestion.is_some());
    }

    #[test]
    fn from_parse_error() {
        let e = crate::parser::ParseError {
            code: "K-P005",
            position: 2,
            span: Span { start: 10, end: 15 },
            message: "expected identifier".to_string(),
        };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("K-P005"));
        assert!(d.message.contains("expected identifier"));
        assert_eq!(d.label.map(|l| l.span), Some(Span { start: 10, end: 15 }));
    }

    #[test]
    fn from_compile_error() {
        let e = crate::compiler::CompileError::UndefinedVariable {
            name: "x".to_string(),
            span: Span { start: 0, end: 1 },
        };
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("K-C001"));
        assert_eq!(d.message, "undefined variable: x");
        assert!(d.label.is_some());
    }

    #[test]
    fn compile_error_without_span_has_no_label() {
        let e = crate::compiler::CompileError::UnknownOperator {
            operator: "%".to_string(),
            span: Span::UNKNOWN,
        };
        let d = Diagnostic::from(&e);
        assert!(d.label.is_none());
        assert_eq!(d.notes.len(), 1);
    }

    #[test]
    fn from_vm_error() {
        let e = crate::vm::VmError::DivisionByZero;
        let d = Diagnostic::from(&e);
        assert_eq!(d.code, Some("K-R006"));
        assert_eq!(d.message, "division by zero");
        assert!(d.label.is_none());
    }

    #[test]
    fn stack_overflow_suggests_flag() {
        let d = Diagnostic::from(&crate::vm::VmError::StackOverflow { capacity: 2048 });
        assert!(d.suggestion.unwrap().contains("--stack-size"));
    }
}
