use crate::ast::SourceMap;
use super::Diagnostic;

/// One diagnostic as a single-line JSON object.
pub fn render(d: &Diagnostic) -> String {
    let label = d.label.as_ref().map(|l| {
        let mut obj = serde_json::json!({
            "start": l.span.start,
            "end": l.span.end,
            "message": l.message,
        });
        if let Some(source) = d.source.as_deref() {
            let loc = SourceMap::new(source).locate(l.span);
            obj["line"] = serde_json::Value::from(loc.line);
            obj["col"] = serde_json::Value::from(loc.col);
        }
        obj
    });

    let mut obj = serde_json::json!({
        "severity": "error",
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(label) = label {
        obj["label"] = label;
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let d = Diagnostic::error("division by zero").with_code("K-R006");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "division by zero");
        assert_eq!(v["code"], "K-R006");
        assert!(v.get("label").is_none());
    }

    #[test]
    fn render_with_span_and_source() {
        let d = Diagnostic::error("undefined variable: y")
            .with_span(Span { start: 11, end: 20 }, "here")
            .with_source("let x = 1;\nlet z = y;".to_string());
        let v = parse_json(&render(&d));
        let label = &v["label"];
        assert_eq!(label["start"], 11);
        assert_eq!(label["end"], 20);
        assert_eq!(label["line"], 2);
        assert_eq!(label["col"], 1);
    }

    #[test]
    fn label_without_source_has_no_line_col() {
        let d = Diagnostic::error("bad").with_span(Span { start: 5, end: 8 }, "here");
        let v = parse_json(&render(&d));
        assert!(v["label"].get("line").is_none());
        assert!(v["label"].get("col").is_none());
    }

    #[test]
    fn render_notes_and_suggestion() {
        let d = Diagnostic::error("bad")
            .with_note("first")
            .with_note("second")
            .with_suggestion("try this instead");
        let v = parse_json(&render(&d));
        assert_eq!(v["notes"].as_array().map(|n| n.len()), Some(2));
        assert_eq!(v["notes"][0], "first");
        assert_eq!(v["suggestion"], "try this instead");
    }

    #[test]
    fn absent_fields_are_omitted() {
        let v = parse_json(&render(&Diagnostic::error("bad")));
        assert!(v.get("suggestion").is_none());
        assert!(v.get("code").is_none());
    }

    #[test]
    fn output_is_one_line() {
        let d = Diagnostic::error("multi\nline message").with_note("a\nb");
        assert!(!render(&d).contains('\n'));
    }
}
