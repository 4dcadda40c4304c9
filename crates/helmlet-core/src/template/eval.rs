//! Template execution

use super::ast::{Base, Command, Node, Operand, Pipeline};
use super::{funcs, parser, Delimiters};
use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

/// How deeply `tpl` may call itself
const MAX_NESTING: usize = 16;

/// Executes parsed nodes against a data value
pub(crate) struct Renderer<'a> {
    pub(crate) name: &'a str,
    /// Data the template was executed with, reachable as `$`
    pub(crate) root: &'a Value,
    /// Missing keys are errors instead of `<no value>`
    pub(crate) strict: bool,
    pub(crate) depth: usize,
}

impl<'a> Renderer<'a> {
    pub(crate) fn render(&self, nodes: &[Node]) -> Result<String> {
        let mut out = String::new();
        self.exec(nodes, self.root, &mut out)?;
        Ok(out)
    }

    fn exec(&self, nodes: &[Node], dot: &Value, out: &mut String) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(pipeline) => {
                    let value = self.eval_pipeline(pipeline, dot)?;
                    out.push_str(&format_value(&value));
                }
                Node::If {
                    cond,
                    then,
                    otherwise,
                } => {
                    if truthy(&self.eval_pipeline(cond, dot)?) {
                        self.exec(then, dot, out)?;
                    } else {
                        self.exec(otherwise, dot, out)?;
                    }
                }
                Node::With {
                    value,
                    body,
                    otherwise,
                } => {
                    let value = self.eval_pipeline(value, dot)?;
                    if truthy(&value) {
                        self.exec(body, &value, out)?;
                    } else {
                        self.exec(otherwise, dot, out)?;
                    }
                }
                Node::Range {
                    over,
                    body,
                    otherwise,
                } => {
                    let items = match self.eval_pipeline(over, dot)? {
                        Value::Sequence(items) => items,
                        Value::Mapping(map) => {
                            let mut entries: Vec<_> = map.into_iter().collect();
                            entries.sort_by(|a, b| a.0.cmp(&b.0));
                            entries.into_iter().map(|(_, v)| v).collect()
                        }
                        Value::Null => Vec::new(),
                        other => {
                            return Err(self.error(
                                over.line,
                                format!("range can't iterate over {}", format_value(&other)),
                            ))
                        }
                    };

                    if items.is_empty() {
                        self.exec(otherwise, dot, out)?;
                    }
                    for item in &items {
                        self.exec(body, item, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn eval_pipeline(&self, pipeline: &Pipeline, dot: &Value) -> Result<Value> {
        let mut piped = None;
        for command in &pipeline.commands {
            piped = Some(self.eval_command(command, dot, piped, pipeline.line)?);
        }
        Ok(piped.unwrap_or_default())
    }

    fn eval_command(
        &self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
        line: usize,
    ) -> Result<Value> {
        match command.args.split_first() {
            Some((Operand::Function(name), rest)) => {
                let mut args = rest
                    .iter()
                    .map(|operand| self.eval_operand(operand, dot, line))
                    .collect::<Result<Vec<_>>>()?;
                args.extend(piped);
                funcs::call(self, name, args, line)
            }
            Some((operand, [])) if piped.is_none() => self.eval_operand(operand, dot, line),
            Some(_) => Err(self.error(line, "can't give argument to non-function")),
            None => Ok(Value::Null),
        }
    }

    fn eval_operand(&self, operand: &Operand, dot: &Value, line: usize) -> Result<Value> {
        match operand {
            Operand::Field { base, path } => {
                let start = match base {
                    Base::Dot => dot,
                    Base::Root => self.root,
                };
                self.lookup(start, path, line)
            }
            Operand::Function(name) => funcs::call(self, name, Vec::new(), line),
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Sub(pipeline) => self.eval_pipeline(pipeline, dot),
        }
    }

    fn lookup(&self, start: &Value, path: &[String], line: usize) -> Result<Value> {
        static NULL: Value = Value::Null;
        let mut current = start;

        for (i, key) in path.iter().enumerate() {
            current = match current {
                Value::Mapping(map) => match map.get(key) {
                    Some(value) => value,
                    None => {
                        self.missing(&path[..=i], line)?;
                        &NULL
                    }
                },
                // Only nil data at the top is lenient; a nil reached through a field is not.
                Value::Null if i == 0 => {
                    self.missing(&path[..=i], line)?;
                    &NULL
                }
                Value::Null => {
                    return Err(self
                        .error(line, format!("nil pointer evaluating interface {{}}.{}", key))
                        .with_path(path[..=i].join(".")))
                }
                other => {
                    return Err(self
                        .error(
                            line,
                            format!("can't evaluate field {} in type {}", key, other.type_name()),
                        )
                        .with_path(path[..=i].join(".")))
                }
            };
        }

        Ok(current.clone())
    }

    fn missing(&self, path: &[String], line: usize) -> Result<()> {
        if self.strict {
            return Err(Error::missing_key(path.join("."))
                .with_source_location(SourceLocation::line(self.name, line)));
        }
        Ok(())
    }

    /// Render `source` with `data` as its root, for the `tpl` function
    pub(crate) fn render_nested(&self, source: &str, data: &Value, line: usize) -> Result<String> {
        if self.depth >= MAX_NESTING {
            return Err(self.error(line, "tpl nested too deeply"));
        }
        let nodes = parser::parse("tpl", source, &Delimiters::default())?;
        Renderer {
            name: "tpl",
            root: data,
            strict: self.strict,
            depth: self.depth + 1,
        }
        .render(&nodes)
    }

    pub(crate) fn error(&self, line: usize, message: impl Into<String>) -> Error {
        Error::render(message).with_source_location(SourceLocation::line(self.name, line))
    }
}

/// Printed form of a value, as `{{ . }}` shows it
pub(crate) fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "<no value>".to_string(),
        other => format_nested(other),
    }
}

/// Go `%v` formatting: `[a b]`, `map[k:v]` with sorted keys
pub(crate) fn format_nested(value: &Value) -> String {
    match value {
        Value::Null => "<nil>".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let items: Vec<_> = items.iter().map(format_nested).collect();
            format!("[{}]", items.join(" "))
        }
        Value::Mapping(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let entries: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}:{}", k, format_nested(v)))
                .collect();
            format!("map[{}]", entries.join(" "))
        }
    }
}

/// Go template truth: empty and zero values are false
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Integer(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn data(src: &str) -> Value {
        Value::from_yaml(serde_yaml::from_str(src).unwrap())
    }

    fn run(template: &str, values: &Value, strict: bool) -> Result<String> {
        let nodes = parser::parse("test", template, &Delimiters::default())?;
        Renderer {
            name: "test",
            root: values,
            strict,
            depth: 0,
        }
        .render(&nodes)
    }

    #[test]
    fn test_field_lookup() {
        let values = data("Values: {image: {repo: nginx, tag: 1.25}}");
        assert_eq!(
            run("{{ .Values.image.repo }}:{{ .Values.image.tag }}", &values, false).unwrap(),
            "nginx:1.25"
        );
    }

    #[test]
    fn test_missing_key_prints_no_value() {
        let values = data("Values: {a: null}");
        assert_eq!(
            run("[{{ .Values.nope }}][{{ .Values.a }}]", &values, false).unwrap(),
            "[<no value>][<no value>]"
        );
    }

    #[test]
    fn test_field_through_missing_key_errors() {
        let values = data("Values: {b: null}");
        for source in ["{{ .Values.a.b }}", "{{ .Values.b.c }}"] {
            let err = run(source, &values, false).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Render, "{}", source);
            assert!(err.to_string().contains("nil pointer evaluating interface {}."), "{}", err);
        }

        let err = run("{{ .Values.a.b }}", &values, false).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("Values.a.b"));
    }

    #[test]
    fn test_field_through_missing_key_strict_names_first_missing() {
        let values = data("Values: {}");
        let err = run("{{ .Values.a.b }}", &values, true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingKey);
        assert_eq!(err.path.as_deref(), Some("Values.a"));
    }

    #[test]
    fn test_missing_key_strict_errors() {
        let values = data("Values: {present: 1}");
        let err = run("ok\n{{ .Values.absent }}", &values, true).unwrap_err();

        assert_eq!(err.kind, ErrorKind::MissingKey);
        assert_eq!(err.path.as_deref(), Some("Values.absent"));
        assert_eq!(err.source_location.unwrap().line, Some(2));
    }

    #[test]
    fn test_field_on_scalar_errors() {
        let values = data("Values: {name: x}");
        let err = run("{{ .Values.name.first }}", &values, false).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Render);
        assert!(err.to_string().contains("can't evaluate field first in type string"));
        assert_eq!(err.path.as_deref(), Some("Values.name.first"));
    }

    #[test]
    fn test_if_else() {
        let values = data("Values: {on: true, off: false, empty: ''}");
        let template = "{{ if .Values.on }}A{{ end }}\
                        {{ if .Values.off }}B{{ else }}C{{ end }}\
                        {{ if .Values.empty }}D{{ else if .Values.on }}E{{ end }}";
        assert_eq!(run(template, &values, false).unwrap(), "ACE");
    }

    #[test]
    fn test_range_sequence_and_mapping() {
        let values = data("Values: {list: [a, b], map: {z: 1, a: 2}, none: []}");
        let template = "{{ range .Values.list }}<{{ . }}>{{ end }}\
                        {{ range .Values.map }}{{ . }}{{ end }}\
                        {{ range .Values.none }}x{{ else }}empty{{ end }}";
        assert_eq!(run(template, &values, false).unwrap(), "<a><b>21empty");
    }

    #[test]
    fn test_range_root_access() {
        let values = data("Values: {prefix: p, list: [1, 2]}");
        let template = "{{ range .Values.list }}{{ $.Values.prefix }}{{ . }} {{ end }}";
        assert_eq!(run(template, &values, false).unwrap(), "p1 p2 ");
    }

    #[test]
    fn test_with() {
        let values = data("Values: {db: {host: h}}");
        let template = "{{ with .Values.db }}{{ .host }}{{ end }}\
                        {{ with .Values.cache }}x{{ else }}none{{ end }}";
        assert_eq!(run(template, &values, false).unwrap(), "hnone");
    }

    #[test]
    fn test_range_over_scalar_errors() {
        let values = data("Values: {n: 3}");
        let err = run("{{ range .Values.n }}{{ end }}", &values, false).unwrap_err();
        assert!(err.to_string().contains("range can't iterate over 3"));
    }

    #[test]
    fn test_argument_to_non_function_errors() {
        let values = data("Values: {a: 1}");
        let err = run("{{ .Values.a | .Values.a }}", &values, false).unwrap_err();
        assert!(err.to_string().contains("can't give argument to non-function"));
    }

    #[test]
    fn test_go_style_formatting() {
        let values = data("Values: {list: [1, x, null], map: {b: 2, a: [true]}, f: 2.5}");
        assert_eq!(
            run("{{ .Values.list }} {{ .Values.map }} {{ .Values.f }}", &values, false).unwrap(),
            "[1 x <nil>] map[a:[true] b:2] 2.5"
        );
    }

    #[test]
    fn test_parenthesized_pipeline() {
        let values = data("Values: {a: 1}");
        assert_eq!(
            run("{{ not (eq .Values.a 2) }}", &values, false).unwrap(),
            "true"
        );
    }
}
