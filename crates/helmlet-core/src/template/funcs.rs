//! Functions callable from templates

use super::eval::{format_nested, truthy, Renderer};
use crate::error::Result;
use crate::value::Value;

/// Every function name a template may call
pub(crate) const NAMES: &[&str] = &[
    "default", "quote", "indent", "tpl", "FilesGet", "not", "and", "or", "eq", "ne", "len",
];

pub(crate) fn is_defined(name: &str) -> bool {
    NAMES.contains(&name)
}

/// Call a function with already-evaluated arguments
///
/// A piped value arrives as the last argument.
pub(crate) fn call(r: &Renderer<'_>, name: &str, args: Vec<Value>, line: usize) -> Result<Value> {
    let arity = |expected: &str, got: usize| {
        r.error(
            line,
            format!(
                "wrong number of args for {}: want {} got {}",
                name, expected, got
            ),
        )
    };

    match name {
        "default" => {
            let [fallback, value] = <[Value; 2]>::try_from(args).map_err(|a| arity("2", a.len()))?;
            Ok(if value.is_null() { fallback } else { value })
        }
        "quote" => {
            let [value] = <[Value; 1]>::try_from(args).map_err(|a| arity("1", a.len()))?;
            Ok(Value::String(go_quote(&format_nested(&value))))
        }
        "indent" => {
            let [spaces, text] = <[Value; 2]>::try_from(args).map_err(|a| arity("2", a.len()))?;
            let spaces = match &spaces {
                Value::Integer(n) if *n >= 0 => *n as usize,
                Value::String(s) => s
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| r.error(line, format!("indent: invalid width {:?}", s)))?,
                other => {
                    return Err(r.error(
                        line,
                        format!("indent: width must be a non-negative integer, got {}", other),
                    ))
                }
            };
            let pad = " ".repeat(spaces);
            let text = format_nested(&text);
            Ok(Value::String(format!(
                "{}{}",
                pad,
                text.replace('\n', &format!("\n{}", pad))
            )))
        }
        "tpl" => {
            let [source, data] = <[Value; 2]>::try_from(args).map_err(|a| arity("2", a.len()))?;
            let Value::String(source) = source else {
                return Err(r.error(
                    line,
                    format!("tpl: template must be a string, got {}", source.type_name()),
                ));
            };
            r.render_nested(&source, &data, line).map(Value::String)
        }
        "FilesGet" => {
            let [path] = <[Value; 1]>::try_from(args).map_err(|a| arity("1", a.len()))?;
            let path = format_nested(&path);
            match std::fs::read_to_string(&path) {
                Ok(contents) => Ok(Value::String(contents)),
                Err(e) => {
                    log::warn!("FilesGet could not read {}: {}", path, e);
                    Ok(Value::String(format!("# open {}: {}", path, e)))
                }
            }
        }
        "not" => {
            let [value] = <[Value; 1]>::try_from(args).map_err(|a| arity("1", a.len()))?;
            Ok(Value::Bool(!truthy(&value)))
        }
        "and" | "or" => {
            if args.is_empty() {
                return Err(arity("at least 1", 0));
            }
            let stop_on = name == "or";
            let mut last = Value::Null;
            for value in args {
                if truthy(&value) == stop_on {
                    return Ok(value);
                }
                last = value;
            }
            Ok(last)
        }
        "eq" => {
            let mut args = args.into_iter();
            let Some(first) = args.next() else {
                return Err(arity("at least 2", 0));
            };
            let rest: Vec<_> = args.collect();
            if rest.is_empty() {
                return Err(arity("at least 2", 1));
            }
            Ok(Value::Bool(rest.iter().any(|other| equal(&first, other))))
        }
        "ne" => {
            let [a, b] = <[Value; 2]>::try_from(args).map_err(|a| arity("2", a.len()))?;
            Ok(Value::Bool(!equal(&a, &b)))
        }
        "len" => {
            let [value] = <[Value; 1]>::try_from(args).map_err(|a| arity("1", a.len()))?;
            let len = match &value {
                Value::String(s) => s.len(),
                Value::Sequence(items) => items.len(),
                Value::Mapping(map) => map.len(),
                other => {
                    return Err(r.error(
                        line,
                        format!("len of type {}", other.type_name()),
                    ))
                }
            };
            Ok(Value::Integer(len as i64))
        }
        _ => Err(r.error(line, format!("function \"{}\" not defined", name))),
    }
}

/// Integers and floats compare by numeric value
fn equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
            *i as f64 == *f
        }
        _ => a == b,
    }
}

/// Double-quote a string with Go escaping rules
fn go_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{07}' => out.push_str("\\a"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\u{0b}' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
