//! Command-line overrides (`--set a.b=1,c=2`)
//!
//! The input is read as comma-delimited records so that quoted values may
//! contain commas. Quote characters in the middle of a field are tolerated:
//! `a="x,y"` is split by the record reader at the inner comma and the halves
//! are joined back together until the quotes balance. Fields quoted as a
//! whole (`"a=x,y"`) are taken as the reader decoded them. When that fails
//! the input is split on every comma instead, so a badly quoted `--set`
//! degrades rather than aborting the render.
//!
//! Values are kept as strings. Whether `"1"` is a number is up to the
//! template.

use crate::error::Result;
use crate::value::{split_path, ConflictPolicy, Value};

/// A single `path=value` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    /// Dotted path, e.g. `image.tag`
    pub path: String,
    /// Raw value, never type-inferred
    pub value: String,
}

impl Override {
    pub fn new(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Write this override into `root`, replacing anything in the way
    pub fn apply(&self, root: &mut Value) {
        root.set_path(&split_path(&self.path), Value::String(self.value.clone()));
    }

    /// Write this override into `root` under an explicit conflict policy
    pub fn try_apply(&self, root: &mut Value, policy: ConflictPolicy) -> Result<()> {
        root.try_set_path(
            &split_path(&self.path),
            Value::String(self.value.clone()),
            policy,
        )
    }
}

/// Parse a `--set` string into overrides, in input order
///
/// Fields without an `=` are dropped. Later duplicates are kept so that
/// applying the list in order lets the last one win.
pub fn parse_set_values(input: &str) -> Vec<Override> {
    match parse_records(input) {
        Ok(overrides) => overrides,
        Err(reason) => {
            log::debug!("falling back to plain comma splitting for --set: {}", reason);
            parse_naive(input)
        }
    }
}

fn parse_records(input: &str) -> std::result::Result<Vec<Override>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());

    let mut overrides = Vec::new();
    let mut record = csv::StringRecord::new();
    loop {
        let start = reader.position().byte() as usize;
        if !reader.read_record(&mut record).map_err(|e| e.to_string())? {
            break;
        }
        let end = reader.position().byte() as usize;

        let quoted = quoted_fields(input.get(start..end).unwrap_or_default());
        if quoted.len() != record.len() {
            return Err(format!(
                "expected {} fields, read {}",
                quoted.len(),
                record.len()
            ));
        }

        for field in rejoin_unbalanced(record.iter().zip(quoted))? {
            if let Some((path, value)) = field.text.split_once('=') {
                let value = if field.quoted {
                    value.to_string()
                } else {
                    unquote(value)
                };
                overrides.push(Override::new(path, value));
            }
        }
    }
    Ok(overrides)
}

/// For each field of one raw record, whether it opens with a quote
///
/// Follows the record reader: a quote only starts quoting at the beginning
/// of a field, `""` inside quotes is a literal quote, and anywhere else a
/// quote is plain text.
fn quoted_fields(raw: &str) -> Vec<bool> {
    let raw = raw.trim_start_matches(['\r', '\n']);
    let mut flags = vec![false];
    let mut in_quotes = false;
    let mut at_start = true;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if at_start => {
                in_quotes = true;
                if let Some(last) = flags.last_mut() {
                    *last = true;
                }
            }
            ',' if !in_quotes => {
                flags.push(false);
                at_start = true;
                continue;
            }
            '\r' | '\n' if !in_quotes => break,
            _ => {}
        }
        at_start = false;
    }
    flags
}

/// A field after rejoining
struct Field {
    text: String,
    /// The field was quoted in the input, so the reader already unquoted it
    quoted: bool,
}

/// Join fields split inside a mid-field quote back together
///
/// Only a field that was not quoted in the input can open a group: its
/// quotes are literal text, and an odd count means the reader split it at
/// a comma that belongs to the value.
fn rejoin_unbalanced<'a>(
    fields: impl Iterator<Item = (&'a str, bool)>,
) -> std::result::Result<Vec<Field>, String> {
    let mut joined = Vec::new();
    let mut open: Option<String> = None;

    for (text, quoted) in fields {
        match open.take() {
            Some(mut pending) => {
                pending.push(',');
                pending.push_str(text);
                if pending.matches('"').count() % 2 == 1 {
                    open = Some(pending);
                } else {
                    joined.push(Field {
                        text: pending,
                        quoted: false,
                    });
                }
            }
            None if !quoted && text.matches('"').count() % 2 == 1 => {
                open = Some(text.to_string());
            }
            None => joined.push(Field {
                text: text.to_string(),
                quoted,
            }),
        }
    }

    match open {
        Some(pending) => Err(format!("unbalanced quote in '{}'", pending)),
        None => Ok(joined),
    }
}

/// Strip one pair of surrounding double quotes, unescaping `""`
fn unquote(value: &str) -> String {
    match value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => value.to_string(),
    }
}

fn parse_naive(input: &str) -> Vec<Override> {
    input
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(path, value)| Override::new(path, value))
        .collect()
}

/// Apply overrides in order
pub fn apply_overrides(root: &mut Value, overrides: &[Override]) {
    for item in overrides {
        item.apply(root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pairs(input: &str) -> Vec<(String, String)> {
        parse_set_values(input)
            .into_iter()
            .map(|o| (o.path, o.value))
            .collect()
    }

    fn owned(expected: &[(&str, &str)]) -> Vec<(String, String)> {
        expected
            .iter()
            .map(|(p, v)| (p.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_simple_pairs() {
        assert_eq!(pairs("a.b=1,c=2"), owned(&[("a.b", "1"), ("c", "2")]));
    }

    #[test]
    fn test_parse_quoted_value_with_comma() {
        assert_eq!(pairs("a=\"x,y\",b=2"), owned(&[("a", "x,y"), ("b", "2")]));
    }

    #[test]
    fn test_parse_quoted_field_with_comma() {
        assert_eq!(pairs("\"a=x,y\",b=2"), owned(&[("a", "x,y"), ("b", "2")]));
    }

    #[test]
    fn test_parse_escaped_quotes() {
        assert_eq!(
            pairs("msg=\"say \"\"hi\"\"\""),
            owned(&[("msg", "say \"hi\"")])
        );
    }

    #[test]
    fn test_parse_quoted_field_with_escaped_quote() {
        assert_eq!(
            pairs("\"a=5\"\" tall\",b=2"),
            owned(&[("a", "5\" tall"), ("b", "2")])
        );
    }

    #[test]
    fn test_parse_quoted_field_keeps_inner_quotes() {
        assert_eq!(pairs("\"a=\"\"x\"\"\""), owned(&[("a", "\"x\"")]));
    }

    #[test]
    fn test_quoted_fields() {
        assert_eq!(quoted_fields("a=1,\"b=2,3\",c=\"x\n"), vec![false, true, false]);
        assert_eq!(quoted_fields("\n\"a=\"\"\",b\n"), vec![true, false]);
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        assert_eq!(pairs("url=a=b"), owned(&[("url", "a=b")]));
    }

    #[test]
    fn test_parse_drops_fields_without_equals() {
        assert_eq!(pairs("a=1,junk,b=2"), owned(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_parse_keeps_empty_value() {
        assert_eq!(pairs("a="), owned(&[("a", "")]));
    }

    #[test]
    fn test_parse_multiple_lines() {
        assert_eq!(pairs("a=1\nb=2"), owned(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_parse_unbalanced_quote_falls_back() {
        assert_eq!(
            pairs("a=\"x,b=2"),
            owned(&[("a", "\"x"), ("b", "2")])
        );
    }

    #[test]
    fn test_parse_values_stay_strings() {
        let parsed = parse_set_values("n=1,t=true");
        let mut root = Value::mapping();
        apply_overrides(&mut root, &parsed);

        assert_eq!(root.get("n"), Some(&Value::String("1".into())));
        assert_eq!(root.get("t"), Some(&Value::String("true".into())));
    }

    #[test]
    fn test_apply_builds_nested_tree() {
        let mut root = Value::mapping();
        apply_overrides(&mut root, &parse_set_values("a.b=1,c=2"));

        let expected: Value =
            Value::from_yaml(serde_yaml::from_str("a: {b: '1'}\nc: '2'").unwrap());
        assert_eq!(root, expected);
    }

    #[test]
    fn test_apply_later_duplicate_wins() {
        let mut root = Value::mapping();
        apply_overrides(&mut root, &parse_set_values("a=1,a=2"));
        assert_eq!(root.get("a").unwrap().as_str(), Some("2"));
    }

    #[test]
    fn test_try_apply_strict() {
        let mut root = Value::mapping();
        Override::new("a", "1").apply(&mut root);

        let err = Override::new("a.b", "2")
            .try_apply(&mut root, ConflictPolicy::Strict)
            .unwrap_err();
        assert_eq!(err.path.as_deref(), Some("a"));
    }
}
