//! Template parsing
//!
//! Parsing runs in two passes. The scanner splits the source into text and
//! actions using the configured delimiters and applies `{{-` / `-}}`
//! whitespace trimming. The tree builder turns each action into a node,
//! pairing `if`, `range` and `with` with their `else` and `end`.

use super::ast::{Base, Command, Node, Operand, Pipeline};
use super::{funcs, Delimiters};
use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

/// Parse template source into nodes
pub(crate) fn parse(name: &str, source: &str, delimiters: &Delimiters) -> Result<Vec<Node>> {
    let tokens = Scanner {
        name,
        src: source,
        delimiters,
    }
    .scan()?;

    let mut builder = TreeBuilder {
        name,
        tokens: tokens.into_iter(),
    };
    let (nodes, terminator) = builder.parse_list()?;
    match terminator {
        None => Ok(nodes),
        Some(Terminator::End { line }) => Err(syntax_error(name, line, "unexpected end")),
        Some(Terminator::Else { line, .. }) => Err(syntax_error(name, line, "unexpected else")),
    }
}

fn syntax_error(name: &str, line: usize, message: impl Into<String>) -> Error {
    Error::template_syntax(message).with_source_location(SourceLocation::line(name, line))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Text(String),
    Action { body: String, line: usize },
}

struct Scanner<'a> {
    name: &'a str,
    src: &'a str,
    delimiters: &'a Delimiters,
}

impl<'a> Scanner<'a> {
    fn scan(&self) -> Result<Vec<Token>> {
        let left = self.delimiters.left.as_str();
        let right = self.delimiters.right.as_str();

        let mut tokens = Vec::new();
        let mut pos = 0;
        let mut line = 1;
        let mut trim_next = false;

        while pos < self.src.len() {
            let Some(offset) = self.src[pos..].find(left) else {
                push_text(&mut tokens, &self.src[pos..], trim_next, false);
                break;
            };

            let open = pos + offset;
            let text = &self.src[pos..open];
            line += text.matches('\n').count();

            let mut body_start = open + left.len();
            let trim_left = has_left_trim(&self.src[body_start..]);
            if trim_left {
                body_start += 1;
            }
            push_text(&mut tokens, text, trim_next, trim_left);

            let close = self.find_close(body_start, line)?;
            let raw = &self.src[body_start..close];
            let (body, trim_right) = match strip_right_trim(raw) {
                Some(stripped) => (stripped, true),
                None => (raw, false),
            };

            if !is_comment(body) {
                tokens.push(Token::Action {
                    body: body.to_string(),
                    line,
                });
            }

            line += raw.matches('\n').count();
            trim_next = trim_right;
            pos = close + right.len();
        }

        Ok(tokens)
    }

    /// Byte offset of the closing delimiter, skipping quoted strings
    fn find_close(&self, from: usize, line: usize) -> Result<usize> {
        let right = self.delimiters.right.as_str();
        let rest = &self.src[from..];

        let lead = rest.trim_start();
        if lead.starts_with("/*") {
            let skipped = rest.len() - lead.len();
            let end = lead
                .find("*/")
                .ok_or_else(|| syntax_error(self.name, line, "unclosed comment"))?;
            let after = from + skipped + end + 2;
            return self.src[after..]
                .find(right)
                .map(|i| after + i)
                .ok_or_else(|| syntax_error(self.name, line, "unclosed action"));
        }

        let mut quote: Option<char> = None;
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            match quote {
                Some('"') if c == '\\' => {
                    chars.next();
                }
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if rest[i..].starts_with(right) => return Ok(from + i),
                None if c == '"' || c == '`' => quote = Some(c),
                None => {}
            }
        }

        let message = match quote {
            Some(_) => "unterminated quoted string",
            None => "unclosed action",
        };
        Err(syntax_error(self.name, line, message))
    }
}

fn push_text(tokens: &mut Vec<Token>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text.to_string()));
    }
}

/// `{{- ` trims preceding whitespace; `{{-3}}` is just a negative number
fn has_left_trim(body: &str) -> bool {
    let mut chars = body.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn strip_right_trim(body: &str) -> Option<&str> {
    body.strip_suffix('-')
        .filter(|rest| rest.ends_with(char::is_whitespace))
}

fn is_comment(body: &str) -> bool {
    let body = body.trim();
    body.starts_with("/*") && body.ends_with("*/")
}

/// What stopped a list of nodes
enum Terminator {
    End { line: usize },
    Else { line: usize, cond: Option<Pipeline> },
}

enum Step {
    Node(Node),
    Stop(Terminator),
}

struct TreeBuilder<'a> {
    name: &'a str,
    tokens: std::vec::IntoIter<Token>,
}

impl<'a> TreeBuilder<'a> {
    fn parse_list(&mut self) -> Result<(Vec<Node>, Option<Terminator>)> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Action { body, line } => match self.action(&body, line)? {
                    Step::Node(node) => nodes.push(node),
                    Step::Stop(terminator) => return Ok((nodes, Some(terminator))),
                },
            }
        }

        Ok((nodes, None))
    }

    fn action(&mut self, body: &str, line: usize) -> Result<Step> {
        let body = body.trim();
        let (keyword, rest) = split_keyword(body);

        match keyword {
            "end" if rest.is_empty() => Ok(Step::Stop(Terminator::End { line })),
            "else" => {
                if rest.is_empty() {
                    return Ok(Step::Stop(Terminator::Else { line, cond: None }));
                }
                match split_keyword(rest) {
                    ("if", cond) => Ok(Step::Stop(Terminator::Else {
                        line,
                        cond: Some(self.pipeline(cond, line, "else if")?),
                    })),
                    _ => Err(syntax_error(self.name, line, "unexpected tokens after else")),
                }
            }
            "if" => {
                let cond = self.pipeline(rest, line, "if")?;
                let (then, otherwise) = self.branches(line, true)?;
                Ok(Step::Node(Node::If {
                    cond,
                    then,
                    otherwise,
                }))
            }
            "range" => {
                let over = self.pipeline(rest, line, "range")?;
                let (body, otherwise) = self.branches(line, false)?;
                Ok(Step::Node(Node::Range {
                    over,
                    body,
                    otherwise,
                }))
            }
            "with" => {
                let value = self.pipeline(rest, line, "with")?;
                let (body, otherwise) = self.branches(line, false)?;
                Ok(Step::Node(Node::With {
                    value,
                    body,
                    otherwise,
                }))
            }
            _ => Ok(Step::Node(Node::Output(self.pipeline(body, line, "command")?))),
        }
    }

    /// Body and `else` branch of a control action, through its `end`
    fn branches(&mut self, line: usize, allow_else_if: bool) -> Result<(Vec<Node>, Vec<Node>)> {
        let (body, terminator) = self.parse_list()?;

        match terminator {
            Some(Terminator::End { .. }) => Ok((body, Vec::new())),
            Some(Terminator::Else { cond: None, .. }) => {
                let (otherwise, terminator) = self.parse_list()?;
                match terminator {
                    Some(Terminator::End { .. }) => Ok((body, otherwise)),
                    Some(Terminator::Else { line, .. }) => {
                        Err(syntax_error(self.name, line, "expected end after else"))
                    }
                    None => Err(syntax_error(self.name, line, "missing end")),
                }
            }
            Some(Terminator::Else {
                cond: Some(cond),
                line: else_line,
            }) => {
                if !allow_else_if {
                    return Err(syntax_error(self.name, else_line, "else if is only allowed after if"));
                }
                let (then, otherwise) = self.branches(else_line, true)?;
                Ok((
                    body,
                    vec![Node::If {
                        cond,
                        then,
                        otherwise,
                    }],
                ))
            }
            None => Err(syntax_error(self.name, line, "missing end")),
        }
    }

    fn pipeline(&self, src: &str, line: usize, context: &str) -> Result<Pipeline> {
        if src.trim().is_empty() {
            return Err(syntax_error(
                self.name,
                line,
                format!("missing value for {}", context),
            ));
        }
        ActionParser::new(self.name, src, line).parse()
    }
}

fn split_keyword(body: &str) -> (&str, &str) {
    match body.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (body, ""),
    }
}

/// Parser for the pipeline inside a single action
struct ActionParser<'a> {
    name: &'a str,
    input: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> ActionParser<'a> {
    fn new(name: &'a str, input: &'a str, line: usize) -> Self {
        Self {
            name,
            input,
            pos: 0,
            line,
        }
    }

    /// Parse the whole input as one pipeline
    fn parse(&mut self) -> Result<Pipeline> {
        let pipeline = self.parse_pipeline()?;
        self.skip_whitespace();
        match self.current() {
            None => Ok(pipeline),
            Some(c) => Err(self.error(format!("unexpected '{}' in command", c))),
        }
    }

    fn parse_pipeline(&mut self) -> Result<Pipeline> {
        let mut commands = vec![self.parse_command()?];

        loop {
            self.skip_whitespace();
            if self.current() != Some('|') {
                break;
            }
            self.advance();
            commands.push(self.parse_command()?);
        }

        Ok(Pipeline {
            commands,
            line: self.line,
        })
    }

    fn parse_command(&mut self) -> Result<Command> {
        let mut args = Vec::new();

        loop {
            self.skip_whitespace();
            match self.current() {
                None | Some('|') | Some(')') => break,
                Some(_) => {
                    args.push(self.parse_operand()?);
                    match self.current() {
                        None | Some('|') | Some(')') => {}
                        Some(c) if c.is_whitespace() => {}
                        Some(c) => {
                            return Err(self.error(format!("unexpected '{}' in operand", c)))
                        }
                    }
                }
            }
        }

        if args.is_empty() {
            return Err(self.error("missing value for command"));
        }
        Ok(Command { args })
    }

    fn parse_operand(&mut self) -> Result<Operand> {
        match self.current() {
            Some('.') => {
                self.advance();
                let path = if self.current().is_some_and(is_ident_start) {
                    self.field_chain()
                } else {
                    Vec::new()
                };
                Ok(Operand::Field {
                    base: Base::Dot,
                    path,
                })
            }
            Some('$') => {
                self.advance();
                let path = if self.current() == Some('.') && self.peek().is_some_and(is_ident_start)
                {
                    self.advance();
                    self.field_chain()
                } else {
                    Vec::new()
                };
                Ok(Operand::Field {
                    base: Base::Root,
                    path,
                })
            }
            Some('"') => Ok(Operand::Literal(Value::String(self.quoted_string()?))),
            Some('`') => Ok(Operand::Literal(Value::String(self.raw_string()?))),
            Some('(') => {
                self.advance();
                let inner = self.parse_pipeline()?;
                self.skip_whitespace();
                if self.current() != Some(')') {
                    return Err(self.error("unclosed left paren"));
                }
                self.advance();
                Ok(Operand::Sub(Box::new(inner)))
            }
            Some(c)
                if c.is_ascii_digit()
                    || ((c == '-' || c == '+') && self.peek().is_some_and(|n| n.is_ascii_digit())) =>
            {
                Ok(Operand::Literal(self.number()?))
            }
            Some(c) if is_ident_start(c) => {
                let word = self.identifier();
                match word.as_str() {
                    "true" => Ok(Operand::Literal(Value::Bool(true))),
                    "false" => Ok(Operand::Literal(Value::Bool(false))),
                    "nil" => Ok(Operand::Literal(Value::Null)),
                    _ if funcs::is_defined(&word) => Ok(Operand::Function(word)),
                    _ => Err(self.error(format!("function \"{}\" not defined", word))),
                }
            }
            Some(c) => Err(self.error(format!("unexpected '{}' in operand", c))),
            None => Err(self.error("unexpected end of action")),
        }
    }

    /// Identifiers separated by dots, positioned after the leading dot
    fn field_chain(&mut self) -> Vec<String> {
        let mut path = vec![self.identifier()];
        while self.current() == Some('.') && self.peek().is_some_and(is_ident_start) {
            self.advance();
            path.push(self.identifier());
        }
        path
    }

    fn identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(c) = self.current() {
            if c.is_alphanumeric() || c == '_' {
                result.push(c);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn number(&mut self) -> Result<Value> {
        let start = self.pos;
        let mut prev = '\0';
        while let Some(c) = self.current() {
            let sign_ok = (c == '-' || c == '+') && (self.pos == start || prev == 'e' || prev == 'E');
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '_' || sign_ok {
                prev = c;
                self.advance();
            } else {
                break;
            }
        }

        let text = self.input[start..self.pos].replace('_', "");
        let parsed = if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>().ok().map(Value::Float)
        } else {
            text.parse::<i64>().ok().map(Value::Integer)
        };
        parsed.ok_or_else(|| self.error(format!("bad number syntax: {}", text)))
    }

    fn quoted_string(&mut self) -> Result<String> {
        self.advance(); // opening quote
        let mut result = String::new();

        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some(c) => return Err(self.error(format!("unknown escape sequence \\{}", c))),
                        None => break,
                    };
                    result.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    result.push(c);
                    self.advance();
                }
                None => break,
            }
        }

        Err(self.error("unterminated quoted string"))
    }

    fn raw_string(&mut self) -> Result<String> {
        self.advance(); // opening backtick
        let rest = &self.input[self.pos..];
        let end = rest
            .find('`')
            .ok_or_else(|| self.error("unterminated raw quoted string"))?;
        let result = rest[..end].to_string();
        self.pos += end + 1;
        Ok(result)
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        syntax_error(self.name, self.line, message)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}
