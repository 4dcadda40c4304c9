//! Parsed template tree

use crate::value::Value;

/// A node of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text copied to the output
    Text(String),
    /// `{{ pipeline }}`: the pipeline's value is printed
    Output(Pipeline),
    /// `{{ if }}...{{ else }}...{{ end }}`; `else if` nests another `If`
    If {
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
    /// `{{ range }}...{{ else }}...{{ end }}`
    Range {
        over: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
    /// `{{ with }}...{{ else }}...{{ end }}`
    With {
        value: Pipeline,
        body: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Commands joined by `|`
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub commands: Vec<Command>,
    /// Line of the action in the template source
    pub line: usize,
}

/// A function call or a single operand
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`, `.a.b`, `$` or `$.a.b`
    Field { base: Base, path: Vec<String> },
    /// Name of a function
    Function(String),
    /// String, number, bool or nil constant
    Literal(Value),
    /// `( pipeline )`
    Sub(Box<Pipeline>),
}

/// Where a field chain starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    /// The current value of `.`
    Dot,
    /// The data the template was executed with (`$`)
    Root,
}
