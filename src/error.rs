use thiserror::Error;

use crate::interpreter::Type;

/// A rule table or logical form couldn't be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SyntaxError(pub String);

impl From<String> for SyntaxError {
  fn from(value: String) -> Self {
    Self(value)
  }
}

/// A rule or rule table is malformed. Raised while the grammar is built and
/// never recovered from.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrammarDefinitionError {
  #[error("not a category: {0}")]
  NotACategory(String),

  #[error("malformed rhs item {item:?} in rule for {lhs}")]
  MalformedItem { lhs: String, item: String },

  #[error("rule for {0} has an empty rhs")]
  EmptyRhs(String),

  #[error("rule {0} mixes terminals and categories")]
  MixedRhs(String),

  #[error("every rhs item of rule {0} is optional")]
  AllOptional(String),

  #[error("rule {rule} refers to child {index} but only has {arity}")]
  HoleOutOfRange {
    rule: String,
    index: usize,
    arity: usize,
  },

  #[error("unary rules form a cycle through {0}")]
  UnaryCycle(String),

  #[error("empty ruleset")]
  Empty,

  #[error("syntax error: {0}")]
  Syntax(#[from] SyntaxError),
}

/// A rule's semantics couldn't be built from the children it matched. The
/// chart drops such entries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticsError {
  #[error("missing child {0}")]
  MissingChild(usize),

  #[error("can only flip a direction, got {0}")]
  NotADirection(String),

  #[error("expected an operator at the head of a node, got {0}")]
  NotAnOperator(String),
}

/// A logical form can't be compiled into a labeling function.
#[derive(Error, Debug, Clone)]
pub enum CompileError {
  /// The form isn't shaped the way its operator requires. Indicates a grammar
  /// that builds forms the interpreter doesn't understand.
  #[error("malformed logical form {form}: {reason}")]
  Malformed { form: String, reason: String },

  /// The form is well-shaped but ill-typed, e.g. comparing a string with an
  /// integer.
  #[error("type error in {form}: expected {expected}, found {found}")]
  Type {
    form: String,
    expected: String,
    found: Type,
  },

  #[error("unknown alias {0}")]
  UnknownAlias(String),

  #[error("invalid pattern {pattern:?}: {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: regex::Error,
  },
}

impl CompileError {
  pub fn is_type_error(&self) -> bool {
    matches!(self, Self::Type { .. })
  }
}

/// A data condition a primitive can't handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrimitiveError {
  #[error("window {start}..{end} extends past a sentence of {len} tokens")]
  WindowOutOfBounds { start: i64, end: i64, len: usize },

  #[error("index {index} is out of range for {len} items")]
  IndexOutOfRange { index: i64, len: usize },

  #[error("candidate has {tags} {field} tags for {words} words")]
  MissingTags {
    field: &'static str,
    tags: usize,
    words: usize,
  },

  #[error("{op} can't combine {left} with {right}")]
  TypeMismatch {
    op: &'static str,
    left: Type,
    right: Type,
  },

  #[error("character offsets {start}..{end} don't fall on the candidate text")]
  InvalidOffsets { start: usize, end: usize },

  #[error("argument {0} is not a span of the candidate")]
  NoSuchArgument(i64),

  #[error("{op} overflowed")]
  Overflow { op: &'static str },
}

/// A compiled labeling function failed on a concrete candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("labeling function {function} failed on candidate {candidate}: {cause}")]
pub struct EvaluationError {
  pub function: String,
  pub candidate: String,
  #[source]
  pub cause: PrimitiveError,
}
