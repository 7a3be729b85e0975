//! Simple recursive-descent parsing of rule tables and logical forms.
//!
//! A rule table is a list of rules and directives:
//!
//! ```text
//! // comments run to the end of the line
//! %absorb $Stop;
//! $ROOT -> $Start $LF $Stop => (.root $1);
//! $Compare -> less than | smaller than | < => .lt;
//! $Bool -> $Not $Bool => in_order;
//! ```
//!
//! Alternatives separated by `|` share the semantics after `=>`. A rule
//! without `=>` contributes no logical form. Semantics are either one of the
//! keywords `first second in_order reversed flip none`, or an s-expression
//! template where `$N` is the Nth child, `..$N` splices the Nth child's
//! arguments and `($N ...)` extends the Nth child with more arguments.

use std::str::FromStr;

use regex::Regex;

use crate::error::{GrammarDefinitionError, SyntaxError};
use crate::logical_form::{Head, LogicalForm, Op, Template};
use crate::rules::{Category, Rule, Semantics};

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), SyntaxError>;

/// The rules of a grammar as written, before optional items are expanded.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
  pub rules: Vec<Rule>,
  /// The category that may absorb out-of-grammar tokens to its left.
  pub absorb: Option<Category>,
}

impl RuleTable {
  /// Appends another table's rules. Its absorbing category is used if this
  /// table doesn't name one.
  pub fn extend(&mut self, other: RuleTable) {
    self.rules.extend(other.rules);
    if self.absorb.is_none() {
      self.absorb = other.absorb;
    }
  }
}

impl FromStr for RuleTable {
  type Err = GrammarDefinitionError;

  /// Parses a rule table from a string. The first rule's lhs is the start
  /// category of any grammar built from it.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let mut table = RuleTable::default();
    let mut rem = s;
    loop {
      rem = skip_whitespace(rem);
      if rem.is_empty() {
        break;
      }
      if let (Some(_), s) = optional_char('%', rem) {
        let (absorb, s) = parse_directive(s)?;
        table.absorb = Some(absorb);
        rem = s;
      } else {
        let (rules, s) = parse_rule(rem)?;
        table.rules.extend(rules);
        rem = s;
      }
    }

    if table.rules.is_empty() {
      Err(GrammarDefinitionError::Empty)
    } else {
      Ok(table)
    }
  }
}

/// Reads a single template, e.g. `(.call ($0 $1) (.int 3))`.
pub fn read_template(s: &str) -> Result<Template, SyntaxError> {
  let (template, rest) = parse_template(skip_whitespace(s))?;
  let rest = skip_whitespace(rest);
  if rest.is_empty() {
    Ok(template)
  } else {
    Err(SyntaxError(format!("trailing input at {}", excerpt(rest))))
  }
}

fn excerpt(s: &str) -> &str {
  match s.char_indices().nth(40) {
    Some((idx, _)) => &s[..idx],
    None => s,
  }
}

/// Try to consume a regex, returning None if it doesn't match at the start
fn optional_re<'a>(re: &Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(SyntaxError(format!("couldn't match {} at {}", re, excerpt(s))))
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(SyntaxError(format!("couldn't match {} at {}", c, excerpt(s))))
  }
}

/// Skips whitespace and comments
fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE_OR_COMMENT, r"^(?:\s+|//[^\n]*)*");
  optional_re(&WHITESPACE_OR_COMMENT, s).1
}

fn parse_category(s: &str) -> ParseResult<'_, &str> {
  regex_static!(CATEGORY, r"^\$[A-Za-z0-9_]+");
  needed_re(&CATEGORY, s).map_err(|e| SyntaxError(format!("category: {}", e)))
}

/// `%absorb $Category;`
fn parse_directive(s: &str) -> ParseResult<'_, Category> {
  regex_static!(ABSORB, r"^absorb\b");
  let (_, s) = needed_re(&ABSORB, s).map_err(|e| SyntaxError(format!("directive: {}", e)))?;
  let s = skip_whitespace(s);
  let (name, s) = parse_category(s)?;
  let s = skip_whitespace(s);
  let (_, s) = needed_char(';', s)?;
  Ok((Category::new(name), s))
}

/// Lhs, arrow, alternatives and optional semantics, terminated by `;`.
/// Yields one rule per alternative.
fn parse_rule(s: &str) -> Result<(Vec<Rule>, &str), GrammarDefinitionError> {
  #![allow(clippy::trivial_regex)]
  regex_static!(ARROW, r"^->");
  regex_static!(ITEM, r"^[^\s;|]+");

  let (lhs, s) = parse_category(s).map_err(|e| SyntaxError(format!("rule lhs: {}", e)))?;
  let s = skip_whitespace(s);
  let (_, s) = needed_re(&ARROW, s).map_err(|e| SyntaxError(format!("rule arrow: {}", e)))?;

  let mut alternatives: Vec<Vec<&str>> = vec![Vec::new()];
  let mut semantics = Semantics::None;
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(';', rem) {
      rem = s;
      break;
    } else if let (Some(_), s) = optional_char('|', rem) {
      alternatives.push(Vec::new());
      rem = s;
    } else if let Some(s) = rem.strip_prefix("=>") {
      let (sem, s) = parse_semantics(skip_whitespace(s))
        .map_err(|e| SyntaxError(format!("semantics of {}: {}", lhs, e)))?;
      semantics = sem;
      let s = skip_whitespace(s);
      let (_, s) = needed_char(';', s).map_err(|e| SyntaxError(format!("rule end: {}", e)))?;
      rem = s;
      break;
    } else {
      let (item, s) = needed_re(&ITEM, rem).map_err(|e| SyntaxError(format!("rule item: {}", e)))?;
      if let Some(current) = alternatives.last_mut() {
        current.push(item);
      }
      rem = s;
    }
  }

  let rules = alternatives
    .iter()
    .map(|rhs| Rule::new(lhs, rhs, semantics.clone()))
    .collect::<Result<Vec<_>, _>>()?;
  Ok((rules, rem))
}

fn parse_semantics(s: &str) -> ParseResult<'_, Semantics> {
  regex_static!(KEYWORD, r"^(?:first|second|in_order|reversed|flip|none)\b");
  if let (Some(keyword), s) = optional_re(&KEYWORD, s) {
    let semantics = match keyword {
      "first" => Semantics::First,
      "second" => Semantics::Second,
      "in_order" => Semantics::InOrder,
      "reversed" => Semantics::Reversed,
      "flip" => Semantics::Flip,
      _ => Semantics::None,
    };
    Ok((semantics, s))
  } else {
    let (template, s) = parse_template(s)?;
    Ok((Semantics::from_template(template), s))
  }
}

fn parse_hole(s: &str) -> ParseResult<'_, usize> {
  regex_static!(HOLE, r"^\$\d+");
  let (hole, s) = needed_re(&HOLE, s)?;
  hole[1..]
    .parse()
    .map(|n| (n, s))
    .map_err(|_| SyntaxError(format!("hole out of range: {}", hole)))
}

fn parse_op(s: &str) -> ParseResult<'_, &str> {
  regex_static!(OP, r"^\.[a-z_]+");
  let (op, s) = needed_re(&OP, s)?;
  Ok((&op[1..], s))
}

fn unknown_op(name: &str) -> SyntaxError {
  SyntaxError(format!("unknown operator .{}", name))
}

fn parse_int(s: &str) -> ParseResult<'_, i64> {
  regex_static!(INT, r"^-?\d+");
  let (int, s) = needed_re(&INT, s)?;
  int
    .parse()
    .map(|n| (n, s))
    .map_err(|_| SyntaxError(format!("integer out of range: {}", int)))
}

fn parse_bool(s: &str) -> ParseResult<'_, bool> {
  regex_static!(BOOL, r"^(?:true|false)\b");
  let (b, s) = needed_re(&BOOL, s)?;
  Ok((b == "true", s))
}

/// A single or double quoted string with backslash escapes.
fn parse_string(s: &str) -> ParseResult<'_, String> {
  let quote = match s.chars().next() {
    Some(c @ ('"' | '\'')) => c,
    _ => return Err(SyntaxError(format!("expected a string at {}", excerpt(s)))),
  };

  let mut out = String::new();
  let mut chars = s.char_indices().skip(1);
  while let Some((idx, c)) = chars.next() {
    if c == quote {
      return Ok((out, &s[idx + c.len_utf8()..]));
    } else if c == '\\' {
      match chars.next() {
        Some((_, 'n')) => out.push('\n'),
        Some((_, 't')) => out.push('\t'),
        Some((_, c)) => out.push(c),
        None => break,
      }
    } else {
      out.push(c);
    }
  }
  Err(SyntaxError(format!("unterminated string at {}", excerpt(s))))
}

fn parse_template(s: &str) -> ParseResult<'_, Template> {
  match s.chars().next() {
    Some('(') => parse_template_node(s),
    Some('$') => {
      let (n, s) = parse_hole(s)?;
      Ok((Template::Hole(n), s))
    }
    Some('.') if s.starts_with("..") => {
      let (n, s) = parse_hole(&s[2..])?;
      Ok((Template::Splice(n), s))
    }
    Some('.') => {
      let (name, s) = parse_op(s)?;
      let op = Op::from_name(name).ok_or_else(|| unknown_op(name))?;
      Ok((Template::Form(LogicalForm::Tag(op)), s))
    }
    Some('"' | '\'') => {
      let (string, s) = parse_string(s)?;
      Ok((Template::Form(LogicalForm::Str(string)), s))
    }
    Some('t' | 'f') => {
      let (b, s) = parse_bool(s)?;
      Ok((Template::Form(LogicalForm::Bool(b)), s))
    }
    _ => {
      let (n, s) = parse_int(s)?;
      Ok((Template::Form(LogicalForm::Int(n)), s))
    }
  }
}

/// `(.op items...)`, `($N items...)`, or a literal: `(.int 1)`,
/// `(.string "a")`, `(.bool true)`
fn parse_template_node(s: &str) -> ParseResult<'_, Template> {
  let (_, s) = needed_char('(', s)?;
  let s = skip_whitespace(s);

  let (head, s) = if s.starts_with('$') {
    let (n, s) = parse_hole(s)?;
    (Head::Hole(n), s)
  } else {
    let (name, s) = parse_op(s)?;
    let s = skip_whitespace(s);
    let literal = match name {
      "int" => Some(parse_int(s).map(|(n, s)| (LogicalForm::Int(n), s))),
      "string" => Some(parse_string(s).map(|(v, s)| (LogicalForm::Str(v), s))),
      "bool" => Some(parse_bool(s).map(|(b, s)| (LogicalForm::Bool(b), s))),
      _ => None,
    };
    if let Some(literal) = literal {
      let (form, s) = literal?;
      let s = skip_whitespace(s);
      let (_, s) = needed_char(')', s)?;
      return Ok((Template::Form(form), s));
    }
    let op = Op::from_name(name).ok_or_else(|| unknown_op(name))?;
    (Head::Op(op), s)
  };

  let mut items = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), s) = optional_char(')', rem) {
      return Ok((Template::Node(head, items), s));
    }
    if rem.is_empty() {
      return Err(SyntaxError("unclosed (".to_string()));
    }
    let (item, s) = parse_template(rem)?;
    items.push(item);
    rem = s;
  }
}
