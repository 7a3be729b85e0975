use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{GrammarDefinitionError, SemanticsError};
use crate::logical_form::{LogicalForm, Op, Template};

/// Returns true iff the label names a category (non-terminal), i.e. is
/// marked with an initial '$'.
pub fn is_category(label: &str) -> bool {
  label.len() > 1
    && label.starts_with('$')
    && label[1..].chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Returns true iff the rhs item is optional, i.e. is marked with an initial
/// '?'.
pub fn is_optional(label: &str) -> bool {
  label.starts_with('?') && label.len() > 1
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Category {
  pub name: String,
}

impl Category {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into() }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Production {
  Terminal(String),
  Nonterminal(Category),
  Optional(Box<Production>),
}

impl Production {
  /// Reads one rhs item of a rule for `lhs`. Terminals are matched
  /// case-insensitively, so they're stored lowercased.
  pub fn parse(lhs: &str, item: &str) -> Result<Self, GrammarDefinitionError> {
    let malformed = || GrammarDefinitionError::MalformedItem {
      lhs: lhs.to_string(),
      item: item.to_string(),
    };

    if is_optional(item) {
      match Self::parse(lhs, &item[1..])? {
        Self::Optional(_) => Err(malformed()),
        inner => Ok(Self::Optional(Box::new(inner))),
      }
    } else if item.starts_with('$') {
      if is_category(item) {
        Ok(Self::Nonterminal(Category::new(item)))
      } else {
        Err(malformed())
      }
    } else if item.is_empty() || item.chars().any(char::is_whitespace) {
      Err(malformed())
    } else {
      Ok(Self::Terminal(item.to_lowercase()))
    }
  }

  pub fn symbol_str(&self) -> &str {
    match self {
      Self::Terminal(s) => s,
      Self::Nonterminal(c) => &c.name,
      Self::Optional(p) => p.symbol_str(),
    }
  }

  /// The item with any optional marker removed.
  pub fn required(&self) -> &Production {
    match self {
      Self::Optional(p) => p,
      p => p,
    }
  }

  pub fn category(&self) -> Option<&Category> {
    match self.required() {
      Self::Nonterminal(c) => Some(c),
      _ => None,
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self.required(), Self::Terminal(_))
  }

  pub fn is_nonterminal(&self) -> bool {
    matches!(self.required(), Self::Nonterminal(_))
  }

  pub fn is_optional(&self) -> bool {
    matches!(self, Self::Optional(_))
  }
}

impl fmt::Display for Production {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Terminal(s) => write!(f, "{}", s),
      Self::Nonterminal(c) => write!(f, "{}", c),
      Self::Optional(p) => write!(f, "?{}", p),
    }
  }
}

/// How a rule builds its logical form from its children's.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Semantics {
  /// The rule contributes no logical form.
  None,
  First,
  Second,
  /// The children in order, headed by the first if it is an operator.
  InOrder,
  /// Like `InOrder` over the children reversed.
  Reversed,
  /// The first child, with a left/right direction flipped.
  Flip,
  Constant(LogicalForm),
  Template(Template),
}

impl Semantics {
  /// Wraps a template, folding it into a constant when it has no holes.
  pub fn from_template(template: Template) -> Self {
    if template.max_hole().is_some() {
      return Self::Template(template);
    }
    match template.clone().into_form() {
      Some(form) => Self::Constant(form),
      None => Self::Template(template),
    }
  }

  fn max_child(&self) -> Option<usize> {
    match self {
      Self::Second => Some(1),
      Self::Template(t) => t.max_hole(),
      _ => None,
    }
  }
}

impl fmt::Display for Semantics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::None => write!(f, "none"),
      Self::First => write!(f, "first"),
      Self::Second => write!(f, "second"),
      Self::InOrder => write!(f, "in_order"),
      Self::Reversed => write!(f, "reversed"),
      Self::Flip => write!(f, "flip"),
      Self::Constant(form) => write!(f, "{}", form),
      Self::Template(t) => write!(f, "{}", t),
    }
  }
}

/// Swaps `.left` and `.right`, whether bare or heading a node.
pub fn flip_direction(form: &LogicalForm) -> Result<LogicalForm, SemanticsError> {
  let flip = |op: Op| match op {
    Op::Left => Some(Op::Right),
    Op::Right => Some(Op::Left),
    _ => None,
  };
  match form {
    LogicalForm::Tag(op) => flip(*op).map(LogicalForm::Tag),
    LogicalForm::Node(op, args) => flip(*op).map(|op| LogicalForm::Node(op, args.clone())),
    _ => None,
  }
  .ok_or_else(|| SemanticsError::NotADirection(form.to_string()))
}

/// A context-free production with a semantic attachment.
///
/// Equality and hashing only look at `lhs` and `rhs`, so structurally
/// identical productions collapse no matter how their semantics were written.
#[derive(Debug, Clone)]
pub struct Rule {
  pub lhs: Category,
  pub rhs: Vec<Production>,
  pub semantics: Semantics,
  /// The position each rhs item had in the rule as written. Differs from
  /// 0..len only for rules produced by expanding optional items.
  slots: Vec<usize>,
  arity: usize,
}

impl Rule {
  pub fn new(lhs: &str, rhs: &[&str], semantics: Semantics) -> Result<Self, GrammarDefinitionError> {
    if !is_category(lhs) {
      return Err(GrammarDefinitionError::NotACategory(lhs.to_string()));
    }
    if rhs.is_empty() {
      return Err(GrammarDefinitionError::EmptyRhs(lhs.to_string()));
    }

    let rhs = rhs
      .iter()
      .map(|item| Production::parse(lhs, item))
      .collect::<Result<Vec<_>, _>>()?;

    let rule = Self {
      lhs: Category::new(lhs),
      slots: (0..rhs.len()).collect(),
      arity: rhs.len(),
      rhs,
      semantics,
    };

    let terminals = rule.rhs.iter().filter(|p| p.is_terminal()).count();
    if terminals != 0 && terminals != rule.len() {
      return Err(GrammarDefinitionError::MixedRhs(rule.to_string()));
    }
    if rule.rhs.iter().all(Production::is_optional) {
      return Err(GrammarDefinitionError::AllOptional(rule.to_string()));
    }
    if let Some(index) = rule.semantics.max_child() {
      if index >= rule.arity {
        return Err(GrammarDefinitionError::HoleOutOfRange {
          rule: rule.to_string(),
          index,
          arity: rule.arity,
        });
      }
    }

    Ok(rule)
  }

  pub fn len(&self) -> usize {
    self.rhs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Number of rhs items in the rule as written, before optional expansion.
  pub fn arity(&self) -> usize {
    self.arity
  }

  /// All rhs items are terminals.
  pub fn is_lexical(&self) -> bool {
    self.rhs.iter().all(Production::is_terminal)
  }

  /// Exactly one category on the rhs.
  pub fn is_unary(&self) -> bool {
    self.len() == 1 && self.rhs[0].is_nonterminal()
  }

  /// Exactly two categories on the rhs.
  pub fn is_binary(&self) -> bool {
    self.len() == 2 && self.rhs.iter().all(Production::is_nonterminal)
  }

  pub fn contains_optionals(&self) -> bool {
    self.rhs.iter().any(Production::is_optional)
  }

  /// The terminal words of a lexical rule.
  pub fn words(&self) -> Vec<String> {
    self
      .rhs
      .iter()
      .map(|p| p.symbol_str().to_string())
      .collect()
  }

  /// Replaces the rule by one rule per combination of present and absent
  /// optional items. The variant with an item present comes before the one
  /// without it.
  pub fn expand_optionals(&self) -> Vec<Rule> {
    let Some(idx) = self.rhs.iter().position(Production::is_optional) else {
      return vec![self.clone()];
    };

    let mut present = self.clone();
    present.rhs[idx] = self.rhs[idx].required().clone();

    let mut absent = self.clone();
    absent.rhs.remove(idx);
    absent.slots.remove(idx);

    let mut expanded = present.expand_optionals();
    if !absent.is_empty() {
      expanded.extend(absent.expand_optionals());
    }
    expanded
  }

  /// Builds this rule's logical form from the forms of the children it
  /// matched, in rhs order. Lexical rules take no children.
  pub fn apply_semantics(
    &self,
    children: &[Option<LogicalForm>],
  ) -> Result<Option<LogicalForm>, SemanticsError> {
    let mut full: Vec<Option<LogicalForm>> = vec![None; self.arity];
    for (slot, child) in self.slots.iter().zip(children) {
      full[*slot] = child.clone();
    }

    let present = || full.iter().flatten().cloned().collect::<Vec<_>>();

    match &self.semantics {
      Semantics::None => Ok(None),
      Semantics::First => Ok(full.first().cloned().flatten()),
      Semantics::Second => Ok(full.get(1).cloned().flatten()),
      Semantics::InOrder => Ok(LogicalForm::tuple(present())),
      Semantics::Reversed => {
        let mut forms = present();
        forms.reverse();
        Ok(LogicalForm::tuple(forms))
      }
      Semantics::Flip => match present().first() {
        Some(form) => flip_direction(form).map(Some),
        None => Err(SemanticsError::MissingChild(0)),
      },
      Semantics::Constant(form) => Ok(Some(form.clone())),
      Semantics::Template(t) => t.instantiate(&full),
    }
  }
}

impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    self.lhs == other.lhs && self.rhs == other.rhs
  }
}

impl Eq for Rule {}

impl Hash for Rule {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.lhs.hash(state);
    self.rhs.hash(state);
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ->", self.lhs)?;
    for p in self.rhs.iter() {
      write!(f, " {}", p)?;
    }
    if self.semantics != Semantics::None {
      write!(f, " => {}", self.semantics)?;
    }
    Ok(())
  }
}
