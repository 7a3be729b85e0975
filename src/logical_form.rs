//! Logical forms: the meaning representation a parse produces.
//!
//! A logical form is a small ordered tree. Internal nodes are headed by an
//! operator tag (`Op`), leaves are literals or bare operator tags. The
//! canonical text form is an s-expression, e.g.
//! `(.call (.lt (.int 2)) (.int 1))`.

use std::fmt;
use std::str::FromStr;

use crate::error::{SemanticsError, SyntaxError};
use crate::parse_grammar;

macro_rules! ops {
  ($($variant:ident => $name:literal),* $(,)?) => {
    /// An operator tag heading a logical form node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Op {
      $($variant),*
    }

    impl Op {
      pub const ALL: &'static [Op] = &[$(Op::$variant),*];

      pub fn name(self) -> &'static str {
        match self {
          $(Op::$variant => $name),*
        }
      }

      pub fn from_name(name: &str) -> Option<Self> {
        match name {
          $($name => Some(Op::$variant),)*
          _ => None,
        }
      }
    }
  };
}

ops! {
  Root => "root",
  Label => "label",
  List => "list",
  Tuple => "tuple",
  And => "and",
  Or => "or",
  Not => "not",
  All => "all",
  Any => "any",
  NoneOf => "none",
  Map => "map",
  Call => "call",
  Sum => "sum",
  Count => "count",
  Lt => "lt",
  Leq => "leq",
  Eq => "eq",
  Neq => "neq",
  Geq => "geq",
  Gt => "gt",
  In => "in",
  StartsWith => "startswith",
  EndsWith => "endswith",
  CompositeAnd => "composite_and",
  CompositeOr => "composite_or",
  Lower => "lower",
  Upper => "upper",
  Capital => "capital",
  UserList => "user_list",
  Arg => "arg",
  ArgToString => "arg_to_string",
  ExtractText => "extract_text",
  Left => "left",
  Right => "right",
  Within => "within",
  Between => "between",
  Sentence => "sentence",
  Filter => "filter",
  Index => "index",
  Words => "words",
  Chars => "chars",
  Ner => "ner",
  Pos => "pos",
}

impl Op {
  pub fn is_comparison(self) -> bool {
    matches!(self, Op::Lt | Op::Leq | Op::Eq | Op::Neq | Op::Geq | Op::Gt)
  }

  pub fn is_direction(self) -> bool {
    matches!(self, Op::Left | Op::Right)
  }
}

impl fmt::Display for Op {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, ".{}", self.name())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogicalForm {
  /// A bare operator, e.g. the `.lt` a comparison word denotes before it is
  /// applied to anything.
  Tag(Op),
  Int(i64),
  Str(String),
  Bool(bool),
  Node(Op, Vec<LogicalForm>),
}

impl LogicalForm {
  pub fn node(op: Op, children: Vec<LogicalForm>) -> Self {
    Self::Node(op, children)
  }

  pub fn string(s: impl Into<String>) -> Self {
    Self::Str(s.into())
  }

  /// Builds a node from an ordered sequence of forms. If the first form is a
  /// bare operator it heads the node, otherwise the forms are collected into
  /// a `.list`.
  pub fn tuple(mut forms: Vec<LogicalForm>) -> Option<Self> {
    match forms.first() {
      None => None,
      Some(Self::Tag(op)) => {
        let op = *op;
        forms.remove(0);
        Some(Self::Node(op, forms))
      }
      Some(_) => Some(Self::Node(Op::List, forms)),
    }
  }

  /// The operator heading this form, if it has one.
  pub fn head(&self) -> Option<Op> {
    match self {
      Self::Tag(op) | Self::Node(op, _) => Some(*op),
      _ => None,
    }
  }

  pub fn children(&self) -> &[LogicalForm] {
    match self {
      Self::Node(_, children) => children,
      _ => &[],
    }
  }

  /// Number of nodes and leaves in the tree.
  pub fn size(&self) -> usize {
    match self {
      Self::Node(_, children) => 1 + children.iter().map(Self::size).sum::<usize>(),
      _ => 1,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Self::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_tag(&self) -> Option<Op> {
    match self {
      Self::Tag(op) => Some(*op),
      _ => None,
    }
  }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
  write!(f, "\"")?;
  for c in s.chars() {
    match c {
      '"' => write!(f, "\\\"")?,
      '\\' => write!(f, "\\\\")?,
      '\n' => write!(f, "\\n")?,
      '\t' => write!(f, "\\t")?,
      c => write!(f, "{}", c)?,
    }
  }
  write!(f, "\"")
}

impl fmt::Display for LogicalForm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Tag(op) => write!(f, "{}", op),
      Self::Int(n) => write!(f, "(.int {})", n),
      Self::Bool(b) => write!(f, "(.bool {})", b),
      Self::Str(s) => {
        write!(f, "(.string ")?;
        write_escaped(f, s)?;
        write!(f, ")")
      }
      Self::Node(op, children) => {
        write!(f, "({}", op)?;
        for child in children {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
    }
  }
}

impl FromStr for LogicalForm {
  type Err = SyntaxError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let template: Template = s.parse()?;
    template
      .into_form()
      .ok_or_else(|| SyntaxError(format!("logical form has holes: {}", s.trim())))
  }
}

/// What heads a template node: a fixed operator, or whatever operator child
/// `N` turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Head {
  Op(Op),
  Hole(usize),
}

/// A logical form with holes, filled in from a rule's children.
///
/// `$N` is child N's form, `..$N` splices child N's children in place, and a
/// node headed by `$N` extends child N (which must be an operator or an
/// operator node) with more arguments. Missing children (skipped optional
/// items) fill nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Template {
  Hole(usize),
  Splice(usize),
  Form(LogicalForm),
  Node(Head, Vec<Template>),
}

impl Template {
  /// The largest child index the template refers to.
  pub fn max_hole(&self) -> Option<usize> {
    match self {
      Self::Hole(n) | Self::Splice(n) => Some(*n),
      Self::Form(_) => None,
      Self::Node(head, items) => {
        let head = match head {
          Head::Hole(n) => Some(*n),
          Head::Op(_) => None,
        };
        items.iter().filter_map(Self::max_hole).chain(head).max()
      }
    }
  }

  /// Converts a template without holes into the form it denotes.
  pub fn into_form(self) -> Option<LogicalForm> {
    match self {
      Self::Hole(_) | Self::Splice(_) | Self::Node(Head::Hole(_), _) => None,
      Self::Form(form) => Some(form),
      Self::Node(Head::Op(op), items) => {
        let children = items
          .into_iter()
          .map(Self::into_form)
          .collect::<Option<Vec<_>>>()?;
        Some(LogicalForm::Node(op, children))
      }
    }
  }

  pub fn instantiate(
    &self,
    children: &[Option<LogicalForm>],
  ) -> Result<Option<LogicalForm>, SemanticsError> {
    match self {
      Self::Hole(n) => Ok(children.get(*n).cloned().flatten()),
      Self::Splice(n) => Err(SemanticsError::NotAnOperator(format!("..${} at top level", n))),
      Self::Form(form) => Ok(Some(form.clone())),
      Self::Node(head, items) => {
        let mut args = Vec::with_capacity(items.len());
        for item in items {
          match item {
            Self::Splice(n) => match children.get(*n) {
              Some(Some(LogicalForm::Node(_, spliced))) => args.extend(spliced.iter().cloned()),
              Some(Some(other)) => {
                return Err(SemanticsError::NotAnOperator(other.to_string()));
              }
              _ => {}
            },
            item => {
              if let Some(form) = item.instantiate(children)? {
                args.push(form);
              }
            }
          }
        }

        match head {
          Head::Op(op) => Ok(Some(LogicalForm::Node(*op, args))),
          Head::Hole(n) => match children.get(*n) {
            Some(Some(LogicalForm::Tag(op))) => Ok(Some(LogicalForm::Node(*op, args))),
            Some(Some(LogicalForm::Node(op, pre))) => {
              let mut extended = pre.clone();
              extended.extend(args);
              Ok(Some(LogicalForm::Node(*op, extended)))
            }
            Some(Some(other)) => Err(SemanticsError::NotAnOperator(other.to_string())),
            _ => Err(SemanticsError::MissingChild(*n)),
          },
        }
      }
    }
  }
}

impl fmt::Display for Template {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Hole(n) => write!(f, "${}", n),
      Self::Splice(n) => write!(f, "..${}", n),
      Self::Form(form) => write!(f, "{}", form),
      Self::Node(head, items) => {
        match head {
          Head::Op(op) => write!(f, "({}", op)?,
          Head::Hole(n) => write!(f, "(${}", n)?,
        }
        for item in items {
          write!(f, " {}", item)?;
        }
        write!(f, ")")
      }
    }
  }
}

impl FromStr for Template {
  type Err = SyntaxError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_grammar::read_template(s)
  }
}

fn comparison_symbol(op: Op) -> Option<&'static str> {
  match op {
    Op::Lt => Some("<"),
    Op::Leq => Some("<="),
    Op::Eq => Some("=="),
    Op::Neq => Some("!="),
    Op::Geq => Some(">="),
    Op::Gt => Some(">"),
    Op::In => Some("in"),
    _ => None,
  }
}

fn translate_all(forms: &[LogicalForm], sep: &str) -> String {
  forms.iter().map(translate).collect::<Vec<_>>().join(sep)
}

/// Renders a logical form as a readable, python-flavoured expression.
///
/// Distinct forms render differently: literals are always quoted or typed and
/// anything without a dedicated rendering falls back to `name(args)`.
pub fn translate(lf: &LogicalForm) -> String {
  use LogicalForm as L;

  match lf {
    L::Tag(op) => op.name().to_string(),
    L::Int(n) => n.to_string(),
    L::Bool(true) => "True".to_string(),
    L::Bool(false) => "False".to_string(),
    L::Str(s) => format!("{:?}", s),
    L::Node(op, children) => match (op, children.as_slice()) {
      (Op::Root, [inner]) => format!("def lf(c): {}", translate(inner)),
      (Op::Label, [label, condition]) => {
        format!("return {} if {} else 0", translate(label), translate(condition))
      }
      (Op::And, [_, _, ..]) => format!("({})", translate_all(children, " and ")),
      (Op::Or, [_, _, ..]) => format!("({})", translate_all(children, " or ")),
      (Op::Not, [inner]) => format!("not {}", translate(inner)),
      (Op::List, _) => format!("[{}]", translate_all(children, ", ")),
      (Op::Tuple, [L::Node(Op::List, items)]) => format!("({})", translate_all(items, ", ")),
      (Op::Arg, [L::Int(1)]) => "X".to_string(),
      (Op::Arg, [L::Int(2)]) => "Y".to_string(),
      (Op::ArgToString, [arg]) => format!("str({})", translate(arg)),
      (Op::ExtractText, [phrase]) => format!("text({})", translate(phrase)),
      (Op::UserList, [L::Str(name)]) => format!("aliases[{:?}]", name),
      (Op::Call, [L::Node(cmp, bound), subject]) if bound.len() == 1 => {
        match comparison_symbol(*cmp) {
          Some(symbol) => format!(
            "({} {} {})",
            translate(subject),
            symbol,
            translate(&bound[0])
          ),
          None => format!("{}({})", translate(&children[0]), translate(subject)),
        }
      }
      (Op::Call, [func, subject]) => format!("{}({})", translate(func), translate(subject)),
      (Op::Map, [func, list]) => format!("map({}, {})", translate(func), translate(list)),
      _ => format!("{}({})", op.name(), translate_all(children, ", ")),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn lf(s: &str) -> LogicalForm {
    s.parse().unwrap()
  }

  #[test]
  fn test_op_names_round_trip() {
    for op in Op::ALL {
      assert_eq!(Op::from_name(op.name()), Some(*op));
    }
    assert_eq!(Op::from_name("frobnicate"), None);
  }

  #[test]
  fn test_display_reads_back() {
    let form = LogicalForm::node(
      Op::Root,
      vec![LogicalForm::node(
        Op::Label,
        vec![
          LogicalForm::Int(1),
          LogicalForm::node(
            Op::Call,
            vec![
              LogicalForm::node(Op::In, vec![LogicalForm::string("say \"hi\"\\")]),
              LogicalForm::Tag(Op::Words),
            ],
          ),
        ],
      )],
    );
    let printed = form.to_string();
    assert_eq!(
      printed,
      r#"(.root (.label (.int 1) (.call (.in (.string "say \"hi\"\\")) .words)))"#
    );
    assert_eq!(lf(&printed), form);
  }

  #[test]
  fn test_structural_equality_is_order_sensitive() {
    assert_eq!(lf("(.and (.bool true) (.bool false))"), lf("(.and (.bool true) (.bool false))"));
    assert_ne!(lf("(.and (.bool true) (.bool false))"), lf("(.and (.bool false) (.bool true))"));
  }

  #[test]
  fn test_size() {
    assert_eq!(lf("(.int 1)").size(), 1);
    assert_eq!(lf("(.call (.lt (.int 2)) (.int 1))").size(), 4);
  }

  #[test]
  fn test_tuple() {
    assert_eq!(
      LogicalForm::tuple(vec![LogicalForm::Tag(Op::Not), LogicalForm::Bool(false)]),
      Some(lf("(.not (.bool false))"))
    );
    assert_eq!(
      LogicalForm::tuple(vec![LogicalForm::Int(1), LogicalForm::Int(2)]),
      Some(lf("(.list (.int 1) (.int 2))"))
    );
    assert_eq!(LogicalForm::tuple(Vec::new()), None);
  }

  #[test]
  fn test_template_holes_and_splices() {
    let t: Template = "(.list $0 ..$2)".parse().unwrap();
    let children = vec![
      Some(LogicalForm::Int(1)),
      None,
      Some(lf("(.list (.int 2) (.int 3))")),
    ];
    assert_eq!(
      t.instantiate(&children).unwrap(),
      Some(lf("(.list (.int 1) (.int 2) (.int 3))"))
    );
    assert_eq!(t.max_hole(), Some(2));
  }

  #[test]
  fn test_template_head_hole() {
    let t: Template = "($1 $0 $2)".parse().unwrap();
    let children = vec![
      Some(LogicalForm::Bool(true)),
      Some(LogicalForm::Tag(Op::And)),
      Some(LogicalForm::Bool(false)),
    ];
    assert_eq!(
      t.instantiate(&children).unwrap(),
      Some(lf("(.and (.bool true) (.bool false))"))
    );

    // an operator node is extended with the new arguments
    let t: Template = "($0 $1 .eq (.int 2) .words)".parse().unwrap();
    let children = vec![Some(LogicalForm::Tag(Op::Left)), Some(lf("(.arg (.int 2))"))];
    assert_eq!(
      t.instantiate(&children).unwrap(),
      Some(lf("(.left (.arg (.int 2)) .eq (.int 2) .words)"))
    );

    let children = vec![Some(LogicalForm::Int(3)), Some(LogicalForm::Int(4))];
    assert!(matches!(t.instantiate(&children), Err(SemanticsError::NotAnOperator(_))));
  }

  #[test]
  fn test_template_skips_missing_children() {
    let t: Template = "(.label $1 $3)".parse().unwrap();
    let children = vec![None, Some(LogicalForm::Int(1)), None, None, None];
    assert_eq!(t.instantiate(&children).unwrap(), Some(lf("(.label (.int 1))")));
  }

  #[test]
  fn test_template_without_holes_is_a_form() {
    let t: Template = "(.filter $0 .words (.string \"\\\\w\"))".parse().unwrap();
    assert_eq!(t.clone().into_form(), None);
    let t: Template = "(.sentence)".parse().unwrap();
    assert_eq!(t.into_form(), Some(LogicalForm::node(Op::Sentence, Vec::new())));
  }

  #[test]
  fn test_translate() {
    assert_eq!(
      translate(&lf("(.root (.label (.int 1) (.call (.lt (.int 2)) (.int 1))))")),
      "def lf(c): return 1 if (1 < 2) else 0"
    );
    assert_eq!(
      translate(&lf("(.or (.bool true) (.and (.bool true) (.bool false)))")),
      "(True or (True and False))"
    );
    assert_eq!(
      translate(&lf("(.call (.composite_and .lt (.list (.int 3) (.int 4))) (.int 2))")),
      "composite_and(lt, [3, 4])(2)"
    );
    assert_eq!(
      translate(&lf("(.call (.in (.extract_text (.left (.arg (.int 2))))) (.string \"wife\"))")),
      "(\"wife\" in text(left(Y)))"
    );
  }

  #[test]
  fn test_translate_distinguishes_literals() {
    assert_ne!(translate(&lf("(.int 1)")), translate(&lf("(.string \"1\")")));
    assert_ne!(translate(&lf("(.bool true)")), translate(&lf("(.string \"True\")")));
    assert_ne!(
      translate(&lf("(.user_list (.string \"x\"))")),
      translate(&lf("(.arg (.int 1))"))
    );
    let root = lf("(.root (.label (.int 1) (.bool true)))");
    let LogicalForm::Node(Op::Root, inner) = &root else {
      panic!("not a root: {}", root);
    };
    assert_ne!(translate(&root), translate(&inner[0]));
    assert_eq!(translate(&inner[0]), "return 1 if True else 0");
  }
}
