//! Compiles logical forms into labeling functions.
//!
//! Compilation walks the form once, checks that every operator gets the
//! argument shapes and types it needs, and produces an `Expr` tree. Applying
//! the resulting function to a candidate evaluates that tree against the
//! primitive library.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;

use crate::ABSTAIN;
use crate::candidate::{Argument, Candidate};
use crate::error::{CompileError, EvaluationError, PrimitiveError};
use crate::logical_form::{LogicalForm, Op};
use crate::primitives::{self, Cmp, Field, PhraseSpan, Unit, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
  Bool,
  Int,
  Str,
  List,
  Tuple,
  Phrase,
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Bool => "bool",
      Self::Int => "int",
      Self::Str => "string",
      Self::List => "list",
      Self::Tuple => "tuple",
      Self::Phrase => "phrase",
    };
    write!(f, "{}", name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Bool(bool),
  Int(i64),
  Str(String),
  List(Vec<Value>),
  Tuple(Vec<Value>),
  Phrase(PhraseSpan),
}

impl Value {
  pub fn type_of(&self) -> Type {
    match self {
      Self::Bool(_) => Type::Bool,
      Self::Int(_) => Type::Int,
      Self::Str(_) => Type::Str,
      Self::List(_) => Type::List,
      Self::Tuple(_) => Type::Tuple,
      Self::Phrase(_) => Type::Phrase,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
  All,
  Any,
  NoneOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Junction {
  And,
  Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
  Lower,
  Upper,
  Capital,
}

/// A binary test between a subject and a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
  Cmp(Cmp),
  In,
  StartsWith,
  EndsWith,
}

impl Primitive {
  fn from_op(op: Op) -> Option<Self> {
    match op {
      Op::In => Some(Self::In),
      Op::StartsWith => Some(Self::StartsWith),
      Op::EndsWith => Some(Self::EndsWith),
      op => Cmp::from_op(op).map(Self::Cmp),
    }
  }

  fn name(self) -> &'static str {
    match self {
      Self::Cmp(cmp) => cmp.name(),
      Self::In => "in",
      Self::StartsWith => "startswith",
      Self::EndsWith => "endswith",
    }
  }
}

/// A one-argument predicate.
#[derive(Debug, Clone)]
pub enum Func {
  /// `subject <primitive> bound`
  Bound(Primitive, Box<Expr>),
  /// The primitive against every member of a list, joined with and/or.
  Composite(Junction, Primitive, Box<Expr>),
  Case(Case),
}

#[derive(Debug, Clone)]
pub enum Expr {
  Bool(bool),
  Int(i64),
  Str(String),
  List(Vec<Expr>),
  Tuple(Box<Expr>),
  And(Vec<Expr>),
  Or(Vec<Expr>),
  Not(Box<Expr>),
  Quantified(Quantifier, Box<Expr>),
  Map(Func, Box<Expr>),
  Call(Func, Box<Expr>),
  Sum(Box<Expr>),
  Count(Box<Expr>),
  UserList(Vec<String>),
  Arg(Argument),
  Text(Box<Expr>),
  Left(Box<Expr>, Option<Window>),
  Right(Box<Expr>, Option<Window>),
  Within(Box<Expr>, i64, Unit),
  Between(Box<Expr>, Box<Expr>),
  Sentence,
  Filter(Box<Expr>, Field, Regex),
  Index(Box<Expr>, i64, Unit),
}

/// The subject types a function can be called on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accepts {
  Any,
  Only(Type),
  OneOf(&'static [Type]),
}

impl Accepts {
  fn allows(self, ty: Type) -> bool {
    match self {
      Self::Any => true,
      Self::Only(only) => only == ty,
      Self::OneOf(types) => types.contains(&ty),
    }
  }
}

impl fmt::Display for Accepts {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Any => write!(f, "anything"),
      Self::Only(ty) => write!(f, "{}", ty),
      Self::OneOf(types) => {
        let names: Vec<String> = types.iter().map(Type::to_string).collect();
        write!(f, "{}", names.join(" or "))
      }
    }
  }
}

/// What compilation knows about a value's type. Lists and tuples also carry
/// the type all their elements share, `None` when they are empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shape {
  ty: Type,
  elem: Option<Type>,
}

impl Shape {
  fn of(ty: Type) -> Self {
    Self { ty, elem: None }
  }

  fn list(elem: Option<Type>) -> Self {
    Self {
      ty: Type::List,
      elem,
    }
  }
}

fn malformed(lf: &LogicalForm, reason: impl Into<String>) -> CompileError {
  CompileError::Malformed {
    form: lf.to_string(),
    reason: reason.into(),
  }
}

fn type_error(lf: &LogicalForm, expected: impl fmt::Display, found: Type) -> CompileError {
  CompileError::Type {
    form: lf.to_string(),
    expected: expected.to_string(),
    found,
  }
}

/// Turns logical forms into labeling functions. Holds the alias lists that
/// `.user_list` nodes refer to.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
  aliases: BTreeMap<String, Vec<String>>,
}

impl Interpreter {
  pub fn new(aliases: BTreeMap<String, Vec<String>>) -> Self {
    Self { aliases }
  }

  /// Compiles a `(.root (.label L condition))` form.
  pub fn compile(
    &self,
    lf: &LogicalForm,
    name: impl Into<String>,
  ) -> Result<LabelingFunction, CompileError> {
    let LogicalForm::Node(Op::Root, root) = lf else {
      return Err(malformed(lf, "expected a .root node"));
    };
    let [LogicalForm::Node(Op::Label, labelled)] = root.as_slice() else {
      return Err(malformed(lf, "expected .root to hold a single .label node"));
    };
    let [label, condition] = labelled.as_slice() else {
      return Err(malformed(lf, "expected .label to hold a label and a condition"));
    };
    let Some(label) = label.as_int() else {
      return Err(malformed(label, "labels are integers"));
    };

    Ok(LabelingFunction {
      name: name.into(),
      label,
      condition: self.expect(condition, Type::Bool)?,
    })
  }

  fn expect(&self, lf: &LogicalForm, ty: Type) -> Result<Expr, CompileError> {
    let (expr, found) = self.compile_expr(lf)?;
    if found.ty != ty {
      return Err(type_error(lf, ty, found.ty));
    }
    Ok(expr)
  }

  fn expect_boxed(&self, lf: &LogicalForm, ty: Type) -> Result<Box<Expr>, CompileError> {
    self.expect(lf, ty).map(Box::new)
  }

  /// Compiles a list, returning the type of its elements too.
  fn expect_list(&self, lf: &LogicalForm) -> Result<(Box<Expr>, Option<Type>), CompileError> {
    let (expr, found) = self.compile_expr(lf)?;
    if found.ty != Type::List {
      return Err(type_error(lf, Type::List, found.ty));
    }
    Ok((Box::new(expr), found.elem))
  }

  fn window(&self, lf: &LogicalForm, rest: &[LogicalForm]) -> Result<Option<Window>, CompileError> {
    match rest {
      [] => Ok(None),
      [LogicalForm::Tag(cmp), LogicalForm::Int(num), LogicalForm::Tag(unit)] => {
        let cmp = Cmp::from_op(*cmp).ok_or_else(|| malformed(lf, "window needs a comparison"))?;
        let unit = Unit::from_op(*unit).ok_or_else(|| malformed(lf, "window needs .words or .chars"))?;
        Ok(Some(Window { cmp, num: *num, unit }))
      }
      _ => Err(malformed(lf, "expected a window of comparison, count and unit")),
    }
  }

  fn compile_expr(&self, lf: &LogicalForm) -> Result<(Expr, Shape), CompileError> {
    use LogicalForm as L;

    let args = match lf {
      L::Bool(b) => return Ok((Expr::Bool(*b), Shape::of(Type::Bool))),
      L::Int(n) => return Ok((Expr::Int(*n), Shape::of(Type::Int))),
      L::Str(s) => return Ok((Expr::Str(s.clone()), Shape::of(Type::Str))),
      L::Tag(op) => return Err(malformed(lf, format!("{} is not a value", op))),
      L::Node(_, args) => args.as_slice(),
    };
    let Some(op) = lf.head() else {
      return Err(malformed(lf, "expected an operator"));
    };

    let compiled = match (op, args) {
      (Op::List, items) => {
        let mut exprs = Vec::with_capacity(items.len());
        let mut elem = None;
        for item in items {
          let (expr, found) = self.compile_expr(item)?;
          match elem {
            Some(first) if first != found.ty => {
              return Err(type_error(lf, format!("list of {}", first), found.ty));
            }
            _ => elem = Some(found.ty),
          }
          exprs.push(expr);
        }
        (Expr::List(exprs), Shape::list(elem))
      }
      (Op::Tuple, [inner]) => {
        let (inner, elem) = self.expect_list(inner)?;
        (Expr::Tuple(inner), Shape { ty: Type::Tuple, elem })
      }
      (Op::And | Op::Or, [_, _, ..]) => {
        let items = args
          .iter()
          .map(|arg| self.expect(arg, Type::Bool))
          .collect::<Result<_, _>>()?;
        let expr = if op == Op::And {
          Expr::And(items)
        } else {
          Expr::Or(items)
        };
        (expr, Shape::of(Type::Bool))
      }
      (Op::Not, [inner]) => (
        Expr::Not(self.expect_boxed(inner, Type::Bool)?),
        Shape::of(Type::Bool),
      ),
      (Op::All | Op::Any | Op::NoneOf, [list]) => {
        let quantifier = match op {
          Op::All => Quantifier::All,
          Op::Any => Quantifier::Any,
          _ => Quantifier::NoneOf,
        };
        let (list, elem) = self.expect_list(list)?;
        check_elements(lf, elem, Accepts::Only(Type::Bool))?;
        (Expr::Quantified(quantifier, list), Shape::of(Type::Bool))
      }
      (Op::Map, [func, list]) => {
        let (func, accepts) = self.compile_func(func)?;
        let (list, elem) = self.expect_list(list)?;
        check_elements(lf, elem, accepts)?;
        (Expr::Map(func, list), Shape::list(Some(Type::Bool)))
      }
      (Op::Call, [func, subject]) => {
        let (func, accepts) = self.compile_func(func)?;
        let (subject_expr, found) = self.compile_expr(subject)?;
        if !accepts.allows(found.ty) {
          return Err(type_error(lf, accepts, found.ty));
        }
        (Expr::Call(func, Box::new(subject_expr)), Shape::of(Type::Bool))
      }
      (Op::Sum, [list]) => {
        let (list, elem) = self.expect_list(list)?;
        check_elements(lf, elem, Accepts::OneOf(&[Type::Bool, Type::Int]))?;
        (Expr::Sum(list), Shape::of(Type::Int))
      }
      (Op::Count, [list]) => (Expr::Count(self.expect_list(list)?.0), Shape::of(Type::Int)),
      (Op::UserList, [L::Str(name)]) => {
        let members = self
          .aliases
          .get(name)
          .ok_or_else(|| CompileError::UnknownAlias(name.clone()))?;
        (Expr::UserList(members.clone()), Shape::list(Some(Type::Str)))
      }
      (Op::Arg, [L::Int(n)]) => {
        let arg = Argument::from_index(*n).ok_or_else(|| malformed(lf, "arguments are 1 or 2"))?;
        (Expr::Arg(arg), Shape::of(Type::Phrase))
      }
      (Op::ArgToString | Op::ExtractText, [phrase]) => {
        (Expr::Text(self.expect_boxed(phrase, Type::Phrase)?), Shape::of(Type::Str))
      }
      (Op::Left | Op::Right, [phrase, rest @ ..]) => {
        let phrase = self.expect_boxed(phrase, Type::Phrase)?;
        let window = self.window(lf, rest)?;
        let expr = if op == Op::Left {
          Expr::Left(phrase, window)
        } else {
          Expr::Right(phrase, window)
        };
        (expr, Shape::of(Type::Phrase))
      }
      (Op::Within, [phrase, L::Int(num), L::Tag(unit)]) => {
        let unit = Unit::from_op(*unit).ok_or_else(|| malformed(lf, "expected .words or .chars"))?;
        let phrase = self.expect_boxed(phrase, Type::Phrase)?;
        (Expr::Within(phrase, *num, unit), Shape::of(Type::Phrase))
      }
      (Op::Between, [L::Node(Op::List, pair)]) if pair.len() == 2 => {
        let a = self.expect_boxed(&pair[0], Type::Phrase)?;
        let b = self.expect_boxed(&pair[1], Type::Phrase)?;
        (Expr::Between(a, b), Shape::of(Type::Phrase))
      }
      (Op::Sentence, []) => (Expr::Sentence, Shape::of(Type::Phrase)),
      (Op::Filter, [phrase, L::Tag(field), L::Str(pattern)]) => {
        let field = Field::from_op(*field).ok_or_else(|| malformed(lf, "can't filter on that"))?;
        let anchored = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| CompileError::Pattern {
          pattern: pattern.clone(),
          source,
        })?;
        let phrase = self.expect_boxed(phrase, Type::Phrase)?;
        (Expr::Filter(phrase, field, anchored), Shape::list(Some(Type::Str)))
      }
      (Op::Index, [phrase, L::Int(ordinal), L::Tag(unit)]) => {
        let unit = Unit::from_op(*unit).ok_or_else(|| malformed(lf, "expected .words or .chars"))?;
        let phrase = self.expect_boxed(phrase, Type::Phrase)?;
        (Expr::Index(phrase, *ordinal, unit), Shape::of(Type::Str))
      }
      (op, _) if Primitive::from_op(op).is_some() => {
        return Err(malformed(lf, format!("{} is a function, not a value", op)));
      }
      (op, _) => return Err(malformed(lf, format!("unexpected arguments to {}", op))),
    };
    Ok(compiled)
  }

  fn compile_func(&self, lf: &LogicalForm) -> Result<(Func, Accepts), CompileError> {
    use LogicalForm as L;

    match lf {
      L::Tag(Op::Lower) => Ok((Func::Case(Case::Lower), Accepts::Only(Type::Str))),
      L::Tag(Op::Upper) => Ok((Func::Case(Case::Upper), Accepts::Only(Type::Str))),
      L::Tag(Op::Capital) => Ok((Func::Case(Case::Capital), Accepts::Only(Type::Str))),
      L::Node(op @ (Op::CompositeAnd | Op::CompositeOr), args) => {
        let [L::Tag(prim), list] = args.as_slice() else {
          return Err(malformed(lf, "expected a primitive and a list"));
        };
        let prim =
          Primitive::from_op(*prim).ok_or_else(|| malformed(lf, format!("{} is not a primitive", prim)))?;
        let junction = if *op == Op::CompositeAnd {
          Junction::And
        } else {
          Junction::Or
        };
        // each element is a bound in turn; an empty list never calls the primitive
        let (list, elem) = self.expect_list(list)?;
        let accepts = match elem {
          Some(ty) => bound_accepts(lf, prim, Shape::of(ty))?,
          None => Accepts::Any,
        };
        Ok((Func::Composite(junction, prim, list), accepts))
      }
      L::Node(op, args) => {
        let Some(prim) = Primitive::from_op(*op) else {
          return Err(malformed(lf, "not a function"));
        };
        let [bound] = args.as_slice() else {
          return Err(malformed(lf, "a primitive takes one bound argument"));
        };
        let (bound_expr, found) = self.compile_expr(bound)?;
        let accepts = bound_accepts(lf, prim, found)?;
        Ok((Func::Bound(prim, Box::new(bound_expr)), accepts))
      }
      _ => Err(malformed(lf, "not a function")),
    }
  }
}

/// The subjects `prim` can take when its bound argument has type `bound`.
fn bound_accepts(lf: &LogicalForm, prim: Primitive, bound: Shape) -> Result<Accepts, CompileError> {
  let ty = bound.ty;
  Ok(match (prim, ty) {
    (Primitive::Cmp(Cmp::Eq | Cmp::Neq), _) => Accepts::Any,
    (Primitive::Cmp(_), Type::Int | Type::Str) => Accepts::Only(ty),
    (Primitive::Cmp(_), _) => return Err(type_error(lf, "int or string", ty)),
    (Primitive::In, Type::Str) => Accepts::Only(Type::Str),
    (Primitive::In, Type::List | Type::Tuple) => Accepts::Any,
    (Primitive::In, _) => return Err(type_error(lf, "string or list", ty)),
    (Primitive::StartsWith | Primitive::EndsWith, Type::Str) => Accepts::Only(Type::Str),
    (Primitive::StartsWith | Primitive::EndsWith, Type::List) => {
      check_elements(lf, bound.elem, Accepts::Only(Type::Str))?;
      Accepts::Only(Type::Str)
    }
    (Primitive::StartsWith | Primitive::EndsWith, _) => {
      return Err(type_error(lf, "string or list", ty));
    }
  })
}

/// Fails unless every element of a list with element type `elem` is
/// something `accepts` allows. Empty lists pass.
fn check_elements(lf: &LogicalForm, elem: Option<Type>, accepts: Accepts) -> Result<(), CompileError> {
  match elem {
    Some(ty) if !accepts.allows(ty) => Err(type_error(lf, format!("list of {}", accepts), ty)),
    _ => Ok(()),
  }
}

/// A compiled explanation: returns its label when the condition holds on a
/// candidate and `ABSTAIN` otherwise.
#[derive(Debug, Clone)]
pub struct LabelingFunction {
  pub name: String,
  pub label: i64,
  condition: Expr,
}

impl LabelingFunction {
  pub fn apply(&self, candidate: &dyn Candidate) -> Result<i64, EvaluationError> {
    let evaluator = Evaluator { candidate };
    let fired = evaluator
      .eval(&self.condition)
      .and_then(|value| truth("label", value))
      .map_err(|cause| EvaluationError {
        function: self.name.clone(),
        candidate: candidate.id().to_string(),
        cause,
      })?;
    Ok(if fired { self.label } else { ABSTAIN })
  }
}

fn mismatch(op: &'static str, left: &Value, right: Type) -> PrimitiveError {
  PrimitiveError::TypeMismatch {
    op,
    left: left.type_of(),
    right,
  }
}

fn truth(op: &'static str, value: Value) -> Result<bool, PrimitiveError> {
  match value {
    Value::Bool(b) => Ok(b),
    other => Err(mismatch(op, &other, Type::Bool)),
  }
}

fn elements(op: &'static str, value: Value) -> Result<Vec<Value>, PrimitiveError> {
  match value {
    Value::List(items) | Value::Tuple(items) => Ok(items),
    other => Err(mismatch(op, &other, Type::List)),
  }
}

fn phrase(op: &'static str, value: Value) -> Result<PhraseSpan, PrimitiveError> {
  match value {
    Value::Phrase(p) => Ok(p),
    other => Err(mismatch(op, &other, Type::Phrase)),
  }
}

fn is_lower(s: &str) -> bool {
  s.chars().any(char::is_lowercase) && !s.chars().any(char::is_uppercase)
}

fn is_upper(s: &str) -> bool {
  s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}

fn apply_primitive(prim: Primitive, subject: &Value, bound: &Value) -> Result<bool, PrimitiveError> {
  let name = prim.name();
  match prim {
    Primitive::Cmp(Cmp::Eq) => Ok(subject == bound),
    Primitive::Cmp(Cmp::Neq) => Ok(subject != bound),
    Primitive::Cmp(cmp) => match (subject, bound) {
      (Value::Int(a), Value::Int(b)) => Ok(cmp.holds(a, b)),
      (Value::Str(a), Value::Str(b)) => Ok(cmp.holds(a, b)),
      _ => Err(mismatch(name, subject, bound.type_of())),
    },
    Primitive::In => match (subject, bound) {
      (Value::Str(needle), Value::Str(haystack)) => Ok(haystack.contains(needle.as_str())),
      (Value::Int(n), Value::Str(haystack)) => Ok(haystack.contains(&n.to_string())),
      (_, Value::List(members) | Value::Tuple(members)) => Ok(members.contains(subject)),
      _ => Err(mismatch(name, subject, bound.type_of())),
    },
    Primitive::StartsWith | Primitive::EndsWith => {
      let Value::Str(s) = subject else {
        return Err(mismatch(name, subject, bound.type_of()));
      };
      let test = |affix: &str| {
        if prim == Primitive::StartsWith {
          s.starts_with(affix)
        } else {
          s.ends_with(affix)
        }
      };
      match bound {
        Value::Str(affix) => Ok(test(affix.as_str())),
        Value::List(affixes) | Value::Tuple(affixes) => {
          for affix in affixes {
            match affix {
              Value::Str(affix) if test(affix.as_str()) => return Ok(true),
              Value::Str(_) => {}
              other => return Err(mismatch(name, subject, other.type_of())),
            }
          }
          Ok(false)
        }
        other => Err(mismatch(name, subject, other.type_of())),
      }
    }
  }
}

struct Evaluator<'c> {
  candidate: &'c dyn Candidate,
}

impl Evaluator<'_> {
  fn eval(&self, expr: &Expr) -> Result<Value, PrimitiveError> {
    let c = self.candidate;
    Ok(match expr {
      Expr::Bool(b) => Value::Bool(*b),
      Expr::Int(n) => Value::Int(*n),
      Expr::Str(s) => Value::Str(s.clone()),
      Expr::List(items) => Value::List(items.iter().map(|e| self.eval(e)).collect::<Result<_, _>>()?),
      Expr::Tuple(inner) => Value::Tuple(elements("tuple", self.eval(inner)?)?),
      Expr::And(conjuncts) => {
        for conjunct in conjuncts {
          if !truth("and", self.eval(conjunct)?)? {
            return Ok(Value::Bool(false));
          }
        }
        Value::Bool(true)
      }
      Expr::Or(disjuncts) => {
        for disjunct in disjuncts {
          if truth("or", self.eval(disjunct)?)? {
            return Ok(Value::Bool(true));
          }
        }
        Value::Bool(false)
      }
      Expr::Not(inner) => Value::Bool(!truth("not", self.eval(inner)?)?),
      Expr::Quantified(quantifier, list) => {
        let values = elements("quantifier", self.eval(list)?)?
          .into_iter()
          .map(|v| truth("quantifier", v))
          .collect::<Result<Vec<bool>, _>>()?;
        Value::Bool(match quantifier {
          Quantifier::All => values.iter().all(|b| *b),
          Quantifier::Any => values.iter().any(|b| *b),
          Quantifier::NoneOf => !values.iter().any(|b| *b),
        })
      }
      Expr::Map(func, list) => Value::List(
        elements("map", self.eval(list)?)?
          .iter()
          .map(|item| self.apply_func(func, item).map(Value::Bool))
          .collect::<Result<_, _>>()?,
      ),
      Expr::Call(func, subject) => Value::Bool(self.apply_func(func, &self.eval(subject)?)?),
      Expr::Sum(list) => {
        let mut total: i64 = 0;
        for item in elements("sum", self.eval(list)?)? {
          let n = match item {
            Value::Bool(b) => b as i64,
            Value::Int(n) => n,
            other => return Err(mismatch("sum", &other, Type::Int)),
          };
          total = total
            .checked_add(n)
            .ok_or(PrimitiveError::Overflow { op: "sum" })?;
        }
        Value::Int(total)
      }
      Expr::Count(list) => Value::Int(elements("count", self.eval(list)?)?.len() as i64),
      Expr::UserList(members) => Value::List(members.iter().cloned().map(Value::Str).collect()),
      Expr::Arg(arg) => Value::Phrase(primitives::argument(c, *arg)),
      Expr::Text(p) => Value::Str(primitives::text(c, phrase("text", self.eval(p)?)?)?.to_string()),
      Expr::Left(p, window) => Value::Phrase(primitives::left(c, phrase("left", self.eval(p)?)?, *window)),
      Expr::Right(p, window) => {
        Value::Phrase(primitives::right(c, phrase("right", self.eval(p)?)?, *window))
      }
      Expr::Within(p, num, unit) => {
        Value::Phrase(primitives::within(c, phrase("within", self.eval(p)?)?, *num, *unit)?)
      }
      Expr::Between(a, b) => Value::Phrase(primitives::between(
        phrase("between", self.eval(a)?)?,
        phrase("between", self.eval(b)?)?,
      )),
      Expr::Sentence => Value::Phrase(primitives::sentence(c)),
      Expr::Filter(p, field, pattern) => Value::List(
        primitives::filter(c, phrase("filter", self.eval(p)?)?, *field, pattern)?
          .into_iter()
          .map(Value::Str)
          .collect(),
      ),
      Expr::Index(p, ordinal, unit) => {
        Value::Str(primitives::index(c, phrase("index", self.eval(p)?)?, *ordinal, *unit)?)
      }
    })
  }

  fn apply_func(&self, func: &Func, subject: &Value) -> Result<bool, PrimitiveError> {
    match func {
      Func::Bound(prim, bound) => apply_primitive(*prim, subject, &self.eval(bound)?),
      Func::Composite(junction, prim, list) => {
        let bounds = elements(prim.name(), self.eval(list)?)?;
        for bound in bounds.iter() {
          let holds = apply_primitive(*prim, subject, bound)?;
          match junction {
            Junction::And if !holds => return Ok(false),
            Junction::Or if holds => return Ok(true),
            _ => {}
          }
        }
        Ok(*junction == Junction::And)
      }
      Func::Case(case) => {
        let Value::Str(s) = subject else {
          return Err(mismatch("case", subject, Type::Str));
        };
        Ok(match case {
          Case::Lower => is_lower(s),
          Case::Upper => is_upper(s),
          Case::Capital => s.chars().next().is_some_and(char::is_uppercase),
        })
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::candidate::RelationMention;
  use crate::candidate::fixtures::ammann;
  use pretty_assertions::assert_eq;

  fn interpreter() -> Interpreter {
    let mut aliases = BTreeMap::new();
    aliases.insert("spouse".to_string(), vec!["wife".to_string(), "husband".to_string()]);
    Interpreter::new(aliases)
  }

  fn labelled(condition: &str) -> LogicalForm {
    format!("(.root (.label (.int 1) {}))", condition).parse().unwrap()
  }

  fn compile(condition: &str) -> Result<LabelingFunction, CompileError> {
    interpreter().compile(&labelled(condition), "test")
  }

  fn run(condition: &str, candidate: &dyn Candidate) -> Result<i64, EvaluationError> {
    compile(condition).unwrap().apply(candidate)
  }

  fn label_on_pair(condition: &str) -> i64 {
    run(condition, &RelationMention::pair("foo", "bar")).unwrap()
  }

  #[test]
  fn test_literals_and_logic() {
    assert_eq!(label_on_pair("(.bool true)"), 1);
    assert_eq!(label_on_pair("(.bool false)"), ABSTAIN);
    assert_eq!(label_on_pair("(.and (.bool true) (.bool true))"), 1);
    assert_eq!(label_on_pair("(.or (.bool false) (.bool true))"), 1);
    assert_eq!(label_on_pair("(.not (.or (.bool false) (.bool true)))"), ABSTAIN);
  }

  #[test]
  fn test_label_is_returned_verbatim() {
    let f = interpreter()
      .compile(&"(.root (.label (.int 2) (.bool true)))".parse().unwrap(), "two")
      .unwrap();
    assert_eq!(f.label, 2);
    assert_eq!(f.apply(&RelationMention::pair("a", "b")).unwrap(), 2);
  }

  #[test]
  fn test_comparisons() {
    assert_eq!(label_on_pair("(.call (.lt (.int 2)) (.int 1))"), 1);
    assert_eq!(label_on_pair("(.call (.lt (.int 1)) (.int 2))"), ABSTAIN);
    assert_eq!(label_on_pair("(.call (.geq (.int 2)) (.int 2))"), 1);
    assert_eq!(label_on_pair("(.call (.eq (.string \"1\")) (.int 1))"), ABSTAIN);
    assert_eq!(label_on_pair("(.call (.lt (.string \"b\")) (.string \"a\"))"), 1);
    assert_eq!(
      label_on_pair("(.call (.composite_and .lt (.list (.int 3) (.int 4))) (.int 2))"),
      1
    );
    assert_eq!(
      label_on_pair("(.call (.composite_and .lt (.list (.int 3) (.int 1))) (.int 2))"),
      ABSTAIN
    );
    assert_eq!(
      label_on_pair("(.call (.composite_or .eq (.list (.int 3) (.int 2))) (.int 2))"),
      1
    );
  }

  #[test]
  fn test_quantifiers_and_counts() {
    assert_eq!(label_on_pair("(.all (.map (.lt (.int 5)) (.list (.int 1) (.int 2))))"), 1);
    assert_eq!(label_on_pair("(.any (.map (.gt (.int 5)) (.list (.int 1) (.int 6))))"), 1);
    assert_eq!(label_on_pair("(.none (.map (.gt (.int 5)) (.list (.int 1) (.int 6))))"), ABSTAIN);
    assert_eq!(
      label_on_pair("(.call (.eq (.int 2)) (.sum (.map (.gt (.int 0)) (.list (.int 1) (.int 0) (.int 6)))))"),
      1
    );
    assert_eq!(label_on_pair("(.call (.eq (.int 3)) (.count (.list (.int 1) (.int 0) (.int 6))))"), 1);
  }

  #[test]
  fn test_strings_and_aliases() {
    assert_eq!(label_on_pair("(.call (.in (.string \"wifely\")) (.string \"wife\"))"), 1);
    assert_eq!(label_on_pair("(.call (.in (.user_list (.string \"spouse\"))) (.string \"wife\"))"), 1);
    assert_eq!(label_on_pair("(.call (.in (.user_list (.string \"spouse\"))) (.string \"wifely\"))"), ABSTAIN);
    assert_eq!(
      label_on_pair("(.call (.startswith (.user_list (.string \"spouse\"))) (.string \"husbandry\"))"),
      1
    );
    assert_eq!(label_on_pair("(.call (.endswith (.string \"oo\")) (.arg_to_string (.arg (.int 1))))"), 1);
    assert!(matches!(
      compile("(.call (.in (.user_list (.string \"siblings\"))) (.string \"wife\"))"),
      Err(CompileError::UnknownAlias(name)) if name == "siblings"
    ));
  }

  #[test]
  fn test_case_functions() {
    let c = RelationMention::pair("FOO", "bar");
    assert_eq!(run("(.call .upper (.arg_to_string (.arg (.int 1))))", &c).unwrap(), 1);
    assert_eq!(run("(.call .lower (.arg_to_string (.arg (.int 2))))", &c).unwrap(), 1);
    assert_eq!(run("(.call .capital (.arg_to_string (.arg (.int 2))))", &c).unwrap(), ABSTAIN);
    assert_eq!(run("(.call .lower (.string \"123\"))", &c).unwrap(), ABSTAIN);
  }

  #[test]
  fn test_text_primitives() {
    let c = ammann();
    let on_ammann = |condition: &str| run(condition, &c).unwrap();

    assert_eq!(on_ammann("(.call (.in (.extract_text (.left (.arg (.int 2))))) (.string \"wife\"))"), 1);
    assert_eq!(
      on_ammann("(.call (.in (.extract_text (.between (.list (.arg (.int 1)) (.arg (.int 2)))))) (.string \"wife\"))"),
      1
    );
    assert_eq!(
      on_ammann("(.call (.in (.extract_text (.left (.arg (.int 2)) .leq (.int 2) .words))) (.string \"wife\"))"),
      1
    );
    assert_eq!(
      on_ammann("(.call (.in (.extract_text (.right (.arg (.int 2))))) (.string \"wife\"))"),
      ABSTAIN
    );
    assert_eq!(
      on_ammann("(.call (.in (.extract_text (.within (.arg (.int 2)) (.int 3) .words))) (.string \"wife\"))"),
      1
    );
    assert_eq!(
      on_ammann("(.call (.eq (.int 2)) (.count (.filter (.sentence) .ner (.string \"PERSON\"))))"),
      1
    );
    assert_eq!(
      on_ammann("(.call (.eq (.string \",\")) (.index (.left (.arg (.int 2))) (.int -1) .words))"),
      1
    );
    assert_eq!(
      on_ammann("(.call .capital (.arg_to_string (.arg (.int 1))))"),
      1
    );
  }

  #[test]
  fn test_data_errors_are_classified() {
    let c = ammann();
    let err = run(
      "(.call (.in (.extract_text (.within (.arg (.int 2)) (.int 50) .words))) (.string \"wife\"))",
      &c,
    )
    .unwrap_err();
    assert_eq!(err.candidate, c.id());
    assert_eq!(err.function, "test");
    assert!(matches!(err.cause, PrimitiveError::WindowOutOfBounds { .. }));

    let err = run(
      "(.call (.eq (.int 0)) (.count (.filter (.sentence) .pos (.string \"NN\"))))",
      &c,
    )
    .unwrap_err();
    assert!(matches!(err.cause, PrimitiveError::MissingTags { field: "pos", .. }));
  }

  #[test]
  fn test_sum_overflow_is_an_error() {
    let err = run(
      &format!("(.call (.gt (.int 0)) (.sum (.list (.int {}) (.int 1))))", i64::MAX),
      &RelationMention::pair("foo", "bar"),
    )
    .unwrap_err();
    assert_eq!(err.cause, PrimitiveError::Overflow { op: "sum" });

    assert_eq!(
      label_on_pair(&format!("(.call (.eq (.int {})) (.sum (.list (.int {}) (.int -1))))", i64::MAX - 1, i64::MAX)),
      1
    );
  }

  #[test]
  fn test_ill_typed_forms_are_rejected() {
    assert!(compile("(.call (.lt (.int 1)) (.string \"a\"))").unwrap_err().is_type_error());
    assert!(compile("(.call (.lt (.list (.int 1))) (.int 2))").unwrap_err().is_type_error());
    assert!(compile("(.call .lower (.int 2))").unwrap_err().is_type_error());
    assert!(compile("(.and (.int 1) (.bool true))").unwrap_err().is_type_error());
    assert!(compile("(.int 1)").unwrap_err().is_type_error());
    assert!(compile("(.call (.in (.arg (.int 1))) (.string \"a\"))").unwrap_err().is_type_error());
  }

  #[test]
  fn test_list_elements_are_checked() {
    // lists hold one type
    assert!(
      compile("(.all (.map (.lt (.int 2)) (.list (.int 1) (.string \"a\"))))")
        .unwrap_err()
        .is_type_error()
    );
    assert!(
      compile("(.call (.in (.list (.int 1) (.string \"a\"))) (.int 1))")
        .unwrap_err()
        .is_type_error()
    );
    // mapped functions must take the elements
    assert!(
      compile("(.any (.map (.lt (.int 2)) (.list (.string \"a\") (.string \"b\"))))")
        .unwrap_err()
        .is_type_error()
    );
    assert!(
      compile("(.all (.map .upper (.filter (.sentence) .words (.string \"w\"))))").is_ok()
    );
    assert!(
      compile("(.all (.map .upper (.list (.int 1))))")
        .unwrap_err()
        .is_type_error()
    );
    // quantifiers need booleans, sums need booleans or numbers
    assert!(compile("(.any (.list (.int 1) (.int 2)))").unwrap_err().is_type_error());
    assert!(compile("(.any (.list (.bool false) (.bool true)))").is_ok());
    assert!(
      compile("(.call (.gt (.int 0)) (.sum (.user_list (.string \"spouse\"))))")
        .unwrap_err()
        .is_type_error()
    );
    // composite functions take what their primitive takes for each element
    assert!(
      compile("(.call (.composite_or .lt (.list (.int 3) (.int 4))) (.string \"a\"))")
        .unwrap_err()
        .is_type_error()
    );
    assert!(
      compile("(.call (.startswith (.list (.int 3))) (.string \"a\"))")
        .unwrap_err()
        .is_type_error()
    );
    // empty lists take anything
    assert_eq!(label_on_pair("(.all (.map (.lt (.int 2)) (.list)))"), 1);
    assert_eq!(label_on_pair("(.call (.composite_or .lt (.list)) (.string \"a\"))"), ABSTAIN);
  }

  #[test]
  fn test_malformed_forms_are_rejected() {
    let i = interpreter();
    let malformed = |s: &str| {
      matches!(
        i.compile(&s.parse().unwrap(), "m"),
        Err(CompileError::Malformed { .. })
      )
    };
    assert!(malformed("(.bool true)"));
    assert!(malformed("(.root (.bool true))"));
    assert!(malformed("(.root (.label (.string \"1\") (.bool true)))"));
    assert!(malformed("(.root (.label (.int 1) (.not (.bool true) (.bool false))))"));
    assert!(malformed("(.root (.label (.int 1) (.call (.lt (.int 1)) .lt)))"));
    assert!(malformed("(.root (.label (.int 1) (.call (.in (.arg (.int 3))) (.string \"a\"))))"));
    assert!(malformed("(.root (.label (.int 1) (.call (.sentence) (.int 1))))"));
    assert!(matches!(
      i.compile(
        &"(.root (.label (.int 1) (.any (.filter (.sentence) .words (.string \"(\")))))".parse().unwrap(),
        "p"
      ),
      Err(CompileError::Pattern { .. })
    ));
  }
}
