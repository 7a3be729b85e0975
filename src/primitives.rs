//! The positional and text primitives labeling functions are built from.
//!
//! Every primitive is a pure function of a candidate and its parameters.
//! Phrases are word ranges of the candidate's sentence; their text runs from
//! the first word's offset to the end of the last word.

use std::fmt;

use regex::Regex;

use crate::candidate::{Argument, Candidate};
use crate::error::PrimitiveError;
use crate::logical_form::Op;

/// A half-open range of word indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhraseSpan {
  pub start: usize,
  pub end: usize,
}

impl PhraseSpan {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }

  /// An empty phrase positioned at `at`.
  pub fn empty(at: usize) -> Self {
    Self { start: at, end: at }
  }

  pub fn len(&self) -> usize {
    self.end.saturating_sub(self.start)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl fmt::Display for PhraseSpan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}", self.start, self.end)
  }
}

/// What a window or an index counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
  Words,
  Chars,
}

impl Unit {
  pub fn from_op(op: Op) -> Option<Self> {
    match op {
      Op::Words => Some(Self::Words),
      Op::Chars => Some(Self::Chars),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
  Lt,
  Leq,
  Eq,
  Neq,
  Geq,
  Gt,
}

impl Cmp {
  pub fn from_op(op: Op) -> Option<Self> {
    match op {
      Op::Lt => Some(Self::Lt),
      Op::Leq => Some(Self::Leq),
      Op::Eq => Some(Self::Eq),
      Op::Neq => Some(Self::Neq),
      Op::Geq => Some(Self::Geq),
      Op::Gt => Some(Self::Gt),
      _ => None,
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Lt => "lt",
      Self::Leq => "leq",
      Self::Eq => "eq",
      Self::Neq => "neq",
      Self::Geq => "geq",
      Self::Gt => "gt",
    }
  }

  pub fn holds<T: PartialOrd>(self, a: T, b: T) -> bool {
    match self {
      Self::Lt => a < b,
      Self::Leq => a <= b,
      Self::Eq => a == b,
      Self::Neq => a != b,
      Self::Geq => a >= b,
      Self::Gt => a > b,
    }
  }
}

/// Restricts `left`/`right` to tokens whose distance from the phrase
/// satisfies `cmp num`, e.g. "no more than 3 words".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
  pub cmp: Cmp,
  pub num: i64,
  pub unit: Unit,
}

/// Which tag sequence `filter` reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Words,
  Chars,
  Ner,
  Pos,
}

impl Field {
  pub fn from_op(op: Op) -> Option<Self> {
    match op {
      Op::Words => Some(Self::Words),
      Op::Chars => Some(Self::Chars),
      Op::Ner => Some(Self::Ner),
      Op::Pos => Some(Self::Pos),
      _ => None,
    }
  }
}

fn word_start(c: &dyn Candidate, idx: usize) -> usize {
  c.char_offsets()[idx]
}

fn word_end(c: &dyn Candidate, idx: usize) -> usize {
  c.char_offsets()[idx] + c.words()[idx].len()
}

/// The smallest phrase holding every index in `hits`, or an empty phrase at
/// `fallback`.
fn hull(hits: impl Iterator<Item = usize>, fallback: usize) -> PhraseSpan {
  let mut span: Option<PhraseSpan> = None;
  for idx in hits {
    span = Some(match span {
      None => PhraseSpan::new(idx, idx + 1),
      Some(s) => PhraseSpan::new(s.start.min(idx), s.end.max(idx + 1)),
    });
  }
  span.unwrap_or(PhraseSpan::empty(fallback))
}

pub fn sentence(c: &dyn Candidate) -> PhraseSpan {
  PhraseSpan::new(0, c.words().len())
}

pub fn argument(c: &dyn Candidate, arg: Argument) -> PhraseSpan {
  let span = c.span(arg);
  let len = c.words().len();
  PhraseSpan::new(span.start.min(len), (span.end + 1).min(len))
}

/// The text a phrase covers. Empty phrases have empty text.
pub fn text<'c>(c: &'c dyn Candidate, phrase: PhraseSpan) -> Result<&'c str, PrimitiveError> {
  if phrase.is_empty() {
    return Ok("");
  }
  if phrase.end > c.words().len() || phrase.end > c.char_offsets().len() {
    return Err(PrimitiveError::InvalidOffsets {
      start: phrase.start,
      end: phrase.end,
    });
  }
  let start = word_start(c, phrase.start);
  let end = word_end(c, phrase.end - 1);
  c.text()
    .get(start..end)
    .ok_or(PrimitiveError::InvalidOffsets { start, end })
}

/// Words before the phrase, optionally only those within a window of its
/// first word.
pub fn left(c: &dyn Candidate, of: PhraseSpan, window: Option<Window>) -> PhraseSpan {
  let k = of.start.min(c.words().len());
  let hits = (0..k).filter(|&i| match window {
    None => true,
    Some(Window { cmp, num, unit: Unit::Words }) => cmp.holds(k as i64 - i as i64, num),
    Some(Window { cmp, num, unit: Unit::Chars }) => {
      let anchor = c.char_offsets().get(k).copied().unwrap_or(c.text().len());
      cmp.holds(anchor as i64 - word_start(c, i) as i64, num)
    }
  });
  hull(hits, k)
}

/// Words after the phrase, optionally only those within a window of its
/// last word.
pub fn right(c: &dyn Candidate, of: PhraseSpan, window: Option<Window>) -> PhraseSpan {
  let len = c.words().len();
  let k = of.end.max(of.start + 1).min(len.max(1)) - 1;
  let first = of.end.max(of.start).min(len);
  let hits = (first..len).filter(|&i| match window {
    None => true,
    Some(Window { cmp, num, unit: Unit::Words }) => cmp.holds(i as i64 - k as i64, num),
    Some(Window { cmp, num, unit: Unit::Chars }) => {
      cmp.holds(word_start(c, i) as i64 - word_start(c, k) as i64, num)
    }
  });
  hull(hits, first)
}

/// The phrase widened by `num` units on both sides. Fails when the widened
/// window leaves the sentence.
pub fn within(
  c: &dyn Candidate,
  of: PhraseSpan,
  num: i64,
  unit: Unit,
) -> Result<PhraseSpan, PrimitiveError> {
  let len = c.words().len();
  if of.is_empty() || of.end > len {
    return Err(PrimitiveError::WindowOutOfBounds {
      start: of.start as i64,
      end: of.end as i64,
      len,
    });
  }
  match unit {
    Unit::Words => {
      let lo = of.start as i64 - num;
      let hi = of.end as i64 - 1 + num;
      if lo < 0 || hi >= len as i64 || lo > hi {
        return Err(PrimitiveError::WindowOutOfBounds { start: lo, end: hi, len });
      }
      Ok(PhraseSpan::new(lo as usize, hi as usize + 1))
    }
    Unit::Chars => {
      let lo = word_start(c, of.start) as i64 - num;
      let hi = word_end(c, of.end - 1) as i64 + num;
      if lo < 0 || hi > c.text().len() as i64 || lo > hi {
        return Err(PrimitiveError::WindowOutOfBounds {
          start: lo,
          end: hi,
          len: c.text().len(),
        });
      }
      let hits = (0..len).filter(|&i| word_start(c, i) as i64 >= lo && word_end(c, i) as i64 <= hi);
      Ok(hull(hits, of.start))
    }
  }
}

/// Words strictly between two phrases, whichever comes first.
pub fn between(a: PhraseSpan, b: PhraseSpan) -> PhraseSpan {
  let (first, second) = if a.start <= b.start { (a, b) } else { (b, a) };
  PhraseSpan::new(first.end, second.start.max(first.end))
}

/// The items of `field` in the phrase that match `pattern` at their start.
/// Runs of adjacent matching NER or POS tags are merged into one mention and
/// reported by their text.
pub fn filter(
  c: &dyn Candidate,
  phrase: PhraseSpan,
  field: Field,
  pattern: &Regex,
) -> Result<Vec<String>, PrimitiveError> {
  let words = c.words();
  let range = phrase.start.min(words.len())..phrase.end.min(words.len());
  match field {
    Field::Words => Ok(
      words[range]
        .iter()
        .filter(|w| pattern.is_match(w))
        .cloned()
        .collect(),
    ),
    Field::Chars => Ok(
      text(c, phrase)?
        .trim()
        .chars()
        .map(String::from)
        .filter(|ch| pattern.is_match(ch))
        .collect(),
    ),
    Field::Ner | Field::Pos => {
      let (name, tags) = match field {
        Field::Ner => ("ner", c.ner_tags()),
        _ => ("pos", c.pos_tags()),
      };
      if tags.len() != words.len() {
        return Err(PrimitiveError::MissingTags {
          field: name,
          tags: tags.len(),
          words: words.len(),
        });
      }

      let mut runs: Vec<PhraseSpan> = Vec::new();
      for idx in range {
        if !pattern.is_match(&tags[idx]) {
          continue;
        }
        match runs.last_mut() {
          Some(run) if run.end == idx => run.end += 1,
          _ => runs.push(PhraseSpan::new(idx, idx + 1)),
        }
      }
      runs
        .into_iter()
        .map(|run| text(c, run).map(str::to_string))
        .collect()
    }
  }
}

/// The `ordinal`th word or character of the phrase, counting from 1. Negative
/// ordinals count from the end.
pub fn index(
  c: &dyn Candidate,
  phrase: PhraseSpan,
  ordinal: i64,
  unit: Unit,
) -> Result<String, PrimitiveError> {
  let items: Vec<String> = match unit {
    Unit::Words => {
      let words = c.words();
      words[phrase.start.min(words.len())..phrase.end.min(words.len())].to_vec()
    }
    Unit::Chars => text(c, phrase)?.chars().map(String::from).collect(),
  };
  let len = items.len();
  let position = match ordinal {
    n if n > 0 => Some(n - 1),
    n if n < 0 => Some(len as i64 + n),
    _ => None,
  };
  position
    .filter(|&p| p >= 0 && (p as usize) < len)
    .map(|p| items[p as usize].clone())
    .ok_or(PrimitiveError::IndexOutOfRange { index: ordinal, len })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::candidate::RelationMention;
  use crate::candidate::fixtures::ammann;
  use pretty_assertions::assert_eq;

  fn any() -> Regex {
    Regex::new("^(?:)").unwrap()
  }

  #[test]
  fn test_arguments_and_sentence() {
    let c = ammann();
    assert_eq!(text(&c, argument(&c, Argument::First)).unwrap(), "Daniel Ammann");
    assert_eq!(text(&c, argument(&c, Argument::Second)).unwrap(), "Pernilla Ammann");
    assert_eq!(sentence(&c), PhraseSpan::new(0, 32));
    assert_eq!(text(&c, PhraseSpan::empty(4)).unwrap(), "");
  }

  #[test]
  fn test_left_and_right() {
    let c = ammann();
    let y = argument(&c, Argument::Second);
    let x = argument(&c, Argument::First);
    assert_eq!(left(&c, y, None), PhraseSpan::new(0, 13));
    assert_eq!(right(&c, x, None), PhraseSpan::new(9, 32));
    assert_eq!(left(&c, PhraseSpan::new(0, 1), None), PhraseSpan::empty(0));

    let near = Window { cmp: Cmp::Leq, num: 3, unit: Unit::Words };
    assert_eq!(text(&c, left(&c, y, Some(near))).unwrap(), "his wife,");
    assert_eq!(text(&c, right(&c, x, Some(near))).unwrap(), "and his wife");

    let exactly = Window { cmp: Cmp::Eq, num: 2, unit: Unit::Words };
    assert_eq!(text(&c, left(&c, y, Some(exactly))).unwrap(), "wife");

    let chars = Window { cmp: Cmp::Leq, num: 6, unit: Unit::Chars };
    assert_eq!(text(&c, left(&c, y, Some(chars))).unwrap(), "wife,");
  }

  #[test]
  fn test_within() {
    let c = ammann();
    let y = argument(&c, Argument::Second);
    assert_eq!(text(&c, within(&c, y, 2, Unit::Words).unwrap()).unwrap(), "wife, Pernilla Ammann, bought");
    assert!(matches!(
      within(&c, y, 50, Unit::Words),
      Err(PrimitiveError::WindowOutOfBounds { .. })
    ));
    assert!(within(&c, y, 8, Unit::Chars).is_ok());
    assert!(within(&c, y, 500, Unit::Chars).is_err());
  }

  #[test]
  fn test_between() {
    let c = ammann();
    let x = argument(&c, Argument::First);
    let y = argument(&c, Argument::Second);
    assert_eq!(between(x, y), PhraseSpan::new(9, 13));
    assert_eq!(between(y, x), PhraseSpan::new(9, 13));
    assert_eq!(text(&c, between(x, y)).unwrap(), "and his wife,");
    assert!(between(x, PhraseSpan::new(9, 10)).is_empty());
  }

  #[test]
  fn test_filter() {
    let c = ammann();
    let before = between(argument(&c, Argument::First), argument(&c, Argument::Second));
    let w = Regex::new(r"^(?:\w)").unwrap();
    assert_eq!(filter(&c, before, Field::Words, &w).unwrap(), vec!["and", "his", "wife"]);
    assert_eq!(filter(&c, PhraseSpan::new(11, 12), Field::Chars, &any()).unwrap(), vec!["w", "i", "f", "e"]);

    let person = Regex::new("^(?:PERSON)").unwrap();
    assert_eq!(
      filter(&c, sentence(&c), Field::Ner, &person).unwrap(),
      vec!["Daniel Ammann", "Pernilla Ammann"]
    );
    assert!(matches!(
      filter(&c, sentence(&c), Field::Pos, &any()),
      Err(PrimitiveError::MissingTags { field: "pos", tags: 0, words: 32 })
    ));
  }

  #[test]
  fn test_index() {
    let c = ammann();
    let y = argument(&c, Argument::Second);
    let before = left(&c, y, None);
    assert_eq!(index(&c, before, -1, Unit::Words).unwrap(), ",");
    assert_eq!(index(&c, before, 1, Unit::Words).unwrap(), "City");
    assert_eq!(index(&c, y, 1, Unit::Chars).unwrap(), "P");
    assert_eq!(index(&c, y, -1, Unit::Chars).unwrap(), "n");
    assert!(matches!(index(&c, y, 0, Unit::Words), Err(PrimitiveError::IndexOutOfRange { .. })));
    assert!(matches!(
      index(&c, y, 3, Unit::Words),
      Err(PrimitiveError::IndexOutOfRange { index: 3, len: 2 })
    ));
  }

  #[test]
  fn test_pair_candidates() {
    let c = RelationMention::pair("foo", "bar");
    assert_eq!(text(&c, argument(&c, Argument::First)).unwrap(), "foo");
    assert_eq!(text(&c, argument(&c, Argument::Second)).unwrap(), "bar");
    assert!(between(argument(&c, Argument::First), argument(&c, Argument::Second)).is_empty());
  }
}
