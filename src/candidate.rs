//! The data items labeling functions run on.

use std::fmt;

/// Which of a relation candidate's two spans an explanation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Argument {
  First,
  Second,
}

impl Argument {
  /// 1 is the first argument, 2 the second.
  pub fn from_index(index: i64) -> Option<Self> {
    match index {
      1 => Some(Self::First),
      2 => Some(Self::Second),
      _ => None,
    }
  }
}

/// An inclusive range of word indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordSpan {
  pub start: usize,
  pub end: usize,
}

impl WordSpan {
  pub fn new(start: usize, end: usize) -> Self {
    Self { start, end }
  }
}

/// What the primitive library needs to know about a candidate: a tokenized
/// sentence with tags, and the two argument spans of the relation.
///
/// `char_offsets` are byte offsets into `text`, one per word. `pos_tags`
/// and `ner_tags` are either empty or one per word.
pub trait Candidate: fmt::Debug + Send + Sync {
  /// Stable identifier, used to link explanations to candidates.
  fn id(&self) -> &str;
  fn text(&self) -> &str;
  fn words(&self) -> &[String];
  fn char_offsets(&self) -> &[usize];
  fn pos_tags(&self) -> &[String];
  fn ner_tags(&self) -> &[String];
  fn span(&self, arg: Argument) -> WordSpan;
}

/// A sentence with two marked word spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMention {
  id: String,
  text: String,
  words: Vec<String>,
  char_offsets: Vec<usize>,
  pos_tags: Vec<String>,
  ner_tags: Vec<String>,
  spans: [WordSpan; 2],
}

impl RelationMention {
  /// Tokenizes `text` into words and punctuation; the spans index those
  /// tokens.
  pub fn new(id: impl Into<String>, text: impl Into<String>, first: WordSpan, second: WordSpan) -> Self {
    regex_static!(WORD, r"\w+(?:[-']\w+)*|[^\w\s]");
    let text = text.into();
    let (words, char_offsets) = WORD
      .find_iter(&text)
      .map(|m| (m.as_str().to_string(), m.start()))
      .unzip();
    Self {
      id: id.into(),
      words,
      char_offsets,
      text,
      pos_tags: Vec::new(),
      ner_tags: Vec::new(),
      spans: [first, second],
    }
  }

  /// A candidate whose whole sentence is its two arguments, e.g.
  /// `pair("foo", "bar")` is "foo bar" with X = foo and Y = bar.
  pub fn pair(first: &str, second: &str) -> Self {
    let mut mention = Self::new(
      format!("{}~~{}", first, second),
      format!("{} {}", first, second),
      WordSpan::new(0, 0),
      WordSpan::new(0, 0),
    );
    let first_len = Self::new("", first, WordSpan::new(0, 0), WordSpan::new(0, 0))
      .words
      .len()
      .max(1);
    let last = mention.words.len().saturating_sub(1).max(first_len);
    mention.spans = [WordSpan::new(0, first_len - 1), WordSpan::new(first_len, last)];
    mention
  }

  pub fn with_ner_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.ner_tags = tags.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_pos_tags<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.pos_tags = tags.into_iter().map(Into::into).collect();
    self
  }
}

impl Candidate for RelationMention {
  fn id(&self) -> &str {
    &self.id
  }

  fn text(&self) -> &str {
    &self.text
  }

  fn words(&self) -> &[String] {
    &self.words
  }

  fn char_offsets(&self) -> &[usize] {
    &self.char_offsets
  }

  fn pos_tags(&self) -> &[String] {
    &self.pos_tags
  }

  fn ner_tags(&self) -> &[String] {
    &self.ner_tags
  }

  fn span(&self, arg: Argument) -> WordSpan {
    match arg {
      Argument::First => self.spans[0],
      Argument::Second => self.spans[1],
    }
  }
}

impl fmt::Display for RelationMention {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (idx, word) in self.words.iter().enumerate() {
      if idx > 0 {
        write!(f, " ")?;
      }
      let opens = self.spans.iter().any(|s| s.start == idx);
      let closes = self.spans.iter().any(|s| s.end == idx);
      write!(f, "{}{}{}", if opens { "[" } else { "" }, word, if closes { "]" } else { "" })?;
    }
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod fixtures {
  use super::*;

  pub const AMMANN_ID: &str = "52a56fa5::span:604:616~~52a56fa5::span:632:646";

  /// "City land records show that GM President [Daniel Ammann] and his wife,
  /// [Pernilla Ammann], bought the 15-bedroom mansion on Balmoral Drive in
  /// the upscale historic neighborhood on July 31."
  pub fn ammann() -> RelationMention {
    let text = "City land records show that GM President Daniel Ammann and his wife, \
      Pernilla Ammann, bought the 15-bedroom mansion on Balmoral Drive in the upscale \
      historic neighborhood on July 31.";
    let mention = RelationMention::new(AMMANN_ID, text, WordSpan::new(7, 8), WordSpan::new(13, 14));
    let ner = (0..mention.words.len()).map(|i| match i {
      5 => "ORGANIZATION",
      7 | 8 | 13 | 14 => "PERSON",
      21 | 22 => "LOCATION",
      29 | 30 => "DATE",
      _ => "O",
    });
    mention.with_ner_tags(ner)
  }
}
