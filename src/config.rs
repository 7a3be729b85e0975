use std::collections::{BTreeMap, BTreeSet};

use crate::annotator::StringFormat;

pub const DEFAULT_BEAM_WIDTH: usize = 10;

/// Words that can pad a phrase without changing its meaning, e.g. the "a"
/// in "starts with a spouse word".
pub const DEFAULT_STOPWORDS: &[&str] = &[
  "a", "an", "her", "hers", "him", "his", "its", "my", "our", "that", "their", "them",
  "these", "this", "those", "your",
];

/// Settings a parser is built with.
#[derive(Debug, Clone)]
pub struct ParserConfig {
  /// Named word lists, e.g. `spouse => [wife, husband]`, usable in
  /// explanations by name.
  pub aliases: BTreeMap<String, Vec<String>>,
  /// Words that refer to the first and second argument of a candidate, in
  /// addition to "X" and "Y".
  pub entity_names: Vec<String>,
  pub string_format: StringFormat,
  pub beam_width: usize,
  pub stopwords: BTreeSet<String>,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      aliases: BTreeMap::new(),
      entity_names: Vec::new(),
      string_format: StringFormat::default(),
      beam_width: DEFAULT_BEAM_WIDTH,
      stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl ParserConfig {
  pub fn with_alias<I, S>(mut self, name: impl Into<String>, members: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .aliases
      .insert(name.into(), members.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_entity_names<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.entity_names = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_string_format(mut self, string_format: StringFormat) -> Self {
    self.string_format = string_format;
    self
  }

  pub fn with_beam_width(mut self, beam_width: usize) -> Self {
    self.beam_width = beam_width.max(1);
    self
  }

  pub fn with_stopwords<I, S>(mut self, stopwords: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.stopwords = stopwords.into_iter().map(Into::into).collect();
    self
  }
}

#[test]
fn test_builder() {
  let config = ParserConfig::default()
    .with_alias("colors", ["red", "green"])
    .with_entity_names(["daniel", "pernilla"])
    .with_beam_width(0);

  assert_eq!(config.aliases["colors"], vec!["red", "green"]);
  assert_eq!(config.entity_names, vec!["daniel", "pernilla"]);
  assert_eq!(config.beam_width, 1);
  assert!(config.stopwords.contains("his"));
  assert_eq!(config.string_format, StringFormat::Explicit);
}
