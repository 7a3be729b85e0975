//! Tokenizing explanations and recognizing the lexical entries the grammar's
//! own rules don't cover: numbers, strings, alias names, entity names and
//! stopwords.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::warn;

use crate::config::ParserConfig;
use crate::error::SyntaxError;
use crate::logical_form::{LogicalForm, Op};
use crate::rules::Category;

pub const INT: &str = "$Int";
pub const STRING: &str = "$String";
pub const USER_LIST: &str = "$UserList";
pub const ARG_X: &str = "$ArgX";
pub const ARG_Y: &str = "$ArgY";
pub const STOPWORD: &str = "$Stopword";

/// Categories the annotator can produce.
pub const CATEGORIES: &[&str] = &[INT, STRING, USER_LIST, ARG_X, ARG_Y, STOPWORD];

/// Longest run of bare tokens read as one string in implicit mode.
const IMPLICIT_MAX_TOKENS: usize = 4;

const SPELLED_NUMBERS: &[(&str, i64)] = &[
  ("zero", 0),
  ("one", 1),
  ("two", 2),
  ("three", 3),
  ("four", 4),
  ("five", 5),
  ("six", 6),
  ("seven", 7),
  ("eight", 8),
  ("nine", 9),
  ("ten", 10),
  ("eleven", 11),
  ("twelve", 12),
  ("thirteen", 13),
  ("fourteen", 14),
  ("fifteen", 15),
  ("sixteen", 16),
  ("seventeen", 17),
  ("eighteen", 18),
  ("nineteen", 19),
  ("twenty", 20),
  ("thirty", 30),
  ("forty", 40),
  ("fifty", 50),
  ("sixty", 60),
  ("seventy", 70),
  ("eighty", 80),
  ("ninety", 90),
  ("hundred", 100),
];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
  pub text: String,
  /// Byte offsets into the text the token was read from.
  pub start: usize,
  pub end: usize,
}

impl Token {
  pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
    Self {
      text: text.into(),
      start,
      end,
    }
  }

  /// A token that doesn't come from the explanation text, such as the
  /// sentence boundary markers.
  pub fn synthetic(text: impl Into<String>) -> Self {
    Self::new(text, 0, 0)
  }

  pub fn is_quoted(&self) -> bool {
    let mut chars = self.text.chars();
    match (chars.next(), chars.next_back()) {
      (Some(open @ ('"' | '\'')), Some(close)) => open == close,
      _ => false,
    }
  }

  pub fn unquoted(&self) -> &str {
    if self.is_quoted() {
      &self.text[1..self.text.len() - 1]
    } else {
      &self.text
    }
  }

  /// The form grammar terminals are matched against: lowercased, except for
  /// quoted strings which are never grammar words.
  pub fn normalized(&self) -> String {
    if self.is_quoted() {
      self.text.clone()
    } else {
      self.text.to_lowercase()
    }
  }

  pub fn number(&self) -> Option<i64> {
    regex_static!(INTEGER, r"^-?\d+$");
    if self.is_quoted() {
      None
    } else if INTEGER.is_match(&self.text) {
      self.text.parse().ok()
    } else {
      let lower = self.text.to_lowercase();
      SPELLED_NUMBERS
        .iter()
        .find(|(word, _)| *word == lower)
        .map(|(_, n)| *n)
    }
  }

  fn is_word(&self) -> bool {
    self.text.chars().next().is_some_and(char::is_alphanumeric)
  }
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.text)
  }
}

/// Splits explanation text into quoted strings, words, integers, two-char
/// comparison operators and single punctuation marks.
pub fn tokenize(text: &str) -> Vec<Token> {
  regex_static!(TOKEN, r#""[^"]*"|'[^']*'|\w+(?:[-']\w+)*|-\d+|<=|>=|==|!=|\S"#);
  TOKEN
    .find_iter(text)
    .map(|m| Token::new(m.as_str(), m.start(), m.end()))
    .collect()
}

fn normalized_words(text: &str) -> Vec<String> {
  tokenize(text).iter().map(Token::normalized).collect()
}

/// Whether strings have to be quoted, or bare out-of-grammar words are read
/// as strings too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringFormat {
  #[default]
  Explicit,
  Implicit,
}

impl FromStr for StringFormat {
  type Err = SyntaxError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "explicit" => Ok(Self::Explicit),
      "implicit" => Ok(Self::Implicit),
      _ => Err(SyntaxError(format!("unknown string format {}", s))),
    }
  }
}

#[derive(Debug, Clone)]
pub struct Annotator {
  /// Alias names as normalized words, with the name itself.
  aliases: Vec<(Vec<String>, String)>,
  entity_names: Vec<Vec<String>>,
  /// Every word of an alias or entity name.
  name_words: HashSet<String>,
  string_format: StringFormat,
  stopwords: HashSet<String>,
  lexicon: HashSet<String>,
}

impl Annotator {
  /// `lexicon` is every terminal word of the grammar.
  pub fn new(config: &ParserConfig, lexicon: HashSet<String>) -> Self {
    if config.entity_names.len() > 2 {
      warn!(
        "only the first two entity names are used, ignoring {:?}",
        &config.entity_names[2..]
      );
    }

    let aliases: Vec<(Vec<String>, String)> = config
      .aliases
      .keys()
      .map(|name| (normalized_words(name), name.clone()))
      .filter(|(words, _)| !words.is_empty())
      .collect();
    let entity_names: Vec<Vec<String>> = config
      .entity_names
      .iter()
      .take(2)
      .map(|name| normalized_words(name))
      .collect();
    let name_words = aliases
      .iter()
      .map(|(words, _)| words)
      .chain(entity_names.iter())
      .flatten()
      .cloned()
      .collect();

    Self {
      aliases,
      entity_names,
      name_words,
      string_format: config.string_format,
      stopwords: config.stopwords.iter().map(|s| s.to_lowercase()).collect(),
      lexicon,
    }
  }

  pub fn lexicon(&self) -> &HashSet<String> {
    &self.lexicon
  }

  /// True if nothing can read the token: it isn't a grammar word, number,
  /// quoted string, or part of an alias or entity name.
  pub fn is_out_of_grammar(&self, token: &Token) -> bool {
    if token.is_quoted() || token.number().is_some() {
      return false;
    }
    let word = token.normalized();
    !self.lexicon.contains(&word) && !self.name_words.contains(&word)
  }

  /// The lexical entries a span of tokens denotes. Same span, same entries,
  /// in the same order.
  pub fn annotate(&self, tokens: &[Token]) -> Vec<(Category, Option<LogicalForm>)> {
    let mut entries = Vec::new();
    if tokens.is_empty() {
      return entries;
    }
    let words: Vec<String> = tokens.iter().map(Token::normalized).collect();

    if let [token] = tokens {
      if let Some(n) = token.number() {
        entries.push((Category::new(INT), Some(LogicalForm::Int(n))));
      }
      if token.is_quoted() {
        entries.push((
          Category::new(STRING),
          Some(LogicalForm::string(token.unquoted())),
        ));
      } else if self.stopwords.contains(&words[0]) {
        entries.push((Category::new(STOPWORD), None));
      }
    }

    for (name_words, name) in &self.aliases {
      if *name_words == words {
        entries.push((
          Category::new(USER_LIST),
          Some(LogicalForm::node(Op::UserList, vec![LogicalForm::string(name.clone())])),
        ));
      }
    }

    for (idx, (name_words, category)) in self.entity_names.iter().zip([ARG_X, ARG_Y]).enumerate() {
      if *name_words == words {
        let arg = LogicalForm::node(Op::Arg, vec![LogicalForm::Int(idx as i64 + 1)]);
        entries.push((Category::new(category), Some(arg)));
      }
    }

    if self.string_format == StringFormat::Implicit && self.is_implicit_string(tokens, &words) {
      let text = tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
      entries.push((Category::new(STRING), Some(LogicalForm::Str(text))));
    }

    entries
  }

  fn is_implicit_string(&self, tokens: &[Token], words: &[String]) -> bool {
    tokens.len() <= IMPLICIT_MAX_TOKENS
      && tokens.iter().zip(words).all(|(token, word)| {
        token.is_word()
          && !token.is_quoted()
          && token.number().is_none()
          && !self.lexicon.contains(word)
          && !self.name_words.contains(word)
      })
      && !words.iter().all(|w| self.stopwords.contains(w))
  }
}
