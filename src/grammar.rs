use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::annotator::{self, Annotator, Token};
use crate::chart::{parse_chart, Chart};
use crate::config::ParserConfig;
use crate::error::GrammarDefinitionError;
use crate::logical_form::{self, LogicalForm};
use crate::parse_grammar::RuleTable;
use crate::rules::{Category, Rule};

/// Rules for booleans, comparisons, lists and quantifiers.
pub const CORE_RULES: &str = include_str!("grammars/core.grammar");
/// Rules for talking about a candidate's text: arguments, directions,
/// windows, entity types and counts.
pub const TEXT_RULES: &str = include_str!("grammars/text.grammar");

/// An indexed, immutable set of rules plus the annotator that covers what the
/// rules don't. Built once and shared by every parse.
#[derive(Debug)]
pub struct Grammar {
  pub start: Category,
  rules: Vec<Arc<Rule>>,
  /// Lexical rules keyed by their (lowercased) words.
  lexical: HashMap<Vec<String>, Vec<Arc<Rule>>>,
  max_lexical_len: usize,
  /// Unary rules keyed by their only child.
  unary: HashMap<Category, Vec<Arc<Rule>>>,
  /// Rules with two or more children, keyed by their first child.
  compositional: HashMap<Category, Vec<Arc<Rule>>>,
  absorber: Option<Category>,
  annotator: Annotator,
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "// start: {}", self.start)?;
    if let Some(absorber) = &self.absorber {
      writeln!(f, "%absorb {};", absorber)?;
    }
    for rule in self.rules.iter() {
      writeln!(f, "{};", rule)?;
    }
    Ok(())
  }
}

impl Grammar {
  pub fn new(table: RuleTable, config: &ParserConfig) -> Result<Self, GrammarDefinitionError> {
    let start = table
      .rules
      .first()
      .map(|r| r.lhs.clone())
      .ok_or(GrammarDefinitionError::Empty)?;

    let mut unique: IndexSet<Rule> = IndexSet::new();
    for rule in table.rules.iter() {
      for expanded in rule.expand_optionals() {
        if let Some(existing) = unique.get(&expanded) {
          debug!("dropping {}, already have {}", expanded, existing);
        } else {
          unique.insert(expanded);
        }
      }
    }

    let rules: Vec<Arc<Rule>> = unique.into_iter().map(Arc::new).collect();
    debug!(
      "built grammar from {} rules, {} after expanding optionals",
      table.rules.len(),
      rules.len()
    );

    let mut lexical: HashMap<Vec<String>, Vec<Arc<Rule>>> = HashMap::new();
    let mut unary: HashMap<Category, Vec<Arc<Rule>>> = HashMap::new();
    let mut compositional: HashMap<Category, Vec<Arc<Rule>>> = HashMap::new();
    let mut lexicon: HashSet<String> = HashSet::new();

    for rule in rules.iter() {
      if rule.is_lexical() {
        let words = rule.words();
        lexicon.extend(words.iter().cloned());
        lexical.entry(words).or_default().push(rule.clone());
      } else if let Some(first) = rule.rhs[0].category() {
        let index = if rule.is_unary() {
          &mut unary
        } else {
          &mut compositional
        };
        index.entry(first.clone()).or_default().push(rule.clone());
      }
    }

    Self::check_unary_cycles(&unary)?;
    Self::check_produced(&rules, &start, table.absorb.as_ref());

    Ok(Self {
      start,
      max_lexical_len: lexical.keys().map(Vec::len).max().unwrap_or(0),
      rules,
      lexical,
      unary,
      compositional,
      absorber: table.absorb,
      annotator: Annotator::new(config, lexicon),
    })
  }

  /// The built-in rule tables.
  pub fn default_rules() -> Result<RuleTable, GrammarDefinitionError> {
    let mut table: RuleTable = CORE_RULES.parse()?;
    table.extend(TEXT_RULES.parse()?);
    Ok(table)
  }

  /// The built-in grammar.
  pub fn with_config(config: &ParserConfig) -> Result<Self, GrammarDefinitionError> {
    Self::new(Self::default_rules()?, config)
  }

  /// A chain of unary rules leading back to where it started would let a
  /// single cell grow forever.
  fn check_unary_cycles(
    unary: &HashMap<Category, Vec<Arc<Rule>>>,
  ) -> Result<(), GrammarDefinitionError> {
    fn visit<'a>(
      category: &'a Category,
      unary: &'a HashMap<Category, Vec<Arc<Rule>>>,
      path: &mut Vec<&'a Category>,
      done: &mut HashSet<&'a Category>,
    ) -> Result<(), GrammarDefinitionError> {
      if path.contains(&category) {
        return Err(GrammarDefinitionError::UnaryCycle(category.name.clone()));
      }
      if done.contains(category) {
        return Ok(());
      }
      path.push(category);
      for rule in unary.get(category).into_iter().flatten() {
        visit(&rule.lhs, unary, path, done)?;
      }
      path.pop();
      done.insert(category);
      Ok(())
    }

    let mut done = HashSet::new();
    let mut roots: Vec<&Category> = unary.keys().collect();
    roots.sort();
    for category in roots {
      visit(category, unary, &mut Vec::new(), &mut done)?;
    }
    Ok(())
  }

  fn check_produced(rules: &[Arc<Rule>], start: &Category, absorber: Option<&Category>) {
    let produced: HashSet<&str> = rules
      .iter()
      .map(|r| r.lhs.name.as_str())
      .chain(annotator::CATEGORIES.iter().copied())
      .collect();

    let mut used: Vec<&Category> = rules
      .iter()
      .flat_map(|r| r.rhs.iter().filter_map(|p| p.category()))
      .chain(absorber)
      .chain(Some(start))
      .collect();
    used.sort();
    used.dedup();

    for category in used {
      if !produced.contains(category.name.as_str()) {
        warn!("{} is used but no rule produces it", category);
      }
    }
  }

  pub fn rules(&self) -> &[Arc<Rule>] {
    &self.rules
  }

  pub fn annotator(&self) -> &Annotator {
    &self.annotator
  }

  pub fn absorber(&self) -> Option<&Category> {
    self.absorber.as_ref()
  }

  pub(crate) fn lexical_rules(&self, words: &[String]) -> &[Arc<Rule>] {
    if words.len() > self.max_lexical_len {
      return &[];
    }
    self.lexical.get(words).map(Vec::as_slice).unwrap_or(&[])
  }

  pub(crate) fn unary_rules(&self, child: &Category) -> &[Arc<Rule>] {
    self.unary.get(child).map(Vec::as_slice).unwrap_or(&[])
  }

  pub(crate) fn compositional_rules(&self, first: &Category) -> &[Arc<Rule>] {
    self
      .compositional
      .get(first)
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn parse_chart(&self, tokens: &[Token], beam_width: usize) -> Chart {
    parse_chart(self, tokens, beam_width)
  }

  /// Every entry covering all of `tokens`, whatever its category.
  pub fn parse(&self, tokens: &[Token], beam_width: usize) -> Vec<(Category, Option<LogicalForm>)> {
    self.parse_chart(tokens, beam_width).full_span_entries()
  }

  pub fn translate(&self, lf: &LogicalForm) -> String {
    logical_form::translate(lf)
  }
}

impl FromStr for Grammar {
  type Err = GrammarDefinitionError;

  /// Parses a rule table and builds a grammar from it with the default
  /// configuration. The first rule's lhs is the start category.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s.parse()?, &ParserConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::annotator::tokenize;
  use pretty_assertions::assert_eq;

  #[test]
  fn test_builtin_grammar_builds() {
    let g = Grammar::with_config(&ParserConfig::default()).unwrap();
    assert_eq!(g.start, Category::new("$ROOT"));
    assert_eq!(g.absorber(), Some(&Category::new("$Stop")));
    assert!(g.annotator().lexicon().contains("because"));
    assert!(g.annotator().lexicon().contains("<start>"));
  }

  #[test]
  fn test_duplicate_rules_collapse() {
    let g: Grammar = r#"
      $A -> $B ?$C => first;
      $A -> $B => in_order;
      $B -> b => (.int 1);
      $C -> c;
    "#
    .parse()
    .unwrap();
    let printed = g.rules().iter().map(|r| r.to_string()).collect::<Vec<_>>();
    assert_eq!(
      printed,
      vec!["$A -> $B $C => first", "$A -> $B => first", "$B -> b => (.int 1)", "$C -> c"]
    );
  }

  #[test]
  fn test_unary_cycle() {
    let err = r#"
      $A -> $B => first;
      $B -> $C => first;
      $C -> $A => first;
      $C -> c;
    "#
    .parse::<Grammar>()
    .unwrap_err();
    assert!(matches!(err, GrammarDefinitionError::UnaryCycle(_)));
  }

  #[test]
  fn test_parse_full_span() {
    let g: Grammar = r#"
      $S -> $Num $Plus $Num => ($1 $0 $2);
      $Plus -> plus | and => .and;
      $Num -> $Int => first;
    "#
    .parse()
    .unwrap();

    let parses = g.parse(&tokenize("1 plus 2"), 10);
    let forms: Vec<String> = parses
      .iter()
      .filter(|(cat, _)| *cat == g.start)
      .filter_map(|(_, form)| form.as_ref().map(|f| f.to_string()))
      .collect();
    assert_eq!(forms, vec!["(.and (.int 1) (.int 2))"]);

    assert!(g.parse(&tokenize("1 minus 2"), 10).is_empty());
    assert!(g.parse(&[], 10).is_empty());
  }
}
