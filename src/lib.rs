//! Turns natural-language explanations ("label 1 because 'wife' is between X
//! and Y") into labeling functions, by chart-parsing them against a small
//! rule grammar and compiling the logical forms that come out.

#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod utils;

pub mod annotator;
pub mod candidate;
pub mod chart;
pub mod config;
pub mod error;
pub mod explanation;
pub mod grammar;
pub mod interpreter;
pub mod logical_form;
pub mod parse_grammar;
pub mod parser;
pub mod primitives;
pub mod rules;

pub use crate::candidate::{Candidate, RelationMention};
pub use crate::config::ParserConfig;
pub use crate::error::{CompileError, EvaluationError, GrammarDefinitionError};
pub use crate::explanation::{Explanation, link_candidates};
pub use crate::grammar::Grammar;
pub use crate::interpreter::LabelingFunction;
pub use crate::logical_form::LogicalForm;
pub use crate::parser::{Parse, ParseEvaluation, ParseOutcome, SemanticParser, Unparseable};

/// What a labeling function returns when its condition doesn't hold.
pub const ABSTAIN: i64 = 0;

#[test]
fn test_explanation_to_label() {
  let parser = SemanticParser::new(&ParserConfig::default()).unwrap();
  let outcome = parser
    .parse(&[Explanation::new("'wife' is between X and Y", 1)])
    .unwrap();
  assert_eq!(outcome.parses.len(), 1);

  let married = RelationMention::new(
    "married",
    "Daniel and his wife Pernilla",
    candidate::WordSpan::new(0, 0),
    candidate::WordSpan::new(4, 4),
  );
  let siblings = RelationMention::new(
    "siblings",
    "Daniel and his sister Pernilla",
    candidate::WordSpan::new(0, 0),
    candidate::WordSpan::new(4, 4),
  );
  assert_eq!(outcome.parses[0].apply(&married), Ok(1));
  assert_eq!(outcome.parses[0].apply(&siblings), Ok(ABSTAIN));
}
