use std::fmt;
use std::sync::Arc;
use std::thread;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::annotator::{Token, tokenize};
use crate::candidate::Candidate;
use crate::chart::Chart;
use crate::config::ParserConfig;
use crate::error::{CompileError, EvaluationError, GrammarDefinitionError};
use crate::explanation::Explanation;
use crate::grammar::Grammar;
use crate::interpreter::{Interpreter, LabelingFunction};
use crate::logical_form::LogicalForm;

/// One reading of an explanation, compiled.
#[derive(Debug, Clone)]
pub struct Parse {
  pub explanation: Arc<Explanation>,
  pub semantics: LogicalForm,
  pub function: Arc<LabelingFunction>,
}

impl Parse {
  pub fn name(&self) -> &str {
    &self.function.name
  }

  pub fn apply(&self, candidate: &dyn Candidate) -> Result<i64, EvaluationError> {
    self.function.apply(candidate)
  }
}

impl fmt::Display for Parse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Parse({}: {})",
      self.name(),
      crate::logical_form::translate(&self.semantics)
    )
  }
}

/// An explanation the grammar has no reading for.
#[derive(Debug, Clone)]
pub struct Unparseable {
  pub explanation: Arc<Explanation>,
}

impl fmt::Display for Unparseable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Unparseable({})", self.explanation)
  }
}

#[derive(Debug, Default)]
pub struct ParseOutcome {
  /// Grouped by explanation, in the order the explanations were given.
  pub parses: Vec<Parse>,
  pub unparseable: Vec<Unparseable>,
}

/// The parses of one explanation sorted by how they fare against what the
/// explanation's author meant.
#[derive(Debug, Default)]
pub struct ParseEvaluation {
  /// Equal to the expected logical form.
  pub correct: Vec<Parse>,
  /// Give the explanation's label on its candidate.
  pub passing: Vec<Parse>,
  pub failing: Vec<Parse>,
  pub erroring: Vec<(Parse, EvaluationError)>,
}

impl ParseEvaluation {
  pub fn len(&self) -> usize {
    self.correct.len() + self.passing.len() + self.failing.len() + self.erroring.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Turns explanations into labeling functions. Cheap to share between
/// threads: the grammar is immutable and every parse builds its own chart.
#[derive(Debug, Clone)]
pub struct SemanticParser {
  grammar: Arc<Grammar>,
  interpreter: Interpreter,
  beam_width: usize,
}

impl SemanticParser {
  /// A parser over the built-in grammar.
  pub fn new(config: &ParserConfig) -> Result<Self, GrammarDefinitionError> {
    Ok(Self::with_grammar(Grammar::with_config(config)?, config))
  }

  /// A parser over a custom rule table, in the same format as the built-in
  /// grammars.
  pub fn from_rules(rules: &str, config: &ParserConfig) -> Result<Self, GrammarDefinitionError> {
    Ok(Self::with_grammar(Grammar::new(rules.parse()?, config)?, config))
  }

  fn with_grammar(grammar: Grammar, config: &ParserConfig) -> Self {
    Self {
      grammar: Arc::new(grammar),
      interpreter: Interpreter::new(config.aliases.clone()),
      beam_width: config.beam_width.max(1),
    }
  }

  pub fn grammar(&self) -> &Grammar {
    &self.grammar
  }

  pub fn beam_width(&self) -> usize {
    self.beam_width
  }

  /// The tokens an explanation is parsed as:
  /// `<START> label L because CONDITION <STOP>`.
  pub fn tokens(explanation: &Explanation) -> Vec<Token> {
    let mut tokens = vec![
      Token::synthetic("<START>"),
      Token::synthetic("label"),
      Token::synthetic(explanation.label.to_string()),
      Token::synthetic("because"),
    ];
    tokens.extend(tokenize(&explanation.condition));
    tokens.push(Token::synthetic("<STOP>"));
    tokens
  }

  pub fn parse(&self, explanations: &[Explanation]) -> Result<ParseOutcome, CompileError> {
    self.parse_with_beam(explanations, self.beam_width)
  }

  pub fn parse_with_beam(
    &self,
    explanations: &[Explanation],
    beam_width: usize,
  ) -> Result<ParseOutcome, CompileError> {
    let parsed = explanations
      .iter()
      .enumerate()
      .map(|(idx, explanation)| self.parse_one(idx, explanation, beam_width))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self::outcome(explanations, parsed))
  }

  /// `parse`, with the explanations split between `workers` threads. The
  /// result is the same as parsing them one after another.
  pub fn parse_parallel(
    &self,
    explanations: &[Explanation],
    workers: usize,
  ) -> Result<ParseOutcome, CompileError> {
    if explanations.is_empty() {
      return Ok(ParseOutcome::default());
    }
    let chunk_size = explanations.len().div_ceil(workers.max(1));
    let beam_width = self.beam_width;

    let chunks: Vec<Vec<Result<Vec<Parse>, CompileError>>> = thread::scope(|scope| {
      let handles: Vec<_> = explanations
        .chunks(chunk_size)
        .enumerate()
        .map(|(n, chunk)| {
          scope.spawn(move || {
            chunk
              .iter()
              .enumerate()
              .map(|(i, explanation)| self.parse_one(n * chunk_size + i, explanation, beam_width))
              .collect::<Vec<_>>()
          })
        })
        .collect();
      handles
        .into_iter()
        .map(|handle| handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
        .collect()
    });

    let parsed = chunks.into_iter().flatten().collect::<Result<Vec<_>, _>>()?;
    Ok(Self::outcome(explanations, parsed))
  }

  fn outcome(explanations: &[Explanation], parsed: Vec<Vec<Parse>>) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    for (explanation, parses) in explanations.iter().zip(parsed) {
      if parses.is_empty() {
        outcome.unparseable.push(Unparseable {
          explanation: Arc::new(explanation.clone()),
        });
      } else {
        outcome.parses.extend(parses);
      }
    }
    debug!(
      "{} parses, {} of {} explanations unparseable",
      outcome.parses.len(),
      outcome.unparseable.len(),
      explanations.len()
    );
    outcome
  }

  fn parse_one(
    &self,
    idx: usize,
    explanation: &Explanation,
    beam_width: usize,
  ) -> Result<Vec<Parse>, CompileError> {
    let tokens = Self::tokens(explanation);
    let forms: IndexSet<LogicalForm> = self
      .grammar
      .parse(&tokens, beam_width)
      .into_iter()
      .filter(|(category, _)| *category == self.grammar.start)
      .filter_map(|(_, form)| form)
      .collect();

    let explanation = Arc::new(explanation.clone());
    let base = explanation
      .name
      .clone()
      .unwrap_or_else(|| format!("exp{}", idx));

    let mut parses = Vec::with_capacity(forms.len());
    for form in forms {
      let name = format!("{}_{}", base, parses.len());
      match self.interpreter.compile(&form, name) {
        Ok(function) => parses.push(Parse {
          explanation: explanation.clone(),
          semantics: form,
          function: Arc::new(function),
        }),
        Err(err) if err.is_type_error() => {
          debug!("dropping a reading of {}: {}", explanation, err);
        }
        Err(err) => return Err(err),
      }
    }

    debug!("{} parses for {}", parses.len(), explanation);
    Ok(parses)
  }

  /// Parses one explanation and sorts its parses against the explanation's
  /// expected semantics, or failing that, against its candidate.
  pub fn parse_and_evaluate(&self, explanation: &Explanation) -> Result<ParseEvaluation, CompileError> {
    let parses = self.parse_one(0, explanation, self.beam_width)?;

    let mut evaluation = ParseEvaluation::default();
    for parse in parses {
      if explanation.semantics.as_ref() == Some(&parse.semantics) {
        evaluation.correct.push(parse);
        continue;
      }
      let Some(candidate) = explanation.candidate() else {
        evaluation.failing.push(parse);
        continue;
      };
      match parse.apply(candidate) {
        Ok(label) if label == explanation.label => evaluation.passing.push(parse),
        Ok(_) => evaluation.failing.push(parse),
        Err(err) => {
          warn!("{} errored: {}", parse, err);
          evaluation.erroring.push((parse, err));
        }
      }
    }
    Ok(evaluation)
  }

  /// The chart built for an explanation, for looking into why it doesn't
  /// parse.
  pub fn chart(&self, explanation: &Explanation) -> Chart {
    self
      .grammar
      .parse_chart(&Self::tokens(explanation), self.beam_width)
  }

  pub fn translate(&self, lf: &LogicalForm) -> String {
    self.grammar.translate(lf)
  }
}
