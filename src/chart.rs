//! Bottom-up chart parsing with a beam.
//!
//! Spans are filled in order of increasing length, so every child cell a
//! rule can use is complete before its parent is built. Each cell keeps, per
//! category, at most `beam_width` distinct logical forms.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use crate::annotator::Token;
use crate::grammar::Grammar;
use crate::logical_form::LogicalForm;
use crate::rules::{Category, Rule};
use crate::utils::combinations;

/// The entries of one span, in the order they were derived.
pub type Cell = IndexMap<Category, IndexSet<Option<LogicalForm>>>;

#[derive(Debug)]
pub struct Chart {
  words: Vec<String>,
  cells: HashMap<(usize, usize), Cell>,
}

impl Chart {
  fn new(tokens: &[Token]) -> Self {
    Self {
      words: tokens.iter().map(|t| t.text.clone()).collect(),
      cells: HashMap::new(),
    }
  }

  /// Number of tokens the chart covers.
  pub fn len(&self) -> usize {
    self.words.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// The cell for tokens `start..end`, if anything was derived there.
  pub fn cell(&self, start: usize, end: usize) -> Option<&Cell> {
    self.cells.get(&(start, end))
  }

  fn forms(&self, span: (usize, usize), category: &Category) -> Option<&IndexSet<Option<LogicalForm>>> {
    self.cells.get(&span).and_then(|cell| cell.get(category))
  }

  fn has(&self, span: (usize, usize), category: &Category) -> bool {
    self.forms(span, category).is_some()
  }

  /// Entries spanning every token.
  pub fn full_span_entries(&self) -> Vec<(Category, Option<LogicalForm>)> {
    self
      .cell(0, self.len())
      .into_iter()
      .flat_map(|cell| {
        cell
          .iter()
          .flat_map(|(cat, forms)| forms.iter().map(move |form| (cat.clone(), form.clone())))
      })
      .collect()
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut spans: Vec<&(usize, usize)> = self.cells.keys().collect();
    spans.sort_by_key(|(start, end)| (end - start, *start));
    for span in spans {
      let (start, end) = *span;
      writeln!(f, "Span {}..{}: {}", start, end, self.words[start..end].join(" "))?;
      for (category, forms) in self.cells[span].iter() {
        for form in forms {
          match form {
            Some(form) => writeln!(f, "  {}: {}", category, form)?,
            None => writeln!(f, "  {}", category)?,
          }
        }
      }
    }
    Ok(())
  }
}

fn add(cell: &mut Cell, category: &Category, form: Option<LogicalForm>) -> bool {
  cell.entry(category.clone()).or_default().insert(form)
}

/// Every way of laying `rule.rhs[idx..]` over `pos..end` with each item
/// matching a non-empty cell of its category. Recursion depth is bounded by
/// the rule's length.
fn extend_out(
  chart: &Chart,
  rule: &Rule,
  idx: usize,
  pos: usize,
  end: usize,
  spans: &mut Vec<(usize, usize)>,
  out: &mut Vec<Vec<(usize, usize)>>,
) {
  if idx == rule.len() {
    if pos == end {
      out.push(spans.clone());
    }
    return;
  }
  let Some(category) = rule.rhs[idx].category() else {
    return;
  };
  let remaining = rule.len() - idx - 1;
  if end < pos + 1 + remaining {
    return;
  }
  for next in pos + 1..=end - remaining {
    if chart.has((pos, next), category) {
      spans.push((pos, next));
      extend_out(chart, rule, idx + 1, next, end, spans, out);
      spans.pop();
    }
  }
}

/// Applies `rule` to every combination of the children's forms.
fn apply_rule(chart: &Chart, rule: &Rule, spans: &[(usize, usize)], cell: &mut Cell) {
  let choices: Vec<Vec<Option<LogicalForm>>> = spans
    .iter()
    .zip(rule.rhs.iter())
    .map(|(span, item)| {
      item
        .category()
        .and_then(|cat| chart.forms(*span, cat))
        .map(|forms| forms.iter().cloned().collect())
        .unwrap_or_default()
    })
    .collect();

  for children in combinations(&choices) {
    match rule.apply_semantics(&children) {
      Ok(form) => {
        add(cell, &rule.lhs, form);
      }
      Err(err) => trace!("{} failed on {:?}: {}", rule, children, err),
    }
  }
}

fn build_cell(g: &Grammar, chart: &Chart, tokens: &[Token], start: usize, end: usize) -> Cell {
  let span = &tokens[start..end];
  let mut cell = Cell::new();

  for (category, form) in g.annotator().annotate(span) {
    add(&mut cell, &category, form);
  }

  let words: Vec<String> = span.iter().map(Token::normalized).collect();
  for rule in g.lexical_rules(&words) {
    match rule.apply_semantics(&[]) {
      Ok(form) => {
        add(&mut cell, &rule.lhs, form);
      }
      Err(err) => trace!("{} failed: {}", rule, err),
    }
  }

  for mid in start + 1..end {
    let Some(left) = chart.cell(start, mid) else {
      continue;
    };
    for category in left.keys() {
      for rule in g.compositional_rules(category) {
        let mut layouts = Vec::new();
        extend_out(chart, rule, 1, mid, end, &mut vec![(start, mid)], &mut layouts);
        for spans in layouts {
          apply_rule(chart, rule, &spans, &mut cell);
        }
      }
    }
  }

  if let Some(absorber) = g.absorber() {
    for mid in start + 1..end {
      let absorbed = &tokens[start..mid];
      if !absorbed.iter().any(|t| g.annotator().is_out_of_grammar(t)) {
        continue;
      }
      if let Some(forms) = chart.forms((mid, end), absorber) {
        for form in forms.iter() {
          add(&mut cell, absorber, form.clone());
        }
      }
    }
  }

  // unary closure; a rule fires once per new entry
  let mut queue: VecDeque<(Category, Option<LogicalForm>)> = cell
    .iter()
    .flat_map(|(cat, forms)| forms.iter().map(move |form| (cat.clone(), form.clone())))
    .collect();
  while let Some((category, form)) = queue.pop_front() {
    for rule in g.unary_rules(&category) {
      match rule.apply_semantics(std::slice::from_ref(&form)) {
        Ok(parent) => {
          if add(&mut cell, &rule.lhs, parent.clone()) {
            queue.push_back((rule.lhs.clone(), parent));
          }
        }
        Err(err) => trace!("{} failed on {:?}: {}", rule, form, err),
      }
    }
  }

  cell
}

/// Keeps the `beam_width` smallest forms of each category. Ties keep their
/// derivation order.
fn prune(cell: &mut Cell, beam_width: usize) {
  for (category, forms) in cell.iter_mut() {
    if forms.len() <= beam_width {
      continue;
    }
    let mut ranked: Vec<Option<LogicalForm>> = forms.drain(..).collect();
    ranked.sort_by_key(|form| form.as_ref().map_or(0, LogicalForm::size));
    trace!(
      "pruning {} of {} {} entries",
      ranked.len() - beam_width,
      ranked.len(),
      category
    );
    ranked.truncate(beam_width);
    forms.extend(ranked);
  }
}

pub fn parse_chart(g: &Grammar, tokens: &[Token], beam_width: usize) -> Chart {
  let mut chart = Chart::new(tokens);
  let beam_width = beam_width.max(1);
  let n = tokens.len();

  for len in 1..=n {
    for start in 0..=n - len {
      let end = start + len;
      let mut cell = build_cell(g, &chart, tokens, start, end);
      prune(&mut cell, beam_width);
      if !cell.is_empty() {
        chart.cells.insert((start, end), cell);
      }
    }
  }

  chart
}
