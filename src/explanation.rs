use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::{debug, info};

use crate::candidate::Candidate;
use crate::logical_form::LogicalForm;
use crate::utils::normalize_whitespace;

/// The candidate an explanation was written about: either a stable id still
/// to be resolved, or the candidate itself.
#[derive(Debug, Clone)]
pub enum CandidateRef {
  Id(String),
  Linked(Arc<dyn Candidate>),
}

impl CandidateRef {
  pub fn id(&self) -> &str {
    match self {
      Self::Id(id) => id,
      Self::Linked(candidate) => candidate.id(),
    }
  }
}

/// A natural-language statement of why a candidate gets a label.
#[derive(Debug, Clone)]
pub struct Explanation {
  pub condition: String,
  pub label: i64,
  pub candidate: Option<CandidateRef>,
  pub name: Option<String>,
  /// The logical form the condition is meant to parse to, if known.
  pub semantics: Option<LogicalForm>,
}

impl Explanation {
  pub fn new(condition: &str, label: i64) -> Self {
    Self {
      condition: normalize_whitespace(condition),
      label,
      candidate: None,
      name: None,
      semantics: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_candidate(mut self, candidate: Arc<dyn Candidate>) -> Self {
    self.candidate = Some(CandidateRef::Linked(candidate));
    self
  }

  pub fn with_candidate_id(mut self, id: impl Into<String>) -> Self {
    self.candidate = Some(CandidateRef::Id(id.into()));
    self
  }

  pub fn with_semantics(mut self, semantics: LogicalForm) -> Self {
    self.semantics = Some(semantics);
    self
  }

  /// The linked candidate. `None` if there is none or it is still an id.
  pub fn candidate(&self) -> Option<&dyn Candidate> {
    match &self.candidate {
      Some(CandidateRef::Linked(candidate)) => Some(candidate.as_ref()),
      _ => None,
    }
  }

  pub fn candidate_id(&self) -> Option<&str> {
    self.candidate.as_ref().map(CandidateRef::id)
  }
}

impl PartialEq for Explanation {
  fn eq(&self, other: &Self) -> bool {
    self.label == other.label
      && self.condition == other.condition
      && self.candidate_id() == other.candidate_id()
  }
}

impl Eq for Explanation {}

impl Hash for Explanation {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.label.hash(state);
    self.condition.hash(state);
    self.candidate_id().hash(state);
  }
}

impl fmt::Display for Explanation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.name {
      Some(name) => write!(f, "Explanation({}: {}, {:?})", name, self.label, self.condition),
      None => write!(f, "Explanation({}, {:?})", self.label, self.condition),
    }
  }
}

/// Replaces candidate ids with the candidates they name. Returns how many
/// explanations were linked.
pub fn link_candidates(explanations: &mut [Explanation], candidates: &[Arc<dyn Candidate>]) -> usize {
  let by_id: HashMap<&str, &Arc<dyn Candidate>> = candidates.iter().map(|c| (c.id(), c)).collect();

  let mut linked = 0;
  for explanation in explanations.iter_mut() {
    let Some(CandidateRef::Id(id)) = &explanation.candidate else {
      continue;
    };
    match by_id.get(id.as_str()) {
      Some(candidate) => {
        explanation.candidate = Some(CandidateRef::Linked(Arc::clone(candidate)));
        linked += 1;
      }
      None => debug!("no candidate with id {} for {}", id, explanation),
    }
  }

  info!(
    "linked {} of {} explanations to candidates",
    linked,
    explanations.len()
  );
  linked
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::candidate::RelationMention;
  use crate::candidate::fixtures::{AMMANN_ID, ammann};
  use pretty_assertions::assert_eq;
  use std::collections::HashSet;

  #[test]
  fn test_condition_is_normalized() {
    let exp = Explanation::new("  'wife' is   between\nX and Y ", 1);
    assert_eq!(exp.condition, "'wife' is between X and Y");
  }

  #[test]
  fn test_identity_ignores_name_and_semantics() {
    let a = Explanation::new("True", 1).with_name("a").with_candidate_id("c1");
    let b = Explanation::new("True", 1)
      .with_candidate_id("c1")
      .with_semantics("(.bool true)".parse().unwrap());
    let c = Explanation::new("True", 2).with_candidate_id("c1");
    let d = Explanation::new("True", 1).with_candidate_id("c2");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);

    let set: HashSet<Explanation> = [a, b, c, d].into_iter().collect();
    assert_eq!(set.len(), 3);
  }

  #[test]
  fn test_linked_and_unlinked_candidates_compare_by_id() {
    let candidate: Arc<dyn Candidate> = Arc::new(RelationMention::pair("foo", "bar"));
    let linked = Explanation::new("True", 1).with_candidate(candidate);
    let unlinked = Explanation::new("True", 1).with_candidate_id("foo~~bar");
    assert_eq!(linked, unlinked);
    assert!(linked.candidate().is_some());
    assert!(unlinked.candidate().is_none());
  }

  #[test]
  fn test_display() {
    assert_eq!(
      Explanation::new("X is 'foo'", 1).with_name("foo").to_string(),
      r#"Explanation(foo: 1, "X is 'foo'")"#
    );
    assert_eq!(Explanation::new("True", -1).to_string(), r#"Explanation(-1, "True")"#);
  }

  #[test]
  fn test_link_candidates() {
    let candidates: Vec<Arc<dyn Candidate>> = vec![
      Arc::new(ammann()),
      Arc::new(RelationMention::pair("foo", "bar")),
    ];
    let mut explanations = vec![
      Explanation::new("'wife' is between X and Y", 1).with_candidate_id(AMMANN_ID),
      Explanation::new("True", 1).with_candidate_id("missing"),
      Explanation::new("True", 1),
    ];

    assert_eq!(link_candidates(&mut explanations, &candidates), 1);
    assert_eq!(explanations[0].candidate().map(|c| c.id()), Some(AMMANN_ID));
    assert_eq!(explanations[1].candidate_id(), Some("missing"));
    assert!(explanations[1].candidate().is_none());
    assert!(explanations[2].candidate.is_none());
  }
}
