use std::rc::Rc;

use crate::tree::{NodeIdx, TOP_NODE, TreeArena};

/// One scored outcome sequence from a sequence scorer
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
  pub outcomes: Vec<String>,
  /// Probability of each outcome, in the 0..=1 range
  pub probs: Vec<f64>,
}

impl Sequence {
  pub fn new<S: Into<String>>(outcomes: impl IntoIterator<Item = S>, probs: Vec<f64>) -> Self {
    Self {
      outcomes: outcomes.into_iter().map(Into::into).collect(),
      probs,
    }
  }

  pub fn len(&self) -> usize {
    self.outcomes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.outcomes.is_empty()
  }

  /// Log probability of the whole sequence
  pub fn score(&self) -> f64 {
    self.probs.iter().map(|&p| crate::utils::log_prob(p)).sum()
  }
}

/// A tagger or chunker.
pub trait SequenceScorer {
  /// The best sequences for `tokens`, best first. Chunkers get the chosen tags and
  /// may use `min_score` (a log probability) to skip sequences that can't make the beam.
  fn top_k_sequences(
    &self,
    tokens: &[String],
    tags: Option<&[String]>,
    min_score: Option<f64>,
  ) -> Vec<Sequence>;
}

/// Proposes the structural moves available to a hypothesis after chunking.
pub trait AdvanceStrategy {
  /// Successor roots for `hypothesis`, each already carrying its final probability.
  /// The alternatives tried should cover at least `prob_mass` of the model's
  /// distribution. Returning nothing means there is no legal move.
  fn advance(&self, arena: &mut TreeArena, hypothesis: NodeIdx, prob_mass: f64) -> Vec<NodeIdx>;
}

/// Wraps a completed hypothesis with the sentence-level top label.
pub trait TopLabeler {
  /// Returns the labeled root, which may be a fresh node
  fn attach_top(&self, arena: &mut TreeArena, root: NodeIdx) -> NodeIdx;
}

impl<T: SequenceScorer + ?Sized> SequenceScorer for Rc<T> {
  fn top_k_sequences(
    &self,
    tokens: &[String],
    tags: Option<&[String]>,
    min_score: Option<f64>,
  ) -> Vec<Sequence> {
    (**self).top_k_sequences(tokens, tags, min_score)
  }
}

impl<T: AdvanceStrategy + ?Sized> AdvanceStrategy for Rc<T> {
  fn advance(&self, arena: &mut TreeArena, hypothesis: NodeIdx, prob_mass: f64) -> Vec<NodeIdx> {
    (**self).advance(arena, hypothesis, prob_mass)
  }
}

impl<T: TopLabeler + ?Sized> TopLabeler for Rc<T> {
  fn attach_top(&self, arena: &mut TreeArena, root: NodeIdx) -> NodeIdx {
    (**self).attach_top(arena, root)
  }
}

/// Relabels the root as [`TOP_NODE`] without touching its probability
#[derive(Debug, Default, Copy, Clone)]
pub struct SetTopLabel;

impl TopLabeler for SetTopLabel {
  fn attach_top(&self, arena: &mut TreeArena, root: NodeIdx) -> NodeIdx {
    let prob = arena.prob(root);
    let top = arena.clone_with_prob(root, prob);
    arena.node_mut(top).kind = TOP_NODE.to_string();
    top
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tree::INC_NODE;

  #[test]
  fn test_sequence_score() {
    let seq = Sequence::new(["NNP", "VBD"], vec![1.0, 0.5]);
    assert_eq!(seq.len(), 2);
    assert!((seq.score() - 0.5f64.ln()).abs() < 1e-12);
    assert_eq!(Sequence::new(["x"], vec![0.0]).score(), f64::NEG_INFINITY);
  }

  #[test]
  fn test_set_top_label() {
    let (mut arena, root) = TreeArena::from_tokens(&["hi"]);
    arena.node_mut(root).prob = -0.25;
    let top = SetTopLabel.attach_top(&mut arena, root);
    assert_ne!(top, root);
    assert_eq!(arena.kind(top), TOP_NODE);
    assert_eq!(arena.kind(root), INC_NODE);
    assert_eq!(arena.prob(top), -0.25);
    assert_eq!(arena.children(top), arena.children(root));
  }
}
