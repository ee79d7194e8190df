use std::rc::Rc;

use tracing::{trace, warn};

use super::models::{AdvanceStrategy, TopLabeler};
use super::{CONT, START, TOP_START};
use crate::head_rules::HeadRules;
use crate::punctuation::collapse_punctuation;
use crate::span::Span;
use crate::tree::{NodeIdx, TOP_NODE, TreeArena};
use crate::utils::log_prob;

/// Scores how the next unlabeled child should be labeled: `S-X` to open a constituent
/// of type X there, `C-X` to continue the open one.
pub trait BuildModel {
  /// Outcome distribution for `children[index]`
  fn eval(&self, arena: &TreeArena, children: &[NodeIdx], index: usize) -> Vec<(String, f64)>;
}

/// Scores whether the open constituent is finished.
pub trait CheckModel {
  /// Probability that the `kind` constituent opened at `children[start]` ends at
  /// `children[index]`
  fn complete_prob(
    &self,
    arena: &TreeArena,
    children: &[NodeIdx],
    kind: &str,
    start: usize,
    index: usize,
  ) -> f64;
}

/// The shift/reduce attachment strategy. Each step labels the leftmost unlabeled child
/// through the build model, then either reduces the open constituent over it or
/// shifts past it, as the check model allows.
pub struct BuildCheckStrategy<B, C> {
  build: B,
  check: C,
  head_rules: Rc<dyn HeadRules>,
}

impl<B: BuildModel, C: CheckModel> BuildCheckStrategy<B, C> {
  pub fn new(build: B, check: C, head_rules: Rc<dyn HeadRules>) -> Self {
    Self {
      build,
      check,
      head_rules,
    }
  }

  /// Last of `children` labeled as the start of a constituent
  fn open_start(arena: &TreeArena, children: &[NodeIdx]) -> Option<(usize, String)> {
    children.iter().enumerate().rev().find_map(|(idx, &c)| {
      let label = arena.node(c).label.as_deref()?;
      label
        .strip_prefix(START)
        .map(|kind| (idx, kind.to_string()))
    })
  }

  /// Wraps `children[start..=index]` of `root` in a new `kind` node that takes over the
  /// punctuation before its first child and after its last. Returns false when the run
  /// is only part-of-speech tags, which chunking already covered.
  fn reduce(
    &self,
    arena: &mut TreeArena,
    root: NodeIdx,
    children: &[NodeIdx],
    (start, kind): (usize, &str),
    index: usize,
    complete: f64,
  ) -> bool {
    let cons = &children[start..=index];
    if cons.iter().all(|&c| arena.is_pos_tag(c)) {
      return false;
    }

    let span = if start == 0 && index == children.len() - 1 {
      arena.span(root)
    } else {
      Span::new(arena.span(cons[0]).start, arena.span(cons[cons.len() - 1]).end)
    };
    let head = self.head_rules.head_of(arena, cons, kind);
    let node = arena.alloc_node(span, kind, log_prob(complete), Some(head), None);
    let prev_punct = arena.node(cons[0]).prev_punct.clone();
    let next_punct = arena.node(cons[cons.len() - 1]).next_punct.clone();
    let reduced = arena.node_mut(node);
    reduced.prev_punct = prev_punct;
    reduced.next_punct = next_punct;
    match arena.insert(root, node) {
      Ok(()) => true,
      Err(e) => {
        warn!(%e, "couldn't reduce");
        false
      }
    }
  }
}

impl<B: BuildModel, C: CheckModel> AdvanceStrategy for BuildCheckStrategy<B, C> {
  fn advance(&self, arena: &mut TreeArena, hypothesis: NodeIdx, prob_mass: f64) -> Vec<NodeIdx> {
    let q = 1.0 - prob_mass;
    let original = arena.children(hypothesis).to_vec();
    let children =
      collapse_punctuation(arena, &original, self.head_rules.punctuation_tags()).into_owned();

    let Some(index) = children
      .iter()
      .position(|&c| arena.node(c).label.is_none())
    else {
      return Vec::new();
    };
    let Some(original_index) = original.iter().position(|&c| c == children[index]) else {
      return Vec::new();
    };
    let open = Self::open_start(arena, &children[..index]);
    let last = index == children.len() - 1;

    let mut outcomes = self.build.eval(arena, &children, index);
    outcomes.sort_by(|a, b| b.1.total_cmp(&a.1));

    let base = arena.prob(hypothesis);
    let mut mass = 0.0;
    let mut successors = Vec::new();
    for (outcome, p) in outcomes {
      if mass >= prob_mass || p <= 0.0 {
        break;
      }
      mass += p;
      if outcome == TOP_START {
        continue;
      }

      let start = if let Some(kind) = outcome.strip_prefix(START) {
        Some((index, kind))
      } else if let Some(kind) = outcome.strip_prefix(CONT) {
        open
          .as_ref()
          .filter(|(_, open_kind)| open_kind == kind)
          .map(|(idx, open_kind)| (*idx, open_kind.as_str()))
      } else {
        warn!(%outcome, "unknown build outcome, skipping");
        continue;
      };

      let labeled_prob = base + log_prob(p);
      let labeled = arena.clone_with_prob(hypothesis, labeled_prob);
      let relabeled = arena.relabel_child(labeled, original_index, &outcome);
      let mut labeled_children = children.clone();
      labeled_children[index] = relabeled;

      let complete = match start {
        Some((s, kind)) => self
          .check
          .complete_prob(arena, &labeled_children, kind, s, index),
        None => 0.0,
      };

      match start {
        Some(start) if complete > q => {
          let reduced = arena.clone_with_prob(labeled, labeled_prob + log_prob(complete));
          if self.reduce(arena, reduced, &labeled_children, start, index, complete) {
            trace!(%outcome, complete, "reduce");
            successors.push(reduced);
          }
        }
        _ => {}
      }
      if 1.0 - complete > q && !last {
        let shifted = arena.clone_with_prob(labeled, labeled_prob + log_prob(1.0 - complete));
        trace!(%outcome, complete, "shift");
        successors.push(shifted);
      }
    }
    successors
  }
}

impl<B: BuildModel, C: CheckModel> TopLabeler for BuildCheckStrategy<B, C> {
  /// Scores the finished tree as an `S-TOP` that is immediately complete
  fn attach_top(&self, arena: &mut TreeArena, root: NodeIdx) -> NodeIdx {
    let children = arena.children(root).to_vec();
    let mut prob = arena.prob(root);
    if !children.is_empty() {
      let top = self
        .build
        .eval(arena, &children, 0)
        .into_iter()
        .find(|(outcome, _)| outcome == TOP_START)
        .map_or(0.0, |(_, p)| p);
      let complete = self.check.complete_prob(arena, &children, TOP_NODE, 0, 0);
      prob += log_prob(top) + log_prob(complete);
    }

    let top = arena.clone_with_prob(root, prob);
    arena.node_mut(top).kind = TOP_NODE.to_string();
    top
  }
}
