//! Staged beam search over partial parse trees.
//!
//! Every sentence starts as a flat tree of tokens. Stage 0 tags it, stage 1 chunks it,
//! and every later stage hands each hypothesis to an [`AdvanceStrategy`] until its
//! root has been reduced to a single child.

mod chunking;
mod models;

pub use chunking::{BuildCheckStrategy, BuildModel, CheckModel};
pub use models::{AdvanceStrategy, Sequence, SequenceScorer, SetTopLabel, TopLabeler};

use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::beam::Beam;
use crate::head_rules::HeadRules;
use crate::punctuation::collapse_punctuation;
use crate::span::Span;
use crate::tree::{NodeIdx, Tree, TreeArena, TreeError};
use crate::utils::log_prob;

/// Prefix of a chunk or build outcome that opens a constituent
pub const START: &str = "S-";
/// Prefix of a chunk or build outcome that continues the open constituent
pub const CONT: &str = "C-";
/// Chunk outcome for tokens outside any chunk
pub const OTHER: &str = "O";
/// Build outcome reserved for labeling the root of a finished parse
pub const TOP_START: &str = "S-TOP";

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParserConfig {
  /// Stop once this many parses are complete and nothing left can beat them
  pub max_complete: usize,
  /// Hypotheses expanded, and kept, per stage
  pub beam_size: usize,
  /// Probability mass the alternatives tried at an attachment stage must cover
  pub advance_mass: f64,
}

impl Default for ParserConfig {
  fn default() -> Self {
    Self {
      max_complete: 20,
      beam_size: 20,
      advance_mass: 0.95,
    }
  }
}

impl ParserConfig {
  pub fn with_max_complete(mut self, max_complete: usize) -> Self {
    self.max_complete = max_complete;
    self
  }

  pub fn with_beam_size(mut self, beam_size: usize) -> Self {
    self.beam_size = beam_size;
    self
  }

  pub fn with_advance_mass(mut self, advance_mass: f64) -> Self {
    self.advance_mass = advance_mass;
    self
  }
}

/// Ranked parses of one sentence. The trees share nodes, so parent links are left
/// unset; see [`Parses::into_tree`].
#[derive(Debug, Clone)]
pub struct Parses {
  pub arena: TreeArena,
  pub roots: Vec<NodeIdx>,
}

impl Parses {
  pub fn len(&self) -> usize {
    self.roots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.roots.is_empty()
  }

  pub fn probs(&self) -> impl Iterator<Item = f64> + '_ {
    self.roots.iter().map(|&r| self.arena.prob(r))
  }

  /// Takes the `rank`th parse out, with its parent links reconciled
  pub fn into_tree(mut self, rank: usize) -> Option<Tree> {
    let root = *self.roots.get(rank)?;
    self.arena.reconcile_parents(root);
    Some(Tree {
      arena: self.arena,
      root,
    })
  }
}

/// Bottom-up parser driven by external tagging, chunking and attachment models.
///
/// The beams are reused between sentences, so parsing needs `&mut self`. Use one
/// parser per thread.
pub struct BottomUpParser {
  config: ParserConfig,
  tagger: Box<dyn SequenceScorer>,
  chunker: Box<dyn SequenceScorer>,
  strategy: Box<dyn AdvanceStrategy>,
  top_labeler: Box<dyn TopLabeler>,
  head_rules: Rc<dyn HeadRules>,
  frontier: Beam,
  next_frontier: Beam,
  completed: Beam,
}

impl BottomUpParser {
  pub fn new(
    tagger: impl SequenceScorer + 'static,
    chunker: impl SequenceScorer + 'static,
    strategy: impl AdvanceStrategy + 'static,
    head_rules: Rc<dyn HeadRules>,
  ) -> Self {
    Self {
      config: ParserConfig::default(),
      tagger: Box::new(tagger),
      chunker: Box::new(chunker),
      strategy: Box::new(strategy),
      top_labeler: Box::new(SetTopLabel),
      head_rules,
      frontier: Beam::new(),
      next_frontier: Beam::new(),
      completed: Beam::new(),
    }
  }

  pub fn with_config(mut self, config: ParserConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_top_labeler(mut self, top_labeler: impl TopLabeler + 'static) -> Self {
    self.top_labeler = Box::new(top_labeler);
    self
  }

  pub fn config(&self) -> &ParserConfig {
    &self.config
  }

  /// Best parse of `tokens`, with parent links reconciled. If nothing completed, this
  /// is the best hypothesis left after chunking.
  pub fn parse_one(&mut self, tokens: &[&str]) -> Tree {
    let (mut arena, guess) = self.search(tokens);
    let root = self.completed.first().map_or(guess, |h| h.root);
    arena.reconcile_parents(root);
    Tree { arena, root }
  }

  /// Up to `n` parses of `tokens`, best first
  pub fn parse_n(&mut self, tokens: &[&str], n: usize) -> Parses {
    let (arena, guess) = self.search(tokens);
    let roots = if n == 0 {
      Vec::new()
    } else if self.completed.is_empty() {
      vec![guess]
    } else {
      let mut roots = Vec::with_capacity(n.min(self.completed.len()));
      while roots.len() < n {
        match self.completed.pop_first() {
          Some(h) => roots.push(h.root),
          None => break,
        }
      }
      roots
    };
    Parses { arena, roots }
  }

  /// Runs the stages until the search terminates. Finished parses are left in
  /// `self.completed`; the returned node is the fallback guess.
  fn search(&mut self, tokens: &[&str]) -> (TreeArena, NodeIdx) {
    let beam_size = self.config.beam_size;
    self.frontier = Beam::bounded(beam_size);
    self.next_frontier = Beam::bounded(beam_size);
    self.completed.clear();

    let (mut arena, root) = TreeArena::from_tokens(tokens);
    self.frontier.push(root, arena.prob(root));

    let max_stage = 2 * tokens.len() + 3;
    let mut guess = root;
    let mut stage = 0;

    while stage < max_stage {
      let best = match self.frontier.first() {
        Some(h) => h.prob,
        None => {
          debug!(stage, "frontier exhausted");
          break;
        }
      };
      // force-completed parses count toward the bound like any other
      let worst_complete = self.completed.last().map_or(f64::INFINITY, |h| h.prob);
      if self.completed.len() >= self.config.max_complete && best < worst_complete {
        debug!(stage, best, worst_complete, "no hypothesis left can beat the completed parses");
        break;
      }
      debug!(
        stage,
        frontier = self.frontier.len(),
        completed = self.completed.len(),
        "advancing"
      );

      self.next_frontier = Beam::bounded(beam_size);
      let expand = self.frontier.iter().take(beam_size).copied().collect::<Vec<_>>();
      for (rank, hyp) in expand.into_iter().enumerate() {
        if stage == 2 && rank == 0 {
          guess = hyp.root;
        }

        let successors = match stage {
          0 => self.advance_tags(&mut arena, hyp.root),
          1 => {
            let min_score = if self.next_frontier.is_full() {
              self.next_frontier.last().map(|worst| worst.prob - hyp.prob)
            } else {
              None
            };
            self.advance_chunks(&mut arena, hyp.root, min_score)
          }
          _ => self
            .strategy
            .advance(&mut arena, hyp.root, self.config.advance_mass),
        };

        if successors.is_empty() {
          debug!(stage, root = %hyp.root, "no advance possible, force-completing");
          let top = self.top_labeler.attach_top(&mut arena, hyp.root);
          self.completed.push(top, arena.prob(top));
          continue;
        }

        for successor in successors {
          if arena.is_complete(successor) {
            let top = self.top_labeler.attach_top(&mut arena, successor);
            let prob = arena.prob(top);
            trace!(stage, root = %top, prob, "completed");
            self.completed.push(top, prob);
          } else {
            let prob = arena.prob(successor);
            trace!(stage, root = %successor, prob, "advanced");
            self.next_frontier.push(successor, prob);
          }
        }
      }

      stage += 1;
      std::mem::swap(&mut self.frontier, &mut self.next_frontier);
    }

    let best_complete = self.completed.first().map_or(f64::NEG_INFINITY, |h| h.prob);
    debug!(
      stage,
      completed = self.completed.len(),
      best_complete,
      "search finished"
    );
    (arena, guess)
  }

  /// Tags the tokens under `root`, one successor per tag sequence
  fn advance_tags(&self, arena: &mut TreeArena, root: NodeIdx) -> Vec<NodeIdx> {
    let tokens = arena.children(root).to_vec();
    let words = tokens
      .iter()
      .map(|&t| arena.covered_text(t).to_string())
      .collect::<Vec<_>>();

    let mut successors = Vec::new();
    for seq in self.tagger.top_k_sequences(&words, None, None) {
      if seq.len() != words.len() || seq.probs.len() != words.len() {
        warn!(
          expected = words.len(),
          got = seq.len(),
          "tag sequence has the wrong length, skipping"
        );
        continue;
      }

      let prob = arena.prob(root) + seq.score();
      let new_root = arena.clone_with_prob(root, prob);
      match Self::insert_tags(arena, new_root, &tokens, &seq) {
        Ok(()) => successors.push(new_root),
        Err(e) => warn!(%e, "couldn't apply tag sequence"),
      }
    }
    successors
  }

  fn insert_tags(
    arena: &mut TreeArena,
    root: NodeIdx,
    tokens: &[NodeIdx],
    seq: &Sequence,
  ) -> Result<(), TreeError> {
    for (idx, &token) in tokens.iter().enumerate() {
      let span = arena.span(token);
      let tag = arena.alloc_node(
        span,
        seq.outcomes[idx].as_str(),
        log_prob(seq.probs[idx]),
        None,
        Some(idx),
      );
      arena.insert(root, tag)?;
    }
    Ok(())
  }

  /// Chunks the tagged words under `root`, one successor per chunk sequence
  fn advance_chunks(
    &self,
    arena: &mut TreeArena,
    root: NodeIdx,
    min_score: Option<f64>,
  ) -> Vec<NodeIdx> {
    let tags = arena.children(root).to_vec();
    let words = tags
      .iter()
      .map(|&t| arena.covered_text(t).to_string())
      .collect::<Vec<_>>();
    let pos = tags
      .iter()
      .map(|&t| arena.kind(t).to_string())
      .collect::<Vec<_>>();

    let mut successors = Vec::new();
    for seq in self.chunker.top_k_sequences(&words, Some(&pos), min_score) {
      if seq.len() != words.len() || seq.probs.len() != words.len() {
        warn!(
          expected = words.len(),
          got = seq.len(),
          "chunk sequence has the wrong length, skipping"
        );
        continue;
      }

      let prob = arena.prob(root) + seq.score();
      let new_root = arena.clone_with_prob(root, prob);
      match self.insert_chunks(arena, new_root, &tags, &seq.outcomes) {
        Ok(()) => successors.push(new_root),
        Err(e) => warn!(%e, "couldn't apply chunk sequence"),
      }
    }
    successors
  }

  /// Decodes `S-X`/`C-X`/`O` outcomes into chunks under `root`, then moves the
  /// root's punctuation into its neighbours' punctuation sets.
  fn insert_chunks(
    &self,
    arena: &mut TreeArena,
    root: NodeIdx,
    tags: &[NodeIdx],
    outcomes: &[String],
  ) -> Result<(), TreeError> {
    let mut open: Option<(usize, &str)> = None;
    let mut end = 0;

    for j in 0..=outcomes.len() {
      let outcome = outcomes.get(j).map(String::as_str);
      if outcome.is_some_and(|o| o.starts_with(CONT)) {
        end = j;
        continue;
      }

      if let Some((start, kind)) = open.take() {
        let cons = &tags[start..=end];
        let head = self.head_rules.head_of(arena, cons, kind);
        let span = Span::new(arena.span(cons[0]).start, arena.span(cons[cons.len() - 1]).end);
        let chunk = arena.alloc_node(span, kind, 0.0, Some(head), None);
        arena.node_mut(chunk).is_chunk = true;
        arena.insert(root, chunk)?;
      }

      if let Some(outcome) = outcome {
        if let Some(kind) = outcome.strip_prefix(START) {
          open = Some((j, kind));
          end = j;
        } else if outcome != OTHER {
          warn!(outcome, "unknown chunk tag, treating as outside");
        }
      }
    }

    let punct = self.head_rules.punctuation_tags();
    let mut children = arena.children(root).to_vec();
    if !children.iter().any(|&c| punct.contains(arena.kind(c))) {
      return Ok(());
    }
    // tag nodes outside chunks are shared with sibling hypotheses, so copy the ones
    // whose punctuation sets are about to change
    for child in children.iter_mut() {
      if !arena.node(*child).is_chunk && !punct.contains(arena.kind(*child)) {
        *child = arena.clone_shallow(*child);
      }
    }
    let collapsed = collapse_punctuation(arena, &children, punct).into_owned();
    if !collapsed.is_empty() {
      arena.node_mut(root).children = collapsed;
    }
    Ok(())
  }
}
