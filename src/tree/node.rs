use std::collections::BTreeMap;
use std::fmt;

use crate::span::Span;

/// Label of the root of a finished parse
pub const TOP_NODE: &str = "TOP";
/// Label of the root of a hypothesis that is still being built
pub const INC_NODE: &str = "INC";
/// Label of a token leaf
pub const TOK_NODE: &str = "TK";

/// Index type for the tree arena
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(pub u32);

impl fmt::Display for NodeIdx {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeError {
  /// Tried to insert a node whose span isn't contained by the target's
  InvalidInsertion { target: Span, constituent: Span },
  /// The node we were asked to clone down to isn't on the right frontier
  NotOnFrontier(NodeIdx),
  /// Operation needs a node with at least one child
  NoChildren(NodeIdx),
}

impl fmt::Display for TreeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TreeError::InvalidInsertion {
        target,
        constituent,
      } => write!(
        f,
        "invalid insertion: {} is not contained in {}",
        constituent, target
      ),
      TreeError::NotOnFrontier(idx) => write!(f, "{} is not on the right frontier", idx),
      TreeError::NoChildren(idx) => write!(f, "{} has no children", idx),
    }
  }
}

impl std::error::Error for TreeError {}

/// Punctuation nodes next to a constituent, kept in textual order (keyed by span start).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PunctSet(BTreeMap<usize, NodeIdx>);

impl PunctSet {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn insert(&mut self, start: usize, idx: NodeIdx) {
    self.0.insert(start, idx);
  }

  pub fn contains(&self, idx: NodeIdx) -> bool {
    self.0.values().any(|&i| i == idx)
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = NodeIdx> + '_ {
    self.0.values().copied()
  }
}

/// One constituent or token of a sentence.
///
/// Children are shared between competing hypotheses, so `parent` is only meaningful
/// right after [`TreeArena::reconcile_parents`] has run over one chosen tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
  pub span: Span,
  /// Constituent category, part-of-speech tag, or [`TOK_NODE`]
  pub kind: String,
  /// Which derivation step annotated this node. Not part of its identity.
  pub label: Option<String>,
  pub children: Vec<NodeIdx>,
  /// Lexical head. Points back at the node itself for leaves.
  pub head: NodeIdx,
  /// Index of the head token in the sentence
  pub head_index: Option<usize>,
  /// Log probability of every decision that produced this node
  pub prob: f64,
  pub prev_punct: PunctSet,
  pub next_punct: PunctSet,
  pub is_chunk: bool,
  pub parent: Option<NodeIdx>,
}

/// Stores every node of one sentence, along with the sentence text they index into.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TreeArena {
  text: String,
  nodes: Vec<Node>,
}

impl TreeArena {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      nodes: Vec::new(),
    }
  }

  /// Builds the flat starting tree for `tokens`: an [`INC_NODE`] root over one
  /// [`TOK_NODE`] per token, with the text being the tokens joined by spaces.
  pub fn from_tokens(tokens: &[&str]) -> (Self, NodeIdx) {
    let mut arena = Self::new(tokens.join(" "));
    let mut children = Vec::with_capacity(tokens.len());
    let mut offset = 0;
    for (idx, token) in tokens.iter().enumerate() {
      let span = Span::new(offset, offset + token.len());
      children.push(arena.alloc_node(span, TOK_NODE, 0.0, None, Some(idx)));
      offset += token.len() + 1;
    }
    let root_span = Span::new(0, arena.text.len());
    let root = arena.alloc_node(root_span, INC_NODE, 0.0, None, Some(0));
    arena.node_mut(root).children = children;
    (arena, root)
  }

  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn alloc(&mut self, node: Node) -> NodeIdx {
    let idx = NodeIdx(self.nodes.len() as u32);
    self.nodes.push(node);
    idx
  }

  /// Allocates a childless node. `head: None` makes the node its own head.
  pub fn alloc_node(
    &mut self,
    span: Span,
    kind: impl Into<String>,
    prob: f64,
    head: Option<NodeIdx>,
    head_index: Option<usize>,
  ) -> NodeIdx {
    let idx = NodeIdx(self.nodes.len() as u32);
    let head_index = match head {
      Some(h) => self.node(h).head_index,
      None => head_index,
    };
    self.alloc(Node {
      span,
      kind: kind.into(),
      label: None,
      children: Vec::new(),
      head: head.unwrap_or(idx),
      head_index,
      prob,
      prev_punct: PunctSet::new(),
      next_punct: PunctSet::new(),
      is_chunk: false,
      parent: None,
    })
  }

  pub fn node(&self, idx: NodeIdx) -> &Node {
    &self.nodes[idx.0 as usize]
  }

  pub fn node_mut(&mut self, idx: NodeIdx) -> &mut Node {
    &mut self.nodes[idx.0 as usize]
  }

  pub fn span(&self, idx: NodeIdx) -> Span {
    self.node(idx).span
  }

  pub fn kind(&self, idx: NodeIdx) -> &str {
    &self.node(idx).kind
  }

  pub fn children(&self, idx: NodeIdx) -> &[NodeIdx] {
    &self.node(idx).children
  }

  pub fn parent(&self, idx: NodeIdx) -> Option<NodeIdx> {
    self.node(idx).parent
  }

  pub fn prob(&self, idx: NodeIdx) -> f64 {
    self.node(idx).prob
  }

  pub fn covered_text(&self, idx: NodeIdx) -> &str {
    self.span(idx).covered_text(&self.text)
  }

  /// Covered text of the node's lexical head
  pub fn head_word(&self, idx: NodeIdx) -> &str {
    self.covered_text(self.node(idx).head)
  }

  /// A part-of-speech tag is a node with a single token child
  pub fn is_pos_tag(&self, idx: NodeIdx) -> bool {
    let children = self.children(idx);
    children.len() == 1 && self.kind(children[0]) == TOK_NODE
  }

  /// A flat constituent only dominates part-of-speech tags
  pub fn is_flat(&self, idx: NodeIdx) -> bool {
    self.children(idx).iter().all(|&c| self.is_pos_tag(c))
  }

  /// A hypothesis is complete once its root has been reduced to a single child
  pub fn is_complete(&self, idx: NodeIdx) -> bool {
    self.children(idx).len() == 1
  }

  /// All part-of-speech tag nodes under `root`, left to right
  pub fn tag_nodes(&self, root: NodeIdx) -> Vec<NodeIdx> {
    let mut tags = Vec::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
      if self.is_pos_tag(idx) {
        tags.push(idx);
      } else {
        stack.extend(self.children(idx).iter().rev());
      }
    }
    tags
  }
}
