//! Penn Treebank style bracketed text: `(TOP (S (NP (NNP Max)) (VP (VBD ran)) (. .)))`
use std::fmt;

use tracing::warn;

use super::node::{NodeIdx, TOK_NODE, TOP_NODE, TreeArena};
use crate::span::Span;

/// Tokens that can't appear literally inside brackets, and how they're written
const BRACKET_TOKENS: [(&str, &str); 6] = [
  ("-LRB-", "("),
  ("-RRB-", ")"),
  ("-LCB-", "{"),
  ("-RCB-", "}"),
  ("-LSB-", "["),
  ("-RSB-", "]"),
];

/// Label of empty categories (traces), which never become surface tokens
pub const NONE_LABEL: &str = "-NONE-";

/// How bracket labels are read
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct TreebankConfig {
  /// Keep the first function tag: `NP-SBJ-1` reads as `NP-SBJ` instead of `NP`
  pub function_tags: bool,
}

/// A labeled span collected while reading a bracketed tree, before it becomes a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constituent {
  pub label: String,
  pub span: Span,
}

/// Receives the stack of open constituents whenever a `-NONE-` trace is read, so
/// it can relabel them (e.g. to mark which constituents contain a gap).
pub trait GapLabeler {
  fn label_gaps(&self, stack: &mut [Constituent]);
}

/// A single tree together with the arena that holds its nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
  pub arena: TreeArena,
  pub root: NodeIdx,
}

impl Tree {
  pub fn prob(&self) -> f64 {
    self.arena.prob(self.root)
  }

  pub fn to_bracketed_string(&self) -> String {
    self.arena.to_bracketed_string(self.root)
  }
}

impl fmt::Display for Tree {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.arena.display(self.root))
  }
}

pub fn decode_token(token: &str) -> String {
  BRACKET_TOKENS
    .iter()
    .fold(token.to_string(), |t, (label, literal)| t.replace(label, literal))
}

pub fn encode_token(token: &str) -> String {
  BRACKET_TOKENS
    .iter()
    .fold(token.to_string(), |t, (label, literal)| t.replace(literal, label))
}

/// Reads the label right after an open bracket. `rest` starts after the `(`.
fn read_label(rest: &str, config: &TreebankConfig) -> Option<String> {
  regex_static!(LABEL, r"^([^ =\-()]+)");
  regex_static!(FUNCTION_TAG, r"^[^ =\-()]+-([^ =\-()]+)");

  if let Some((label, _)) = BRACKET_TOKENS.iter().find(|(label, _)| rest.starts_with(label)) {
    return Some(label.to_string());
  }
  if rest.starts_with(NONE_LABEL) {
    return Some(NONE_LABEL.to_string());
  }

  let label = LABEL.captures(rest)?.get(1)?.as_str();
  if config.function_tags {
    if let Some(tag) = FUNCTION_TAG.captures(rest).and_then(|c| c.get(1)) {
      return Some(format!("{}-{}", label, tag.as_str()));
    }
  }
  Some(label.to_string())
}

/// Reads the token of a preterminal, `LABEL token)`. `rest` starts after the `(`.
fn read_token(rest: &str) -> Option<String> {
  regex_static!(TOKEN, r"^[^ ()]+ ([^ ()]+)\s*\)");
  TOKEN
    .captures(rest)
    .and_then(|c| c.get(1))
    .map(|m| decode_token(m.as_str()))
}

/// Parses one bracketed tree. The sentence text becomes the tokens joined by single
/// spaces, and the root is always a `TOP` node. Malformed input is logged and the
/// best partial tree is returned.
pub fn parse_tree_text(
  text: &str,
  config: &TreebankConfig,
  gap_labeler: Option<&dyn GapLabeler>,
) -> Tree {
  let mut sentence = String::new();
  let mut stack: Vec<Constituent> = Vec::new();
  let mut constituents: Vec<Constituent> = Vec::new();

  let close = |con: Constituent, offset: usize, constituents: &mut Vec<Constituent>| {
    // offset sits one past the space after the last token
    if con.span.start < offset {
      constituents.push(Constituent {
        label: con.label,
        span: Span::new(con.span.start, offset - 1),
      });
    }
  };

  for (idx, c) in text.char_indices() {
    let offset = sentence.len();
    match c {
      '(' => {
        let rest = &text[idx + 1..];
        let label = read_label(rest, config);
        if label.is_none() && !rest.starts_with(|c: char| c.is_whitespace() || c == '(') {
          warn!(at = idx, "bracket without a label: {}", rest);
        }
        let label = label.unwrap_or_default();
        let token = read_token(rest);

        stack.push(Constituent {
          label: label.clone(),
          span: Span::new(offset, offset),
        });

        if let Some(token) = token {
          if label == NONE_LABEL {
            if let Some(gap_labeler) = gap_labeler {
              gap_labeler.label_gaps(&mut stack);
            }
          } else {
            constituents.push(Constituent {
              label: TOK_NODE.to_string(),
              span: Span::new(offset, offset + token.len()),
            });
            sentence.push_str(&token);
            sentence.push(' ');
          }
        }
      }
      ')' => match stack.pop() {
        Some(con) => close(con, offset, &mut constituents),
        None => warn!(at = idx, "unbalanced close bracket"),
      },
      _ => {}
    }
  }

  if !stack.is_empty() {
    warn!(open = stack.len(), "unclosed brackets at end of tree");
    let offset = sentence.len();
    while let Some(con) = stack.pop() {
      close(con, offset, &mut constituents);
    }
  }

  if sentence.ends_with(' ') {
    sentence.pop();
  }
  build_tree(sentence, constituents)
}

fn build_tree(sentence: String, constituents: Vec<Constituent>) -> Tree {
  let mut arena = TreeArena::new(sentence);
  let root_span = Span::new(0, arena.text().len());
  let root = arena.alloc_node(root_span, TOP_NODE, 0.0, None, Some(0));

  let mut token_index: Option<usize> = None;
  for con in constituents {
    if con.label.is_empty() || con.label == TOP_NODE {
      continue;
    }
    if con.label == TOK_NODE {
      token_index = Some(token_index.map_or(0, |i| i + 1));
    }
    let node = arena.alloc_node(con.span, con.label, 0.0, None, token_index);
    if let Err(e) = arena.insert(root, node) {
      warn!(%e, "dropping constituent");
    }
  }

  arena.reconcile_parents(root);
  Tree { arena, root }
}

impl TreeArena {
  /// Renders `root` as bracketed text. Punctuation that only survives in a node's
  /// punctuation sets is written back at the lowest node covering it.
  pub fn to_bracketed_string(&self, root: NodeIdx) -> String {
    let mut punct = Vec::new();
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
      let node = self.node(idx);
      punct.extend(node.prev_punct.iter());
      punct.extend(node.next_punct.iter());
      stack.extend(node.children.iter());
    }
    punct.sort_by_key(|&p| (self.span(p).start, p));
    punct.dedup();

    let mut out = String::new();
    self.write_bracketed(root, &punct, &mut out);
    out
  }

  fn write_bracketed(&self, idx: NodeIdx, punct: &[NodeIdx], out: &mut String) {
    let node = self.node(idx);
    if node.kind == TOK_NODE {
      out.push_str(&encode_token(self.covered_text(idx)));
      return;
    }

    let mut items = node.children.clone();
    items.extend(punct.iter().copied().filter(|&p| {
      let span = self.span(p);
      node.span.contains(&span)
        && !node
          .children
          .iter()
          .any(|&c| c == p || self.span(c).intersects(&span))
    }));
    items.sort_by_key(|&c| self.span(c).start);

    out.push('(');
    out.push_str(&node.kind);
    out.push(' ');
    let mut cursor = node.span.start;
    for item in items {
      let span = self.span(item);
      if cursor < span.start {
        out.push_str(&encode_token(&self.text()[cursor..span.start]));
      }
      self.write_bracketed(item, punct, out);
      cursor = cursor.max(span.end);
    }
    if cursor < node.span.end {
      out.push_str(&encode_token(&self.text()[cursor..node.span.end]));
    }
    out.push(')');
  }

  /// Display a NodeIdx as bracketed text
  pub fn display(&self, idx: NodeIdx) -> TreeDisplay<'_> {
    TreeDisplay { arena: self, idx }
  }
}

/// Helper struct for displaying a tree
#[derive(Clone)]
pub struct TreeDisplay<'a> {
  pub arena: &'a TreeArena,
  pub idx: NodeIdx,
}

impl fmt::Display for TreeDisplay<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.arena.to_bracketed_string(self.idx))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::cell::Cell;

  fn parse(s: &str) -> Tree {
    parse_tree_text(s, &TreebankConfig::default(), None)
  }

  /// (kind, span) of every node, in preorder
  fn structure(tree: &Tree) -> Vec<(String, Span)> {
    let mut out = Vec::new();
    let mut stack = vec![tree.root];
    while let Some(idx) = stack.pop() {
      out.push((tree.arena.kind(idx).to_string(), tree.arena.span(idx)));
      stack.extend(tree.arena.children(idx).iter().rev());
    }
    out
  }

  #[test]
  fn test_parse_simple() {
    let tree = parse("(TOP (S (NP (NNP Max)) (VP (VBD ran)) (. .)))");
    assert_eq!(tree.arena.text(), "Max ran .");
    assert_eq!(tree.arena.kind(tree.root), TOP_NODE);

    let s = tree.arena.children(tree.root)[0];
    assert_eq!(tree.arena.kind(s), "S");
    assert_eq!(tree.arena.span(s), Span::new(0, 9));
    assert_eq!(tree.arena.parent(s), Some(tree.root));

    let tags = tree.arena.tag_nodes(tree.root);
    let kinds = tags.iter().map(|&t| tree.arena.kind(t)).collect::<Vec<_>>();
    assert_eq!(kinds, vec!["NNP", "VBD", "."]);
    assert_eq!(tree.arena.node(tags[2]).head_index, Some(2));
  }

  #[test]
  fn test_unlabeled_outer_bracket() {
    let tree = parse("( (S (NP (PRP It)) (VP (VBZ works))) )");
    assert_eq!(
      tree.to_bracketed_string(),
      "(TOP (S (NP (PRP It)) (VP (VBZ works))))"
    );
  }

  #[test]
  fn test_round_trip() {
    let sources = [
      "(TOP (S (NP (NNP Max)) (VP (VBD ran)) (. .)))",
      "(TOP (S (NP (DT The) (NN dog)) (VP (VBD barked) (PP (IN at) (NP (PRP me)))) (. !)))",
      "(TOP (NP (-LRB- -LRB-) (NN aside) (-RRB- -RRB-)))",
    ];
    for src in sources {
      let tree = parse(src);
      let printed = tree.to_bracketed_string();
      assert_eq!(printed, src);
      let again = parse(&printed);
      assert_eq!(again.arena.text(), tree.arena.text());
      assert_eq!(structure(&again), structure(&tree));
    }
  }

  #[test]
  fn test_bracket_tokens() {
    let tree = parse("(TOP (NP (-LCB- -LCB-) (NN x) (-RCB- -RCB-) (-LSB- -LSB-)))");
    assert_eq!(tree.arena.text(), "{ x } [");
    assert_eq!(encode_token("f(x)"), "f-LRB-x-RRB-");
    assert_eq!(decode_token("-LSB-a-RSB-"), "[a]");
  }

  #[test]
  fn test_function_tags() {
    let src = "(TOP (S (NP-SBJ=2 (PRP he)) (VP (VBD left))))";
    let plain = parse(src);
    let s = plain.arena.children(plain.root)[0];
    assert_eq!(plain.arena.kind(plain.arena.children(s)[0]), "NP");

    let tagged = parse_tree_text(src, &TreebankConfig { function_tags: true }, None);
    let s = tagged.arena.children(tagged.root)[0];
    assert_eq!(tagged.arena.kind(tagged.arena.children(s)[0]), "NP-SBJ");
  }

  struct CountingLabeler(Cell<usize>);

  impl GapLabeler for CountingLabeler {
    fn label_gaps(&self, stack: &mut [Constituent]) {
      self.0.set(self.0.get() + 1);
      // mark the constituent that dominates the trace
      if stack.len() >= 2 {
        let idx = stack.len() - 2;
        stack[idx].label.push_str("-G");
      }
    }
  }

  #[test]
  fn test_traces() {
    let src = "(TOP (S (NP (-NONE- *T*-1)) (VP (VBD left))))";
    let labeler = CountingLabeler(Cell::new(0));
    let tree = parse_tree_text(src, &TreebankConfig::default(), Some(&labeler));
    assert_eq!(labeler.0.get(), 1);
    assert_eq!(tree.arena.text(), "left");
    // the gap-only NP covers no text and disappears
    assert_eq!(tree.to_bracketed_string(), "(TOP (S (VP (VBD left))))");

    let without = parse(src);
    assert_eq!(without.arena.text(), "left");
  }

  #[test]
  fn test_malformed_recovers() {
    let tree = parse("(TOP (S (NP (NNP Max)) (VP (VBD ran)");
    assert_eq!(tree.arena.text(), "Max ran");
    assert_eq!(
      tree.to_bracketed_string(),
      "(TOP (S (NP (NNP Max)) (VP (VBD ran))))"
    );

    let tree = parse("(TOP (NN x))))");
    assert_eq!(tree.to_bracketed_string(), "(TOP (NN x))");
  }

  #[test]
  fn test_side_set_punctuation_is_printed() {
    let mut tree = parse("(TOP (S (NP (NNP Max)) (VP (VBD ran)) (. .)))");
    let s = tree.arena.children(tree.root)[0];
    let kids = tree.arena.children(s).to_vec();
    let (vp, period) = (kids[1], kids[2]);
    let start = tree.arena.span(period).start;
    tree.arena.node_mut(vp).next_punct.insert(start, period);
    tree.arena.node_mut(s).children.pop();

    assert_eq!(
      tree.to_bracketed_string(),
      "(TOP (S (NP (NNP Max)) (VP (VBD ran)) (. .)))"
    );
  }
}
