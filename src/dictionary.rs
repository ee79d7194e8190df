//! N-gram dictionaries mined from a treebank.
//!
//! [`build_dictionary`] replays the reductions the parser would make over each gold
//! tree and counts the head words around every one of them, along with the words and
//! initial chunk heads of the sentence. The result feeds feature generation.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, BufRead, Write};

use tracing::{debug, warn};

use crate::head_rules::HeadRules;
use crate::punctuation::collapse_punctuation;
use crate::tree::{NodeIdx, TOP_NODE, Tree, TreeArena, TreebankConfig, parse_tree_text};
use crate::utils::Err;

/// Counts of every n-gram seen so far
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NGramModel {
  counts: BTreeMap<Vec<String>, usize>,
}

impl NGramModel {
  pub fn new() -> Self {
    Default::default()
  }

  /// Counts each n-gram of `tokens` with `min_len <= n <= max_len`
  pub fn add<S: AsRef<str>>(&mut self, tokens: &[S], min_len: usize, max_len: usize) {
    for len in min_len.max(1)..=max_len {
      for window in tokens.windows(len) {
        let key = window.iter().map(|t| t.as_ref().to_string()).collect();
        *self.counts.entry(key).or_default() += 1;
      }
    }
  }

  pub fn count(&self, ngram: &[&str]) -> usize {
    let key = ngram.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    self.counts.get(&key).copied().unwrap_or(0)
  }

  /// Forgets every n-gram seen fewer than `min_count` times
  pub fn cutoff(&mut self, min_count: usize) {
    self.counts.retain(|_, count| *count >= min_count);
  }

  pub fn len(&self) -> usize {
    self.counts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }

  pub fn into_dictionary(self) -> NGramDictionary {
    NGramDictionary {
      entries: self.counts,
    }
  }
}

/// Read-only n-gram lookup, case sensitive
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NGramDictionary {
  entries: BTreeMap<Vec<String>, usize>,
}

impl NGramDictionary {
  pub fn contains(&self, ngram: &[&str]) -> bool {
    self.count(ngram).is_some()
  }

  pub fn count(&self, ngram: &[&str]) -> Option<usize> {
    let key = ngram.iter().map(|t| t.to_string()).collect::<Vec<_>>();
    self.entries.get(&key).copied()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&[String], usize)> {
    self.entries.iter().map(|(k, &v)| (k.as_slice(), v))
  }

  /// Writes one `count<TAB>token token...` line per entry
  pub fn write_to<W: Write>(&self, mut w: W) -> io::Result<()> {
    for (ngram, count) in self.iter() {
      writeln!(w, "{}\t{}", count, ngram.join(" "))?;
    }
    Ok(())
  }

  /// Reads the format written by [`NGramDictionary::write_to`]. Blank lines are skipped.
  pub fn read_from<R: BufRead>(r: R) -> Result<Self, Err> {
    let mut entries = BTreeMap::new();
    for (lineno, line) in r.lines().enumerate() {
      let line = line?;
      if line.trim().is_empty() {
        continue;
      }
      let (count, ngram) = line
        .split_once('\t')
        .ok_or_else(|| format!("line {}: expected count<TAB>ngram", lineno + 1))?;
      let count = count
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("line {}: bad count {:?}: {}", lineno + 1, count, e))?;
      let ngram = ngram
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>();
      if ngram.is_empty() {
        return Err(format!("line {}: empty ngram", lineno + 1).into());
      }
      entries.insert(ngram, count);
    }
    Ok(Self { entries })
  }
}

/// Reads one bracketed tree per non-blank line
pub fn read_treebank(text: &str, config: &TreebankConfig) -> Vec<Tree> {
  text
    .lines()
    .filter(|line| !line.trim().is_empty())
    .map(|line| parse_tree_text(line, config, None))
    .collect()
}

/// Counts the words, initial chunk heads, and head-word windows around each simulated
/// reduction of every tree, keeping n-grams seen at least `cutoff` times.
pub fn build_dictionary(
  trees: impl IntoIterator<Item = Tree>,
  rules: &dyn HeadRules,
  cutoff: usize,
) -> NGramDictionary {
  let mut model = NGramModel::new();
  let mut sentences = 0;
  for tree in trees {
    add_tree(&mut model, tree, rules);
    sentences += 1;
  }

  let seen = model.len();
  model.cutoff(cutoff);
  debug!(sentences, seen, kept = model.len(), cutoff, "built dictionary");
  model.into_dictionary()
}

fn add_tree(model: &mut NGramModel, tree: Tree, rules: &dyn HeadRules) {
  let Tree { mut arena, root } = tree;
  let punct = rules.punctuation_tags();
  arena.update_heads(root, rules);

  let words = arena
    .tag_nodes(root)
    .iter()
    .map(|&t| arena.covered_text(t).to_string())
    .collect::<Vec<_>>();
  if words.is_empty() {
    warn!("tree without any tagged words, skipping");
    return;
  }
  model.add(&words, 1, 1);

  let initial = initial_chunks(&arena, root);
  let mut chunks = collapse_punctuation(&mut arena, &initial, punct).into_owned();
  model.add(&head_words(&arena, &chunks), 2, 3);

  let mut ci = 0;
  while ci < chunks.len() {
    let chunk = chunks[ci];
    let Some(parent) = arena.parent(chunk) else {
      ci += 1;
      continue;
    };
    if !is_last_child(&mut arena, chunk, parent, punct) {
      ci += 1;
      continue;
    }

    let mut start = ci;
    while start > 0 && arena.parent(chunks[start - 1]) == Some(parent) {
      start -= 1;
    }
    chunks = reduce_chunks(&mut arena, &chunks, start, ci, parent);
    if chunks.is_empty() {
      break;
    }

    let lo = start.saturating_sub(2);
    let hi = (start + 3).min(chunks.len());
    let window = head_words(&arena, &chunks[lo..hi]);
    if window.len() >= 3 {
      model.add(&window, 2, 3);
    } else if window.len() == 2 {
      model.add(&window, 2, 2);
    }
    ci = start;
  }
}

fn head_words(arena: &TreeArena, nodes: &[NodeIdx]) -> Vec<String> {
  nodes
    .iter()
    .map(|&n| arena.head_word(n).to_string())
    .collect()
}

/// The constituents the chunker would have produced: tags, or nodes over nothing but tags
fn initial_chunks(arena: &TreeArena, root: NodeIdx) -> Vec<NodeIdx> {
  let mut chunks = Vec::new();
  let mut stack = vec![root];
  while let Some(idx) = stack.pop() {
    if arena.is_pos_tag(idx) || arena.is_flat(idx) {
      chunks.push(idx);
    } else {
      stack.extend(arena.children(idx).iter().rev());
    }
  }
  chunks
}

fn is_last_child(
  arena: &mut TreeArena,
  child: NodeIdx,
  parent: NodeIdx,
  punct: &HashSet<String>,
) -> bool {
  let kids = arena.children(parent).to_vec();
  let kids = collapse_punctuation(arena, &kids, punct);
  kids.last() == Some(&child)
}

/// Replaces `chunks[start..=end]` by their `parent`, which takes over the punctuation
/// around the run. Reducing to the top node ends the sentence, so that gives nothing.
fn reduce_chunks(
  arena: &mut TreeArena,
  chunks: &[NodeIdx],
  start: usize,
  end: usize,
  parent: NodeIdx,
) -> Vec<NodeIdx> {
  if arena.kind(parent) == TOP_NODE {
    return Vec::new();
  }

  let prev_punct = arena.node(chunks[start]).prev_punct.clone();
  let next_punct = arena.node(chunks[end]).next_punct.clone();
  let node = arena.node_mut(parent);
  node.prev_punct = prev_punct;
  node.next_punct = next_punct;

  let mut reduced = chunks[..start].to_vec();
  reduced.push(parent);
  reduced.extend_from_slice(&chunks[end + 1..]);
  reduced
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::head_rules::TableHeadRules;

  fn treebank(text: &str) -> Vec<Tree> {
    read_treebank(text, &TreebankConfig::default())
  }

  #[test]
  fn test_model_counts() {
    let mut model = NGramModel::new();
    model.add(&["a", "b", "c"], 2, 3);
    model.add(&["a", "b"], 1, 2);
    assert_eq!(model.count(&["a", "b"]), 2);
    assert_eq!(model.count(&["b", "c"]), 1);
    assert_eq!(model.count(&["a", "b", "c"]), 1);
    assert_eq!(model.count(&["a"]), 1);
    assert_eq!(model.count(&["c"]), 0);
    assert_eq!(model.len(), 5);

    model.cutoff(2);
    assert_eq!(model.len(), 1);
    let dict = model.into_dictionary();
    assert!(dict.contains(&["a", "b"]));
    assert!(!dict.contains(&["A", "b"]));
  }

  #[test]
  fn test_dictionary_text_format() {
    let mut model = NGramModel::new();
    model.add(&["Max", "saw", "it"], 1, 2);
    let dict = model.into_dictionary();

    let mut out = Vec::new();
    dict.write_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.lines().any(|l| l == "1\tMax saw"));

    let read = NGramDictionary::read_from(text.as_bytes()).unwrap();
    assert_eq!(read, dict);
  }

  #[test]
  fn test_dictionary_read_errors() {
    assert!(NGramDictionary::read_from("3 no tab".as_bytes()).is_err());
    assert!(NGramDictionary::read_from("x\ta b".as_bytes()).is_err());
    assert!(NGramDictionary::read_from("2\t  ".as_bytes()).is_err());
    let dict = NGramDictionary::read_from("\n2\ta b\n\n".as_bytes()).unwrap();
    assert_eq!(dict.count(&["a", "b"]), Some(2));
  }

  #[test]
  fn test_read_treebank() {
    let trees = treebank("(TOP (NP (NN a)))\n\n  \n(TOP (NP (NN b)))\n");
    assert_eq!(trees.len(), 2);
    assert_eq!(trees[1].arena.text(), "b");
  }

  #[test]
  fn test_initial_chunks() {
    let mut trees = treebank("(TOP (S (NP (NNP Max)) (VP (VBD saw) (NP (DT the) (NN dog))) (. .)))");
    let Tree { arena, root } = trees.remove(0);
    let chunks = initial_chunks(&arena, root)
      .into_iter()
      .map(|c| arena.kind(c))
      .collect::<Vec<_>>();
    assert_eq!(chunks, vec!["NP", "VBD", "NP", "."]);
  }

  #[test]
  fn test_single_sentence() {
    let rules = TableHeadRules::english();
    let trees = treebank("(TOP (S (NP (DT the) (NN dog)) (VP (VBD barked)) (. .)))");
    let dict = build_dictionary(trees, &rules, 1);

    for word in ["the", "dog", "barked", "."] {
      assert_eq!(dict.count(&[word]), Some(1), "{}", word);
    }
    // chunk heads, with the period collapsed away
    assert_eq!(dict.count(&["dog", "barked"]), Some(1));
    assert!(!dict.contains(&["barked", "."]));
    assert_eq!(dict.len(), 5);
  }

  #[test]
  fn test_reduction_windows() {
    let rules = TableHeadRules::english();
    let trees = treebank("(TOP (S (NP (NNP Max)) (VP (VBD saw) (NP (DT the) (NN dog))) (. .)))");
    let dict = build_dictionary(trees, &rules, 1);
    assert_eq!(dict.count(&["saw", "dog"]), Some(1));
    assert_eq!(dict.count(&["Max", "saw", "dog"]), Some(1));
    // once from the initial chunks, once after the VP is reduced
    assert_eq!(dict.count(&["Max", "saw"]), Some(2));

    let trees = treebank("(TOP (S (NP (NNP Max)) (VP (VBD saw) (NP (DT the) (NN dog))) (. .)))");
    let dict = build_dictionary(trees, &rules, 2);
    assert_eq!(dict.len(), 1);
    assert!(dict.contains(&["Max", "saw"]));
  }
}
