use std::borrow::Cow;
use std::collections::HashSet;

use crate::tree::{NodeIdx, TreeArena};

fn is_punct(arena: &TreeArena, idx: NodeIdx, punct_tags: &HashSet<String>) -> bool {
  punct_tags.contains(arena.kind(idx))
}

/// Removes punctuation from a run of sibling chunks.
///
/// Every removed node is recorded in the `next_punct` set of the closest non-punctuation
/// chunk before it and the `prev_punct` set of the closest one after it, where those
/// exist. When nothing is punctuation the input slice itself is handed back.
pub fn collapse_punctuation<'a>(
  arena: &mut TreeArena,
  chunks: &'a [NodeIdx],
  punct_tags: &HashSet<String>,
) -> Cow<'a, [NodeIdx]> {
  let mut collapsed = Vec::with_capacity(chunks.len());
  let mut last_non_punct: Option<NodeIdx> = None;

  for (ci, &chunk) in chunks.iter().enumerate() {
    if !is_punct(arena, chunk, punct_tags) {
      collapsed.push(chunk);
      last_non_punct = Some(chunk);
      continue;
    }

    let start = arena.span(chunk).start;
    if let Some(prev) = last_non_punct {
      arena.node_mut(prev).next_punct.insert(start, chunk);
    }
    let next = chunks[ci + 1..]
      .iter()
      .copied()
      .find(|&c| !is_punct(arena, c, punct_tags));
    if let Some(next) = next {
      arena.node_mut(next).prev_punct.insert(start, chunk);
    }
  }

  if collapsed.len() == chunks.len() {
    Cow::Borrowed(chunks)
  } else {
    Cow::Owned(collapsed)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::span::Span;

  fn punct() -> HashSet<String> {
    [".", ",", "``", "''", ":"].iter().map(|s| s.to_string()).collect()
  }

  /// One childless node per (tag, word), laid out over the words joined by spaces
  fn nodes(pairs: &[(&str, &str)]) -> (TreeArena, Vec<NodeIdx>) {
    let words = pairs.iter().map(|(_, w)| *w).collect::<Vec<_>>();
    let mut arena = TreeArena::new(words.join(" "));
    let mut offset = 0;
    let mut out = Vec::new();
    for (tag, word) in pairs {
      let span = Span::new(offset, offset + word.len());
      out.push(arena.alloc_node(span, *tag, 0.0, None, None));
      offset += word.len() + 1;
    }
    (arena, out)
  }

  #[test]
  fn test_identity_without_punctuation() {
    let (mut arena, chunks) = nodes(&[("NP", "Max"), ("VP", "ran")]);
    let collapsed = collapse_punctuation(&mut arena, &chunks, &punct());
    match collapsed {
      Cow::Borrowed(slice) => assert!(std::ptr::eq(slice, chunks.as_slice())),
      Cow::Owned(_) => panic!("expected the input slice back"),
    }
    assert!(arena.node(chunks[0]).next_punct.is_empty());
  }

  #[test]
  fn test_run_between_neighbours() {
    let (mut arena, chunks) = nodes(&[
      ("NP", "Max"),
      (",", ","),
      ("''", "''"),
      ("VP", "ran"),
      (".", "."),
    ]);
    let collapsed = collapse_punctuation(&mut arena, &chunks, &punct()).into_owned();
    assert_eq!(collapsed, vec![chunks[0], chunks[3]]);

    let np = arena.node(chunks[0]);
    assert_eq!(np.next_punct.iter().collect::<Vec<_>>(), vec![chunks[1], chunks[2]]);
    assert!(np.prev_punct.is_empty());

    let vp = arena.node(chunks[3]);
    assert_eq!(vp.prev_punct.iter().collect::<Vec<_>>(), vec![chunks[1], chunks[2]]);
    // trailing period has no right neighbour, so only the VP hears about it
    assert_eq!(vp.next_punct.iter().collect::<Vec<_>>(), vec![chunks[4]]);
  }

  #[test]
  fn test_leading_punctuation() {
    let (mut arena, chunks) = nodes(&[("``", "``"), ("NP", "Max"), ("VP", "ran")]);
    let collapsed = collapse_punctuation(&mut arena, &chunks, &punct());
    assert_eq!(collapsed.as_ref(), &[chunks[1], chunks[2]]);
    assert!(arena.node(chunks[1]).prev_punct.contains(chunks[0]));
    assert!(arena.node(chunks[2]).prev_punct.is_empty());
  }

  #[test]
  fn test_every_removed_node_lands_somewhere() {
    let (mut arena, chunks) = nodes(&[
      (".", "."),
      ("NP", "a"),
      (":", ":"),
      ("NP", "b"),
      (",", ","),
      (",", ","),
    ]);
    let collapsed = collapse_punctuation(&mut arena, &chunks, &punct()).into_owned();
    assert_eq!(collapsed.len(), 2);

    for &p in chunks.iter().filter(|&&c| !collapsed.contains(&c)) {
      let holders = collapsed
        .iter()
        .filter(|&&c| {
          arena.node(c).prev_punct.contains(p) || arena.node(c).next_punct.contains(p)
        })
        .count();
      assert!(holders >= 1, "{} was dropped", p);
    }
  }

  #[test]
  fn test_all_punctuation() {
    let (mut arena, chunks) = nodes(&[(".", "."), (".", ".")]);
    let collapsed = collapse_punctuation(&mut arena, &chunks, &punct());
    assert!(collapsed.is_empty());
  }
}
