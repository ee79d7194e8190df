use std::cmp::Ordering;

use crate::tree::NodeIdx;

/// A derivation hypothesis: the root of one partial or finished tree, and the
/// probability it was ranked with.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Hypothesis {
  pub root: NodeIdx,
  pub prob: f64,
  seq: u64,
}

impl Hypothesis {
  /// Higher probability first, then earlier insertion first
  fn rank(&self, other: &Self) -> Ordering {
    other
      .prob
      .total_cmp(&self.prob)
      .then_with(|| self.seq.cmp(&other.seq))
  }
}

/// Hypotheses kept in rank order, optionally bounded.
///
/// The probability is copied in when a hypothesis is pushed and never changes
/// afterwards, so the order can't be disturbed by later tree edits.
#[derive(Debug, Default, Clone)]
pub struct Beam {
  entries: Vec<Hypothesis>,
  capacity: Option<usize>,
  next_seq: u64,
}

impl Beam {
  pub fn new() -> Self {
    Default::default()
  }

  /// A beam that only ever holds the `capacity` best hypotheses
  pub fn bounded(capacity: usize) -> Self {
    Self {
      capacity: Some(capacity),
      ..Default::default()
    }
  }

  /// Adds a hypothesis. Returns false if it fell straight off the end of a full beam.
  pub fn push(&mut self, root: NodeIdx, prob: f64) -> bool {
    let hyp = Hypothesis {
      root,
      prob,
      seq: self.next_seq,
    };
    self.next_seq += 1;

    let pos = self
      .entries
      .partition_point(|e| e.rank(&hyp) == Ordering::Less);
    if let Some(cap) = self.capacity {
      if pos >= cap {
        return false;
      }
    }
    self.entries.insert(pos, hyp);
    if let Some(cap) = self.capacity {
      self.entries.truncate(cap);
    }
    true
  }

  /// Best hypothesis
  pub fn first(&self) -> Option<&Hypothesis> {
    self.entries.first()
  }

  /// Worst hypothesis
  pub fn last(&self) -> Option<&Hypothesis> {
    self.entries.last()
  }

  pub fn pop_first(&mut self) -> Option<Hypothesis> {
    if self.entries.is_empty() {
      None
    } else {
      Some(self.entries.remove(0))
    }
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn is_full(&self) -> bool {
    self.capacity.is_some_and(|cap| self.entries.len() >= cap)
  }

  /// Empties the beam. Insertion order restarts too.
  pub fn clear(&mut self) {
    self.entries.clear();
    self.next_seq = 0;
  }

  pub fn iter(&self) -> impl Iterator<Item = &Hypothesis> {
    self.entries.iter()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn roots(beam: &Beam) -> Vec<u32> {
    beam.iter().map(|h| h.root.0).collect()
  }

  #[test]
  fn test_orders_by_prob() {
    let mut beam = Beam::new();
    beam.push(NodeIdx(0), -2.0);
    beam.push(NodeIdx(1), -0.5);
    beam.push(NodeIdx(2), -1.0);
    assert_eq!(roots(&beam), vec![1, 2, 0]);
    assert_eq!(beam.first().unwrap().prob, -0.5);
    assert_eq!(beam.last().unwrap().prob, -2.0);
  }

  #[test]
  fn test_ties_are_fifo() {
    let mut beam = Beam::new();
    beam.push(NodeIdx(5), -1.0);
    beam.push(NodeIdx(3), -1.0);
    beam.push(NodeIdx(9), 0.0);
    beam.push(NodeIdx(1), -1.0);
    assert_eq!(roots(&beam), vec![9, 5, 3, 1]);
  }

  #[test]
  fn test_bounded_drops_worst() {
    let mut beam = Beam::bounded(2);
    assert!(beam.push(NodeIdx(0), -3.0));
    assert!(beam.push(NodeIdx(1), -1.0));
    assert!(beam.is_full());
    // ties with the worst entry lose to it
    assert!(!beam.push(NodeIdx(2), -3.0));
    assert!(beam.push(NodeIdx(3), -2.0));
    assert_eq!(roots(&beam), vec![1, 3]);
  }

  #[test]
  fn test_pop_and_clear() {
    let mut beam = Beam::new();
    beam.push(NodeIdx(0), -1.0);
    beam.push(NodeIdx(1), f64::NEG_INFINITY);
    assert_eq!(beam.pop_first().map(|h| h.root), Some(NodeIdx(0)));
    assert_eq!(beam.pop_first().map(|h| h.root), Some(NodeIdx(1)));
    assert_eq!(beam.pop_first(), None);

    beam.push(NodeIdx(2), -1.0);
    beam.clear();
    assert!(beam.is_empty());
  }
}
