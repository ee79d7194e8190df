use std::collections::{HashSet, VecDeque};

use tracing::warn;

use super::node::{NodeIdx, TreeArena, TreeError};
use crate::head_rules::HeadRules;
use crate::span::Span;

impl TreeArena {
  /// Inserts `constituent` at the position in `target`'s subtree whose span contains it.
  ///
  /// Existing children covered by the constituent are moved inside it, so this both
  /// attaches leaves and wraps runs of existing children. Every node on the path down
  /// is mutated in place: callers holding shared hypotheses must clone that path first.
  pub fn insert(&mut self, target: NodeIdx, constituent: NodeIdx) -> Result<(), TreeError> {
    let ic = self.span(constituent);
    if !self.span(target).contains(&ic) {
      return Err(TreeError::InvalidInsertion {
        target: self.span(target),
        constituent: ic,
      });
    }

    let mut current = target;
    'descend: loop {
      let mut pos = 0;
      while pos < self.children(current).len() {
        let child = self.children(current)[pos];
        let sp = self.span(child);
        if sp.start >= ic.end {
          break;
        } else if ic.contains(&sp) {
          // wrap: the child moves under the new constituent, pos now names its old sibling
          self.node_mut(current).children.remove(pos);
          self.node_mut(constituent).children.push(child);
        } else if sp.contains(&ic) {
          current = child;
          continue 'descend;
        } else {
          pos += 1;
        }
      }
      self.node_mut(current).children.insert(pos, constituent);
      return Ok(());
    }
  }

  /// Copies a node. The children list is copied but the children themselves are
  /// shared with the original.
  pub fn clone_shallow(&mut self, idx: NodeIdx) -> NodeIdx {
    let new_idx = NodeIdx(self.len() as u32);
    let mut node = self.node(idx).clone();
    node.parent = None;
    if node.head == idx {
      node.head = new_idx;
    }
    self.alloc(node)
  }

  /// Shallow clone that carries a new probability. Successor hypotheses are built
  /// through this so their score is final before anything ranks them.
  pub fn clone_with_prob(&mut self, idx: NodeIdx, prob: f64) -> NodeIdx {
    let new_idx = self.clone_shallow(idx);
    self.node_mut(new_idx).prob = prob;
    new_idx
  }

  /// Replaces the child at `index` with an annotated copy of it, leaving the
  /// original (and every other hypothesis sharing it) untouched.
  pub fn relabel_child(&mut self, parent: NodeIdx, index: usize, label: &str) -> NodeIdx {
    let child = self.children(parent)[index];
    let copy = self.clone_shallow(child);
    self.node_mut(copy).label = Some(label.to_string());
    self.node_mut(parent).children[index] = copy;
    copy
  }

  /// Clones the right-frontier spine from `root` down to `target`, sharing every
  /// other subtree. Returns the copy of `root`. For attachment strategies that edit
  /// below the root; [`BuildCheckStrategy`](crate::BuildCheckStrategy) only works at
  /// the root level and never needs it.
  pub fn clone_along_frontier(
    &mut self,
    root: NodeIdx,
    target: NodeIdx,
  ) -> Result<NodeIdx, TreeError> {
    let mut path = vec![root];
    let mut current = root;
    while current != target {
      match self.children(current).last() {
        Some(&last) => {
          path.push(last);
          current = last;
        }
        None => return Err(TreeError::NotOnFrontier(target)),
      }
    }

    let mut copy = self.clone_shallow(target);
    path.pop();
    for &ancestor in path.iter().rev() {
      let ancestor_copy = self.clone_shallow(ancestor);
      if let Some(last) = self.node_mut(ancestor_copy).children.last_mut() {
        *last = copy;
      }
      copy = ancestor_copy;
    }
    Ok(copy)
  }

  /// Merges `left` and `right` under a new node of `left`'s type. Punctuation that
  /// preceded `right` becomes explicit children between the two.
  fn adjoin_pair(&mut self, left: NodeIdx, right: NodeIdx, rules: &dyn HeadRules) -> NodeIdx {
    let kind = self.kind(left).to_string();
    let head = rules.head_of(self, &[left, right], &kind);
    let span = Span::new(self.span(left).start, self.span(right).end);
    let adjoined = self.alloc_node(span, kind, 0.0, Some(head), None);

    let mut children = vec![left];
    children.extend(self.node(right).prev_punct.iter());
    children.push(right);
    self.node_mut(adjoined).children = children;
    adjoined
  }

  /// Sister-adjoins `sister` to the last child of `target`. `target`'s span grows to
  /// cover the sister and its head is recomputed. Returns the new adjunction node.
  ///
  /// Used by attach-style strategies working on a frontier copy from
  /// [`clone_along_frontier`](Self::clone_along_frontier).
  pub fn adjoin(
    &mut self,
    target: NodeIdx,
    sister: NodeIdx,
    rules: &dyn HeadRules,
  ) -> Result<NodeIdx, TreeError> {
    let last = *self
      .children(target)
      .last()
      .ok_or(TreeError::NoChildren(target))?;
    let adjoined = self.adjoin_pair(last, sister, rules);
    if let Some(slot) = self.node_mut(target).children.last_mut() {
      *slot = adjoined;
    }

    let start = self.span(target).start;
    let end = self.span(sister).end;
    self.node_mut(target).span = Span::new(start, end);

    let children = self.children(target).to_vec();
    let kind = self.kind(target).to_string();
    let head = rules.head_of(self, &children, &kind);
    let head_index = self.node(head).head_index;
    let node = self.node_mut(target);
    node.head = head;
    node.head_index = head_index;
    Ok(adjoined)
  }

  /// Root-level adjunction: `node` is adjoined to the child of `root` at `index`.
  /// The root's own span and head are left alone. Like [`adjoin`](Self::adjoin), this
  /// serves attach-style strategies rather than build/check.
  pub fn adjoin_at_root(
    &mut self,
    root: NodeIdx,
    node: NodeIdx,
    rules: &dyn HeadRules,
    index: usize,
  ) -> Result<NodeIdx, TreeError> {
    let existing = *self
      .children(root)
      .get(index)
      .ok_or(TreeError::NoChildren(root))?;
    let adjoined = self.adjoin_pair(existing, node, rules);
    self.node_mut(root).children[index] = adjoined;
    Ok(adjoined)
  }

  /// Recomputes head and head index for every node under `root`, children first.
  pub fn update_heads(&mut self, root: NodeIdx, rules: &dyn HeadRules) {
    let mut stack = vec![(root, false)];
    while let Some((idx, expanded)) = stack.pop() {
      if self.children(idx).is_empty() {
        self.node_mut(idx).head = idx;
      } else if !expanded {
        stack.push((idx, true));
        stack.extend(self.children(idx).iter().map(|&c| (c, false)));
      } else {
        let children = self.children(idx).to_vec();
        let kind = self.kind(idx).to_string();
        let head = rules.head_of(self, &children, &kind);
        let head_index = self.node(head).head_index;
        let node = self.node_mut(idx);
        node.head = head;
        node.head_index = head_index;
      }
    }
  }

  /// Removes every node whose only child has the same type, splicing the child into
  /// the grandparent. The root itself is never removed.
  pub fn prune_vacuous(&mut self, root: NodeIdx) {
    let mut queue = VecDeque::from([(root, None)]);
    while let Some((idx, parent)) = queue.pop_front() {
      let children = self.children(idx).to_vec();
      if let (Some(parent), [only]) = (parent, children.as_slice()) {
        if self.kind(*only) == self.kind(idx) {
          if let Some(pos) = self.children(parent).iter().position(|&c| c == idx) {
            self.node_mut(parent).children[pos] = *only;
          }
          queue.push_back((*only, Some(parent)));
          continue;
        }
      }
      queue.extend(children.into_iter().map(|c| (c, Some(idx))));
    }
  }

  /// Points every node under `root` at its parent in this one tree. Other trees that
  /// share nodes with it will see stale parents afterwards.
  pub fn reconcile_parents(&mut self, root: NodeIdx) {
    self.node_mut(root).parent = None;
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
      let children = self.children(idx).to_vec();
      for child in children {
        self.node_mut(child).parent = Some(idx);
        stack.push(child);
      }
    }
  }

  /// Deepest node dominating both `a` and `b`, by way of the parent links.
  /// The parent of a node is its own common ancestor with itself.
  pub fn lowest_common_ancestor(&self, a: NodeIdx, b: NodeIdx) -> Option<NodeIdx> {
    if a == b {
      return self.parent(a);
    }

    let mut ancestors = HashSet::new();
    let mut current = Some(a);
    while let Some(idx) = current {
      ancestors.insert(idx);
      current = self.parent(idx);
    }

    let mut current = Some(b);
    while let Some(idx) = current {
      if ancestors.contains(&idx) {
        return Some(idx);
      }
      current = self.parent(idx);
    }
    None
  }

  /// Inserts a `tag` node for each name, given as a token-index span over `tokens`
  /// (the sentence's tag nodes). A name is only bracketed where that doesn't cross
  /// existing brackets; an NP whose first child ends inside the name gets the name
  /// over the whole NP instead. Needs reconciled parents.
  pub fn add_names(
    &mut self,
    tag: &str,
    names: &[Span],
    tokens: &[NodeIdx],
  ) -> Result<(), TreeError> {
    for name in names {
      if name.is_empty() || name.end > tokens.len() {
        warn!(%name, tokens = tokens.len(), "name span out of range, skipping");
        continue;
      }
      let start_token = tokens[name.start];
      let end_token = tokens[name.end - 1];
      let Some(common) = self.lowest_common_ancestor(start_token, end_token) else {
        continue;
      };

      let name_span = Span::new(self.span(start_token).start, self.span(end_token).end);
      let head_index = self.node(end_token).head_index;
      if name_span == self.span(common) {
        let node = self.alloc_node(name_span, tag, 0.0, None, head_index);
        self.insert(common, node)?;
        continue;
      }

      let kids = self.children(common).to_vec();
      let crossing = kids.iter().any(|&k| name_span.crosses(&self.span(k)));
      if !crossing {
        let node = self.alloc_node(name_span, tag, 0.0, None, head_index);
        self.insert(common, node)?;
      } else if self.kind(common) == "NP" {
        let grandkids = kids.first().map(|&k| self.children(k)).unwrap_or(&[]);
        if grandkids.len() > 1 && name_span.contains(&self.span(grandkids[grandkids.len() - 1])) {
          let span = self.span(common);
          let head_index = self.node(common).head_index;
          let node = self.alloc_node(span, tag, 0.0, None, head_index);
          self.insert(common, node)?;
        }
      }
    }
    Ok(())
  }
}
