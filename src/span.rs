use std::fmt;

/// Half-open character offset range `[start, end)` into a sentence's text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

impl Span {
  pub fn new(start: usize, end: usize) -> Self {
    debug_assert!(start <= end, "span start {} after end {}", start, end);
    Self { start, end }
  }

  pub fn len(&self) -> usize {
    self.end - self.start
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// True if `other` lies entirely within this span. Every span contains itself.
  pub fn contains(&self, other: &Span) -> bool {
    self.start <= other.start && other.end <= self.end
  }

  pub fn contains_offset(&self, offset: usize) -> bool {
    self.start <= offset && offset < self.end
  }

  /// True if the spans share at least one offset
  pub fn intersects(&self, other: &Span) -> bool {
    self.start < other.end && other.start < self.end
  }

  /// Spans cross when they overlap but neither contains the other, i.e. they
  /// can't both be brackets of the same tree.
  pub fn crosses(&self, other: &Span) -> bool {
    self.intersects(other) && !self.contains(other) && !other.contains(self)
  }

  pub fn covered_text<'a>(&self, text: &'a str) -> &'a str {
    &text[self.start..self.end]
  }
}

impl fmt::Display for Span {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}..{}", self.start, self.end)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_containment() {
    let outer = Span::new(0, 10);
    assert!(outer.contains(&Span::new(0, 10)));
    assert!(outer.contains(&Span::new(3, 5)));
    assert!(!outer.contains(&Span::new(5, 11)));
    assert!(outer.contains_offset(9));
    assert!(!outer.contains_offset(10));
  }

  #[test]
  fn test_crossing() {
    let a = Span::new(0, 5);
    assert!(a.crosses(&Span::new(3, 8)));
    assert!(!a.crosses(&Span::new(1, 4)));
    assert!(!a.crosses(&Span::new(5, 8)));
    assert!(!a.intersects(&Span::new(5, 8)));
  }

  #[test]
  fn test_covered_text() {
    let text = "Max ran .";
    assert_eq!(Span::new(4, 7).covered_text(text), "ran");
    assert_eq!(format!("{}", Span::new(4, 7)), "4..7");
  }
}
