//! Head-finding rules.
//!
//! A [`HeadRules`] implementation decides which child of a constituent carries its
//! lexical head, and which tags count as punctuation. [`TableHeadRules`] reads the
//! classic Magerman/Collins style table:
//!
//! ```text
//! // TYPE direction TAG...;
//! VP left TO VBD VBN MD VBZ VB VBG VBP VP ADJP NN NNS NP;
//! PRT right RP;
//! ```
//!
//! For each tag in priority order, the children are scanned from the `left` or the
//! `right` and the first child of that tag wins. If no tag matches, the first (`left`)
//! or last (`right`) child is the head. Types without a rule take the last child.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use crate::tree::{NodeIdx, TreeArena};
use crate::utils::{Err, ParseResult, needed_re, optional_re, skip_whitespace};

pub trait HeadRules {
  /// Lexical head for a constituent of type `kind` over `constituents`.
  /// `constituents` must not be empty.
  fn head_of(&self, arena: &TreeArena, constituents: &[NodeIdx], kind: &str) -> NodeIdx;

  /// Tags that are treated as punctuation, and collapsed out of child lists
  fn punctuation_tags(&self) -> &HashSet<String>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
  /// Scan children from the left
  Left,
  /// Scan children from the right
  Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadRule {
  pub direction: Direction,
  pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHeadRules {
  rules: HashMap<String, HeadRule>,
  punctuation: HashSet<String>,
}

const ENGLISH_TABLE: &str = r#"
  ADJP   left  NNS QP NN $ ADVP JJ VBN VBG ADJP JJR NP JJS DT FW RBR RBS SBAR RB;
  ADVP   right RB RBR RBS FW ADVP TO CD JJR JJ IN NP JJS NN;
  CONJP  right CC RB IN;
  FRAG   right;
  INTJ   left;
  LST    right LS :;
  NAC    left  NN NNS NNP NNPS NP NAC EX $ CD QP PRP VBG JJ JJS JJR ADJP FW;
  PP     right IN TO VBG VBN RP FW;
  PRN    left;
  PRT    right RP;
  QP     left  $ IN NNS NN JJ RB DT CD NCD QP JJR JJS;
  RRC    right VP NP ADVP ADJP PP;
  S      left  TO IN VP S SBAR ADJP UCP NP;
  SBAR   left  WHNP WHPP WHADVP WHADJP IN DT S SQ SINV SBAR FRAG;
  SBARQ  left  SQ S SINV SBARQ FRAG;
  SINV   left  VBZ VBD VBP VB MD VP S SINV ADJP NP;
  SQ     left  VBZ VBD VBP VB MD VP SQ;
  UCP    right;
  VP     left  TO VBD VBN MD VBZ VB VBG VBP VP ADJP NN NNS NP;
  WHADJP left  CC WRB JJ ADJP;
  WHADVP right CC WRB;
  WHNP   left  WDT WP WP$ WHADJP WHPP WHNP;
  WHPP   right IN TO FW;
"#;

const ENGLISH_PUNCTUATION: [&str; 5] = [".", ",", "``", "''", ":"];

impl TableHeadRules {
  pub fn new(rules: HashMap<String, HeadRule>) -> Self {
    Self {
      rules,
      punctuation: HashSet::new(),
    }
  }

  /// Penn Treebank head table with the usual punctuation tags
  pub fn english() -> Self {
    let rules = parse_rules(ENGLISH_TABLE).map_or_else(|_| HashMap::new(), |(rules, _)| rules);
    Self::new(rules).with_punctuation(ENGLISH_PUNCTUATION)
  }

  pub fn with_punctuation<I, S>(mut self, tags: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.punctuation = tags.into_iter().map(Into::into).collect();
    self
  }

  pub fn rule(&self, kind: &str) -> Option<&HeadRule> {
    self.rules.get(kind)
  }

  /// Collins' noun phrase rule: the rightmost nominal, else the leftmost NP, else
  /// progressively weaker candidates from the right.
  fn noun_phrase_head(arena: &TreeArena, constituents: &[NodeIdx]) -> NodeIdx {
    let rightmost = |tags: &[&str]| {
      constituents
        .iter()
        .rev()
        .find(|&&c| tags.contains(&arena.kind(c)))
        .copied()
    };

    let chosen = rightmost(&["NN", "NNP", "NNPS", "NNS", "NX", "POS", "JJR"])
      .or_else(|| constituents.iter().find(|&&c| arena.kind(c) == "NP").copied())
      .or_else(|| rightmost(&["$", "ADJP", "PRN"]))
      .or_else(|| rightmost(&["CD"]))
      .or_else(|| rightmost(&["JJ", "JJS", "RB", "QP"]))
      .unwrap_or(constituents[constituents.len() - 1]);
    arena.node(chosen).head
  }
}

impl HeadRules for TableHeadRules {
  fn head_of(&self, arena: &TreeArena, constituents: &[NodeIdx], kind: &str) -> NodeIdx {
    if kind == "NP" || kind == "NX" {
      return Self::noun_phrase_head(arena, constituents);
    }

    let last = constituents[constituents.len() - 1];
    let Some(rule) = self.rules.get(kind) else {
      return arena.node(last).head;
    };

    for tag in rule.tags.iter() {
      let found = match rule.direction {
        Direction::Left => constituents.iter().find(|&&c| arena.kind(c) == tag),
        Direction::Right => constituents.iter().rev().find(|&&c| arena.kind(c) == tag),
      };
      if let Some(&c) = found {
        return arena.node(c).head;
      }
    }

    match rule.direction {
      Direction::Left => arena.node(constituents[0]).head,
      Direction::Right => arena.node(last).head,
    }
  }

  fn punctuation_tags(&self) -> &HashSet<String> {
    &self.punctuation
  }
}

impl FromStr for TableHeadRules {
  type Err = Err;

  /// Parses a head table. Punctuation tags start out empty; see `with_punctuation`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (rules, rest) = parse_rules(s)?;
    if !rest.is_empty() {
      return Err(format!("trailing input in head table: {}", rest).into());
    }
    if rules.is_empty() {
      Err("empty head table".into())
    } else {
      Ok(Self::new(rules))
    }
  }
}

fn parse_direction(s: &str) -> ParseResult<Direction> {
  regex_static!(DIRECTION, r"(left|right)\b");
  let (dir, s) =
    needed_re(&DIRECTION, s).map_err(|e| -> Err { format!("direction: {}", e).into() })?;
  let dir = if dir == "left" {
    Direction::Left
  } else {
    Direction::Right
  };
  Ok((dir, s))
}

/// TYPE direction TAG... ;
fn parse_rule(s: &str) -> ParseResult<(String, HeadRule)> {
  regex_static!(NAME, r"[^\s;]+");

  let (kind, s) =
    needed_re(&NAME, s).map_err(|e| -> Err { format!("rule type: {}", e).into() })?;
  let s = skip_whitespace(s);
  let (direction, s) = parse_direction(s)?;

  let mut tags = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let Some(rest) = rem.strip_prefix(';') {
      rem = rest;
      break;
    }
    match optional_re(&NAME, rem) {
      (Some(tag), rest) => {
        tags.push(tag.to_string());
        rem = rest;
      }
      (None, _) => return Err(format!("unterminated head rule for {}", kind).into()),
    }
  }

  Ok(((kind.to_string(), HeadRule { direction, tags }), rem))
}

fn parse_rules(s: &str) -> ParseResult<HashMap<String, HeadRule>> {
  let mut rules = HashMap::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if rem.is_empty() {
      return Ok((rules, rem));
    }
    let ((kind, rule), s) = parse_rule(rem)?;
    rules.insert(kind, rule);
    rem = s;
  }
}
