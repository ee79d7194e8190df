#[macro_use]
extern crate lazy_static;

#[macro_use]
pub mod utils;

pub mod beam;
pub mod dictionary;
pub mod head_rules;
pub mod parser;
pub mod punctuation;
pub mod span;
pub mod tree;

pub use crate::beam::{Beam, Hypothesis};
pub use crate::dictionary::{NGramDictionary, NGramModel, build_dictionary, read_treebank};
pub use crate::head_rules::{HeadRules, TableHeadRules};
pub use crate::parser::{
  AdvanceStrategy, BottomUpParser, BuildCheckStrategy, BuildModel, CheckModel, ParserConfig,
  Parses, Sequence, SequenceScorer, SetTopLabel, TopLabeler,
};
pub use crate::punctuation::collapse_punctuation;
pub use crate::span::Span;
pub use crate::tree::{NodeIdx, Tree, TreeArena, TreeError, TreebankConfig, parse_tree_text};
pub use crate::utils::Err;

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;

  struct Fixed(Vec<Sequence>);

  impl SequenceScorer for Fixed {
    fn top_k_sequences(&self, _: &[String], _: Option<&[String]>, _: Option<f64>) -> Vec<Sequence> {
      self.0.clone()
    }
  }

  /// The first child opens an S and everything after continues it
  struct OneClause;

  impl BuildModel for OneClause {
    fn eval(&self, arena: &TreeArena, children: &[NodeIdx], index: usize) -> Vec<(String, f64)> {
      let outcome = if arena.kind(children[index]) == "S" {
        "S-TOP"
      } else if index == 0 {
        "S-S"
      } else {
        "C-S"
      };
      vec![(outcome.to_string(), 1.0)]
    }
  }

  impl CheckModel for OneClause {
    fn complete_prob(
      &self,
      _: &TreeArena,
      children: &[NodeIdx],
      _: &str,
      _: usize,
      index: usize,
    ) -> f64 {
      if index + 1 == children.len() { 0.9 } else { 0.05 }
    }
  }

  #[test]
  fn test_parse_then_mine() {
    let rules: Rc<dyn HeadRules> = Rc::new(TableHeadRules::english());
    let strategy = Rc::new(BuildCheckStrategy::new(OneClause, OneClause, rules.clone()));
    let mut parser = BottomUpParser::new(
      Fixed(vec![Sequence::new(
        ["DT", "NN", "VBD", "NNS", ","],
        vec![1.0; 5],
      )]),
      Fixed(vec![Sequence::new(
        ["S-NP", "C-NP", "S-VP", "S-NP", "O"],
        vec![1.0; 5],
      )]),
      strategy.clone(),
      rules.clone(),
    )
    .with_top_labeler(strategy)
    .with_config(ParserConfig::default().with_beam_size(4));

    let tree = parser.parse_one(&["the", "cat", "ate", "mice", ","]);
    let text = tree.to_bracketed_string();
    assert_eq!(
      text,
      "(TOP (S (NP (DT the) (NN cat)) (VP (VBD ate)) (NP (NNS mice)) (, ,)))"
    );
    // two shifts, then the reduce and the top each checked complete
    assert!((tree.prob() - 2.0 * 0.95f64.ln() - 2.0 * 0.9f64.ln()).abs() < 1e-9);

    let gold = parse_tree_text(&text, &TreebankConfig::default(), None);
    assert_eq!(gold.to_bracketed_string(), text);

    let dict = build_dictionary([gold], rules.as_ref(), 1);
    assert!(dict.contains(&["cat", "ate", "mice"]));
    assert!(dict.contains(&[","]));
  }
}
