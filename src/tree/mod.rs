mod node;
mod ops;
mod treebank;

pub use node::{INC_NODE, Node, NodeIdx, PunctSet, TOK_NODE, TOP_NODE, TreeArena, TreeError};
pub use treebank::{
  Constituent, GapLabeler, NONE_LABEL, Tree, TreeDisplay, TreebankConfig, decode_token,
  encode_token, parse_tree_text,
};
