//! # Constituency Parse Trees
//!
//! A small bracketed-tree reader covering the queries the syntactic feature
//! functions need: leaves, heights, spanning subtrees and production rules.
//! Positions follow the usual treebank convention of a child-index path from
//! the root.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{DsenseError, Result};

/// Label given to an unlabeled outermost bracket, as in `( (S ...) )`.
pub const ROOT_LABEL: &str = "ROOT";

static TREE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(|\)|[^\s()]+").expect("static tree token pattern"));

/// A path of child indices from the root to a node.
pub type TreePosition = Vec<usize>;

/// A node of a constituency parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseTree {
    /// A labeled constituent.
    Node {
        label: String,
        children: Vec<ParseTree>,
    },
    /// A word.
    Leaf(String),
}

impl ParseTree {
    /// An empty tree: a bare root without children.
    pub fn empty() -> Self {
        ParseTree::Node {
            label: ROOT_LABEL.to_string(),
            children: Vec::new(),
        }
    }

    /// Parse a bracketed treebank string.
    ///
    /// Blank input and `()` give [`ParseTree::empty`].
    ///
    /// # Examples
    /// ```
    /// use dsense_core::tree::ParseTree;
    ///
    /// let tree = ParseTree::parse("( (S (NP (NNP Bob)) (VP (VBZ eats))) )").unwrap();
    /// assert_eq!(tree.leaves(), vec!["Bob", "eats"]);
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let mut stack: Vec<(Option<String>, Vec<ParseTree>)> = Vec::new();
        let mut result: Option<ParseTree> = None;
        let mut expect_label = false;

        for token in TREE_TOKEN.find_iter(input).map(|m| m.as_str()) {
            if result.is_some() {
                return Err(DsenseError::MalformedTree(format!(
                    "trailing content after tree: {token:?}"
                )));
            }
            match token {
                "(" => {
                    if expect_label {
                        if let Some(frame) = stack.last_mut() {
                            frame.0 = Some(String::new());
                        }
                    }
                    stack.push((None, Vec::new()));
                    expect_label = true;
                }
                ")" => {
                    let (label, children) = stack.pop().ok_or_else(|| {
                        DsenseError::MalformedTree("unbalanced closing bracket".into())
                    })?;
                    let label = match label {
                        Some(label) if !label.is_empty() => label,
                        _ => ROOT_LABEL.to_string(),
                    };
                    let node = ParseTree::Node { label, children };
                    match stack.last_mut() {
                        Some(parent) => parent.1.push(node),
                        None => result = Some(node),
                    }
                    expect_label = false;
                }
                word => {
                    let frame = stack.last_mut().ok_or_else(|| {
                        DsenseError::MalformedTree(format!("token {word:?} outside brackets"))
                    })?;
                    if expect_label {
                        frame.0 = Some(word.to_string());
                    } else {
                        frame.1.push(ParseTree::Leaf(word.to_string()));
                    }
                    expect_label = false;
                }
            }
        }

        if !stack.is_empty() {
            return Err(DsenseError::MalformedTree("unbalanced opening bracket".into()));
        }
        Ok(result.unwrap_or_else(ParseTree::empty))
    }

    /// The node label, or the word for a leaf.
    pub fn label(&self) -> &str {
        match self {
            ParseTree::Node { label, .. } => label,
            ParseTree::Leaf(word) => word,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ParseTree::Leaf(_))
    }

    /// Child nodes (empty for leaves).
    pub fn children(&self) -> &[ParseTree] {
        match self {
            ParseTree::Node { children, .. } => children,
            ParseTree::Leaf(_) => &[],
        }
    }

    /// All words under this node, left to right.
    pub fn leaves(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            ParseTree::Leaf(word) => out.push(word),
            ParseTree::Node { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Height with leaves counted as 1, so a preterminal has height 2.
    pub fn height(&self) -> usize {
        match self {
            ParseTree::Leaf(_) => 1,
            ParseTree::Node { children, .. } => {
                1 + children.iter().map(ParseTree::height).max().unwrap_or(0)
            }
        }
    }

    /// Follow a position path from this node.
    pub fn subtree(&self, position: &[usize]) -> Option<&ParseTree> {
        position
            .iter()
            .try_fold(self, |node, &idx| node.children().get(idx))
    }

    /// Position of the `index`-th leaf.
    pub fn leaf_position(&self, index: usize) -> Option<TreePosition> {
        let mut remaining = index;
        let mut path = Vec::new();
        if self.find_leaf(&mut remaining, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn find_leaf(&self, remaining: &mut usize, path: &mut TreePosition) -> bool {
        match self {
            ParseTree::Leaf(_) => {
                if *remaining == 0 {
                    return true;
                }
                *remaining -= 1;
                false
            }
            ParseTree::Node { children, .. } => {
                for (idx, child) in children.iter().enumerate() {
                    path.push(idx);
                    if child.find_leaf(remaining, path) {
                        return true;
                    }
                    path.pop();
                }
                false
            }
        }
    }

    /// Position of the lowest node dominating leaves `start..end`.
    ///
    /// For a single-leaf span this is the leaf itself.
    pub fn position_spanning_leaves(&self, start: usize, end: usize) -> Option<TreePosition> {
        if start >= end {
            return None;
        }
        let first = self.leaf_position(start)?;
        let last = self.leaf_position(end - 1)?;
        let shared = first
            .iter()
            .zip(last.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Some(first[..shared].to_vec())
    }

    /// Production rules of every constituent, in preorder.
    ///
    /// Phrasal rules render as `S -> NP VP`, lexical ones as `DT -> 'the'`.
    pub fn productions(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_productions(&mut out);
        out
    }

    fn collect_productions(&self, out: &mut Vec<String>) {
        let ParseTree::Node { label, children } = self else {
            return;
        };
        if children.is_empty() {
            return;
        }
        let rhs: Vec<String> = children
            .iter()
            .map(|child| match child {
                ParseTree::Node { label, .. } => label.clone(),
                ParseTree::Leaf(word) => quote_word(word),
            })
            .collect();
        out.push(format!("{label} -> {}", rhs.join(" ")));
        for child in children {
            child.collect_productions(out);
        }
    }
}

/// Quote a terminal the way Python's `repr` quotes a string: single quotes
/// unless the word holds a single quote and no double quote.
fn quote_word(word: &str) -> String {
    let quote = if word.contains('\'') && !word.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(word.len() + 2);
    out.push(quote);
    for c in word.chars() {
        if c == '\\' || c == quote {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(quote);
    out
}

impl FromStr for ParseTree {
    type Err = DsenseError;

    fn from_str(s: &str) -> Result<Self> {
        ParseTree::parse(s)
    }
}
