//! # Discourse Relations
//!
//! The relation data model the feature functions consume, plus the reader for
//! CoNLL shallow-discourse data directories.

pub mod reader;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::tree::ParseTree;

pub use reader::{load_relations, PARSES_FILE, RELATIONS_FILE};

/// A token of an argument span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    /// Surface form.
    pub text: String,
    /// Part-of-speech tag.
    pub pos: String,
    /// Sentence index within the document.
    pub sentence_index: usize,
    /// Token index within the sentence.
    pub sentence_token_index: usize,
    /// Token index within the document.
    pub doc_token_index: usize,
}

/// Which argument of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgIndex {
    Arg1,
    Arg2,
}

/// Parse of the sentence an argument starts in, with the argument's
/// in-sentence token indices.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgTree {
    pub tree: Arc<ParseTree>,
    pub token_indices: Vec<usize>,
}

impl ArgTree {
    /// An argument with no parse available.
    pub fn empty() -> Self {
        Self {
            tree: Arc::new(ParseTree::empty()),
            token_indices: Vec::new(),
        }
    }
}

/// A discourse relation instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub doc_id: String,
    pub relation_id: u64,
    /// Explicit, Implicit, AltLex, EntRel or NoRel.
    pub relation_type: String,
    pub senses: Vec<String>,
    pub connective: Vec<Word>,
    pub arg1: Vec<Word>,
    pub arg2: Vec<Word>,
    pub arg1_tree: ArgTree,
    pub arg2_tree: ArgTree,
}

impl Relation {
    /// Words of one argument.
    pub fn arg_words(&self, arg: ArgIndex) -> &[Word] {
        match arg {
            ArgIndex::Arg1 => &self.arg1,
            ArgIndex::Arg2 => &self.arg2,
        }
    }

    /// Surface tokens of one argument.
    pub fn arg_tokens(&self, arg: ArgIndex) -> Vec<&str> {
        self.arg_words(arg).iter().map(|w| w.text.as_str()).collect()
    }

    /// Parse tree and token indices of one argument.
    pub fn arg_tree(&self, arg: ArgIndex) -> &ArgTree {
        match arg {
            ArgIndex::Arg1 => &self.arg1_tree,
            ArgIndex::Arg2 => &self.arg2_tree,
        }
    }

    /// Distinct sentence indices an argument touches.
    pub fn arg_sentences(&self, arg: ArgIndex) -> BTreeSet<usize> {
        self.arg_words(arg)
            .iter()
            .map(|w| w.sentence_index)
            .collect()
    }

    /// The first listed sense, if any.
    pub fn primary_sense(&self) -> Option<&str> {
        self.senses.first().map(String::as_str)
    }
}
