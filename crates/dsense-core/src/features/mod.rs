//! # Feature Functions
//!
//! Each feature function maps a [`Relation`] to a [`FeatureVector`] of string
//! tokens. Most are stateless; the Brown-cluster and lexicon featurizers wrap a
//! lookup table that is built once and shared read-only between calls.
//!
//! Colons are the column delimiter of the feature file format, so every token
//! pushed into a [`FeatureVector`] has `:` rewritten to `COLON`.

pub mod brown;
pub mod lexical;
pub mod lexicon;
pub mod syntactic;

use std::fmt;

use crate::relation::Relation;

pub use brown::{BrownClusterFeaturizer, BrownClusters};
pub use lexical::{BagOfWords, First3, FirstLastFirst3, WordPairs};
pub use lexicon::{Lexicon, LexiconFeaturizer, LexiconKind};
pub use syntactic::{AverageVpLength, IsArg1MultipleSentences, Modality, ProductionRules};

/// Replacement for the reserved column delimiter.
pub const COLON_ESCAPE: &str = "COLON";

/// Replace every literal colon with [`COLON_ESCAPE`].
pub fn escape_colons(token: &str) -> String {
    token.replace(':', COLON_ESCAPE)
}

/// Ordered, non-deduplicated feature tokens for one relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureVector {
    tokens: Vec<String>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token, escaping colons.
    pub fn push(&mut self, token: impl AsRef<str>) {
        self.tokens.push(escape_colons(token.as_ref()));
    }

    /// Append every token of another vector.
    pub fn extend_from(&mut self, other: FeatureVector) {
        self.tokens.extend(other.tokens);
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_inner(self) -> Vec<String> {
        self.tokens
    }
}

impl<S: AsRef<str>> FromIterator<S> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut fv = FeatureVector::new();
        for token in iter {
            fv.push(token);
        }
        fv
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// A pure mapping from a relation to feature tokens.
pub trait FeatureFunction: Send + Sync {
    /// Stable identifier used in experiment definitions and logs.
    fn name(&self) -> &str;

    fn extract(&self, relation: &Relation) -> FeatureVector;
}

/// Run every feature function and concatenate their outputs in order.
pub fn extract_all(functions: &[Box<dyn FeatureFunction>], relation: &Relation) -> FeatureVector {
    let mut out = FeatureVector::new();
    for function in functions {
        out.extend_from(function.extract(relation));
    }
    out
}
