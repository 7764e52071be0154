//! Token-level feature templates.

use super::{FeatureFunction, FeatureVector};
use crate::relation::{ArgIndex, Relation};

fn all_tokens(relation: &Relation) -> impl Iterator<Item = &str> {
    relation
        .arg1
        .iter()
        .chain(relation.arg2.iter())
        .map(|w| w.text.as_str())
}

/// Bag of words over both arguments: `BOW_<token>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BagOfWords;

impl FeatureFunction for BagOfWords {
    fn name(&self) -> &str {
        "bag_of_words"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        all_tokens(relation).map(|t| format!("BOW_{t}")).collect()
    }
}

/// The first three bag-of-words tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct First3;

impl FeatureFunction for First3 {
    fn name(&self) -> &str {
        "first3"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        all_tokens(relation)
            .take(3)
            .map(|t| format!("BOW_{t}"))
            .collect()
    }
}

/// Cross product of arg1 and arg2 tokens.
///
/// Bob is hungry. He wants a burger --> `WP_Bob_He`, `WP_Bob_wants`, ...
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPairs;

impl FeatureFunction for WordPairs {
    fn name(&self) -> &str {
        "word_pairs"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let arg2 = relation.arg_tokens(ArgIndex::Arg2);
        let mut fv = FeatureVector::new();
        for a1 in relation.arg_tokens(ArgIndex::Arg1) {
            for a2 in &arg2 {
                fv.push(format!("WP_{a1}_{a2}"));
            }
        }
        fv
    }
}

/// Boundary tokens of each argument.
///
/// Emits, in order: first and last of arg1, first and last of arg2,
/// `FIRST_FIRST_<f1>__<f2>`, `LAST_LAST_<l1>__<l2>`, then the first three
/// tokens of each argument joined by `_`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLastFirst3;

impl FeatureFunction for FirstLastFirst3 {
    fn name(&self) -> &str {
        "first_last_first_3"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let arg1 = relation.arg_tokens(ArgIndex::Arg1);
        let arg2 = relation.arg_tokens(ArgIndex::Arg2);
        let (Some(first1), Some(last1), Some(first2), Some(last2)) =
            (arg1.first(), arg1.last(), arg2.first(), arg2.last())
        else {
            return FeatureVector::new();
        };

        let mut fv = FeatureVector::new();
        fv.push(first1);
        fv.push(last1);
        fv.push(first2);
        fv.push(last2);
        fv.push(format!("FIRST_FIRST_{first1}__{first2}"));
        fv.push(format!("LAST_LAST_{last1}__{last2}"));
        fv.push(arg1[..arg1.len().min(3)].join("_"));
        fv.push(arg2[..arg2.len().min(3)].join("_"));
        fv
    }
}
