//! Lexicon-based features (General Inquirer, MPQA subjectivity, Levin verb
//! classes).
//!
//! Each lexicon is a JSON object mapping uppercase word forms to tag lists:
//! `(WORD) --> [tag1, tag2, ...]`.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{FeatureFunction, FeatureVector};
use crate::relation::{ArgIndex, Relation, Word};

/// Uppercase word form → tag list.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    entries: HashMap<String, Vec<String>>,
}

impl Lexicon {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let entries = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Load a lexicon file, degrading to an empty table on failure.
    pub fn load<P: AsRef<Path>>(path: P, kind: LexiconKind) -> Self {
        let path = path.as_ref();
        let loaded = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| Self::from_json(&text).map_err(|e| e.to_string()));
        match loaded {
            Ok(lexicon) => {
                info!(path = %path.display(), entries = lexicon.len(), lexicon = ?kind, "loaded lexicon");
                lexicon
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, lexicon = ?kind, "fail to load lexicon");
                Self::default()
            }
        }
    }

    /// Tags of a word, looked up by its uppercase form.
    pub fn tags(&self, word: &str) -> Option<&[String]> {
        self.entries.get(&word.to_uppercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The lexicon a featurizer reads and the template it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexiconKind {
    /// General Inquirer tags.
    Inquirer,
    /// MPQA subjectivity: `[positive|negative, strong|weak]`.
    Mpqa,
    /// Levin verb classes.
    Levin,
}

/// A feature function bound to a shared lexicon.
#[derive(Debug, Clone)]
pub struct LexiconFeaturizer {
    lexicon: Arc<Lexicon>,
    kind: LexiconKind,
}

impl LexiconFeaturizer {
    pub fn new(lexicon: Arc<Lexicon>, kind: LexiconKind) -> Self {
        Self { lexicon, kind }
    }

    /// Tags of every matched word, flattened in word order.
    fn arg_tags<'a>(&'a self, words: &'a [Word]) -> Vec<&'a str> {
        words
            .iter()
            .filter_map(|w| self.lexicon.tags(&w.text))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    fn inquirer(&self, relation: &Relation) -> FeatureVector {
        let arg1 = self.arg_tags(relation.arg_words(ArgIndex::Arg1));
        let arg2 = self.arg_tags(relation.arg_words(ArgIndex::Arg2));
        let mut fv = FeatureVector::new();
        if !arg1.is_empty() && !arg2.is_empty() {
            for t1 in &arg1 {
                for t2 in &arg2 {
                    fv.push(format!("TAGS={t1}_{t2}"));
                }
            }
        }
        for t1 in &arg1 {
            fv.push(format!("ARG1_TAG={t1}"));
        }
        for t2 in &arg2 {
            fv.push(format!("ARG2_TAG={t2}"));
        }
        fv
    }

    fn mpqa(&self, relation: &Relation) -> FeatureVector {
        let mut fv = FeatureVector::new();
        for (arg, prefix) in [(ArgIndex::Arg1, "ARG1"), (ArgIndex::Arg2, "ARG2")] {
            for word in relation.arg_words(arg) {
                if let Some(tags) = self.lexicon.tags(&word.text) {
                    fv.push(format!("{prefix}_MPQA={}", tags.join("_")));
                }
            }
        }
        fv
    }

    fn levin(&self, relation: &Relation) -> FeatureVector {
        let mut fv = FeatureVector::new();
        for (arg, prefix) in [(ArgIndex::Arg1, "ARG1"), (ArgIndex::Arg2, "ARG2")] {
            let verbs = relation
                .arg_words(arg)
                .iter()
                .filter(|w| w.pos.starts_with("VB"));
            for verb in verbs {
                for class in self.lexicon.tags(&verb.text).unwrap_or_default() {
                    fv.push(format!("{prefix}_LEVIN={class}"));
                }
            }
        }
        fv
    }
}

impl FeatureFunction for LexiconFeaturizer {
    fn name(&self) -> &str {
        match self.kind {
            LexiconKind::Inquirer => "inquirer_tag_feature",
            LexiconKind::Mpqa => "mpqa_subjectivity",
            LexiconKind::Levin => "levin_verb_classes",
        }
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        match self.kind {
            LexiconKind::Inquirer => self.inquirer(relation),
            LexiconKind::Mpqa => self.mpqa(relation),
            LexiconKind::Levin => self.levin(relation),
        }
    }
}
