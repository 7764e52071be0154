//! Brown cluster features.
//!
//! The cluster table is loaded once and shared by every call of the bound
//! feature functions.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::{FeatureFunction, FeatureVector};
use crate::relation::{ArgIndex, Relation};

/// Cluster id returned for words missing from the table.
pub const UNKNOWN_CLUSTER: &str = "UNK";

/// Word → Brown cluster id table.
#[derive(Debug, Clone, Default)]
pub struct BrownClusters {
    word_to_cluster: HashMap<String, String>,
}

impl BrownClusters {
    /// Parse `cluster_id \t word \t frequency` lines.
    ///
    /// Lines without three tab-separated fields are skipped.
    pub fn from_text(text: &str) -> Self {
        let word_to_cluster = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split('\t');
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(cluster), Some(word), Some(_)) => {
                        Some((word.to_string(), cluster.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();
        Self { word_to_cluster }
    }

    /// Load a cluster file, degrading to an empty table on failure.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(text) => {
                let clusters = Self::from_text(&text);
                info!(path = %path.display(), words = clusters.len(), "loaded brown clusters");
                clusters
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "fail to load brown cluster data");
                Self::default()
            }
        }
    }

    /// Cluster id of a word, or [`UNKNOWN_CLUSTER`].
    pub fn cluster(&self, word: &str) -> &str {
        self.word_to_cluster
            .get(word)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_CLUSTER)
    }

    pub fn len(&self) -> usize {
        self.word_to_cluster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.word_to_cluster.is_empty()
    }
}

/// Which Brown-cluster template a featurizer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrownTemplate {
    /// Shared and argument-exclusive cluster ids.
    Words,
    /// `BP_<c1>_<c2>` over the token cross product.
    WordPairs,
}

/// A feature function bound to a shared cluster table.
#[derive(Debug, Clone)]
pub struct BrownClusterFeaturizer {
    clusters: Arc<BrownClusters>,
    template: BrownTemplate,
}

impl BrownClusterFeaturizer {
    pub fn new(clusters: Arc<BrownClusters>, template: BrownTemplate) -> Self {
        Self { clusters, template }
    }

    /// `brown_words` bound to `clusters`.
    pub fn brown_words(clusters: Arc<BrownClusters>) -> Self {
        Self::new(clusters, BrownTemplate::Words)
    }

    /// `brown_word_pairs` bound to `clusters`.
    pub fn brown_word_pairs(clusters: Arc<BrownClusters>) -> Self {
        Self::new(clusters, BrownTemplate::WordPairs)
    }

    fn cluster_set<'a>(&'a self, relation: &'a Relation, arg: ArgIndex) -> BTreeSet<&'a str> {
        relation
            .arg_words(arg)
            .iter()
            .map(|w| self.clusters.cluster(&w.text))
            .collect()
    }

    fn words(&self, relation: &Relation) -> FeatureVector {
        let arg1 = self.cluster_set(relation, ArgIndex::Arg1);
        let arg2 = self.cluster_set(relation, ArgIndex::Arg2);
        let mut fv = FeatureVector::new();
        for cluster in arg1.intersection(&arg2) {
            fv.push(format!("BOTH_ARGS_BROWN={cluster}"));
        }
        for cluster in arg1.difference(&arg2) {
            fv.push(format!("ARG1_BROWN={cluster}"));
        }
        for cluster in arg2.difference(&arg1) {
            fv.push(format!("ARG2_BROWN={cluster}"));
        }
        fv
    }

    fn word_pairs(&self, relation: &Relation) -> FeatureVector {
        let mut fv = FeatureVector::new();
        for a1 in relation.arg_words(ArgIndex::Arg1) {
            let c1 = self.clusters.cluster(&a1.text);
            for a2 in relation.arg_words(ArgIndex::Arg2) {
                fv.push(format!("BP_{c1}_{}", self.clusters.cluster(&a2.text)));
            }
        }
        fv
    }
}

impl FeatureFunction for BrownClusterFeaturizer {
    fn name(&self) -> &str {
        match self.template {
            BrownTemplate::Words => "brown_words",
            BrownTemplate::WordPairs => "brown_word_pairs",
        }
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        match self.template {
            BrownTemplate::Words => self.words(relation),
            BrownTemplate::WordPairs => self.word_pairs(relation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::fixtures::hungry_bob;

    const CLUSTERS: &str = "0010\tBob\t12\n0010\tHe\t40\n110\thungry\t3\nmalformed line\n";

    fn clusters() -> Arc<BrownClusters> {
        Arc::new(BrownClusters::from_text(CLUSTERS))
    }

    #[test]
    fn test_from_text() {
        let c = clusters();
        assert_eq!(c.len(), 3);
        assert_eq!(c.cluster("Bob"), "0010");
        assert_eq!(c.cluster("burger"), UNKNOWN_CLUSTER);
    }

    #[test]
    fn test_load_missing_file_degrades() {
        let c = BrownClusters::load("/nonexistent/brown.txt");
        assert!(c.is_empty());
        assert_eq!(c.cluster("anything"), UNKNOWN_CLUSTER);
    }

    #[test]
    fn test_brown_words() {
        let fv = BrownClusterFeaturizer::brown_words(clusters()).extract(&hungry_bob());
        let tokens: Vec<&str> = fv.iter().collect();
        assert!(tokens.contains(&"BOTH_ARGS_BROWN=0010"));
        assert!(tokens.contains(&"BOTH_ARGS_BROWN=UNK"));
        assert!(tokens.contains(&"ARG1_BROWN=110"));
        assert!(!tokens.iter().any(|t| t.starts_with("ARG2_BROWN=")));
    }

    #[test]
    fn test_brown_word_pairs() {
        let f = BrownClusterFeaturizer::brown_word_pairs(clusters());
        assert_eq!(f.name(), "brown_word_pairs");
        let fv = f.extract(&hungry_bob());
        assert_eq!(fv.len(), 3 * 7);
        assert_eq!(fv.as_slice()[0], "BP_0010_0010");
        assert_eq!(fv.as_slice()[1], "BP_0010_UNK");
    }
}
