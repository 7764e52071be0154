//! # Experiments
//!
//! Named combinations of feature functions, label functions and an optional
//! pruning cutoff. Lookup tables are loaded only by the experiments that
//! use them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::error::{DsenseError, Result};
use crate::feature_file::{generate_feature_files, prune_features, FEATURE_FILE_EXTENSION};
use crate::features::brown::BrownClusters;
use crate::features::{
    AverageVpLength, BagOfWords, BrownClusterFeaturizer, FeatureFunction, First3,
    FirstLastFirst3, IsArg1MultipleSentences, Lexicon, LexiconFeaturizer, LexiconKind, Modality,
    ProductionRules,
};
use crate::labels::{doc_id_relation_id, LabelFunction, NamingFunction, OriginalLabel, SenseMapping};

/// Registered experiment names.
pub const EXPERIMENT_NAMES: &[&str] = &[
    "experiment0",
    "experiment1",
    "experiment1.1",
    "experiment2",
    "experiment2.1",
    "experiment_mapping_test",
    "experiment_test",
];

/// Cutoff used by the pruned experiment variants.
pub const DEFAULT_PRUNE_CUTOFF: usize = 5;

const BROWN_CLUSTER_FILE: &str = "brown-rcv1.clean.tokenized-CoNLL03.txt-c3200-freq1.txt";

/// Locations of the lookup tables used by lexical featurizers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePaths {
    pub brown_clusters: PathBuf,
    pub inquirer: PathBuf,
    pub mpqa: PathBuf,
    pub levin: PathBuf,
}

impl Default for ResourcePaths {
    fn default() -> Self {
        let lexicons = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nlp")
            .join("lib")
            .join("lexicon");
        Self {
            brown_clusters: PathBuf::from("resources").join(BROWN_CLUSTER_FILE),
            inquirer: lexicons.join("inquirer").join("inquirer_merged.json"),
            mpqa: lexicons.join("mpqa_subj_05").join("mpqa_subj_05.json"),
            levin: lexicons.join("levin").join("levin.json"),
        }
    }
}

impl ResourcePaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_brown_clusters(mut self, path: impl Into<PathBuf>) -> Self {
        self.brown_clusters = path.into();
        self
    }

    pub fn with_inquirer(mut self, path: impl Into<PathBuf>) -> Self {
        self.inquirer = path.into();
        self
    }

    pub fn with_mpqa(mut self, path: impl Into<PathBuf>) -> Self {
        self.mpqa = path.into();
        self
    }

    pub fn with_levin(mut self, path: impl Into<PathBuf>) -> Self {
        self.levin = path.into();
        self
    }
}

/// A fully built experiment, ready to run.
pub struct Experiment {
    pub name: String,
    pub feature_fns: Vec<Box<dyn FeatureFunction>>,
    pub label_fns: Vec<Box<dyn LabelFunction>>,
    pub naming: NamingFunction,
    /// Mapping whose files get pruned, when pruning is enabled.
    pub mapping_name: Option<String>,
    pub prune_cutoff: Option<usize>,
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field(
                "feature_fns",
                &self.feature_fns.iter().map(|ff| ff.name()).collect::<Vec<_>>(),
            )
            .field(
                "label_fns",
                &self.label_fns.iter().map(|lf| lf.name()).collect::<Vec<_>>(),
            )
            .field("prune_cutoff", &self.prune_cutoff)
            .finish()
    }
}

/// Underscore spellings are accepted for the dotted names.
fn canonical_name(name: &str) -> Option<&'static str> {
    match name {
        "experiment1_1" => Some("experiment1.1"),
        "experiment2_1" => Some("experiment2.1"),
        other => EXPERIMENT_NAMES.iter().copied().find(|n| *n == other),
    }
}

fn experiment2_features(resources: &ResourcePaths) -> Vec<Box<dyn FeatureFunction>> {
    let brown = Arc::new(BrownClusters::load(&resources.brown_clusters));
    let inquirer = Arc::new(Lexicon::load(&resources.inquirer, LexiconKind::Inquirer));
    vec![
        Box::new(IsArg1MultipleSentences),
        Box::new(FirstLastFirst3),
        Box::new(AverageVpLength),
        Box::new(Modality),
        Box::new(LexiconFeaturizer::new(inquirer, LexiconKind::Inquirer)),
        Box::new(ProductionRules),
        Box::new(BrownClusterFeaturizer::brown_words(Arc::clone(&brown))),
        Box::new(BrownClusterFeaturizer::brown_word_pairs(brown)),
    ]
}

impl Experiment {
    /// Build a registered experiment.
    ///
    /// # Errors
    ///
    /// `UnknownExperiment` for unregistered names; mapping-file errors for
    /// experiments that use a sense mapping.
    pub fn build(name: &str, mapping_file: &Path, resources: &ResourcePaths) -> Result<Self> {
        let name = canonical_name(name)
            .ok_or_else(|| DsenseError::UnknownExperiment(name.to_string()))?;

        let feature_fns: Vec<Box<dyn FeatureFunction>> = match name {
            "experiment0" => vec![Box::new(First3)],
            "experiment1" => {
                let brown = Arc::new(BrownClusters::load(&resources.brown_clusters));
                vec![
                    Box::new(BrownClusterFeaturizer::brown_word_pairs(brown)),
                    Box::new(ProductionRules),
                ]
            }
            "experiment1.1" | "experiment_test" => vec![Box::new(ProductionRules)],
            "experiment2" | "experiment2.1" => experiment2_features(resources),
            "experiment_mapping_test" => vec![Box::new(BagOfWords)],
            other => return Err(DsenseError::UnknownExperiment(other.to_string())),
        };

        let (mut label_fns, mapping_name) = if name == "experiment_test" {
            (Vec::new(), None)
        } else {
            let mapping = SenseMapping::load(mapping_file)?;
            (
                mapping.label_functions(),
                Some(mapping.mapping_name().to_string()),
            )
        };
        label_fns.push(Box::new(OriginalLabel));

        let prune_cutoff = matches!(name, "experiment1.1" | "experiment2.1")
            .then_some(DEFAULT_PRUNE_CUTOFF);

        Ok(Self {
            name: name.to_string(),
            feature_fns,
            label_fns,
            naming: doc_id_relation_id,
            mapping_name,
            prune_cutoff,
        })
    }

    /// Generate feature files for every directory, then prune the training
    /// (first) directory if the experiment asks for it.
    pub fn run<P: AsRef<Path>>(&self, dirs: &[P]) -> Result<Vec<PathBuf>> {
        let written = generate_feature_files(
            dirs,
            &self.feature_fns,
            &self.label_fns,
            self.naming,
            &self.name,
        )?;

        if let (Some(cutoff), Some(training_dir)) = (self.prune_cutoff, dirs.first()) {
            for path in self.files_to_prune(training_dir.as_ref(), &written) {
                prune_features(&path, cutoff)?;
            }
        }

        info!(experiment = %self.name, files = written.len(), "experiment finished");
        Ok(written)
    }

    /// The training directory's mapping files plus its original-label file.
    fn files_to_prune(&self, training_dir: &Path, written: &[PathBuf]) -> Vec<PathBuf> {
        let mapping_prefix = self
            .mapping_name
            .as_ref()
            .map(|m| format!("{}.{}.", self.name, m));
        let original = format!("{}.original_label.{FEATURE_FILE_EXTENSION}", self.name);

        written
            .iter()
            .filter(|path| path.parent() == Some(training_dir))
            .filter(|path| {
                let file_name = path
                    .file_name()
                    .map(|f| f.to_string_lossy())
                    .unwrap_or_default();
                file_name == original
                    || mapping_prefix
                        .as_deref()
                        .is_some_and(|prefix| file_name.starts_with(prefix))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::relation::reader::testdata::write_data_dir;

    fn mapping_file(dir: &Path) -> PathBuf {
        let path = dir.join("sense_map.json");
        fs::write(&path, r#"{"top": {"Contingency": "CONT"}}"#).unwrap();
        path
    }

    fn offline_resources() -> ResourcePaths {
        ResourcePaths::new()
            .with_brown_clusters("/nonexistent/brown.txt")
            .with_inquirer("/nonexistent/inquirer.json")
    }

    #[test]
    fn test_unknown_experiment() {
        let err = Experiment::build("experiment9", Path::new("x.json"), &offline_resources())
            .unwrap_err();
        assert!(matches!(err, DsenseError::UnknownExperiment(ref n) if n == "experiment9"));
    }

    #[test]
    fn test_every_registered_name_builds() {
        let dir = write_data_dir("exp-names");
        let mapping = mapping_file(&dir);
        for name in EXPERIMENT_NAMES {
            let exp = Experiment::build(name, &mapping, &offline_resources()).unwrap();
            assert_eq!(exp.name, *name);
            assert!(!exp.feature_fns.is_empty());
            assert_eq!(exp.label_fns.last().unwrap().name(), "original_label");
        }
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_experiment_definitions() {
        let dir = write_data_dir("exp-defs");
        let mapping = mapping_file(&dir);
        let res = offline_resources();

        let exp = Experiment::build("experiment2_1", &mapping, &res).unwrap();
        assert_eq!(exp.name, "experiment2.1");
        assert_eq!(exp.prune_cutoff, Some(DEFAULT_PRUNE_CUTOFF));
        let names: Vec<&str> = exp.feature_fns.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                "is_arg1_multiple_sentences",
                "first_last_first_3",
                "average_vp_length",
                "modality",
                "inquirer_tag_feature",
                "production_rules",
                "brown_words",
                "brown_word_pairs",
            ]
        );
        assert_eq!(exp.label_fns.len(), 2);
        assert_eq!(exp.label_fns[0].name(), "sense_map.top");

        let exp = Experiment::build("experiment_test", Path::new("unused"), &res).unwrap();
        assert_eq!(exp.label_fns.len(), 1);
        assert_eq!(exp.prune_cutoff, None);

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_run_with_pruning() {
        let train = write_data_dir("exp-run-train");
        let dev = write_data_dir("exp-run-dev");
        let mapping = mapping_file(&train);

        let exp = Experiment::build("experiment1.1", &mapping, &offline_resources()).unwrap();
        let written = exp.run(&[&train, &dev]).unwrap();
        assert_eq!(written.len(), 4);
        assert!(train.join("experiment1.1.sense_map.top.features").exists());
        assert!(dev.join("experiment1.1.original_label.features").exists());

        // every rule occurs once, so a cutoff of 5 removes them all in train only
        let pruned = fs::read_to_string(train.join("experiment1.1.original_label.features")).unwrap();
        assert_eq!(pruned.trim_end(), "wsj_0001_42:Contingency.Cause.Result:");
        let unpruned = fs::read_to_string(dev.join("experiment1.1.original_label.features")).unwrap();
        assert!(unpruned.contains("ARG1RULE="));

        fs::remove_dir_all(train).ok();
        fs::remove_dir_all(dev).ok();
    }
}
