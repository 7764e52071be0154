//! # dsense Core
//!
//! Feature extraction for discourse-sense classification. Reads CoNLL
//! shallow-discourse data directories, turns each relation into string
//! feature tokens and writes one feature file per label function.
//!
//! ## Quick Start
//!
//! ```rust
//! use dsense_core::features::{FeatureFunction, ProductionRules};
//! use dsense_core::tree::ParseTree;
//!
//! let tree = ParseTree::parse("( (S (NP (NNP Bob)) (VP (VBZ is) (ADJP (JJ hungry)))) )").unwrap();
//! assert_eq!(tree.leaves(), vec!["Bob", "is", "hungry"]);
//! assert_eq!(ProductionRules.name(), "production_rules");
//! ```
pub mod error;
pub mod experiments;
pub mod feature_file;
pub mod features;
pub mod labels;
pub mod relation;
pub mod tree;

// Re-export primary API
pub use error::{DsenseError, Result};
pub use experiments::{Experiment, ResourcePaths, EXPERIMENT_NAMES};
pub use feature_file::{generate_feature_files, prune_features, write_feature_files};
pub use features::{FeatureFunction, FeatureVector};
pub use labels::{LabelFunction, NamingFunction, OriginalLabel, SenseMapping};
pub use relation::{load_relations, ArgIndex, ArgTree, Relation, Word};
pub use tree::ParseTree;
