//! # Label and Naming Functions
//!
//! A label function assigns the class label written next to a relation's
//! features. Sense mappings collapse the sense hierarchy along several named
//! dimensions, each of which becomes its own label function.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::error::{DsenseError, Result};
use crate::relation::Relation;

/// Assigns a class label to a relation.
pub trait LabelFunction: Send + Sync {
    /// Used in feature file names.
    fn name(&self) -> &str;

    /// `None` when the relation has no label under this function.
    fn label(&self, relation: &Relation) -> Option<String>;
}

/// The relation's first annotated sense, untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginalLabel;

impl LabelFunction for OriginalLabel {
    fn name(&self) -> &str {
        "original_label"
    }

    fn label(&self, relation: &Relation) -> Option<String> {
        relation.primary_sense().map(str::to_string)
    }
}

/// Sense → label tables keyed by dimension name.
///
/// File format: `{ "<dimension>": { "<sense>": "<label>", ... }, ... }`.
#[derive(Debug, Clone)]
pub struct SenseMapping {
    mapping_name: String,
    dimensions: BTreeMap<String, Arc<BTreeMap<String, String>>>,
}

impl SenseMapping {
    /// Load a mapping file; the mapping name is the file stem.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| DsenseError::io(path, e))?;
        let mapping_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mapping".to_string());
        Self::from_json(mapping_name, &text).map_err(|e| DsenseError::json(path, e))
    }

    pub fn from_json(mapping_name: impl Into<String>, json: &str) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(json)?;
        Ok(Self {
            mapping_name: mapping_name.into(),
            dimensions: raw.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        })
    }

    pub fn mapping_name(&self) -> &str {
        &self.mapping_name
    }

    /// One label function per dimension, in dimension-name order.
    pub fn label_functions(&self) -> Vec<Box<dyn LabelFunction>> {
        self.dimensions
            .iter()
            .map(|(dimension, table)| {
                Box::new(DimensionLabel {
                    name: format!("{}.{}", self.mapping_name, dimension),
                    table: Arc::clone(table),
                }) as Box<dyn LabelFunction>
            })
            .collect()
    }
}

/// One dimension of a [`SenseMapping`].
#[derive(Debug, Clone)]
pub struct DimensionLabel {
    name: String,
    table: Arc<BTreeMap<String, String>>,
}

impl DimensionLabel {
    /// Look up a sense, backing off to shorter dotted prefixes.
    fn lookup(&self, sense: &str) -> Option<&str> {
        let mut key = sense;
        loop {
            if let Some(label) = self.table.get(key) {
                return Some(label.as_str());
            }
            key = &key[..key.rfind('.')?];
        }
    }
}

impl LabelFunction for DimensionLabel {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self, relation: &Relation) -> Option<String> {
        relation
            .primary_sense()
            .and_then(|sense| self.lookup(sense))
            .map(str::to_string)
    }
}

/// Names a relation's feature-file row.
pub type NamingFunction = fn(&Relation) -> String;

/// `<DocID>_<ID>`.
pub fn doc_id_relation_id(relation: &Relation) -> String {
    format!("{}_{}", relation.doc_id, relation.relation_id)
}
