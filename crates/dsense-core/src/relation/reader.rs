//! Reader for CoNLL shallow-discourse data directories.
//!
//! A directory holds `relations.json` (one relation object per line) and
//! `parses.json` (all documents, keyed by document id).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{ArgTree, Relation, Word};
use crate::error::{DsenseError, Result};
use crate::tree::ParseTree;

pub const RELATIONS_FILE: &str = "relations.json";
pub const PARSES_FILE: &str = "parses.json";

#[derive(Debug, Deserialize)]
struct RawSpan {
    /// `[char_start, char_end, doc_token, sentence, sentence_token]`
    #[serde(rename = "TokenList", default)]
    token_list: Vec<[usize; 5]>,
}

#[derive(Debug, Deserialize)]
struct RawRelation {
    #[serde(rename = "Arg1")]
    arg1: RawSpan,
    #[serde(rename = "Arg2")]
    arg2: RawSpan,
    #[serde(rename = "Connective")]
    connective: Option<RawSpan>,
    #[serde(rename = "DocID")]
    doc_id: String,
    #[serde(rename = "ID")]
    id: u64,
    #[serde(rename = "Sense", default)]
    sense: Vec<String>,
    #[serde(rename = "Type", default)]
    relation_type: String,
}

#[derive(Debug, Deserialize)]
struct RawWordInfo {
    #[serde(rename = "PartOfSpeech", default)]
    part_of_speech: String,
}

#[derive(Debug, Deserialize)]
struct RawSentence {
    #[serde(default)]
    parsetree: String,
    #[serde(default)]
    words: Vec<(String, RawWordInfo)>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    sentences: Vec<RawSentence>,
}

struct Sentence {
    tree: Arc<ParseTree>,
    words: Vec<(String, String)>,
}

/// Load every relation of a data directory, resolving tokens and parse trees.
pub fn load_relations<P: AsRef<Path>>(dir: P) -> Result<Vec<Relation>> {
    let dir = dir.as_ref();
    let documents = load_parses(&dir.join(PARSES_FILE))?;

    let relations_path = dir.join(RELATIONS_FILE);
    let file = File::open(&relations_path).map_err(|e| DsenseError::io(&relations_path, e))?;
    let reader = BufReader::new(file);

    let mut relations = Vec::new();
    for line in reader.lines() {
        let line = line.map_err(|e| DsenseError::io(&relations_path, e))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let raw: RawRelation =
            serde_json::from_str(line).map_err(|e| DsenseError::json(&relations_path, e))?;
        let sentences = documents
            .get(&raw.doc_id)
            .ok_or_else(|| DsenseError::MissingDocument(raw.doc_id.clone()))?;
        relations.push(resolve(raw, sentences)?);
    }

    debug!(dir = %dir.display(), count = relations.len(), "loaded relations");
    Ok(relations)
}

fn load_parses(path: &Path) -> Result<HashMap<String, Vec<Sentence>>> {
    let file = File::open(path).map_err(|e| DsenseError::io(path, e))?;
    let raw: HashMap<String, RawDocument> =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| DsenseError::json(path, e))?;

    let mut documents = HashMap::with_capacity(raw.len());
    for (doc_id, doc) in raw {
        let mut sentences = Vec::with_capacity(doc.sentences.len());
        for (idx, sentence) in doc.sentences.into_iter().enumerate() {
            let tree = match ParseTree::parse(&sentence.parsetree) {
                Ok(tree) => tree,
                Err(e) => {
                    warn!(doc = %doc_id, sentence = idx, error = %e, "unusable parse tree");
                    ParseTree::empty()
                }
            };
            let words = sentence
                .words
                .into_iter()
                .map(|(text, info)| (text, info.part_of_speech))
                .collect();
            sentences.push(Sentence {
                tree: Arc::new(tree),
                words,
            });
        }
        documents.insert(doc_id, sentences);
    }
    Ok(documents)
}

fn resolve(raw: RawRelation, sentences: &[Sentence]) -> Result<Relation> {
    let id = raw.id;
    let arg1 = resolve_words(id, &raw.arg1, sentences)?;
    let arg2 = resolve_words(id, &raw.arg2, sentences)?;
    let connective = match &raw.connective {
        Some(span) => resolve_words(id, span, sentences)?,
        None => Vec::new(),
    };
    let arg1_tree = arg_tree(&arg1, sentences);
    let arg2_tree = arg_tree(&arg2, sentences);

    Ok(Relation {
        doc_id: raw.doc_id,
        relation_id: id,
        relation_type: raw.relation_type,
        senses: raw.sense,
        connective,
        arg1,
        arg2,
        arg1_tree,
        arg2_tree,
    })
}

fn resolve_words(relation_id: u64, span: &RawSpan, sentences: &[Sentence]) -> Result<Vec<Word>> {
    span.token_list
        .iter()
        .map(|&[_, _, doc_token, sentence_index, sentence_token]| {
            let (text, pos) = sentences
                .get(sentence_index)
                .and_then(|s| s.words.get(sentence_token))
                .ok_or_else(|| DsenseError::TokenOutOfRange {
                    relation_id,
                    detail: format!("sentence {sentence_index}, token {sentence_token}"),
                })?;
            Ok(Word {
                text: text.clone(),
                pos: pos.clone(),
                sentence_index,
                sentence_token_index: sentence_token,
                doc_token_index: doc_token,
            })
        })
        .collect()
}

/// The argument's first sentence and the argument tokens inside it.
fn arg_tree(words: &[Word], sentences: &[Sentence]) -> ArgTree {
    let Some(first) = words.first() else {
        return ArgTree::empty();
    };
    let Some(sentence) = sentences.get(first.sentence_index) else {
        return ArgTree::empty();
    };
    let token_indices = words
        .iter()
        .filter(|w| w.sentence_index == first.sentence_index)
        .map(|w| w.sentence_token_index)
        .collect();
    ArgTree {
        tree: Arc::clone(&sentence.tree),
        token_indices,
    }
}

#[cfg(test)]
pub(crate) mod testdata {
    use std::path::PathBuf;

    pub const PARSES: &str = r#"{"wsj_0001": {"sentences": [
        {"parsetree": "( (S (NP (NNP Bob)) (VP (VBZ is) (ADJP (JJ hungry))) (. .)) )\n",
         "words": [["Bob", {"PartOfSpeech": "NNP"}], ["is", {"PartOfSpeech": "VBZ"}],
                   ["hungry", {"PartOfSpeech": "JJ"}], [".", {"PartOfSpeech": "."}]]},
        {"parsetree": "( (S (NP (PRP He)) (VP (MD will) (VP (VB eat)))) )\n",
         "words": [["He", {"PartOfSpeech": "PRP"}], ["will", {"PartOfSpeech": "MD"}],
                   ["eat", {"PartOfSpeech": "VB"}]]}
    ]}}"#;

    pub const RELATIONS: &str = concat!(
        r#"{"Arg1": {"TokenList": [[0, 3, 0, 0, 0], [4, 6, 1, 0, 1], [7, 13, 2, 0, 2]]}, "#,
        r#""Arg2": {"TokenList": [[15, 17, 4, 1, 0], [18, 22, 5, 1, 1], [23, 26, 6, 1, 2]]}, "#,
        r#""Connective": {"TokenList": []}, "DocID": "wsj_0001", "ID": 42, "#,
        r#""Sense": ["Contingency.Cause.Result"], "Type": "Implicit"}"#,
        "\n"
    );

    /// Write a minimal data directory under the system temp dir.
    pub fn write_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dsense-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(super::PARSES_FILE), PARSES).unwrap();
        std::fs::write(dir.join(super::RELATIONS_FILE), RELATIONS).unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::testdata::write_data_dir;
    use super::*;
    use crate::relation::ArgIndex;

    #[test]
    fn test_load_relations() {
        let dir = write_data_dir("reader");
        let relations = load_relations(&dir).unwrap();
        assert_eq!(relations.len(), 1);

        let rel = &relations[0];
        assert_eq!(rel.doc_id, "wsj_0001");
        assert_eq!(rel.relation_id, 42);
        assert_eq!(rel.arg_tokens(ArgIndex::Arg1), vec!["Bob", "is", "hungry"]);
        assert_eq!(rel.arg2[1].pos, "MD");
        assert_eq!(rel.arg2_tree.token_indices, vec![0, 1, 2]);
        assert_eq!(rel.arg2_tree.tree.leaves(), vec!["He", "will", "eat"]);
        assert!(rel.connective.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_document() {
        let dir = write_data_dir("reader-missing");
        std::fs::write(
            dir.join(RELATIONS_FILE),
            r#"{"Arg1": {"TokenList": []}, "Arg2": {"TokenList": []}, "DocID": "nope", "ID": 1}"#,
        )
        .unwrap();
        let err = load_relations(&dir).unwrap_err();
        assert!(matches!(err, DsenseError::MissingDocument(ref d) if d == "nope"));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_token_out_of_range() {
        let dir = write_data_dir("reader-range");
        std::fs::write(
            dir.join(RELATIONS_FILE),
            r#"{"Arg1": {"TokenList": [[0, 1, 0, 5, 0]]}, "Arg2": {"TokenList": []}, "DocID": "wsj_0001", "ID": 3}"#,
        )
        .unwrap();
        let err = load_relations(&dir).unwrap_err();
        assert!(matches!(err, DsenseError::TokenOutOfRange { relation_id: 3, .. }));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_directory() {
        let err = load_relations("/nonexistent/dsense").unwrap_err();
        assert!(matches!(err, DsenseError::Io { .. }));
    }
}
