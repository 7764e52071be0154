//! # Feature Files
//!
//! One line per relation: `<name>:<label>:<feature feature ...>`. The colon is
//! the column delimiter, so every field is colon-escaped before writing.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{DsenseError, Result};
use crate::features::{escape_colons, extract_all, FeatureFunction};
use crate::labels::{LabelFunction, NamingFunction};
use crate::relation::{load_relations, Relation};

/// Column delimiter of the feature file format.
pub const FIELD_DELIMITER: char = ':';

/// File extension of generated feature files.
pub const FEATURE_FILE_EXTENSION: &str = "features";

/// `<dir>/<experiment>.<label_fn>.features`
pub fn feature_file_path(dir: &Path, experiment: &str, label_fn: &str) -> PathBuf {
    dir.join(format!("{experiment}.{label_fn}.{FEATURE_FILE_EXTENSION}"))
}

/// Format one feature-file line.
pub fn format_line<'a>(name: &str, label: &str, features: impl IntoIterator<Item = &'a str>) -> String {
    let features: Vec<&str> = features.into_iter().collect();
    format!(
        "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
        escape_colons(name),
        escape_colons(label),
        features.join(" ")
    )
}

/// Split a feature-file line into name, label and features.
pub fn parse_line(line: &str) -> Option<(&str, &str, Vec<&str>)> {
    let mut fields = line.splitn(3, FIELD_DELIMITER);
    let name = fields.next()?;
    let label = fields.next()?;
    let features = fields.next()?.split_whitespace().collect();
    Some((name, label, features))
}

/// Write feature files for already-loaded relations into `dir`.
///
/// Returns the paths written, one per label function. Relations a label
/// function leaves unlabeled are skipped in that file.
pub fn write_feature_files(
    dir: &Path,
    relations: &[Relation],
    feature_fns: &[Box<dyn FeatureFunction>],
    label_fns: &[Box<dyn LabelFunction>],
    naming: NamingFunction,
    experiment: &str,
) -> Result<Vec<PathBuf>> {
    let features: Vec<_> = relations
        .iter()
        .map(|rel| extract_all(feature_fns, rel))
        .collect();

    let mut written = Vec::with_capacity(label_fns.len());
    for label_fn in label_fns {
        let path = feature_file_path(dir, experiment, label_fn.name());
        let file = File::create(&path).map_err(|e| DsenseError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        let mut rows = 0usize;
        for (relation, fv) in relations.iter().zip(&features) {
            let Some(label) = label_fn.label(relation) else {
                continue;
            };
            writeln!(out, "{}", format_line(&naming(relation), &label, fv.iter()))
                .map_err(|e| DsenseError::io(&path, e))?;
            rows += 1;
        }
        out.flush().map_err(|e| DsenseError::io(&path, e))?;
        info!(path = %path.display(), rows, "wrote feature file");
        written.push(path);
    }
    Ok(written)
}

/// Load each data directory and write its feature files.
pub fn generate_feature_files<P: AsRef<Path>>(
    dirs: &[P],
    feature_fns: &[Box<dyn FeatureFunction>],
    label_fns: &[Box<dyn LabelFunction>],
    naming: NamingFunction,
    experiment: &str,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for dir in dirs {
        let dir = dir.as_ref();
        let relations = load_relations(dir)?;
        info!(dir = %dir.display(), relations = relations.len(), experiment, "extracting features");
        written.extend(write_feature_files(
            dir,
            &relations,
            feature_fns,
            label_fns,
            naming,
            experiment,
        )?);
    }
    Ok(written)
}

/// Rewrite a feature file keeping only features seen at least `cutoff` times.
///
/// Returns the number of distinct features kept.
pub fn prune_features<P: AsRef<Path>>(path: P, cutoff: usize) -> Result<usize> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| DsenseError::io(path, e))?;
    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<_>>()
        .map_err(|e| DsenseError::io(path, e))?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in &lines {
        if let Some((_, _, features)) = parse_line(line) {
            for feature in features {
                *counts.entry(feature).or_default() += 1;
            }
        }
    }

    let mut pruned = String::new();
    for line in &lines {
        let Some((name, label, features)) = parse_line(line) else {
            continue;
        };
        let kept = features.into_iter().filter(|f| counts[f] >= cutoff);
        pruned.push_str(&format_line(name, label, kept));
        pruned.push('\n');
    }

    let kept = counts.values().filter(|&&c| c >= cutoff).count();
    let tmp = path.with_extension("pruning");
    fs::write(&tmp, pruned).map_err(|e| DsenseError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| DsenseError::io(path, e))?;
    info!(path = %path.display(), cutoff, total = counts.len(), kept, "pruned features");
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{BagOfWords, Modality};
    use crate::labels::{doc_id_relation_id, OriginalLabel};
    use crate::relation::fixtures::hungry_bob;
    use crate::relation::reader::testdata::write_data_dir;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("dsense-ff-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_format_and_parse_line() {
        let line = format_line("wsj_0001_7", "Expansion", ["BOW_a", "BOW_COLON"]);
        assert_eq!(line, "wsj_0001_7:Expansion:BOW_a BOW_COLON");
        let (name, label, features) = parse_line(&line).unwrap();
        assert_eq!(name, "wsj_0001_7");
        assert_eq!(label, "Expansion");
        assert_eq!(features, vec!["BOW_a", "BOW_COLON"]);
        assert!(parse_line("no delimiter").is_none());
    }

    #[test]
    fn test_write_feature_files() {
        let dir = scratch_dir("write");
        let feature_fns: Vec<Box<dyn FeatureFunction>> =
            vec![Box::new(BagOfWords), Box::new(Modality)];
        let label_fns: Vec<Box<dyn LabelFunction>> = vec![Box::new(OriginalLabel)];

        let paths = write_feature_files(
            &dir,
            &[hungry_bob()],
            &feature_fns,
            &label_fns,
            doc_id_relation_id,
            "experiment_x",
        )
        .unwrap();
        assert_eq!(paths, vec![dir.join("experiment_x.original_label.features")]);

        let text = fs::read_to_string(&paths[0]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1);
        let (name, label, features) = parse_line(lines[0]).unwrap();
        assert_eq!(name, "wsj_0001_7");
        assert_eq!(label, "Contingency.Cause.Reason");
        assert_eq!(features.len(), 13);
        assert!(features.iter().all(|f| !f.contains(':')));

        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_unlabeled_relations_skipped() {
        let dir = scratch_dir("skip");
        let mut rel = hungry_bob();
        rel.senses.clear();
        let label_fns: Vec<Box<dyn LabelFunction>> = vec![Box::new(OriginalLabel)];
        let paths =
            write_feature_files(&dir, &[rel], &[], &label_fns, doc_id_relation_id, "e").unwrap();
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), "");
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_generate_from_data_dir() {
        let dir = write_data_dir("generate");
        let feature_fns: Vec<Box<dyn FeatureFunction>> = vec![Box::new(Modality)];
        let label_fns: Vec<Box<dyn LabelFunction>> = vec![Box::new(OriginalLabel)];
        let paths =
            generate_feature_files(&[&dir], &feature_fns, &label_fns, doc_id_relation_id, "exp")
                .unwrap();
        let text = fs::read_to_string(&paths[0]).unwrap();
        assert_eq!(
            text.trim_end(),
            "wsj_0001_42:Contingency.Cause.Result:ARG1_NO_MODALITY ARG2_HAS_MODALITY ARG1_NO_MODALITY_ARG2_HAS_MODALITY"
        );
        fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_prune_features() {
        let dir = scratch_dir("prune");
        let path = dir.join("e.original_label.features");
        fs::write(&path, "r1:A:x y z\nr2:B:x y\nr3:A:x\n").unwrap();

        let kept = prune_features(&path, 2).unwrap();
        assert_eq!(kept, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "r1:A:x y\nr2:B:x y\nr3:A:x\n"
        );

        fs::remove_dir_all(dir).ok();
    }
}
