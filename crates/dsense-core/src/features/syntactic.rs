//! Features read off the constituency parse and part-of-speech tags.

use std::collections::{BTreeSet, VecDeque};

use super::{FeatureFunction, FeatureVector, escape_colons};
use crate::relation::{ArgIndex, ArgTree, Relation};
use crate::tree::{ParseTree, ROOT_LABEL};

/// Leaf count of the first VP met breadth-first under the argument span.
///
/// Zero when the parse is empty, the span covers a single token, or no VP
/// is found.
pub fn verb_phrase_length(arg: &ArgTree) -> usize {
    let tree = arg.tree.as_ref();
    if tree.leaves().is_empty() {
        return 0;
    }
    let (Some(&start), Some(&last)) = (
        arg.token_indices.iter().min(),
        arg.token_indices.iter().max(),
    ) else {
        return 0;
    };
    let end = last + 1;
    if end - start == 1 {
        return 0;
    }
    let Some(subtree) = tree
        .position_spanning_leaves(start, end)
        .and_then(|pos| tree.subtree(&pos))
    else {
        return 0;
    };

    let mut agenda: VecDeque<&ParseTree> = VecDeque::from([subtree]);
    while let Some(current) = agenda.pop_front() {
        if current.height() > 2 {
            if current.label() == "VP" {
                return current.leaves().len();
            }
            agenda.extend(current.children());
        }
    }
    0
}

/// Production rules used over the argument span, normalized for feature use.
///
/// A single-token span takes the preterminal above the token; longer spans
/// take the lowest node covering all of them. Rules mentioning `ROOT` are
/// dropped.
pub fn production_rule_set(arg: &ArgTree) -> BTreeSet<String> {
    let tree = arg.tree.as_ref();
    if tree.leaves().is_empty() {
        return BTreeSet::new();
    }

    let position = match arg.token_indices.as_slice() {
        [] => None,
        [single] => tree.leaf_position(*single).and_then(|mut pos| {
            pos.pop();
            Some(pos)
        }),
        indices => {
            let start = indices.iter().copied().min().unwrap_or(0);
            let end = indices.iter().copied().max().unwrap_or(0) + 1;
            tree.position_spanning_leaves(start, end)
        }
    };
    let Some(subtree) = position.and_then(|pos| tree.subtree(&pos)) else {
        return BTreeSet::new();
    };

    subtree
        .productions()
        .into_iter()
        .filter(|rule| !rule.contains(ROOT_LABEL))
        .map(|rule| escape_colons(&rule.replace(" -> ", "->").replace(' ', "_")))
        .collect()
}

/// `ARG1_VP_LENGTH=`, `ARG2_VP_LENGTH=` and their pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageVpLength;

impl FeatureFunction for AverageVpLength {
    fn name(&self) -> &str {
        "average_vp_length"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let arg1 = verb_phrase_length(relation.arg_tree(ArgIndex::Arg1));
        let arg2 = verb_phrase_length(relation.arg_tree(ArgIndex::Arg2));
        if arg1 == 0 || arg2 == 0 {
            return FeatureVector::new();
        }
        [
            format!("ARG1_VP_LENGTH={arg1}"),
            format!("ARG2_VP_LENGTH={arg2}"),
            format!("VP_LENGTH_{arg1}_{arg2}"),
        ]
        .into_iter()
        .collect()
    }
}

/// Whether each argument contains a modal (`MD`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Modality;

impl Modality {
    fn tag(relation: &Relation, arg: ArgIndex) -> &'static str {
        if relation.arg_words(arg).iter().any(|w| w.pos == "MD") {
            "HAS_MODALITY"
        } else {
            "NO_MODALITY"
        }
    }
}

impl FeatureFunction for Modality {
    fn name(&self) -> &str {
        "modality"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let arg1 = Self::tag(relation, ArgIndex::Arg1);
        let arg2 = Self::tag(relation, ArgIndex::Arg2);
        [
            format!("ARG1_{arg1}"),
            format!("ARG2_{arg2}"),
            format!("ARG1_{arg1}_ARG2_{arg2}"),
        ]
        .into_iter()
        .collect()
    }
}

/// Fires when arg1 spans more than one sentence.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsArg1MultipleSentences;

impl FeatureFunction for IsArg1MultipleSentences {
    fn name(&self) -> &str {
        "is_arg1_multiple_sentences"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let mut fv = FeatureVector::new();
        if relation.arg_sentences(ArgIndex::Arg1).len() > 1 {
            fv.push("ARG1_MULTIPLE_SENTENCES");
        }
        fv
    }
}

/// Shared and argument-exclusive production rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductionRules;

impl FeatureFunction for ProductionRules {
    fn name(&self) -> &str {
        "production_rules"
    }

    fn extract(&self, relation: &Relation) -> FeatureVector {
        let rules1 = production_rule_set(relation.arg_tree(ArgIndex::Arg1));
        let rules2 = production_rule_set(relation.arg_tree(ArgIndex::Arg2));
        if rules1.is_empty() || rules2.is_empty() {
            return FeatureVector::new();
        }

        let mut fv = FeatureVector::new();
        for rule in rules1.intersection(&rules2) {
            fv.push(format!("BOTH_ARGS_RULE={rule}"));
        }
        for rule in rules1.difference(&rules2) {
            fv.push(format!("ARG1RULE={rule}"));
        }
        for rule in rules2.difference(&rules1) {
            fv.push(format!("ARG2RULE={rule}"));
        }
        fv
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::relation::fixtures::{hungry_bob, unparsed, word};

    #[test]
    fn test_verb_phrase_length() {
        let rel = hungry_bob();
        assert_eq!(verb_phrase_length(&rel.arg1_tree), 2);
        assert_eq!(verb_phrase_length(&rel.arg2_tree), 6);
    }

    #[test]
    fn test_verb_phrase_length_single_token() {
        let mut arg = hungry_bob().arg1_tree;
        arg.token_indices = vec![1];
        assert_eq!(verb_phrase_length(&arg), 0);
    }

    #[test]
    fn test_average_vp_length() {
        let fv = AverageVpLength.extract(&hungry_bob());
        assert_eq!(
            fv.as_slice(),
            &["ARG1_VP_LENGTH=2", "ARG2_VP_LENGTH=6", "VP_LENGTH_2_6"]
        );
    }

    #[test]
    fn test_empty_parse_gives_no_features() {
        let rel = unparsed();
        assert!(AverageVpLength.extract(&rel).is_empty());
        assert!(ProductionRules.extract(&rel).is_empty());
    }

    #[test]
    fn test_modality() {
        let fv = Modality.extract(&hungry_bob());
        assert_eq!(
            fv.as_slice(),
            &[
                "ARG1_NO_MODALITY",
                "ARG2_HAS_MODALITY",
                "ARG1_NO_MODALITY_ARG2_HAS_MODALITY"
            ]
        );
    }

    #[test]
    fn test_multiple_sentences() {
        let mut rel = hungry_bob();
        assert!(IsArg1MultipleSentences.extract(&rel).is_empty());
        rel.arg1.push(word("Really", "RB", 3, 0));
        assert_eq!(
            IsArg1MultipleSentences.extract(&rel).as_slice(),
            &["ARG1_MULTIPLE_SENTENCES"]
        );
    }

    #[test]
    fn test_production_rule_set() {
        let rel = hungry_bob();
        let rules = production_rule_set(&rel.arg1_tree);
        assert!(rules.contains("VP->VBZ_ADJP"));
        assert!(rules.contains("NNP->'Bob'"));
        assert!(rules.contains("S->NP_VP_."));
        assert!(rules.iter().all(|r| !r.contains("ROOT")));

        let rules = production_rule_set(&rel.arg2_tree);
        assert!(rules.contains("COLON->'COLON'"));
    }

    #[test]
    fn test_production_rule_single_token() {
        let mut arg = hungry_bob().arg1_tree;
        arg.token_indices = vec![2];
        let rules = production_rule_set(&arg);
        assert_eq!(rules.into_iter().collect::<Vec<_>>(), vec!["JJ->'hungry'"]);
    }

    #[test]
    fn test_production_rules_shared_and_exclusive() {
        let mut rel = hungry_bob();
        rel.arg2_tree = ArgTree {
            tree: Arc::clone(&rel.arg1_tree.tree),
            token_indices: vec![1, 2],
        };
        let fv = ProductionRules.extract(&rel);
        assert!(fv.iter().any(|t| t == "BOTH_ARGS_RULE=VBZ->'is'"));
        assert!(fv.iter().any(|t| t == "ARG1RULE=NNP->'Bob'"));
        assert!(!fv.iter().any(|t| t.starts_with("ARG2RULE=")));
    }
}
