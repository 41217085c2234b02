//! Built-in, versioned prompt transforms.
//!
//! A transform is identified by `(name, version)`. Changing what a transform
//! does means bumping its version, so the applied-once log can tell the runs
//! apart.

use std::collections::BTreeSet;

use thiserror::Error;

use super::rules::{Rule, RuleSet};
use crate::models::{CommunityPrompt, PromptField, PromptPatch};

/// The sentinel the LLM rewrite step uses to say "nothing to change".
pub const NO_CHANGE_SENTINEL: &str = "NO_CHANGE";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Unknown transform: {0}")]
    Unknown(String),

    #[error("Transform {name} has an invalid rule: {source}")]
    InvalidRule {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// Static description of a transform.
#[derive(Debug, Clone, Copy)]
pub struct TransformDef {
    pub name: &'static str,
    pub version: i32,
    pub description: &'static str,
    pub rules: &'static [Rule],
    /// Deactivate rows whose text would become empty instead of writing it.
    pub deactivate_when_emptied: bool,
}

/// A compiled transform.
#[derive(Debug)]
pub struct Transform {
    def: TransformDef,
    rules: RuleSet,
}

/// What a transform wants to do with one row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPlan {
    pub id: i64,
    pub patch: PromptPatch,
    /// Fields whose new text differs from the stored text.
    pub changed: Vec<PromptField>,
}

impl RowPlan {
    pub fn is_noop(&self) -> bool {
        self.patch.is_empty()
    }

    pub fn deactivates(&self) -> bool {
        self.patch.is_active == Some(false)
    }
}

impl Transform {
    pub fn compile(def: TransformDef) -> Result<Self, TransformError> {
        let rules = RuleSet::compile(def.rules).map_err(|source| TransformError::InvalidRule {
            name: def.name,
            source,
        })?;
        Ok(Self { def, rules })
    }

    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn version(&self) -> i32 {
        self.def.version
    }

    pub fn description(&self) -> &'static str {
        self.def.description
    }

    pub fn apply_text(&self, text: &str) -> String {
        self.rules.apply(text)
    }

    /// Work out the patch for one row. Inactive rows are left alone.
    pub fn plan(&self, row: &CommunityPrompt) -> RowPlan {
        let mut plan = RowPlan {
            id: row.id,
            patch: PromptPatch::default(),
            changed: Vec::new(),
        };
        if !row.is_active {
            return plan;
        }

        for field in PromptField::ALL {
            let current = row.field(field);
            let next = self.apply_text(current);
            if next == current {
                continue;
            }
            if next.trim().is_empty() && self.def.deactivate_when_emptied {
                // Nothing left to keep; hide the row and leave the text as is.
                plan.patch = PromptPatch {
                    is_active: Some(false),
                    ..Default::default()
                };
                plan.changed.clear();
                return plan;
            }
            plan.patch.set(field, next);
            plan.changed.push(field);
        }
        plan
    }

    /// Applying the transform to its own output must change nothing.
    pub fn is_idempotent_on(&self, output: &str) -> bool {
        self.apply_text(output) == output
    }
}

const GENDER_RULES: &[Rule] = &[
    Rule::Word {
        from: "he",
        to: "she",
        exceptions: &["he-man"],
    },
    Rule::word("him", "her"),
    Rule::word("his", "her"),
    Rule::word("himself", "herself"),
    Rule::Word {
        from: "man",
        to: "woman",
        exceptions: &["man-made", "he-man", "iron man", "spider-man", "pac-man"],
    },
    Rule::word("men", "women"),
    Rule::word("boy", "girl"),
    Rule::word("boys", "girls"),
    Rule::word("male", "female"),
    Rule::word("gentleman", "lady"),
    Rule::word("gentlemen", "ladies"),
    Rule::word("father", "mother"),
    Rule::word("brother", "sister"),
    Rule::word("son", "daughter"),
    Rule::word("husband", "wife"),
    Rule::word("king", "queen"),
    Rule::word("prince", "princess"),
    Rule::word("guy", "girl"),
    Rule::word("boyfriend", "girlfriend"),
    Rule::word("mr.", "ms."),
];

/// Words cut short by a blanket `ther` -> `the` replacement.
const THER_REPAIR_RULES: &[Rule] = &[
    Rule::word("mothe", "mother"),
    Rule::word("mothes", "mothers"),
    Rule::word("fathe", "father"),
    Rule::word("fathes", "fathers"),
    Rule::word("othe", "other"),
    Rule::word("othes", "others"),
    Rule::word("anothe", "another"),
    Rule::word("brothe", "brother"),
    Rule::word("brothes", "brothers"),
    Rule::word("togethe", "together"),
    Rule::word("weathe", "weather"),
    Rule::word("leathe", "leather"),
    Rule::word("feathe", "feather"),
    Rule::word("feathes", "feathers"),
    Rule::word("eithe", "either"),
    Rule::word("neithe", "neither"),
    Rule::word("whethe", "whether"),
    Rule::word("furthe", "further"),
    Rule::word("furthemore", "furthermore"),
    Rule::word("rathe", "rather"),
    Rule::word("gathe", "gather"),
    Rule::word("gatheing", "gathering"),
    Rule::word("northen", "northern"),
    Rule::word("southen", "southern"),
    Rule::word("theapy", "therapy"),
    Rule::word("themal", "thermal"),
];

// Each rule takes the whitespace next to the sentinel with it, so rows
// without the sentinel keep their text byte for byte.
const SENTINEL_RULES: &[Rule] = &[
    Rule::pattern(r"^\s*\bNO_CHANGE\b\s*", ""),
    Rule::pattern(r"\s*\bNO_CHANGE\b\s*$", ""),
    Rule::pattern(r"[ \t]*\bNO_CHANGE\b", ""),
];

const BACKREF_RULES: &[Rule] = &[
    // `$1woman` left behind by a replacement that was never expanded.
    Rule::pattern(r"\$[1-9]([A-Za-z])", "${1}"),
    Rule::pattern(r"^\s*\$[1-9]\s*$", ""),
];

const WHITESPACE_RULES: &[Rule] = &[
    Rule::pattern(r"[ \t]+\n", "\n"),
    Rule::pattern(r"[ \t]+", " "),
    Rule::pattern(r"^\s+|\s+$", ""),
];

const BUILTIN: &[TransformDef] = &[
    TransformDef {
        name: "gender-male-to-female",
        version: 1,
        description: "Rewrite male terms to their female counterparts, whole words only",
        rules: GENDER_RULES,
        deactivate_when_emptied: false,
    },
    TransformDef {
        name: "repair-truncated-ther",
        version: 1,
        description: "Restore words truncated by an earlier ther -> the replacement",
        rules: THER_REPAIR_RULES,
        deactivate_when_emptied: false,
    },
    TransformDef {
        name: "strip-no-change-sentinel",
        version: 1,
        description: "Remove the NO_CHANGE sentinel; deactivate rows that were only the sentinel",
        rules: SENTINEL_RULES,
        deactivate_when_emptied: true,
    },
    TransformDef {
        name: "repair-unexpanded-backrefs",
        version: 1,
        description: "Remove leaked $1..$9 replacement tokens",
        rules: BACKREF_RULES,
        deactivate_when_emptied: true,
    },
    TransformDef {
        name: "normalize-whitespace",
        version: 1,
        description: "Trim and collapse runs of spaces and tabs",
        rules: WHITESPACE_RULES,
        deactivate_when_emptied: false,
    },
];

/// Every built-in transform, compiled, in registry order.
pub fn registry() -> Result<Vec<Transform>, TransformError> {
    BUILTIN.iter().copied().map(Transform::compile).collect()
}

/// Look up one built-in transform by name.
pub fn find(name: &str) -> Result<Transform, TransformError> {
    BUILTIN
        .iter()
        .copied()
        .find(|def| def.name == name)
        .ok_or_else(|| TransformError::Unknown(name.to_string()))
        .and_then(Transform::compile)
}

/// Built-in transform names.
pub fn names() -> BTreeSet<&'static str> {
    BUILTIN.iter().map(|def| def.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::store::prompt;

    #[test]
    fn test_registry_compiles() {
        let all = registry().unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(names().len(), 5);
    }

    #[test]
    fn test_unknown_transform() {
        assert!(matches!(find("nope"), Err(TransformError::Unknown(_))));
    }

    #[test]
    fn test_gender_transform() {
        let t = find("gender-male-to-female").unwrap();
        assert_eq!(
            t.apply_text("A handsome man with his brother. He smiles at Mr. Lee."),
            "A handsome woman with her sister. She smiles at Ms. Lee."
        );
        // Untouched words that merely contain the targets.
        assert_eq!(
            t.apply_text("the theme of the manor, a human hero, mother"),
            "the theme of the manor, a human hero, mother"
        );
        assert_eq!(t.apply_text("a man-made he-man toy"), "a man-made he-man toy");
    }

    #[test]
    fn test_ther_repair_leaves_intact_words() {
        let t = find("repair-truncated-ther").unwrap();
        assert_eq!(
            t.apply_text("A mothe and her othe child in the weathe"),
            "A mother and her other child in the weather"
        );
        let intact = "mother, the, there, other, together, father";
        assert_eq!(t.apply_text(intact), intact);
    }

    #[test]
    fn test_sentinel_strip_and_deactivate() {
        let t = find("strip-no-change-sentinel").unwrap();
        assert_eq!(t.apply_text("a cat NO_CHANGE"), "a cat");
        assert_eq!(t.apply_text("NO_CHANGE a cat"), "a cat");

        let plan = t.plan(&prompt(1, "Cat", "NO_CHANGE"));
        assert!(plan.deactivates());
        assert!(plan.patch.prompt.is_none());

        let plan = t.plan(&prompt(2, "Cat NO_CHANGE", "a cat"));
        assert_eq!(plan.patch.title.as_deref(), Some("Cat"));
        assert_eq!(plan.changed, vec![PromptField::Title]);
        assert_eq!(t.apply_text("a NO_CHANGE cat"), "a cat");
    }

    #[test]
    fn test_sentinel_leaves_other_rows_untouched() {
        let t = find("strip-no-change-sentinel").unwrap();
        assert_eq!(t.apply_text("  a cat\t "), "  a cat\t ");

        let plan = t.plan(&prompt(3, " Cat ", "a cat  "));
        assert!(plan.is_noop());
        assert!(plan.changed.is_empty());
    }

    #[test]
    fn test_backref_repair() {
        let t = find("repair-unexpanded-backrefs").unwrap();
        assert_eq!(t.apply_text("a young $1woman in red"), "a young woman in red");
        assert_eq!(t.apply_text("costs $5 today"), "costs $5 today");
        assert_eq!(t.apply_text(" $1 "), "");
    }

    #[test]
    fn test_whitespace() {
        let t = find("normalize-whitespace").unwrap();
        assert_eq!(t.apply_text("  a \t cat  \nsits  "), "a cat\nsits");
    }

    #[test]
    fn test_inactive_rows_skipped() {
        let t = find("normalize-whitespace").unwrap();
        let mut row = prompt(3, " x ", " y ");
        row.is_active = false;
        assert!(t.plan(&row).is_noop());
    }

    #[test]
    fn test_all_transforms_idempotent_on_corpus() {
        let corpus = [
            "A man and his son NO_CHANGE",
            "mothe and fathe, togethe   again",
            "a $1woman   in the rain",
            "  He-man versus Iron Man, Mr. Big  ",
            "NO_CHANGE",
            "plain text with nothing to do",
        ];
        for t in registry().unwrap() {
            for text in corpus {
                let once = t.apply_text(text);
                assert!(
                    t.is_idempotent_on(&once),
                    "{} not idempotent on {:?}",
                    t.name(),
                    text
                );
            }
        }
    }
}
