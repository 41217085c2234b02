//! Text substitution rules.
//!
//! Two kinds exist. [`Rule::Word`] replaces whole words only, keeps the case
//! shape of what it replaced, and leaves alone any match that falls inside one
//! of its exception phrases. [`Rule::Pattern`] is a plain regex replacement
//! for structural cleanups (sentinels, stray tokens, whitespace).

use regex::{Captures, Regex, RegexBuilder};

/// A substitution rule, before compilation.
#[derive(Debug, Clone, Copy)]
pub enum Rule {
    Word {
        from: &'static str,
        to: &'static str,
        exceptions: &'static [&'static str],
    },
    Pattern {
        pattern: &'static str,
        replacement: &'static str,
    },
}

impl Rule {
    pub const fn word(from: &'static str, to: &'static str) -> Self {
        Rule::Word {
            from,
            to,
            exceptions: &[],
        }
    }

    pub const fn pattern(pattern: &'static str, replacement: &'static str) -> Self {
        Rule::Pattern {
            pattern,
            replacement,
        }
    }
}

#[derive(Debug)]
enum Compiled {
    Word {
        regex: Regex,
        to: &'static str,
        exceptions: Vec<Regex>,
    },
    Pattern {
        regex: Regex,
        replacement: &'static str,
    },
}

/// An ordered list of compiled rules.
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Compiled>,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `\b` only on sides where the literal starts/ends with a word character,
/// so entries like `mr.` still match before a space.
fn word_pattern(literal: &str) -> String {
    let mut pattern = String::new();
    if literal.chars().next().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(literal));
    if literal.chars().last().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

fn case_insensitive(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

impl RuleSet {
    pub fn compile(rules: &[Rule]) -> Result<Self, regex::Error> {
        let rules = rules
            .iter()
            .map(|rule| match *rule {
                Rule::Word {
                    from,
                    to,
                    exceptions,
                } => Ok(Compiled::Word {
                    regex: case_insensitive(&word_pattern(from))?,
                    to,
                    exceptions: exceptions
                        .iter()
                        .map(|e| case_insensitive(&regex::escape(e)))
                        .collect::<Result<_, _>>()?,
                }),
                Rule::Pattern {
                    pattern,
                    replacement,
                } => Ok(Compiled::Pattern {
                    regex: Regex::new(pattern)?,
                    replacement,
                }),
            })
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Apply every rule in order.
    pub fn apply(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.rules {
            let next = match rule {
                Compiled::Word {
                    regex,
                    to,
                    exceptions,
                } => replace_words(&current, regex, to, exceptions),
                Compiled::Pattern { regex, replacement } => {
                    regex.replace_all(&current, *replacement).into_owned()
                }
            };
            current = next;
        }
        current
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn replace_words(text: &str, regex: &Regex, to: &str, exceptions: &[Regex]) -> String {
    let protected: Vec<(usize, usize)> = exceptions
        .iter()
        .flat_map(|e| e.find_iter(text).map(|m| (m.start(), m.end())))
        .collect();

    regex
        .replace_all(text, |caps: &Captures| {
            let m = &caps[0];
            let (start, end) = caps
                .get(0)
                .map(|m| (m.start(), m.end()))
                .unwrap_or_default();
            if protected.iter().any(|&(s, e)| start < e && s < end) {
                m.to_string()
            } else {
                match_case(m, to)
            }
        })
        .into_owned()
}

/// Shape `replacement` like `original`: UPPER, Capitalized or lower.
pub fn match_case(original: &str, replacement: &str) -> String {
    let letters: Vec<char> = original.chars().filter(|c| c.is_alphabetic()).collect();
    let all_upper = letters.len() > 1 && letters.iter().all(|c| c.is_uppercase());
    let first_upper = letters.first().is_some_and(|c| c.is_uppercase());

    if all_upper {
        replacement.to_uppercase()
    } else if first_upper {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_rule_respects_boundaries() {
        let rules = RuleSet::compile(&[Rule::word("man", "woman")]).unwrap();
        assert_eq!(rules.apply("a man and a woman"), "a woman and a woman");
        assert_eq!(rules.apply("manual mandate human"), "manual mandate human");
    }

    #[test]
    fn test_case_shape_preserved() {
        let rules = RuleSet::compile(&[Rule::word("he", "she")]).unwrap();
        assert_eq!(rules.apply("He said he would. HE did."), "She said she would. SHE did.");
    }

    #[test]
    fn test_exceptions_protect_phrases() {
        let rules = RuleSet::compile(&[Rule::Word {
            from: "man",
            to: "woman",
            exceptions: &["man-made", "Iron Man"],
        }])
        .unwrap();
        assert_eq!(
            rules.apply("A man near a man-made lake, dressed as Iron Man"),
            "A woman near a man-made lake, dressed as Iron Man"
        );
    }

    #[test]
    fn test_punctuated_literal() {
        let rules = RuleSet::compile(&[Rule::word("mr.", "ms.")]).unwrap();
        assert_eq!(rules.apply("Portrait of Mr. Smith"), "Portrait of Ms. Smith");
        assert_eq!(rules.apply("hummr. x"), "hummr. x");
    }

    #[test]
    fn test_pattern_rule() {
        let rules = RuleSet::compile(&[Rule::pattern(r"[ \t]+", " ")]).unwrap();
        assert_eq!(rules.apply("a  \t b"), "a b");
    }

    #[test]
    fn test_match_case() {
        assert_eq!(match_case("Boy", "girl"), "Girl");
        assert_eq!(match_case("BOY", "girl"), "GIRL");
        assert_eq!(match_case("boy", "girl"), "girl");
        assert_eq!(match_case("MR.", "ms."), "MS.");
    }
}
