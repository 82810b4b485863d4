//! Rule table for the C style checker.
//!
//! Every rule is a single-line pattern. Rules are applied in table order so
//! findings on one line are reported in a stable order.

use regex::{Regex, RegexBuilder};

/// Severity of a rule violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Severity {
    /// Counted, fails the check
    Error,
    /// Counted, does not fail the check
    Warning,
    /// Likely a false positive, reported but not counted
    PotentialError,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::PotentialError => "POTENTIAL ERROR",
        }
    }
}

/// Keywords and type names that may legitimately be followed by ` (`
const PAREN_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "else", "return", "void", "int", "char", "double",
];

/// How a rule decides whether a line violates it
#[derive(Debug)]
pub enum Matcher {
    Pattern(Regex),
    /// Identifier followed by ` (`, unless the identifier is a keyword
    CallWithSpace(Regex),
}

impl Matcher {
    /// Byte range of the first violation on `line`
    pub fn find(&self, line: &str) -> Option<(usize, usize)> {
        match self {
            Matcher::Pattern(regex) => regex.find(line).map(|m| (m.start(), m.end())),
            Matcher::CallWithSpace(regex) => regex
                .captures_iter(line)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let name = caps.get(1)?.as_str();
                    (!PAREN_KEYWORDS.contains(&name)).then(|| (whole.start(), whole.end()))
                })
                .next(),
        }
    }

    pub fn pattern(&self) -> &str {
        match self {
            Matcher::Pattern(regex) | Matcher::CallWithSpace(regex) => regex.as_str(),
        }
    }
}

/// A named style rule
#[derive(Debug)]
pub struct Rule {
    pub name: &'static str,
    pub severity: Severity,
    /// Also applied to comment lines
    pub checks_comments: bool,
    pub matcher: Matcher,
}

pub const MULTIPLICATIVE_RULE: &str = "multiplicative_with_only_one_space";
pub const EOF_RULE: &str = "eof_not_on_newline";

/// Rules checked on comment lines
const COMMENT_RULES: &[&str] = &[
    "line_longer_80_chars",
    "line_ends_in_space",
    "single_line_comment",
];

const ERROR_PATTERNS: &[(&str, &str)] = &[
    // Logical statements
    ("no_if_space", r"if\("),
    ("no_for_space", r"for\("),
    ("no_while_space", r"while\("),
    ("no_switch_space", r"switch\("),
    ("no_case_space", r"case\w"),
    ("no_space_around_else", r"(\}else)|(else\{)"),
    ("else_on_newline", r"^\s*else"),
    // Operators
    (
        MULTIPLICATIVE_RULE,
        r"(([a-z0-9().]+\s+[*/][a-z0-9().]+)|([a-z0-9().]+[*/]\s+[a-z0-9().]+))",
    ),
    (
        "additive_with_only_one_space",
        r"(([a-z0-9().]+\s+[+-][a-z0-9().]+)|([a-z0-9().]+[+-]\s+[a-z0-9().]+))",
    ),
    ("preprocessor_not_flush_with_left", r"^\s+#"),
    // Delimiters
    ("no_space_after_comma", r",\w"),
    ("no_space_after_semicolon", r";\w"),
    // Braces
    ("paren_with_space", r"(\(\s)|(\s\))"),
    ("bracket_with_space", r"(\[\s)|(\s\])"),
    ("paren_and_curly_without_space", r"\)\{"),
];

const CALL_WITH_SPACE: (&str, &str) = ("function_with_space", r"\b([a-z]+)\s\(");

const LINE_PATTERNS: &[(&str, &str)] = &[
    // Comments
    ("single_line_comment", r"//"),
    // Lines
    ("line_ends_in_space", r"\s$"),
    ("line_longer_80_chars", r"^.{81,}$"),
    ("space_indentation", r"^ +\S"),
    ("whitespace_only_line", r"^[ \t]+$"),
];

const WARNING_PATTERNS: &[(&str, &str)] = &[(
    "spaces_around_additive_op_in_array_access",
    r"\w+\[\s*[a-z0-9]+(\s+[+-]\s*|\s*[+-]\s+)[a-z0-9]+\s*\]",
)];

/// Compiled rule table
#[derive(Debug)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile the built-in rules
    pub fn builtin() -> Result<Self, regex::Error> {
        let mut rules = Vec::new();

        for &(name, pattern) in ERROR_PATTERNS {
            rules.push(Self::rule(name, Severity::Error, Matcher::Pattern(Regex::new(pattern)?)));
        }
        let (name, pattern) = CALL_WITH_SPACE;
        rules.push(Self::rule(
            name,
            Severity::Error,
            Matcher::CallWithSpace(Regex::new(pattern)?),
        ));
        for &(name, pattern) in LINE_PATTERNS {
            rules.push(Self::rule(name, Severity::Error, Matcher::Pattern(Regex::new(pattern)?)));
        }
        for &(name, pattern) in WARNING_PATTERNS {
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            rules.push(Self::rule(name, Severity::Warning, Matcher::Pattern(regex)));
        }

        Ok(Self { rules })
    }

    fn rule(name: &'static str, severity: Severity, matcher: Matcher) -> Rule {
        Rule {
            name,
            severity,
            checks_comments: COMMENT_RULES.contains(&name),
            matcher,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
