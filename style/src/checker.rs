use crate::rules::{RuleSet, Severity, EOF_RULE, MULTIPLICATIVE_RULE};
use crate::StyleResult;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single rule violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub rule: &'static str,
    pub file: PathBuf,
    /// 1-based line number
    pub line_number: usize,
    /// Offending line with surrounding whitespace trimmed
    pub line: String,
    /// Matched text, if the rule matched a span of the line
    pub matched: Option<String>,
}

/// Findings for one source file
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub findings: Vec<Finding>,
}

impl FileReport {
    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == severity)
            .count()
    }
}

/// Totals over a set of checked files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleSummary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl StyleSummary {
    pub fn from_reports(reports: &[FileReport]) -> Self {
        reports.iter().fold(Self::default(), |acc, report| Self {
            files: acc.files + 1,
            errors: acc.errors + report.errors(),
            warnings: acc.warnings + report.warnings(),
        })
    }

    pub fn passed(&self) -> bool {
        self.errors == 0
    }
}

/// Line-oriented style checker for C sources
#[derive(Debug)]
pub struct StyleChecker {
    rules: RuleSet,
    string_literal: Regex,
    pointer_decl: Regex,
    verbose: bool,
}

impl StyleChecker {
    pub fn new() -> StyleResult<Self> {
        Ok(Self {
            rules: RuleSet::builtin()?,
            string_literal: Regex::new(r#""[^"]*"|'[^']*'"#)?,
            pointer_decl: Regex::new(r"(\b(void|int|char|double|[A-Z]\w+)\s*\*[),]*\s*\w*)")?,
            verbose: false,
        })
    }

    /// Also report multiplication-looking pointer declarations
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Check a file on disk
    pub fn check_file(&self, path: &Path) -> StyleResult<FileReport> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.check_source(path, &content))
    }

    /// Check source text, attributing findings to `file`
    pub fn check_source(&self, file: &Path, content: &str) -> FileReport {
        let mut findings = Vec::new();

        for (index, raw_line) in content.split_inclusive('\n').enumerate() {
            let line = raw_line.strip_suffix('\n').unwrap_or(raw_line);
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.check_line(file, index + 1, line, &mut findings);
        }

        if !content.is_empty() && !content.ends_with('\n') {
            let last = content.lines().last().unwrap_or_default();
            findings.push(Finding {
                severity: Severity::Error,
                rule: EOF_RULE,
                file: file.to_path_buf(),
                line_number: content.lines().count(),
                line: last.trim().to_string(),
                matched: None,
            });
        }

        debug!("{}: {} findings", file.display(), findings.len());
        FileReport {
            file: file.to_path_buf(),
            findings,
        }
    }

    fn check_line(&self, file: &Path, line_number: usize, line: &str, out: &mut Vec<Finding>) {
        let trimmed = line.trim();
        let is_comment = trimmed.starts_with("/*") || trimmed.starts_with('*');
        let literal_start = self.string_literal.find(line).map(|m| m.start());
        let is_pointer = self.pointer_decl.is_match(line);

        for rule in self.rules.iter() {
            if is_comment && !rule.checks_comments {
                continue;
            }
            let Some((start, end)) = rule.matcher.find(line) else {
                continue;
            };

            let severity = if rule.severity == Severity::Warning {
                Severity::Warning
            } else if is_pointer && rule.name == MULTIPLICATIVE_RULE {
                if !self.verbose {
                    continue;
                }
                Severity::PotentialError
            } else if literal_start.is_some_and(|literal| literal < start) {
                Severity::PotentialError
            } else {
                Severity::Error
            };

            out.push(Finding {
                severity,
                rule: rule.name,
                file: file.to_path_buf(),
                line_number,
                line: trimmed.to_string(),
                matched: Some(line[start..end].to_string()),
            });
        }
    }
}
