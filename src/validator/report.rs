use std::fmt;

#[cfg(feature = "colorized_output")]
use console::{style, Emoji};

use super::engine::ValidationRecord;
use super::profile::Verdict;
use super::rule::RequirementLevel;

const TITLE: &str = "mzSpecLib Validation Report";

/// Validation check result status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    /// Every entity satisfied the rule
    Ok,
    /// A SHOULD rule failed
    Warning(String),
    /// A MUST rule failed
    Failed(String),
}

impl CheckStatus {
    fn is_ok(&self) -> bool {
        matches!(self, CheckStatus::Ok)
    }

    fn is_warning(&self) -> bool {
        matches!(self, CheckStatus::Warning(_))
    }

    fn is_failed(&self) -> bool {
        matches!(self, CheckStatus::Failed(_))
    }

    fn tone(&self) -> Tone {
        match self {
            CheckStatus::Ok => Tone::Pass,
            CheckStatus::Warning(_) => Tone::Warn,
            CheckStatus::Failed(_) => Tone::Fail,
        }
    }
}

/// One line of the report
#[derive(Debug, Clone)]
pub struct ValidationCheck {
    /// Rule id, with the entity for failures
    pub name: String,
    /// Result status of the check
    pub status: CheckStatus,
}

impl ValidationCheck {
    fn passed(rule_id: &str, entities: usize) -> Self {
        let noun = if entities == 1 { "entity" } else { "entities" };
        Self {
            name: format!("{} ({} {})", rule_id, entities, noun),
            status: CheckStatus::Ok,
        }
    }

    fn from_failure(record: &ValidationRecord) -> Self {
        let message = record.message.clone().unwrap_or_default();
        let status = match record.level {
            RequirementLevel::Must => CheckStatus::Failed(message),
            _ => CheckStatus::Warning(message),
        };
        Self {
            name: format!("{} at {}", record.rule_id, record.entity),
            status,
        }
    }
}

#[derive(Clone, Copy)]
enum Tone {
    Heading,
    Label,
    Pass,
    Warn,
    Fail,
}

/// Turns report fragments into output text
trait Painter {
    fn paint(&self, tone: Tone, text: &str) -> String;
    fn marker(&self, tone: Tone) -> String;
}

struct Plain;

impl Painter for Plain {
    fn paint(&self, _tone: Tone, text: &str) -> String {
        text.to_string()
    }

    fn marker(&self, tone: Tone) -> String {
        match tone {
            Tone::Warn => "⚠",
            Tone::Fail => "✗",
            _ => "✓",
        }
        .to_string()
    }
}

#[cfg(feature = "colorized_output")]
struct Colored;

#[cfg(feature = "colorized_output")]
impl Painter for Colored {
    fn paint(&self, tone: Tone, text: &str) -> String {
        let styled = style(text);
        match tone {
            Tone::Heading => styled.bold().cyan(),
            Tone::Label => styled.bold(),
            Tone::Pass => styled.green(),
            Tone::Warn => styled.yellow(),
            Tone::Fail => styled.red(),
        }
        .to_string()
    }

    fn marker(&self, tone: Tone) -> String {
        let emoji = match tone {
            Tone::Warn => Emoji("⚠", "[WARN]"),
            Tone::Fail => Emoji("✗", "[FAIL]"),
            _ => Emoji("✓", "[OK]"),
        };
        emoji.to_string()
    }
}

/// Human-readable validation report for one library
#[derive(Debug)]
pub struct ValidationReport {
    /// Report lines
    pub checks: Vec<ValidationCheck>,
    /// Path of the file that was validated
    pub file_path: String,
    /// Profile verdict, when one was applied
    pub verdict: Option<Verdict>,
}

impl ValidationReport {
    /// Create an empty report for the given file path
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            checks: Vec::new(),
            file_path: file_path.into(),
            verdict: None,
        }
    }

    /// Build a report from validator records.
    ///
    /// Rules satisfied by every entity collapse to one line; each failing
    /// entity gets its own line. Rules keep the order they first appear in.
    pub fn from_records(file_path: impl Into<String>, records: &[ValidationRecord]) -> Self {
        let mut report = Self::new(file_path);
        let mut rule_ids: Vec<&str> = Vec::new();
        for record in records {
            if !rule_ids.contains(&record.rule_id.as_str()) {
                rule_ids.push(&record.rule_id);
            }
        }

        for rule_id in rule_ids {
            let (total, failures) = records
                .iter()
                .filter(|r| r.rule_id == rule_id)
                .fold((0, Vec::new()), |(total, mut failures), r| {
                    if !r.satisfied {
                        failures.push(r);
                    }
                    (total + 1, failures)
                });
            if failures.is_empty() {
                report.add_check(ValidationCheck::passed(rule_id, total));
            } else {
                report
                    .checks
                    .extend(failures.into_iter().map(ValidationCheck::from_failure));
            }
        }
        report
    }

    /// Attach a profile verdict
    pub fn with_verdict(mut self, verdict: Verdict) -> Self {
        self.verdict = Some(verdict);
        self
    }

    /// Add a check to the report
    pub fn add_check(&mut self, check: ValidationCheck) {
        self.checks.push(check);
    }

    /// Whether the library failed; the verdict decides when present
    pub fn has_failures(&self) -> bool {
        match &self.verdict {
            Some(verdict) => !verdict.passed,
            None => self.checks.iter().any(|c| c.status.is_failed()),
        }
    }

    /// Whether any SHOULD rule failed
    pub fn has_warnings(&self) -> bool {
        self.checks.iter().any(|c| c.status.is_warning())
    }

    /// Number of collapsed passing lines
    pub fn success_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_ok()).count()
    }

    /// Number of warning lines
    pub fn warning_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_warning()).count()
    }

    /// Number of failure lines
    pub fn failure_count(&self) -> usize {
        self.checks.iter().filter(|c| c.status.is_failed()).count()
    }

    /// Format the report with colors (requires console feature)
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        let painter: &dyn Painter = &Colored;
        #[cfg(not(feature = "colorized_output"))]
        let painter: &dyn Painter = &Plain;

        let mut output = String::new();
        // fmt::Write for String never errors
        let _ = self.render(&mut output, painter);
        output
    }

    fn render(&self, out: &mut impl fmt::Write, painter: &dyn Painter) -> fmt::Result {
        writeln!(out, "{}", painter.paint(Tone::Heading, TITLE))?;
        writeln!(out, "{}", painter.paint(Tone::Heading, &"=".repeat(TITLE.len())))?;
        writeln!(out, "{}: {}", painter.paint(Tone::Label, "File"), self.file_path)?;
        writeln!(out)?;

        for check in &self.checks {
            let tone = check.status.tone();
            write!(
                out,
                "[{}] {}",
                painter.marker(tone),
                painter.paint(tone, &check.name)
            )?;
            match &check.status {
                CheckStatus::Ok => writeln!(out)?,
                CheckStatus::Warning(msg) => {
                    writeln!(out, " - {}: {}", painter.paint(Tone::Warn, "WARNING"), msg)?
                }
                CheckStatus::Failed(msg) => {
                    writeln!(out, " - {}: {}", painter.paint(Tone::Fail, "FAILED"), msg)?
                }
            }
        }

        writeln!(out)?;
        writeln!(
            out,
            "{}: {} passed, {} warnings, {} failed",
            painter.paint(Tone::Label, "Summary"),
            painter.paint(Tone::Pass, &self.success_count().to_string()),
            painter.paint(Tone::Warn, &self.warning_count().to_string()),
            painter.paint(Tone::Fail, &self.failure_count().to_string())
        )?;
        if let Some(verdict) = &self.verdict {
            writeln!(
                out,
                "{}: {} MUST and {} SHOULD failures",
                painter.paint(Tone::Label, "Profile"),
                verdict.must_failures,
                verdict.should_failures
            )?;
        }

        writeln!(out)?;
        let (tone, outcome) = if self.has_failures() {
            (Tone::Fail, "Validation FAILED")
        } else if self.has_warnings() {
            (Tone::Warn, "Validation PASSED with warnings")
        } else {
            (Tone::Pass, "Validation PASSED")
        };
        writeln!(out, "{}", painter.paint(tone, outcome))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &Plain)
    }
}
