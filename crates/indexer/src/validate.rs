//! Checks a single session context file before it is committed.

use crate::session::{parse_frontmatter, scalar_string, ContextParser};
use crate::Result;
use serde_json::Value;
use std::fmt;
use std::path::Path;
use threadmap_protocol::{RelationType, RepoLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingLevel {
    Ok,
    OkMachine,
    Note,
    Warning,
    Error,
    ErrorMachine,
}

impl FindingLevel {
    pub fn label(self) -> &'static str {
        match self {
            FindingLevel::Ok => "OK",
            FindingLevel::OkMachine => "OK(machine)",
            FindingLevel::Note => "NOTE",
            FindingLevel::Warning => "WARNING",
            FindingLevel::Error => "ERROR",
            FindingLevel::ErrorMachine => "ERROR(machine)",
        }
    }

    pub fn is_error(self) -> bool {
        matches!(self, FindingLevel::Error | FindingLevel::ErrorMachine)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub level: FindingLevel,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level.label(), self.message)
    }
}

/// Findings in the order they were produced. Validation stops at the first error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn push(&mut self, level: FindingLevel, message: impl Into<String>) {
        self.findings.push(Finding {
            level,
            message: message.into(),
        });
    }

    fn fail(mut self, level: FindingLevel, message: impl Into<String>) -> Self {
        self.push(level, message);
        self
    }

    pub fn is_ok(&self) -> bool {
        !self.findings.iter().any(|f| f.level.is_error())
    }

    /// Process exit status: 0 when valid, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.is_ok() {
            0
        } else {
            1
        }
    }
}

enum SchemaState {
    Missing,
    Loaded(jsonschema::Validator),
    Broken(String),
}

pub struct ContextValidator {
    layout: RepoLayout,
    parser: ContextParser,
    schema: SchemaState,
}

impl ContextValidator {
    /// Loads `contexts/schema.json` from the layout when present.
    pub fn new(layout: RepoLayout) -> Result<Self> {
        let schema = load_schema(&layout.schema_path());
        Ok(Self {
            layout,
            parser: ContextParser::new()?,
            schema,
        })
    }

    pub fn validate_file(&self, path: &Path) -> ValidationReport {
        let report = ValidationReport::default();
        let shown = path.display();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => return report.fail(FindingLevel::Error, format!("cannot read {shown}: {e}")),
        };

        let frontmatter = match parse_frontmatter(&text) {
            Ok(Some(fm)) => fm,
            Ok(None) | Err(_) => {
                return report.fail(
                    FindingLevel::Error,
                    format!("no valid frontmatter in {shown}"),
                )
            }
        };

        let Some(session_id) = frontmatter.get("session_id").and_then(scalar_string) else {
            return report.fail(
                FindingLevel::Error,
                format!("session_id missing in frontmatter of {shown}"),
            );
        };

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !filename.contains(&session_id) {
            return report.fail(
                FindingLevel::Error,
                format!("session_id '{session_id}' not found in filename '{filename}'"),
            );
        }

        let mut report = report;
        let chat_path = self.layout.chats_dir().join(format!("{session_id}.json"));
        if !chat_path.exists() {
            report.push(
                FindingLevel::Warning,
                format!(
                    "corresponding chat log not found at {}",
                    chat_path.display()
                ),
            );
        }

        match self.parser.machine_block(&text) {
            Some(block) => {
                let machine: Value = match serde_json::from_str(block) {
                    Ok(value) => value,
                    Err(e) => {
                        return report.fail(
                            FindingLevel::Error,
                            format!("failed to parse machine JSON block in {shown}: {e}"),
                        )
                    }
                };
                if let Err(message) = self.check_machine_block(path, &machine, &mut report) {
                    return report.fail(FindingLevel::ErrorMachine, message);
                }
            }
            None => report.push(
                FindingLevel::Note,
                "no machine JSON block found; frontmatter validated only",
            ),
        }

        report.push(FindingLevel::Ok, shown.to_string());
        report
    }

    fn check_machine_block(
        &self,
        path: &Path,
        machine: &Value,
        report: &mut ValidationReport,
    ) -> std::result::Result<(), String> {
        let shown = path.display();
        match &self.schema {
            SchemaState::Loaded(validator) => {
                let errors: Vec<String> = validator
                    .iter_errors(machine)
                    .map(|e| e.to_string())
                    .collect();
                if !errors.is_empty() {
                    return Err(format!(
                        "schema validation failed for {shown}: {}",
                        errors.join("; ")
                    ));
                }
                report.push(FindingLevel::OkMachine, shown.to_string());
            }
            SchemaState::Broken(reason) => {
                return Err(format!("unusable schema for {shown}: {reason}"));
            }
            SchemaState::Missing => report.push(
                FindingLevel::Warning,
                "schema file not found; skipping machine block validation",
            ),
        }

        match machine.get("thread_relationships") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::Object(relations)) => {
                for (key, value) in relations {
                    let allowed = value
                        .as_str()
                        .map(|v| v.parse::<RelationType>().is_ok())
                        .unwrap_or(false);
                    if !allowed {
                        let shown_value = value
                            .as_str()
                            .map(str::to_string)
                            .unwrap_or_else(|| value.to_string());
                        return Err(format!(
                            "thread_relationships value '{shown_value}' not allowed for key '{key}' in {shown}"
                        ));
                    }
                }
                Ok(())
            }
            Some(_) => Err(format!("thread_relationships must be an object in {shown}")),
        }
    }
}

fn load_schema(path: &Path) -> SchemaState {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SchemaState::Missing,
        Err(e) => return SchemaState::Broken(format!("cannot read {}: {e}", path.display())),
    };
    let schema: Value = match serde_json::from_str(&text) {
        Ok(schema) => schema,
        Err(e) => return SchemaState::Broken(format!("invalid JSON in {}: {e}", path.display())),
    };
    match jsonschema::validator_for(&schema) {
        Ok(validator) => SchemaState::Loaded(validator),
        Err(e) => SchemaState::Broken(format!("invalid schema {}: {e}", path.display())),
    }
}
