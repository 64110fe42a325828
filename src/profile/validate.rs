use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::merge::merge;
use super::model::{ProfileDescriptor, ResolutionChain};
use super::resolver::Resolver;
use super::source::Discovery;
use crate::error::ProfileError;

/// Compiled once; `None` disables the name and variable checks instead of
/// failing validation.
static PATTERNS: Lazy<Option<Patterns>> = Lazy::new(|| {
    Patterns::compile()
        .map_err(|err| log::error!("failed to compile validation patterns: {}", err))
        .ok()
});

struct Patterns {
    profile_name: Regex,
    variable_reference: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            profile_name: Regex::new(r"^[a-zA-Z0-9_.-]+$")?,
            variable_reference: Regex::new(r"\$\{([^}]+)\}")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    MissingProfile {
        name: String,
        referenced_by: Option<String>,
        searched: Vec<PathBuf>,
    },
    CircularDependency {
        cycle: Vec<String>,
    },
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    Unreadable {
        message: String,
    },
}

impl From<ProfileError> for ValidationIssue {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::MissingProfile {
                name,
                referenced_by,
                searched,
            } => ValidationIssue::MissingProfile {
                name,
                referenced_by,
                searched,
            },
            ProfileError::CircularDependency { cycle } => ValidationIssue::CircularDependency { cycle },
            ProfileError::Parse { path, line, message } => ValidationIssue::Parse { path, line, message },
            other => ValidationIssue::Unreadable {
                message: other.to_string(),
            },
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingProfile { name, referenced_by, .. } => match referenced_by {
                Some(parent) => write!(f, "missing profile '{}' included by '{}'", name, parent),
                None => write!(f, "missing profile '{}'", name),
            },
            ValidationIssue::CircularDependency { cycle } => {
                write!(f, "circular dependency: {}", cycle.join(" -> "))
            }
            ValidationIssue::Parse { path, line, message } => {
                write!(f, "parse error at {}:{}: {}", path.display(), line, message)
            }
            ValidationIssue::Unreadable { message } => write!(f, "{}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub profile: String,
    pub ok: bool,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<String>,
    /// Profiles that resolved cleanly, root first.
    pub chain: Vec<String>,
}

/// Structural health of `name`'s hierarchy. Never fails: every broken edge
/// becomes an issue.
pub fn validate_in(discovery: &Discovery, name: &str) -> ValidationReport {
    let mut errors = Vec::new();
    let chain = Resolver::new(discovery).resolve_collecting(name, &mut errors);
    let issues: Vec<ValidationIssue> = errors.into_iter().map(ValidationIssue::from).collect();

    let mut warnings = Vec::new();
    let patterns = PATTERNS.as_ref();
    if let Some(patterns) = patterns
        && !patterns.profile_name.is_match(name)
    {
        warnings.push(format!("profile name '{}' contains characters tuned does not accept", name));
    }
    for node in chain.nodes() {
        warnings.extend(node.descriptor.warnings.iter().cloned());
        duplicate_include_warnings(&node.descriptor, &mut warnings);
    }
    if let Some(patterns) = patterns {
        undefined_variable_warnings(&chain, &patterns.variable_reference, &mut warnings);
    }

    ValidationReport {
        profile: name.to_string(),
        ok: issues.is_empty(),
        issues,
        warnings,
        chain: chain.names(),
    }
}

fn duplicate_include_warnings(descriptor: &ProfileDescriptor, warnings: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for include in &descriptor.includes {
        if !seen.insert(include.as_str()) {
            warnings.push(format!(
                "profile '{}' includes '{}' more than once",
                descriptor.name, include
            ));
        }
    }
}

/// Checks references against the merged variables, so a definition dropped by
/// a later `[variables] replace=true` no longer counts.
fn undefined_variable_warnings(chain: &ResolutionChain, reference_pattern: &Regex, warnings: &mut Vec<String>) {
    let merged = merge(chain);
    let defined: HashSet<&str> = merged.variables.keys().map(String::as_str).collect();
    let mut reported = HashSet::new();

    for node in chain.nodes() {
        let descriptor = &node.descriptor;
        let values = descriptor
            .variables
            .values()
            .chain(descriptor.sections.iter().flat_map(|section| section.settings.values()));
        for value in values {
            for captures in reference_pattern.captures_iter(value) {
                let Some(reference) = captures.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                // ${f:function:args} calls are evaluated by the daemon.
                if reference.contains(':') || defined.contains(reference) {
                    continue;
                }
                if reported.insert((descriptor.name.as_str(), reference)) {
                    warnings.push(format!(
                        "profile '{}' references undefined variable '${{{}}}'",
                        descriptor.name, reference
                    ));
                }
            }
        }
    }
}
