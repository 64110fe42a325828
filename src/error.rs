use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{}", missing_message(name, referenced_by.as_deref(), searched))]
    MissingProfile {
        name: String,
        referenced_by: Option<String>,
        searched: Vec<PathBuf>,
    },
    #[error("circular include detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unknown output format '{0}' (expected ini, json, summary or yaml)")]
    UnknownFormat(String),
    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml encoding error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ProfileResult<T> = std::result::Result<T, ProfileError>;

impl ProfileError {
    pub fn parse(path: &Path, line: usize, message: impl Into<String>) -> Self {
        ProfileError::Parse {
            path: path.to_path_buf(),
            line,
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        ProfileError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

fn missing_message(name: &str, referenced_by: Option<&str>, searched: &[PathBuf]) -> String {
    let mut message = format!("profile '{}' not found", name);
    if let Some(parent) = referenced_by {
        let _ = write!(message, " (included by '{}')", parent);
    }
    let roots: Vec<String> = searched
        .iter()
        .map(|root| root.display().to_string())
        .collect();
    let _ = write!(message, " in directories: {}", roots.join(", "));
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_profile_names_parent_and_roots() {
        let err = ProfileError::MissingProfile {
            name: "ghost".into(),
            referenced_by: Some("child".into()),
            searched: vec![PathBuf::from("/etc/tuned/profiles"), PathBuf::from("/usr/lib/tuned/profiles")],
        };
        assert_eq!(
            err.to_string(),
            "profile 'ghost' not found (included by 'child') in directories: /etc/tuned/profiles, /usr/lib/tuned/profiles"
        );
    }

    #[test]
    fn cycle_lists_every_hop() {
        let err = ProfileError::CircularDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular include detected: a -> b -> a");
    }

    #[test]
    fn parse_error_carries_location() {
        let err = ProfileError::parse(Path::new("/p/tuned.conf"), 7, "expected key=value");
        assert_eq!(err.to_string(), "/p/tuned.conf:7: expected key=value");
    }
}
