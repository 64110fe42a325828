use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered key/value pairs; insertion order is preserved for output.
pub type Settings = IndexMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub replace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    /// Inherited keys removed by `drop_<key>` directives.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drops: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Settings::new(),
            replace: false,
            priority: None,
            drops: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    pub fn enabled(&self) -> bool {
        self.get("enabled").is_none_or(parse_flag)
    }

    pub fn devices(&self) -> Option<&str> {
        self.get("devices").filter(|value| !value.is_empty())
    }
}

/// Parsed, unmerged content of one profile directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileDescriptor {
    pub name: String,
    pub source_root: PathBuf,
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub includes: Vec<String>,
    /// `[main]` keys other than `include`.
    #[serde(default)]
    pub options: Settings,
    #[serde(default)]
    pub variables: Settings,
    #[serde(default)]
    pub replace_variables: bool,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub script: String,
    /// Tolerated problems found while parsing, e.g. a non-integer `priority=`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProfileDescriptor {
    pub fn new(name: impl Into<String>, source_root: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            source_root: source_root.into(),
            path: path.into(),
            summary: None,
            includes: Vec::new(),
            options: Settings::new(),
            variables: Settings::new(),
            replace_variables: false,
            sections: Vec::new(),
            script: String::new(),
            warnings: Vec::new(),
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionNode {
    pub descriptor: ProfileDescriptor,
    /// Longest include distance to a profile without parents; display only.
    pub depth: usize,
}

impl ResolutionNode {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }
}

/// Root-first, de-duplicated sequence of the profiles contributing to one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionChain {
    query: String,
    nodes: Vec<ResolutionNode>,
}

impl ResolutionChain {
    pub(crate) fn new(query: String, nodes: Vec<ResolutionNode>) -> Self {
        Self { query, nodes }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn nodes(&self) -> &[ResolutionNode] {
        &self.nodes
    }

    pub fn names(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.name().to_string()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ResolutionNode> {
        self.nodes.iter().find(|node| node.name() == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedProfile {
    pub name: String,
    #[serde(default)]
    pub options: Settings,
    #[serde(default)]
    pub variables: Settings,
    #[serde(default)]
    pub sections: IndexMap<String, Section>,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub source_chain: Vec<String>,
}

impl MergedProfile {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Shorthand for `section(section).get(key)`.
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|section| section.get(key))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileOrigin {
    User,
    System,
    Runtime,
    Custom,
}

impl ProfileOrigin {
    pub fn from_root(root: &Path) -> Self {
        let root = root.to_string_lossy();
        if root.contains("/etc/tuned/profiles") {
            ProfileOrigin::User
        } else if root.contains("/usr/lib/tuned/profiles") {
            ProfileOrigin::System
        } else if root.contains("/run/tuned/profiles") {
            ProfileOrigin::Runtime
        } else {
            ProfileOrigin::Custom
        }
    }
}

impl fmt::Display for ProfileOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileOrigin::User => write!(f, "user"),
            ProfileOrigin::System => write!(f, "system"),
            ProfileOrigin::Runtime => write!(f, "runtime"),
            ProfileOrigin::Custom => write!(f, "custom"),
        }
    }
}

/// One discovered profile: the first search root that provides `name`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub name: String,
    pub path: PathBuf,
    pub root: PathBuf,
    pub origin: ProfileOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
