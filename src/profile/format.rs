use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::merge::{MergeSummary, merge, summarize};
use super::model::{MergedProfile, ProfileDescriptor, ResolutionChain, Section};
use super::parser::{MAIN_SECTION, VARIABLES_SECTION};
use super::validate::ValidationReport;
use crate::error::{ProfileError, ProfileResult};

const RULE_WIDTH: usize = 50;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    #[default]
    Ini,
    Json,
    Summary,
    Yaml,
}

impl FromStr for OutputKind {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ini" => Ok(OutputKind::Ini),
            "json" => Ok(OutputKind::Json),
            "summary" => Ok(OutputKind::Summary),
            "yaml" => Ok(OutputKind::Yaml),
            _ => Err(ProfileError::UnknownFormat(s.to_string())),
        }
    }
}

/// Anything the formatter knows how to render.
#[derive(Clone, Copy, Debug)]
pub enum Subject<'a> {
    Merged(&'a MergedProfile),
    Chain(&'a ResolutionChain),
    Report(&'a ValidationReport),
}

impl<'a> From<&'a MergedProfile> for Subject<'a> {
    fn from(profile: &'a MergedProfile) -> Self {
        Subject::Merged(profile)
    }
}

impl<'a> From<&'a ResolutionChain> for Subject<'a> {
    fn from(chain: &'a ResolutionChain) -> Self {
        Subject::Chain(chain)
    }
}

impl<'a> From<&'a ValidationReport> for Subject<'a> {
    fn from(report: &'a ValidationReport) -> Self {
        Subject::Report(report)
    }
}

pub fn render(subject: Subject<'_>, kind: OutputKind) -> ProfileResult<String> {
    match (subject, kind) {
        (Subject::Merged(profile), OutputKind::Ini) => Ok(merged_ini(profile)),
        (Subject::Merged(profile), OutputKind::Summary) => Ok(merged_summary(profile)),
        (Subject::Merged(profile), OutputKind::Json) => Ok(serde_json::to_string_pretty(profile)?),
        (Subject::Merged(profile), OutputKind::Yaml) => Ok(serde_yaml::to_string(profile)?),
        (Subject::Chain(chain), OutputKind::Ini) => Ok(chain_ini(chain)),
        (Subject::Chain(chain), OutputKind::Summary) => Ok(chain_tree(chain)),
        (Subject::Chain(chain), OutputKind::Json) => Ok(serde_json::to_string_pretty(&ChainView::new(chain))?),
        (Subject::Chain(chain), OutputKind::Yaml) => Ok(serde_yaml::to_string(&ChainView::new(chain))?),
        (Subject::Report(report), OutputKind::Ini | OutputKind::Summary) => Ok(report_text(report)),
        (Subject::Report(report), OutputKind::Json) => Ok(serde_json::to_string_pretty(report)?),
        (Subject::Report(report), OutputKind::Yaml) => Ok(serde_yaml::to_string(report)?),
    }
}

fn merged_ini(profile: &MergedProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Merged tuned profile: {}", profile.name);
    let _ = writeln!(out, "# Resolved from: {}", profile.source_chain.join(" -> "));
    out.push('\n');

    if !profile.options.is_empty() {
        let _ = writeln!(out, "[{}]", MAIN_SECTION);
        for (key, value) in &profile.options {
            write_setting(&mut out, key, value);
        }
        out.push('\n');
    }

    if !profile.variables.is_empty() {
        let _ = writeln!(out, "[{}]", VARIABLES_SECTION);
        for (key, value) in &profile.variables {
            write_setting(&mut out, key, value);
        }
        out.push('\n');
    }

    for section in profile.sections.values() {
        let _ = writeln!(out, "[{}]", section.name);
        if let Some(priority) = section.priority {
            let _ = writeln!(out, "# Priority: {}", priority);
        }
        if !section.enabled() {
            let _ = writeln!(out, "# Enabled: false");
        }
        if let Some(devices) = section.devices() {
            let _ = writeln!(out, "# Devices: {}", devices);
        }
        for (key, value) in &section.settings {
            write_setting(&mut out, key, value);
        }
        out.push('\n');
    }
    out
}

/// Multi-line values are written as indented continuation lines so the
/// output parses back to the same value.
fn write_setting(out: &mut String, key: &str, value: &str) {
    let mut lines = value.split('\n');
    let _ = writeln!(out, "{}={}", key, lines.next().unwrap_or_default());
    for line in lines {
        let _ = writeln!(out, "    {}", line);
    }
}

fn merged_summary(profile: &MergedProfile) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Merged Profile Summary: {}", profile.name);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Profile hierarchy: {}", profile.source_chain.join(" -> "));
    let _ = writeln!(out, "Total sections: {}", profile.sections.len());
    let _ = writeln!(out, "Total variables: {}", profile.variables.len());
    if !profile.script.is_empty() {
        let _ = writeln!(out, "Script lines: {}", profile.script.lines().count());
    }
    out.push('\n');

    if !profile.variables.is_empty() {
        let _ = writeln!(out, "Variables:");
        for (key, value) in &profile.variables {
            let _ = writeln!(out, "  {} = {}", key, value);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "Configuration sections:");
    for section in profile.sections.values() {
        let status = if section.enabled() { "enabled" } else { "disabled" };
        let _ = write!(out, "  [{}] - {}", section.name, status);
        if let Some(priority) = section.priority {
            let _ = write!(out, " (priority: {})", priority);
        }
        out.push('\n');
    }
    out
}

fn chain_ini(chain: &ResolutionChain) -> String {
    let mut out = String::new();
    for node in chain.nodes() {
        let descriptor = &node.descriptor;
        let _ = writeln!(out, "# Profile: {} (depth {})", descriptor.name, node.depth);
        let _ = writeln!(out, "# Source: {}", descriptor.path.display());
        descriptor_ini(&mut out, descriptor);
    }
    out
}

fn descriptor_ini(out: &mut String, descriptor: &ProfileDescriptor) {
    if !descriptor.includes.is_empty() || !descriptor.options.is_empty() {
        let _ = writeln!(out, "[{}]", MAIN_SECTION);
        for (key, value) in &descriptor.options {
            write_setting(out, key, value);
        }
        if !descriptor.includes.is_empty() {
            let _ = writeln!(out, "include={}", descriptor.includes.join(","));
        }
        out.push('\n');
    }
    if !descriptor.variables.is_empty() || descriptor.replace_variables {
        let _ = writeln!(out, "[{}]", VARIABLES_SECTION);
        if descriptor.replace_variables {
            let _ = writeln!(out, "replace=true");
        }
        for (key, value) in &descriptor.variables {
            write_setting(out, key, value);
        }
        out.push('\n');
    }
    for section in &descriptor.sections {
        raw_section_ini(out, section);
    }
}

fn raw_section_ini(out: &mut String, section: &Section) {
    let _ = writeln!(out, "[{}]", section.name);
    if section.replace {
        let _ = writeln!(out, "replace=true");
    }
    if let Some(priority) = section.priority {
        let _ = writeln!(out, "priority={}", priority);
    }
    for dropped in &section.drops {
        let _ = writeln!(out, "drop_{}=true", dropped);
    }
    for (key, value) in &section.settings {
        write_setting(out, key, value);
    }
    out.push('\n');
}

fn chain_tree(chain: &ResolutionChain) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Profile hierarchy for: {}", chain.query());
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "Total profiles in hierarchy: {}", chain.len());
    out.push('\n');

    let last = chain.len().saturating_sub(1);
    for (index, node) in chain.nodes().iter().enumerate() {
        let descriptor = &node.descriptor;
        let indent = "  ".repeat(node.depth);
        let _ = writeln!(out, "{}├─ {}", indent, descriptor.name);
        if !descriptor.includes.is_empty() {
            let _ = writeln!(out, "{}│  Includes: {}", indent, descriptor.includes.join(", "));
        }
        if !descriptor.sections.is_empty() {
            let names: Vec<&str> = descriptor
                .sections
                .iter()
                .take(3)
                .map(|section| section.name.as_str())
                .collect();
            let more = if descriptor.sections.len() > 3 { "..." } else { "" };
            let _ = writeln!(
                out,
                "{}│  Sections: {} ({}{})",
                indent,
                descriptor.sections.len(),
                names.join(", "),
                more
            );
        }
        if !descriptor.variables.is_empty() {
            let _ = writeln!(out, "{}│  Variables: {}", indent, descriptor.variables.len());
        }
        if index < last {
            let _ = writeln!(out, "{}│", indent);
        }
    }
    out
}

fn report_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Validation for profile '{}':", report.profile);
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));
    if report.ok {
        let _ = writeln!(out, "✓ Profile hierarchy is valid");
        let _ = writeln!(out, "✓ Found {} profile(s) in hierarchy", report.chain.len());
        let _ = writeln!(out, "✓ Dependency chain: {}", report.chain.join(" -> "));
    } else {
        let _ = writeln!(out, "✗ Profile hierarchy has errors:");
        for issue in &report.issues {
            let _ = writeln!(out, "  - {}", issue);
        }
    }
    if !report.warnings.is_empty() {
        let _ = writeln!(out, "\nWarnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }
    out
}

#[derive(Debug, Serialize)]
struct ChainView {
    query: String,
    profiles: Vec<NodeView>,
    merge_summary: MergeSummary,
}

#[derive(Debug, Serialize)]
struct NodeView {
    name: String,
    depth: usize,
    path: PathBuf,
    includes: Vec<String>,
    sections: Vec<String>,
    variables: Vec<String>,
    options: super::model::Settings,
}

impl ChainView {
    fn new(chain: &ResolutionChain) -> Self {
        let merged = merge(chain);
        let profiles = chain
            .nodes()
            .iter()
            .map(|node| NodeView {
                name: node.descriptor.name.clone(),
                depth: node.depth,
                path: node.descriptor.path.clone(),
                includes: node.descriptor.includes.clone(),
                sections: node.descriptor.sections.iter().map(|s| s.name.clone()).collect(),
                variables: node.descriptor.variables.keys().cloned().collect(),
                options: node.descriptor.options.clone(),
            })
            .collect();
        Self {
            query: chain.query().to_string(),
            profiles,
            merge_summary: summarize(chain, &merged),
        }
    }
}
