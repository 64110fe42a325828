mod format;
mod manager;
mod merge;
mod model;
mod parser;
mod resolver;
mod source;
mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::cli::{HierarchyArgs, ListArgs, ListFormat, ShowArgs, ValidateArgs};
use crate::config::ViewerConfig;
use crate::error::ProfileResult;

pub use format::{OutputKind, Subject, render};
pub use manager::ProfileManager;
pub use merge::{MergeSummary, merge, summarize};
pub use model::{
    MergedProfile, ProfileDescriptor, ProfileEntry, ProfileOrigin, ResolutionChain, ResolutionNode, Section,
    Settings,
};
pub use parser::{parse_descriptor, parse_profile_dir};
pub use resolver::Resolver;
pub use source::{
    Discovery, POD_ROOTS, ProfileDirectoryProvider, STANDARD_ROOTS, SearchRoots, SkippedRoot, StandardRoots,
    active_profile, discover, in_pod,
};
pub use validate::{ValidationIssue, ValidationReport};

/// File holding a profile's descriptor inside its directory.
pub const DESCRIPTOR_FILE: &str = "tuned.conf";

pub fn resolve(name: &str, search_roots: &[PathBuf]) -> ProfileResult<ResolutionChain> {
    let discovery = discover(search_roots);
    Resolver::new(&discovery).resolve(name)
}

pub fn validate(name: &str, search_roots: &[PathBuf]) -> ValidationReport {
    let discovery = discover(search_roots);
    validate::validate_in(&discovery, name)
}

/// Renders `subject` as `kind` (`ini`, `json`, `summary` or `yaml`).
pub fn format<'a>(subject: impl Into<Subject<'a>>, kind: &str) -> ProfileResult<String> {
    let kind: OutputKind = kind.parse()?;
    render(subject.into(), kind)
}

pub fn handle_list(args: ListArgs, manager: &ProfileManager, config: &ViewerConfig) -> Result<()> {
    let profiles = manager.list();
    match args.format {
        ListFormat::Text => {
            if profiles.is_empty() {
                println!("No tuned profiles found.");
                return Ok(());
            }
            let active = active_profile(&config.active_profile_files);
            println!("Available tuned profiles ({} found):", profiles.len());
            println!("{}", "-".repeat(50));
            for entry in &profiles {
                let marker = if active.as_deref() == Some(entry.name.as_str()) {
                    " *"
                } else {
                    "  "
                };
                println!("{} {:<25} [{}]", marker, entry.name, entry.origin);
                println!(
                    "    {}",
                    entry.summary.as_deref().unwrap_or("No description available")
                );
            }
            if let Some(active) = active {
                println!("\n* Currently active: {}", active);
            }
        }
        ListFormat::Json => println!("{}", serde_json::to_string_pretty(&profiles)?),
        ListFormat::Yaml => println!("{}", serde_yaml::to_string(&profiles)?),
    }
    Ok(())
}

pub fn handle_show(args: ShowArgs, manager: &ProfileManager, config: &ViewerConfig) -> Result<()> {
    let kind = args.format.unwrap_or(config.default_format);
    let text = manager
        .show(&args.name, kind)
        .with_context(|| format!("failed to merge profile '{}'", args.name))?;
    print!("{}", text);
    Ok(())
}

pub fn handle_hierarchy(args: HierarchyArgs, manager: &ProfileManager) -> Result<()> {
    let text = manager
        .hierarchy(&args.name, args.format)
        .with_context(|| format!("failed to resolve hierarchy of '{}'", args.name))?;
    print!("{}", text);
    Ok(())
}

/// Prints the report and returns whether the hierarchy is healthy.
pub fn handle_validate(args: ValidateArgs, manager: &ProfileManager) -> Result<bool> {
    let report = manager.validate(&args.name);
    print!("{}", render(Subject::Report(&report), args.format)?);
    Ok(report.ok)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;

    fn shipped_profiles() -> Vec<PathBuf> {
        vec![Path::new(env!("CARGO_MANIFEST_DIR")).join("profiles")]
    }

    fn write_profile(root: &Path, name: &str, contents: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create profile dir");
        fs::write(dir.join(DESCRIPTOR_FILE), contents).expect("write descriptor");
    }

    #[test]
    fn three_tier_example_merges_innermost_override() {
        let chain = resolve("realtime-compute", &shipped_profiles()).expect("resolve example");
        let merged = merge(&chain);

        assert_eq!(merged.value("cpu", "governor"), Some("performance"));
        assert_eq!(merged.value("vm", "swappiness"), Some("0"));
        assert_eq!(
            merged.source_chain,
            vec!["base-performance", "high-performance", "realtime-compute"]
        );
        assert_eq!(merged.name, "realtime-compute");
    }

    #[test]
    fn shipped_profiles_validate_cleanly() {
        let report = validate("realtime-compute", &shipped_profiles());
        assert!(report.ok, "{:?}", report.issues);
    }

    #[test]
    fn profile_without_includes_merges_to_its_own_content() {
        let root = tempfile::tempdir().expect("tempdir");
        write_profile(
            root.path(),
            "solo",
            "[variables]\nnic=eth0\n[net]\ndevices=${nic}\n[script]\nscript=#!/bin/sh\n    true\n",
        );
        let roots = vec![root.path().to_path_buf()];
        let descriptor = parse_profile_dir(&root.path().join("solo"), root.path()).expect("parse");

        let merged = merge(&resolve("solo", &roots).expect("resolve"));

        assert_eq!(merged.variables, descriptor.variables);
        assert_eq!(merged.script, descriptor.script);
        assert_eq!(merged.sections.values().cloned().collect::<Vec<_>>(), descriptor.sections);
        assert_eq!(merged.value("net", "devices"), Some("${nic}"));
    }

    #[test]
    fn user_root_shadows_system_root_end_to_end() {
        let user = tempfile::tempdir().expect("tempdir");
        let system = tempfile::tempdir().expect("tempdir");
        write_profile(system.path(), "base", "[vm]\nswappiness=60\n");
        write_profile(user.path(), "base", "[vm]\nswappiness=5\n");
        write_profile(system.path(), "leaf", "[main]\ninclude=base\n");
        let roots = vec![user.path().to_path_buf(), system.path().to_path_buf()];

        let discovery = discover(&roots);
        assert_eq!(discovery.get("base").map(|e| e.path.clone()), Some(user.path().join("base")));

        let merged = merge(&resolve("leaf", &roots).expect("resolve"));
        assert_eq!(merged.value("vm", "swappiness"), Some("5"));
    }

    #[test]
    fn format_rejects_unknown_kind() {
        let chain = resolve("base-performance", &shipped_profiles()).expect("resolve");
        let merged = merge(&chain);
        assert!(format(&merged, "ini").is_ok());
        assert!(format(&chain, "summary").is_ok());
        assert!(matches!(
            format(&merged, "xml"),
            Err(crate::error::ProfileError::UnknownFormat(_))
        ));
    }

    #[test]
    fn manager_answers_queries_from_one_snapshot() {
        let manager = ProfileManager::new(&SearchRoots::new(shipped_profiles()));
        let names: Vec<&str> = manager.list().iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["base-performance", "high-performance", "realtime-compute"]);
        assert!(manager.show("high-performance", OutputKind::Ini).is_ok());
        assert!(manager.hierarchy("ghost", OutputKind::Summary).is_err());
        assert!(!manager.validate("ghost").ok);
    }

    #[test]
    fn list_reads_active_marker_from_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("active_profile");
        fs::write(&marker, "high-performance\n").expect("write marker");
        let config = ViewerConfig {
            active_profile_files: vec![dir.path().join("missing"), marker],
            ..ViewerConfig::default()
        };
        let manager = ProfileManager::new(&SearchRoots::new(shipped_profiles()));

        assert_eq!(
            active_profile(&config.active_profile_files).as_deref(),
            Some("high-performance")
        );
        for format in [ListFormat::Text, ListFormat::Json] {
            handle_list(ListArgs { format }, &manager, &config).expect("list profiles");
        }
    }
}
