//! Descriptor parser for `tuned.conf` files.
//!
//! The format is line oriented: `[name]` opens a section and every following
//! `key=value` line belongs to it. A line indented deeper than its key line
//! continues the previous value, which is how `script=` carries embedded
//! newlines; blank lines inside such a value are kept. `${var}` references
//! are kept verbatim.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use super::model::{ProfileDescriptor, Section, Settings, parse_flag};
use super::DESCRIPTOR_FILE;
use crate::error::{ProfileError, ProfileResult};

pub const MAIN_SECTION: &str = "main";
pub const VARIABLES_SECTION: &str = "variables";
pub const SCRIPT_SECTION: &str = "script";

const REPLACE_KEY: &str = "replace";
const PRIORITY_KEY: &str = "priority";
const DROP_PREFIX: &str = "drop_";

/// Reads `<profile_dir>/tuned.conf` and parses it. The profile name is the
/// directory's base name.
pub fn parse_profile_dir(profile_dir: &Path, source_root: &Path) -> ProfileResult<ProfileDescriptor> {
    let path = profile_dir.join(DESCRIPTOR_FILE);
    let contents = fs::read_to_string(&path).map_err(|err| ProfileError::io(&path, err))?;
    let name = profile_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_descriptor(&name, source_root, &path, &contents)
}

pub fn parse_descriptor(
    name: &str,
    source_root: &Path,
    path: &Path,
    contents: &str,
) -> ProfileResult<ProfileDescriptor> {
    let raw = read_sections(path, contents)?;
    let mut descriptor = ProfileDescriptor::new(name, source_root, path);
    for section in raw {
        match section.name.as_str() {
            MAIN_SECTION => apply_main(&mut descriptor, section),
            VARIABLES_SECTION => apply_variables(&mut descriptor, section),
            _ => {
                let unit = build_section(path, section, &mut descriptor.warnings);
                if unit.name == SCRIPT_SECTION
                    && let Some(script) = unit.get("script")
                {
                    descriptor.script = script.to_string();
                }
                descriptor.sections.push(unit);
            }
        }
    }
    Ok(descriptor)
}

/// Lenient scan for `summary=` in `[main]`, used for listings where a
/// malformed descriptor should still show up.
pub fn scan_summary(contents: &str) -> Option<String> {
    let mut in_main = false;
    for line in contents.lines().map(str::trim) {
        if let Some(name) = section_header(line) {
            in_main = name == MAIN_SECTION;
        } else if in_main
            && let Some((key, value)) = line.split_once('=')
            && key.trim() == "summary"
        {
            return Some(strip_inline_comment(value.trim()).to_string());
        }
    }
    None
}

struct RawSection {
    name: String,
    entries: Settings,
    lines: IndexMap<String, usize>,
}

fn read_sections(path: &Path, contents: &str) -> ProfileResult<Vec<RawSection>> {
    let mut sections: Vec<RawSection> = Vec::new();
    let mut current: Option<usize> = None;
    let mut last_key: Option<String> = None;
    let mut key_indent = 0;
    let mut pending_blanks = 0;

    for (index, raw_line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();

        // A blank line only ends up in the value if a deeper line follows.
        if line.is_empty() {
            pending_blanks += 1;
            continue;
        }

        let indent = indentation(raw_line);
        if indent > key_indent
            && let (Some(section), Some(key)) = (current, last_key.as_ref())
            && let Some(value) = sections[section].entries.get_mut(key)
        {
            for _ in 0..pending_blanks {
                value.push('\n');
            }
            value.push('\n');
            value.push_str(line);
            pending_blanks = 0;
            continue;
        }
        pending_blanks = 0;

        if line.starts_with('#') {
            continue;
        }

        if let Some(name) = section_header(line) {
            if name.is_empty() {
                return Err(ProfileError::parse(path, line_no, "empty section name"));
            }
            let position = match sections.iter().position(|section| section.name == name) {
                Some(position) => position,
                None => {
                    sections.push(RawSection {
                        name: name.to_string(),
                        entries: Settings::new(),
                        lines: IndexMap::new(),
                    });
                    sections.len() - 1
                }
            };
            current = Some(position);
            last_key = None;
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(ProfileError::parse(
                path,
                line_no,
                format!("expected '[section]' or 'key=value', found '{}'", line),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ProfileError::parse(path, line_no, "empty key"));
        }
        let Some(section) = current else {
            return Err(ProfileError::parse(
                path,
                line_no,
                format!("'{}' appears before any section header", key),
            ));
        };
        let value = strip_inline_comment(value.trim());
        let section = &mut sections[section];
        section.entries.insert(key.to_string(), value.to_string());
        section.lines.insert(key.to_string(), line_no);
        last_key = Some(key.to_string());
        key_indent = indent;
    }

    Ok(sections)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn section_header(line: &str) -> Option<&str> {
    line.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    for (index, byte) in bytes.iter().enumerate() {
        if *byte == b'#' && index > 0 && bytes[index - 1].is_ascii_whitespace() {
            return value[..index].trim_end();
        }
    }
    value
}

fn apply_main(descriptor: &mut ProfileDescriptor, section: RawSection) {
    for (key, value) in section.entries {
        if key == "include" {
            descriptor.includes.extend(split_includes(&value));
            continue;
        }
        if key == "summary" {
            descriptor.summary = Some(value.clone());
        }
        descriptor.options.insert(key, value);
    }
}

fn split_includes(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_variables(descriptor: &mut ProfileDescriptor, section: RawSection) {
    for (key, value) in section.entries {
        if key == REPLACE_KEY {
            descriptor.replace_variables = parse_flag(&value);
        } else {
            descriptor.variables.insert(key, value);
        }
    }
}

/// A `priority=` that is not an integer leaves the priority unset and is
/// recorded in `warnings`.
fn build_section(path: &Path, raw: RawSection, warnings: &mut Vec<String>) -> Section {
    let mut section = Section::new(raw.name);
    for (key, value) in raw.entries {
        if key == REPLACE_KEY {
            section.replace = parse_flag(&value);
        } else if key == PRIORITY_KEY {
            match value.trim().parse::<i64>() {
                Ok(priority) => section.priority = Some(priority),
                Err(_) => {
                    let line = raw.lines.get(&key).copied().unwrap_or_default();
                    let warning = format!(
                        "{}:{}: priority of [{}] is not an integer ('{}'); treated as unset",
                        path.display(),
                        line,
                        section.name,
                        value
                    );
                    log::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        } else if let Some(dropped) = key.strip_prefix(DROP_PREFIX)
            && !dropped.is_empty()
        {
            section.drops.push(dropped.to_string());
        } else {
            section.settings.insert(key, value);
        }
    }
    section
}
