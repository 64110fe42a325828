//! Folds a resolution chain, root first, into one [`MergedProfile`].

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use serde::Serialize;

use super::model::{MergedProfile, ProfileDescriptor, ResolutionChain, Section, Settings};
use super::parser::SCRIPT_SECTION;

pub fn merge(chain: &ResolutionChain) -> MergedProfile {
    let ancestry = ancestry(chain);
    let mut options = Settings::new();
    let mut variables = Settings::new();
    let mut sections: IndexMap<String, SectionState> = IndexMap::new();
    let mut scripts: Vec<&str> = Vec::new();

    for (index, node) in chain.nodes().iter().enumerate() {
        let descriptor = &node.descriptor;
        for (key, value) in &descriptor.options {
            options.insert(key.clone(), value.clone());
        }
        merge_variables(&mut variables, descriptor);
        for section in &descriptor.sections {
            overlay_section(&mut sections, section, index, &ancestry[index], descriptor);
        }
        if !descriptor.script.is_empty() {
            scripts.push(&descriptor.script);
        }
    }

    MergedProfile {
        name: chain.query().to_string(),
        options,
        variables,
        sections: sections
            .into_iter()
            .map(|(name, state)| (name, state.section))
            .collect(),
        script: scripts.join("\n"),
        source_chain: chain.names(),
    }
}

fn merge_variables(variables: &mut Settings, descriptor: &ProfileDescriptor) {
    if descriptor.replace_variables {
        variables.clear();
    }
    for (key, value) in &descriptor.variables {
        variables.insert(key.clone(), value.clone());
    }
}

/// Where a merged setting came from: chain position and that section's priority.
#[derive(Clone, Copy)]
struct Origin {
    position: usize,
    priority: Option<i64>,
}

struct SectionState {
    section: Section,
    origins: HashMap<String, Origin>,
}

impl SectionState {
    fn from_section(section: &Section, position: usize) -> Self {
        let origin = Origin {
            position,
            priority: section.priority,
        };
        Self {
            section: section.clone(),
            origins: section
                .settings
                .keys()
                .map(|key| (key.clone(), origin))
                .collect(),
        }
    }
}

fn overlay_section(
    sections: &mut IndexMap<String, SectionState>,
    section: &Section,
    position: usize,
    ancestors: &HashSet<usize>,
    descriptor: &ProfileDescriptor,
) {
    let Some(state) = sections.get_mut(&section.name).filter(|_| !section.replace) else {
        sections.insert(section.name.clone(), SectionState::from_section(section, position));
        return;
    };

    for dropped in &section.drops {
        state.section.settings.shift_remove(dropped);
        state.origins.remove(dropped);
        if !state.section.drops.contains(dropped) {
            state.section.drops.push(dropped.clone());
        }
    }

    let incoming = Origin {
        position,
        priority: section.priority,
    };
    for (key, value) in &section.settings {
        if section.name == SCRIPT_SECTION && key == "script" {
            let script = state.section.settings.entry(key.clone()).or_default();
            if !script.is_empty() {
                script.push('\n');
            }
            script.push_str(value);
            state.origins.insert(key.clone(), incoming);
            continue;
        }

        if let Some(existing) = state.origins.get(key)
            && !ancestors.contains(&existing.position)
            && let (Some(current), Some(challenger)) = (existing.priority, incoming.priority)
            && current > challenger
        {
            log::debug!(
                "[{}] {} keeps priority {} value over '{}' (priority {})",
                section.name,
                key,
                current,
                descriptor.name,
                challenger
            );
            continue;
        }
        state.section.settings.insert(key.clone(), value.clone());
        state.origins.insert(key.clone(), incoming);
    }

    if section.priority.is_some() {
        state.section.priority = section.priority;
    }
}

/// For every chain position, the positions of all its transitive ancestors.
fn ancestry(chain: &ResolutionChain) -> Vec<HashSet<usize>> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut ancestry: Vec<HashSet<usize>> = Vec::with_capacity(chain.len());
    for (index, node) in chain.nodes().iter().enumerate() {
        let mut ancestors = HashSet::new();
        for parent in &node.descriptor.includes {
            if let Some(&parent_index) = positions.get(parent.as_str()) {
                ancestors.insert(parent_index);
                ancestors.extend(ancestry[parent_index].iter().copied());
            }
        }
        positions.insert(node.name(), index);
        ancestry.push(ancestors);
    }
    ancestry
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    pub profiles: Vec<String>,
    pub total_input_sections: usize,
    pub final_sections: Vec<String>,
    pub final_variables: Vec<String>,
    /// Section names defined by more than one profile in the chain.
    pub conflicts_resolved: usize,
}

pub fn summarize(chain: &ResolutionChain, merged: &MergedProfile) -> MergeSummary {
    let total_input_sections: usize = chain
        .nodes()
        .iter()
        .map(|node| node.descriptor.sections.len())
        .sum();
    let distinct: HashSet<&str> = chain
        .nodes()
        .iter()
        .flat_map(|node| node.descriptor.sections.iter().map(|section| section.name.as_str()))
        .collect();
    MergeSummary {
        profiles: chain.names(),
        total_input_sections,
        final_sections: merged.sections.keys().cloned().collect(),
        final_variables: merged.variables.keys().cloned().collect(),
        conflicts_resolved: total_input_sections - distinct.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::model::ResolutionNode;

    fn descriptor(name: &str, includes: &[&str], sections: Vec<Section>) -> ProfileDescriptor {
        let mut descriptor = ProfileDescriptor::new(name, "/profiles", format!("/profiles/{name}/tuned.conf"));
        descriptor.includes = includes.iter().map(|s| s.to_string()).collect();
        descriptor.sections = sections;
        descriptor
    }

    fn section(name: &str, settings: &[(&str, &str)]) -> Section {
        let mut section = Section::new(name);
        for (key, value) in settings {
            section.settings.insert(key.to_string(), value.to_string());
        }
        section
    }

    fn chain(query: &str, descriptors: Vec<ProfileDescriptor>) -> ResolutionChain {
        let nodes = descriptors
            .into_iter()
            .map(|descriptor| ResolutionNode { descriptor, depth: 0 })
            .collect();
        ResolutionChain::new(query.to_string(), nodes)
    }

    #[test]
    fn single_profile_merges_to_itself() {
        let mut only = descriptor("solo", &[], vec![section("vm", &[("swappiness", "5")])]);
        only.variables.insert("cores".into(), "1-3".into());
        only.script = "#!/bin/sh\necho hi".into();
        let mut script_section = section("script", &[("script", "#!/bin/sh\necho hi")]);
        script_section.priority = Some(3);
        only.sections.push(script_section);

        let merged = merge(&chain("solo", vec![only.clone()]));

        assert_eq!(merged.variables, only.variables);
        assert_eq!(merged.script, only.script);
        assert_eq!(merged.sections.values().cloned().collect::<Vec<_>>(), only.sections);
        assert_eq!(merged.source_chain, vec!["solo"]);
    }

    #[test]
    fn descendant_overrides_ancestor() {
        let merged = merge(&chain(
            "b",
            vec![
                descriptor("a", &[], vec![section("vm", &[("swappiness", "10"), ("dirty_ratio", "40")])]),
                descriptor("b", &["a"], vec![section("vm", &[("swappiness", "1")])]),
            ],
        ));
        assert_eq!(merged.value("vm", "swappiness"), Some("1"));
        assert_eq!(merged.value("vm", "dirty_ratio"), Some("40"));
    }

    #[test]
    fn replace_discards_inherited_keys() {
        let mut replacing = section("vm", &[("transparent_hugepages", "never")]);
        replacing.replace = true;
        let merged = merge(&chain(
            "b",
            vec![
                descriptor("a", &[], vec![section("vm", &[("swappiness", "10")])]),
                descriptor("b", &["a"], vec![replacing]),
            ],
        ));
        let vm = merged.section("vm").expect("vm section");
        assert_eq!(vm.get("swappiness"), None);
        assert_eq!(vm.get("transparent_hugepages"), Some("never"));
    }

    #[test]
    fn ancestor_priority_never_beats_descendant() {
        let mut parent = section("cpu", &[("governor", "powersave")]);
        parent.priority = Some(100);
        let mut child = section("cpu", &[("governor", "performance")]);
        child.priority = Some(1);
        let merged = merge(&chain(
            "b",
            vec![descriptor("a", &[], vec![parent]), descriptor("b", &["a"], vec![child])],
        ));
        assert_eq!(merged.value("cpu", "governor"), Some("performance"));
    }

    fn diamond(left_priority: Option<i64>, right_priority: Option<i64>) -> MergedProfile {
        let mut left = section("cpu", &[("governor", "left")]);
        left.priority = left_priority;
        let mut right = section("cpu", &[("governor", "right")]);
        right.priority = right_priority;
        merge(&chain(
            "d",
            vec![
                descriptor("a", &[], vec![section("cpu", &[("governor", "base"), ("min_perf_pct", "50")])]),
                descriptor("b", &["a"], vec![left]),
                descriptor("c", &["a"], vec![right]),
                descriptor("d", &["b", "c"], vec![]),
            ],
        ))
    }

    #[test]
    fn diamond_siblings_tie_break_on_priority() {
        let merged = diamond(Some(20), Some(10));
        assert_eq!(merged.value("cpu", "governor"), Some("left"));
        assert_eq!(merged.value("cpu", "min_perf_pct"), Some("50"));
    }

    #[test]
    fn diamond_siblings_with_equal_or_unset_priority_take_later() {
        assert_eq!(diamond(Some(5), Some(5)).value("cpu", "governor"), Some("right"));
        assert_eq!(diamond(None, None).value("cpu", "governor"), Some("right"));
        assert_eq!(diamond(Some(50), None).value("cpu", "governor"), Some("right"));
    }

    #[test]
    fn variables_replace_discards_inherited() {
        let mut base = descriptor("a", &[], vec![]);
        base.variables.insert("isolated_cores".into(), "1".into());
        base.variables.insert("keep".into(), "x".into());
        let mut middle = descriptor("b", &["a"], vec![]);
        middle.variables.insert("isolated_cores".into(), "2-3".into());
        let mut leaf = descriptor("c", &["b"], vec![]);
        leaf.replace_variables = true;
        leaf.variables.insert("fresh".into(), "y".into());

        let overlaid = merge(&chain("b", vec![base.clone(), middle.clone()]));
        assert_eq!(overlaid.variables.get("isolated_cores").map(String::as_str), Some("2-3"));
        assert_eq!(overlaid.variables.get("keep").map(String::as_str), Some("x"));

        let replaced = merge(&chain("c", vec![base, middle, leaf]));
        assert_eq!(replaced.variables.len(), 1);
        assert_eq!(replaced.variables.get("fresh").map(String::as_str), Some("y"));
    }

    #[test]
    fn scripts_concatenate_in_chain_order() {
        let mut base = descriptor("a", &[], vec![section("script", &[("script", "#!/bin/sh\necho a")])]);
        base.script = "#!/bin/sh\necho a".into();
        let mut leaf = descriptor("b", &["a"], vec![section("script", &[("script", "echo b")])]);
        leaf.script = "echo b".into();
        let silent = descriptor("c", &["b"], vec![]);

        let merged = merge(&chain("c", vec![base, leaf, silent]));

        assert_eq!(merged.script, "#!/bin/sh\necho a\necho b");
        assert_eq!(merged.value("script", "script"), Some("#!/bin/sh\necho a\necho b"));
    }

    #[test]
    fn drop_removes_inherited_key() {
        let mut child = section("cpu", &[("governor", "performance")]);
        child.drops.push("energy_perf_bias".into());
        let merged = merge(&chain(
            "b",
            vec![
                descriptor("a", &[], vec![section("cpu", &[("energy_perf_bias", "normal"), ("governor", "ondemand")])]),
                descriptor("b", &["a"], vec![child]),
            ],
        ));
        let cpu = merged.section("cpu").expect("cpu section");
        assert_eq!(cpu.get("energy_perf_bias"), None);
        assert_eq!(cpu.get("governor"), Some("performance"));
    }

    #[test]
    fn main_options_overlay_later_wins() {
        let mut base = descriptor("a", &[], vec![]);
        base.options.insert("summary".into(), "Base".into());
        base.options.insert("dynamic_tuning".into(), "0".into());
        let mut leaf = descriptor("b", &["a"], vec![]);
        leaf.options.insert("summary".into(), "Leaf".into());
        let merged = merge(&chain("b", vec![base, leaf]));
        assert_eq!(merged.options.get("summary").map(String::as_str), Some("Leaf"));
        assert_eq!(merged.options.get("dynamic_tuning").map(String::as_str), Some("0"));
    }

    #[test]
    fn summary_counts_repeated_sections() {
        let resolved = chain(
            "b",
            vec![
                descriptor("a", &[], vec![section("cpu", &[]), section("vm", &[])]),
                descriptor("b", &["a"], vec![section("vm", &[]), section("disk", &[])]),
            ],
        );
        let merged = merge(&resolved);
        let summary = summarize(&resolved, &merged);
        assert_eq!(summary.total_input_sections, 4);
        assert_eq!(summary.conflicts_resolved, 1);
        assert_eq!(summary.final_sections, vec!["cpu", "vm", "disk"]);
    }
}
