//! Include hierarchy resolution.
//!
//! Profiles reference their parents by name only; the walk looks each name up
//! in a [`Discovery`] snapshot, so the include graph never holds references
//! between descriptors and a cycle is simply a name already on the current path.

use std::collections::{HashMap, HashSet};

use super::model::{ProfileDescriptor, ResolutionChain, ResolutionNode};
use super::parser::parse_profile_dir;
use super::source::Discovery;
use crate::error::{ProfileError, ProfileResult};

pub struct Resolver<'a> {
    discovery: &'a Discovery,
}

impl<'a> Resolver<'a> {
    pub fn new(discovery: &'a Discovery) -> Self {
        Self { discovery }
    }

    /// Builds the root-first chain for `name`, failing on the first missing
    /// profile, include cycle, or unreadable descriptor.
    pub fn resolve(&self, name: &str) -> ProfileResult<ResolutionChain> {
        let mut walk = Walk::new(self.discovery);
        let mut fail_fast = |issue: ProfileError| -> ProfileResult<()> { Err(issue) };
        walk.visit(name, None, &mut fail_fast)?;
        Ok(walk.finish(name))
    }

    /// Walks the whole graph, reporting every broken edge to `issues` instead
    /// of stopping. The returned chain holds whatever resolved cleanly.
    pub fn resolve_collecting(&self, name: &str, issues: &mut Vec<ProfileError>) -> ResolutionChain {
        let mut walk = Walk::new(self.discovery);
        let mut collect = |issue: ProfileError| -> ProfileResult<()> {
            issues.push(issue);
            Ok(())
        };
        // The collector never returns an error, so the walk always completes.
        let _ = walk.visit(name, None, &mut collect);
        walk.finish(name)
    }
}

type IssueHandler<'h> = dyn FnMut(ProfileError) -> ProfileResult<()> + 'h;

struct Walk<'a> {
    discovery: &'a Discovery,
    path: Vec<String>,
    done: HashSet<String>,
    unusable: HashSet<String>,
    chain: Vec<ProfileDescriptor>,
}

impl<'a> Walk<'a> {
    fn new(discovery: &'a Discovery) -> Self {
        Self {
            discovery,
            path: Vec::new(),
            done: HashSet::new(),
            unusable: HashSet::new(),
            chain: Vec::new(),
        }
    }

    fn visit(&mut self, name: &str, parent: Option<&str>, on_issue: &mut IssueHandler<'_>) -> ProfileResult<()> {
        if let Some(start) = self.path.iter().position(|entry| entry == name) {
            let mut cycle = self.path[start..].to_vec();
            cycle.push(name.to_string());
            return on_issue(ProfileError::CircularDependency { cycle });
        }
        if self.done.contains(name) || self.unusable.contains(name) {
            return Ok(());
        }

        let Some(entry) = self.discovery.get(name) else {
            return on_issue(ProfileError::MissingProfile {
                name: name.to_string(),
                referenced_by: parent.map(str::to_string),
                searched: self.discovery.roots.clone(),
            });
        };

        let descriptor = match parse_profile_dir(&entry.path, &entry.root) {
            Ok(descriptor) => descriptor,
            Err(err) => {
                self.unusable.insert(name.to_string());
                return on_issue(err);
            }
        };

        self.path.push(name.to_string());
        for include in &descriptor.includes {
            self.visit(include, Some(name), on_issue)?;
        }
        self.path.pop();

        log::debug!("resolved '{}' at chain position {}", name, self.chain.len());
        self.done.insert(name.to_string());
        self.chain.push(descriptor);
        Ok(())
    }

    fn finish(self, query: &str) -> ResolutionChain {
        let mut depths: HashMap<String, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.chain.len());
        for descriptor in self.chain {
            let depth = descriptor
                .includes
                .iter()
                .filter_map(|parent| depths.get(parent))
                .map(|depth| depth + 1)
                .max()
                .unwrap_or(0);
            depths.insert(descriptor.name.clone(), depth);
            nodes.push(ResolutionNode { descriptor, depth });
        }
        ResolutionChain::new(query.to_string(), nodes)
    }
}
