use std::path::PathBuf;

use super::format::{OutputKind, Subject, render};
use super::merge::merge;
use super::model::{MergedProfile, ProfileEntry, ResolutionChain};
use super::resolver::Resolver;
use super::source::{Discovery, ProfileDirectoryProvider, discover};
use super::validate::{ValidationReport, validate_in};
use crate::error::ProfileResult;

/// Owns one discovery snapshot and answers every query against it.
pub struct ProfileManager {
    discovery: Discovery,
}

impl ProfileManager {
    pub fn new(provider: &dyn ProfileDirectoryProvider) -> Self {
        Self::from_roots(&provider.search_roots())
    }

    pub fn from_roots(roots: &[PathBuf]) -> Self {
        Self {
            discovery: discover(roots),
        }
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.discovery.roots
    }

    pub fn list(&self) -> Vec<&ProfileEntry> {
        self.discovery.profiles.values().collect()
    }

    pub fn resolve(&self, name: &str) -> ProfileResult<ResolutionChain> {
        Resolver::new(&self.discovery).resolve(name)
    }

    pub fn merged(&self, name: &str) -> ProfileResult<MergedProfile> {
        let chain = self.resolve(name)?;
        Ok(merge(&chain))
    }

    pub fn validate(&self, name: &str) -> ValidationReport {
        validate_in(&self.discovery, name)
    }

    pub fn show(&self, name: &str, kind: OutputKind) -> ProfileResult<String> {
        let merged = self.merged(name)?;
        render(Subject::Merged(&merged), kind)
    }

    pub fn hierarchy(&self, name: &str, kind: OutputKind) -> ProfileResult<String> {
        let chain = self.resolve(name)?;
        render(Subject::Chain(&chain), kind)
    }
}
