use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use serde::Serialize;

use super::DESCRIPTOR_FILE;
use super::model::{ProfileEntry, ProfileOrigin};
use super::parser::scan_summary;

pub const STANDARD_ROOTS: [&str; 3] = [
    "/etc/tuned/profiles",
    "/usr/lib/tuned/profiles",
    "/run/tuned/profiles",
];

pub const POD_ROOTS: [&str; 4] = [
    "/host/etc/tuned/profiles",
    "/host/usr/lib/tuned/profiles",
    "/etc/tuned/profiles",
    "/usr/lib/tuned/profiles",
];

const LOCAL_PROFILES_DIR: &str = "./profiles";
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Yields the ordered local directories profiles are read from, highest
/// precedence first. Remote sources stage their profiles locally and then
/// hand those directories over through this trait.
pub trait ProfileDirectoryProvider {
    fn search_roots(&self) -> Vec<PathBuf>;
}

/// An explicit, caller-ordered list of search roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRoots {
    roots: Vec<PathBuf>,
}

impl SearchRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }
}

impl ProfileDirectoryProvider for SearchRoots {
    fn search_roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

/// The daemon's conventional roots, switched to host mounts inside a pod.
#[derive(Debug, Clone, Copy)]
pub struct StandardRoots {
    pub detect_pod: bool,
    pub include_local: bool,
}

impl StandardRoots {
    pub fn new(detect_pod: bool, include_local: bool) -> Self {
        Self {
            detect_pod,
            include_local,
        }
    }
}

impl ProfileDirectoryProvider for StandardRoots {
    fn search_roots(&self) -> Vec<PathBuf> {
        let base: &[&str] = if self.detect_pod && in_pod() {
            &POD_ROOTS
        } else {
            &STANDARD_ROOTS
        };
        let mut roots: Vec<PathBuf> = base.iter().map(PathBuf::from).collect();
        if self.include_local && Path::new(LOCAL_PROFILES_DIR).is_dir() {
            roots.insert(0, PathBuf::from(LOCAL_PROFILES_DIR));
        }
        roots
    }
}

pub fn in_pod() -> bool {
    Path::new(SERVICE_ACCOUNT_DIR).exists()
        || env::var_os("KUBERNETES_SERVICE_HOST").is_some()
        || env::var_os("NODE_NAME").is_some()
        || Path::new("/host/etc").exists()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRoot {
    pub root: PathBuf,
    pub reason: String,
}

/// Result of scanning the search roots. Never an error: unusable roots are
/// recorded in `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Discovery {
    pub roots: Vec<PathBuf>,
    pub profiles: BTreeMap<String, ProfileEntry>,
    pub skipped: Vec<SkippedRoot>,
}

impl Discovery {
    pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
        self.profiles.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// Maps every profile name to the first root (in the given order) holding it.
pub fn discover(roots: &[PathBuf]) -> Discovery {
    let mut discovery = Discovery {
        roots: roots.to_vec(),
        ..Discovery::default()
    };

    for root in roots {
        if let Err(reason) = scan_root(root, &mut discovery.profiles) {
            log::warn!("skipping profile directory {:?}: {}", root, reason);
            discovery.skipped.push(SkippedRoot {
                root: root.clone(),
                reason,
            });
        }
    }

    log::debug!(
        "discovered {} profiles across {} roots",
        discovery.profiles.len(),
        roots.len()
    );
    discovery
}

fn scan_root(root: &Path, profiles: &mut BTreeMap<String, ProfileEntry>) -> Result<(), String> {
    fs::read_dir(root).map_err(|err| err.to_string())?;
    let root_str = root
        .to_str()
        .ok_or_else(|| "path is not valid UTF-8".to_string())?;
    let pattern = format!("{}/*/{}", Pattern::escape(root_str), DESCRIPTOR_FILE);

    for entry in glob(&pattern).map_err(|err| err.to_string())? {
        let descriptor = match entry {
            Ok(path) => path,
            Err(err) => {
                log::debug!("unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };
        if !descriptor.is_file() {
            continue;
        }
        let Some(profile_dir) = descriptor.parent() else {
            continue;
        };
        let Some(name) = profile_dir.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if profiles.contains_key(name) {
            log::debug!("profile '{}' under {:?} is shadowed by an earlier root", name, root);
            continue;
        }
        let summary = match fs::read_to_string(&descriptor) {
            Ok(contents) => scan_summary(&contents),
            Err(err) => {
                log::debug!("failed to read summary from {:?}: {}", descriptor, err);
                None
            }
        };
        profiles.insert(
            name.to_string(),
            ProfileEntry {
                name: name.to_string(),
                path: profile_dir.to_path_buf(),
                root: root.to_path_buf(),
                origin: ProfileOrigin::from_root(root),
                summary,
            },
        );
    }
    Ok(())
}

/// Name of the active profile from the first readable marker file.
pub fn active_profile(candidates: &[PathBuf]) -> Option<String> {
    candidates.iter().find_map(|path| {
        fs::read_to_string(path)
            .ok()
            .map(|contents| contents.trim().to_string())
            .filter(|name| !name.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_profile(root: &Path, name: &str, contents: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).expect("create profile dir");
        fs::write(dir.join(DESCRIPTOR_FILE), contents).expect("write descriptor");
    }

    #[test]
    fn earlier_root_shadows_later_one() {
        let user = tempfile::tempdir().expect("tempdir");
        let system = tempfile::tempdir().expect("tempdir");
        write_profile(user.path(), "balanced", "[main]\nsummary=User copy\n");
        write_profile(system.path(), "balanced", "[main]\nsummary=System copy\n");
        write_profile(system.path(), "powersave", "[main]\nsummary=Save power\n");

        let discovery = discover(&[user.path().to_path_buf(), system.path().to_path_buf()]);

        let balanced = discovery.get("balanced").expect("balanced discovered");
        assert_eq!(balanced.path, user.path().join("balanced"));
        assert_eq!(balanced.root, user.path());
        assert_eq!(balanced.summary.as_deref(), Some("User copy"));
        assert_eq!(
            discovery.get("powersave").map(|entry| entry.root.clone()),
            Some(system.path().to_path_buf())
        );
        assert_eq!(discovery.names().collect::<Vec<_>>(), vec!["balanced", "powersave"]);
    }

    #[test]
    fn missing_roots_are_skipped_not_fatal() {
        let present = tempfile::tempdir().expect("tempdir");
        write_profile(present.path(), "virtual-guest", "[main]\n");
        let missing = present.path().join("does-not-exist");

        let discovery = discover(&[missing.clone(), present.path().to_path_buf()]);

        assert_eq!(discovery.skipped.len(), 1);
        assert_eq!(discovery.skipped[0].root, missing);
        assert!(discovery.get("virtual-guest").is_some());
        assert_eq!(discovery.get("virtual-guest").and_then(|e| e.summary.clone()), None);
    }

    #[test]
    fn directories_without_descriptor_are_ignored() {
        let root = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(root.path().join("empty")).expect("mkdir");
        let discovery = discover(&[root.path().to_path_buf()]);
        assert!(discovery.is_empty());
    }

    #[test]
    fn active_profile_uses_first_readable_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let marker = dir.path().join("active_profile");
        fs::write(&marker, "throughput-performance\n").expect("write marker");
        let candidates = vec![dir.path().join("missing"), marker];
        assert_eq!(active_profile(&candidates).as_deref(), Some("throughput-performance"));
    }

    #[test]
    fn explicit_roots_keep_caller_order() {
        let roots = SearchRoots::new(["/b", "/a"]);
        assert_eq!(roots.search_roots(), vec![PathBuf::from("/b"), PathBuf::from("/a")]);
    }
}
