//! Partitioning indexed file paths into per-gem groups.
//!
//! Installed gems live under a `gems/<name>-<version>/` directory; any path
//! containing that component belongs to the package it names. Everything
//! else is project code. Each group carries the pinned versions of the
//! package's transitive dependencies straight from the lockfile, so the
//! caller can fingerprint it without touching the lockfile again.

use std::collections::BTreeMap;

use crate::lockfile::Lockfile;

/// The files of one installed package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFiles {
    pub name: String,
    /// Resolved version: the lockfile's when pinned, otherwise the one
    /// embedded in the install directory.
    pub version: String,
    /// Pinned versions of every transitive dependency, excluding the
    /// package itself. Empty when the lockfile does not know the package.
    pub dependency_versions: BTreeMap<String, String>,
    pub files: Vec<String>,
}

/// A full partition of indexed paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Gem packages, sorted by name.
    pub packages: Vec<PackageFiles>,
    /// Paths with no `gems/<name>-<version>` component.
    pub project_files: Vec<String>,
}

/// Split paths into per-package groups and project files.
pub fn partition<I, S>(lock: &Lockfile, paths: I) -> Partition
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut by_package: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    let mut project_files = Vec::new();

    for path in paths {
        let path = path.into();
        match gem_component(&path) {
            Some((name, version)) => {
                by_package.entry((name, version)).or_default().push(path);
            }
            None => project_files.push(path),
        }
    }

    let packages = by_package
        .into_iter()
        .map(|((name, dir_version), mut files)| {
            files.sort();
            let version = lock
                .version_of(&name)
                .map(str::to_string)
                .unwrap_or(dir_version);
            let mut dependency_versions = lock.transitive_versions(&name);
            dependency_versions.remove(&name);
            PackageFiles { name, version, dependency_versions, files }
        })
        .collect();
    project_files.sort();
    Partition { packages, project_files }
}

/// The `(name, version)` of the `gems/<name>-<version>` component in a
/// path, if present.
fn gem_component(path: &str) -> Option<(String, String)> {
    let mut parts = path.split('/').peekable();
    while let Some(part) = parts.next() {
        if part != "gems" {
            continue;
        }
        if let Some(dir) = parts.peek() {
            if let Some((name, version)) = split_install_dir(dir) {
                return Some((name.to_string(), version.to_string()));
            }
        }
    }
    None
}

/// Split `"rack-attack-6.7.0"` into `("rack-attack", "6.7.0")`.
///
/// Gem names may themselves contain hyphens, so the split point is the last
/// hyphen followed by a digit.
fn split_install_dir(dir: &str) -> Option<(&str, &str)> {
    let mut split = None;
    for (i, _) in dir.match_indices('-') {
        if dir[i + 1..].chars().next().is_some_and(|c| c.is_ascii_digit()) {
            split = Some(i);
        }
    }
    let i = split?;
    let (name, version) = (&dir[..i], &dir[i + 1..]);
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}
