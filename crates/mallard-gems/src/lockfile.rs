//! Gemfile.lock parsing.
//!
//! Only the `GEM` section's `specs:` block matters to the engine: it names
//! every resolved package, its exact version, and its direct dependencies.
//! The parser is deliberately tolerant -- unknown sections, platform lines,
//! and malformed entries are skipped rather than rejected, because a
//! lockfile written by a newer tool must not take the whole cache down.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// A resolved package from the lockfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedGem {
    /// Exact resolved version, e.g. `"7.1.2"`.
    pub version: String,
    /// Direct dependency names (constraints are dropped; the lockfile
    /// already pins every transitive version).
    pub dependencies: Vec<String>,
}

/// The dependency graph a Gemfile.lock describes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lockfile {
    /// Packages by name. `BTreeMap` keeps iteration deterministic.
    pub packages: BTreeMap<String, LockedGem>,
}

impl Lockfile {
    /// Parse lockfile text.
    ///
    /// Inside `GEM` / `specs:`, a 4-space-indented `name (version)` line
    /// starts a package and 6-or-more-space-indented lines are its
    /// dependencies. Everything else is ignored.
    pub fn parse(text: &str) -> Lockfile {
        let mut packages = BTreeMap::new();
        let mut in_gem = false;
        let mut in_specs = false;
        let mut current: Option<String> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if !line.starts_with(' ') {
                in_gem = line.trim_end() == "GEM";
                in_specs = false;
                current = None;
                continue;
            }
            if !in_gem {
                continue;
            }
            let indent = line.len() - line.trim_start().len();
            let body = line.trim();
            if indent == 2 {
                in_specs = body == "specs:";
                current = None;
                continue;
            }
            if !in_specs {
                continue;
            }
            if indent == 4 {
                match split_name_version(body) {
                    Some((name, version)) => {
                        packages.insert(
                            name.to_string(),
                            LockedGem { version: version.to_string(), dependencies: Vec::new() },
                        );
                        current = Some(name.to_string());
                    }
                    None => current = None,
                }
            } else if indent >= 6 {
                if let Some(name) = &current {
                    let dep = body.split(' ').next().unwrap_or(body);
                    if !dep.is_empty() {
                        if let Some(gem) = packages.get_mut(name) {
                            gem.dependencies.push(dep.to_string());
                        }
                    }
                }
            }
        }
        Lockfile { packages }
    }

    /// Read and parse a lockfile from disk.
    pub fn read(path: &Path) -> Result<Lockfile, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        Ok(Self::parse(&content))
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.packages.get(name).map(|g| g.version.as_str())
    }

    /// The pinned versions of a package and everything reachable from it,
    /// including the package itself. Names the lockfile does not pin are
    /// silently absent.
    pub fn transitive_versions(&self, root: &str) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut queue = vec![root.to_string()];
        while let Some(name) = queue.pop() {
            if out.contains_key(&name) {
                continue;
            }
            let Some(gem) = self.packages.get(&name) else { continue };
            out.insert(name, gem.version.clone());
            queue.extend(gem.dependencies.iter().cloned());
        }
        out
    }

    /// Order a set of package names dependencies-first: a name appears
    /// after every requested name reachable through its dependency edges.
    /// Cycles (which real lockfiles do contain) are broken at the revisit.
    pub fn topo_order(&self, names: &BTreeSet<String>) -> Vec<String> {
        let mut order = Vec::with_capacity(names.len());
        let mut visited = BTreeSet::new();
        for name in names {
            self.visit(name, names, &mut visited, &mut order);
        }
        order
    }

    fn visit(
        &self,
        name: &str,
        requested: &BTreeSet<String>,
        visited: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) {
        if !visited.insert(name.to_string()) {
            return;
        }
        if let Some(gem) = self.packages.get(name) {
            for dep in &gem.dependencies {
                self.visit(dep, requested, visited, order);
            }
        }
        if requested.contains(name) {
            order.push(name.to_string());
        }
    }
}

/// Split `"rails (7.1.2)"` into `("rails", "7.1.2")`.
fn split_name_version(body: &str) -> Option<(&str, &str)> {
    let open = body.find(" (")?;
    let name = &body[..open];
    let version = body[open + 2..].strip_suffix(')')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}
