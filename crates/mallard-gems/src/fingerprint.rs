//! Dependency fingerprints for cache validation.
//!
//! A cached extraction is valid only while the package's own version and
//! the pinned versions of its whole transitive closure are unchanged: an
//! upgraded dependency can change what a package's methods return. The
//! fingerprint digests exactly that state.

use std::collections::BTreeMap;
use std::hash::Hasher;

use rustc_hash::FxHasher;

/// Digest a package version plus its transitive pinned versions into a
/// 16-hex-digit fingerprint.
///
/// `deps` is ordered by name (`BTreeMap`), so the digest is deterministic
/// regardless of how the closure was collected.
pub fn fingerprint(version: &str, deps: &BTreeMap<String, String>) -> String {
    let mut h = FxHasher::default();
    h.write(version.as_bytes());
    h.write_u8(0);
    for (name, v) in deps {
        h.write(name.as_bytes());
        h.write_u8(b'=');
        h.write(v.as_bytes());
        h.write_u8(0);
    }
    format!("{:016x}", h.finish())
}
