//! Per-profile database routing (§4.5 "Database routing")
//!
//! One database file per embedding profile so two profiles (different
//! providers, models, or dimensions) never share — and thus never
//! cross-contaminate — a database file.

use crate::embeddings::Profile;
use std::path::{Path, PathBuf};

/// Resolve the database file path for `profile` under `db_dir`.
pub fn database_path(db_dir: &Path, profile: &Profile) -> PathBuf {
    db_dir.join(format!("noetic-{}.db", profile.database_suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn different_profiles_route_to_different_files() {
        let dir = Path::new("/data");
        let a = Profile::new("openai", "text-embedding-3-small", 1536);
        let b = Profile::new("local", "nomic-embed-text-v1.5", 256);
        assert_ne!(database_path(dir, &a), database_path(dir, &b));
    }

    #[test]
    fn same_profile_routes_to_same_file() {
        let dir = Path::new("/data");
        let a = Profile::new("openai", "text-embedding-3-small", 1536);
        let a2 = Profile::new("openai", "text-embedding-3-small", 1536);
        assert_eq!(database_path(dir, &a), database_path(dir, &a2));
    }
}
