//! Chrome profile directory management
//!
//! Every session start gets a fresh UUID-named profile, so two sessions never
//! contend for a SingletonLock and no cookies leak from one attempt into the
//! next.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of every profile directory this worker creates
pub const PROFILE_PREFIX: &str = "mnbot_chrome";

/// RAII wrapper for a Chrome profile directory
///
/// Removes the directory on drop.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
}

impl BrowserProfile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Install a pre-built cookie store as the default profile's cookie database
    ///
    /// Must happen before the browser is launched against this profile.
    pub fn install_cookie_db(&self, cookie_db: &[u8]) -> Result<PathBuf> {
        let default_dir = self.path.join("Default");
        std::fs::create_dir_all(&default_dir)
            .with_context(|| format!("Failed to create {}", default_dir.display()))?;

        let cookies = default_dir.join("Cookies");
        std::fs::write(&cookies, cookie_db)
            .with_context(|| format!("Failed to write cookie database: {}", cookies.display()))?;
        debug!("Installed {} byte cookie database at {}", cookie_db.len(), cookies.display());
        Ok(cookies)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.path.exists() {
            debug!("BrowserProfile cleanup: removing {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!("Failed to cleanup profile directory {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Create a unique profile directory under `base`
pub fn create_unique_profile_in(base: &Path) -> Result<BrowserProfile> {
    let path = base.join(format!("{PROFILE_PREFIX}_{}", Uuid::new_v4()));

    // create_dir fails if the directory exists
    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    info!("Created Chrome profile directory: {}", path.display());
    Ok(BrowserProfile { path })
}

/// Create a unique profile directory in the system temp directory
pub fn create_unique_profile() -> Result<BrowserProfile> {
    create_unique_profile_in(&std::env::temp_dir())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_removed_on_drop() {
        let base = tempfile::tempdir().expect("tempdir");
        let profile = create_unique_profile_in(base.path()).expect("profile");
        let path = profile.path().to_path_buf();

        assert!(path.exists());
        assert!(
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(PROFILE_PREFIX))
        );

        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn cookie_db_lands_in_default_profile() {
        let base = tempfile::tempdir().expect("tempdir");
        let profile = create_unique_profile_in(base.path()).expect("profile");

        let cookies = profile.install_cookie_db(b"SQLite format 3\0").expect("install");
        assert_eq!(cookies, profile.path().join("Default").join("Cookies"));
        assert_eq!(std::fs::read(&cookies).expect("read"), b"SQLite format 3\0");
    }

    #[test]
    fn two_profiles_never_collide() {
        let base = tempfile::tempdir().expect("tempdir");
        let a = create_unique_profile_in(base.path()).expect("profile");
        let b = create_unique_profile_in(base.path()).expect("profile");
        assert_ne!(a.path(), b.path());
    }
}
