use std::collections::HashMap;
use std::sync::Arc;

use super::{Profile, av};
use crate::error::{Result, RtpError};

/// Registry of named profiles, keyed by [`Profile::name`].
///
/// Profiles are stored as `Arc<Profile>` and handed out by clone, so a
/// session keeps using the snapshot it looked up even if the store is later
/// updated. [`update`](Self::update) is copy-on-write: if anyone else still
/// holds the current `Arc`, the profile is shallow-cloned before the closure
/// runs.
#[derive(Debug, Clone, Default)]
pub struct ProfileStore {
    profiles: HashMap<String, Arc<Profile>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with the shared default AV profile.
    pub fn with_default_av() -> Self {
        let mut store = Self::new();
        store.insert(av::default_av_profile());
        store
    }

    /// Register a profile under its own name. Replaces any existing entry.
    pub fn insert(&mut self, profile: impl Into<Arc<Profile>>) -> Option<Arc<Profile>> {
        let profile = profile.into();
        let name = profile.name().to_string();
        tracing::info!(profile = %name, payloads = profile.len(), "profile registered");
        self.profiles.insert(name, profile)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Profile>> {
        self.profiles.get(name).cloned()
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Profile>> {
        let removed = self.profiles.remove(name);
        if removed.is_some() {
            tracing::debug!(profile = name, "profile removed");
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// Registered profile names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.profiles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Mutate a stored profile in place (copy-on-write).
    ///
    /// Renaming the profile inside `f` is not reflected in the key; use
    /// [`fork`](Self::fork) to store a profile under a new name.
    pub fn update<R>(&mut self, name: &str, f: impl FnOnce(&mut Profile) -> R) -> Result<R> {
        let entry = self
            .profiles
            .get_mut(name)
            .ok_or_else(|| RtpError::ProfileNotFound(name.to_string()))?;
        let shared = Arc::strong_count(entry) > 1;
        let result = f(Arc::make_mut(entry));
        tracing::debug!(profile = name, copied = shared, "profile updated");
        Ok(result)
    }

    /// Store a copy of profile `name` as `new_name`, sharing payload types
    /// unless `deep` is set.
    pub fn fork(&mut self, name: &str, new_name: &str, deep: bool) -> Result<Arc<Profile>> {
        let source = self
            .get(name)
            .ok_or_else(|| RtpError::ProfileNotFound(name.to_string()))?;
        let mut copy = if deep {
            source.clone_deep()
        } else {
            source.clone_shallow()
        };
        copy.set_name(new_name);
        let copy = Arc::new(copy);
        self.insert(copy.clone());
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadType;
    use crate::profile::AV_PROFILE_NAME;

    #[test]
    fn default_store_has_av_profile() {
        let store = ProfileStore::with_default_av();
        assert!(store.contains(AV_PROFILE_NAME));
        let av = store.get(AV_PROFILE_NAME).unwrap();
        assert!(Arc::ptr_eq(&av, &av::default_av_profile()));
    }

    #[test]
    fn insert_get_remove() {
        let mut store = ProfileStore::new();
        store.insert(Profile::new("video"));
        store.insert(Profile::new("audio"));
        assert_eq!(store.names(), vec!["audio", "video"]);

        assert!(store.remove("video").is_some());
        assert!(store.remove("video").is_none());
        assert!(store.get("video").is_none());
    }

    #[test]
    fn update_is_copy_on_write() {
        let mut store = ProfileStore::with_default_av();
        let before = store.get(AV_PROFILE_NAME).unwrap();

        store
            .update(AV_PROFILE_NAME, |p| {
                p.set(101, PayloadType::telephone_event());
            })
            .unwrap();

        let after = store.get(AV_PROFILE_NAME).unwrap();
        assert!(after.is_telephone_event(101));
        assert!(before.get(101).is_none(), "existing snapshot is untouched");
        assert!(after.shares_payload_with(&before, 0));
        assert!(av::default_av_profile().get(101).is_none());
    }

    #[test]
    fn update_missing_profile() {
        let mut store = ProfileStore::new();
        assert!(matches!(
            store.update("nope", |_| ()),
            Err(RtpError::ProfileNotFound(name)) if name == "nope"
        ));
    }

    #[test]
    fn fork_shallow_and_deep() {
        let mut store = ProfileStore::with_default_av();
        let shallow = store.fork(AV_PROFILE_NAME, "session-1", false).unwrap();
        let deep = store.fork(AV_PROFILE_NAME, "session-2", true).unwrap();

        let av = store.get(AV_PROFILE_NAME).unwrap();
        assert_eq!(shallow.name(), "session-1");
        assert!(shallow.shares_payload_with(&av, 8));
        assert!(!deep.shares_payload_with(&av, 8));
        assert_eq!(store.names().len(), 3);

        assert!(matches!(
            store.fork("missing", "x", false),
            Err(RtpError::ProfileNotFound(_))
        ));
    }
}
