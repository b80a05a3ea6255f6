use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Raw progress blob; decoding is left to the caller so a corrupt blob can
    /// be told apart from a storage failure.
    pub fn get_progress_blob(&self, profile_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = keys::progress_key(profile_id)?;
        Ok(self.progress.get(key.as_bytes())?.map(|raw| raw.to_vec()))
    }

    pub fn put_progress_blob(&self, profile_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        let key = keys::progress_key(profile_id)?;
        self.progress.insert(key.as_bytes(), blob)?;
        Ok(())
    }

    pub fn put_unreadable_progress_blob(&self, profile_id: &str, blob: &[u8]) -> Result<(), StoreError> {
        let key = keys::unreadable_progress_key(profile_id)?;
        self.progress.insert(key.as_bytes(), blob)?;
        Ok(())
    }

    pub fn get_unreadable_progress_blob(&self, profile_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = keys::unreadable_progress_key(profile_id)?;
        Ok(self.progress.get(key.as_bytes())?.map(|raw| raw.to_vec()))
    }

    pub fn get_progress<T: DeserializeOwned>(&self, profile_id: &str) -> Result<Option<T>, StoreError> {
        match self.get_progress_blob(profile_id)? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_progress<T: Serialize>(&self, profile_id: &str, value: &T) -> Result<(), StoreError> {
        self.put_progress_blob(profile_id, &Self::serialize(value)?)
    }

    pub fn delete_progress(&self, profile_id: &str) -> Result<(), StoreError> {
        let key = keys::progress_key(profile_id)?;
        self.progress.remove(key.as_bytes())?;
        Ok(())
    }

    pub fn list_progress_profiles(&self) -> Result<Vec<String>, StoreError> {
        let mut profiles = Vec::new();
        for item in self.progress.scan_prefix(keys::progress_prefix().as_bytes()) {
            let (key, _) = item?;
            if let Some(profile_id) = keys::profile_id_from_key(&key) {
                profiles.push(profile_id);
            }
        }
        Ok(profiles)
    }
}
