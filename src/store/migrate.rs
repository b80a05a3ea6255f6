use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

/// Fields older builds wrote into the progress blob that are now derived or
/// session-scoped.
const DERIVED_PROGRESS_FIELDS: &[&str] = &["level", "questionStreak", "sessionPoints"];

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_strip_derived_progress_fields", m002_strip_derived_progress_fields),
    ]
}

/// Applies every migration newer than the stored version.
///
/// Each migration must be idempotent: the version is written only after the
/// migration returns, so a crash in between re-runs it on the next start.
/// Versions only move forward.
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.meta.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .meta
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

fn m002_strip_derived_progress_fields(store: &Store) -> Result<(), StoreError> {
    for profile_id in store.list_progress_profiles()? {
        let Some(raw) = store.get_progress_blob(&profile_id)? else {
            continue;
        };
        // Undecodable blobs are left for the engine's first-run fallback.
        let mut value: serde_json::Value = match serde_json::from_slice(&raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(profile_id = %profile_id, error = %e, "Skipping undecodable progress blob");
                continue;
            }
        };
        let Some(object) = value.as_object_mut() else {
            continue;
        };

        let before = object.len();
        for field in DERIVED_PROGRESS_FIELDS {
            object.remove(*field);
        }
        if object.len() != before {
            store.set_progress(&profile_id, &value)?;
            tracing::info!(profile_id = %profile_id, "Stripped derived fields from progress blob");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn migration_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        run(&store).unwrap();
        let first = get_current_version(&store).unwrap();
        run(&store).unwrap();
        let second = get_current_version(&store).unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 2);
    }

    #[test]
    fn downgrade_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db2");
        let store = Store::open(path.to_str().unwrap()).unwrap();

        set_version(&store, 3).unwrap();
        let err = set_version(&store, 2).unwrap_err();
        assert!(matches!(err, StoreError::Migration { .. }));
    }

    #[test]
    fn derived_fields_are_stripped() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db3").to_str().unwrap()).unwrap();
        store
            .set_progress(
                "default",
                &serde_json::json!({"totalXP": 500, "level": 7, "questionStreak": 3}),
            )
            .unwrap();
        store.put_progress_blob("broken", b"not json").unwrap();

        run(&store).unwrap();

        let value: serde_json::Value = store.get_progress("default").unwrap().unwrap();
        assert_eq!(value, serde_json::json!({"totalXP": 500}));
        assert_eq!(store.get_progress_blob("broken").unwrap().unwrap(), b"not json");
    }
}
