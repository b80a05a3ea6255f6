use crate::store::StoreError;

const MAX_PROFILE_ID_LEN: usize = 128;

fn validate_segment(entity: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{entity} id must not be empty")));
    }
    if value.len() > MAX_PROFILE_ID_LEN {
        return Err(StoreError::Validation(format!(
            "{entity} id exceeds {MAX_PROFILE_ID_LEN} bytes"
        )));
    }
    if value.contains(':') {
        return Err(StoreError::Validation(format!(
            "{entity} id must not contain ':'"
        )));
    }
    Ok(())
}

pub fn progress_key(profile_id: &str) -> Result<String, StoreError> {
    validate_segment("profile", profile_id)?;
    Ok(format!("profile:{profile_id}"))
}

/// Unreadable blobs set aside on load. Outside the `profile:` prefix so
/// profile scans and migrations never see them.
pub fn unreadable_progress_key(profile_id: &str) -> Result<String, StoreError> {
    validate_segment("profile", profile_id)?;
    Ok(format!("unreadable:{profile_id}"))
}

pub fn progress_prefix() -> &'static str {
    "profile:"
}

pub fn profile_id_from_key(key: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(key).ok()?;
    text.strip_prefix(progress_prefix()).map(str::to_string)
}
