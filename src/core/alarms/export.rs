// Clipboard form of alarm groups: base64 over the group's JSON.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

use super::model::AlarmGroup;
use super::registry::RegistryError;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("clipboard data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("clipboard data is not an alarm group: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Outcome of importing a group. Alarms that no longer resolve against the
/// catalog are skipped rather than failing the whole import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub group_index: usize,
    pub imported: usize,
    pub skipped: usize,
}

pub fn encode_group(group: &AlarmGroup) -> serde_json::Result<String> {
    let json = serde_json::to_vec(group)?;
    Ok(STANDARD.encode(json))
}

pub fn decode_group(data: &str) -> Result<AlarmGroup, ImportError> {
    let bytes = STANDARD.decode(data.trim())?;
    Ok(serde_json::from_slice(&bytes)?)
}
