// crates/nacre-ledger/src/snapshot.rs
//
// Whole-state JSON snapshots. The ledger is a single serializable value,
// so persistence is save-the-world / load-the-world; incremental storage
// is the embedding node's concern.

use std::fs;
use std::path::Path;

use tracing::info;

use nacre_core::NacreError;

use crate::ledger::StakingLedger;

/// Write the ledger state to `path` as pretty-printed JSON.
///
/// # Errors
/// `NacreError::Snapshot` on serialization or I/O failure.
pub fn save(ledger: &StakingLedger, path: &Path) -> Result<(), NacreError> {
    let bytes = serde_json::to_vec_pretty(ledger)
        .map_err(|err| NacreError::Snapshot(format!("serialize: {err}")))?;
    fs::write(path, bytes)
        .map_err(|err| NacreError::Snapshot(format!("write {}: {err}", path.display())))?;
    info!(path = %path.display(), block = ledger.current_block(), "snapshot saved");
    Ok(())
}

/// Load a ledger state previously written by [`save`].
///
/// # Errors
/// `NacreError::Snapshot` on I/O or deserialization failure.
pub fn load(path: &Path) -> Result<StakingLedger, NacreError> {
    let bytes = fs::read(path)
        .map_err(|err| NacreError::Snapshot(format!("read {}: {err}", path.display())))?;
    let ledger: StakingLedger = serde_json::from_slice(&bytes)
        .map_err(|err| NacreError::Snapshot(format!("deserialize: {err}")))?;
    info!(path = %path.display(), block = ledger.current_block(), "snapshot loaded");
    Ok(ledger)
}
