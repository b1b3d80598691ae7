//! Crash-recoverable supply state.
//!
//! A fixed 12-byte record of three little-endian `i32`s: supply state,
//! control mode, checksum.  Anything malformed is treated as "no saved
//! state"; the orchestrator then starts from its safe defaults.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use aquactl_types::{ControlMode, SupplyState};

const CHECKSUM_SEED: i32 = 0x55AA55AAu32 as i32;

/// State worth surviving a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub state: SupplyState,
    pub mode: ControlMode,
}

/// Reads and writes the persisted state record.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the saved record, or `None` if the file is missing, truncated,
    /// checksum-corrupt, or names a non-restorable state.
    pub fn load(&self) -> Option<SavedState> {
        let mut file = File::open(&self.path).ok()?;
        let mut raw = [0u8; 12];
        file.read_exact(&mut raw).ok()?;

        let state_raw = i32::from_le_bytes(raw[0..4].try_into().ok()?);
        let mode_raw = i32::from_le_bytes(raw[4..8].try_into().ok()?);
        let check = i32::from_le_bytes(raw[8..12].try_into().ok()?);

        if state_raw.wrapping_add(mode_raw) ^ CHECKSUM_SEED != check {
            return None;
        }

        let state = SupplyState::try_from(state_raw).ok()?;
        let mode = ControlMode::try_from(mode_raw).ok()?;

        // Only stable topologies are worth restoring; a record captured
        // mid-transition is discarded.
        if !state.is_final() {
            return None;
        }

        Some(SavedState { state, mode })
    }

    /// Overwrite the record and flush it to disk.
    ///
    /// # Errors
    ///
    /// Returns any I/O error from creating, writing, or syncing the file.
    pub fn save(&self, state: SupplyState, mode: ControlMode) -> io::Result<()> {
        let state_raw = state as i32;
        let mode_raw = mode as i32;
        let check = state_raw.wrapping_add(mode_raw) ^ CHECKSUM_SEED;

        let mut raw = [0u8; 12];
        raw[0..4].copy_from_slice(&state_raw.to_le_bytes());
        raw[4..8].copy_from_slice(&mode_raw.to_le_bytes());
        raw[8..12].copy_from_slice(&check.to_le_bytes());

        let mut file = File::create(&self.path)?;
        file.write_all(&raw)?;
        file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(dir.path().join("state.bin"))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load(), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.save(SupplyState::Heater, ControlMode::Manual).unwrap();
        assert_eq!(
            store.load(),
            Some(SavedState { state: SupplyState::Heater, mode: ControlMode::Manual })
        );
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(SupplyState::Central, ControlMode::Auto).unwrap();

        let path = dir.path().join("state.bin");
        let mut raw = std::fs::read(&path).unwrap();
        raw[8] ^= 0xFF;
        std::fs::write(&path, &raw).unwrap();

        assert_eq!(store.load(), None);
    }

    #[test]
    fn truncated_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(SupplyState::Closed, ControlMode::Auto).unwrap();

        let path = dir.path().join("state.bin");
        let raw = std::fs::read(&path).unwrap();
        std::fs::write(&path, &raw[..8]).unwrap();

        assert_eq!(store.load(), None);
    }

    #[test]
    fn transient_state_is_not_restorable() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(SupplyState::SwitchToHeater, ControlMode::Manual).unwrap();
        assert_eq!(store.load(), None);
    }
}
