// crates/nacre-consensus/src/epoch.rs
//
// Epoch bookkeeping. An epoch is a fixed number of blocks; the epoch
// boundary is the last block of the epoch, at which the queues apply,
// the committee is recomputed, and the counter advances.

use serde::{Deserialize, Serialize};

/// Tracks the current epoch and its block range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochManager {
    current_epoch: u64,
    /// First block of the current epoch.
    epoch_start_block: u64,
    epoch_period: u64,
}

impl EpochManager {
    pub fn new(epoch_period: u64) -> Self {
        Self {
            current_epoch: 0,
            epoch_start_block: 0,
            epoch_period,
        }
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch
    }

    pub fn epoch_period(&self) -> u64 {
        self.epoch_period
    }

    /// Last block of the current epoch.
    pub fn epoch_end_block(&self) -> u64 {
        self.epoch_start_block + self.epoch_period - 1
    }

    /// Whether `block` closes the current epoch.
    pub fn is_epoch_end(&self, block: u64) -> bool {
        block >= self.epoch_end_block()
    }

    /// Roll over to the next epoch starting at `block + 1`.
    pub fn advance(&mut self, block: u64) {
        self.current_epoch += 1;
        self.epoch_start_block = block + 1;
    }

    /// Epoch a given block falls in, relative to the current rollover
    /// cadence. Used to stamp accountability events.
    pub fn epoch_of_block(&self, block: u64) -> u64 {
        if block >= self.epoch_start_block {
            self.current_epoch
        } else {
            // Earlier epochs had the same fixed period.
            block / self.epoch_period
        }
    }
}
