//! Block production over the registry state.
//!
//! Submissions are accepted into a FIFO mempool and receive a transaction
//! hash immediately. Producing a block executes every pending submission in
//! order and records one receipt per submission. Failures at execution time
//! (resource exhaustion, rejected preconditions) are recorded as failed
//! receipts and leave the state untouched.

use std::collections::{HashMap, VecDeque};

use sha2::{Digest, Sha256};

use registry_types::rpc::BlockInfo;
use registry_types::{Receipt, Submission, Timestamp, TxHash};

use crate::call::{intrinsic_cost, total_cost};
use crate::error::LedgerError;
use crate::genesis::{LedgerGenesisConfig, ResourceSchedule};
use crate::handlers::{handle_call, CallContext};
use crate::state::RegistryState;

/// Domain separator for transaction hashes.
const TX_DOMAIN: &[u8] = b"REGISTRY_TX_V1:";

/// Failure reason recorded when a submission exceeds its resource limit.
pub const OUT_OF_RESOURCES: &str = "out of resources";

struct PendingTransaction {
    hash: TxHash,
    submission: Submission,
}

/// In-memory ledger: registry state plus mempool, clock and receipts.
pub struct Ledger {
    state: RegistryState,
    schedule: ResourceSchedule,
    height: u64,
    timestamp: Timestamp,
    block_interval_secs: u64,
    nonce: u64,
    mempool: VecDeque<PendingTransaction>,
    receipts: HashMap<TxHash, Receipt>,
}

impl Ledger {
    pub fn new(config: &LedgerGenesisConfig) -> Self {
        Self {
            state: RegistryState::new(config.admin),
            schedule: config.schedule,
            height: 0,
            timestamp: config.initial_timestamp,
            block_interval_secs: config.block_interval_secs,
            nonce: 0,
            mempool: VecDeque::new(),
            receipts: HashMap::new(),
        }
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    /// Accept a submission into the mempool.
    ///
    /// Only checks that can be made without executing are applied here;
    /// everything else surfaces in the receipt.
    pub fn accept(&mut self, submission: Submission) -> Result<TxHash, LedgerError> {
        if submission.sender.is_zero() {
            return Err(LedgerError::InvalidSender);
        }

        let required = intrinsic_cost(&self.schedule, &submission);
        if submission.resource_limit < required {
            return Err(LedgerError::IntrinsicLimitTooLow {
                required,
                limit: submission.resource_limit,
            });
        }

        let encoded =
            borsh::to_vec(&submission).map_err(|e| LedgerError::Encoding(e.to_string()))?;
        let mut hasher = Sha256::new();
        hasher.update(TX_DOMAIN);
        hasher.update(&encoded);
        hasher.update(self.nonce.to_le_bytes());
        let hash = TxHash(hasher.finalize().into());
        self.nonce += 1;

        self.mempool.push_back(PendingTransaction { hash, submission });
        Ok(hash)
    }

    pub fn is_pending(&self, hash: &TxHash) -> bool {
        self.mempool.iter().any(|tx| tx.hash == *hash)
    }

    /// Evict a pending submission without executing it.
    pub fn drop_pending(&mut self, hash: &TxHash) -> bool {
        let before = self.mempool.len();
        self.mempool.retain(|tx| tx.hash != *hash);
        self.mempool.len() != before
    }

    pub fn receipt(&self, hash: &TxHash) -> Option<&Receipt> {
        self.receipts.get(hash)
    }

    /// Produce one block, executing all pending submissions in FIFO order.
    pub fn produce_block(&mut self) -> Vec<Receipt> {
        self.height += 1;
        self.timestamp = self.timestamp.saturating_add(self.block_interval_secs);

        let pending: Vec<PendingTransaction> = self.mempool.drain(..).collect();
        let mut receipts = Vec::with_capacity(pending.len());

        for tx in pending {
            let receipt = self.execute(tx.hash, &tx.submission);
            self.receipts.insert(tx.hash, receipt.clone());
            receipts.push(receipt);
        }

        receipts
    }

    fn execute(&mut self, tx_hash: TxHash, submission: &Submission) -> Receipt {
        let required = total_cost(&self.schedule, submission);
        let mut receipt = Receipt {
            tx_hash,
            block_height: self.height,
            success: false,
            failure_reason: None,
            resources_used: required,
            listing_id: submission.operation.listing_id(),
        };

        if required > submission.resource_limit {
            receipt.resources_used = submission.resource_limit;
            receipt.failure_reason = Some(OUT_OF_RESOURCES.to_string());
            return receipt;
        }

        let ctx = CallContext {
            sender: submission.sender,
            block_height: self.height,
            timestamp: self.timestamp,
            value: submission.value,
        };

        match handle_call(&mut self.state, &ctx, &submission.operation) {
            Ok(id) => {
                receipt.success = true;
                receipt.listing_id = Some(id);
            }
            Err(e) => receipt.failure_reason = Some(e.to_string()),
        }
        receipt
    }

    /// Move the clock. Only forward moves are applied.
    pub fn set_timestamp(&mut self, timestamp: Timestamp) -> bool {
        if timestamp < self.timestamp {
            return false;
        }
        self.timestamp = timestamp;
        true
    }

    pub fn block_info(&self) -> BlockInfo {
        BlockInfo {
            height: self.height,
            timestamp: self.timestamp,
            pending: self.mempool.len(),
        }
    }
}
