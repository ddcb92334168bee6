//! JSON-RPC surface of the mock ledger.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use parking_lot::RwLock;
use tracing::info;

use registry_module::queries::{bid_record, listing_record};
use registry_module::{Ledger, LedgerError};
use registry_types::rpc::{
    BidRpc, BlockInfo, ListingRpc, INTERNAL_CODE, NOT_FOUND_CODE, REJECTED_CODE,
};
use registry_types::{Account, ListingId, Receipt, Submission, TxHash};

/// RPC API definition for the mock ledger.
#[rpc(server)]
pub trait MockLedgerApi {
    // ============ Admin Methods ============

    /// Produce a block now.
    #[method(name = "admin_advanceBlock")]
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    /// Move the clock forward (for testing time-dependent display).
    #[method(name = "admin_setTimestamp")]
    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned>;

    // ============ Chain Methods ============

    #[method(name = "chain_getBlockInfo")]
    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned>;

    // ============ Registry Methods ============

    #[method(name = "ledger_admin")]
    async fn ledger_admin(&self) -> Result<Account, ErrorObjectOwned>;

    #[method(name = "ledger_listingCounter")]
    async fn ledger_listing_counter(&self) -> Result<u64, ErrorObjectOwned>;

    /// Listing record; deleted listings read back zeroed.
    #[method(name = "ledger_getListing")]
    async fn ledger_get_listing(&self, id: ListingId) -> Result<ListingRpc, ErrorObjectOwned>;

    #[method(name = "ledger_getBid")]
    async fn ledger_get_bid(
        &self,
        listing_id: ListingId,
        index: u64,
    ) -> Result<BidRpc, ErrorObjectOwned>;

    /// Accept a submission into the mempool.
    #[method(name = "ledger_sendTransaction")]
    async fn ledger_send_transaction(
        &self,
        submission: serde_json::Value,
    ) -> Result<TxHash, ErrorObjectOwned>;

    /// Receipt of an executed submission; `null` while pending.
    #[method(name = "ledger_getReceipt")]
    async fn ledger_get_receipt(&self, tx_hash: TxHash)
        -> Result<Option<Receipt>, ErrorObjectOwned>;
}

/// Mock ledger server implementation.
pub struct MockLedgerServer {
    ledger: Arc<RwLock<Ledger>>,
}

impl MockLedgerServer {
    pub fn new(ledger: Arc<RwLock<Ledger>>) -> Self {
        Self { ledger }
    }
}

fn rpc_error(code: i32, msg: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.into(), None::<()>)
}

fn query_error(err: LedgerError) -> ErrorObjectOwned {
    if err.is_not_found() {
        rpc_error(NOT_FOUND_CODE, err.to_string())
    } else {
        rpc_error(INTERNAL_CODE, err.to_string())
    }
}

#[async_trait]
impl MockLedgerApiServer for MockLedgerServer {
    async fn admin_advance_block(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        let mut ledger = self.ledger.write();
        let receipts = ledger.produce_block();
        let block = ledger.block_info();
        info!(height = block.height, txs = receipts.len(), "Block produced on demand");
        Ok(block)
    }

    async fn admin_set_timestamp(&self, timestamp: u64) -> Result<bool, ErrorObjectOwned> {
        if !self.ledger.write().set_timestamp(timestamp) {
            return Err(rpc_error(
                INTERNAL_CODE,
                "Timestamp cannot move backwards",
            ));
        }
        info!(timestamp, "Timestamp set");
        Ok(true)
    }

    async fn chain_get_block_info(&self) -> Result<BlockInfo, ErrorObjectOwned> {
        Ok(self.ledger.read().block_info())
    }

    async fn ledger_admin(&self) -> Result<Account, ErrorObjectOwned> {
        Ok(self.ledger.read().state().admin)
    }

    async fn ledger_listing_counter(&self) -> Result<u64, ErrorObjectOwned> {
        Ok(self.ledger.read().state().listing_counter)
    }

    async fn ledger_get_listing(&self, id: ListingId) -> Result<ListingRpc, ErrorObjectOwned> {
        listing_record(self.ledger.read().state(), id).map_err(query_error)
    }

    async fn ledger_get_bid(
        &self,
        listing_id: ListingId,
        index: u64,
    ) -> Result<BidRpc, ErrorObjectOwned> {
        bid_record(self.ledger.read().state(), listing_id, index).map_err(query_error)
    }

    async fn ledger_send_transaction(
        &self,
        submission: serde_json::Value,
    ) -> Result<TxHash, ErrorObjectOwned> {
        let submission: Submission = serde_json::from_value(submission)
            .map_err(|e| rpc_error(REJECTED_CODE, format!("Malformed transaction: {e}")))?;
        let kind = submission.operation.kind();
        let sender = submission.sender;

        let hash = self
            .ledger
            .write()
            .accept(submission)
            .map_err(|e| rpc_error(REJECTED_CODE, e.to_string()))?;

        info!(tx = %hash, operation = %kind, %sender, "Transaction accepted");
        Ok(hash)
    }

    async fn ledger_get_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<Receipt>, ErrorObjectOwned> {
        let ledger = self.ledger.read();
        if let Some(receipt) = ledger.receipt(&tx_hash) {
            return Ok(Some(receipt.clone()));
        }
        if ledger.is_pending(&tx_hash) {
            return Ok(None);
        }
        Err(query_error(LedgerError::UnknownTransaction(tx_hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use jsonrpsee::core::client::ClientT;
    use jsonrpsee::rpc_params;
    use jsonrpsee::server::{Server, ServerHandle};
    use registry_client::{
        AuctionOrchestrator, Confirmation, PendingHandle, Policy, RemoteStore, RpcStore,
        StoreError, Synchronizer,
    };
    use registry_module::LedgerGenesisConfig;
    use registry_types::rpc::methods;
    use registry_types::{Amount, AuctionState, ListingDraft, ListingTerms, Operation};

    const ADMIN: Account = Account([1u8; 20]);
    const BIDDER: Account = Account([0xbb; 20]);

    fn setup_server() -> (MockLedgerServer, Arc<RwLock<Ledger>>) {
        let ledger = Arc::new(RwLock::new(Ledger::new(&LedgerGenesisConfig::with_admin(
            ADMIN,
        ))));
        (MockLedgerServer::new(ledger.clone()), ledger)
    }

    fn toggle_json(sender: &str) -> serde_json::Value {
        serde_json::json!({
            "sender": sender,
            "operation": { "ToggleActive": { "id": 1 } },
            "value": "0",
            "resource_limit": 500000
        })
    }

    #[tokio::test]
    async fn test_malformed_sender_rejected() {
        let (server, _) = setup_server();
        let err = server
            .ledger_send_transaction(toggle_json("not-an-account"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), REJECTED_CODE);
    }

    #[tokio::test]
    async fn test_receipt_lifecycle() {
        let (server, _) = setup_server();
        let hash = server
            .ledger_send_transaction(toggle_json(&ADMIN.to_string()))
            .await
            .unwrap();

        assert_eq!(server.ledger_get_receipt(hash).await.unwrap(), None);

        let block = server.admin_advance_block().await.unwrap();
        assert_eq!(block.height, 1);

        let receipt = server.ledger_get_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.success);
        assert_eq!(receipt.failure_reason.as_deref(), Some("Listing not found: 1"));

        let unknown = server
            .ledger_get_receipt(TxHash([9u8; 32]))
            .await
            .unwrap_err();
        assert_eq!(unknown.code(), NOT_FOUND_CODE);
    }

    #[tokio::test]
    async fn test_unknown_listing_not_found() {
        let (server, ledger) = setup_server();
        let err = server.ledger_get_listing(1).await.unwrap_err();
        assert_eq!(err.code(), NOT_FOUND_CODE);

        let submission = Submission {
            sender: ADMIN,
            operation: Operation::DeleteListing { id: 1 },
            value: Amount::ZERO,
            resource_limit: 10,
        };
        assert!(matches!(
            ledger.write().accept(submission),
            Err(LedgerError::IntrinsicLimitTooLow { .. })
        ));
        assert_eq!(server.ledger_listing_counter().await.unwrap(), 0);
        assert_eq!(server.ledger_admin().await.unwrap(), ADMIN);
    }

    async fn serve() -> (Arc<RpcStore>, Arc<RwLock<Ledger>>, ServerHandle) {
        let (server, ledger) = setup_server();
        let rpc = Server::builder().build("127.0.0.1:0").await.unwrap();
        let addr = rpc.local_addr().unwrap();
        let handle = rpc.start(server.into_rpc());
        let store = RpcStore::new(&format!("http://{addr}"), Duration::from_millis(10)).unwrap();
        (Arc::new(store), ledger, handle)
    }

    fn cottage() -> ListingTerms {
        ListingTerms {
            title: "Cottage".to_string(),
            description: "By the sea".to_string(),
            image_ref: String::new(),
            location: "Porto".to_string(),
            start_price: Amount::parse_decimal("1").unwrap(),
            start_time: 1_700_000_000,
            end_time: 1_700_604_800,
        }
    }

    #[tokio::test]
    async fn test_rpc_store_against_server() {
        let (store, ledger, handle) = serve().await;
        assert_eq!(store.admin().await.unwrap(), ADMIN);

        let pending = store
            .submit(Submission {
                sender: ADMIN,
                operation: Operation::AddListing(cottage()),
                value: Amount::ZERO,
                resource_limit: 500_000,
            })
            .await
            .unwrap();

        // Pending submissions have no receipt yet.
        let receipt: Option<Receipt> = store
            .client()
            .request(methods::GET_RECEIPT, rpc_params![pending.tx_hash])
            .await
            .unwrap();
        assert_eq!(receipt, None);

        ledger.write().produce_block();
        match store.await_confirmation(&pending).await.unwrap() {
            Confirmation::Confirmed(receipt) => assert!(receipt.success),
            other => panic!("unexpected confirmation: {other:?}"),
        }
        assert_eq!(store.listing_count().await.unwrap(), 1);
        assert_eq!(store.get_listing(1).await.unwrap().title, "Cottage");

        // -32001 on both getters
        assert!(matches!(
            store.get_listing(2).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.get_bid(1, 0).await,
            Err(StoreError::NotFound(_))
        ));

        // -32002 at acceptance
        let starved = store
            .submit(Submission {
                sender: ADMIN,
                operation: Operation::StartAuction { id: 1 },
                value: Amount::ZERO,
                resource_limit: 10,
            })
            .await;
        assert!(matches!(starved, Err(StoreError::SubmissionRejected(_))));

        let unknown = PendingHandle {
            tx_hash: TxHash([7u8; 32]),
            ..pending
        };
        assert_eq!(
            store.await_confirmation(&unknown).await.unwrap(),
            Confirmation::Failed("transaction dropped".to_string())
        );

        handle.stop().unwrap();
    }

    #[tokio::test]
    async fn test_auction_flow_over_rpc() {
        let (store, ledger, handle) = serve().await;
        let producer = crate::spawn_block_producer(ledger.clone(), Duration::from_millis(20));

        let sync = Arc::new(Synchronizer::new(store.clone()));
        let admin = AuctionOrchestrator::new(store.clone(), sync.clone(), ADMIN, Policy::default());
        let bidder =
            AuctionOrchestrator::new(store.clone(), sync.clone(), BIDDER, Policy::default());

        let draft = ListingDraft {
            title: Some("Cottage".to_string()),
            description: Some("By the sea".to_string()),
            location: Some("Porto".to_string()),
            image_ref: String::new(),
            start_price: Some("1".to_string()),
            auction_start: Some(1_700_000_000),
            auction_duration: Some(7 * 86_400),
        };
        admin.add_listing(&draft).await.unwrap();
        admin.start_auction(1).await.unwrap();
        assert_eq!(sync.snapshot().listing(1).unwrap().state(), AuctionState::Live);

        bidder.place_bid(1, "1.01").await.unwrap();
        let snapshot = sync.snapshot();
        let entry = snapshot.get(1).unwrap();
        assert_eq!(entry.bids.len(), 1);
        assert_eq!(entry.bids[0].bidder, BIDDER);
        assert_eq!(entry.listing.highest_bidder, Some(BIDDER));
        assert_eq!(admin.min_bid(1), Some(Amount::parse_decimal("1.02").unwrap()));

        admin.end_auction(1).await.unwrap();
        admin.delete_listing(1).await.unwrap();

        // The zeroed record left behind reads as not found.
        assert!(matches!(
            store.get_listing(1).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(store.listing_count().await.unwrap(), 1);
        assert!(sync.snapshot().is_empty());

        producer.abort();
        handle.stop().unwrap();
    }
}
