//! JSON-RPC store backed by a ledger node.

use std::time::Duration;

use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::de::DeserializeOwned;
use tracing::debug;

use registry_types::rpc::{methods, BidRpc, ListingRpc, NOT_FOUND_CODE, REJECTED_CODE};
use registry_types::{Account, Bid, Listing, ListingId, Receipt, Submission, TxHash};

use super::{handle_for, Confirmation, PendingHandle, RemoteStore};
use crate::error::StoreError;

/// Remote store speaking JSON-RPC over HTTP.
pub struct RpcStore {
    client: HttpClient,
    poll_interval: Duration,
}

impl RpcStore {
    pub fn new(endpoint: &str, poll_interval: Duration) -> Result<Self, StoreError> {
        let client = HttpClientBuilder::default()
            .build(endpoint)
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            poll_interval,
        })
    }

    /// Underlying client, for node-specific calls.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: jsonrpsee::core::params::ArrayParams,
    ) -> Result<T, StoreError> {
        self.client.request(method, params).await.map_err(map_error)
    }
}

fn map_error(err: ClientError) -> StoreError {
    match err {
        ClientError::Call(obj) if obj.code() == NOT_FOUND_CODE => {
            StoreError::NotFound(obj.message().to_string())
        }
        ClientError::Call(obj) if obj.code() == REJECTED_CODE => {
            StoreError::SubmissionRejected(obj.message().to_string())
        }
        ClientError::Call(obj) => {
            StoreError::Protocol(format!("{} (code {})", obj.message(), obj.code()))
        }
        ClientError::ParseError(e) => StoreError::Protocol(e.to_string()),
        other => StoreError::Transport(other.to_string()),
    }
}

#[async_trait]
impl RemoteStore for RpcStore {
    async fn admin(&self) -> Result<Account, StoreError> {
        self.call(methods::ADMIN, rpc_params![]).await
    }

    async fn listing_count(&self) -> Result<u64, StoreError> {
        self.call(methods::LISTING_COUNTER, rpc_params![]).await
    }

    async fn get_listing(&self, id: ListingId) -> Result<Listing, StoreError> {
        if id == 0 {
            return Err(StoreError::NotFound(format!("listing {id}")));
        }
        let record: ListingRpc = self.call(methods::GET_LISTING, rpc_params![id]).await?;
        record
            .into_listing()
            .ok_or_else(|| StoreError::NotFound(format!("listing {id} was deleted")))
    }

    async fn get_bid(&self, listing_id: ListingId, index: u64) -> Result<Bid, StoreError> {
        let bid: BidRpc = self
            .call(methods::GET_BID, rpc_params![listing_id, index])
            .await?;
        Ok(bid)
    }

    async fn submit(&self, submission: Submission) -> Result<PendingHandle, StoreError> {
        let tx_hash: TxHash = self
            .call(methods::SEND_TRANSACTION, rpc_params![&submission])
            .await?;
        Ok(handle_for(&submission, tx_hash))
    }

    async fn await_confirmation(
        &self,
        handle: &PendingHandle,
    ) -> Result<Confirmation, StoreError> {
        loop {
            let receipt: Result<Option<Receipt>, StoreError> = self
                .call(methods::GET_RECEIPT, rpc_params![handle.tx_hash])
                .await;
            match receipt {
                Ok(Some(receipt)) => return Ok(Confirmation::Confirmed(receipt)),
                Ok(None) => {
                    debug!(tx = %handle.tx_hash, "Transaction pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(StoreError::NotFound(_)) => {
                    return Ok(Confirmation::Failed("transaction dropped".to_string()))
                }
                Err(e) => return Err(e),
            }
        }
    }
}
