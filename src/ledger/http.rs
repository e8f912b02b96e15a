use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    BallotContract, ChainCandidate, ChainCandidateId, LedgerError, TxHash, TxStatus,
};

/// JSON-RPC client for the ledger gateway, which fronts the deployed ballot
/// contract and exposes its observable operations as RPC methods. The
/// contract's ABI encoding and signing happen behind the gateway; this
/// backend only ever sees the decoded results and revert reasons.
pub struct HttpLedger {
    http: HttpClient,
    url: String,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    message: String,
}

impl HttpLedger {
    pub fn new(url: String) -> Self {
        Self {
            http: HttpClient::new(),
            url,
            next_id: AtomicU64::new(0),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!("Ledger RPC call {method} (id {id})");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match (response.result, response.error) {
            (_, Some(err)) => Err(classify_rpc_error(err.message)),
            (Some(result), None) => {
                serde_json::from_value(result).map_err(|e| LedgerError::Rpc(e.to_string()))
            }
            (None, None) => Err(LedgerError::Rpc(format!("{method}: empty RPC response"))),
        }
    }
}

/// Pick the revert reason out of a gateway error message.
///
/// Reverts must be distinguished from transport-level RPC failures: only a
/// revert carries the contract's own reason (e.g. "already voted") and the
/// all-or-nothing guarantee that no state changed.
fn classify_rpc_error(message: String) -> LedgerError {
    match message.split_once("execution reverted:") {
        Some((_, reason)) => LedgerError::Reverted(reason.trim().to_string()),
        None if message.contains("revert") => LedgerError::Reverted(message),
        None => LedgerError::Rpc(message),
    }
}

#[rocket::async_trait]
impl BallotContract for HttpLedger {
    async fn add_candidate(
        &self,
        name: &str,
        party: &str,
        image_hash: &str,
    ) -> Result<TxHash, LedgerError> {
        self.call("ballot_addCandidate", json!([name, party, image_hash]))
            .await
    }

    async fn vote(&self, candidate_id: ChainCandidateId) -> Result<TxHash, LedgerError> {
        self.call("ballot_vote", json!([candidate_id])).await
    }

    async fn candidate(&self, id: ChainCandidateId) -> Result<ChainCandidate, LedgerError> {
        self.call("ballot_getCandidate", json!([id])).await
    }

    async fn active_candidate_ids(&self) -> Result<Vec<ChainCandidateId>, LedgerError> {
        self.call("ballot_getActiveCandidateIds", json!([])).await
    }

    async fn has_address_voted(&self, address: &str) -> Result<bool, LedgerError> {
        self.call("ballot_hasVoted", json!([address])).await
    }

    async fn transaction_status(&self, tx: &TxHash) -> Result<TxStatus, LedgerError> {
        self.call("ballot_getTransactionStatus", json!([tx.0]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reasons_are_extracted() {
        let err = classify_rpc_error(
            "execution reverted: Voting: sender has already voted".to_string(),
        );
        match err {
            LedgerError::Reverted(reason) => {
                assert_eq!(reason, "Voting: sender has already voted")
            }
            other => panic!("expected Reverted, got {other:?}"),
        }
    }

    #[test]
    fn transport_messages_stay_rpc_errors() {
        let err = classify_rpc_error("connection refused".to_string());
        assert!(matches!(err, LedgerError::Rpc(_)));
    }

    #[test]
    fn rpc_response_parsing() {
        let ok: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":"0xabc"}"#).unwrap();
        assert_eq!(ok.result.unwrap(), serde_json::json!("0xabc"));
        assert!(ok.error.is_none());

        let err: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":2,"error":{"code":3,"message":"execution reverted: nope"}}"#,
        )
        .unwrap();
        assert!(err.result.is_none());
        assert_eq!(err.error.unwrap().message, "execution reverted: nope");
    }
}
