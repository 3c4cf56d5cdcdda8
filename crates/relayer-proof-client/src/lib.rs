#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Two-phase asynchronous proof retrieval over JSON-RPC: request a proof job, then poll it
//! until the proof service reports completion.

use async_trait::async_trait;
use base64::Engine;
use relayer_core::error::ProofClientError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const POLL_INITIAL_DELAY: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(500);
const POLL_MAX_ATTEMPTS: u32 = 30;

/// Capability exposing the external proof service's two-phase protocol.
#[async_trait]
pub trait ProofApi: Send + Sync {
    async fn request_proof(
        &self,
        source_chain_id: u64,
        source_block_number: u64,
        global_log_index: u64,
    ) -> Result<Vec<u8>, ProofClientError>;
}

/// Configuration for the JSON-RPC-backed proof client.
#[derive(Debug, Clone)]
pub struct ProofClientConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub api_key: Option<String>,
}

pub struct JsonRpcProofClient {
    http: reqwest::Client,
    config: ProofClientConfig,
}

impl JsonRpcProofClient {
    pub fn new(config: ProofClientConfig) -> JsonRpcProofClient {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .expect("reqwest client with a static configuration always builds");
        JsonRpcProofClient { http, config }
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value, ProofClientError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let mut req = self.http.post(&self.config.base_url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp: JsonRpcResponse = req
            .send()
            .await
            .map_err(|e| ProofClientError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProofClientError::Transport(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(ProofClientError::ProofRequestFailed(err.message));
        }
        resp.result.ok_or_else(|| {
            ProofClientError::ProofRequestFailed("response carried neither result nor error".to_string())
        })
    }

    async fn request_proof_job(
        &self,
        source_chain_id: u64,
        source_block_number: u64,
        global_log_index: u64,
    ) -> Result<u64, ProofClientError> {
        let params = serde_json::json!([{
            "srcChainId": source_chain_id,
            "srcBlockNumber": source_block_number,
            "globalLogIndex": global_log_index,
        }]);

        let mut last_err = None;
        for attempt in 1..=self.config.retry_attempts.max(1) {
            match self.call("polymer_requestProof", params.clone()).await {
                Ok(result) => {
                    return result
                        .as_u64()
                        .ok_or_else(|| {
                            ProofClientError::ProofRequestFailed("jobID was not a number".to_string())
                        });
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "polymer_requestProof attempt failed");
                    last_err = Some(e);
                    if attempt < self.config.retry_attempts.max(1) {
                        let backoff = Duration::from_secs(1u64 << (attempt - 1));
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(ProofClientError::ProofRequestFailed("no attempts made".to_string())))
    }

    async fn poll_until_complete(&self, job_id: u64) -> Result<Vec<u8>, ProofClientError> {
        tokio::time::sleep(POLL_INITIAL_DELAY).await;
        for _ in 0..POLL_MAX_ATTEMPTS {
            let result = self
                .call("polymer_queryProof", serde_json::json!([job_id]))
                .await?;
            let status: ProofStatusResponse = serde_json::from_value(result)
                .map_err(|e| ProofClientError::ProofRequestFailed(e.to_string()))?;
            match status.status.as_str() {
                "complete" => {
                    let encoded = status.proof.ok_or_else(|| {
                        ProofClientError::ProofGenerationFailed(
                            "status complete but proof field was empty".to_string(),
                        )
                    })?;
                    return base64::engine::general_purpose::STANDARD
                        .decode(encoded)
                        .map_err(|e| ProofClientError::ProofGenerationFailed(e.to_string()));
                }
                "error" => {
                    return Err(ProofClientError::ProofGenerationFailed(
                        status.message.unwrap_or_else(|| "proof generation failed".to_string()),
                    ));
                }
                // "initialized", "pending", and any unrecognised status keep polling.
                _ => {}
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Err(ProofClientError::ProofPollingTimeout)
    }
}

#[async_trait]
impl ProofApi for JsonRpcProofClient {
    async fn request_proof(
        &self,
        source_chain_id: u64,
        source_block_number: u64,
        global_log_index: u64,
    ) -> Result<Vec<u8>, ProofClientError> {
        let job_id = self
            .request_proof_job(source_chain_id, source_block_number, global_log_index)
            .await?;
        self.poll_until_complete(job_id).await
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Deserialize)]
struct ProofStatusResponse {
    status: String,
    #[serde(default)]
    proof: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> ProofClientConfig {
        ProofClientConfig {
            base_url: server.uri(),
            timeout_ms: 5_000,
            retry_attempts: 2,
            api_key: None,
        }
    }

    #[tokio::test]
    async fn happy_path_requests_then_polls_to_completion() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                match body["method"].as_str().unwrap() {
                    "polymer_requestProof" => ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"jsonrpc":"2.0","id":1,"result":42})),
                    "polymer_queryProof" => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "jsonrpc":"2.0","id":1,
                        "result": {"status":"complete","proof": base64::engine::general_purpose::STANDARD.encode([0xde,0xad])}
                    })),
                    other => panic!("unexpected method {other}"),
                }
            })
            .mount(&server)
            .await;

        let client = JsonRpcProofClient::new(config_for(&server));
        let proof = client.request_proof(84532, 1000, 5).await.unwrap();
        assert_eq!(proof, vec![0xde, 0xad]);
    }

    #[tokio::test]
    async fn error_status_surfaces_as_proof_generation_failed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/"))
            .respond_with(|req: &wiremock::Request| {
                let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
                match body["method"].as_str().unwrap() {
                    "polymer_requestProof" => ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"jsonrpc":"2.0","id":1,"result":7})),
                    "polymer_queryProof" => ResponseTemplate::new(200).set_body_json(serde_json::json!({
                        "jsonrpc":"2.0","id":1,
                        "result": {"status":"error","message":"source block not finalized"}
                    })),
                    other => panic!("unexpected method {other}"),
                }
            })
            .mount(&server)
            .await;

        let client = JsonRpcProofClient::new(config_for(&server));
        let err = client.request_proof(84532, 1000, 5).await.unwrap_err();
        assert!(matches!(err, ProofClientError::ProofGenerationFailed(_)));
    }
}
