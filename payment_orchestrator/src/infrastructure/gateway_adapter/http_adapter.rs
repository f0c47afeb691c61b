//! Concrete `GatewayAdapter` over HTTP, combining request assembly
//! (`payload`), the retry policy (`retry`), and the circuit breaker
//! (`circuit_breaker`). Grounded on the pack's `HttpPaymentGateway`
//! (`reqwest::Client` built once with a timeout, one `make_request`
//! helper shared by every operation) but posting form-encoded bodies
//! rather than JSON, per spec §6's wire contract.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::domain::gateway::{
    GatewayAdapter, GatewayCredentials, GatewayError, GatewayRequest, GatewayResponse,
    TokenizationResponse,
};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::payload;
use super::retry::{with_retry, RetryConfig};

/// Deadline for a single gateway HTTP attempt (spec §5: "External
/// gateway call: 30 s per attempt").
const PER_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpGatewayAdapter {
    client: reqwest::Client,
    server_url: String,
    tokenization_url: String,
    circuit_breaker: CircuitBreaker,
    retry: RetryConfig,
}

impl HttpGatewayAdapter {
    pub fn new(server_url: String, tokenization_url: String) -> Self {
        Self::with_policies(
            server_url,
            tokenization_url,
            CircuitBreakerConfig::default(),
            RetryConfig::default(),
        )
    }

    pub fn with_policies(
        server_url: String,
        tokenization_url: String,
        circuit_breaker: CircuitBreakerConfig,
        retry: RetryConfig,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PER_ATTEMPT_TIMEOUT)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .expect("reqwest client config is static and valid");

        Self {
            client,
            server_url,
            tokenization_url,
            circuit_breaker: CircuitBreaker::new(circuit_breaker),
            retry,
        }
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
    ) -> Result<HashMap<String, String>, GatewayError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(GatewayError::Transport(format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(serde_urlencoded::from_str(&body)
            .map_err(|e| GatewayError::Transport(format!("malformed response body: {e}")))?)
    }
}

#[async_trait]
impl GatewayAdapter for HttpGatewayAdapter {
    async fn execute(
        &self,
        credentials: &GatewayCredentials,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let form = payload::build_server_form(credentials, &request)?;

        let result = with_retry(&self.retry, || {
            let form = form.clone();
            async {
                self.circuit_breaker.before_call()?;
                match self.post_form(&self.server_url, &form).await {
                    Ok(fields) => {
                        self.circuit_breaker.record_success();
                        Ok(fields)
                    }
                    Err(err) => {
                        self.circuit_breaker.record_failure();
                        Err(err)
                    }
                }
            }
        })
        .await?;

        Ok(payload::parse_server_response(result))
    }

    async fn tokenize(
        &self,
        credentials: &GatewayCredentials,
        request: GatewayRequest,
    ) -> Result<TokenizationResponse, GatewayError> {
        let (tran_nbr, amount, group_id, return_url, cancel_url) = match &request {
            GatewayRequest::Tokenization {
                tran_nbr,
                amount,
                group_id,
                return_url,
                cancel_url,
            } => (tran_nbr, amount, group_id, return_url, cancel_url),
            _ => {
                return Err(GatewayError::InvalidRequest(
                    "tokenize() requires a Tokenization request".into(),
                ))
            }
        };

        let form = payload::build_tokenization_form(
            credentials,
            tran_nbr,
            amount,
            group_id,
            return_url,
            cancel_url,
        );

        let fields = with_retry(&self.retry, || {
            let form = form.clone();
            async {
                self.circuit_breaker.before_call()?;
                match self.post_form(&self.tokenization_url, &form).await {
                    Ok(fields) => {
                        self.circuit_breaker.record_success();
                        Ok(fields)
                    }
                    Err(err) => {
                        self.circuit_breaker.record_failure();
                        Err(err)
                    }
                }
            }
        })
        .await?;

        let auth_code = fields
            .get("AUTH_CODE")
            .cloned()
            .ok_or_else(|| GatewayError::Transport("tokenization response missing AUTH_CODE".into()))?;
        let expires_in_secs = fields
            .get("EXPIRES_IN")
            .and_then(|v| v.parse().ok())
            .unwrap_or(900);

        Ok(TokenizationResponse {
            auth_code,
            expires_in_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokenize_rejects_non_tokenization_requests() {
        // execute()/tokenize() dispatch is exercised end-to-end by the
        // use-case layer's mocked-gateway tests; this guards the
        // request-shape check in isolation without a live HTTP call.
        let adapter = HttpGatewayAdapter::new(
            "https://gateway.example.test/transact".into(),
            "https://gateway.example.test/tokenize".into(),
        );
        let credentials = GatewayCredentials {
            customer_number: "1".into(),
            merchant_number: "2".into(),
            dba_number: "3".into(),
            terminal_number: "4".into(),
            mac_secret: "s".into(),
        };
        let request = GatewayRequest::Void {
            tran_nbr: "1".into(),
            orig_auth_guid: "g".into(),
        };
        let result = adapter.tokenize(&credentials, request).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }
}
