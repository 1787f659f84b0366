//! OKX v5 REST client.
//!
//! Handles:
//! - Request signing (HMAC-SHA256 over timestamp + method + path + body, base64)
//! - Routing to live or demo trading
//! - Decoding the `{code, msg, data}` envelope into typed data

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use crate::config::{Destination, OkxCredentials, TraderConfig};
use crate::error::ApiError;

use super::rest::OkxApi;
use super::types::*;

const SIMULATED_TRADING: &str = "x-simulated-trading";

/// Signed REST client for OKX.
pub struct OkxClient {
    http: Client,
    base_url: String,
    credentials: OkxCredentials,
    destination: Destination,
}

impl OkxClient {
    /// Create a new client. Does not touch the network.
    pub fn new(credentials: OkxCredentials, config: &TraderConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let http = Client::builder().timeout(config.http_timeout()).build()?;

        Ok(Self {
            http,
            base_url,
            credentials,
            destination: config.destination,
        })
    }

    /// Sign a request: base64(HMAC-SHA256(secret, timestamp + METHOD + path + body)).
    fn sign(
        &self,
        timestamp: &str,
        method: &Method,
        request_path: &str,
        body: &str,
    ) -> Result<String, ApiError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.credentials.secret_key.as_bytes())
            .map_err(|e| ApiError::Signing(e.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_str().as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Headers common to every request; auth headers only when `signed`.
    fn build_headers(
        &self,
        method: &Method,
        request_path: &str,
        body: &str,
        signed: bool,
    ) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.destination == Destination::Demo {
            headers.insert(
                HeaderName::from_static(SIMULATED_TRADING),
                HeaderValue::from_static("1"),
            );
        }

        if signed {
            let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let signature = self.sign(&timestamp, method, request_path, body)?;

            headers.insert(
                HeaderName::from_static("ok-access-key"),
                HeaderValue::from_str(&self.credentials.api_key)?,
            );
            headers.insert(
                HeaderName::from_static("ok-access-sign"),
                HeaderValue::from_str(&signature)?,
            );
            headers.insert(
                HeaderName::from_static("ok-access-timestamp"),
                HeaderValue::from_str(&timestamp)?,
            );
            headers.insert(
                HeaderName::from_static("ok-access-passphrase"),
                HeaderValue::from_str(&self.credentials.passphrase)?,
            );
        }

        Ok(headers)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let raw = format!("{}{}", self.base_url, path);
        let url = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        url.map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        signed: bool,
    ) -> Result<Vec<T>, ApiError> {
        let url = self.url(path, query)?;
        let request_path = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };

        debug!(path = %request_path, "OKX GET");

        let headers = self.build_headers(&Method::GET, &request_path, "", signed)?;
        let response = self.http.get(url).headers(headers).send().await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Vec<T>, ApiError> {
        unwrap_envelope(self.post_envelope(path, body).await?)
    }

    /// POST and return the raw envelope, for endpoints without per-item result codes.
    async fn post_envelope<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Envelope<T>, ApiError> {
        let url = self.url(path, &[])?;
        let body = serde_json::to_string(body)?;

        debug!(path = %path, body = %body, "OKX POST");

        let headers = self.build_headers(&Method::POST, url.path(), &body, true)?;
        let response = self
            .http
            .post(url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Self::read_envelope(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<Vec<T>, ApiError> {
        unwrap_envelope(Self::read_envelope(response).await?)
    }

    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Envelope<T>, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            // OKX usually still sends an envelope explaining the failure
            if let Ok(env) = serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
                if env.code != "0" {
                    return Err(ApiError::Exchange {
                        code: env.code,
                        msg: env.msg,
                    });
                }
            }
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Accept the envelope when it succeeded or carries per-item results to inspect.
pub(crate) fn unwrap_envelope<T>(env: Envelope<T>) -> Result<Vec<T>, ApiError> {
    if env.code == "0" || !env.data.is_empty() {
        Ok(env.data)
    } else {
        Err(ApiError::Exchange {
            code: env.code,
            msg: env.msg,
        })
    }
}

#[async_trait]
impl OkxApi for OkxClient {
    async fn server_time(&self) -> Result<Vec<ServerTime>, ApiError> {
        self.get("/api/v5/public/time", &[], false).await
    }

    async fn account_balance(&self, ccy: &str) -> Result<Vec<AccountBalance>, ApiError> {
        self.get("/api/v5/account/balance", &[("ccy", ccy)], true).await
    }

    async fn positions(
        &self,
        inst_type: &str,
        inst_id: Option<&str>,
    ) -> Result<Vec<PositionData>, ApiError> {
        let mut query = vec![("instType", inst_type)];
        if let Some(id) = inst_id {
            query.push(("instId", id));
        }
        self.get("/api/v5/account/positions", &query, true).await
    }

    async fn set_leverage(&self, req: &SetLeverageRequest) -> Result<(), ApiError> {
        // data echoes the request back and carries no sCode, so only the envelope code counts
        let env: Envelope<serde_json::Value> =
            self.post_envelope("/api/v5/account/set-leverage", req).await?;
        if env.code != "0" {
            return Err(ApiError::Exchange {
                code: env.code,
                msg: env.msg,
            });
        }
        Ok(())
    }

    async fn place_order(&self, req: &PlaceOrderRequest) -> Result<Vec<OrderAck>, ApiError> {
        self.post("/api/v5/trade/order", req).await
    }

    async fn place_algo_order(
        &self,
        req: &PlaceAlgoOrderRequest,
    ) -> Result<Vec<AlgoAck>, ApiError> {
        self.post("/api/v5/trade/order-algo", req).await
    }

    async fn pending_algo_orders(
        &self,
        inst_id: &str,
        ord_type: &str,
    ) -> Result<Vec<AlgoOrder>, ApiError> {
        self.get(
            "/api/v5/trade/orders-algo-pending",
            &[
                ("instType", INST_TYPE_SWAP),
                ("instId", inst_id),
                ("ordType", ord_type),
            ],
            true,
        )
        .await
    }

    async fn cancel_algo_orders(
        &self,
        reqs: &[CancelAlgoRequest],
    ) -> Result<Vec<AlgoAck>, ApiError> {
        self.post("/api/v5/trade/cancel-algos", reqs).await
    }

    async fn ticker(&self, inst_id: &str) -> Result<Vec<Ticker>, ApiError> {
        self.get("/api/v5/market/ticker", &[("instId", inst_id)], false)
            .await
    }

    async fn instruments(
        &self,
        inst_type: &str,
        inst_id: &str,
    ) -> Result<Vec<Instrument>, ApiError> {
        self.get(
            "/api/v5/public/instruments",
            &[("instType", inst_type), ("instId", inst_id)],
            false,
        )
        .await
    }
}
