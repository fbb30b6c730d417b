//! Xray StatsService client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::uri::PathAndQuery;
use meter_config::StatsConfig;
use meter_proto::{CounterRecord, decode_stats, encode_query_request};
use tonic::Request;
use tonic::client::Grpc;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::codec::RawCodec;
use crate::error::AgentError;

/// Full method path of `QueryStats`.
pub const QUERY_STATS_PATH: &str = "/v2ray.core.app.stats.command.StatsService/QueryStats";

/// Source of raw counter batches.
#[async_trait]
pub trait StatsSource: Send {
    /// Fetch every counter matching the configured pattern.
    async fn query(&mut self) -> Result<Vec<CounterRecord>, AgentError>;
}

/// gRPC client for the Xray API inbound.
///
/// The channel is opened lazily and dropped after any transport failure, so the next
/// query reconnects.
#[derive(Debug)]
pub struct StatsClient {
    endpoint: Endpoint,
    channel: Option<Channel>,
    request: Bytes,
    timeout: Duration,
}

impl StatsClient {
    pub fn new(config: &StatsConfig) -> Result<Self, AgentError> {
        let uri = endpoint_uri(&config.endpoint);
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| AgentError::InvalidEndpoint(format!("{uri}: {e}")))?
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout());

        Ok(Self {
            endpoint,
            channel: None,
            request: encode_query_request(&config.pattern, config.reset),
            timeout: config.timeout(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    async fn channel(&mut self) -> Result<Channel, AgentError> {
        if let Some(ref channel) = self.channel {
            return Ok(channel.clone());
        }
        let channel = self.endpoint.connect().await?;
        debug!(endpoint = %self.endpoint.uri(), "connected to stats service");
        self.channel = Some(channel.clone());
        Ok(channel)
    }

    async fn call(&mut self) -> Result<Bytes, AgentError> {
        let mut grpc = Grpc::new(self.channel().await?);
        grpc.ready().await?;

        let response = grpc
            .unary(
                Request::new(self.request.clone()),
                PathAndQuery::from_static(QUERY_STATS_PATH),
                RawCodec,
            )
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl StatsSource for StatsClient {
    async fn query(&mut self) -> Result<Vec<CounterRecord>, AgentError> {
        let timeout = self.timeout;
        let result = match tokio::time::timeout(timeout, self.call()).await {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout),
        };

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                if e.is_transport() {
                    self.channel = None;
                }
                return Err(e);
            }
        };

        let records = decode_stats(&body)?;
        debug!(bytes = body.len(), records = records.len(), "stats response decoded");
        Ok(records)
    }
}

/// Accept `host:port` as well as a full URI.
fn endpoint_uri(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_is_added_when_missing() {
        assert_eq!(endpoint_uri("127.0.0.1:10085"), "http://127.0.0.1:10085");
        assert_eq!(endpoint_uri(" xray:10085 "), "http://xray:10085");
        assert_eq!(endpoint_uri("https://api.local:443"), "https://api.local:443");
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = StatsConfig {
            endpoint: "bad host:1".into(),
            ..Default::default()
        };
        assert!(matches!(
            StatsClient::new(&config),
            Err(AgentError::InvalidEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = StatsConfig {
            endpoint: addr.to_string(),
            timeout_secs: 2,
            connect_timeout_secs: 1,
            ..Default::default()
        };
        let mut client = StatsClient::new(&config).unwrap();
        let err = client.query().await.unwrap_err();
        assert!(err.is_transport(), "{err:?}");
        assert!(!client.is_connected());
    }
}
