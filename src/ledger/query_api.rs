//! GraphQL client for the position-history indexer.

use super::{EventQuery, RemoteError, UrnIlk};
use crate::domain::RawFrobEvent;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const FROB_QUERY: &str = "query AllVatFrobs($filter: VatFrobFilter) { \
     allVatFrobs(filter: $filter) { nodes { ilkIdentifier dink dart ilk { rate } \
     tx { transactionHash txFrom era { iso } } urn { nodes { art ink } } } } }";

/// Event source backed by the indexer's `allVatFrobs` query.
#[derive(Debug, Clone)]
pub struct QueryApiClient {
    client: Client,
    url: String,
}

impl QueryApiClient {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    async fn post_query(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, RemoteError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(&payload)
                .send()
                .await
                .map_err(|e| {
                    backoff::Error::transient(RemoteError::NetworkError(e.to_string()))
                })?;

            let status = response.status();
            if status == 429 {
                warn!(url = %self.url, "indexer rate limited, backing off");
                return Err(backoff::Error::transient(RemoteError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(RemoteError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(RemoteError::HttpError {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| backoff::Error::permanent(RemoteError::ParseError(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl EventQuery for QueryApiClient {
    async fn cdp_events(&self, targets: &[UrnIlk]) -> Result<Vec<RawFrobEvent>, RemoteError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }
        debug!(targets = targets.len(), "querying position history");
        let body = self.post_query(build_frob_query(targets)).await?;
        parse_frob_response(&body)
    }
}

/// Request body with one `or` clause per (ilk, urn) pair. Urns are matched
/// lowercased. Filter values travel as GraphQL variables.
fn build_frob_query(targets: &[UrnIlk]) -> serde_json::Value {
    let clauses: Vec<serde_json::Value> = targets
        .iter()
        .map(|t| {
            serde_json::json!({
                "ilkIdentifier": { "equalTo": t.ilk.as_str() },
                "urnIdentifier": { "equalTo": t.urn.address().to_lowercase() },
            })
        })
        .collect();
    serde_json::json!({
        "query": FROB_QUERY,
        "variables": { "filter": { "or": clauses } },
    })
}

fn parse_frob_response(body: &serde_json::Value) -> Result<Vec<RawFrobEvent>, RemoteError> {
    if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RemoteError::Other(format!("indexer query failed: {}", message)));
        }
    }

    let nodes = body
        .pointer("/data/allVatFrobs/nodes")
        .ok_or_else(|| RemoteError::ParseError("missing data.allVatFrobs.nodes".to_string()))?;

    serde_json::from_value(nodes.clone()).map_err(|e| RemoteError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Ilk, Urn};

    fn frob_json(hash: &str) -> serde_json::Value {
        serde_json::json!({
            "ilkIdentifier": "ETH-A",
            "dink": "1000000000000000000",
            "dart": "0",
            "ilk": { "rate": "1000000000000000000000000000" },
            "tx": {
                "transactionHash": hash,
                "txFrom": "0x00000000000000000000000000000000000000aa",
                "era": { "iso": "2019-11-13T17:48:05+00:00" }
            },
            "urn": { "nodes": [{ "art": "0", "ink": "1000000000000000000" }] }
        })
    }

    #[test]
    fn test_query_has_one_clause_per_target() {
        let payload = build_frob_query(&[
            UrnIlk {
                urn: Urn::new("0xABCdef"),
                ilk: Ilk::new("ETH-A"),
            },
            UrnIlk {
                urn: Urn::new("0x123"),
                ilk: Ilk::new("BAT-A"),
            },
        ]);
        let query = payload["query"].as_str().unwrap();
        assert!(query.contains("allVatFrobs(filter: $filter)"));
        assert!(query.contains("urn { nodes { art ink } }"));
        assert_eq!(
            payload["variables"]["filter"]["or"],
            serde_json::json!([
                {
                    "ilkIdentifier": { "equalTo": "ETH-A" },
                    "urnIdentifier": { "equalTo": "0xabcdef" }
                },
                {
                    "ilkIdentifier": { "equalTo": "BAT-A" },
                    "urnIdentifier": { "equalTo": "0x123" }
                }
            ])
        );
    }

    #[test]
    fn test_quoted_ilk_stays_out_of_query_text() {
        let payload = build_frob_query(&[UrnIlk {
            urn: Urn::new("0x1"),
            ilk: Ilk::new("ETH\"-A"),
        }]);
        let query = payload["query"].as_str().unwrap();
        assert!(!query.contains("ETH"));
        assert_eq!(
            payload["variables"]["filter"]["or"][0]["ilkIdentifier"]["equalTo"],
            "ETH\"-A"
        );
        let body = serde_json::to_string(&payload).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(reparsed, payload);
    }

    #[test]
    fn test_parse_response_nodes() {
        let body = serde_json::json!({
            "data": { "allVatFrobs": { "nodes": [frob_json("0x01"), frob_json("0x02")] } }
        });
        let events = parse_frob_response(&body).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].tx.transaction_hash, "0x01");
        assert_eq!(events[1].ilk_identifier, "ETH-A");
        assert_eq!(events[1].urn.nodes[0].ink, "1000000000000000000");
    }

    #[test]
    fn test_parse_response_graphql_errors() {
        let body = serde_json::json!({
            "errors": [{ "message": "syntax error" }],
            "data": null
        });
        let err = parse_frob_response(&body).unwrap_err();
        assert_eq!(
            err,
            RemoteError::Other("indexer query failed: syntax error".to_string())
        );
    }

    #[test]
    fn test_parse_response_missing_nodes() {
        let body = serde_json::json!({ "data": {} });
        assert!(matches!(
            parse_frob_response(&body),
            Err(RemoteError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_targets_skip_request() {
        let client = QueryApiClient::new("http://127.0.0.1:1/graphql".to_string());
        let events = client.cdp_events(&[]).await.unwrap();
        assert!(events.is_empty());
    }
}
