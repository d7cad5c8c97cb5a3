//! Dataset-lock wait loop (§4.1, §5): registration must not race
//! server-side ingest, so drivers wait here before registering.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::Instant;

use super::{urls, Client};
use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct Lock {
    #[serde(default)]
    #[allow(dead_code)]
    reason: Option<String>,
}

/// Polls `GET /api/datasets/{id}/locks` at `poll_interval` until the locks
/// array is empty, or fails with `Error::LockTimeout` at `timeout`.
pub async fn wait_for_unlock(
    client: &Client,
    persistent_id: &str,
    dataset_id: u64,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let url = urls::locks_endpoint(&client.base_url, dataset_id)?;
        let locks: Vec<Lock> = client.get_json(url).await?;
        if locks.is_empty() {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::LockTimeout {
                persistent_id: persistent_id.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(poll_interval.min(deadline.saturating_duration_since(Instant::now())))
            .await;
    }
}

/// Resolves a persistent identifier to the dataset's numeric id, and
/// returns the parsed current inventory in the same round-trip (§4.1,
/// §4.7 step 2 both need the same response shape).
pub async fn fetch_dataset(client: &Client, persistent_id: &str) -> Result<urls::DatasetInventory> {
    let url = urls::dataset_endpoint(&client.base_url, persistent_id)?;
    let body = client.get_text(url).await?;
    urls::DatasetInventory::from_response_body(&body)
}

#[cfg(test)]
mod test {
    use super::*;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> Client {
        Client::new(Url::parse(&server.uri()).unwrap(), "test-key").unwrap()
    }

    #[tokio::test]
    async fn returns_immediately_when_locks_are_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/datasets/7/locks"))
            .respond_with(ResponseTemplate::new(200).set_body_json::<Vec<serde_json::Value>>(vec![]))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        wait_for_unlock(
            &client,
            "doi:10/ABC",
            7,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn times_out_when_lock_never_clears() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/datasets/7/locks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![serde_json::json!({"reason": "Ingest"})]))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let result = wait_for_unlock(
            &client,
            "doi:10/ABC",
            7,
            Duration::from_millis(20),
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(Error::LockTimeout { .. })));
    }
}
