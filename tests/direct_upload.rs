//! End-to-end scenario 1 from the testable-properties list: three new
//! files, direct path, single-part, ending in one grouped `addFiles` call.

use std::sync::Arc;

use dvuploader::config::Config;
use dvuploader::descriptor::FileDescriptor;
use dvuploader::http::Client;
use dvuploader::orchestrator::{self, DescriptorOutcome};
use dvuploader::progress::NoopProgress;

use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn config_for(server: &MockServer, persistent_id: &str) -> Config {
    let base_url = Url::parse(&server.uri()).unwrap();
    Config::from_env("test-key".to_string(), base_url, persistent_id.to_string()).unwrap()
}

#[tokio::test]
async fn three_new_files_go_through_direct_single_part_and_one_add_files_call() {
    let server = MockServer::start().await;
    let persistent_id = "doi:10/ABC";

    Mock::given(method("GET"))
        .and(path("/api/datasets/:persistentId/"))
        .and(query_param("persistentId", persistent_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "id": 99,
                "latestVersion": { "files": [] }
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/datasets/:persistentId/uploadurls"))
        .and(query_param("size", "1024"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": { "url": format!("{}/s3/probe", server.uri()), "storageIdentifier": "s3://bucket/probe" }
        })))
        .mount(&server)
        .await;

    for (name, size) in [("a.txt", 1024usize), ("b.txt", 2048), ("c.txt", 3072)] {
        Mock::given(method("GET"))
            .and(path("/api/datasets/:persistentId/uploadurls"))
            .and(query_param("size", size.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "url": format!("{}/s3/{}", server.uri(), name),
                    "storageIdentifier": format!("s3://bucket/{}", name)
                }
            })))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path(format!("/s3/{name}")))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/api/datasets/99/locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json::<Vec<serde_json::Value>>(vec![]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/datasets/:persistentId/addFiles"))
        .and(query_param("persistentId", persistent_id))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let config = config_for(&server, persistent_id).await;
    let client = Client::new(config.base_url.clone(), config.api_key.clone()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut descriptors = Vec::new();
    for (name, size) in [("a.txt", 1024), ("b.txt", 2048), ("c.txt", 3072)] {
        let file_path = dir.path().join(name);
        std::fs::write(&file_path, vec![0u8; size]).unwrap();
        descriptors.push(FileDescriptor::from_path(file_path));
    }

    let outcome = orchestrator::run(&client, &config, descriptors, Arc::new(NoopProgress))
        .await
        .unwrap();

    assert!(!outcome.has_failures());
    let uploaded: Vec<_> = outcome
        .results
        .iter()
        .filter_map(|r| match r {
            DescriptorOutcome::Uploaded { path } => Some(path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(uploaded.len(), 3);
}
