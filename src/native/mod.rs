//! Native-upload protocol driver: multipart-form POST per package, with
//! retry/backoff, rate-limit pauses, and post-upload metadata
//! reconciliation against server-assigned file ids (§4.6).

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde_json::json;

use crate::config::Config;
use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::http::{urls, Client};
use crate::packager::{self, Package};

/// HTTP 400 message prefix the server uses when a zip archive contains
/// more files than it will unpack; this is the one terminal, non-retryable
/// native-path error (§4.6, §4.8).
pub const ZIP_LIMIT_PREFIX: &str = "number of files in the zip archive is over the limit";

/// Pause after a successful native POST, to stay under the repository's
/// rate limit (§5; the exact threshold is empirical, see design notes —
/// do not remove or shorten this without re-observing the limit).
pub const POST_SUCCESS_PAUSE: Duration = Duration::from_millis(700);

/// Pause after a failed native POST attempt, before the retry policy's own
/// backoff is applied.
pub const POST_FAILURE_PAUSE: Duration = Duration::from_millis(1000);

fn form_json(descriptor: &FileDescriptor, force_replace: Option<bool>) -> serde_json::Value {
    let mut value = json!({
        "description": descriptor.description,
        "categories": descriptor.categories,
        "restrict": descriptor.restrict,
    });
    if let Some(force_replace) = force_replace {
        value["forceReplace"] = json!(force_replace);
    }
    if !descriptor.directory_label.is_empty() {
        value["directoryLabel"] = json!(descriptor.directory_label);
    }
    value
}

/// Uploads one package: singleton packages send the member file directly,
/// multi-member packages are zipped into `tmp_dir` first. On success,
/// every member is marked via the caller-provided reconciliation pass.
pub async fn upload_package(
    client: &Client,
    config: &Config,
    package: &mut Package,
    tmp_dir: &Path,
) -> Result<()> {
    if package.is_singleton() {
        upload_one_file(client, config, &mut package.members[0]).await
    } else {
        let archive_path = packager::zip_package(package, tmp_dir)?;
        let representative = &package.members[0];
        let archive_name = format!("package-{}.zip", package.index);
        upload_archive(client, config, representative, &archive_path, &archive_name).await
    }
}

async fn upload_one_file(
    client: &Client,
    config: &Config,
    descriptor: &mut FileDescriptor,
) -> Result<()> {
    let url = if descriptor.to_replace {
        urls::native_replace_endpoint(
            &client.base_url,
            descriptor
                .file_id
                .ok_or_else(|| Error::configuration("replace descriptor missing file_id"))?,
        )?
    } else {
        urls::native_add_endpoint(&client.base_url, &config.persistent_id)?
    };

    let mut handle = descriptor.open_handle()?;
    let mut bytes = Vec::with_capacity(descriptor.size as usize);
    handle.read_to_end(&mut bytes)?;

    let json_data = form_json(descriptor, Some(true)).to_string();
    let display_name = descriptor.display_name.clone();
    let mime_type = descriptor.mime_type.clone();

    config
        .retry
        .run(|_attempt| {
            let url = url.clone();
            let json_data = json_data.clone();
            let bytes = bytes.clone();
            let display_name = display_name.clone();
            let mime_type = mime_type.clone();
            async move {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(display_name)
                    .mime_str(&mime_type)
                    .map_err(|e| Error::transport(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .text("jsonData", json_data)
                    .part("file", part);
                let result = client.post_multipart(url, form).await;
                match &result {
                    Ok(()) => tokio::time::sleep(POST_SUCCESS_PAUSE).await,
                    Err(_) => tokio::time::sleep(POST_FAILURE_PAUSE).await,
                }
                result
            }
        })
        .await
}

async fn upload_archive(
    client: &Client,
    config: &Config,
    representative: &FileDescriptor,
    archive_path: &Path,
    archive_name: &str,
) -> Result<()> {
    let url = urls::native_add_endpoint(&client.base_url, &config.persistent_id)?;
    let bytes = std::fs::read(archive_path)?;
    let json_data = form_json(representative, Some(true)).to_string();
    let archive_name = archive_name.to_string();

    config
        .retry
        .run(|_attempt| {
            let url = url.clone();
            let json_data = json_data.clone();
            let bytes = bytes.clone();
            let archive_name = archive_name.clone();
            async move {
                let part = reqwest::multipart::Part::bytes(bytes)
                    .file_name(archive_name)
                    .mime_str("application/zip")
                    .map_err(|e| Error::transport(e.to_string()))?;
                let form = reqwest::multipart::Form::new()
                    .text("jsonData", json_data)
                    .part("file", part);
                let result = client.post_multipart(url, form).await;
                match &result {
                    Ok(()) => tokio::time::sleep(POST_SUCCESS_PAUSE).await,
                    Err(_) => tokio::time::sleep(POST_FAILURE_PAUSE).await,
                }
                result
            }
        })
        .await
}

/// Post-upload metadata reconciliation (§4.6, §9 "Tabular extension
/// remap"): fetches the updated inventory, maps `path` (and its `.tab`
/// variant) to server-assigned file ids, and POSTs a metadata-only update
/// for every descriptor in `new ∪ metadata-only` that isn't a zip archive
/// the server already unpacked.
pub async fn reconcile_metadata(
    client: &Client,
    config: &Config,
    descriptors: &mut [FileDescriptor],
) -> Result<()> {
    let inventory = crate::http::lock::fetch_dataset(client, &config.persistent_id).await?;

    let mut by_path = std::collections::HashMap::new();
    for file in &inventory.files {
        by_path.insert(file.relative_path(), file.file_id);
    }

    for descriptor in descriptors.iter_mut() {
        if descriptor.inside_zip && !descriptor.enforce_metadata_update {
            continue;
        }
        if descriptor.display_name.ends_with(".zip") {
            continue;
        }

        let path = descriptor.relative_path();
        let mut tab_name = path.as_os_str().to_os_string();
        tab_name.push(".tab");
        let tab_path = std::path::PathBuf::from(tab_name);
        let file_id = by_path.get(&path).or_else(|| by_path.get(&tab_path)).copied();

        let Some(file_id) = file_id else {
            log::warn!("metadata reconciliation: no inventory match for {path:?}, skipping");
            continue;
        };

        descriptor.file_id = Some(file_id);
        let url = urls::metadata_endpoint(&client.base_url, file_id)?;
        let json_data = form_json(descriptor, None).to_string();

        config
            .retry
            .run(|_attempt| {
                let url = url.clone();
                let json_data = json_data.clone();
                async move {
                    let form = reqwest::multipart::Form::new().text("jsonData", json_data);
                    client.post_multipart(url, form).await
                }
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn form_json_omits_directory_label_when_empty_and_force_replace_when_none() {
        let mut d = FileDescriptor::from_path("a.txt");
        d.display_name = "a.txt".to_string();
        d.description = "a description".to_string();

        let native = form_json(&d, Some(true));
        assert_eq!(native["forceReplace"], json!(true));
        assert!(native.get("directoryLabel").is_none());

        let metadata = form_json(&d, None);
        assert!(metadata.get("forceReplace").is_none());

        d.directory_label = "sub".to_string();
        let with_label = form_json(&d, Some(true));
        assert_eq!(with_label["directoryLabel"], json!("sub"));
    }

    #[test]
    fn zip_limit_prefix_matches_error_classifier() {
        let message = format!("{ZIP_LIMIT_PREFIX}: got 120000, limit is 1000");
        let err = Error::validation(message);
        assert!(err.is_zip_limit());
    }
}
