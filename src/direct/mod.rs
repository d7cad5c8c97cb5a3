//! Direct-upload protocol driver: ticket request, single-part or
//! multipart PUT, completion/abort, and final registration (§4.5, §6.1).

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::config::Config;
use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::http::{urls, Client};

/// The server's response to an upload-ticket request. Deserialized by
/// inspecting whether the payload carries a `urls` field, mirroring the
/// server's own single-part/multipart discriminant (§3).
#[derive(Debug, Clone)]
pub enum Ticket {
    SinglePart {
        url: Url,
        storage_identifier: String,
    },
    Multipart {
        urls: BTreeMap<u32, Url>,
        part_size: u64,
        /// Relative to the server base, not an absolute URL (§6.1); joined
        /// against `client.base_url` at request time.
        complete_path: String,
        /// Relative to the server base, same as `complete_path`.
        abort_path: String,
        storage_identifier: String,
    },
}

impl<'de> Deserialize<'de> for Ticket {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            url: Option<Url>,
            urls: Option<BTreeMap<String, Url>>,
            #[serde(rename = "partSize")]
            part_size: Option<u64>,
            complete: Option<String>,
            abort: Option<String>,
            #[serde(rename = "storageIdentifier")]
            storage_identifier: Option<String>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let storage_identifier = raw
            .storage_identifier
            .ok_or_else(|| serde::de::Error::missing_field("storageIdentifier"))?;

        if let Some(urls) = raw.urls {
            let part_size = raw
                .part_size
                .ok_or_else(|| serde::de::Error::missing_field("partSize"))?;
            let complete_path = raw
                .complete
                .ok_or_else(|| serde::de::Error::missing_field("complete"))?;
            let abort_path = raw
                .abort
                .ok_or_else(|| serde::de::Error::missing_field("abort"))?;
            let urls = urls
                .into_iter()
                .map(|(k, v)| {
                    k.parse::<u32>()
                        .map(|k| (k, v))
                        .map_err(|_| serde::de::Error::custom(format!("non-numeric part key {k:?}")))
                })
                .collect::<std::result::Result<BTreeMap<u32, Url>, D::Error>>()?;
            Ok(Ticket::Multipart {
                urls,
                part_size,
                complete_path,
                abort_path,
                storage_identifier,
            })
        } else {
            let url = raw
                .url
                .ok_or_else(|| serde::de::Error::missing_field("url"))?;
            Ok(Ticket::SinglePart {
                url,
                storage_identifier,
            })
        }
    }
}

#[derive(Deserialize)]
struct TicketResponse {
    data: Ticket,
}

/// Registration/replacement record as it goes over the wire (§6.2). Never
/// derived directly on `FileDescriptor`: `to_replace` must always be
/// elided and `file_id` only conditionally included.
#[derive(Debug, Serialize)]
pub struct FileRecord {
    #[serde(rename = "directoryLabel", skip_serializing_if = "String::is_empty")]
    pub directory_label: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub categories: Vec<String>,
    pub restrict: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "tabIngest")]
    pub tab_ingest: bool,
    #[serde(rename = "storageIdentifier")]
    pub storage_identifier: String,
    #[serde(rename = "fileToReplaceId", skip_serializing_if = "Option::is_none")]
    pub file_to_replace_id: Option<u64>,
}

impl FileDescriptor {
    pub fn to_record(&self) -> FileRecord {
        FileRecord {
            directory_label: self.directory_label.clone(),
            file_name: self.display_name.clone(),
            mime_type: self.mime_type.clone(),
            categories: self.categories.clone(),
            restrict: self.restrict,
            description: self.description.clone(),
            tab_ingest: self.tab_ingest,
            storage_identifier: self.storage_identifier.clone().unwrap_or_default(),
            file_to_replace_id: if self.to_replace { self.file_id } else { None },
        }
    }
}

/// Step 1: `GET /uploadurls?persistentId=…&size=…`.
pub async fn request_ticket(client: &Client, config: &Config, size: u64) -> Result<Ticket> {
    let url = urls::upload_urls_endpoint(&client.base_url, &config.persistent_id, size)?;
    let resp: TicketResponse = client
        .get_json(url)
        .await
        .map_err(|e| Error::ticket(e.to_string()))?;
    Ok(resp.data)
}

/// Step 2: single-part PUT. Feeds bytes through the checksum state as they
/// stream, stores `storage_identifier`, and finalizes the checksum.
pub async fn upload_single_part(
    client: &Client,
    descriptor: &mut FileDescriptor,
    url: Url,
    storage_identifier: String,
) -> Result<()> {
    let mut handle = descriptor.open_handle()?;
    let mut body = Vec::with_capacity(descriptor.size as usize);
    handle.read_to_end(&mut body)?;
    descriptor.feed_checksum(&body)?;

    client
        .put_bytes(url, body, &[("x-amz-tagging", "dv-state=temp")])
        .await?;

    descriptor.storage_identifier = Some(storage_identifier);
    descriptor.apply_checksum()?;
    Ok(())
}

/// Step 3: multipart PUT-per-part. Reads the source at `part_size`
/// boundaries, uploads parts strictly in order (§5), feeding each chunk
/// through the checksum state, and records the returned ETags. In-memory
/// descriptors cannot use this path (§4.5 chunking restriction).
pub async fn upload_multipart(
    client: &Client,
    descriptor: &mut FileDescriptor,
    part_urls: &BTreeMap<u32, Url>,
    part_size: u64,
) -> Result<BTreeMap<u32, String>> {
    if descriptor.is_in_memory() {
        return Err(Error::validation(
            "in-memory descriptors cannot use multipart direct upload",
        ));
    }

    let mut handle = descriptor.open_handle()?;
    let mut etags = BTreeMap::new();

    for (&part_number, url) in part_urls.iter() {
        let offset = (part_number as u64 - 1) * part_size;
        handle.seek(SeekFrom::Start(offset))?;

        let mut buf = vec![0u8; part_size as usize];
        let mut filled = 0usize;
        while filled < buf.len() {
            let n = handle.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        if buf.is_empty() {
            continue;
        }
        descriptor.feed_checksum(&buf)?;

        let etag = client
            .put_bytes(url.clone(), buf, &[])
            .await?
            .ok_or_else(|| Error::transport(format!("part {part_number} response had no ETag")))?;
        etags.insert(part_number, etag);
    }

    Ok(etags)
}

/// Step 4: `PUT complete_path` with `{"1": etag1, "2": etag2, …}`.
/// `complete_path` is relative to the server base (§6.1), so it's joined
/// against `client.base_url` the way `urls::build_url` joins any other path.
pub async fn complete(client: &Client, complete_path: &str, etags: &BTreeMap<u32, String>) -> Result<()> {
    let url = client.base_url.join(complete_path)?;
    let body: BTreeMap<String, &String> = etags
        .iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    client.put_json(url, &body).await
}

/// Step 5: `DELETE abort_path`, issued on any part failure. Also relative to
/// the server base.
pub async fn abort(client: &Client, abort_path: &str) -> Result<()> {
    let url = client.base_url.join(abort_path)?;
    client.delete(url).await
}

/// Runs one descriptor through ticket → (single-part | multipart) →
/// complete, aborting on any part/complete failure (§4.5, §4.8).
pub async fn upload_descriptor(
    client: &Client,
    config: &Config,
    descriptor: &mut FileDescriptor,
) -> Result<()> {
    let ticket = request_ticket(client, config, descriptor.size).await?;
    match ticket {
        Ticket::SinglePart {
            url,
            storage_identifier,
        } => upload_single_part(client, descriptor, url, storage_identifier).await,
        Ticket::Multipart {
            urls: part_urls,
            part_size,
            complete_path,
            abort_path,
            storage_identifier,
        } => {
            match upload_multipart(client, descriptor, &part_urls, part_size).await {
                Ok(etags) => match complete(client, &complete_path, &etags).await {
                    Ok(()) => {
                        descriptor.storage_identifier = Some(storage_identifier);
                        descriptor.apply_checksum()?;
                        Ok(())
                    }
                    Err(complete_err) => {
                        let _ = abort(client, &abort_path).await;
                        Err(complete_err)
                    }
                },
                Err(part_err) => {
                    let _ = abort(client, &abort_path).await;
                    Err(part_err)
                }
            }
        }
    }
}

/// Step 6: registration, partitioned into `new` and `replace` groups, each
/// posted once as a JSON array of records (§4.5 registration grouping).
pub async fn register(
    client: &Client,
    config: &Config,
    descriptors: &[FileDescriptor],
) -> Result<()> {
    let (replace, new): (Vec<&FileDescriptor>, Vec<&FileDescriptor>) =
        descriptors.iter().partition(|d| d.to_replace);

    if !new.is_empty() {
        post_registration(client, config, &new, false).await?;
    }
    if !replace.is_empty() {
        post_registration(client, config, &replace, true).await?;
    }
    Ok(())
}

async fn post_registration(
    client: &Client,
    config: &Config,
    descriptors: &[&FileDescriptor],
    replace: bool,
) -> Result<()> {
    let records: Vec<FileRecord> = descriptors.iter().map(|d| d.to_record()).collect();
    let json_data = serde_json::to_string(&records)?;
    let form = reqwest::multipart::Form::new().text("jsonData", json_data);

    let url = if replace {
        urls::replace_files_endpoint(&client.base_url, &config.persistent_id)?
    } else {
        urls::add_files_endpoint(&client.base_url, &config.persistent_id)?
    };
    client.post_multipart(url, form).await
}
