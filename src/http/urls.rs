//! Query-string URL construction and the dataset-inventory/id-resolution
//! responses built from it (§4.1, §6.1).

use serde::Deserialize;
use url::Url;

use crate::checksum::Algorithm;
use crate::error::Result;

/// Builds `base.join(path)` with the given query parameters appended,
/// URL-encoded.
pub fn build_url(base: &Url, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = base.join(path)?;
    {
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
    }
    Ok(url)
}

pub fn upload_urls_endpoint(base: &Url, persistent_id: &str, size: u64) -> Result<Url> {
    build_url(
        base,
        "/api/datasets/:persistentId/uploadurls",
        &[("persistentId", persistent_id), ("size", &size.to_string())],
    )
}

pub fn dataset_endpoint(base: &Url, persistent_id: &str) -> Result<Url> {
    build_url(
        base,
        "/api/datasets/:persistentId/",
        &[("persistentId", persistent_id)],
    )
}

pub fn add_files_endpoint(base: &Url, persistent_id: &str) -> Result<Url> {
    build_url(
        base,
        "/api/datasets/:persistentId/addFiles",
        &[("persistentId", persistent_id)],
    )
}

pub fn replace_files_endpoint(base: &Url, persistent_id: &str) -> Result<Url> {
    build_url(
        base,
        "/api/datasets/:persistentId/replaceFiles",
        &[("persistentId", persistent_id)],
    )
}

pub fn native_add_endpoint(base: &Url, persistent_id: &str) -> Result<Url> {
    build_url(
        base,
        "/api/datasets/:persistentId/add",
        &[("persistentId", persistent_id)],
    )
}

pub fn native_replace_endpoint(base: &Url, file_id: u64) -> Result<Url> {
    build_url(base, &format!("/api/files/{file_id}/replace"), &[])
}

pub fn metadata_endpoint(base: &Url, file_id: u64) -> Result<Url> {
    build_url(base, &format!("/api/files/{file_id}/metadata"), &[])
}

pub fn locks_endpoint(base: &Url, dataset_id: u64) -> Result<Url> {
    build_url(base, &format!("/api/datasets/{dataset_id}/locks"), &[])
}

/// One entry in the dataset's current file listing.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryFile {
    #[serde(rename = "directoryLabel", default)]
    pub directory_label: String,
    #[serde(rename = "fileName")]
    pub display_name: String,
    #[serde(rename = "id")]
    pub file_id: u64,
    pub size: u64,
    #[serde(default)]
    pub checksum: Option<InventoryChecksum>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryChecksum {
    #[serde(rename = "type")]
    pub algo: Algorithm,
    pub value: String,
}

impl InventoryFile {
    pub fn relative_path(&self) -> std::path::PathBuf {
        if self.directory_label.is_empty() {
            std::path::PathBuf::from(&self.display_name)
        } else {
            std::path::Path::new(&self.directory_label).join(&self.display_name)
        }
    }
}

/// The dataset's current file listing, fetched once before classification
/// (§9 "Inventory-driven classification").
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetInventory {
    pub id: u64,
    pub files: Vec<InventoryFile>,
}

#[derive(Deserialize)]
struct DatasetResponse {
    data: DatasetResponseData,
}

#[derive(Deserialize)]
struct DatasetResponseData {
    id: u64,
    #[serde(rename = "latestVersion")]
    latest_version: LatestVersion,
}

#[derive(Deserialize)]
struct LatestVersion {
    files: Vec<InventoryFileWrapper>,
}

#[derive(Deserialize)]
struct InventoryFileWrapper {
    #[serde(rename = "dataFile")]
    data_file: InventoryFile,
    #[serde(rename = "directoryLabel", default)]
    directory_label: String,
}

impl DatasetInventory {
    /// Parses the raw `GET /api/datasets/:persistentId/` body (§6.1) into
    /// the flattened shape the orchestrator works with.
    pub fn from_response_body(body: &str) -> Result<Self> {
        let parsed: DatasetResponse = serde_json::from_str(body)?;
        let files = parsed
            .data
            .latest_version
            .files
            .into_iter()
            .map(|wrapper| {
                let mut file = wrapper.data_file;
                if file.directory_label.is_empty() {
                    file.directory_label = wrapper.directory_label;
                }
                file
            })
            .collect();
        Ok(DatasetInventory {
            id: parsed.data.id,
            files,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn upload_urls_endpoint_encodes_persistent_id_and_size() {
        let base = Url::parse("https://dataverse.example").unwrap();
        let url = upload_urls_endpoint(&base, "doi:10.5/ABC", 1024).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dataverse.example/api/datasets/:persistentId/uploadurls?persistentId=doi%3A10.5%2FABC&size=1024"
        );
    }

    #[test]
    fn dataset_inventory_parses_nested_response_shape() {
        let body = r#"{
            "data": {
                "id": 42,
                "latestVersion": {
                    "files": [
                        {
                            "directoryLabel": "sub",
                            "dataFile": {
                                "fileName": "a.txt",
                                "id": 7,
                                "size": 11,
                                "checksum": {"type": "MD5", "value": "abc123"}
                            }
                        }
                    ]
                }
            }
        }"#;
        let inventory = DatasetInventory::from_response_body(body).unwrap();
        assert_eq!(inventory.id, 42);
        assert_eq!(inventory.files.len(), 1);
        assert_eq!(inventory.files[0].directory_label, "sub");
        assert_eq!(inventory.files[0].file_id, 7);
        assert_eq!(inventory.files[0].relative_path(), std::path::PathBuf::from("sub/a.txt"));
    }
}
