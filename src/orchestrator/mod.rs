//! The end-to-end upload orchestrator (§4.7): prepare, classify against
//! the current dataset inventory, sort, probe direct-upload capability,
//! dispatch to the direct or native driver with bounded concurrency, and
//! report per-descriptor outcomes.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::descriptor::FileDescriptor;
use crate::error::{Error, Result};
use crate::http::{lock, urls, Client};
use crate::direct;
use crate::native;
use crate::packager;
use crate::progress::ProgressSink;

/// What became of one descriptor by the end of the run. Failures never
/// fail siblings (§7 propagation policy).
pub enum DescriptorOutcome {
    Uploaded { path: PathBuf },
    MetadataUpdated { path: PathBuf },
    Skipped { path: PathBuf, reason: String },
    Failed { path: PathBuf, error: Error },
}

#[derive(Default)]
pub struct Outcome {
    pub results: Vec<DescriptorOutcome>,
}

impl Outcome {
    pub fn has_failures(&self) -> bool {
        self.results
            .iter()
            .any(|r| matches!(r, DescriptorOutcome::Failed { .. }))
    }
}

/// Runs every step of §4.7 over `descriptors` and returns the aggregated
/// outcome. Registration/reconciliation failures (batch-level) surface as
/// `Err`; individual descriptor failures are captured in the returned
/// `Outcome` instead. `progress` is notified as each descriptor's transfer
/// starts and finishes.
pub async fn run(
    client: &Client,
    config: &Config,
    mut descriptors: Vec<FileDescriptor>,
    progress: Arc<dyn ProgressSink>,
) -> Result<Outcome> {
    let mut outcome = Outcome::default();

    // Step 1: Prepare.
    let mut prepared = Vec::with_capacity(descriptors.len());
    for mut d in descriptors.drain(..) {
        match d.prepare() {
            Ok(()) => prepared.push(d),
            Err(error) => outcome.results.push(DescriptorOutcome::Failed {
                path: d.relative_path(),
                error,
            }),
        }
    }

    if prepared.is_empty() {
        return Ok(outcome);
    }

    reject_duplicate_paths(&prepared)?;

    // Step 2: Classify against one inventory snapshot (§9 "Inventory-driven
    // classification" — fetched exactly once, never re-read mid-run).
    let inventory = lock::fetch_dataset(client, &config.persistent_id).await?;
    let dataset_id = inventory.id;
    let mut by_path = std::collections::HashMap::new();
    for file in &inventory.files {
        by_path.insert(file.relative_path(), file);
    }

    let mut to_process = Vec::with_capacity(prepared.len());
    for mut d in prepared {
        if let Some(matched) = by_path.get(&d.relative_path()) {
            d.to_replace = true;
            d.file_id = Some(matched.file_id);
            if config.replace_existing {
                if d.size != matched.size {
                    d.unchanged_data = false;
                } else {
                    match classify_unchanged(&mut d, matched, config) {
                        Ok(()) => {}
                        Err(error) => {
                            outcome.results.push(DescriptorOutcome::Failed {
                                path: d.relative_path(),
                                error,
                            });
                            continue;
                        }
                    }
                }
                to_process.push(d);
            } else {
                outcome.results.push(DescriptorOutcome::Skipped {
                    path: d.relative_path(),
                    reason: "already present in dataset, replace_existing is false".to_string(),
                });
            }
        } else {
            to_process.push(d);
        }
    }

    // Step 3: Sort ascending by size.
    to_process.sort_by_key(|d| d.size);

    let (metadata_only, needs_upload): (Vec<_>, Vec<_>) = to_process
        .into_iter()
        .partition(|d| d.to_replace && d.unchanged_data);

    if needs_upload.is_empty() && metadata_only.is_empty() {
        return Ok(outcome);
    }

    // Step 4: Capability probe.
    let direct_supported = if needs_upload.is_empty() {
        false
    } else {
        probe_direct_capability(client, config).await?
    };

    // Step 5: Dispatch.
    let mut metadata_only = metadata_only;
    if direct_supported && !config.force_native {
        dispatch_direct(
            client,
            config,
            dataset_id,
            needs_upload,
            &mut outcome,
            &progress,
        )
        .await?;
    } else if !needs_upload.is_empty() {
        dispatch_native(client, config, needs_upload, &mut outcome, &progress).await?;
    }

    if !metadata_only.is_empty() {
        match native::reconcile_metadata(client, config, &mut metadata_only).await {
            Ok(()) => {
                for d in &metadata_only {
                    outcome.results.push(DescriptorOutcome::MetadataUpdated {
                        path: d.relative_path(),
                    });
                }
            }
            Err(error) => return Err(error),
        }
    }

    Ok(outcome)
}

/// Sizes already matched; compare checksums to decide whether the data
/// truly changed. A mismatch just means the data changed (`unchanged_data
/// = false`), not an error — `Error::ChecksumMismatch` is reserved for the
/// drivers' own post-transfer verification, not this same-size comparison.
fn classify_unchanged(
    descriptor: &mut FileDescriptor,
    matched: &urls::InventoryFile,
    config: &Config,
) -> Result<()> {
    match &matched.checksum {
        Some(checksum) if checksum.algo == config.checksum_algo => {
            descriptor.update_checksum_chunked(64 * 1024)?;
            descriptor.apply_checksum()?;
            let computed = descriptor.checksum_value.clone().unwrap_or_default();
            descriptor.unchanged_data = computed == checksum.value;
            Ok(())
        }
        _ => {
            descriptor.unchanged_data = false;
            Ok(())
        }
    }
}

fn reject_duplicate_paths(descriptors: &[FileDescriptor]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for d in descriptors {
        if !seen.insert(d.relative_path()) {
            return Err(Error::configuration(format!(
                "duplicate descriptor path in this run: {:?}",
                d.relative_path()
            )));
        }
    }
    Ok(())
}

async fn probe_direct_capability(client: &Client, config: &Config) -> Result<bool> {
    let url = urls::upload_urls_endpoint(&client.base_url, &config.persistent_id, 1024)?;
    let status = client.get_status(url).await?;
    match status {
        404 => Ok(false),
        200..=299 => Ok(true),
        other => Err(Error::Capability { status: other }),
    }
}

async fn dispatch_direct(
    client: &Client,
    config: &Config,
    dataset_id: u64,
    descriptors: Vec<FileDescriptor>,
    outcome: &mut Outcome,
    progress: &Arc<dyn ProgressSink>,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
    let mut handles = Vec::with_capacity(descriptors.len());
    for mut d in descriptors {
        let semaphore = semaphore.clone();
        let client = client.clone();
        let config = config.clone();
        let progress = progress.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            progress.descriptor_started(&d.display_name, d.size);
            let result = direct::upload_descriptor(&client, &config, &mut d).await;
            progress.descriptor_finished(&d.display_name, result.is_ok());
            (d, result)
        }));
    }

    let mut succeeded = Vec::new();
    for handle in handles {
        let (d, result) = handle.await.expect("descriptor task panicked");
        match result {
            Ok(()) => succeeded.push(d),
            Err(error) => outcome.results.push(DescriptorOutcome::Failed {
                path: d.relative_path(),
                error,
            }),
        }
    }

    if succeeded.is_empty() {
        return Ok(());
    }

    lock::wait_for_unlock(
        client,
        &config.persistent_id,
        dataset_id,
        config.lock_wait_interval,
        config.lock_timeout,
    )
    .await?;

    direct::register(client, config, &succeeded).await?;
    for d in &succeeded {
        outcome.results.push(DescriptorOutcome::Uploaded {
            path: d.relative_path(),
        });
    }
    Ok(())
}

async fn dispatch_native(
    client: &Client,
    config: &Config,
    descriptors: Vec<FileDescriptor>,
    outcome: &mut Outcome,
    progress: &Arc<dyn ProgressSink>,
) -> Result<()> {
    let tmp_dir = tempfile::tempdir()?;
    let packages = packager::distribute_files(descriptors, config.max_package_size);

    let semaphore = Arc::new(Semaphore::new(config.parallelism.max(1)));
    let mut handles = Vec::with_capacity(packages.len());
    for mut package in packages {
        let semaphore = semaphore.clone();
        let client = client.clone();
        let config = config.clone();
        let tmp_path = tmp_dir.path().to_path_buf();
        let progress = progress.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            for member in &package.members {
                progress.descriptor_started(&member.display_name, member.size);
            }
            let result = native::upload_package(&client, &config, &mut package, &tmp_path).await;
            for member in &package.members {
                progress.descriptor_finished(&member.display_name, result.is_ok());
            }
            (package, result)
        }));
    }

    let mut all_members = Vec::new();
    for handle in handles {
        let (package, result) = handle.await.expect("package task panicked");
        match result {
            Ok(()) => {
                for member in &package.members {
                    outcome.results.push(DescriptorOutcome::Uploaded {
                        path: member.relative_path(),
                    });
                }
                all_members.extend(package.members);
            }
            Err(error) => {
                let message = error.to_string();
                for member in &package.members {
                    outcome.results.push(DescriptorOutcome::Failed {
                        path: member.relative_path(),
                        error: Error::transport(message.clone()),
                    });
                }
            }
        }
    }

    if !all_members.is_empty() {
        let mut reconcilable: Vec<FileDescriptor> = all_members
            .into_iter()
            .filter(|d| !d.inside_zip || d.enforce_metadata_update)
            .collect();
        if !reconcilable.is_empty() {
            native::reconcile_metadata(client, config, &mut reconcilable).await?;
        }
    }

    Ok(())
}
