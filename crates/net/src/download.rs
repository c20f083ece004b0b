//! The download coordinator

use crate::client::NetClient;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::TryStreamExt;
use indexmap::IndexMap;
use rapt_config::DownloadMethod;
use rapt_errors::{Error, NetworkError};
use rapt_events::{AppEvent, DownloadEvent, EventEmitter, EventSender};
use rapt_plan::FileSpec;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use url::Url;

/// Coordinates fetching all missing files into the staging directory
pub struct Downloader {
    client: NetClient,
    concurrency: usize,
    method: DownloadMethod,
    aria2_path: String,
}

impl Downloader {
    /// Create a downloader with an explicit parallelism limit and transport
    /// strategy.
    #[must_use]
    pub fn new(
        client: NetClient,
        concurrency: usize,
        method: DownloadMethod,
        aria2_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
            method,
            aria2_path: aria2_path.into(),
        }
    }

    /// Fetch every missing file into `staging`.
    ///
    /// Files are scheduled largest-first so the longest transfers start
    /// earliest; admission is a sliding window of at most `concurrency`
    /// active transfers.
    ///
    /// # Errors
    ///
    /// Any transfer failure aborts the whole operation with an error naming
    /// the offending URL. There is no retry and no partial-success
    /// continuation.
    pub async fn fetch_all(
        &self,
        missing: &IndexMap<usize, FileSpec>,
        staging: &Path,
        tx: &EventSender,
    ) -> Result<(), Error> {
        if missing.is_empty() {
            return Ok(());
        }

        let files = schedule_order(missing);
        match self.method {
            DownloadMethod::Native => self.fetch_native(&files, staging, tx).await,
            DownloadMethod::Aria2 => self.fetch_aria2(&files, staging, tx).await,
        }
    }

    /// In-process multiplexed strategy: one future per file, admission
    /// bounded by a FIFO semaphore so transfers start in schedule order.
    async fn fetch_native(
        &self,
        files: &[&FileSpec],
        staging: &Path,
        tx: &EventSender,
    ) -> Result<(), Error> {
        let total = files.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let admitted = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));

        let mut transfers = FuturesUnordered::new();
        for spec in files {
            let semaphore = Arc::clone(&semaphore);
            let admitted = Arc::clone(&admitted);
            let completed = Arc::clone(&completed);
            let client = self.client.clone();
            let dest = staging.join(&spec.name);
            let tx = tx.clone();

            transfers.push(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::internal("download semaphore closed"))?;

                let seq = admitted.fetch_add(1, Ordering::SeqCst) + 1;
                tx.emit(AppEvent::Download(DownloadEvent::Admitted {
                    seq,
                    total,
                    name: spec.name.clone(),
                    url: spec.url.clone(),
                }));

                fetch_one(&client, spec, &dest).await?;

                let seq = completed.fetch_add(1, Ordering::SeqCst) + 1;
                tx.emit(AppEvent::Download(DownloadEvent::Completed {
                    seq,
                    total,
                    name: spec.name.clone(),
                }));

                Ok::<(), Error>(())
            });
        }

        while let Some(result) = transfers.next().await {
            result?;
        }

        Ok(())
    }

    /// Delegated batch strategy: local copies are satisfied in-process,
    /// everything else goes to a single `aria2c` run over an input list in
    /// schedule order. aria2 owns per-transfer timing, so admission events
    /// are emitted up front.
    async fn fetch_aria2(
        &self,
        files: &[&FileSpec],
        staging: &Path,
        tx: &EventSender,
    ) -> Result<(), Error> {
        let total = files.len();
        for (i, spec) in files.iter().enumerate() {
            tx.emit(AppEvent::Download(DownloadEvent::Admitted {
                seq: i + 1,
                total,
                name: spec.name.clone(),
                url: spec.url.clone(),
            }));
        }

        let mut input = String::new();
        for spec in files {
            if let Some(path) = spec.url.strip_prefix("file:") {
                copy_local(path, &spec.url, &staging.join(&spec.name)).await?;
            } else {
                validate_remote_url(&spec.url)?;
                input.push_str(&spec.url);
                input.push_str("\n  out=");
                input.push_str(&spec.name);
                input.push('\n');
            }
        }

        if !input.is_empty() {
            let list = staging.join(".aria2-input");
            fs::write(&list, &input)
                .await
                .map_err(|e| Error::io_with_path(&e, &list))?;
            tracing::debug!(list = %list.display(), "delegating batch to aria2c");

            let status = Command::new(&self.aria2_path)
                .arg("--no-conf")
                .arg("--auto-file-renaming=false")
                .arg("--allow-overwrite=true")
                .arg("--summary-interval=0")
                .arg(format!("-j{}", self.concurrency))
                .arg("-d")
                .arg(staging)
                .arg("-i")
                .arg(&list)
                .status()
                .await
                .map_err(|e| NetworkError::DownloadFailed {
                    url: self.aria2_path.clone(),
                    message: e.to_string(),
                })?;

            if !status.success() {
                return Err(NetworkError::DownloadFailed {
                    url: self.aria2_path.clone(),
                    message: format!("batch download exited with {status}"),
                }
                .into());
            }
        }

        for (i, spec) in files.iter().enumerate() {
            tx.emit(AppEvent::Download(DownloadEvent::Completed {
                seq: i + 1,
                total,
                name: spec.name.clone(),
            }));
        }

        Ok(())
    }
}

/// Descending declared size; ties keep the missing-set insertion order
fn schedule_order(missing: &IndexMap<usize, FileSpec>) -> Vec<&FileSpec> {
    let mut files: Vec<&FileSpec> = missing.values().collect();
    files.sort_by(|a, b| b.size.cmp(&a.size));
    files
}

/// Fetch a single file into its staging destination
async fn fetch_one(client: &NetClient, spec: &FileSpec, dest: &Path) -> Result<(), Error> {
    if let Some(path) = spec.url.strip_prefix("file:") {
        return copy_local(path, &spec.url, dest).await;
    }

    validate_remote_url(&spec.url)?;

    let response = client.get(&spec.url).await?;
    if !response.status().is_success() {
        return Err(NetworkError::HttpStatus {
            status: response.status().as_u16(),
            url: spec.url.clone(),
        }
        .into());
    }

    let mut file = File::create(dest)
        .await
        .map_err(|e| NetworkError::DownloadFailed {
            url: spec.url.clone(),
            message: format!("cannot open {}: {e}", dest.display()),
        })?;

    let mut stream = response.bytes_stream().map_err(|e| NetworkError::DownloadFailed {
        url: spec.url.clone(),
        message: e.to_string(),
    });
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| NetworkError::DownloadFailed {
                url: spec.url.clone(),
                message: format!("writing {}: {e}", dest.display()),
            })?;
    }
    file.flush()
        .await
        .map_err(|e| NetworkError::DownloadFailed {
            url: spec.url.clone(),
            message: e.to_string(),
        })?;

    Ok(())
}

/// Local filesystem copy for `file:` sources
async fn copy_local(path: &str, url: &str, dest: &Path) -> Result<(), Error> {
    fs::copy(path, dest)
        .await
        .map_err(|e| NetworkError::DownloadFailed {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(())
}

fn validate_remote_url(url: &str) -> Result<(), Error> {
    let parsed = Url::parse(url).map_err(|_| NetworkError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(NetworkError::InvalidUrl(url.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rapt_hash::Digest;

    fn spec(name: &str, size: u64) -> FileSpec {
        FileSpec {
            url: format!("http://mirror/pool/{name}"),
            name: name.to_string(),
            size,
            digest: Digest::parse("MD5:00ff").unwrap(),
        }
    }

    #[test]
    fn test_schedule_order_is_descending_size() {
        let mut missing = IndexMap::new();
        missing.insert(0, spec("small.deb", 50));
        missing.insert(1, spec("large.deb", 5000));
        missing.insert(2, spec("medium.deb", 500));

        let ordered = schedule_order(&missing);
        let names: Vec<&str> = ordered.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["large.deb", "medium.deb", "small.deb"]);
    }

    #[test]
    fn test_schedule_order_ties_keep_insertion_order() {
        let mut missing = IndexMap::new();
        missing.insert(0, spec("first.deb", 100));
        missing.insert(1, spec("second.deb", 100));

        let ordered = schedule_order(&missing);
        assert_eq!(ordered[0].name, "first.deb");
        assert_eq!(ordered[1].name, "second.deb");
    }

    #[test]
    fn test_remote_url_validation() {
        assert!(validate_remote_url("http://mirror/a.deb").is_ok());
        assert!(validate_remote_url("https://mirror/a.deb").is_ok());
        assert!(validate_remote_url("ftp://mirror/a.deb").is_err());
        assert!(validate_remote_url("not a url").is_err());
    }
}
