use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{RosterError, RosterResult};
use crate::ingest::{self, IngestReport};

/// Where the roster CSV comes from. One call is one download; retries are
/// layered on top by [`load_with_retry`].
#[async_trait]
pub trait SheetSource: Send + Sync {
    async fn fetch_csv(&self) -> RosterResult<String>;

    fn describe(&self) -> String;
}

#[async_trait]
impl<S: SheetSource + ?Sized> SheetSource for Box<S> {
    async fn fetch_csv(&self) -> RosterResult<String> {
        (**self).fetch_csv().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

pub struct HttpSheetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSheetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> RosterResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RosterError::SourceUnavailable {
                attempts: 0,
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SheetSource for HttpSheetSource {
    async fn fetch_csv(&self) -> RosterResult<String> {
        let unavailable = |e: reqwest::Error| RosterError::SourceUnavailable {
            attempts: 1,
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(unavailable)?
            .error_for_status()
            .map_err(unavailable)?;

        let body = response.bytes().await.map_err(unavailable)?;
        String::from_utf8(body.to_vec())
            .map_err(|e| RosterError::MalformedDocument(format!("roster is not UTF-8: {e}")))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Reads the roster from a CSV file on disk, for offline use.
pub struct FileSheetSource {
    path: PathBuf,
}

impl FileSheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SheetSource for FileSheetSource {
    async fn fetch_csv(&self) -> RosterResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| RosterError::SourceUnavailable {
            attempts: 1,
            reason: format!("{}: {e}", self.path.display()),
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Downloads and parses the roster, trying again up to `retries` more times.
///
/// No backoff between attempts. Once attempts run out the last error is
/// returned; a `SourceUnavailable` carries the total number of attempts.
pub async fn load_with_retry<S>(source: &S, retries: u32) -> RosterResult<IngestReport>
where
    S: SheetSource + ?Sized,
{
    let attempts = retries + 1;
    let mut attempt = 1;

    loop {
        let result = match source.fetch_csv().await {
            Ok(text) => ingest::parse_students_str(&text),
            Err(err) => Err(err),
        };

        match result {
            Ok(report) => {
                info!(
                    source = %source.describe(),
                    attempt,
                    students = report.students.len(),
                    "roster loaded"
                );
                return Ok(report);
            }
            Err(err) if attempt < attempts => {
                warn!(
                    source = %source.describe(),
                    attempt,
                    error = %err,
                    "roster load failed, retrying"
                );
                attempt += 1;
            }
            Err(RosterError::SourceUnavailable { reason, .. }) => {
                return Err(RosterError::SourceUnavailable { attempts, reason });
            }
            Err(err) => return Err(err),
        }
    }
}
