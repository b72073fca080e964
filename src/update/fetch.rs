//! Version endpoint client.

use crate::error::{Error, Result};
use crate::update::UpdateInfo;
use futures::future::BoxFuture;
use futures::FutureExt;
use semver::Version;
use std::time::Duration;
use tracing::debug;

/// One round-trip to the version endpoint.
///
/// The returned future owns everything it needs, so a check that has been
/// abandoned by the watchdog can still run to completion in the background.
pub trait VersionFetcher: Send + Sync {
    /// Fetch and parse the current release document.
    fn fetch(&self) -> BoxFuture<'static, Result<UpdateInfo>>;
}

/// Fetches the version document over HTTP.
#[derive(Debug, Clone)]
pub struct HttpVersionFetcher {
    client: reqwest::Client,
    url: String,
    running_version: Version,
    platform: String,
    request_timeout: Duration,
}

impl HttpVersionFetcher {
    /// Create a fetcher for `url`, reporting `running_version` to the server.
    ///
    /// The state machine's watchdog owns `request_timeout`. The transport is
    /// only bounded at twice that so abandoned requests eventually finish,
    /// and any transport timeout is reported as [`Error::Timeout`].
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: String, running_version: Version, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("client-updater/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(request_timeout)
            .timeout(request_timeout * 2)
            .build()?;

        Ok(Self {
            client,
            url,
            running_version,
            platform: std::env::consts::OS.to_string(),
            request_timeout,
        })
    }
}

impl VersionFetcher for HttpVersionFetcher {
    fn fetch(&self) -> BoxFuture<'static, Result<UpdateInfo>> {
        let request = self.client.get(&self.url).query(&[
            ("version", self.running_version.to_string()),
            ("platform", self.platform.clone()),
        ]);
        let url = self.url.clone();
        let request_timeout = self.request_timeout;
        let classify = move |e: reqwest::Error| {
            if e.is_timeout() {
                Error::Timeout(request_timeout)
            } else {
                Error::from(e)
            }
        };

        async move {
            debug!("Fetching version document from {}", url);
            let response = request.send().await.map_err(classify)?;
            if !response.status().is_success() {
                return Err(Error::Network(format!(
                    "version endpoint returned status {}",
                    response.status()
                )));
            }
            let body = response.bytes().await.map_err(classify)?;
            UpdateInfo::parse_json(&body)
        }
        .boxed()
    }
}
