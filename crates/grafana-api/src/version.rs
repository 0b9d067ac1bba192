use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::client::GrafanaClient;
use crate::error::{GrafanaError, Result};

/// First server release that ships `GET /datasources/uid/{uid}/health`.
/// Below this, health inquiries always use the client-side probe.
pub const NATIVE_HEALTH_MIN_VERSION: ServerVersion = ServerVersion::new(9, 0, 0);

/// Parsed server version with semantic ordering.
///
/// Build versions may carry trailing metadata (`11.3.0-75420.patch2-75797`);
/// everything after the release triple is ignored, so that string compares
/// equal to `11.3.0` for gating purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ServerVersion {
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a build version string, tolerating suffixes and short forms
    /// (`"9.0"` parses as 9.0.0).
    pub fn parse(raw: &str) -> Result<Self> {
        let release = raw
            .trim()
            .split(['-', '+', ' '])
            .next()
            .unwrap_or_default();
        let mut components = release.split('.').map(leading_number);

        let major = components
            .next()
            .flatten()
            .ok_or_else(|| GrafanaError::Value(format!("unparseable version '{raw}'")))?;
        let minor = components.next().flatten().unwrap_or(0);
        let patch = components.next().flatten().unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }
}

fn leading_number(component: &str) -> Option<u64> {
    let digits: String = component.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ServerVersion {
    type Err = GrafanaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl GrafanaClient {
    /// Server build information from `/frontend/settings`.
    ///
    /// Fetched on first access and cached for the life of the client;
    /// concurrent first accesses are serialized by the cell.
    pub async fn build_info(&self) -> Result<&Value> {
        self.inner()
            .build_info
            .get_or_try_init(|| async { self.get("/frontend/settings").await })
            .await
    }

    /// The server's build version, from the cached build information.
    pub async fn version(&self) -> Result<ServerVersion> {
        let info = self.build_info().await?;
        let raw = info
            .pointer("/buildInfo/version")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GrafanaError::Value("build info lacks a buildInfo.version field".into())
            })?;
        ServerVersion::parse(raw)
    }
}
