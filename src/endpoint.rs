use crate::error::{DetectcamError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Route of the detection screen
pub const OBJECT_DETECTION_ROUTE: &str = "ObjectDetection";

/// Query parameter carrying the verified base URL
pub const URL_PARAM: &str = "url";

/// Base address of a remote detection service.
///
/// Candidates come from a scan or from manual entry and are unverified until the
/// service confirms them. A verified endpoint is never mutated again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointUrl {
    raw: String,
    verified: bool,
}

impl EndpointUrl {
    pub fn candidate<S: Into<String>>(raw: S) -> Self {
        Self {
            raw: raw.into(),
            verified: false,
        }
    }

    /// Mark the endpoint as confirmed by the service
    pub fn into_verified(self) -> Self {
        Self {
            raw: self.raw,
            verified: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    /// Join a service path onto the base address
    pub fn join(&self, path: &str) -> String {
        join_url(&self.raw, path)
    }

    /// Route handed to navigation once the endpoint is verified
    pub fn detection_route(&self) -> String {
        format!("{}?{}={}", OBJECT_DETECTION_ROUTE, URL_PARAM, self.raw)
    }

    /// Read the endpoint back out of a detection route.
    ///
    /// The `url` value is taken verbatim up to the end of the route, so base
    /// addresses that carry their own query string survive the round trip.
    /// Only verified endpoints are ever navigated to, so the result is verified.
    pub fn from_route(route: &str) -> Result<Self> {
        let invalid = || DetectcamError::Route {
            route: route.to_string(),
        };

        let (path, query) = route.split_once('?').ok_or_else(invalid)?;
        if path.trim_start_matches('/') != OBJECT_DETECTION_ROUTE {
            return Err(invalid());
        }

        let prefix = format!("{}=", URL_PARAM);
        let value = query.strip_prefix(prefix.as_str()).ok_or_else(invalid)?;
        if value.trim().is_empty() {
            return Err(invalid());
        }

        Ok(Self::candidate(value).into_verified())
    }
}

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
