// Network route selection - direct, custom proxy, or Tor overlay
//
// Resolved once per run; the same RouteHandle is handed to every adapter call.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::utils;

/// Default Tor SOCKS endpoint
pub const DEFAULT_OVERLAY_ENDPOINT: &str = "socks5://127.0.0.1:9050";

const PROXY_SCHEMES: [&str; 6] = ["http", "https", "socks4", "socks4a", "socks5", "socks5h"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Both a proxy and the overlay network were requested
    #[error("configuration conflict: --proxy and --tor are mutually exclusive")]
    ConfigurationConflict,

    #[error("invalid proxy URL '{0}': expected one of http, https, socks4, socks4a, socks5, socks5h")]
    InvalidProxy(String),
}

/// Effective network path for the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteHandle {
    Direct,
    Proxy(String),
    /// Anonymizing overlay (Tor) reached through its local SOCKS endpoint
    Overlay(String),
}

impl RouteHandle {
    /// Value for `--proxy`, if any
    pub fn proxy_url(&self) -> Option<&str> {
        match self {
            Self::Direct => None,
            Self::Proxy(url) | Self::Overlay(url) => Some(url),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Proxy(_) => "proxy",
            Self::Overlay(_) => "tor",
        }
    }
}

impl fmt::Display for RouteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxy(url) => write!(f, "proxy {}", url),
            Self::Overlay(url) => write!(f, "tor ({})", url),
        }
    }
}

/// Resolve the route from configuration values
pub fn select(
    proxy_url: Option<&str>,
    use_overlay: bool,
    overlay_endpoint: Option<&str>,
) -> Result<RouteHandle, RouteError> {
    let proxy_url = proxy_url.map(str::trim).filter(|p| !p.is_empty());

    match (proxy_url, use_overlay) {
        (Some(_), true) => Err(RouteError::ConfigurationConflict),
        (Some(url), false) => {
            validate_proxy(url)?;
            Ok(RouteHandle::Proxy(url.to_string()))
        }
        (None, true) => {
            let endpoint = overlay_endpoint.unwrap_or(DEFAULT_OVERLAY_ENDPOINT);
            validate_proxy(endpoint)?;
            Ok(RouteHandle::Overlay(endpoint.to_string()))
        }
        (None, false) => Ok(RouteHandle::Direct),
    }
}

fn validate_proxy(url: &str) -> Result<(), RouteError> {
    let (scheme, rest) = url
        .split_once("://")
        .ok_or_else(|| RouteError::InvalidProxy(url.to_string()))?;

    if !PROXY_SCHEMES.contains(&scheme.to_lowercase().as_str()) || rest.is_empty() {
        return Err(RouteError::InvalidProxy(url.to_string()));
    }
    Ok(())
}

/// host:port part of a proxy URL, without credentials or path
fn host_port(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let rest = rest.rsplit_once('@').map_or(rest, |(_, hp)| hp);
    rest.split('/').next().filter(|hp| !hp.is_empty())
}

/// Pre-flight check: log the external IP seen through the route
pub async fn preflight(route: &RouteHandle) -> Option<String> {
    if let RouteHandle::Overlay(url) = route {
        let reachable = match host_port(url) {
            Some(addr) => utils::test_socks_port(addr).await,
            None => false,
        };
        if !reachable {
            warn!("Nothing is listening on the Tor SOCKS endpoint {}; is tor running?", url);
            return None;
        }
    }

    let ip = utils::get_external_ip(route.proxy_url()).await;
    match &ip {
        Some(ip) => info!("Route {}: external IP {}", route, ip),
        None => warn!("Route {}: could not determine external IP", route),
    }
    ip
}
