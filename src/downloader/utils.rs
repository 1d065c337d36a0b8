// Helper functions for the yt-dlp adapter and route checks

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream};
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::DownloadError;

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    ip: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimpleIp {
    ip: String,
}

/// Run command with timeout, collecting stdout and stderr
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stdout from {}", program)))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::ExecutionError(format!("Failed to capture stderr from {}", program)))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res
                .map_err(|e| DownloadError::ExecutionError(format!("Failed to wait for {}: {}", program, e)))?;
            let stdout = join_pipe(stdout_task, "stdout").await?;
            let stderr = join_pipe(stderr_task, "stderr").await?;
            Ok(std::process::Output { status, stdout, stderr })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            warn!("{} timed out after {}s", program, timeout_secs);
            Err(DownloadError::NetworkTimeout)
        }
    }
}

async fn join_pipe(
    task: tokio::task::JoinHandle<std::io::Result<Vec<u8>>>,
    name: &str,
) -> Result<Vec<u8>, DownloadError> {
    task.await
        .map_err(|e| DownloadError::ExecutionError(format!("{} task failed: {}", name, e)))?
        .map_err(|e| DownloadError::ExecutionError(format!("Failed to read {}: {}", name, e)))
}

pub fn spawn_error(program: &str, e: std::io::Error) -> DownloadError {
    if e.kind() == std::io::ErrorKind::NotFound {
        DownloadError::ToolNotFound(program.to_string())
    } else {
        DownloadError::ExecutionError(format!("Failed to start {}: {}", program, e))
    }
}

/// Get external IP address via HTTP services, through the given proxy if any
pub async fn get_external_ip(proxy: Option<&str>) -> Option<String> {
    debug!("Starting IP check with proxy: {:?}", proxy);

    let mut client_builder = reqwest::Client::builder().timeout(Duration::from_secs(15));

    if let Some(proxy_url) = proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => client_builder = client_builder.proxy(proxy),
            Err(e) => {
                warn!("Invalid proxy URL {}: {}", proxy_url, e);
                return None;
            }
        }
    }

    let client = match client_builder.build() {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to build HTTP client: {}", e);
            return None;
        }
    };

    let services = [
        "https://ipinfo.io/json",
        "https://api.ipify.org?format=json",
        "https://ifconfig.me/all.json",
    ];

    for service in services {
        debug!("Trying IP service: {}", service);
        match client.get(service).send().await {
            Ok(response) => {
                if let Ok(text) = response.text().await {
                    if let Some(ip) = parse_ip_response(&text) {
                        return Some(ip);
                    }
                }
            }
            Err(e) => {
                debug!("IP service {} failed: {}", service, e);
            }
        }
    }

    warn!("All IP services failed");
    None
}

fn parse_ip_response(text: &str) -> Option<String> {
    if let Ok(info) = serde_json::from_str::<IpInfoResponse>(text) {
        if let Some(ip) = info.ip {
            return Some(match info.country {
                Some(country) => format!("{} ({})", ip, country),
                None => ip,
            });
        }
    }
    serde_json::from_str::<SimpleIp>(text).ok().map(|s| s.ip)
}

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(300);

/// Test if something listens on a SOCKS endpoint like "127.0.0.1:9050"
pub async fn test_socks_port(host_port: &str) -> bool {
    let addrs: Vec<_> = match timeout(LOOKUP_TIMEOUT, lookup_host(host_port)).await {
        Ok(Ok(addrs)) => addrs.collect(),
        _ => return false,
    };

    for addr in addrs {
        if let Ok(Ok(_)) = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ip_with_country() {
        let text = r#"{"ip":"203.0.113.7","city":"X","country":"NL"}"#;
        assert_eq!(parse_ip_response(text), Some("203.0.113.7 (NL)".to_string()));
    }

    #[test]
    fn test_parse_simple_ip() {
        assert_eq!(parse_ip_response(r#"{"ip":"198.51.100.2"}"#), Some("198.51.100.2".to_string()));
        assert_eq!(parse_ip_response("not json"), None);
    }

    #[tokio::test]
    async fn test_socks_port_unresolvable() {
        assert!(!test_socks_port("not a host").await);
    }

    #[tokio::test]
    async fn test_socks_port_open_and_closed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(test_socks_port(&addr).await);

        drop(listener);
        assert!(!test_socks_port(&addr).await);
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_not_found() {
        let err = run_output_with_timeout("definitely-not-a-real-binary-xyz", vec![], 5)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
