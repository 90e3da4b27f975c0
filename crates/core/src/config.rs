use std::time::Duration;

/// Adapter configuration loaded from environment variables.
///
/// All fields have defaults matching a local ComfyUI instance.
/// Established once per process and shared read-only across jobs.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// ComfyUI `host:port` (default: `127.0.0.1:8188`).
    pub comfy_host: String,
    /// Readiness probe attempt budget (default: `500`).
    pub probe_retries: u32,
    /// Sleep between readiness probe attempts (default: `50ms`).
    pub probe_interval: Duration,
    /// WebSocket handshake timeout (default: `30s`).
    pub ws_connect_timeout: Duration,
    /// Per-receive timeout on the event stream (default: `60s`).
    /// Elapsing without a frame retries the receive; it is not fatal.
    pub ws_recv_timeout: Duration,
    /// Optional overall deadline on the completion wait. `None`
    /// (the default) waits indefinitely across idle-retry windows.
    pub ws_total_timeout: Option<Duration>,
    /// Process-wide default API key for comfy.org nodes, used when the
    /// request does not carry its own.
    pub default_api_key: Option<String>,
}

impl AdapterConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default          |
    /// |-----------------------------------|------------------|
    /// | `COMFY_HOST`                      | `127.0.0.1:8188` |
    /// | `COMFY_API_AVAILABLE_MAX_RETRIES` | `500`            |
    /// | `COMFY_API_AVAILABLE_INTERVAL_MS` | `50`             |
    /// | `COMFY_WS_CONNECT_TIMEOUT`        | `30` (seconds)   |
    /// | `COMFY_WS_RECV_TIMEOUT`           | `60` (seconds)   |
    /// | `COMFY_WS_TOTAL_TIMEOUT_SECS`     | unset            |
    /// | `COMFY_ORG_API_KEY`               | unset            |
    pub fn from_env() -> Self {
        let comfy_host =
            std::env::var("COMFY_HOST").unwrap_or_else(|_| "127.0.0.1:8188".into());

        let probe_retries: u32 = std::env::var("COMFY_API_AVAILABLE_MAX_RETRIES")
            .unwrap_or_else(|_| "500".into())
            .parse()
            .expect("COMFY_API_AVAILABLE_MAX_RETRIES must be a valid u32");

        let probe_interval_ms: u64 = std::env::var("COMFY_API_AVAILABLE_INTERVAL_MS")
            .unwrap_or_else(|_| "50".into())
            .parse()
            .expect("COMFY_API_AVAILABLE_INTERVAL_MS must be a valid u64");

        let ws_connect_secs: u64 = std::env::var("COMFY_WS_CONNECT_TIMEOUT")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("COMFY_WS_CONNECT_TIMEOUT must be a valid u64");

        let ws_recv_secs: u64 = std::env::var("COMFY_WS_RECV_TIMEOUT")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("COMFY_WS_RECV_TIMEOUT must be a valid u64");

        let ws_total_timeout = std::env::var("COMFY_WS_TOTAL_TIMEOUT_SECS")
            .ok()
            .map(|v| {
                let secs: u64 = v
                    .parse()
                    .expect("COMFY_WS_TOTAL_TIMEOUT_SECS must be a valid u64");
                Duration::from_secs(secs)
            });

        let default_api_key = std::env::var("COMFY_ORG_API_KEY").ok();

        Self {
            comfy_host,
            probe_retries,
            probe_interval: Duration::from_millis(probe_interval_ms),
            ws_connect_timeout: Duration::from_secs(ws_connect_secs),
            ws_recv_timeout: Duration::from_secs(ws_recv_secs),
            ws_total_timeout,
            default_api_key,
        }
    }

    /// HTTP base URL, e.g. `http://127.0.0.1:8188`.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.comfy_host)
    }

    /// WebSocket base URL, e.g. `ws://127.0.0.1:8188`.
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.comfy_host)
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            comfy_host: "127.0.0.1:8188".into(),
            probe_retries: 500,
            probe_interval: Duration::from_millis(50),
            ws_connect_timeout: Duration::from_secs(30),
            ws_recv_timeout: Duration::from_secs(60),
            ws_total_timeout: None,
            default_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_helpers_use_host() {
        let config = AdapterConfig {
            comfy_host: "gpu-1:8188".into(),
            ..Default::default()
        };
        assert_eq!(config.http_url(), "http://gpu-1:8188");
        assert_eq!(config.ws_url(), "ws://gpu-1:8188");
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AdapterConfig::default();
        assert_eq!(config.probe_retries, 500);
        assert_eq!(config.probe_interval, Duration::from_millis(50));
        assert_eq!(config.ws_connect_timeout, Duration::from_secs(30));
        assert_eq!(config.ws_recv_timeout, Duration::from_secs(60));
        assert!(config.ws_total_timeout.is_none());
    }
}
