use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `QUANTSCOPE_LOG` wins over `--log-level`; logs go to stderr so stdout
/// stays machine-readable.
pub fn init_tracing(level: Option<&str>, format: LogFormat) -> Result<(), String> {
    let filter = std::env::var("QUANTSCOPE_LOG")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| level.map(str::to_string))
        .unwrap_or_else(|| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|err| format!("failed to init tracing: {err}")),
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|err| format!("failed to init tracing: {err}")),
    }
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let raw = match addr {
        Some(raw) => raw.to_string(),
        None => match std::env::var("QUANTSCOPE_METRICS_ADDR") {
            Ok(raw) => raw,
            Err(_) => return Ok(None),
        },
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let addr: SocketAddr = raw
        .trim()
        .parse()
        .map_err(|err| format!("invalid metrics address (expected host:port): {err}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(addr: Option<&str>) -> Result<Option<SocketAddr>, String> {
    if addr.is_some() {
        tracing::warn!("built without the prometheus feature; --metrics-addr ignored");
    }
    Ok(None)
}
