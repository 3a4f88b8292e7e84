//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const DB_URL: &str = "QUERYGATE_DB_URL";
    pub const DB_USER: &str = "QUERYGATE_DB_USER";
    pub const DB_PASSWORD: &str = "QUERYGATE_DB_PASSWORD";
    pub const CONNECT_TIMEOUT_SECS: &str = "QUERYGATE_CONNECT_TIMEOUT_SECS";
    pub const QUERY_TIMEOUT_SECS: &str = "QUERYGATE_QUERY_TIMEOUT_SECS";
    pub const HTTP_HOST: &str = "QUERYGATE_HTTP_HOST";
    pub const HTTP_PORT: &str = "QUERYGATE_HTTP_PORT";
    pub const RETRY_AFTER_SECS: &str = "QUERYGATE_RETRY_AFTER_SECS";
    pub const EXPOSE_FAULT_DETAILS: &str = "QUERYGATE_EXPOSE_FAULT_DETAILS";
    pub const OTEL_EXPORTER_OTLP_ENDPOINT: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";
    pub const OTEL_SERVICE_NAME: &str = "OTEL_SERVICE_NAME";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "QUERYGATE_JSON_LOGS";
}

/// Load configuration from environment variables.
///
/// Only the connection URL is validated strictly; other malformed values
/// are ignored and leave the previous setting in place.
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(url_str) = env::var(vars::DB_URL) {
        let mut url = Url::parse(&url_str)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::DB_URL, e)))?;

        // Credentials may be kept out of the URL
        if let Ok(user) = env::var(vars::DB_USER) {
            url.set_username(&user)
                .map_err(|()| crate::Error::Config("Failed to set username in URL".into()))?;
        }
        if let Ok(password) = env::var(vars::DB_PASSWORD) {
            url.set_password(Some(&password))
                .map_err(|()| crate::Error::Config("Failed to set password in URL".into()))?;
        }

        builder = builder.connection_url(url);
    }

    if let Some(secs) = parse_secs(vars::CONNECT_TIMEOUT_SECS) {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }

    if let Some(secs) = parse_secs(vars::QUERY_TIMEOUT_SECS) {
        builder = builder.query_timeout(Duration::from_secs(secs));
    }

    if let Ok(host_str) = env::var(vars::HTTP_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::HTTP_PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    if let Some(secs) = parse_secs(vars::RETRY_AFTER_SECS) {
        builder = builder.retry_after_secs(secs);
    }

    if let Ok(val) = env::var(vars::EXPOSE_FAULT_DETAILS) {
        builder = builder.expose_fault_details(parse_bool(&val));
    }

    // Telemetry
    if let Ok(endpoint) = env::var(vars::OTEL_EXPORTER_OTLP_ENDPOINT) {
        builder = builder.otlp_endpoint(Some(endpoint));
    }

    if let Ok(name) = env::var(vars::OTEL_SERVICE_NAME) {
        builder = builder.service_name(name);
    }

    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_secs(var: &str) -> Option<u64> {
    env::var(var).ok()?.trim().parse().ok()
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
