//! Configuration builder

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use url::Url;

use crate::Error;
use crate::constants::DEFAULT_RETRY_AFTER_SECS;

const DEFAULT_SERVICE_NAME: &str = "querygate";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub connection_url: Url,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub http: HttpConfig,
    pub errors: ErrorsConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    #[must_use]
    pub const fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    #[must_use]
    pub const fn errors(&self) -> &ErrorsConfig {
        &self.errors
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub host: IpAddr,
    pub port: u16,
    pub request_timeout: Duration,
}

impl HttpConfig {
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// How faults are rendered to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorsConfig {
    /// `Retry-After` value sent with 503 responses
    pub retry_after_secs: u64,
    /// Put the fault message in `details`; otherwise repeat the generic message
    pub expose_fault_details: bool,
}

impl Default for ErrorsConfig {
    fn default() -> Self {
        Self {
            retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
            expose_fault_details: true,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    connection_url: Option<Url>,
    connect_timeout: Duration,
    query_timeout: Duration,
    http: HttpConfig,
    errors: ErrorsConfig,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connection_url: None,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            http: HttpConfig {
                host: IpAddr::V4(Ipv4Addr::LOCALHOST),
                port: 8080,
                request_timeout: Duration::from_secs(60),
            },
            errors: ErrorsConfig {
                retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
                expose_fault_details: true,
            },
            telemetry: TelemetryConfig {
                otlp_endpoint: None,
                service_name: String::new(),
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn connection_url(mut self, url: Url) -> Self {
        self.connection_url = Some(url);
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.http.host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.http.port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.http.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn retry_after_secs(mut self, secs: u64) -> Self {
        self.errors.retry_after_secs = secs;
        self
    }

    #[must_use]
    pub const fn expose_fault_details(mut self, expose: bool) -> Self {
        self.errors.expose_fault_details = expose;
        self
    }

    #[must_use]
    pub fn otlp_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.telemetry.otlp_endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration.
    ///
    /// Fails when no connection URL was supplied by any source or when a
    /// timeout is zero.
    pub fn build(self) -> crate::Result<Config> {
        let connection_url = self
            .connection_url
            .ok_or_else(|| Error::Config("connection_url is required".into()))?;

        for (name, value) in [
            ("connect_timeout", self.connect_timeout),
            ("query_timeout", self.query_timeout),
            ("request_timeout", self.http.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        let service_name = if self.telemetry.service_name.is_empty() {
            DEFAULT_SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            DEFAULT_LOG_LEVEL.to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            connection_url,
            connect_timeout: self.connect_timeout,
            query_timeout: self.query_timeout,
            http: self.http,
            errors: self.errors,
            telemetry: TelemetryConfig {
                otlp_endpoint: self.telemetry.otlp_endpoint,
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
