// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Input Configuration
//!
//! `ConnectorOptions` mirrors the flat option surface operators write, legacy
//! aliases included. `ConnectorOptions::into_config` validates it and produces
//! the immutable `ConnectorConfig` the rest of the crate works with.
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [amqp]
//! hosts = ["rabbit-1", "rabbit-2:5673"]
//! queue = "events"
//! bind_exchange = true
//! exchange = "logs"
//! routing_key = "app.#"
//! tag_key = true
//! ```
//!
//! Mutual TLS takes the client identity as a PKCS#12 bundle: `tls_cert` points
//! to the bundle holding the client certificate and its private key, `tls_key`
//! is the passphrase protecting it. `tls_ca_certificates` lists PEM files
//! trusted in addition to the system roots.

use crate::{
    errors::ConfigError,
    logging::LogConfig,
    queue::{QueueBinding, QueueDefinition},
    tag::{TagResolver, DEFAULT_TAG},
    time::TimeResolver,
};
use serde::Deserialize;
use std::{fmt, fs, net::Ipv6Addr, path::Path, path::PathBuf};

/// Default AMQP port.
pub const DEFAULT_PORT: u16 = 5672;
/// Default virtual host.
pub const DEFAULT_VHOST: &str = "/";
/// Default heartbeat interval, in seconds.
pub const DEFAULT_HEARTBEAT: u16 = 60;
/// Default binding pattern, matching every routing key.
pub const DEFAULT_ROUTING_KEY: &str = "#";
/// Default payload format.
pub const DEFAULT_PAYLOAD_FORMAT: &str = "json";

/// Contents of a settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log: LogConfig,
    pub amqp: ConnectorOptions,
}

impl Settings {
    /// Reads and parses the TOML settings file at `path`.
    ///
    /// # Parameters
    /// * `path` - Location of the settings file
    ///
    /// # Returns
    /// The parsed settings, or `ConfigError::Io` / `ConfigError::Parse`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Settings::parse(&content)
    }

    /// Parses settings from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Raw input options, as written by operators.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectorOptions {
    pub tag: String,
    pub host: Option<String>,
    pub hosts: Option<Vec<String>>,
    pub user: String,
    pub pass: String,
    pub vhost: String,
    pub port: u16,
    pub ssl: bool,
    pub verify_ssl: Option<bool>,
    pub heartbeat: u16,
    pub queue: Option<String>,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub passive: bool,
    pub format: Option<String>,
    /// Legacy name of `format`, ignored when `format` is set.
    pub payload_format: Option<String>,
    pub tag_key: bool,
    pub tag_header: Option<String>,
    pub time_header: Option<String>,
    pub tls: bool,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<String>,
    pub tls_ca_certificates: Option<Vec<PathBuf>>,
    pub tls_verify_peer: bool,
    pub bind_exchange: bool,
    pub exchange: String,
    pub routing_key: String,
}

impl Default for ConnectorOptions {
    fn default() -> Self {
        ConnectorOptions {
            tag: DEFAULT_TAG.to_owned(),
            host: None,
            hosts: None,
            user: "guest".to_owned(),
            pass: "guest".to_owned(),
            vhost: DEFAULT_VHOST.to_owned(),
            port: DEFAULT_PORT,
            ssl: false,
            verify_ssl: None,
            heartbeat: DEFAULT_HEARTBEAT,
            queue: None,
            durable: false,
            exclusive: false,
            auto_delete: false,
            passive: false,
            format: None,
            payload_format: None,
            tag_key: false,
            tag_header: None,
            time_header: None,
            tls: false,
            tls_cert: None,
            tls_key: None,
            tls_ca_certificates: None,
            tls_verify_peer: true,
            bind_exchange: false,
            exchange: String::new(),
            routing_key: DEFAULT_ROUTING_KEY.to_owned(),
        }
    }
}

impl fmt::Debug for ConnectorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorOptions")
            .field("host", &self.host)
            .field("hosts", &self.hosts)
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("vhost", &self.vhost)
            .field("port", &self.port)
            .field("queue", &self.queue)
            .field("format", &self.format)
            .field("payload_format", &self.payload_format)
            .field("tls_key", &self.tls_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

impl ConnectorOptions {
    /// Validates the options and resolves aliases into a `ConnectorConfig`.
    pub fn into_config(self) -> Result<ConnectorConfig, ConfigError> {
        let hosts = match (self.hosts, self.host) {
            (Some(hosts), _) if !hosts.is_empty() => hosts,
            (_, Some(host)) => vec![host],
            _ => return Err(ConfigError::MissingHosts),
        };

        let endpoints = hosts
            .iter()
            .map(|host| Endpoint::parse(host, self.port))
            .collect::<Result<Vec<_>, _>>()?;

        let queue_name = self.queue.ok_or(ConfigError::MissingQueue)?;
        let mut queue = QueueDefinition::new(&queue_name);
        if self.durable {
            queue = queue.durable();
        }
        if self.exclusive {
            queue = queue.exclusive();
        }
        if self.auto_delete {
            queue = queue.delete();
        }
        if self.passive {
            queue = queue.passive();
        }

        let binding = self
            .bind_exchange
            .then(|| QueueBinding::new(&self.exchange).routing_key(&self.routing_key));

        let tls = TlsSettings {
            ssl: self.ssl,
            tls: self.tls,
            cert: self.tls_cert,
            key: self.tls_key,
            ca_certificates: self.tls_ca_certificates.unwrap_or_default(),
            verify_peer: if self.tls {
                self.tls_verify_peer
            } else {
                self.verify_ssl.unwrap_or(true)
            },
        };

        let payload_format = self
            .format
            .or(self.payload_format)
            .unwrap_or_else(|| DEFAULT_PAYLOAD_FORMAT.to_owned());

        let config = ConnectorConfig {
            endpoints,
            credentials: Credentials {
                user: self.user,
                pass: self.pass,
            },
            vhost: self.vhost,
            heartbeat: self.heartbeat,
            tls,
            queue,
            binding,
            payload_format: Some(payload_format),
            tag: TagResolver::new(&self.tag)
                .use_routing_key(self.tag_key)
                .header(self.tag_header.as_deref()),
            time: TimeResolver::new(self.time_header.as_deref()),
        };

        config.validate()?;
        Ok(config)
    }
}

/// One broker address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Creates an endpoint from a host name or address and a port.
    ///
    /// # Parameters
    /// * `host` - Host name, IPv4 or IPv6 address, without brackets
    /// * `port` - TCP port of the broker
    ///
    /// # Returns
    /// A new endpoint
    pub fn new(host: &str, port: u16) -> Self {
        Endpoint {
            host: host.to_owned(),
            port,
        }
    }

    /// Parses `host`, `host:port`, a bare IPv6 address or `[address]:port`.
    ///
    /// # Parameters
    /// * `value` - The configured host entry
    /// * `default_port` - Port used when the entry carries none
    ///
    /// # Returns
    /// The endpoint, or `ConfigError::InvalidEndpoint` for a malformed entry
    pub fn parse(value: &str, default_port: u16) -> Result<Self, ConfigError> {
        let value = value.trim();
        let invalid = || ConfigError::InvalidEndpoint(value.to_owned());
        let parse_port = |port: &str| port.parse::<u16>().map_err(|_| invalid());

        let (host, port) = if let Some(rest) = value.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            if host.parse::<Ipv6Addr>().is_err() {
                return Err(invalid());
            }
            match tail {
                "" => (host, default_port),
                _ => (host, parse_port(tail.strip_prefix(':').ok_or_else(invalid)?)?),
            }
        } else if value.matches(':').count() > 1 {
            value.parse::<Ipv6Addr>().map_err(|_| invalid())?;
            (value, default_port)
        } else {
            match value.split_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (value, default_port),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }

        Ok(Endpoint::new(host, port))
    }

    /// Returns whether the host is an IPv6 address literal.
    pub fn is_ipv6(&self) -> bool {
        self.host.contains(':')
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Broker login. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials {
            user: "guest".to_owned(),
            pass: "guest".to_owned(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

/// Transport encryption settings.
///
/// `ssl` encrypts the transport and authenticates the server only. `tls`
/// additionally presents a client identity, so it requires `cert` and `key`.
#[derive(Clone, PartialEq, Eq)]
pub struct TlsSettings {
    pub ssl: bool,
    pub tls: bool,
    /// PKCS#12 bundle with the client certificate and private key.
    pub cert: Option<PathBuf>,
    /// Passphrase of the PKCS#12 bundle.
    pub key: Option<String>,
    /// PEM files trusted in addition to the system roots.
    pub ca_certificates: Vec<PathBuf>,
    /// Whether the operator asked for the broker certificate to be verified.
    pub verify_peer: bool,
}

impl Default for TlsSettings {
    fn default() -> Self {
        TlsSettings {
            ssl: false,
            tls: false,
            cert: None,
            key: None,
            ca_certificates: Vec::new(),
            verify_peer: true,
        }
    }
}

impl fmt::Debug for TlsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSettings")
            .field("ssl", &self.ssl)
            .field("tls", &self.tls)
            .field("cert", &self.cert)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("ca_certificates", &self.ca_certificates)
            .field("verify_peer", &self.verify_peer)
            .finish()
    }
}

impl TlsSettings {
    /// Returns whether the operator turned peer verification off on an
    /// encrypted transport. lapin always verifies the broker certificate.
    pub fn verification_disabled(&self) -> bool {
        self.is_enabled() && !self.verify_peer
    }

    /// Returns whether the transport is encrypted.
    pub fn is_enabled(&self) -> bool {
        self.ssl || self.tls
    }

    /// Requires both `tls_cert` and `tls_key` when `tls` is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tls {
            return Ok(());
        }
        if self.cert.is_none() {
            return Err(ConfigError::IncompleteTls("tls_cert"));
        }
        if self.key.is_none() {
            return Err(ConfigError::IncompleteTls("tls_key"));
        }
        Ok(())
    }
}

/// Immutable configuration of a running input.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub endpoints: Vec<Endpoint>,
    pub credentials: Credentials,
    pub vhost: String,
    pub heartbeat: u16,
    pub tls: TlsSettings,
    pub queue: QueueDefinition,
    pub binding: Option<QueueBinding>,
    pub payload_format: Option<String>,
    pub tag: TagResolver,
    pub time: TimeResolver,
}

impl ConnectorConfig {
    /// A plain-text, JSON-parsing configuration for `queue` on one endpoint.
    pub fn new(endpoint: Endpoint, queue: QueueDefinition) -> Self {
        ConnectorConfig {
            endpoints: vec![endpoint],
            credentials: Credentials::default(),
            vhost: DEFAULT_VHOST.to_owned(),
            heartbeat: DEFAULT_HEARTBEAT,
            tls: TlsSettings::default(),
            queue,
            binding: None,
            payload_format: Some(DEFAULT_PAYLOAD_FORMAT.to_owned()),
            tag: TagResolver::default(),
            time: TimeResolver::default(),
        }
    }

    /// Checks the invariants every started input relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoints.is_empty() {
            return Err(ConfigError::MissingHosts);
        }
        if self.queue.name().is_empty() {
            return Err(ConfigError::MissingQueue);
        }
        self.tls.validate()
    }
}
