//! Connection descriptor for the Harbor cache.
//!
//! A [`ConnectionDescriptor`] captures where the cache lives and how to
//! authenticate. It renders the connection URL handed to Harbor components
//! and builds the `fred` configuration used by the readiness probe.
//!
//! URL formats:
//! - plain server: `redis://[:<password>@]<host>:<port>`
//! - failover group: `redis+sentinel://[:<password>@]<h1>:<port>,<h2>:<port>/<group>`
//!
//! Password and group name are percent-encoded, so
//! [`ConnectionDescriptor::from_url`] recovers every field of a rendered URL.

use std::fmt;

use fred::prelude::{Config, ServerConfig};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use super::error::DescriptorError;

/// URL scheme for a single cache server.
pub const SERVER_URL_SCHEME: &str = "redis";

/// URL scheme for a sentinel-managed failover group.
pub const SENTINEL_URL_SCHEME: &str = "redis+sentinel";

/// Topology schema of the cache service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Schema {
    /// A single cache server.
    Server,
    /// A failover group fronted by sentinel coordinators.
    SentinelGroup,
}

impl Schema {
    fn url_scheme(self) -> &'static str {
        match self {
            Schema::Server => SERVER_URL_SCHEME,
            Schema::SentinelGroup => SENTINEL_URL_SCHEME,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Server => write!(f, "Server"),
            Schema::SentinelGroup => write!(f, "SentinelGroup"),
        }
    }
}

/// Endpoints, port and credentials of the cache service.
///
/// Constructors enforce the schema invariants: a server descriptor has
/// exactly one endpoint, a sentinel descriptor has at least one endpoint and
/// a group name, and the port is always a valid TCP port.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    endpoints: Vec<String>,
    port: String,
    password: String,
    group_name: String,
    schema: Schema,
}

impl ConnectionDescriptor {
    /// Descriptor for a single cache server.
    pub fn server(
        host: impl Into<String>,
        port: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        Self::new(
            vec![host.into()],
            port.into(),
            password.into(),
            String::new(),
            Schema::Server,
        )
    }

    /// Descriptor for a sentinel-managed failover group.
    pub fn sentinel(
        endpoints: Vec<String>,
        port: impl Into<String>,
        password: impl Into<String>,
        group_name: impl Into<String>,
    ) -> Result<Self, DescriptorError> {
        Self::new(
            endpoints,
            port.into(),
            password.into(),
            group_name.into(),
            Schema::SentinelGroup,
        )
    }

    fn new(
        endpoints: Vec<String>,
        port: String,
        password: String,
        group_name: String,
        schema: Schema,
    ) -> Result<Self, DescriptorError> {
        match schema {
            Schema::Server if endpoints.len() != 1 => {
                return Err(DescriptorError::ServerEndpointCount(endpoints.len()));
            }
            Schema::SentinelGroup if endpoints.is_empty() => {
                return Err(DescriptorError::NoSentinelEndpoints);
            }
            Schema::SentinelGroup if group_name.is_empty() => {
                return Err(DescriptorError::MissingGroupName);
            }
            _ => {}
        }

        if let Some(bad) = endpoints.iter().find(|h| !is_valid_host(h)) {
            return Err(DescriptorError::InvalidHost(bad.clone()));
        }
        parse_port(&port)?;

        Ok(Self {
            endpoints,
            port,
            password,
            group_name,
            schema,
        })
    }

    /// Replace the password. Passwords carry no invariant.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Failover group name. Empty for [`Schema::Server`].
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Render the connection URL, without a logical database index.
    pub fn connection_url(&self) -> String {
        let userinfo = utf8_percent_encode(&self.password, NON_ALPHANUMERIC).to_string();
        self.render_url(&userinfo)
    }

    /// Connection URL with the password masked, for logs and status.
    pub fn redacted_url(&self) -> String {
        if self.password.is_empty() {
            self.render_url("")
        } else {
            self.render_url("****")
        }
    }

    /// `userinfo` is the already-encoded password; empty omits it.
    fn render_url(&self, userinfo: &str) -> String {
        let mut url = format!("{}://", self.schema.url_scheme());

        if !userinfo.is_empty() {
            url.push(':');
            url.push_str(userinfo);
            url.push('@');
        }

        let hosts: Vec<String> = self
            .endpoints
            .iter()
            .map(|host| format!("{}:{}", host, self.port))
            .collect();
        url.push_str(&hosts.join(","));

        if self.schema == Schema::SentinelGroup {
            url.push('/');
            url.extend(utf8_percent_encode(&self.group_name, NON_ALPHANUMERIC));
        }

        url
    }

    /// Parse a URL produced by [`connection_url`](Self::connection_url).
    pub fn from_url(url: &str) -> Result<Self, DescriptorError> {
        let invalid = |msg: &str| DescriptorError::InvalidUrl(msg.to_string());

        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let schema = match scheme {
            SERVER_URL_SCHEME => Schema::Server,
            SENTINEL_URL_SCHEME => Schema::SentinelGroup,
            other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        };

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };

        let group_name = match (schema, path) {
            (Schema::Server, None) => String::new(),
            (Schema::Server, Some(_)) => return Err(invalid("server url must not have a path")),
            (Schema::SentinelGroup, Some(group)) => decode(group)?,
            (Schema::SentinelGroup, None) => return Err(DescriptorError::MissingGroupName),
        };

        let (password, hosts) = match authority.rsplit_once('@') {
            Some((userinfo, hosts)) => {
                let encoded = userinfo
                    .strip_prefix(':')
                    .ok_or_else(|| invalid("userinfo must be ':<password>'"))?;
                (decode(encoded)?, hosts)
            }
            None => (String::new(), authority),
        };

        let mut endpoints = Vec::new();
        let mut port: Option<&str> = None;
        for entry in hosts.split(',') {
            let (host, entry_port) = entry
                .rsplit_once(':')
                .ok_or_else(|| invalid("endpoint without port"))?;
            match port {
                Some(p) if p != entry_port => {
                    return Err(invalid("endpoints use different ports"));
                }
                _ => port = Some(entry_port),
            }
            endpoints.push(host.to_string());
        }
        let port = port.ok_or_else(|| invalid("no endpoints"))?;

        Self::new(endpoints, port.to_string(), password, group_name, schema)
    }

    /// Build the `fred` client configuration for this descriptor.
    pub fn client_config(&self) -> Result<Config, DescriptorError> {
        let port = parse_port(&self.port)?;

        let server = match self.schema {
            Schema::Server => {
                let host = self
                    .endpoints
                    .first()
                    .ok_or(DescriptorError::ServerEndpointCount(0))?;
                ServerConfig::new_centralized(host.clone(), port)
            }
            Schema::SentinelGroup => {
                let hosts: Vec<(String, u16)> = self
                    .endpoints
                    .iter()
                    .map(|host| (host.clone(), port))
                    .collect();
                let mut server = ServerConfig::new_sentinel(hosts, self.group_name.clone());
                // The password belongs to the primary; sentinels are reached unauthenticated.
                if let ServerConfig::Sentinel {
                    username, password, ..
                } = &mut server
                {
                    *username = None;
                    *password = None;
                }
                server
            }
        };

        Ok(Config {
            server,
            password: (!self.password.is_empty()).then(|| self.password.clone()),
            ..Default::default()
        })
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("endpoints", &self.endpoints)
            .field("port", &self.port)
            .field(
                "password",
                &if self.password.is_empty() { "" } else { "****" },
            )
            .field("group_name", &self.group_name)
            .field("schema", &self.schema)
            .finish()
    }
}

fn parse_port(port: &str) -> Result<u16, DescriptorError> {
    port.parse::<u16>()
        .ok()
        .filter(|p| *p != 0)
        .ok_or_else(|| DescriptorError::InvalidPort(port.to_string()))
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && !host
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '/' | '@'))
}

fn decode(encoded: &str) -> Result<String, DescriptorError> {
    percent_decode_str(encoded)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| DescriptorError::InvalidUrl(format!("invalid percent-encoding: {e}")))
}
