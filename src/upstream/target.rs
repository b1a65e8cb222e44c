//! Normalized upstream target descriptors.
//!
//! Two targets that address the same backends compare equal regardless of how
//! they were written, so the client registry can key on them.

use std::fmt;

use url::Url;

use crate::error::BuildError;

/// Scheme understood by the bundled transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Scheme {
    Http,
}

impl Scheme {
    pub fn parse(scheme: &str) -> Result<Self, BuildError> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Ok(Scheme::Http),
            other => Err(BuildError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend address. Hosts are stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, BuildError> {
        let host = host.into().to_ascii_lowercase();
        if host.is_empty() {
            return Err(BuildError::InvalidTarget {
                target: format!(":{port}"),
                reason: "empty host".into(),
            });
        }
        if port == 0 {
            return Err(BuildError::InvalidTarget {
                target: format!("{host}:{port}"),
                reason: "port must be in 1..=65535".into(),
            });
        }
        Ok(Self { host, port })
    }

    /// Parse `host[:port]`, defaulting the port from `scheme`.
    pub fn parse(raw: &str, scheme: Scheme) -> Result<Self, BuildError> {
        let invalid = |reason: &str| BuildError::InvalidTarget {
            target: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(&format!("{scheme}://{raw}")).map_err(|e| invalid(&e.to_string()))?;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("endpoint must be host[:port]"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url.port().unwrap_or(scheme.default_port());
        Self::new(host, port)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Scheme, endpoint set and base path of an upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    scheme: Scheme,
    endpoints: Vec<Endpoint>,
    base_path: String,
}

impl Target {
    /// Build a target from an absolute URI such as `http://backend:8080/api`.
    pub fn from_uri(uri: &str) -> Result<Self, BuildError> {
        let invalid = |reason: &str| BuildError::InvalidTarget {
            target: uri.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(uri).map_err(|e| invalid(&e.to_string()))?;
        let scheme = Scheme::parse(url.scheme())?;
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed"));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(invalid("credentials are not allowed"));
        }
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let port = url
            .port_or_known_default()
            .unwrap_or(scheme.default_port());

        Self::from_endpoints(scheme, [Endpoint::new(host, port)?], url.path())
    }

    /// Build a target from a scheme, an endpoint set and a base path.
    pub fn from_endpoints<I>(scheme: Scheme, endpoints: I, base_path: &str) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = Endpoint>,
    {
        let mut endpoints: Vec<Endpoint> = endpoints.into_iter().collect();
        if endpoints.is_empty() {
            return Err(BuildError::EmptyEndpoints);
        }
        endpoints.sort();
        endpoints.dedup();

        Ok(Self {
            scheme,
            endpoints,
            base_path: normalize_base_path(base_path),
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Base path with no trailing `/`; empty for the root.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        for (i, endpoint) in self.endpoints.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{endpoint}")?;
        }
        f.write_str(&self.base_path)
    }
}

fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
