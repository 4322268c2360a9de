//! Tollgate server configuration: deserialization, environment overrides and validation.
//!
//! A `ServerConfig` is assembled once at startup (defaults, then an optional
//! TOML file, then environment, then CLI flags) and is immutable afterwards.
//! Pipeline stages receive the values they need at construction time and never
//! look at the process environment themselves.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use axum::http::HeaderValue;
use serde::Deserialize;

use crate::error::TollgateError;

/// Listening port used when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8888;

/// Shared secret used when nothing else is configured.
pub const DEFAULT_AUTH_TOKEN: &str = "test-secret-token";

/// Environment variable overriding the listening port.
pub const PORT_ENV: &str = "MCP_SERVER_PORT";

/// Environment variable overriding the shared secret.
pub const TOKEN_ENV: &str = "MCP_AUTH_TOKEN";

/// Top-level Tollgate configuration, parsed from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Path the MCP endpoint answers on. Other paths get a JSON 404.
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Host header value forwarded to the tool runtime. Defaults to `localhost:<port>`.
    pub canonical_host: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Bearer-token settings.
#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Disabling auth is an explicit opt-out for trusted local deployments.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_auth_token")]
    pub token: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("token", &"<redacted>")
            .finish()
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_endpoint_path() -> String {
    "/mcp".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_auth_token() -> String {
    DEFAULT_AUTH_TOKEN.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            token: default_auth_token(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            endpoint_path: default_endpoint_path(),
            canonical_host: None,
            auth: AuthConfig::default(),
        }
    }
}

/// Command-line overrides, the highest-precedence configuration layer.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub bind: Option<IpAddr>,
    pub token: Option<String>,
    /// Turn the auth gate off regardless of file or environment.
    pub no_auth: bool,
}

impl ServerConfig {
    /// Assemble the effective config: defaults < TOML file < environment < overrides.
    ///
    /// The result is validated; nothing that fails here should ever bind.
    pub fn resolve<F>(
        file: Option<&Path>,
        lookup: F,
        overrides: &ConfigOverrides,
    ) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;

        if let Some(port) = overrides.port {
            config.port = port;
        }
        if let Some(bind) = overrides.bind {
            config.bind = bind;
        }
        if let Some(token) = &overrides.token {
            config.auth.token = token.clone();
        }
        if overrides.no_auth {
            config.auth.enabled = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a config from TOML text. Missing keys fall back to defaults.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| TollgateError::ConfigParse(e.to_string()))
    }

    /// Read and parse a `tollgate.toml` file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TollgateError::ConfigParse(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply `MCP_SERVER_PORT` / `MCP_AUTH_TOKEN` overrides through `lookup`.
    ///
    /// The lookup is injected so callers decide where values come from;
    /// the binary passes `std::env::var`, tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F) -> crate::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(PORT_ENV) {
            self.port = raw.trim().parse().map_err(|_| {
                TollgateError::InvalidConfig(format!("{} is not a valid port: '{}'", PORT_ENV, raw))
            })?;
        }
        if let Some(token) = lookup(TOKEN_ENV) {
            self.auth.token = token;
        }
        Ok(())
    }

    /// The host header value every request carries once past the rewrite stage.
    pub fn canonical_host(&self) -> String {
        match &self.canonical_host {
            Some(host) => host.clone(),
            None => format!("localhost:{}", self.port),
        }
    }

    /// Validate the config, failing fast before anything binds.
    pub fn validate(&self) -> crate::Result<()> {
        if self.port == 0 {
            return Err(TollgateError::InvalidConfig(
                "port must be non-zero".to_string(),
            ));
        }

        if self.auth.enabled && self.auth.token.is_empty() {
            return Err(TollgateError::InvalidConfig(
                "auth token must be non-empty while auth is enabled".to_string(),
            ));
        }

        if !self.endpoint_path.starts_with('/') {
            return Err(TollgateError::InvalidConfig(format!(
                "endpoint_path must start with '/', got '{}'",
                self.endpoint_path
            )));
        }

        let host = self.canonical_host();
        if host.is_empty() || HeaderValue::from_str(&host).is_err() {
            return Err(TollgateError::InvalidConfig(format!(
                "canonical_host '{}' is not a valid header value",
                host
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8888);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.endpoint_path, "/mcp");
        assert!(config.auth.enabled);
        assert_eq!(config.auth.token, "test-secret-token");
        assert_eq!(config.canonical_host(), "localhost:8888");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.auth.token, DEFAULT_AUTH_TOKEN);
    }

    #[test]
    fn test_parse_full_toml() {
        let config = ServerConfig::from_toml_str(
            r#"
            port = 9090
            bind = "127.0.0.1"
            endpoint_path = "/tools"
            canonical_host = "tools.internal:80"

            [auth]
            enabled = false
            token = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.endpoint_path, "/tools");
        assert_eq!(config.canonical_host(), "tools.internal:80");
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.token, "s3cret");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = ServerConfig::from_toml_str("prot = 1234");
        assert!(matches!(result, Err(TollgateError::ConfigParse(_))));
    }

    #[test]
    fn test_env_overrides_port_and_token() {
        let mut config = ServerConfig::default();
        config
            .apply_env(env_from(&[("MCP_SERVER_PORT", "9999"), ("MCP_AUTH_TOKEN", "abc")]))
            .unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.auth.token, "abc");
        assert_eq!(config.canonical_host(), "localhost:9999");
    }

    #[test]
    fn test_env_bad_port_rejected() {
        let mut config = ServerConfig::default();
        let result = config.apply_env(env_from(&[("MCP_SERVER_PORT", "eighty")]));
        assert!(
            matches!(result, Err(TollgateError::InvalidConfig(msg)) if msg.contains("MCP_SERVER_PORT"))
        );
    }

    #[test]
    fn test_env_absent_keeps_values() {
        let mut config = ServerConfig::from_toml_str("port = 7000").unwrap();
        config.apply_env(env_from(&[])).unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.auth.token, DEFAULT_AUTH_TOKEN);
    }

    #[test]
    fn test_empty_token_rejected_when_auth_enabled() {
        let mut config = ServerConfig::default();
        config.auth.token = String::new();
        let result = config.validate();
        assert!(matches!(result, Err(TollgateError::InvalidConfig(msg)) if msg.contains("token")));
    }

    #[test]
    fn test_empty_token_allowed_when_auth_disabled() {
        let mut config = ServerConfig::default();
        config.auth.enabled = false;
        config.auth.token = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_port_rejected() {
        let mut config = ServerConfig::default();
        config.port = 0;
        assert!(matches!(
            config.validate(),
            Err(TollgateError::InvalidConfig(msg)) if msg.contains("port")
        ));
    }

    #[test]
    fn test_endpoint_path_must_be_absolute() {
        let mut config = ServerConfig::default();
        config.endpoint_path = "mcp".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_canonical_host_must_be_header_safe() {
        let mut config = ServerConfig::default();
        config.canonical_host = Some("bad\nhost".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 9100\n\n[auth]\ntoken = \"from-file\"").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.auth.token, "from-file");
        assert!(config.auth.enabled);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = ServerConfig::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(TollgateError::ConfigParse(msg)) if msg.contains("absent.toml")));
    }

    fn toml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_resolve_defaults_only() {
        let config = ServerConfig::resolve(None, env_from(&[]), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.auth.token, DEFAULT_AUTH_TOKEN);
        assert!(config.auth.enabled);
    }

    #[test]
    fn test_resolve_file_over_defaults() {
        let file = toml_file("port = 9100\nbind = \"127.0.0.1\"\n");
        let config =
            ServerConfig::resolve(Some(file.path()), env_from(&[]), &ConfigOverrides::default())
                .unwrap();
        assert_eq!(config.port, 9100);
        assert_eq!(config.bind.to_string(), "127.0.0.1");
        assert_eq!(config.auth.token, DEFAULT_AUTH_TOKEN);
    }

    #[test]
    fn test_resolve_env_over_file() {
        let file = toml_file("port = 9100\n\n[auth]\ntoken = \"file-token\"\n");
        let env = env_from(&[(PORT_ENV, "9200"), (TOKEN_ENV, "env-token")]);
        let config =
            ServerConfig::resolve(Some(file.path()), env, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.port, 9200);
        assert_eq!(config.auth.token, "env-token");
    }

    #[test]
    fn test_resolve_flags_over_env() {
        let file = toml_file("port = 9100\n");
        let env = env_from(&[(PORT_ENV, "9200"), (TOKEN_ENV, "env-token")]);
        let overrides = ConfigOverrides {
            port: Some(9300),
            bind: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            token: Some("flag-token".to_string()),
            no_auth: false,
        };
        let config = ServerConfig::resolve(Some(file.path()), env, &overrides).unwrap();
        assert_eq!(config.port, 9300);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.auth.token, "flag-token");
        assert!(config.auth.enabled);
    }

    #[test]
    fn test_resolve_no_auth_admits_empty_token() {
        let env = env_from(&[(TOKEN_ENV, "")]);
        let rejected = ServerConfig::resolve(None, &env, &ConfigOverrides::default());
        assert!(matches!(rejected, Err(TollgateError::InvalidConfig(_))));

        let overrides = ConfigOverrides {
            no_auth: true,
            ..Default::default()
        };
        let config = ServerConfig::resolve(None, &env, &overrides).unwrap();
        assert!(!config.auth.enabled);
        assert_eq!(config.auth.token, "");
    }

    #[test]
    fn test_resolve_no_auth_overrides_file_enabled() {
        let file = toml_file("[auth]\nenabled = true\n");
        let overrides = ConfigOverrides {
            no_auth: true,
            ..Default::default()
        };
        let config = ServerConfig::resolve(Some(file.path()), env_from(&[]), &overrides).unwrap();
        assert!(!config.auth.enabled);
    }

    #[test]
    fn test_resolve_validates_final_result() {
        let overrides = ConfigOverrides {
            port: Some(0),
            ..Default::default()
        };
        let result = ServerConfig::resolve(None, env_from(&[]), &overrides);
        assert!(matches!(result, Err(TollgateError::InvalidConfig(_))));
    }

    #[test]
    fn test_resolve_bad_file_is_parse_error() {
        let file = toml_file("port = \"not a number\"\n");
        let result =
            ServerConfig::resolve(Some(file.path()), env_from(&[]), &ConfigOverrides::default());
        assert!(matches!(result, Err(TollgateError::ConfigParse(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ServerConfig::default();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("test-secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}
