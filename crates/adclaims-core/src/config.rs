//! Configuration for adclaims

use crate::dn;
use crate::types::Severity;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdClaimsConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AdClaimsConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("Failed to parse config: {}", e)))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `ADCLAIMS_*` environment variables onto this configuration
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    /// Overlay `ADCLAIMS_*` variables read through `lookup`.
    ///
    /// Values that fail to parse are skipped with a warning.
    pub fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(account) = lookup("ADCLAIMS_MACHINE_ACCOUNT") {
            self.directory.machine_account = account;
        }
        if let Some(password) = lookup("ADCLAIMS_MACHINE_PASSWORD") {
            self.directory.machine_password = password;
        }
        if let Some(url) = lookup("ADCLAIMS_SERVER_URL") {
            self.directory.server_url = Some(url);
        }
        if let Some(start_tls) = parse_var(&lookup, "ADCLAIMS_START_TLS") {
            self.directory.start_tls = start_tls;
        }
        if let Some(secs) = parse_var(&lookup, "ADCLAIMS_CONNECT_TIMEOUT_SECS") {
            self.directory.connect_timeout_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "ADCLAIMS_OPERATION_TIMEOUT_SECS") {
            self.directory.operation_timeout_secs = secs;
        }

        if let Some(nested) = parse_var(&lookup, "ADCLAIMS_RESOLVE_NESTED_GROUPS") {
            self.resolver.resolve_nested_groups = nested;
        }
        if let Some(severity) = parse_var(&lookup, "ADCLAIMS_AMBIGUOUS_MATCH_LEVEL") {
            self.resolver.ambiguous_match_level = severity;
        }
        if let Some(depth) = parse_var(&lookup, "ADCLAIMS_MAX_DEPTH") {
            self.resolver.max_depth = Some(depth);
        }
        if let Some(groups) = parse_var(&lookup, "ADCLAIMS_MAX_GROUPS") {
            self.resolver.max_groups = Some(groups);
        }
        if let Some(secs) = parse_var(&lookup, "ADCLAIMS_TIMEOUT_SECS") {
            self.resolver.timeout_secs = Some(secs);
        }

        if let Some(level) = lookup("ADCLAIMS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ADCLAIMS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.directory.validate()?;
        self.resolver.validate()
    }
}

/// Directory connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Service account used to bind, in `name@domain` form.
    /// Its domain also determines the search base.
    #[serde(default)]
    pub machine_account: String,

    /// Service account password
    #[serde(default)]
    pub machine_password: String,

    /// LDAP server URL (ldap:// or ldaps://).
    /// Defaults to `ldap://<domain>:389`.
    #[serde(default)]
    pub server_url: Option<String>,

    /// Use STARTTLS
    #[serde(default)]
    pub start_tls: bool,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Per-operation timeout in seconds
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    60
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            machine_account: String::new(),
            machine_password: String::new(),
            server_url: None,
            start_tls: false,
            connect_timeout_secs: default_connect_timeout(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl DirectoryConfig {
    /// Configured server URL, or one derived from the machine account's domain
    pub fn server_url(&self) -> crate::Result<String> {
        match &self.server_url {
            Some(url) => Ok(url.clone()),
            None => Ok(format!("ldap://{}:389", dn::domain_of(&self.machine_account)?)),
        }
    }

    /// Search base derived from the machine account's domain
    pub fn search_base(&self) -> crate::Result<String> {
        dn::search_base_for_account(&self.machine_account)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.machine_account.is_empty() {
            return Err(crate::Error::MissingCredentials("machine account"));
        }
        if self.machine_password.is_empty() {
            return Err(crate::Error::MissingCredentials("machine password"));
        }

        self.search_base()?;

        if let Some(url) = &self.server_url {
            if !url.starts_with("ldap://") && !url.starts_with("ldaps://") {
                return Err(crate::Error::InvalidConfig(
                    "Server URL must start with ldap:// or ldaps://".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Group resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Follow group-of-group membership transitively
    #[serde(default = "default_true")]
    pub resolve_nested_groups: bool,

    /// Severity for multiple entries matching a single-entry filter
    #[serde(default)]
    pub ambiguous_match_level: Severity,

    /// Maximum ancestry depth above a starting group (unbounded when unset)
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Maximum distinct groups expanded per resolution (unbounded when unset)
    #[serde(default)]
    pub max_groups: Option<usize>,

    /// Wall-clock bound on one resolution in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolve_nested_groups: true,
            ambiguous_match_level: Severity::Warn,
            max_depth: None,
            max_groups: None,
            timeout_secs: None,
        }
    }
}

impl ResolverConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_groups == Some(0) {
            return Err(crate::Error::InvalidConfig(
                "max_groups must be at least 1".into(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(crate::Error::InvalidConfig(
                "timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(name)?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, value, e);
            None
        }
    }
}
