//! Authentication hook
//!
//! Invoked once the host pipeline has verified a principal. Looks the user
//! up by account name, resolves its groups into role claims and attaches
//! them to the principal in one step. Failures here only skip role
//! enrichment; they never change whether the principal authenticated.

use crate::directory::DirectoryEndpoint;
use crate::filter::{user_filter, ObjectClass};
use crate::metrics;
use crate::resolver::{first_match, GroupResolver, ResolverLimits};
use adclaims_core::config::{AdClaimsConfig, ResolverConfig};
use adclaims_core::dn::{self, common_name};
use adclaims_core::types::{
    Diagnostic, DiagnosticKind, Principal, RoleClaim, RoleSink, SearchScope, Severity,
};
use adclaims_core::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Per-adapter resolution behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterOptions {
    pub resolve_nested_groups: bool,
    pub ambiguous_match_level: Severity,
    pub limits: ResolverLimits,
    pub timeout: Option<Duration>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            resolve_nested_groups: true,
            ambiguous_match_level: Severity::Warn,
            limits: ResolverLimits::default(),
            timeout: None,
        }
    }
}

impl From<&ResolverConfig> for AdapterOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            resolve_nested_groups: config.resolve_nested_groups,
            ambiguous_match_level: config.ambiguous_match_level,
            limits: ResolverLimits {
                max_depth: config.max_depth,
                max_groups: config.max_groups,
            },
            timeout: config.timeout(),
        }
    }
}

/// Outcome of one role resolution
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionReport {
    pub principal: String,
    pub account_name: String,
    pub search_base: String,
    pub resolve_nested_groups: bool,
    pub roles: Vec<RoleClaim>,
    pub diagnostics: Vec<Diagnostic>,
    pub started_at: DateTime<Utc>,
}

/// Attaches directory group memberships to authenticated principals
pub struct RoleAdapter<D> {
    directory: D,
    machine_account: String,
    search_base: String,
    options: AdapterOptions,
}

impl<D: DirectoryEndpoint> RoleAdapter<D> {
    /// Create an adapter for the directory of `machine_account`'s domain.
    ///
    /// The account must have the form `name@domain`; both credentials must
    /// be non-empty.
    pub fn new(directory: D, machine_account: &str, machine_password: &str) -> Result<Self> {
        if machine_account.is_empty() {
            return Err(Error::MissingCredentials("machine account"));
        }
        if machine_password.is_empty() {
            return Err(Error::MissingCredentials("machine password"));
        }

        let search_base = dn::search_base_for_account(machine_account)?;

        Ok(Self {
            directory,
            machine_account: machine_account.to_string(),
            search_base,
            options: AdapterOptions::default(),
        })
    }

    pub fn from_config(directory: D, config: &AdClaimsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            directory,
            &config.directory.machine_account,
            &config.directory.machine_password,
        )?
        .with_options(AdapterOptions::from(&config.resolver)))
    }

    pub fn with_options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn search_base(&self) -> &str {
        &self.search_base
    }

    pub fn machine_account(&self) -> &str {
        &self.machine_account
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn into_directory(self) -> D {
        self.directory
    }

    /// Attach directory-derived roles to `principal`, resolving nested
    /// groups when the adapter's options say so.
    ///
    /// On error no roles are attached.
    pub async fn on_authenticated(&self, principal: &mut Principal) -> Result<ResolutionReport> {
        let name = principal.name().to_string();
        self.enrich(&name, principal).await
    }

    /// Resolve roles for `principal_name` and add them to any role sink
    pub async fn enrich<S: RoleSink + ?Sized>(
        &self,
        principal_name: &str,
        sink: &mut S,
    ) -> Result<ResolutionReport> {
        self.enrich_with(principal_name, sink, self.options.resolve_nested_groups)
            .await
    }

    /// Like [`enrich`](Self::enrich), with nesting chosen per call
    pub async fn enrich_with<S: RoleSink + ?Sized>(
        &self,
        principal_name: &str,
        sink: &mut S,
        resolve_nested_groups: bool,
    ) -> Result<ResolutionReport> {
        let report = self
            .resolve_with(principal_name, resolve_nested_groups)
            .await?;
        sink.add_roles(&report.roles);
        Ok(report)
    }

    /// Resolve roles without attaching them anywhere
    pub async fn resolve(&self, principal_name: &str) -> Result<ResolutionReport> {
        self.resolve_with(principal_name, self.options.resolve_nested_groups)
            .await
    }

    pub async fn resolve_with(
        &self,
        principal_name: &str,
        resolve_nested_groups: bool,
    ) -> Result<ResolutionReport> {
        let account_name = dn::account_name(principal_name)?;
        let started_at = Utc::now();
        let clock = Instant::now();

        let lookup = self.lookup(account_name, resolve_nested_groups);
        let outcome = match self.options.timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .unwrap_or(Err(Error::Timeout(limit))),
            None => lookup.await,
        };

        let (roles, diagnostics) = match outcome {
            Ok(found) => found,
            Err(e) => {
                warn!(principal = %principal_name, error = %e, "Role resolution failed");
                metrics::record_resolution("error", 0, clock.elapsed());
                return Err(e);
            }
        };

        for diagnostic in &diagnostics {
            log_diagnostic(diagnostic);
        }

        info!(
            principal = %principal_name,
            roles = roles.len(),
            nested = resolve_nested_groups,
            "Resolved directory roles"
        );
        metrics::record_resolution("success", roles.len(), clock.elapsed());

        Ok(ResolutionReport {
            principal: principal_name.to_string(),
            account_name: account_name.to_string(),
            search_base: self.search_base.clone(),
            resolve_nested_groups,
            roles,
            diagnostics,
            started_at,
        })
    }

    async fn lookup(
        &self,
        account_name: &str,
        resolve_nested_groups: bool,
    ) -> Result<(Vec<RoleClaim>, Vec<Diagnostic>)> {
        let mut diagnostics = Vec::new();
        let filter = user_filter(account_name);
        debug!(filter = %filter, base_dn = %self.search_base, "Searching for user");

        metrics::record_search(ObjectClass::User);
        let entries = self
            .directory
            .search(&self.search_base, &filter, SearchScope::Subtree)
            .await
            .map_err(|e| {
                metrics::record_directory_error(ObjectClass::User);
                e
            })?;

        if entries.len() > 1 {
            metrics::record_ambiguous_match(ObjectClass::User);
        }

        let Some(user) = first_match(
            entries,
            &filter,
            &self.search_base,
            self.options.ambiguous_match_level,
            &mut diagnostics,
        ) else {
            diagnostics.push(Diagnostic::new(DiagnosticKind::UserNotFound {
                account: account_name.to_string(),
            }));
            return Ok((Vec::new(), diagnostics));
        };

        let mut groups = Vec::new();
        for group_dn in user.member_of() {
            groups.push(common_name(&group_dn)?.to_string());
        }
        debug!(user = %user.dn, groups = groups.len(), "Found user");

        let resolution = GroupResolver::new(&self.directory, &self.search_base)
            .with_limits(self.options.limits)
            .with_ambiguous_match_level(self.options.ambiguous_match_level)
            .resolve_roles(&groups, resolve_nested_groups)
            .await?;

        diagnostics.extend(resolution.diagnostics);
        Ok((resolution.roles, diagnostics))
    }
}

fn log_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic.severity {
        Severity::Debug => debug!("{}", diagnostic.kind),
        Severity::Info => info!("{}", diagnostic.kind),
        Severity::Warn => warn!("{}", diagnostic.kind),
    }
}

/// One-shot entry point: build an adapter for `machine_account` and attach
/// roles to `principal`.
pub async fn on_authenticated<D: DirectoryEndpoint>(
    directory: D,
    principal: &mut Principal,
    machine_account: &str,
    machine_password: &str,
    resolve_nested_groups: bool,
) -> Result<ResolutionReport> {
    RoleAdapter::new(directory, machine_account, machine_password)?
        .with_options(AdapterOptions {
            resolve_nested_groups,
            ..Default::default()
        })
        .on_authenticated(principal)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDirectory;
    use adclaims_core::types::DirectoryEntry;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn kerb_directory() -> InMemoryDirectory {
        InMemoryDirectory::new()
            .with_user(
                "alice",
                "CN=alice,CN=Users,DC=KERB,DC=LOCAL",
                &["CN=TestGroup,DC=KERB,DC=LOCAL"],
            )
            .with_group("TestGroup", "CN=TestGroup,DC=KERB,DC=LOCAL", &[])
    }

    fn flat() -> AdapterOptions {
        AdapterOptions {
            resolve_nested_groups: false,
            ..Default::default()
        }
    }

    fn role_strings(principal: &Principal) -> Vec<&str> {
        principal.roles().iter().map(|r| r.as_str()).collect()
    }

    #[tokio::test]
    async fn test_flat_roles_use_common_names() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret")
            .unwrap()
            .with_options(flat());
        let mut principal = Principal::new("alice@KERB.LOCAL");

        adapter.on_authenticated(&mut principal).await.unwrap();

        assert_eq!(role_strings(&principal), vec!["TestGroup"]);
        // only the user lookup hits the directory
        assert_eq!(adapter.directory().search_count(), 1);
    }

    #[tokio::test]
    async fn test_nested_roles_use_distinguished_names() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret").unwrap();
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let report = adapter.on_authenticated(&mut principal).await.unwrap();

        assert_eq!(role_strings(&principal), vec!["CN=TestGroup,DC=KERB,DC=LOCAL"]);
        assert_eq!(report.roles.len(), 1);
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_search_base_and_account_extraction() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret").unwrap();
        assert_eq!(adapter.search_base(), "dc=KERB,dc=LOCAL");

        let report = adapter.resolve("alice@KERB.LOCAL").await.unwrap();
        assert_eq!(report.account_name, "alice");
        assert_eq!(report.search_base, "dc=KERB,dc=LOCAL");

        let searches = adapter.directory().searches();
        assert_eq!(searches[0].base_dn, "dc=KERB,dc=LOCAL");
        assert_eq!(
            searches[0].filter,
            "(&(objectClass=user)(sAMAccountName=alice))"
        );
        assert_eq!(searches[0].scope, SearchScope::Subtree);
    }

    #[tokio::test]
    async fn test_unknown_user_gets_no_roles() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret").unwrap();
        let mut principal = Principal::new("mallory@KERB.LOCAL");

        let report = adapter.on_authenticated(&mut principal).await.unwrap();

        assert!(principal.roles().is_empty());
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::new(DiagnosticKind::UserNotFound {
                account: "mallory".into()
            })]
        );
    }

    #[tokio::test]
    async fn test_user_without_groups() {
        let directory = InMemoryDirectory::new().with_user(
            "loner",
            "CN=loner,CN=Users,DC=KERB,DC=LOCAL",
            &[],
        );
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret").unwrap();
        let mut principal = Principal::new("loner@KERB.LOCAL");

        let report = adapter.on_authenticated(&mut principal).await.unwrap();
        assert!(principal.roles().is_empty());
        assert!(report.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_nested_diamond_through_user() {
        let directory = InMemoryDirectory::new()
            .with_user(
                "alice",
                "CN=alice,CN=Users,DC=KERB,DC=LOCAL",
                &["CN=G1,DC=KERB,DC=LOCAL", "CN=G2,DC=KERB,DC=LOCAL"],
            )
            .with_group("G1", "CN=G1,DC=KERB,DC=LOCAL", &["CN=G3,DC=KERB,DC=LOCAL"])
            .with_group("G2", "CN=G2,DC=KERB,DC=LOCAL", &["CN=G3,DC=KERB,DC=LOCAL"])
            .with_group("G3", "CN=G3,DC=KERB,DC=LOCAL", &[]);
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret").unwrap();
        let mut principal = Principal::new("alice@KERB.LOCAL");

        adapter.on_authenticated(&mut principal).await.unwrap();

        let g3 = principal
            .roles()
            .iter()
            .filter(|r| r.as_str() == "CN=G3,DC=KERB,DC=LOCAL")
            .count();
        assert_eq!(g3, 1);
        assert_eq!(principal.roles().len(), 3);
    }

    #[tokio::test]
    async fn test_ambiguous_user_takes_first_match() {
        let directory = InMemoryDirectory::new()
            .with_user("alice", "CN=alice,OU=A,DC=KERB,DC=LOCAL", &["CN=First,DC=KERB,DC=LOCAL"])
            .with_user("alice", "CN=alice,OU=B,DC=KERB,DC=LOCAL", &["CN=Second,DC=KERB,DC=LOCAL"]);
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret")
            .unwrap()
            .with_options(flat());
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let report = adapter.on_authenticated(&mut principal).await.unwrap();

        assert_eq!(role_strings(&principal), vec!["First"]);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].severity, Severity::Warn);
        assert!(report.diagnostics[0].is_ambiguous_match());
    }

    #[tokio::test]
    async fn test_malformed_principal_fails_before_search() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret").unwrap();

        for name in ["alice", "alice@a@b"] {
            let mut principal = Principal::new(name);
            let err = adapter
                .on_authenticated(&mut principal)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidAccountName(_)));
            assert!(err.is_config());
        }
        assert_eq!(adapter.directory().search_count(), 0);
    }

    #[test]
    fn test_adapter_preconditions() {
        assert!(matches!(
            RoleAdapter::new(InMemoryDirectory::new(), "svc", "secret"),
            Err(Error::InvalidAccountName(_))
        ));
        assert!(matches!(
            RoleAdapter::new(InMemoryDirectory::new(), "svc@KERB.LOCAL", ""),
            Err(Error::MissingCredentials("machine password"))
        ));
        assert!(matches!(
            RoleAdapter::new(InMemoryDirectory::new(), "", "secret"),
            Err(Error::MissingCredentials("machine account"))
        ));
    }

    #[tokio::test]
    async fn test_malformed_member_of_is_an_error() {
        let directory = InMemoryDirectory::new().with_user(
            "alice",
            "CN=alice,CN=Users,DC=KERB,DC=LOCAL",
            &["OU=Weird,DC=KERB,DC=LOCAL"],
        );
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret")
            .unwrap()
            .with_options(flat());
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let err = adapter
            .on_authenticated(&mut principal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDn(_)));
        assert!(principal.roles().is_empty());
    }

    #[tokio::test]
    async fn test_directory_failure_adds_no_roles() {
        let directory = InMemoryDirectory::new().failing("connection refused");
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret").unwrap();
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let err = adapter
            .on_authenticated(&mut principal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Directory(_)));
        assert!(principal.roles().is_empty());
    }

    /// Delays every search
    struct SlowDirectory {
        inner: InMemoryDirectory,
        delay: Duration,
    }

    #[async_trait]
    impl DirectoryEndpoint for SlowDirectory {
        async fn search(
            &self,
            base_dn: &str,
            filter: &str,
            scope: SearchScope,
        ) -> Result<Vec<DirectoryEntry>> {
            tokio::time::sleep(self.delay).await;
            self.inner.search(base_dn, filter, scope).await
        }
    }

    #[tokio::test]
    async fn test_timeout_aborts_resolution() {
        let directory = SlowDirectory {
            inner: kerb_directory(),
            delay: Duration::from_millis(500),
        };
        let adapter = RoleAdapter::new(directory, "svc@KERB.LOCAL", "secret")
            .unwrap()
            .with_options(AdapterOptions {
                timeout: Some(Duration::from_millis(20)),
                ..Default::default()
            });
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let err = adapter
            .on_authenticated(&mut principal)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(principal.roles().is_empty());
    }

    #[tokio::test]
    async fn test_options_from_config() {
        let mut config = AdClaimsConfig::default();
        config.directory.machine_account = "svc@KERB.LOCAL".into();
        config.directory.machine_password = "secret".into();
        config.resolver.resolve_nested_groups = false;
        config.resolver.max_depth = Some(3);
        config.resolver.ambiguous_match_level = Severity::Info;
        config.resolver.timeout_secs = Some(5);

        let adapter = RoleAdapter::from_config(Arc::new(kerb_directory()), &config).unwrap();
        let options = adapter.options();
        assert!(!options.resolve_nested_groups);
        assert_eq!(options.limits.max_depth, Some(3));
        assert_eq!(options.ambiguous_match_level, Severity::Info);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));

    }

    #[tokio::test]
    async fn test_configured_flat_mode_applies_to_on_authenticated() {
        let mut config = AdClaimsConfig::default();
        config.directory.machine_account = "svc@KERB.LOCAL".into();
        config.directory.machine_password = "secret".into();
        config.resolver.resolve_nested_groups = false;

        let adapter = RoleAdapter::from_config(kerb_directory(), &config).unwrap();
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let report = adapter.on_authenticated(&mut principal).await.unwrap();

        assert!(!report.resolve_nested_groups);
        assert_eq!(role_strings(&principal), vec!["TestGroup"]);
        assert_eq!(adapter.directory().search_count(), 1);
    }

    #[tokio::test]
    async fn test_per_call_nesting_override() {
        let adapter = RoleAdapter::new(kerb_directory(), "svc@KERB.LOCAL", "secret")
            .unwrap()
            .with_options(flat());
        let mut principal = Principal::new("alice@KERB.LOCAL");

        adapter
            .enrich_with("alice@KERB.LOCAL", &mut principal, true)
            .await
            .unwrap();
        assert_eq!(role_strings(&principal), vec!["CN=TestGroup,DC=KERB,DC=LOCAL"]);

        let report = adapter.resolve_with("alice@KERB.LOCAL", false).await.unwrap();
        assert_eq!(report.roles, vec![RoleClaim::new("TestGroup")]);
    }

    #[tokio::test]
    async fn test_one_shot_entry_point() {
        let mut principal = Principal::new("alice@KERB.LOCAL");
        let report = on_authenticated(
            kerb_directory(),
            &mut principal,
            "svc@KERB.LOCAL",
            "secret",
            true,
        )
        .await
        .unwrap();

        assert_eq!(report.principal, "alice@KERB.LOCAL");
        assert!(principal.has_role("CN=TestGroup,DC=KERB,DC=LOCAL"));
    }
}
