//! adclaims - directory group memberships as role claims
//!
//! Runs the authentication-time role resolution for a principal name against
//! a live directory or a JSON fixture and prints the result.

mod output;

use adclaims_auth::{InMemoryDirectory, LdapDirectory, ResolutionReport, RoleAdapter};
use adclaims_core::config::AdClaimsConfig;
use adclaims_core::types::Principal;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "adclaims")]
#[command(version = adclaims_core::VERSION)]
#[command(about = "Resolve directory group memberships into role claims", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Machine account used to bind (name@domain)
    #[arg(long, global = true, env = "ADCLAIMS_MACHINE_ACCOUNT")]
    machine_account: Option<String>,

    /// Machine account password
    #[arg(long, global = true, env = "ADCLAIMS_MACHINE_PASSWORD", hide_env_values = true)]
    machine_password: Option<String>,

    /// LDAP server URL (defaults to ldap://<domain>:389)
    #[arg(long, global = true, env = "ADCLAIMS_SERVER_URL")]
    server_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "ADCLAIMS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (pretty, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve role claims for an authenticated principal
    Resolve(ResolveArgs),

    /// Validate the configuration and print the derived settings
    CheckConfig,

    /// Show version information
    Version,
}

#[derive(Args)]
struct ResolveArgs {
    /// Principal name in user@domain form
    principal: String,

    /// Emit direct group names only, without nested resolution
    #[arg(long)]
    flat: bool,

    /// Resolve against a JSON fixture instead of a live directory
    #[arg(long)]
    fixture: Option<String>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    init_logging(&config);

    match &cli.command {
        Commands::Version => {
            println!("adclaims {}", adclaims_core::VERSION);
        }
        Commands::CheckConfig => {
            config.validate()?;
            output::print_config(&config)?;
        }
        Commands::Resolve(args) => {
            run_resolve(config, args).await?;
        }
    }

    Ok(())
}

/// Load the config file (or environment) and apply command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<AdClaimsConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        AdClaimsConfig::from_file(config_path)?
    } else {
        AdClaimsConfig::from_env()
    };

    if let Some(account) = &cli.machine_account {
        config.directory.machine_account = account.clone();
    }
    if let Some(password) = &cli.machine_password {
        config.directory.machine_password = password.clone();
    }
    if let Some(url) = &cli.server_url {
        config.directory.server_url = Some(url.clone());
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.logging.format = format.clone();
    }

    Ok(config)
}

fn init_logging(config: &AdClaimsConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn run_resolve(mut config: AdClaimsConfig, args: &ResolveArgs) -> anyhow::Result<()> {
    if args.flat {
        config.resolver.resolve_nested_groups = false;
    }
    let mut principal = Principal::new(&args.principal);

    let report = match &args.fixture {
        Some(path) => resolve_from_fixture(&config, path, &mut principal).await?,
        None => {
            let directory = LdapDirectory::connect(&config.directory).await?;
            info!("Resolving against {}", directory.server_url());
            let adapter = RoleAdapter::from_config(directory, &config)?;
            let result = adapter.on_authenticated(&mut principal).await;

            if let Err(e) = adapter.into_directory().unbind().await {
                warn!("Failed to close directory session: {}", e);
            }
            result?
        }
    };

    output::print_report(&report, args.json)
}

async fn resolve_from_fixture(
    config: &AdClaimsConfig,
    path: &str,
    principal: &mut Principal,
) -> anyhow::Result<ResolutionReport> {
    info!("Resolving against fixture {}", path);
    let directory = InMemoryDirectory::from_json_file(path)?;
    let adapter = RoleAdapter::from_config(directory, config)?;
    Ok(adapter.on_authenticated(principal).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::try_parse_from([
            "adclaims",
            "resolve",
            "alice@KERB.LOCAL",
            "--flat",
            "--fixture",
            "dir.json",
            "--machine-account",
            "svc@KERB.LOCAL",
        ])
        .unwrap();

        match &cli.command {
            Commands::Resolve(args) => {
                assert_eq!(args.principal, "alice@KERB.LOCAL");
                assert!(args.flat);
                assert!(!args.json);
                assert_eq!(args.fixture.as_deref(), Some("dir.json"));
            }
            _ => panic!("expected resolve"),
        }
        assert_eq!(cli.machine_account.as_deref(), Some("svc@KERB.LOCAL"));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "adclaims",
            "--machine-account",
            "svc@KERB.LOCAL",
            "--machine-password",
            "secret",
            "--server-url",
            "ldaps://dc1.kerb.local:636",
            "--log-format",
            "json",
            "check-config",
        ])
        .unwrap();

        let config = build_config(&cli).unwrap();
        assert_eq!(config.directory.machine_account, "svc@KERB.LOCAL");
        assert_eq!(config.directory.machine_password, "secret");
        assert_eq!(
            config.directory.server_url.as_deref(),
            Some("ldaps://dc1.kerb.local:636")
        );
        assert_eq!(config.logging.format, "json");
        assert!(config.validate().is_ok());
    }

    fn demo_config() -> AdClaimsConfig {
        let mut config = AdClaimsConfig::default();
        config.directory.machine_account = "svc@KERB.LOCAL".to_string();
        config.directory.machine_password = "secret".to_string();
        config
    }

    const DEMO_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../demos/kerb-fixture.json");

    #[tokio::test]
    async fn test_resolve_demo_fixture_with_cycle() {
        let mut principal = Principal::new("alice@KERB.LOCAL");

        let report = resolve_from_fixture(&demo_config(), DEMO_FIXTURE, &mut principal)
            .await
            .unwrap();

        let roles: Vec<&str> = principal.roles().iter().map(|r| r.as_str()).collect();
        assert_eq!(
            roles,
            vec![
                "CN=Developers,OU=Groups,DC=KERB,DC=LOCAL",
                "CN=Engineering,OU=Groups,DC=KERB,DC=LOCAL",
                "CN=Testers,OU=Groups,DC=KERB,DC=LOCAL",
            ]
        );
        for group in ["Developers", "Engineering"] {
            let count = roles
                .iter()
                .filter(|r| r.starts_with(&format!("CN={},", group)))
                .count();
            assert_eq!(count, 1, "{} emitted more than once", group);
        }
        assert!(report.diagnostics.is_empty());
        assert!(report.resolve_nested_groups);
    }

    #[tokio::test]
    async fn test_resolve_demo_fixture_flat() {
        let mut config = demo_config();
        config.resolver.resolve_nested_groups = false;
        let mut principal = Principal::new("alice@KERB.LOCAL");

        resolve_from_fixture(&config, DEMO_FIXTURE, &mut principal)
            .await
            .unwrap();

        assert!(principal.has_role("Developers"));
        assert!(principal.has_role("Testers"));
        assert_eq!(principal.roles().len(), 2);
    }
}
