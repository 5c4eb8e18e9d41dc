//! Terminal output for adclaims

use adclaims_auth::ResolutionReport;
use adclaims_core::config::AdClaimsConfig;
use adclaims_core::types::Severity;
use colored::Colorize;

/// Print resolved roles to stdout and diagnostics to stderr
pub fn print_report(report: &ResolutionReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    for diagnostic in &report.diagnostics {
        let label = match diagnostic.severity {
            Severity::Warn => "warn".yellow().bold(),
            Severity::Info => "info".green(),
            Severity::Debug => "debug".dimmed(),
        };
        eprintln!("{}: {}", label, diagnostic.kind);
    }

    for role in &report.roles {
        println!("{}", role);
    }

    eprintln!(
        "\n{} role(s) for {} ({}, base {}, at {})",
        report.roles.len(),
        report.principal.bold(),
        if report.resolve_nested_groups {
            "nested"
        } else {
            "flat"
        },
        report.search_base,
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
    );

    Ok(())
}

/// Print the effective configuration, secrets redacted
pub fn print_config(config: &AdClaimsConfig) -> anyhow::Result<()> {
    let directory = &config.directory;
    let resolver = &config.resolver;

    println!("{}", "Directory".bold());
    println!("  machine account:   {}", directory.machine_account);
    println!("  server url:        {}", directory.server_url()?);
    println!("  search base:       {}", directory.search_base()?);
    println!("  start tls:         {}", directory.start_tls);
    println!("  connect timeout:   {}s", directory.connect_timeout_secs);
    println!("  operation timeout: {}s", directory.operation_timeout_secs);

    println!("{}", "Resolver".bold());
    println!("  nested groups:     {}", resolver.resolve_nested_groups);
    println!("  ambiguous match:   {}", resolver.ambiguous_match_level);
    println!("  max depth:         {}", limit(resolver.max_depth));
    println!("  max groups:        {}", limit(resolver.max_groups));
    println!(
        "  timeout:           {}",
        resolver
            .timeout_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn limit(value: Option<usize>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}
