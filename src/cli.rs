//! Command-line interface for `xapi-lrs-auth-proxy`.

use std::path::PathBuf;

use clap::Parser;

/// xAPI LRS auth proxy: session-scoped tokens and cmi5 permission
/// enforcement in front of a Learning Record Store.
///
/// Runs in single-tenant mode from a config file by default; pass
/// `--multi-tenant` with a database connection string to serve independent
/// customers distinguished by hostname.
#[derive(Parser, Debug)]
#[command(name = "xapi-lrs-auth-proxy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (YAML)
    #[arg(short, long, default_value = "config.yaml", env = "XAPI_PROXY_CONFIG")]
    pub config: PathBuf,

    /// Serve multiple tenants from an external tenant store
    #[arg(long)]
    pub multi_tenant: bool,

    /// Tenant database connection string (required with --multi-tenant)
    #[arg(long, env = "XAPI_PROXY_DB")]
    pub db: Option<String>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "XAPI_PROXY_PORT")]
    pub port: Option<u16>,

    /// Minimum log level: trace, debug, info, warn, or error
    #[arg(long, default_value = "info", env = "XAPI_PROXY_LOG_LEVEL")]
    pub log_level: String,

    /// Log output format: "text" for human-readable, "json" for structured
    #[arg(long, env = "XAPI_PROXY_LOG_FORMAT")]
    pub log_format: Option<String>,
}
