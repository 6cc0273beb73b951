//! xAPI LRS Auth Proxy binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use xapi_lrs_auth_proxy::{
    cli::Cli,
    config::Config,
    proxy::AuthProxy,
    setup_tracing,
    tenant::{DynamicTenantStore, PgTenantBackend, SingleTenantStore, TenantStore},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    run_server(cli).await
}

/// Apply CLI overrides to a loaded configuration.
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = cli.port {
        config.server.port = port;
    }
}

/// Run the proxy server.
async fn run_server(cli: Cli) -> ExitCode {
    let config = match Config::load(Some(&cli.config)) {
        Ok(mut config) => {
            apply_cli_overrides(&mut config, &cli);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        multi_tenant = cli.multi_tenant,
        "Starting xAPI LRS auth proxy"
    );

    let tenants: Arc<dyn TenantStore> = if cli.multi_tenant {
        let Some(ref conn_str) = cli.db else {
            error!("--db is required in multi-tenant mode");
            return ExitCode::FAILURE;
        };

        match PgTenantBackend::connect(conn_str).await {
            Ok(backend) => Arc::new(DynamicTenantStore::new(Arc::new(backend))),
            Err(e) => {
                error!("Failed to connect to tenant database: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match SingleTenantStore::new(&config) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Invalid single-tenant configuration: {e}");
                return ExitCode::FAILURE;
            }
        }
    };

    if let Err(e) = AuthProxy::new(config, tenants).run().await {
        error!("Server error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cli(port: Option<u16>) -> Cli {
        Cli {
            config: "config.yaml".into(),
            multi_tenant: false,
            db: None,
            port,
            log_level: "info".to_string(),
            log_format: None,
        }
    }

    #[test]
    fn cli_port_overrides_config() {
        let mut config = Config::default();
        apply_cli_overrides(&mut config, &make_cli(Some(9999)));
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn no_override_preserves_config_port() {
        let mut config = Config::default();
        config.server.port = 8081;
        apply_cli_overrides(&mut config, &make_cli(None));
        assert_eq!(config.server.port, 8081);
    }
}
