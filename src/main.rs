mod args;

use std::time::Duration;

use args::{Cli, Commands, EndpointArgs};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use graph_garden::health::{Endpoint, HealthChecker, HttpVersionProbe};
use graph_garden::process::SystemProcessTable;
use graph_garden::supervisor::{self, StartOptions};
use graph_garden::{env, install, versions};

impl EndpointArgs {
    fn into_endpoint(self) -> Endpoint {
        Endpoint {
            connection_uri: self.connection_uri.unwrap_or_else(env::connection_uri),
            database: self.database,
            username: self.username,
            password: self.password,
        }
    }
}

fn checker() -> HealthChecker<SystemProcessTable, HttpVersionProbe> {
    HealthChecker::new(SystemProcessTable, HttpVersionProbe::new())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ListVersions { clear_cache } => {
            for version in versions::list_versions(clear_cache).await? {
                println!("{}", version);
            }
        }

        Commands::Install { path, version } => {
            let path = path.unwrap_or_else(env::install_path);
            install::install(&path, version).await?;
            println!("Installed to {}", path.display());
        }

        Commands::Start {
            exe_path,
            data_path,
            endpoint,
            quiet,
            timeout_secs,
        } => {
            let options = StartOptions {
                quiet,
                health_timeout: timeout_secs.map(Duration::from_secs),
            };
            supervisor::start(
                &exe_path.unwrap_or_else(env::install_path),
                &data_path.unwrap_or_else(env::data_path),
                &endpoint.into_endpoint(),
                &checker(),
                &options,
            )
            .await?;
            println!("ArangoDB is running");
        }

        Commands::Stop => {
            supervisor::stop(&SystemProcessTable)?;
        }

        Commands::IsRunning(endpoint) => {
            let running = checker().is_running(&endpoint.into_endpoint()).await;
            println!("{}", if running { "running" } else { "not running" });
            std::process::exit(if running { 0 } else { 1 });
        }
    }

    Ok(())
}
