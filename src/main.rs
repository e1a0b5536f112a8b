#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use clap::Parser;
use prometheus::Registry;
use script_exporter::cli::Cli;
use script_exporter::collector::ScriptCollector;
use script_exporter::config::ExporterConfig;
use script_exporter::observability::init_tracing;
use script_exporter::script::Script;
use script_exporter::server::ExporterServer;
use script_exporter::store::RedisScriptExecutor;
use tracing::info;

fn build_registry(config: &ExporterConfig) -> Result<Registry, Box<dyn std::error::Error>> {
    let scripts = config
        .scripts
        .iter()
        .map(Script::load)
        .collect::<Result<Vec<_>, _>>()?;
    for script in &scripts {
        info!("Loaded script {}", script.filename());
    }

    let executor = RedisScriptExecutor::open(
        &config.redis.normalized_url(),
        config.redis.connection_timeout(),
    )?;
    let collector =
        ScriptCollector::new(executor, scripts, config.classifier(), &config.namespace)?;

    let registry = Registry::new();
    registry.register(Box::new(collector))?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    init_tracing(&config.log).map_err(|e| e.to_string())?;

    let registry = build_registry(&config)?;

    info!(
        scripts = config.scripts.len(),
        namespace = %config.namespace,
        "Starting redis-script-exporter"
    );

    let server = ExporterServer::new(config.listen_addr, config.metrics_path, registry);
    server.run().await?;

    Ok(())
}
