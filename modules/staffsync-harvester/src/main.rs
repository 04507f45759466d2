use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use staffsync_common::{Config, PropertyTable};
use staffsync_graph::{TalkPageCache, WikiClient, WikibaseStore};
use staffsync_harvester::fetcher::HttpProfileFetcher;
use staffsync_harvester::orchestrator::{SyncDeps, SyncOrchestrator};
use staffsync_harvester::resolver::LookupResolver;

#[derive(Parser)]
#[command(name = "staffsync-harvester", about = "Synchronize staff profiles into the knowledge graph")]
struct Cli {
    /// Entity ids to synchronize
    ids: Vec<String>,

    /// File with one entity id per line
    #[arg(long)]
    ids_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("staffsync=info".parse()?))
        .init();

    info!("Staffsync harvester starting...");

    let cli = Cli::parse();
    let mut entity_ids = cli.ids;
    if let Some(path) = &cli.ids_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading ids file {}", path.display()))?;
        entity_ids.extend(
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }
    if entity_ids.is_empty() {
        bail!("no entity ids given; pass ids as arguments or via --ids-file");
    }

    let config = Config::from_env();
    config.log_redacted();

    let props = match &config.property_table_path {
        Some(path) => PropertyTable::from_yaml_file(path)?,
        None => PropertyTable::default(),
    };
    let resolver = match &config.lookup_table_path {
        Some(path) => LookupResolver::from_yaml_file(path)?,
        None => bail!("STAFFSYNC_LOOKUP_TABLE is required to resolve organizations and titles"),
    };

    let client = WikiClient::connect(
        &config.api_url,
        &config.bot_username,
        &config.bot_password,
        std::time::Duration::from_secs(config.http_timeout_secs),
        &config.user_agent,
    )
    .await?;

    let deps = SyncDeps {
        store: Arc::new(WikibaseStore::new(client.clone())),
        fetcher: Arc::new(HttpProfileFetcher::new(
            &config.profile_base_url,
            config.http_timeout_secs,
            &config.user_agent,
        )?),
        resolver: Arc::new(resolver),
        cache: Arc::new(TalkPageCache::new(client)),
        props: Arc::new(props),
    };

    let orchestrator = SyncOrchestrator::new(deps);
    let stats = orchestrator.run(&entity_ids, config.max_concurrent).await;

    info!(
        processed = stats.processed,
        written = stats.written,
        unchanged = stats.unchanged,
        failed = stats.failed,
        "Harvest complete"
    );
    if stats.failed > 0 {
        bail!("{} of {} entities failed", stats.failed, stats.processed);
    }
    Ok(())
}
