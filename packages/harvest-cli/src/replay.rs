//! `harvest replay`: drive a session from a recorded script.

use anyhow::{bail, Context, Result};
use harvester::scripted::{PageExtractor, ScriptedPage};
use harvester::{
    FetchingExtractor, HarvestSession, JsonFileSink, LedgerSnapshot, Orchestrator,
    SessionSummary, Signal,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::script::{Script, Step};

/// Options from the command line.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Ignore any existing ledger snapshot.
    pub fresh: bool,
    /// Extra time after the last step before shutting down.
    pub linger: Duration,
}

/// Replay `script_path` and return the session summary. The ledger snapshot
/// is saved to `config.ledger_path`.
pub async fn run(config: &Config, script_path: &Path, options: &ReplayOptions) -> Result<SessionSummary> {
    let script = Script::load(script_path)?;
    let harvest_config = config.harvest_config()?;
    let probe = harvest_config.watchers.attribute_probe.clone();

    info!(
        script = %script_path.display(),
        steps = script.steps.len(),
        scripted_ms = script.duration_ms(),
        "replaying"
    );

    let sink = Arc::new(JsonFileSink::new(&config.output_dir));
    let extractor = Arc::new(FetchingExtractor::new(PageExtractor));
    let mut orchestrator = Orchestrator::new(harvest_config, extractor, sink)
        .context("Failed to build orchestrator")?;
    if !options.fresh {
        let snapshot = LedgerSnapshot::load_or_default(&config.ledger_path)
            .await
            .with_context(|| format!("Failed to load ledger {}", config.ledger_path.display()))?;
        if !snapshot.is_empty() {
            orchestrator = orchestrator.with_ledger(snapshot);
        }
    }

    let mut session = HarvestSession::start(orchestrator);
    let mut pages: HashMap<String, Arc<ScriptedPage>> = HashMap::new();

    for (index, step) in script.steps.into_iter().enumerate() {
        debug!(step = index, ?step, "step");
        match step {
            Step::Open { page, address } => {
                if pages.contains_key(&page) {
                    bail!("step {index}: page {page} is already open");
                }
                let scripted = Arc::new(ScriptedPage::new(page.clone(), address));
                session
                    .attach_page(scripted.clone())
                    .await
                    .with_context(|| format!("step {index}: failed to open page {page}"))?;
                pages.insert(page, scripted);
            }
            Step::Render {
                page,
                address,
                payload,
            } => lookup(&pages, &page, index)?.set_payload(&address, payload),
            Step::Navigate { page, address } => {
                let scripted = lookup(&pages, &page, index)?;
                scripted.set_address(address.clone());
                session
                    .notify(Signal::navigation(address, scripted.clone()))
                    .await?;
            }
            Step::RouteChange { page, address } => {
                lookup(&pages, &page, index)?.set_address(address)
            }
            Step::Probe { page, value } => {
                let Some(probe) = &probe else {
                    bail!("step {index}: attribute probe is disabled in this configuration");
                };
                lookup(&pages, &page, index)?.set_probe(probe.clone(), value);
            }
            Step::Resource { page, url, body } => {
                lookup(&pages, &page, index)?.set_resource(url, body)
            }
            Step::Input { page, kind } => lookup(&pages, &page, index)?.push_input(kind),
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
            Step::Close { page } => {
                if pages.remove(&page).is_none() || !session.detach_page(&page) {
                    bail!("step {index}: page {page} is not open");
                }
            }
        }
    }

    if !options.linger.is_zero() {
        tokio::time::sleep(options.linger).await;
    }

    let summary = session.shutdown().await;
    summary
        .ledger
        .save(&config.ledger_path)
        .await
        .with_context(|| format!("Failed to save ledger {}", config.ledger_path.display()))?;
    info!(path = %config.ledger_path.display(), records = summary.ledger.len(), "ledger saved");

    Ok(summary)
}

fn lookup<'a>(
    pages: &'a HashMap<String, Arc<ScriptedPage>>,
    page: &str,
    index: usize,
) -> Result<&'a Arc<ScriptedPage>> {
    pages
        .get(page)
        .with_context(|| format!("step {index}: page {page} is not open"))
}
