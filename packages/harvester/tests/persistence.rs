//! Ledger snapshots and the JSON file sink on a real filesystem.

use std::sync::Arc;
use std::time::Duration;

use harvester::scripted::{PageExtractor, ScriptedPage};
use harvester::testing::MockExtractor;
use harvester::{
    canonicalize, fingerprint, DiagramElement, DiagramPayload, HarvestConfig, JsonFileSink,
    LedgerSnapshot, ListingItem, ListingPayload, Orchestrator, Payload, ResourceCategory,
    Signal, SignalOutcome, SignalSource, SkipReason,
};

const LISTING: &str = "https://example.com/chain-info?chain=ai&title=Robotics";
const DIAGRAM: &str = "https://example.com/chain-detail?id=3";

fn listing() -> Payload {
    Payload::Listing(ListingPayload {
        title: Some("Robotics".to_string()),
        items: vec![
            ListingItem::new("Acme", Some("/product-details?id=1")),
            ListingItem::new("Globex", None),
        ],
        ..Default::default()
    })
}

fn diagram(content: &str) -> Payload {
    Payload::Diagram(DiagramPayload {
        elements: vec![DiagramElement::new(Some("https://cdn.example.com/1.svg"), content)],
        ..Default::default()
    })
}

fn config() -> HarvestConfig {
    HarvestConfig::default().with_settle_delay(Duration::ZERO)
}

#[tokio::test]
async fn file_sink_writes_one_document_per_resource() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonFileSink::new(dir.path()));
    let orchestrator = Orchestrator::new(config(), Arc::new(PageExtractor), sink.clone()).unwrap();

    let page = Arc::new(ScriptedPage::new("tab", LISTING));
    page.set_payload(LISTING, listing());
    let outcome = orchestrator
        .handle_signal(Signal::navigation(LISTING, page))
        .await;
    assert!(matches!(outcome, SignalOutcome::Collected { partial: true, .. }));

    let key = canonicalize(LISTING);
    let path = sink.path_for(ResourceCategory::ListingPage, &key);
    assert!(path.starts_with(dir.path().join("listing_page")));
    assert!(path.exists());

    let stored = sink.load(ResourceCategory::ListingPage, &key).await.unwrap();
    assert_eq!(stored.address, LISTING);
    assert_eq!(stored.record.key, key);
    assert_eq!(stored.record.fingerprint, fingerprint(&listing()));
    assert_eq!(stored.warnings, vec!["items[].detail_url".to_string()]);
    assert_eq!(stored.payload, listing());
}

#[tokio::test]
async fn recollection_overwrites_the_stored_document() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonFileSink::new(dir.path()));
    let orchestrator = Orchestrator::new(config(), Arc::new(PageExtractor), sink.clone()).unwrap();

    let page = Arc::new(ScriptedPage::new("tab", DIAGRAM));
    page.set_payload(DIAGRAM, diagram("<svg/>"));
    orchestrator
        .handle_signal(Signal::navigation(DIAGRAM, page.clone()))
        .await;
    page.set_payload(DIAGRAM, diagram("<svg><g/></svg>"));
    let outcome = orchestrator
        .handle_signal(Signal::new(SignalSource::RefreshTick, DIAGRAM, page))
        .await;
    assert!(outcome.is_collected());

    let key = canonicalize(DIAGRAM);
    let stored = sink.load(ResourceCategory::DiagramPage, &key).await.unwrap();
    assert!(stored.record.recollection);
    assert_eq!(stored.payload, diagram("<svg><g/></svg>"));

    let files: Vec<_> = std::fs::read_dir(dir.path().join("diagram_page"))
        .unwrap()
        .collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn snapshot_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("state").join("ledger.json");

    let first = Orchestrator::new(
        config(),
        Arc::new(MockExtractor::new()),
        Arc::new(JsonFileSink::new(dir.path().join("out"))),
    )
    .unwrap();
    let page = Arc::new(ScriptedPage::new("tab", LISTING));
    page.set_payload(LISTING, listing());
    first
        .handle_signal(Signal::navigation(LISTING, page.clone()))
        .await;
    first.snapshot().save(&snapshot_path).await.unwrap();

    let loaded = LedgerSnapshot::load_or_default(&snapshot_path).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.records[0].category, ResourceCategory::ListingPage);

    let extractor = Arc::new(MockExtractor::new());
    let second = Orchestrator::new(
        config(),
        extractor.clone(),
        Arc::new(JsonFileSink::new(dir.path().join("out"))),
    )
    .unwrap()
    .with_ledger(loaded);
    let outcome = second
        .handle_signal(Signal::navigation("https://example.com/chain-info?title=Robotics&chain=ai", page))
        .await;

    assert!(matches!(
        outcome,
        SignalOutcome::Skipped {
            reason: SkipReason::AlreadyCollected,
            ..
        }
    ));
    assert!(extractor.calls().is_empty());
}

#[tokio::test]
async fn missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = LedgerSnapshot::load_or_default(dir.path().join("nope.json"))
        .await
        .unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn corrupt_snapshot_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    std::fs::write(&path, b"{ not json").unwrap();

    let err = LedgerSnapshot::load(&path).await.unwrap_err();
    assert!(matches!(err, harvester::HarvestError::Json(_)));
}
