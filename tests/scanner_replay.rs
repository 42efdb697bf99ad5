use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use zenfeed::behavior::ManualClock;
use zenfeed::classify::{Category, Classifier, MockClassifier};
use zenfeed::config::Config;
use zenfeed::feed::RawFeedItem;
use zenfeed::pipeline::{Action, Orchestrator, RecordingSink, ReplayFeedSource, Scanner};
use zenfeed::store::{ClientStore, MemoryStore, StoreKey};

const NOW: i64 = 1_700_000_000_000;

fn active_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.set(StoreKey::LearningComplete, json!(true)).unwrap();
    store
        .set(StoreKey::LearningCompletedAt, json!(NOW - 60_000))
        .unwrap();
    store
}

fn scanner(orchestrator: &Arc<Orchestrator>) -> Scanner {
    Scanner::new(
        Arc::clone(orchestrator),
        Duration::from_millis(5),
        Duration::from_millis(50),
    )
}

#[tokio::test]
async fn test_replay_renders_each_intervention_once() {
    let orchestrator = Arc::new(
        Orchestrator::new(
            &Config::default(),
            active_store(),
            Arc::new(ManualClock::new(NOW)),
            None,
            None,
        )
        .unwrap(),
    );

    let meme = RawFeedItem::titled("Try Not To Laugh - Funny Memes Compilation")
        .with_duration_text("0:45")
        .with_source_url("https://www.youtube.com/shorts/meme1");
    let tutorial = RawFeedItem::titled("Python Tutorial for Beginners")
        .with_duration_text("30:00")
        .with_source_url("https://www.youtube.com/watch?v=py101");

    let source = ReplayFeedSource::from_frames(vec![
        vec![meme.clone(), tutorial.clone()],
        vec![meme.clone(), tutorial, RawFeedItem::titled("")],
    ]);
    let sink = RecordingSink::new();
    let (_tx, rx) = watch::channel(false);

    let report = scanner(&orchestrator).run(source, sink.clone(), rx).await;

    assert_eq!(report.frames, 2);
    assert_eq!(report.items, 5);
    assert_eq!(report.rendered, 1);

    let decisions = sink.decisions();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].action, Action::Substitute);

    let stats = orchestrator.stats();
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_replay_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"[{{"title": "Crazy Prank Gone Wrong", "durationText": "0:20", "url": "https://x/1"}}]"#
    )
    .unwrap();
    writeln!(file).unwrap();
    writeln!(
        file,
        r#"[{{"title": "Lecture 1: Linear Algebra", "durationSeconds": 3000, "url": "https://x/2"}}]"#
    )
    .unwrap();

    let source = ReplayFeedSource::open(file.path()).unwrap();
    assert_eq!(source.remaining(), 2);

    let orchestrator = Arc::new(
        Orchestrator::new(
            &Config::default(),
            active_store(),
            Arc::new(ManualClock::new(NOW)),
            None,
            None,
        )
        .unwrap(),
    );
    let sink = RecordingSink::new();
    let (_tx, rx) = watch::channel(false);

    let report = scanner(&orchestrator).run(source, sink.clone(), rx).await;
    assert_eq!(report.frames, 2);
    assert_eq!(sink.decisions().len(), 1);
    assert_eq!(orchestrator.history().len(), 2);
}

#[tokio::test]
async fn test_refinement_lands_on_a_later_frame() {
    let refiner = Arc::new(MockClassifier::answering(Category::Addictive));
    let orchestrator = Arc::new(
        Orchestrator::new(
            &Config::default(),
            active_store(),
            Arc::new(ManualClock::new(NOW)),
            Some(refiner.clone() as Arc<dyn Classifier>),
            None,
        )
        .unwrap(),
    );

    // no keyword hits, so the heuristic verdict is provisional
    let item = RawFeedItem::titled("Weekend at the lake")
        .with_duration_seconds(600.0)
        .with_source_url("https://www.youtube.com/watch?v=lake");
    let frames = vec![vec![item.clone()]; 4];

    let sink = RecordingSink::new();
    let (_tx, rx) = watch::channel(false);
    scanner(&orchestrator)
        .run(ReplayFeedSource::from_frames(frames), sink.clone(), rx)
        .await;

    assert_eq!(refiner.calls(), 1);
    let decisions = sink.decisions();
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0].action, Action::Substitute);
}

#[tokio::test]
async fn test_overturned_intervention_is_withdrawn() {
    let refiner = Arc::new(
        MockClassifier::answering(Category::Educational).with_delay(Duration::from_millis(60)),
    );
    let orchestrator = Arc::new(
        Orchestrator::new(
            &Config::default(),
            active_store(),
            Arc::new(ManualClock::new(NOW)),
            Some(refiner.clone() as Arc<dyn Classifier>),
            None,
        )
        .unwrap(),
    );

    // ambiguous between addictive and entertainment, provisionally high risk
    let item = RawFeedItem::titled("Funny vlog omg")
        .with_duration_seconds(600.0)
        .with_source_url("https://www.youtube.com/watch?v=vlog");
    let frames = vec![vec![item.clone()]; 30];

    let sink = RecordingSink::new();
    let (_tx, rx) = watch::channel(false);
    let scanner = Scanner::new(
        Arc::clone(&orchestrator),
        Duration::from_millis(10),
        Duration::from_secs(60),
    );
    let report = scanner
        .run(ReplayFeedSource::from_frames(frames), sink.clone(), rx)
        .await;

    assert_eq!(refiner.calls(), 1);
    let actions: Vec<Action> = sink.decisions().iter().map(|d| d.action).collect();
    assert_eq!(actions, vec![Action::Substitute, Action::None]);
    assert_eq!(report.rendered, 2);

    let stats = orchestrator.stats();
    assert_eq!(stats.alternatives_shown, 1);
    assert_eq!(stats.interventions, 1);
}

#[tokio::test]
async fn test_shutdown_stops_scanner() {
    let orchestrator = Arc::new(
        Orchestrator::new(
            &Config::default(),
            active_store(),
            Arc::new(ManualClock::new(NOW)),
            None,
            None,
        )
        .unwrap(),
    );

    let frames = vec![vec![RawFeedItem::titled("Study session")]; 10_000];
    let (tx, rx) = watch::channel(false);
    let scanner = Scanner::new(
        Arc::clone(&orchestrator),
        Duration::from_millis(20),
        Duration::from_secs(60),
    );

    let handle = tokio::spawn(async move {
        scanner
            .run(ReplayFeedSource::from_frames(frames), RecordingSink::new(), rx)
            .await
    });

    tokio::time::sleep(Duration::from_millis(70)).await;
    tx.send(true).unwrap();

    let report = handle.await.unwrap();
    assert!(report.frames >= 1);
    assert!(report.frames < 10_000);
}
