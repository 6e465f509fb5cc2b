// Integration test: OS watcher → throttle → suppression → hub.
//
// 1. Start a real watcher and pipeline over a temp directory.
// 2. Edit a file behind the server's back → one notification with the content.
// 3. Save through the server's own store → no notification.
// 4. Folder mode → notifications carry the relative file name.

use std::sync::Arc;
use std::time::Duration;

use quire_common::protocol::ws::ServerMessage;
use quire_daemon::documents::Documents;
use quire_daemon::hub::{Frame, NotificationHub};
use quire_daemon::watcher::pipeline::{run_pipeline, PipelineConfig, StoreResolver};
use quire_daemon::watcher::throttle::ThrottleConfig;
use quire_daemon::watcher::FileWatcher;
use quire_daemon::workspace::Workspace;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;

const SUPPRESSION_WINDOW: Duration = Duration::from_millis(500);

struct Harness {
    _watcher: FileWatcher,
    hub: Arc<NotificationHub>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl Harness {
    fn start(documents: &Documents) -> Self {
        let (watcher, raw_rx) =
            FileWatcher::start(documents.watch_target()).expect("watcher should start");
        let hub = Arc::new(NotificationHub::new());
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let resolver: Arc<dyn StoreResolver> = Arc::new(documents.clone());
        let config = PipelineConfig {
            throttle: ThrottleConfig::with_millis(50),
            suppression_window: SUPPRESSION_WINDOW,
        };
        let task = tokio::spawn(run_pipeline(raw_rx, resolver, Arc::clone(&hub), config, shutdown_rx));
        Self { _watcher: watcher, hub, shutdown, task }
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        timeout(Duration::from_secs(5), self.task)
            .await
            .expect("pipeline should stop")
            .expect("pipeline task should not panic");
    }
}

async fn next_message(rx: &mut mpsc::Receiver<Frame>) -> ServerMessage {
    let frame = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("notification should arrive")
        .expect("session should stay registered");
    serde_json::from_str(&frame).expect("frame should decode")
}

/// The last notification before the channel goes quiet.
async fn settle(rx: &mut mpsc::Receiver<Frame>) -> ServerMessage {
    let mut last = next_message(rx).await;
    while let Ok(Some(frame)) = timeout(Duration::from_millis(600), rx.recv()).await {
        last = serde_json::from_str(&frame).expect("frame should decode");
    }
    last
}

async fn assert_quiet(rx: &mut mpsc::Receiver<Frame>, wait: Duration) {
    if let Ok(Some(frame)) = timeout(wait, rx.recv()).await {
        panic!("unexpected notification: {frame}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn external_edit_reaches_live_session() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let path = tmp.path().join("draft.md");
    std::fs::write(&path, "# v0").expect("seed should be written");
    let documents = Documents::single(&path).expect("document should open");

    let harness = Harness::start(&documents);
    let (_id, mut rx) = harness.hub.register().await;

    std::fs::write(&path, "# edited elsewhere").expect("external write should succeed");

    let ServerMessage::FileChanged { file, content, .. } = settle(&mut rx).await;
    assert_eq!(file, None);
    assert_eq!(content, "# edited elsewhere");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn own_save_is_not_echoed_but_later_edit_is() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let path = tmp.path().join("draft.md");
    std::fs::write(&path, "# v0").expect("seed should be written");
    let documents = Documents::single(&path).expect("document should open");

    let harness = Harness::start(&documents);
    let (_id, mut rx) = harness.hub.register().await;

    let store = documents.lookup(None).expect("store should resolve");
    tokio::task::spawn_blocking(move || store.write("# v1"))
        .await
        .expect("blocking write should join")
        .expect("write should succeed");
    assert_quiet(&mut rx, Duration::from_millis(1000)).await;

    std::fs::write(&path, "# v2 from another editor").expect("external write should succeed");
    let ServerMessage::FileChanged { content, .. } = settle(&mut rx).await;
    assert_eq!(content, "# v2 from another editor");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn burst_of_writes_settles_on_latest_content() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    let path = tmp.path().join("draft.md");
    std::fs::write(&path, "# v0").expect("seed should be written");
    let documents = Documents::single(&path).expect("document should open");

    let harness = Harness::start(&documents);
    let (_id, mut rx) = harness.hub.register().await;

    for version in 1..=5 {
        std::fs::write(&path, format!("# v{version}")).expect("external write should succeed");
    }

    let ServerMessage::FileChanged { content, .. } = settle(&mut rx).await;
    assert_eq!(content, "# v5");

    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn folder_mode_names_the_changed_file() {
    let tmp = tempfile::tempdir().expect("tempdir should be created");
    std::fs::create_dir(tmp.path().join("sub")).expect("subdir should be created");
    std::fs::write(tmp.path().join("a.md"), "a").expect("a.md written");
    std::fs::write(tmp.path().join("sub/b.md"), "b").expect("b.md written");
    let documents = Documents::folder(Workspace::open(tmp.path()).expect("workspace opens"));

    let harness = Harness::start(&documents);
    let (_id, mut rx) = harness.hub.register().await;

    std::fs::write(tmp.path().join("notes.txt"), "ignored").expect("txt written");
    std::fs::write(tmp.path().join("sub/b.md"), "# b changed").expect("b.md rewritten");

    let ServerMessage::FileChanged { file, content, .. } = settle(&mut rx).await;
    assert_eq!(file.as_deref(), Some("sub/b.md"));
    assert_eq!(content, "# b changed");

    harness.stop().await;
}
