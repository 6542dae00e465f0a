use marknote_core::{
    AutosavePipeline, EditorBuffer, HistoryManager, ManualClock, NoteRepository, SaveStatus,
    SessionState, SqliteMetadataStore,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;

fn shared_session(quota_bytes: u64) -> Arc<Mutex<SessionState>> {
    let store = SqliteMetadataStore::open_in_memory(quota_bytes).unwrap();
    let repo = NoteRepository::load_with(
        Box::new(store),
        "notes",
        Box::new(ManualClock::starting_at(1_000)),
    );
    Arc::new(Mutex::new(SessionState::new(repo, HistoryManager::default())))
}

fn pipeline(session: &Arc<Mutex<SessionState>>) -> AutosavePipeline {
    AutosavePipeline::new(
        Arc::clone(session),
        Duration::from_millis(400),
        Duration::from_secs(2),
        Handle::current(),
    )
}

fn create_note(session: &Arc<Mutex<SessionState>>) -> String {
    session.lock().unwrap().create_note().id
}

fn title_of(session: &Arc<Mutex<SessionState>>, id: &str) -> String {
    session.lock().unwrap().note(id).unwrap().title.clone()
}

#[tokio::test(start_paused = true)]
async fn burst_of_edits_commits_once_after_quiet_period() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    for step in 0..5 {
        autosave.on_edit(EditorBuffer::new(id.clone(), format!("draft {step}"), "body"));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(title_of(&session, &id), "Untitled");
    assert_eq!(autosave.status(), SaveStatus::Idle);
    assert!(autosave.is_pending());

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(title_of(&session, &id), "draft 4");
    assert_eq!(autosave.status(), SaveStatus::Saved);
    assert_eq!(session.lock().unwrap().history().undo_depth(&id), 1);
}

#[tokio::test(start_paused = true)]
async fn saved_status_reverts_to_idle_after_display_period() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    autosave.on_edit(EditorBuffer::new(id.clone(), "one", ""));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(autosave.status(), SaveStatus::Saved);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert_eq!(autosave.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn later_commit_keeps_saved_visible_for_its_own_period() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    // First commit at t=400, second at t=1400.
    autosave.on_edit(EditorBuffer::new(id.clone(), "one", ""));
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    autosave.on_edit(EditorBuffer::new(id.clone(), "two", ""));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(autosave.status(), SaveStatus::Saved);

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    assert_eq!(autosave.status(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn flush_commits_immediately_and_cancel_discards() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    autosave.on_edit(EditorBuffer::new(id.clone(), "flushed", ""));
    assert!(autosave.flush());
    assert!(!autosave.is_pending());
    assert_eq!(title_of(&session, &id), "flushed");
    assert_eq!(autosave.status(), SaveStatus::Saved);

    autosave.on_edit(EditorBuffer::new(id.clone(), "discarded", ""));
    autosave.cancel();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(title_of(&session, &id), "flushed");
    assert!(!autosave.flush());
}

#[tokio::test(start_paused = true)]
async fn subscribers_observe_status_changes() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);
    let mut status = autosave.subscribe();
    assert_eq!(*status.borrow_and_update(), SaveStatus::Idle);

    autosave.on_edit(EditorBuffer::new(id.clone(), "watched", ""));
    status.changed().await.unwrap();
    assert_ne!(*status.borrow_and_update(), SaveStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn quota_failure_surfaces_as_failed_status_and_notice() {
    let session = shared_session(400);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    autosave.on_edit(EditorBuffer::new(id.clone(), "big", "x".repeat(2_000)));
    assert!(autosave.flush());
    assert_eq!(
        autosave.status(),
        SaveStatus::Failed {
            quota_exceeded: true
        }
    );

    let mut state = session.lock().unwrap();
    assert_eq!(state.note(&id).unwrap().title, "big");
    let notices = state.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].kind, marknote_core::NoticeKind::QuotaExceeded);
}

#[tokio::test(start_paused = true)]
async fn edit_for_deleted_note_commits_nothing() {
    let session = shared_session(1 << 20);
    let id = create_note(&session);
    let mut autosave = pipeline(&session);

    autosave.on_edit(EditorBuffer::new(id.clone(), "orphan", ""));
    session.lock().unwrap().delete_note(&id);
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(autosave.status(), SaveStatus::Idle);
    assert!(session.lock().unwrap().notes().is_empty());
}
