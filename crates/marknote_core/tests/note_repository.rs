use marknote_core::{extract_tags, ManualClock, Note, NotePatch, NoteRepository, SqliteMetadataStore};

fn repo_at(start_ms: i64) -> (NoteRepository, ManualClock) {
    let clock = ManualClock::starting_at(start_ms);
    let store = SqliteMetadataStore::open_in_memory(1 << 20).unwrap();
    let repo = NoteRepository::load_with(Box::new(store), "notes", Box::new(clock.clone()));
    (repo, clock)
}

fn assert_sorted_by_recency(notes: &[Note]) {
    for pair in notes.windows(2) {
        assert!(
            pair[0].updated_at >= pair[1].updated_at,
            "{} ({}) listed before {} ({})",
            pair[0].id,
            pair[0].updated_at,
            pair[1].id,
            pair[1].updated_at
        );
    }
}

#[test]
fn tags_follow_documented_examples() {
    assert_eq!(extract_tags("hello #Work and #ideas_2 done"), vec!["work", "ideas_2"]);
    assert_eq!(extract_tags("todo #work\n#work again"), vec!["work"]);
}

#[test]
fn created_notes_list_newest_first() {
    let (mut repo, _clock) = repo_at(5_000);
    let a = repo.create();
    let b = repo.create();
    let c = repo.create();

    assert!(a.updated_at < b.updated_at);
    assert!(b.updated_at < c.updated_at);
    assert_eq!(repo.ids(), vec![c.id, b.id, a.id]);
    assert_eq!(a.title, "Untitled");
    assert!(a.content.is_empty());
}

#[test]
fn content_update_derives_deduplicated_tags() {
    let (mut repo, _clock) = repo_at(5_000);
    let note = repo.create();

    assert!(repo.update(&note.id, NotePatch::content("todo #work\n#work again")));
    assert_eq!(repo.find_by_id(&note.id).unwrap().tags, vec!["work"]);
}

#[test]
fn title_patch_never_touches_tags() {
    let (mut repo, _clock) = repo_at(5_000);
    let note = repo.create();
    repo.update(&note.id, NotePatch::content("#keep me"));

    repo.update(&note.id, NotePatch::title("x"));
    let stored = repo.find_by_id(&note.id).unwrap();
    assert_eq!(stored.title, "x");
    assert_eq!(stored.tags, vec!["keep"]);
}

#[test]
fn content_patch_replaces_previous_tags() {
    let (mut repo, _clock) = repo_at(5_000);
    let note = repo.create();
    repo.update(&note.id, NotePatch::content("#old #older"));

    repo.update(&note.id, NotePatch::content("#a #b"));
    assert_eq!(repo.find_by_id(&note.id).unwrap().tags, vec!["a", "b"]);
}

#[test]
fn patch_leaves_unmentioned_fields_alone() {
    let (mut repo, _clock) = repo_at(5_000);
    let note = repo.create();
    repo.update(
        &note.id,
        NotePatch {
            starred: Some(true),
            cover_position: Some("top".to_string()),
            ..NotePatch::default()
        },
    );

    repo.update(&note.id, NotePatch::editor("Title", "Body"));
    let stored = repo.find_by_id(&note.id).unwrap();
    assert!(stored.starred);
    assert_eq!(stored.cover_position(), "top");
    assert_eq!(stored.created_at, note.created_at);
    assert!(stored.updated_at > note.updated_at);
}

#[test]
fn collection_stays_sorted_through_mixed_mutations() {
    let (mut repo, clock) = repo_at(10_000);
    let ids: Vec<String> = (0..6).map(|_| repo.create().id).collect();
    assert_sorted_by_recency(repo.notes());

    clock.advance(50);
    repo.update(&ids[0], NotePatch::title("bumped"));
    assert_sorted_by_recency(repo.notes());
    assert_eq!(repo.notes()[0].id, ids[0]);

    // A clock that jumps backwards must not break ordering.
    clock.set(1);
    repo.update(&ids[3], NotePatch::content("#late"));
    assert_sorted_by_recency(repo.notes());
    assert_eq!(repo.notes()[0].id, ids[3]);

    assert!(repo.delete(&ids[1]));
    assert_sorted_by_recency(repo.notes());
    assert_eq!(repo.len(), 5);
}

#[test]
fn missing_ids_are_reported_not_raised() {
    let (mut repo, _clock) = repo_at(5_000);
    assert!(repo.find_by_id("nope").is_none());
    assert!(!repo.update("nope", NotePatch::title("x")));
    assert!(!repo.delete("nope"));
    assert!(repo.is_empty());
}

#[test]
fn generated_ids_are_unique_for_same_millisecond() {
    let (mut repo, _clock) = repo_at(5_000);
    let first = repo.create();
    let second = repo.create();
    assert_ne!(first.id, second.id);
}
