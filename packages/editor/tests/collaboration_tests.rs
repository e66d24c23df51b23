//! Two editors kept in step through `RemoteUpdate`s

mod common;

use common::*;
use redline_document::WrapperKind;
use redline_editor::{Command, Editor, EditorMode, RemoteUpdate, SuggestEditsContext};
use std::rc::Rc;

/// A peer on site 2 starting from the same document as `editor`
fn peer(editor: &Editor, author: &str, mode: EditorMode) -> (Editor, Rc<SuggestEditsContext>) {
    editor_with(editor.document().fork(2), config(author, mode))
}

fn sync(from: &mut Editor, to: &mut Editor) -> usize {
    let updates = from.take_outgoing();
    for update in &updates {
        to.apply_remote(update).unwrap();
    }
    updates.len()
}

#[test]
fn test_remote_suggestion_is_not_rewrapped() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Suggesting);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 5);
    type_text(&mut alice, "!");
    assert_eq!(sync(&mut alice, &mut bob), 1);

    assert_eq!(bob.document().plain_text(), "hello!");
    assert_eq!(
        wrappers(&bob),
        vec![(WrapperKind::InsertionInline, "alice".to_string(), "!".to_string())]
    );
    assert_eq!(suggestion_ids(&bob), suggestion_ids(&alice));
    // Remote edits never land in the local history or outbox
    assert!(!bob.can_undo());
    assert!(bob.take_outgoing().is_empty());
}

#[test]
fn test_remote_plain_edit_stays_plain_for_suggesting_peer() {
    let (mut alice, _) = editing(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Suggesting);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 0);
    type_text(&mut alice, ">");
    sync(&mut alice, &mut bob);

    assert_eq!(bob.document().plain_text(), ">hello");
    assert!(bob.document().wrappers().is_empty());
}

#[test]
fn test_peers_converge_on_resolution() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Editing);

    let text = leaf(&alice, 0);
    select(&mut alice, text, 1, 4);
    type_text(&mut alice, "X");
    sync(&mut alice, &mut bob);
    assert_eq!(bob.document().plain_text(), "hellXo");

    let id = suggestion_ids(&bob).remove(0);
    assert!(bob.dispatch(Command::accept(id)));
    assert_eq!(sync(&mut bob, &mut alice), 1);

    assert_eq!(alice.document().plain_text(), "hXo");
    assert_eq!(bob.document().plain_text(), "hXo");
    assert!(alice.document().wrappers().is_empty());
    alice.document().check_integrity().unwrap();
}

#[test]
fn test_remote_thread_events_reach_peer_subscribers() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, bob_ctx) = peer(&alice, "bob", EditorMode::Suggesting);
    let (events, _subscription) = record_threads(&bob_ctx);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 5);
    type_text(&mut alice, "!");
    sync(&mut alice, &mut bob);

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].thread_id(), suggestion_ids(&alice)[0]);
}

#[test]
fn test_own_echo_is_ignored() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let text = leaf(&alice, 0);
    caret(&mut alice, text, 5);
    type_text(&mut alice, "!");

    let updates = alice.take_outgoing();
    let version = alice.version();
    for update in &updates {
        alice.apply_remote(update).unwrap();
    }
    assert_eq!(alice.version(), version);
    assert_eq!(alice.document().plain_text(), "hello!");
}

#[test]
fn test_update_round_trips_through_json() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Suggesting);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 2);
    assert!(alice.dispatch(Command::DeleteForward));

    for update in alice.take_outgoing() {
        let json = update.to_json().unwrap();
        let decoded = RemoteUpdate::from_json(&json).unwrap();
        assert_eq!(decoded, update);
        bob.apply_remote(&decoded).unwrap();
    }
    assert_eq!(
        wrappers(&bob),
        vec![(WrapperKind::DeletionInline, "alice".to_string(), "l".to_string())]
    );
}

#[test]
fn test_failed_remote_update_rolls_back() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Suggesting);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 5);
    type_text(&mut alice, "!");
    let mut update = alice.take_outgoing().remove(0);
    // The second copy of the insert collides on its keys
    update.mutations.extend(update.mutations.clone());

    assert!(bob.apply_remote(&update).is_err());
    assert_eq!(bob.document().plain_text(), "hello");
    assert_eq!(bob.version(), 0);
}

#[test]
fn test_undo_conflicting_with_remote_change_fails_cleanly() {
    let (mut alice, _) = suggesting(&["hello"], "alice");
    let (mut bob, _) = peer(&alice, "bob", EditorMode::Editing);

    let text = leaf(&alice, 0);
    caret(&mut alice, text, 5);
    type_text(&mut alice, "!");
    sync(&mut alice, &mut bob);

    let id = suggestion_ids(&bob).remove(0);
    assert!(bob.dispatch(Command::accept(id)));
    sync(&mut bob, &mut alice);
    assert!(alice.document().wrappers().is_empty());

    let version = alice.version();
    assert!(!alice.undo());
    assert_eq!(alice.document().plain_text(), "hello!");
    assert_eq!(alice.version(), version);
    assert!(alice.can_undo());
}
