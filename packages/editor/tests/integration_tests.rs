//! Integration tests for the editor crate

mod common;

use common::*;
use redline_document::{Document, WrapperKind};
use redline_editor::{
    Command, Editor, EditorMode, SuggestEditsConfig, ThreadEvent, DEFAULT_CONFIG_NAME,
};

#[test]
fn test_suggestion_lifecycle() {
    let (mut editor, ctx) = suggesting(&["hello"], "u1");
    let (events, _subscription) = record_threads(&ctx);

    let text = leaf(&editor, 0);
    caret(&mut editor, text, 5);
    type_text(&mut editor, " world");

    assert_eq!(editor.document().plain_text(), "hello world");
    assert_eq!(
        wrappers(&editor),
        vec![(WrapperKind::InsertionInline, "u1".to_string(), " world".to_string())]
    );

    let ids = suggestion_ids(&editor);
    assert_eq!(ids.len(), 1);
    assert!(editor.dispatch(Command::accept(ids[0].clone())));

    assert_eq!(editor.document().plain_text(), "hello world");
    assert!(editor.document().wrappers().is_empty());
    editor.document().check_integrity().unwrap();

    let events = events.borrow();
    let inserts = events
        .iter()
        .filter(|e| matches!(e, ThreadEvent::Insert { .. }))
        .count();
    let hides = events
        .iter()
        .filter(|e| matches!(e, ThreadEvent::Hide { .. }))
        .count();
    assert_eq!(inserts, 1);
    assert_eq!(hides, 1);
    assert_eq!(events.last(), Some(&ThreadEvent::Hide { thread_id: ids[0].clone() }));
}

#[test]
fn test_editing_mode_edits_directly() {
    let (mut editor, ctx) = editing(&["hello"], "u1");
    assert!(!ctx.is_suggesting());

    let text = leaf(&editor, 0);
    caret(&mut editor, text, 5);
    type_text(&mut editor, "!");
    assert!(editor.dispatch(Command::DeleteBackward));
    assert!(editor.dispatch(Command::DeleteBackward));

    assert_eq!(editor.document().plain_text(), "hell");
    assert!(editor.document().wrappers().is_empty());
}

#[test]
fn test_handler_order_after_install() {
    let (editor, _ctx) = suggesting(&["x"], "u1");
    assert_eq!(
        editor.handler_names(),
        vec![
            "suggest-edits-interceptor",
            "suggest-edits-mode",
            "suggest-edits-resolve",
            "default-behavior",
        ]
    );
}

#[test]
fn test_mode_commands() {
    let (mut editor, ctx) = editing(&["hello"], "u1");
    let modes = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = modes.clone();
    let _subscription = ctx.subscribe_mode(move |mode| sink.borrow_mut().push(*mode));

    assert!(editor.dispatch(Command::ToggleMode));
    assert!(ctx.is_suggesting());
    assert!(editor.dispatch(Command::SetMode(EditorMode::Editing)));
    assert!(editor.dispatch(Command::SetMode(EditorMode::Editing)));

    assert_eq!(*modes.borrow(), vec![EditorMode::Suggesting, EditorMode::Editing]);
    // Mode changes are not document edits
    assert_eq!(editor.version(), 0);
    assert!(!editor.can_undo());
}

#[test]
fn test_mode_change_refused_without_capability() {
    let config = config("u1", EditorMode::Editing).with_capabilities(true, false);
    let (mut editor, ctx) = editor_with(Document::from_paragraphs(1, &["x"]), config);

    assert!(!editor.dispatch(Command::SetMode(EditorMode::Suggesting)));
    assert!(!editor.dispatch(Command::ToggleMode));
    assert_eq!(ctx.mode(), EditorMode::Editing);
}

#[test]
fn test_config_loaded_from_directory() {
    let dir = std::env::temp_dir().join("redline_config_test");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(DEFAULT_CONFIG_NAME),
        r#"{ "initialMode": "suggesting", "authorId": "u7", "authorName": "Grace", "quoteMaxLen": 20 }"#,
    )
    .unwrap();

    let config = SuggestEditsConfig::load(&dir).unwrap();
    assert_eq!(config.initial_mode, EditorMode::Suggesting);
    assert_eq!(config.author_id, "u7");
    assert_eq!(config.quote_max_len, 20);
    assert!(config.can_edit && config.can_suggest);
    assert!(!config.suggesters_can_reject_own);

    let (editor, ctx) = editor_with(Document::from_paragraphs(1, &["x"]), config);
    assert!(ctx.is_suggesting());
    assert_eq!(ctx.author().id, "u7");
    assert_eq!(editor.version(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = std::env::temp_dir().join("redline_missing_config_test");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::remove_file(dir.join(DEFAULT_CONFIG_NAME)).ok();

    let config = SuggestEditsConfig::load(&dir).unwrap();
    assert_eq!(config, SuggestEditsConfig::default());
}

#[test]
fn test_save_and_load_keep_suggestions() -> anyhow::Result<()> {
    let (mut editor, _ctx) = suggesting(&["hello"], "u1");
    let text = leaf(&editor, 0);
    select(&mut editor, text, 1, 4);
    type_text(&mut editor, "X");

    let dir = std::env::temp_dir().join("redline_save_test");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("document.json");
    editor.save(&path)?;

    let loaded = Editor::load(&path, 3)?;
    assert_eq!(loaded.site(), 3);
    assert_eq!(loaded.document().plain_text(), editor.document().plain_text());
    assert_eq!(suggestion_ids(&loaded), suggestion_ids(&editor));
    assert_eq!(loaded.document().wrappers().len(), 2);

    std::fs::remove_dir_all(&dir).ok();
    Ok(())
}
