//! Shared helpers for the editor integration tests

#![allow(dead_code)]

use redline_document::{Document, NodeKey, Point, Selection, WrapperKind};
use redline_editor::{
    Command, Editor, EditorMode, Subscription, SuggestEdits, SuggestEditsConfig,
    SuggestEditsContext, ThreadEvent,
};
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn config(author: &str, mode: EditorMode) -> SuggestEditsConfig {
    SuggestEditsConfig::default()
        .for_author(author, author.to_uppercase())
        .with_mode(mode)
}

pub fn editor_with(document: Document, config: SuggestEditsConfig) -> (Editor, Rc<SuggestEditsContext>) {
    init_tracing();
    let mut editor = Editor::new(document);
    let ctx = SuggestEdits::install(&mut editor, config);
    (editor, ctx)
}

pub fn suggesting(paragraphs: &[&str], author: &str) -> (Editor, Rc<SuggestEditsContext>) {
    editor_with(
        Document::from_paragraphs(1, paragraphs),
        config(author, EditorMode::Suggesting),
    )
}

pub fn editing(paragraphs: &[&str], author: &str) -> (Editor, Rc<SuggestEditsContext>) {
    editor_with(
        Document::from_paragraphs(1, paragraphs),
        config(author, EditorMode::Editing),
    )
}

/// First text leaf of paragraph `index` as it was initially built
pub fn leaf(editor: &Editor, paragraph: usize) -> NodeKey {
    let doc = editor.document();
    doc.text_leaves(doc.paragraph(paragraph).expect("paragraph"))[0]
}

pub fn caret(editor: &mut Editor, key: NodeKey, offset: usize) {
    editor.set_selection(Some(Selection::caret(Point::new(key, offset))));
}

pub fn select(editor: &mut Editor, key: NodeKey, from: usize, to: usize) {
    editor.set_selection(Some(Selection::new(Point::new(key, from), Point::new(key, to))));
}

pub fn type_text(editor: &mut Editor, text: &str) {
    for ch in text.chars() {
        assert!(editor.dispatch(Command::InsertText(ch.to_string())));
    }
}

/// `(kind, author, text)` of every wrapper in document order
pub fn wrappers(editor: &Editor) -> Vec<(WrapperKind, String, String)> {
    let doc = editor.document();
    doc.wrappers()
        .into_iter()
        .map(|(key, kind, meta)| (kind, meta.author_user_id, doc.text_content(key)))
        .collect()
}

/// Ids of the live suggestions
pub fn suggestion_ids(editor: &Editor) -> Vec<String> {
    redline_editor::derive_threads(editor.document(), 120)
        .into_keys()
        .collect()
}

pub fn record_threads(ctx: &SuggestEditsContext) -> (Rc<RefCell<Vec<ThreadEvent>>>, Subscription) {
    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    let subscription = ctx.subscribe_threads(move |event| sink.borrow_mut().push(event.clone()));
    (events, subscription)
}
