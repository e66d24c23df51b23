use criterion::{black_box, criterion_group, criterion_main, Criterion};
use redline_document::{Document, Point, Selection};
use redline_editor::{derive_threads, Command, Editor, EditorMode, SuggestEdits, SuggestEditsConfig};

/// A document of `paragraphs` lines, each carrying one replacement
fn document_with_suggestions(paragraphs: usize) -> Document {
    let lines: Vec<String> = (0..paragraphs)
        .map(|i| format!("paragraph {i} with some committed text"))
        .collect();
    let lines: Vec<&str> = lines.iter().map(String::as_str).collect();

    let mut editor = Editor::new(Document::from_paragraphs(1, &lines));
    let config = SuggestEditsConfig::default()
        .for_author("bench", "Bench")
        .with_mode(EditorMode::Suggesting);
    SuggestEdits::install(&mut editor, config);

    for index in 0..paragraphs {
        let Some(paragraph) = editor.document().paragraph(index) else {
            break;
        };
        let text = editor.document().text_leaves(paragraph)[0];
        editor.set_selection(Some(Selection::new(Point::new(text, 10), Point::new(text, 14))));
        editor.dispatch(Command::insert_text("WITH"));
    }
    editor.document().clone()
}

fn derive_small_document(c: &mut Criterion) {
    let doc = document_with_suggestions(10);

    c.bench_function("derive_threads_10", |b| {
        b.iter(|| derive_threads(black_box(&doc), 120))
    });
}

fn derive_large_document(c: &mut Criterion) {
    let doc = document_with_suggestions(200);

    c.bench_function("derive_threads_200", |b| {
        b.iter(|| derive_threads(black_box(&doc), 120))
    });
}

fn suggest_typing(c: &mut Criterion) {
    c.bench_function("suggest_typing_50_chars", |b| {
        b.iter(|| {
            let mut editor = Editor::new(Document::from_paragraphs(1, &["start"]));
            let config = SuggestEditsConfig::default().with_mode(EditorMode::Suggesting);
            SuggestEdits::install(&mut editor, config);
            let text = editor.document().text_leaves(editor.document().root())[0];
            editor.set_selection(Some(Selection::caret(Point::new(text, 5))));
            for _ in 0..50 {
                editor.dispatch(Command::insert_text("x"));
            }
            black_box(editor.version())
        })
    });
}

criterion_group!(benches, derive_small_document, derive_large_document, suggest_typing);
criterion_main!(benches);
