//! Skeleton layout and section replacement through the public writer API.

use quill::docs::model::{STYLE_HEADING_1, STYLE_NORMAL, STYLE_TITLE};
use quill::prelude::*;

fn outline(titles: &[&str]) -> Outline {
    Outline::new(
        "Report",
        titles.iter().map(|t| SectionDescriptor::new(*t)).collect(),
    )
}

async fn skeleton_text(titles: &[&str]) -> String {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
    let id = writer
        .create_skeleton("Report", &outline(titles))
        .await
        .unwrap();
    docs.text(&id).unwrap()
}

#[tokio::test]
async fn skeleton_without_sections_holds_only_the_title() {
    assert_eq!(skeleton_text(&[]).await, "Report\n\n");
}

#[tokio::test]
async fn skeleton_with_one_section() {
    assert_eq!(
        skeleton_text(&["Solo"]).await,
        "Report\nSOLO\n[[START:SOLO]]\n\n[[END:SOLO]]\n\n"
    );
}

#[tokio::test]
async fn skeleton_with_three_sections_keeps_outline_order() {
    assert_eq!(
        skeleton_text(&["Alpha", "Beta", "Gamma"]).await,
        "Report\n\
         ALPHA\n[[START:ALPHA]]\n\n[[END:ALPHA]]\n\
         BETA\n[[START:BETA]]\n\n[[END:BETA]]\n\
         GAMMA\n[[START:GAMMA]]\n\n[[END:GAMMA]]\n\n"
    );
}

#[tokio::test]
async fn skeleton_paragraph_styles() {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::new(FormatStyle::Apa));
    let id = writer
        .create_skeleton("Report", &outline(&["Alpha"]))
        .await
        .unwrap();
    let doc = docs.fetch(&id).await.unwrap();
    let styles: Vec<Option<String>> = doc
        .paragraphs()
        .into_iter()
        .map(|p| p.named_style)
        .collect();
    assert_eq!(styles[0].as_deref(), Some(STYLE_TITLE));
    assert_eq!(styles[1].as_deref(), Some(STYLE_HEADING_1));
    assert_eq!(styles[2].as_deref(), Some(STYLE_NORMAL));
}

#[tokio::test]
async fn second_write_replaces_the_first() {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
    let id = writer
        .create_skeleton("Report", &outline(&["Alpha", "Beta"]))
        .await
        .unwrap();

    writer
        .write_section(&id, "ALPHA", "First draft.", "Alpha")
        .await
        .unwrap();
    writer
        .write_section(&id, "ALPHA", "Second draft.\n\nWith two paragraphs.", "Alpha")
        .await
        .unwrap();

    assert_eq!(
        writer.read_section(&id, "ALPHA").await.unwrap(),
        "Second draft.\nWith two paragraphs."
    );
    assert_eq!(writer.read_section(&id, "BETA").await.unwrap(), "");
    assert!(!docs.text(&id).unwrap().contains("First draft."));
}

#[tokio::test]
async fn write_with_only_blank_content_keeps_anchors_usable() {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
    let id = writer
        .create_skeleton("Report", &outline(&["Alpha"]))
        .await
        .unwrap();

    writer.write_section(&id, "ALPHA", "\n\n", "Alpha").await.unwrap();
    writer
        .write_section(&id, "ALPHA", "Now with text.", "Alpha")
        .await
        .unwrap();
    assert_eq!(
        writer.read_section(&id, "ALPHA").await.unwrap(),
        "Now with text."
    );
}

#[tokio::test]
async fn finalize_twice_is_a_no_op_the_second_time() {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
    let id = writer
        .create_skeleton("Report", &outline(&["Alpha", "Beta"]))
        .await
        .unwrap();

    assert_eq!(writer.finalize(&id).await.unwrap(), 4);
    let batches = docs.batch_count();
    assert_eq!(writer.finalize(&id).await.unwrap(), 0);
    assert_eq!(docs.batch_count(), batches);
    assert!(!docs.text(&id).unwrap().contains("[["));
}

#[tokio::test]
async fn revoked_access_surfaces_as_auth_error() {
    let docs = InMemoryDocuments::new();
    let writer = DocumentWriter::new(&docs, AcademicFormatter::default());
    let id = writer
        .create_skeleton("Report", &outline(&["Alpha"]))
        .await
        .unwrap();

    docs.inject_failure(DocsError::AuthRevoked("invalid_grant".into()));
    let err = writer
        .write_section(&id, "ALPHA", "Text.", "Alpha")
        .await
        .unwrap_err();
    assert!(err.is_auth_revoked());
}
