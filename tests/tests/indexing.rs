use domain::models::IndexState;
use tempfile::tempdir;
use tests::{indexing_service, write_document};

#[tokio::test]
async fn bootstrap_with_no_documents_creates_the_directory_and_waits() {
    let dir = tempdir().unwrap();
    let documents = dir.path().join("documents");
    let indexer = indexing_service(&dir.path().join("vector_store"));

    assert_eq!(indexer.bootstrap(&documents).await, IndexState::Unindexed);
    assert!(documents.is_dir());
}

#[tokio::test]
async fn bootstrap_indexes_existing_documents_then_later_starts_reload() {
    let dir = tempdir().unwrap();
    let documents = dir.path().join("documents");
    let store_dir = dir.path().join("vector_store");
    write_document(&documents, "faq.md", "Opening hours are nine to five.");

    let first = indexing_service(&store_dir);
    assert_eq!(first.bootstrap(&documents).await, IndexState::Indexed);

    let restarted = indexing_service(&store_dir);
    assert_eq!(restarted.state().await, IndexState::Unindexed);
    assert_eq!(restarted.bootstrap(&documents).await, IndexState::Indexed);
}

#[tokio::test]
async fn run_reports_chunk_count() {
    let dir = tempdir().unwrap();
    let documents = dir.path().join("documents");
    write_document(&documents, "a.txt", "first file");
    write_document(&documents, "b.txt", "second file");

    let indexer = indexing_service(&dir.path().join("vector_store"));
    assert_eq!(indexer.run(&documents).await.unwrap(), 2);
    assert_eq!(indexer.state().await, IndexState::Indexed);
}

#[tokio::test]
async fn background_indexing_of_a_missing_directory_is_harmless() {
    let dir = tempdir().unwrap();
    let indexer = indexing_service(&dir.path().join("vector_store"));

    indexer.spawn(dir.path().join("does-not-exist")).await.unwrap();
    assert_eq!(indexer.state().await, IndexState::Unindexed);
}

#[tokio::test]
async fn background_indexing_attaches_the_new_index() {
    let dir = tempdir().unwrap();
    let documents = dir.path().join("documents");
    write_document(&documents, "policy.txt", "Refunds within thirty days.");

    let indexer = indexing_service(&dir.path().join("vector_store"));
    indexer.spawn(documents).await.unwrap();

    assert_eq!(indexer.state().await, IndexState::Indexed);
    let hits = indexer.embeddings().search("refunds", 4).await.unwrap();
    assert_eq!(hits[0].text, "Refunds within thirty days.");
}
