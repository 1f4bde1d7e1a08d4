use domain::models::{Chunk, ChunkMetadata};
use infrastructure::vector_store::VectorStore;
use tempfile::tempdir;
use tests::embedding_service;

fn chunk(text: &str, source: &str) -> Chunk {
    Chunk::new(text, ChunkMetadata::with_source(source))
}

#[tokio::test]
async fn search_without_an_index_is_not_initialized() {
    let dir = tempdir().unwrap();
    let service = embedding_service(&dir.path().join("vector_store"));

    let err = service.search("anything", 4).await.unwrap_err();
    assert!(err.is_not_initialized());
    assert_eq!(err.to_string(), "Vector store not initialized. Run indexing first.");
}

#[tokio::test]
async fn persisted_index_ranks_exact_text_first_after_reload() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("vector_store");
    let c1 = chunk("Office rent is five hundred euros per month", "lease.txt");
    let c2 = chunk("The team has four engineers and one designer", "staff.txt");

    embedding_service(&store_dir)
        .build(vec![c1.clone(), c2.clone()])
        .await
        .unwrap();

    let reloaded = embedding_service(&store_dir);
    assert!(!reloaded.is_loaded().await);
    assert!(reloaded.load().await.unwrap());

    let hits = reloaded.search(&c1.text, 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0], c1);
    assert_eq!(hits[1], c2);
}

#[tokio::test]
async fn search_loads_a_persisted_index_on_demand() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("vector_store");
    embedding_service(&store_dir)
        .build(vec![chunk("alpha beta", "a.md"), chunk("gamma delta", "b.md")])
        .await
        .unwrap();

    let fresh = embedding_service(&store_dir);
    let hits = fresh.search("gamma", 1).await.unwrap();
    assert!(fresh.is_loaded().await);
    assert_eq!(hits[0].metadata.source, "b.md");
}

#[tokio::test]
async fn building_from_nothing_changes_nothing() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("vector_store");
    let service = embedding_service(&store_dir);

    service.build(Vec::new()).await.unwrap();
    assert!(!service.is_loaded().await);
    assert!(!VectorStore::exists(&store_dir));
}

#[tokio::test]
async fn k_larger_than_the_index_returns_everything() {
    let dir = tempdir().unwrap();
    let service = embedding_service(&dir.path().join("vector_store"));
    service
        .build(vec![chunk("one", "1.txt"), chunk("two", "2.txt")])
        .await
        .unwrap();

    assert_eq!(service.search("one", 10).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_builds_both_succeed_and_agree_with_disk() {
    let dir = tempdir().unwrap();
    let store_dir = dir.path().join("vector_store");
    let service = embedding_service(&store_dir);
    let batch = |topic: &str| -> Vec<Chunk> {
        (0..200)
            .map(|i| chunk(&format!("{topic} note number {i}"), &format!("{topic}.txt")))
            .collect()
    };

    let (first, second) = tokio::join!(
        service.build(batch("apples")),
        service.build(batch("pears"))
    );
    first.unwrap();
    second.unwrap();

    let in_memory = service.search("note number 7", 1).await.unwrap();
    let reloaded = embedding_service(&store_dir);
    let from_disk = reloaded.search("note number 7", 1).await.unwrap();
    assert_eq!(in_memory[0].metadata.source, from_disk[0].metadata.source);
    assert_eq!(std::fs::read_dir(&store_dir).unwrap().count(), 1);
}
