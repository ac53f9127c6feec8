use resumedav::storage::DocumentStore;
use resumedav::sync::BatchOrchestrator;
use resumedav::test_helpers::{connected_client, doc_at, seed_remote, MemoryStore};
use resumedav::SyncClient;

#[tokio::test]
async fn test_push_all_continues_past_failures() {
    let (transport, client, config) = connected_client();
    let store = MemoryStore::with_documents(vec![
        doc_at("a", "Alpha", 1_000),
        doc_at("b", "Beta", 1_000),
        doc_at("c", "Gamma", 1_000),
    ]);
    transport.fail_path(&config.document_path("b"));

    let report = BatchOrchestrator::new(&client, &store)
        .push_all()
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.success, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].id, "b");
    assert!(transport.file_content(&config.document_path("a")).is_some());
    assert!(transport.file_content(&config.document_path("c")).is_some());
}

#[tokio::test]
async fn test_pull_all_imports_and_skips() {
    let (transport, client, config) = connected_client();

    // Remote: "new" is absent locally, "newer" beats the local copy,
    // "older" loses to it.
    seed_remote(&transport, &config, &doc_at("new", "New Remote", 1_000));
    seed_remote(&transport, &config, &doc_at("newer", "Remote Wins", 2_000));
    seed_remote(&transport, &config, &doc_at("older", "Remote Loses", 1_000));

    let store = MemoryStore::with_documents(vec![
        doc_at("newer", "Local Loses", 1_000),
        doc_at("older", "Local Wins", 2_000),
    ]);

    let report = BatchOrchestrator::new(&client, &store)
        .pull_all()
        .await
        .unwrap();

    assert_eq!(report.total, 3);
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);
    assert!(report.errors.is_empty());

    let local = store.list().await.unwrap();
    assert_eq!(local["new"].title, "New Remote");
    assert_eq!(local["newer"].title, "Remote Wins");
    assert_eq!(local["older"].title, "Local Wins");
}

#[tokio::test]
async fn test_pull_all_reports_malformed_files() {
    let (transport, client, config) = connected_client();
    seed_remote(&transport, &config, &doc_at("good", "Good CV", 1_000));
    transport.put_file(&config.file_path("resume-bad.json"), "{ not json");

    let store = MemoryStore::new();
    let report = BatchOrchestrator::new(&client, &store)
        .pull_all()
        .await
        .unwrap();

    // The unreadable file still counts toward the total and surfaces as an
    // error entry instead of vanishing from the report.
    assert_eq!(report.total, 2);
    assert_eq!(report.imported, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].file, "resume-bad.json");

    let local = store.list().await.unwrap();
    assert_eq!(local.len(), 1);
    assert!(local.contains_key("good"));
}

#[tokio::test]
async fn test_bidirectional_sync_converges_to_union() {
    let (transport, client, config) = connected_client();

    // Local: A@100, B@200. Remote: B@100, C@300.
    let store = MemoryStore::with_documents(vec![
        doc_at("a", "Alpha", 100),
        doc_at("b", "Beta Local", 200),
    ]);
    seed_remote(&transport, &config, &doc_at("b", "Beta Remote", 100));
    seed_remote(&transport, &config, &doc_at("c", "Gamma", 300));

    let report = BatchOrchestrator::new(&client, &store)
        .bidirectional_sync()
        .await
        .unwrap();

    // Pull imports C and skips the older remote B; push uploads all three.
    assert_eq!(report.pulled.imported, 1);
    assert_eq!(report.pulled.skipped, 1);
    assert_eq!(report.pushed.success, 3);

    let local = store.list().await.unwrap();
    assert_eq!(local.len(), 3);
    assert_eq!(local["b"].title, "Beta Local");

    assert_eq!(transport.file_count(), 3);
    let remote_b = transport
        .file_content(&config.document_path("b"))
        .unwrap();
    assert!(remote_b.contains("Beta Local"));
}

#[tokio::test]
async fn test_cleanup_orphans_removes_only_unmapped_files() {
    let (transport, client, config) = connected_client();
    seed_remote(&transport, &config, &doc_at("keep", "Kept", 1_000));
    seed_remote(&transport, &config, &doc_at("orphan", "Orphan", 1_000));
    transport.put_file(&config.file_path("notes.txt"), "not a resume");

    let store = MemoryStore::with_documents(vec![doc_at("keep", "Kept", 1_000)]);

    let report = BatchOrchestrator::new(&client, &store)
        .cleanup_orphans()
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert!(report.errors.is_empty());
    assert!(transport.file_content(&config.document_path("keep")).is_some());
    assert!(transport
        .file_content(&config.document_path("orphan"))
        .is_none());
    // Files outside the naming convention are never touched.
    assert!(transport.file_content(&config.file_path("notes.txt")).is_some());
}

#[tokio::test]
async fn test_check_status_classifies_documents() {
    let (transport, client, config) = connected_client();

    let store = MemoryStore::with_documents(vec![
        doc_at("only-local", "Local Only", 1_000),
        doc_at("conflicted", "Conflicted", 1_000),
        doc_at("agreed", "Agreed", 1_000),
    ]);
    seed_remote(&transport, &config, &doc_at("conflicted", "Conflicted", 2_000));
    seed_remote(&transport, &config, &doc_at("agreed", "Agreed", 1_000));
    seed_remote(&transport, &config, &doc_at("only-remote", "Remote Only", 1_000));

    let report = BatchOrchestrator::new(&client, &store)
        .check_status()
        .await
        .unwrap();

    assert_eq!(report.local_only, vec!["Local Only".to_string()]);
    assert_eq!(report.remote_only, vec!["Remote Only".to_string()]);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].id, "conflicted");
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_check_status_tolerates_subsecond_drift() {
    let (transport, client, config) = connected_client();

    // Same second on both sides; server mtime rounding must not surface
    // as a conflict.
    let store = MemoryStore::with_documents(vec![doc_at("a", "Alpha", 1_000)]);
    seed_remote(&transport, &config, &doc_at("a", "Alpha", 1_000));

    let report = BatchOrchestrator::new(&client, &store)
        .check_status()
        .await
        .unwrap();
    assert!(report.conflicts.is_empty());
    assert_eq!(report.synced, 1);
}

#[tokio::test]
async fn test_workflows_fail_fast_when_disconnected() {
    let client = SyncClient::new();
    let store = MemoryStore::new();
    let orchestrator = BatchOrchestrator::new(&client, &store);

    assert!(orchestrator.push_all().await.is_err());
    assert!(orchestrator.pull_all().await.is_err());
    assert!(orchestrator.bidirectional_sync().await.is_err());
    assert!(orchestrator.cleanup_orphans().await.is_err());
    assert!(orchestrator.check_status().await.is_err());
}
