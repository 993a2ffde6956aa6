//! End-to-end imports against the in-memory store.

use std::io::Write;

use grc_import_core::{
    Config, FrameworkRow, ImportSession, MemoryStore, RichSource, SessionError, SessionState,
    Strictness, Table,
    importer::{read_bulk, read_rich},
    link::{EntityKind, Linker},
};
use tokio_util::sync::CancellationToken;

const BUNDLE: &str = r#"{
    "framework": { "code": "ISO27001-2022", "name": "ISO/IEC 27001", "version": "2022" },
    "sections": [{ "code": "A.5", "title": "Organizational controls" }],
    "requirements": [
        { "requirement_code": "A.5.1", "title": "Policies", "text": "Define policies.", "section_code": "A.5" },
        { "requirement_code": "A.5.2", "title": "Roles", "text": "Assign roles.", "priority": "HIGH" }
    ]
}"#;

fn bundle_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(BUNDLE.as_bytes()).unwrap();
    file
}

async fn import_bundle(store: &MemoryStore, path: &std::path::Path) -> ImportSession {
    let mut session = ImportSession::new(Strictness::AllOrNothing);
    let state = session.load(read_bulk(path).unwrap()).unwrap();
    assert_eq!(state, SessionState::Valid);
    session.commit(store, CancellationToken::new()).await.unwrap();
    session
}

#[tokio::test]
async fn reimporting_a_bundle_is_idempotent() {
    let store = MemoryStore::new();
    let file = bundle_file();

    let first = import_bundle(&store, file.path()).await;
    let report = first.report().unwrap();
    assert!(report.frameworks[0].created);
    assert_eq!(report.sections, 1);
    assert_eq!(report.requirements.len(), 2);

    let second = import_bundle(&store, file.path()).await;
    assert!(!second.report().unwrap().frameworks[0].created);

    assert_eq!(store.rows(Table::Frameworks).len(), 1);
    assert_eq!(store.rows(Table::Sections).len(), 1);
    let requirements = store.rows(Table::Requirements);
    assert_eq!(requirements.len(), 2);

    let section_id = &store.rows(Table::Sections)[0]["id"];
    let policies = requirements
        .iter()
        .find(|row| row["requirement_code"] == "A.5.1")
        .unwrap();
    assert_eq!(&policies["section_id"], section_id);
    let roles = requirements
        .iter()
        .find(|row| row["requirement_code"] == "A.5.2")
        .unwrap();
    assert_eq!(roles["priority"], "high");
}

#[tokio::test]
async fn reimport_without_a_section_clears_it() {
    let store = MemoryStore::new();
    import_bundle(&store, bundle_file().path()).await;

    let moved = BUNDLE.replace(r#", "section_code": "A.5""#, "");
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(moved.as_bytes()).unwrap();
    import_bundle(&store, file.path()).await;

    let requirements = store.rows(Table::Requirements);
    assert_eq!(requirements.len(), 2);
    let policies = requirements
        .iter()
        .find(|row| row["requirement_code"] == "A.5.1")
        .unwrap();
    assert!(policies["section_id"].is_null());
}

#[tokio::test]
async fn segmented_text_is_linked_and_mapped() {
    let store = MemoryStore::new();
    let config = Config::default();
    let text = "MADDE 1 – Amaç\nBu Kanunun amacı kişisel verilerin korunmasıdır.\n\
                MADDE 2 – Kapsam\nBu Kanun tüm veri sorumlularını kapsar.";

    let mut loaded = read_rich(&RichSource::Paste(text.to_string()), &config)
        .await
        .unwrap();
    loaded.assign_framework(FrameworkRow::new("KVKK", "Kişisel Verilerin Korunması Kanunu"));

    let mut session = ImportSession::new(Strictness::BestEffort);
    assert_eq!(session.load(loaded).unwrap(), SessionState::Valid);
    let codes: Vec<_> = session
        .candidates()
        .iter()
        .map(|candidate| candidate.requirement_code.as_str())
        .collect();
    assert_eq!(codes, ["MADDE 1", "MADDE 2"]);

    let linker = Linker::new(&store, &config);
    let risk = linker.create_risk("Unlawful processing").await.unwrap();
    assert_eq!(session.attach(EntityKind::Risk, risk.id).unwrap(), Some(0));
    let found = linker.search(EntityKind::Risk, "unlawful").await.unwrap();
    assert_eq!(found[0].id, risk.id);

    let report = session
        .commit(&store, CancellationToken::new())
        .await
        .unwrap()
        .clone();

    assert!(report.is_complete());
    assert_eq!(report.requirements.len(), 2);
    assert_eq!(report.mappings, 1);
    let mappings = store.rows(Table::RequirementMappings);
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0]["risk_id"], serde_json::json!(risk.id));
    assert_eq!(session.state(), SessionState::Done);
}

#[tokio::test]
async fn invalid_rows_block_all_or_nothing_imports() {
    let store = MemoryStore::new();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"code,title,text,framework_code\nA.1,Policies,Define policies,ISO\nA.2,,Missing title,ISO\n")
        .unwrap();

    let mut session = ImportSession::new(Strictness::AllOrNothing);
    assert_eq!(
        session.load(read_bulk(file.path()).unwrap()).unwrap(),
        SessionState::ParsedWithErrors
    );

    let error = session
        .commit(&store, CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(error, SessionError::Blocked { invalid: 1 }));
    assert!(store.rows(Table::Requirements).is_empty());

    session.set_include(1, false).unwrap();
    assert_eq!(session.state(), SessionState::Valid);
}

#[tokio::test]
async fn requirements_for_unknown_frameworks_fail_the_row() {
    let store = MemoryStore::new();
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(b"code,title,text,framework_code\nA.1,Policies,Define policies,NOPE\n")
        .unwrap();

    let mut session = ImportSession::new(Strictness::BestEffort);
    session.load(read_bulk(file.path()).unwrap()).unwrap();
    let report = session
        .commit(&store, CancellationToken::new())
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures[0].code, "A.1");
    assert!(store.rows(Table::Requirements).is_empty());
}
