//! Repository-contract tests: rerank validation, idempotence laws, and
//! fingerprint stability across ingest replays.

use std::collections::HashMap;
use std::io::Write;

use uuid::Uuid;
use zip::write::FileOptions;

use codefolio_rs::core::config::{CodefolioConfig, ScoreWeights};
use codefolio_rs::core::errors::CodefolioError;
use codefolio_rs::core::model::{Project, Skill, SkillKind};
use codefolio_rs::ingest::archive::extract_archive;
use codefolio_rs::ingest::discovery::build_ignore_set;
use codefolio_rs::ingest::merge::ingest_archive;
use codefolio_rs::store::content::{project_fingerprint, ContentStore};
use codefolio_rs::store::memory::MemoryRepository;
use codefolio_rs::store::repository::{FileStore, ProjectStore, SkillStore};

fn write_zip(files: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut writer = zip::ZipWriter::new(tmp.reopen().unwrap());
    for (name, bytes) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap();
    tmp
}

async fn ingest_once(
    repo: &MemoryRepository,
    content: &ContentStore,
    files: &[(&str, &[u8])],
    mapping: HashMap<String, Uuid>,
) -> Uuid {
    let zip = write_zip(files);
    let config = CodefolioConfig::default();
    let extracted = extract_archive(zip.path(), &config.ingest).await.unwrap();
    let ignore = build_ignore_set(&config.ingest.ignore_patterns).unwrap();
    let outcome = ingest_archive(repo, content, &extracted, "a.zip", 0, &mapping, &ignore)
        .await
        .unwrap();
    outcome.projects[0].project.id
}

#[tokio::test]
async fn rerank_with_duplicate_ranks_is_rejected_without_mutation() {
    let repo = MemoryRepository::new();
    let a = repo.create_project(Project::new("a", "a")).await.unwrap();
    let b = repo.create_project(Project::new("b", "b")).await.unwrap();

    let err = repo.rerank(&[(a.id, 1), (b.id, 1)]).await.unwrap_err();
    assert!(matches!(err, CodefolioError::Validation { .. }));
    assert_eq!(repo.get_project(a.id).await.unwrap().importance_rank, None);
    assert_eq!(repo.get_project(b.id).await.unwrap().importance_rank, None);
}

#[tokio::test]
async fn rerank_produces_exact_rank_set_and_is_idempotent() {
    let repo = MemoryRepository::new();
    let mut ids = Vec::new();
    for i in 0..5 {
        let project = repo
            .create_project(Project::new(format!("p{i}"), format!("p{i}")))
            .await
            .unwrap();
        ids.push(project.id);
    }

    let ranks: Vec<(Uuid, u32)> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, (5 - i) as u32))
        .collect();
    repo.rerank(&ranks).await.unwrap();
    repo.rerank(&ranks).await.unwrap();

    let mut observed: Vec<u32> = repo
        .list_projects()
        .await
        .unwrap()
        .iter()
        .map(|p| p.importance_rank.unwrap())
        .collect();
    observed.sort_unstable();
    assert_eq!(observed, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn double_ingest_leaves_state_identical() {
    let repo = MemoryRepository::new();
    let dir = tempfile::TempDir::new().unwrap();
    let content = ContentStore::new(dir.path());

    let files: &[(&str, &[u8])] = &[
        ("demo/main.py", b"print('hello')\n"),
        ("demo/util.py", b"def util(): pass\n"),
    ];

    let project_id = ingest_once(&repo, &content, files, HashMap::new()).await;
    let after_first = repo.file_entries(project_id).await.unwrap();
    let fingerprint_first = project_fingerprint(
        after_first
            .iter()
            .map(|e| (e.rel_path.as_str(), e.content_hash.as_str())),
    );

    let mapping: HashMap<String, Uuid> = [("demo".to_string(), project_id)].into_iter().collect();
    let replay_id = ingest_once(&repo, &content, files, mapping).await;
    assert_eq!(replay_id, project_id);

    let after_second = repo.file_entries(project_id).await.unwrap();
    assert_eq!(after_first, after_second);

    let fingerprint_second = project_fingerprint(
        after_second
            .iter()
            .map(|e| (e.rel_path.as_str(), e.content_hash.as_str())),
    );
    assert_eq!(fingerprint_first, fingerprint_second);
}

#[tokio::test]
async fn byte_identical_files_share_one_content_object() {
    let repo = MemoryRepository::new();
    let dir = tempfile::TempDir::new().unwrap();
    let content = ContentStore::new(dir.path());

    // The same payload under two paths dedupes to a single object.
    let files: &[(&str, &[u8])] = &[
        ("demo/a.py", b"shared = True\n"),
        ("demo/b.py", b"shared = True\n"),
    ];
    let project_id = ingest_once(&repo, &content, files, HashMap::new()).await;

    let entries = repo.file_entries(project_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].content_hash, entries[1].content_hash);
}

#[tokio::test]
async fn skill_upsert_by_name_and_kind_is_idempotent() {
    let repo = MemoryRepository::new();
    let project = repo
        .create_project(Project::new("demo", "demo"))
        .await
        .unwrap();

    let desired = [
        Skill {
            name: "Docker".to_string(),
            kind: SkillKind::Tool,
        },
        Skill {
            name: "Automated Testing".to_string(),
            kind: SkillKind::Practice,
        },
    ]
    .into_iter()
    .collect::<std::collections::BTreeSet<_>>();

    repo.set_project_skills(project.id, desired.clone())
        .await
        .unwrap();
    repo.set_project_skills(project.id, desired.clone())
        .await
        .unwrap();

    assert_eq!(repo.project_skills(project.id).await.unwrap(), desired);
}

#[tokio::test]
async fn score_weights_round_trip_through_repository() {
    let repo = MemoryRepository::new();
    assert_eq!(
        repo.get_score_weights().await.unwrap(),
        ScoreWeights::default()
    );

    let custom = ScoreWeights {
        contribution: 0.5,
        diversity: 0.3,
        duration: 0.1,
        file_count: 0.1,
    };
    repo.set_score_weights(custom).await.unwrap();
    assert_eq!(repo.get_score_weights().await.unwrap(), custom);
}
