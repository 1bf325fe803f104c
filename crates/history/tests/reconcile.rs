mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use vcs_history::{
    CancellationToken, Change, ChangeSetSource, ChangeType, CvsFileRecord, CvsHistory,
    CvsLogEntry, Entity, EntityKind, HgHistory, HgStatusEntry, HistoryBackend, HistoryError,
    ReconcileOptions, Revision, SvnHistory, SvnPathRecord,
};

fn svn_rename(new_content: &str) -> SvnHistory<MemorySvn> {
    let client = MemorySvn::default()
        .commit(1, vec![svn_path("A", "/a.txt")])
        .commit(2, vec![svn_copy("/b.txt", "/a.txt", 1), svn_path("D", "/a.txt")])
        .file("a.txt", 1, "hello\n")
        .file("b.txt", 2, new_content);
    SvnHistory::new(client, "file:///srv/svn/project")
}

#[test]
fn svn_copy_with_deleted_source_becomes_move() {
    init_tracing();
    let history = svn_rename("hello\n");
    let repo = history.repository().clone();

    let raw = history.get_changeset("2").unwrap();
    assert_eq!(raw.count(ChangeType::Copy), 1);
    assert_eq!(raw.count(ChangeType::Remove), 1);

    let cs = history
        .get_optimized_changeset("2", &ReconcileOptions::default())
        .unwrap();
    assert!(cs.is_optimized());
    assert_eq!(
        cs.into_changes(),
        vec![Change::moved(
            Entity::file(&repo, "a.txt", 1),
            Entity::file(&repo, "b.txt", 2)
        )]
    );
}

#[test]
fn svn_move_with_edited_content_becomes_derived() {
    let history = svn_rename("hello, edited\n");
    let cs = history
        .get_optimized_changeset("2", &ReconcileOptions::default())
        .unwrap();

    assert_eq!(cs.count(ChangeType::Derived), 1);
    assert_eq!(cs.count(ChangeType::Move), 0);
    assert_eq!(cs.count(ChangeType::Remove), 0);
}

#[test]
fn svn_fan_out_consumes_single_remove() {
    let client = MemorySvn::default()
        .commit(
            3,
            vec![
                svn_copy("/b.txt", "/a.txt", 2),
                svn_copy("/c.txt", "/a.txt", 2),
                svn_path("D", "/a.txt"),
            ],
        )
        .file("a.txt", 2, "same")
        .file("b.txt", 3, "same")
        .file("c.txt", 3, "same");
    let history = SvnHistory::new(client, "file:///srv/svn/project");

    let cs = history.get_changeset("3").unwrap().optimize(&history).unwrap();
    let actions: Vec<ChangeType> = cs.changes().iter().map(Change::action).collect();
    assert_eq!(actions, vec![ChangeType::Move, ChangeType::Move]);
    assert_eq!(history.client().reads(), 4);
}

#[test]
fn hg_rename_reconciles_through_path_equality() {
    let client = MemoryHg::default()
        .commit(0, vec![HgStatusEntry::new('A', "a.txt")])
        .commit(
            1,
            vec![
                HgStatusEntry::new(' ', "a.txt"),
                HgStatusEntry::new('A', "b.txt"),
                HgStatusEntry::new('R', "a.txt"),
            ],
        )
        .file("a.txt", 0, "content")
        .file("b.txt", 1, "content");
    let history = HgHistory::new(client, "/srv/hg/project");
    let repo = history.repository().clone();

    let cs = history
        .get_optimized_changeset("1", &ReconcileOptions::default())
        .unwrap();
    assert_eq!(
        cs.into_changes(),
        vec![Change::moved(
            Entity::file(&repo, "a.txt", 0),
            Entity::file(&repo, "b.txt", 1)
        )]
    );
}

#[test]
fn hg_plain_copy_stays_copy() {
    let client = MemoryHg::default()
        .commit(0, vec![HgStatusEntry::new('A', "a.txt")])
        .commit(
            1,
            vec![HgStatusEntry::new(' ', "a.txt"), HgStatusEntry::new('A', "b.txt")],
        )
        .file("a.txt", 0, "content")
        .file("b.txt", 1, "content");
    let history = HgHistory::new(client, "/srv/hg/project");

    let cs = history
        .get_optimized_changeset("", &ReconcileOptions::default())
        .unwrap();
    assert_eq!(cs.count(ChangeType::Copy), 1);
}

#[test]
fn cvs_changesets_never_need_content() {
    let client = MemoryCvs {
        entries: vec![CvsLogEntry {
            author: Some("dev".to_string()),
            message: Some("rename by hand".to_string()),
            files: vec![
                CvsFileRecord {
                    name: "old.c".to_string(),
                    revision: "1.4".to_string(),
                    state: "dead".to_string(),
                    lines_added: Some(0),
                    lines_removed: Some(12),
                },
                CvsFileRecord {
                    name: "new.c".to_string(),
                    revision: "1.1".to_string(),
                    state: "Exp".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }],
        ..Default::default()
    };
    let history = CvsHistory::new(client, ":pserver:anon@cvs.example.org:/cvsroot:proj");

    let cs = history
        .get_optimized_changeset("HEAD", &ReconcileOptions::default().with_workers(4))
        .unwrap();
    assert_eq!(cs.count(ChangeType::Remove), 1);
    assert_eq!(cs.count(ChangeType::Add), 1);
    assert_eq!(history.client().reads.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_content_fails_the_whole_pass() {
    let client = MemorySvn::default()
        .commit(2, vec![svn_copy("/b.txt", "/a.txt", 1)])
        .file("b.txt", 2, "orphan");
    let history = SvnHistory::new(client, "file:///srv/svn/project");

    let err = history
        .get_optimized_changeset("2", &ReconcileOptions::default())
        .unwrap_err();
    match &err {
        HistoryError::ContentFetch { path, revision, .. } => {
            assert_eq!(path, "a.txt");
            assert_eq!(revision, &Revision::Number(1));
        }
        other => panic!("expected a content fetch error, got {other:?}"),
    }
    assert!(err.is_backend_failure());
}

#[test]
fn svn_branch_creation_cannot_be_optimized() {
    let branch = SvnPathRecord {
        kind: EntityKind::Directory,
        ..svn_copy("/branches/feature", "/trunk", 6)
    };
    let history = SvnHistory::new(
        MemorySvn::default().commit(7, vec![branch]),
        "file:///srv/svn/project",
    );

    let raw = history.get_changeset("7").unwrap();
    assert_eq!(raw.count(ChangeType::Copy), 1);

    let err = history
        .get_optimized_changeset("7", &ReconcileOptions::default())
        .unwrap_err();
    match &err {
        HistoryError::ContentFetch { path, revision, .. } => {
            assert_eq!(path, "trunk");
            assert_eq!(revision, &Revision::Number(6));
        }
        other => panic!("expected a content fetch error, got {other:?}"),
    }
    assert_eq!(history.client().reads(), 1);
}

#[test]
fn cancelled_token_stops_content_reads() {
    let history = svn_rename("hello\n");
    let token = CancellationToken::new();
    token.cancel();

    let err = history
        .get_optimized_changeset("2", &ReconcileOptions::default().with_cancel(token))
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(history.client().reads(), 0);
}

#[test]
fn cancelled_token_stops_parallel_workers() {
    let mut paths = Vec::new();
    let mut client = MemorySvn::default().file("src.txt", 4, "base");
    for i in 0..12 {
        let name = format!("copy{i:02}.txt");
        paths.push(svn_copy(&format!("/{name}"), "/src.txt", 4));
        client = client.file(&name, 5, "base");
    }
    let history = SvnHistory::new(client.commit(5, paths), "file:///srv/svn/project");
    let token = CancellationToken::new();
    token.cancel();

    let options = ReconcileOptions::default().with_workers(4).with_cancel(token);
    let err = history.get_optimized_changeset("5", &options).unwrap_err();
    assert!(err.is_cancelled());
    assert!(matches!(err, HistoryError::ContentFetch { .. }));
    assert_eq!(history.client().reads(), 0);
}

#[test]
fn parallel_comparison_keeps_input_order() {
    let mut paths = Vec::new();
    let mut client = MemorySvn::default().file("src.txt", 9, "base");
    for i in 0..24 {
        let name = format!("copy{i:02}.txt");
        paths.push(svn_copy(&format!("/{name}"), "/src.txt", 9));
        let content = if i % 3 == 0 { "changed" } else { "base" };
        client = client.file(&name, 10, content);
    }
    let history = SvnHistory::new(client.commit(10, paths), "file:///srv/svn/project");

    let sequential = history
        .get_optimized_changeset("10", &ReconcileOptions::default())
        .unwrap();
    let parallel = history
        .get_optimized_changeset("10", &ReconcileOptions::default().with_workers(6))
        .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(parallel.count(ChangeType::Derived), 8);
    assert_eq!(parallel.changes()[0].action(), ChangeType::Derived);
    assert_eq!(parallel.changes()[1].action(), ChangeType::Copy);
}

#[test]
fn walked_changesets_respect_change_shapes() {
    let svn = svn_rename("hello\n");
    let hg = HgHistory::new(
        MemoryHg::default()
            .commit(0, vec![HgStatusEntry::new('A', "a.txt")])
            .commit(1, vec![HgStatusEntry::new('M', "a.txt"), HgStatusEntry::new('R', "b.txt")]),
        "/srv/hg/project",
    );
    let backends: Vec<&dyn HistoryBackend> = vec![&svn, &hg];

    for backend in backends {
        for changeset in backend.walk_history().unwrap() {
            for change in changeset.unwrap().changes() {
                match change.action() {
                    ChangeType::Add => assert!(change.previous().is_empty()),
                    ChangeType::Remove => assert!(change.current().is_none()),
                    _ => {
                        assert!(change.current().is_some());
                        assert!(!change.previous().is_empty());
                    }
                }
            }
        }
    }
}

#[test]
fn optimized_changeset_serializes_its_state() {
    let history = svn_rename("hello\n");
    let cs = history
        .get_optimized_changeset("2", &ReconcileOptions::default())
        .unwrap();

    let json = serde_json::to_value(&cs).unwrap();
    assert_eq!(json["state"], "optimized");
    assert_eq!(json["changes"][0]["action"], "move");

    let back: vcs_history::ChangeSet = serde_json::from_value(json).unwrap();
    assert!(back.is_optimized());
    assert_eq!(back, cs);
}
