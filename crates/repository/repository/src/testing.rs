use std::collections::HashSet;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use relay_core::{ManualClock, NewFileRecord};

use crate::error::RepositoryError;
use crate::repository::{ActivityCursor, FileRepository};

fn new_record(id: &str) -> NewFileRecord {
    NewFileRecord {
        public_key: format!("pub-{id}"),
        private_key: format!("priv-{id}"),
        storage_path: format!("blob-{id}"),
        mime_type: "application/octet-stream".to_owned(),
        size: 42,
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 1, 1, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Run the full file repository conformance test suite.
///
/// `repo` must be empty and read its time from `clock`. The suite moves
/// `clock` to fixed whole-second instants so that backends with coarse
/// timestamp precision compare exactly.
///
/// # Errors
///
/// Returns an error if the backend fails during any test.
pub async fn run_repository_conformance_tests(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    test_get_missing(repo).await?;
    test_add_and_get(repo, clock).await?;
    test_get_refreshes_activity(repo, clock).await?;
    test_duplicate_public_key(repo, clock).await?;
    test_duplicate_private_key(repo, clock).await?;
    test_delete(repo, clock).await?;
    test_list_inactive_since(repo, clock).await?;
    test_list_respects_max(repo, clock).await?;
    test_list_after_cursor(repo, clock).await?;
    Ok(())
}

async fn test_get_missing(repo: &dyn FileRepository) -> Result<(), RepositoryError> {
    assert!(repo.get("pub-missing").await?.is_none());
    assert!(repo.delete("priv-missing").await?.is_none());
    Ok(())
}

async fn test_add_and_get(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(1));
    let added = repo.add(new_record("add-get")).await?;
    assert_eq!(added.last_activity, at(1));

    let found = repo
        .get("pub-add-get")
        .await?
        .expect("record should be found after add");
    assert_eq!(found.private_key, "priv-add-get");
    assert_eq!(found.storage_path, "blob-add-get");
    assert_eq!(found.mime_type, "application/octet-stream");
    assert_eq!(found.size, 42);
    assert!(found.last_activity >= added.last_activity);

    repo.delete("priv-add-get").await?;
    Ok(())
}

async fn test_get_refreshes_activity(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(2));
    repo.add(new_record("refresh")).await?;

    clock.advance(TimeDelta::minutes(5));
    let first = repo.get("pub-refresh").await?.expect("record should exist");
    assert_eq!(first.last_activity, at(2) + TimeDelta::minutes(5));

    clock.advance(TimeDelta::minutes(5));
    let second = repo.get("pub-refresh").await?.expect("record should exist");
    assert!(second.last_activity > first.last_activity);
    assert_eq!(second.last_activity, at(2) + TimeDelta::minutes(10));

    repo.delete("priv-refresh").await?;
    Ok(())
}

async fn test_duplicate_public_key(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(3));
    repo.add(new_record("dup-pub")).await?;

    let mut clash = new_record("dup-pub-other");
    clash.public_key = "pub-dup-pub".to_owned();
    let err = repo.add(clash).await.expect_err("duplicate public key should fail");
    assert!(
        matches!(err, RepositoryError::DuplicateKey(_)),
        "expected DuplicateKey, got {err:?}"
    );

    // The original record is untouched and the rejected one left no trace.
    let original = repo.get("pub-dup-pub").await?.expect("original should remain");
    assert_eq!(original.private_key, "priv-dup-pub");
    assert!(repo.delete("priv-dup-pub-other").await?.is_none());

    repo.delete("priv-dup-pub").await?;
    Ok(())
}

async fn test_duplicate_private_key(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(4));
    repo.add(new_record("dup-priv")).await?;

    let mut clash = new_record("dup-priv-other");
    clash.private_key = "priv-dup-priv".to_owned();
    let err = repo.add(clash).await.expect_err("duplicate private key should fail");
    assert!(matches!(err, RepositoryError::DuplicateKey(_)));
    assert!(repo.get("pub-dup-priv-other").await?.is_none());

    repo.delete("priv-dup-priv").await?;
    Ok(())
}

async fn test_delete(repo: &dyn FileRepository, clock: &ManualClock) -> Result<(), RepositoryError> {
    clock.set(at(5));
    repo.add(new_record("delete")).await?;

    let removed = repo
        .delete("priv-delete")
        .await?
        .expect("delete should return the record");
    assert_eq!(removed.public_key, "pub-delete");

    assert!(repo.get("pub-delete").await?.is_none());
    assert!(
        repo.delete("priv-delete").await?.is_none(),
        "second delete should report not-found, not an error"
    );
    Ok(())
}

async fn test_list_inactive_since(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(6));
    repo.add(new_record("old")).await?;
    clock.set(at(7));
    repo.add(new_record("edge")).await?;
    clock.set(at(8));
    repo.add(new_record("young")).await?;

    let cutoff = at(7);
    let keys = |records: Vec<relay_core::FileRecord>| -> HashSet<String> {
        records.into_iter().map(|r| r.public_key).collect()
    };

    let inactive = keys(repo.list_inactive_since(cutoff, 100).await?);
    assert_eq!(
        inactive,
        HashSet::from(["pub-old".to_owned(), "pub-edge".to_owned()]),
        "cutoff is inclusive and excludes newer records"
    );

    // Touching a record after the cutoff removes it from the candidates.
    clock.set(at(9));
    repo.get("pub-old").await?;
    let inactive = keys(repo.list_inactive_since(cutoff, 100).await?);
    assert_eq!(inactive, HashSet::from(["pub-edge".to_owned()]));

    for id in ["old", "edge", "young"] {
        repo.delete(&format!("priv-{id}")).await?;
    }
    assert!(repo.list_inactive_since(at(23), 100).await?.is_empty());
    Ok(())
}

async fn test_list_respects_max(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    clock.set(at(10));
    for n in 0..5 {
        repo.add(new_record(&format!("page-{n}"))).await?;
    }

    let page = repo.list_inactive_since(at(10), 2).await?;
    assert_eq!(page.len(), 2);
    let again = repo.list_inactive_since(at(10), 2).await?;
    assert_eq!(
        page.iter().map(|r| &r.public_key).collect::<Vec<_>>(),
        again.iter().map(|r| &r.public_key).collect::<Vec<_>>(),
        "order should be stable between calls"
    );

    for n in 0..5 {
        repo.delete(&format!("priv-page-{n}")).await?;
    }
    Ok(())
}

async fn test_list_after_cursor(
    repo: &dyn FileRepository,
    clock: &ManualClock,
) -> Result<(), RepositoryError> {
    // Two records share an instant so the key tie-break is exercised.
    clock.set(at(11));
    repo.add(new_record("cur-a")).await?;
    repo.add(new_record("cur-b")).await?;
    clock.set(at(12));
    repo.add(new_record("cur-c")).await?;

    let first = repo.list_inactive_after(at(12), None, 1).await?;
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].public_key, "pub-cur-a");

    let mut seen = vec![first[0].public_key.clone()];
    let mut cursor = ActivityCursor::from(&first[0]);
    loop {
        let page = repo.list_inactive_after(at(12), Some(&cursor), 1).await?;
        let Some(last) = page.last() else { break };
        seen.push(last.public_key.clone());
        cursor = ActivityCursor::from(last);
    }
    assert_eq!(
        seen,
        vec!["pub-cur-a", "pub-cur-b", "pub-cur-c"],
        "cursor pages walk every candidate exactly once"
    );

    for id in ["cur-a", "cur-b", "cur-c"] {
        repo.delete(&format!("priv-{id}")).await?;
    }
    Ok(())
}
