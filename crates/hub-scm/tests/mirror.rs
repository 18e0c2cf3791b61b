mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use common::{FakeTool, factory, leftover_homes};
use hub_scm::{Error, MirrorMap, Remote, RemoteKind, digest, get_mirror, registry};
use tempfile::tempdir;

const URL: &str = "https://github.com/org/repo.git";

#[test]
fn test_find_dedup() {
    let dir = tempdir().unwrap();
    let f = factory(dir.path(), Arc::new(FakeTool::new()));
    let map = MirrorMap::new();

    let a = map.find(&Remote::git(URL), &f);
    let b = map.find(&Remote::git(URL).branch("dev").path("sub"), &f);
    assert!(Arc::ptr_eq(&a, &b));
    let c = map.find(&Remote::subversion(URL), &f);
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(map.len(), 2);
    assert_eq!(
        a.path(),
        dir.path().join(".mirror").join(digest(RemoteKind::Git, URL))
    );

    map.clear();
    assert!(map.is_empty());
    let d = map.find(&Remote::git(URL), &f);
    assert!(!Arc::ptr_eq(&a, &d));
}

#[test]
fn test_concurrent_find_same_entry() {
    let dir = tempdir().unwrap();
    let f = factory(dir.path(), Arc::new(FakeTool::new()));
    let map = MirrorMap::new();
    let found: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| s.spawn(|| map.find(&Remote::git(URL), &f)))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(found.iter().all(|m| Arc::ptr_eq(m, &found[0])));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_fetch_then_update() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::new());
    let f = factory(dir.path(), tool.clone());
    let remote = Remote::git(URL);
    let mirror = MirrorMap::new().find(&remote, &f);

    mirror.update(&remote).unwrap();
    assert_eq!(tool.count(&["clone", "--depth", "1", "--no-single-branch", URL]), 1);
    assert!(mirror.path().join("README").is_file());
    assert!(leftover_homes(dir.path()).is_empty());

    mirror.update(&remote).unwrap();
    assert_eq!(tool.count(&["clone"]), 1);
    assert_eq!(tool.count(&["fetch", "--tags", "--prune"]), 1);
    assert_eq!(tool.count(&["pull"]), 1);
    assert!(leftover_homes(dir.path()).is_empty());
}

#[test]
fn test_branch_selected_after_sync() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::new());
    tool.tags.lock().unwrap().push("1.0".into());
    let f = factory(dir.path(), tool.clone());
    let map = MirrorMap::new();

    let remote = Remote::git(URL).branch("v2");
    map.find(&remote, &f).update(&remote).unwrap();
    assert_eq!(tool.count(&["--no-single-branch"]), 1);
    assert_eq!(tool.count(&["checkout", "-B", "v2", "origin/v2"]), 1);

    let tagged = Remote::git(URL).branch("1.0");
    map.find(&tagged, &f).update(&tagged).unwrap();
    assert_eq!(tool.count(&["checkout", "1.0"]), 1);
    assert_eq!(tool.count(&["clone"]), 1);
}

#[test]
fn test_copy_to() {
    let dir = tempdir().unwrap();
    let f = factory(dir.path(), Arc::new(FakeTool::new()));
    let map = MirrorMap::new();
    let out = tempdir().unwrap();

    let whole = Remote::git(URL);
    map.find(&whole, &f).copy_to(&whole, out.path().join("whole")).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.path().join("whole/README")).unwrap(),
        "readme"
    );
    assert_eq!(
        std::fs::read_to_string(out.path().join("whole/sub/a.txt")).unwrap(),
        "A"
    );

    let sub = Remote::git(URL).path("sub");
    map.find(&sub, &f).copy_to(&sub, out.path().join("sub")).unwrap();
    assert_eq!(
        std::fs::read_to_string(out.path().join("sub/a.txt")).unwrap(),
        "A"
    );
    assert!(!out.path().join("sub/README").exists());
}

#[test]
fn test_subversion_mirror() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::new());
    let f = factory(dir.path(), tool.clone());
    let remote = Remote::subversion("https://svn.example/repo").path("sub");
    let mirror = MirrorMap::new().find(&remote, &f);
    let out = tempdir().unwrap();

    mirror.copy_to(&remote, out.path()).unwrap();
    assert_eq!(tool.count(&["checkout", "https://svn.example/repo"]), 1);
    assert!(out.path().join("a.txt").is_file());

    mirror.update(&remote).unwrap();
    assert_eq!(tool.count(&["update"]), 1);
    assert!(leftover_homes(dir.path()).is_empty());
}

#[test]
fn test_failed_fetch_cleans_up() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::new());
    tool.fail_checkout.store(true, Ordering::SeqCst);
    let f = factory(dir.path(), tool.clone());
    let remote = Remote::git(URL);
    let mirror = MirrorMap::new().find(&remote, &f);

    let err = mirror.update(&remote).unwrap_err();
    assert!(matches!(err, Error::Command { status: Some(128), .. }));
    assert!(!mirror.path().exists());
    assert!(leftover_homes(dir.path()).is_empty());

    tool.fail_checkout.store(false, Ordering::SeqCst);
    mirror.update(&remote).unwrap();
    assert_eq!(tool.count(&["clone"]), 2);
    assert!(mirror.path().join("README").is_file());
}

#[test]
fn test_insecure_remote_rejected() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::new());
    let f = factory(dir.path(), tool.clone());
    let remote = Remote::git("http://github.com/org/repo.git");
    let err = MirrorMap::new().find(&remote, &f).update(&remote).unwrap_err();
    assert!(matches!(err, Error::Insecure { .. }));
    assert!(tool.calls().is_empty());
}

#[test]
fn test_same_mirror_serialized() {
    let dir = tempdir().unwrap();
    let tool = Arc::new(FakeTool::with_hook(|_| {
        thread::sleep(Duration::from_millis(5));
        Ok(())
    }));
    let f = factory(dir.path(), tool.clone());
    let remote = Remote::git(URL);
    let mirror = MirrorMap::new().find(&remote, &f);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| mirror.update(&remote).unwrap());
        }
    });
    assert_eq!(tool.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(tool.count(&["clone"]), 1);
    assert_eq!(tool.count(&["pull"]), 3);
}

#[test]
fn test_distinct_mirrors_parallel() {
    let dir = tempdir().unwrap();
    let arrived = Arc::new((Mutex::new(0usize), Condvar::new()));
    let rendezvous = arrived.clone();
    let tool = Arc::new(FakeTool::with_hook(move |cmd| {
        if !cmd.has_args(&["clone"]) {
            return Ok(());
        }
        let (count, cond) = &*rendezvous;
        let mut n = count.lock().unwrap();
        *n += 1;
        cond.notify_all();
        let (n, timeout) = cond
            .wait_timeout_while(n, Duration::from_secs(5), |n| *n < 2)
            .unwrap();
        if timeout.timed_out() && *n < 2 {
            return Err(common::failed(cmd));
        }
        Ok(())
    }));
    let f = factory(dir.path(), tool.clone());
    let map = MirrorMap::new();
    let a = Remote::git("https://github.com/org/a.git");
    let b = Remote::git("https://github.com/org/b.git");

    thread::scope(|s| {
        let first = s.spawn(|| map.find(&a, &f).update(&a));
        let second = s.spawn(|| map.find(&b, &f).update(&b));
        first.join().unwrap().unwrap();
        second.join().unwrap().unwrap();
    });
    assert_eq!(*arrived.0.lock().unwrap(), 2);
    assert_eq!(tool.max_in_flight.load(Ordering::SeqCst), 2);
}

#[test]
fn test_global_registry() {
    let dir = tempdir().unwrap();
    let f = factory(dir.path(), Arc::new(FakeTool::new()));
    let remote = Remote::git("https://example.invalid/registry.git");
    let a = get_mirror(&remote, &f);
    let b = get_mirror(&remote.clone().branch("other"), &f);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!registry().is_empty());
}
