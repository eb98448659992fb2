use exr::prelude::*;
use hdri_browser::events::Generation;
use hdri_browser::session::{
    BrowseSession, FAILED_MARKER, ItemState, STATUS_INVALID_FOLDER, STATUS_NO_FILES,
    SessionOptions, StatusTone,
};
use hdri_browser::tasks::pool::WorkerPool;
use hdri_browser::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(20);

fn write_exr(path: &Path, width: usize, height: usize, names: &[&str]) {
    let list: Vec<AnyChannel<FlatSamples>> = names
        .iter()
        .map(|name| AnyChannel::new(*name, FlatSamples::F32(vec![0.25; width * height])))
        .collect();
    Image::from_channels((width, height), AnyChannels::sort(list.into()))
        .write()
        .to_file(path)
        .unwrap();
}

fn threaded(workers: usize) -> BrowseSession {
    BrowseSession::new(WorkerPool::new(workers).unwrap(), SessionOptions::default())
}

#[test]
fn every_listed_file_completes_exactly_once() {
    let dir = tempdir().unwrap();
    for i in 0..12 {
        let name = format!("env_{i:02}.exr");
        if i % 3 == 0 {
            fs::write(dir.path().join(name), b"garbage").unwrap();
        } else {
            write_exr(&dir.path().join(name), 16, 8, &["B", "G", "R"]);
        }
    }
    fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

    let mut session = threaded(3);
    assert_eq!(session.open_folder(dir.path()).unwrap(), 12);
    assert_eq!(session.status().text, "Loading 0/12 HDRI files...");
    assert_eq!(session.status().tone, StatusTone::Busy);

    assert!(session.wait_until_complete(WAIT));
    assert_eq!(session.completed(), 12);
    assert_eq!(session.total(), 12);
    assert!(session.items().iter().all(|i| i.state.is_terminal()));
    assert_eq!(session.items().iter().filter(|i| i.error().is_some()).count(), 4);
    assert_eq!(session.status().text, "✓ Loaded 12 HDRI files");
    assert_eq!(session.status().tone, StatusTone::Done);

    // Nothing left in flight, nothing left to apply.
    assert_eq!(session.pump(), 0);

    let names: Vec<&str> = session.items().iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names.first(), Some(&"env_00.exr"));
    assert_eq!(names.last(), Some(&"env_11.exr"));
}

#[test]
fn invalid_folder_submits_nothing() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("file.exr");
    fs::write(&file, b"x").unwrap();

    let mut session = threaded(1);
    for bad in [dir.path().join("missing"), file] {
        let err = session.open_folder(&bad).unwrap_err();
        assert!(matches!(err, Error::InvalidFolder(_)));
        assert_eq!(session.status().text, STATUS_INVALID_FOLDER);
        assert_eq!(session.total(), 0);
        assert!(session.pool().is_idle());
        assert!(session.pool().next_timeout(Duration::from_millis(50)).is_none());
    }
}

#[cfg(unix)]
#[test]
fn dangling_symlink_does_not_invalidate_the_folder() {
    let dir = tempdir().unwrap();
    write_exr(&dir.path().join("good.exr"), 4, 4, &["Y"]);
    std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("stale_link.txt")).unwrap();

    let mut session = threaded(1);
    assert_eq!(session.open_folder(dir.path()).unwrap(), 1);
    assert!(session.wait_until_complete(WAIT));
    assert_eq!(session.status().text, "✓ Loaded 1 HDRI file");
}

#[test]
fn empty_folder_reports_no_files() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("readme.md"), b"no maps here").unwrap();

    let mut session = threaded(1);
    assert_eq!(session.open_folder(dir.path()).unwrap(), 0);
    assert_eq!(session.status().text, STATUS_NO_FILES);
    assert_eq!(session.status().tone, StatusTone::Warning);
    assert!(session.items().is_empty());
    assert!(session.is_complete());
    assert!(session.wait_until_complete(Duration::from_millis(10)));
}

#[test]
fn reopening_drops_the_previous_batch() {
    let tmp = tempdir().unwrap();
    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    fs::create_dir_all(&first).unwrap();
    fs::create_dir_all(&second).unwrap();
    for i in 0..24 {
        write_exr(&first.join(format!("big_{i:02}.exr")), 256, 128, &["B", "G", "R"]);
    }
    for i in 0..3 {
        write_exr(&second.join(format!("small_{i}.exr")), 4, 4, &["Y"]);
    }

    let mut session = threaded(2);
    session.open_folder(&first).unwrap();
    let old = session.generation();
    session.open_folder(&second).unwrap();
    assert_ne!(session.generation(), old);

    assert!(session.wait_until_complete(WAIT));
    assert_eq!(session.total(), 3);
    assert_eq!(session.completed(), 3);
    assert!(session.items().iter().all(|i| i.path.starts_with(&second)));
    assert!(session.items().iter().all(|i| i.meta().map(|m| m.channels) == Some(1)));

    // Late reports from the first folder, if any slip through, are refused.
    std::thread::sleep(Duration::from_millis(200));
    while let Some(report) = session.pool().try_next() {
        assert_eq!(report.generation, old);
        assert!(!session.apply(report));
    }
    assert_eq!(session.completed(), 3);
    assert_eq!(session.status().text, "✓ Loaded 3 HDRI files");
}

#[test]
fn mixed_folder_reports_failures_per_card() {
    let dir = tempdir().unwrap();
    write_exr(&dir.path().join("a.exr"), 32, 16, &["A", "Y"]);
    fs::write(dir.path().join("b.hdr"), b"#?RADIANCE\nthis is broken").unwrap();

    let mut session = threaded(2);
    assert_eq!(session.open_folder(dir.path()).unwrap(), 2);
    assert!(session.wait_until_complete(WAIT));

    let a = session.item(&dir.path().join("a.exr")).unwrap();
    assert_eq!(a.caption(), "32×16 · 2ch");
    assert_eq!(a.placeholder(), None);
    let preview = a.preview().unwrap();
    assert_eq!(preview.bitmap.channels(), 1);
    assert_eq!(preview.bitmap.dimensions(), (220, 110));

    let b = session.item(&dir.path().join("b.hdr")).unwrap();
    assert!(matches!(b.state, ItemState::Failed(_)));
    assert_eq!(b.placeholder(), Some(FAILED_MARKER));
    assert!(b.caption().chars().count() <= 30);

    assert_eq!(session.status().text, "✓ Loaded 2 HDRI files");
}

#[test]
fn inline_mode_behaves_like_threaded() {
    let dir = tempdir().unwrap();
    write_exr(&dir.path().join("one.exr"), 8, 8, &["B", "G", "R"]);

    let mut session = BrowseSession::new(WorkerPool::inline(), SessionOptions::default());
    assert_eq!(session.open_folder(dir.path()).unwrap(), 1);
    // Decoded during submit, but not applied until pumped.
    assert_eq!(session.completed(), 0);
    assert_eq!(session.pump(), 1);
    assert!(session.is_complete());
    assert_eq!(session.status().text, "✓ Loaded 1 HDRI file");
}

#[test]
fn clear_resets_everything() {
    let dir = tempdir().unwrap();
    write_exr(&dir.path().join("one.exr"), 8, 8, &["Y"]);

    let mut session = threaded(1);
    session.open_folder(dir.path()).unwrap();
    let before = session.generation();
    session.clear();
    assert!(session.generation() > before);
    assert_eq!(session.generation(), Generation(before.0 + 1));
    assert!(session.items().is_empty());
    assert_eq!(session.folder(), None);
    assert_eq!(session.total(), 0);
    assert_eq!(session.completed(), 0);
    assert_eq!(session.status().tone, StatusTone::Idle);
}
