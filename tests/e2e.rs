//! End-to-end scenarios for the `memarena` arena allocator.
//!
//! Covers the concrete walkthroughs an allocator like this one is judged
//! by: create-then-persist, simple allocate/write/read, free-list split
//! and consume policies, growth, and coalescing.

use memarena::{Arena, ArenaConfig, Error};
use tempfile::NamedTempFile;

fn temp_path() -> std::path::PathBuf {
    let tmp = NamedTempFile::new().expect("failed to create temp file");
    let path = tmp.path().to_path_buf();
    std::fs::remove_file(&path).expect("failed to remove placeholder temp file");
    path
}

mod lifecycle_e2e {
    use super::*;

    #[test]
    fn create_and_persist_across_reopen() {
        let path = temp_path();

        {
            let arena = Arena::open(&path, 64).expect("open failed");
            let stats = arena.stats().expect("stats failed");
            assert_eq!(stats.file_size, 4096);
            assert_eq!(stats.allocated, 32);
            assert_eq!(stats.free_list_head, 0);
        }

        let arena = Arena::open(&path, 64).expect("reopen failed");
        let stats = arena.stats().expect("stats failed");
        assert_eq!(stats.file_size, 4096);
        assert_eq!(stats.allocated, 32);
        assert_eq!(stats.free_list_head, 0);
    }

    #[test]
    fn persistence_after_sync_and_close() {
        let path = temp_path();

        let (offset, payload) = {
            let mut arena = Arena::open(&path, 4096).expect("open failed");
            let offset = arena.alloc(32).expect("alloc failed");
            let payload = b"durable-bytes-here".to_vec();
            arena.write(offset, &payload).expect("write failed");
            arena.sync().expect("sync failed");
            arena.close().expect("close failed");
            (offset, payload)
        };

        let arena = Arena::open(&path, 4096).expect("reopen failed");
        assert_eq!(arena.read(offset, payload.len() as u64).unwrap(), payload);
    }

    #[test]
    fn reopening_a_foreign_file_is_bad_format() {
        let path = temp_path();
        std::fs::write(&path, b"not a memarena file at all, just text").unwrap();
        let err = Arena::open(&path, 4096).unwrap_err();
        assert!(matches!(err, Error::BadFormat));
    }
}

mod allocation_e2e {
    use super::*;

    #[test]
    fn simple_allocate_write_read() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let p = arena.alloc(100).unwrap();
        assert_eq!(p, 40); // header 32 + alloc header 8

        arena.write(p, b"hello").unwrap();
        assert_eq!(arena.read(p, 5).unwrap(), b"hello");

        let stats = arena.stats().unwrap();
        assert_eq!(stats.allocated, 32 + 112);
    }

    #[test]
    fn split_on_free_list_reuse() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let a = arena.alloc(100).unwrap(); // block size 112
        let _b = arena.alloc(8).unwrap(); // block size 16
        arena.free(a).unwrap();

        assert_eq!(arena.stats().unwrap().free_list_head, 32);

        let c = arena.alloc(16).unwrap(); // total 24, splits the freed 112-byte block
        assert_eq!(c, 40);

        // Free nodes aren't part of the public API, so this asserts on the
        // externally observable split behavior instead: the remainder (88
        // bytes after the 24-byte carve) should satisfy a same-size
        // allocation at the same offset it was freed from.
        arena.free(c).unwrap();
        let reused = arena.alloc(8).unwrap();
        assert_eq!(reused, c);
    }

    #[test]
    fn consume_on_small_remainder() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let a = arena.alloc(100).unwrap(); // block 112
        arena.free(a).unwrap();

        let d = arena.alloc(96).unwrap(); // total 104, remainder 8 < 24: consume whole block
        assert_eq!(d, 40);
        assert_eq!(arena.stats().unwrap().free_list_head, 0);
    }

    #[test]
    fn reuse_after_free_returns_the_same_offset() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let p = arena.alloc(100).unwrap(); // block size 112
        arena.free(p).unwrap();
        let p2 = arena.alloc(104).unwrap(); // total rounds to 112: exact reuse
        assert_eq!(p, p2);
    }

    #[test]
    fn zero_offset_free_is_a_no_op() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();
        let before = arena.stats().unwrap();
        arena.free(0).unwrap();
        assert_eq!(arena.stats().unwrap(), before);
    }
}

mod growth_e2e {
    use super::*;

    #[test]
    fn growth_preserves_previously_returned_offsets() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 4096).unwrap();
        assert_eq!(arena.stats().unwrap().file_size, 4096);

        let mut offsets = Vec::new();
        loop {
            let before = arena.stats().unwrap().file_size;
            let p = arena.alloc(1000).unwrap();
            assert_ne!(p, 0, "allocation should not fail with ample disk space");
            offsets.push(p);
            if arena.stats().unwrap().file_size > before {
                break;
            }
            assert!(offsets.len() < 100, "expected growth well before 100 allocations");
        }

        assert!(arena.stats().unwrap().file_size >= 8192);

        for (i, &p) in offsets.iter().enumerate() {
            arena.write(p, &(i as u32).to_le_bytes()).unwrap();
        }
        for (i, &p) in offsets.iter().enumerate() {
            assert_eq!(arena.read(p, 4).unwrap(), (i as u32).to_le_bytes());
        }
    }

    #[test]
    fn read_write_bounds_are_enforced() {
        let path = temp_path();
        let arena = Arena::open(&path, 4096).unwrap();
        let mapped_size = arena.stats().unwrap().file_size;

        assert!(matches!(arena.read(mapped_size - 3, 8), Err(Error::OutOfBounds)));
        assert!(arena.read(mapped_size - 8, 8).is_ok());
        assert!(matches!(arena.read(0, 1), Err(Error::OutOfBounds)));
    }
}

mod coalesce_e2e {
    use super::*;

    #[test]
    fn coalesce_merges_three_adjacent_blocks() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let a = arena.alloc(100).unwrap();
        let b = arena.alloc(100).unwrap();
        let c = arena.alloc(100).unwrap();

        arena.free(b).unwrap();
        arena.free(a).unwrap();
        arena.free(c).unwrap();

        arena.coalesce().unwrap();

        let stats = arena.stats().unwrap();
        assert_eq!(stats.free_list_head, 32);

        // The merged block should be large enough to serve a single
        // allocation spanning all three original blocks.
        let reused = arena.alloc(320).unwrap();
        assert_eq!(reused, 40);
    }

    #[test]
    fn coalesce_twice_is_idempotent() {
        let path = temp_path();
        let mut arena = Arena::open(&path, 64).unwrap();

        let a = arena.alloc(100).unwrap();
        let b = arena.alloc(100).unwrap();
        arena.free(a).unwrap();
        arena.free(b).unwrap();

        arena.coalesce().unwrap();
        let after_first = arena.stats().unwrap();
        arena.coalesce().unwrap();
        let after_second = arena.stats().unwrap();

        assert_eq!(after_first, after_second);
    }
}

mod config_e2e {
    use super::*;

    #[test]
    fn custom_growth_factor_is_honored() {
        let path = temp_path();
        let config = ArenaConfig {
            growth_factor: 4,
            min_growth: 0,
            ..ArenaConfig::default()
        };
        let mut arena = Arena::open_with_config(&path, 4096, config).unwrap();

        let before = arena.stats().unwrap().file_size;
        // Force a grow by requesting more than remains in the current mapping.
        loop {
            let p = arena.alloc(1000).unwrap();
            assert_ne!(p, 0);
            if arena.stats().unwrap().file_size > before {
                break;
            }
        }

        assert_eq!(arena.stats().unwrap().file_size, before * 4);
    }

    #[test]
    fn create_if_missing_false_fails_cleanly() {
        let path = temp_path();
        let config = ArenaConfig {
            create_if_missing: false,
            ..ArenaConfig::default()
        };
        let err = Arena::open_with_config(&path, 4096, config).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
    }
}

mod lock_e2e {
    use super::*;

    #[test]
    fn shared_then_exclusive_then_unlock_round_trips() {
        let path = temp_path();
        let arena = Arena::open(&path, 4096).unwrap();

        arena.lock_shared().unwrap();
        arena.unlock().unwrap();
        arena.lock_exclusive().unwrap();
        arena.unlock().unwrap();
    }
}
