//! Concurrency and uniqueness guarantees of the sequence allocator

use fiscal_emission::document::DocumentModel;
use fiscal_emission::sequence::SequenceAllocator;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const CNPJ: &str = "39123456000195";

#[test]
fn concurrent_allocations_never_collide() {
    let dir = tempdir().unwrap();
    let db = sled::open(dir.path().join("seq_concurrent.db")).unwrap();
    let alloc = Arc::new(SequenceAllocator::open(&db).unwrap());

    const THREADS: usize = 8;
    const PER_THREAD: usize = 25;

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let alloc = Arc::clone(&alloc);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|_| alloc.next(CNPJ, DocumentModel::Nfce, 1).unwrap())
                    .collect::<Vec<u32>>()
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let numbers = handle.join().unwrap();
        // within one thread the numbers are strictly increasing
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        all.extend(numbers);
    }

    let total = THREADS * PER_THREAD;
    let distinct: HashSet<u32> = all.iter().copied().collect();
    assert_eq!(distinct.len(), total, "every allocation must be unique");
    assert_eq!(*all.iter().min().unwrap(), 1);
    assert_eq!(*all.iter().max().unwrap() as usize, total, "no gaps");
}

#[test]
fn aborted_requests_burn_their_numbers() {
    let dir = tempdir().unwrap();
    let db = sled::open(dir.path().join("seq_burn.db")).unwrap();
    let alloc = SequenceAllocator::open(&db).unwrap();

    let first = alloc.next(CNPJ, DocumentModel::Nfe, 1).unwrap();
    // caller aborts here; the slot stays consumed
    let second = alloc.next(CNPJ, DocumentModel::Nfe, 1).unwrap();
    assert_eq!(second, first + 1);
    assert_eq!(
        alloc.current(CNPJ, DocumentModel::Nfe, 1).unwrap(),
        Some(u64::from(second))
    );
}

#[test]
fn counters_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("seq_reopen.db");

    {
        let db = sled::open(&path).unwrap();
        let alloc = SequenceAllocator::open(&db).unwrap();
        assert_eq!(alloc.next(CNPJ, DocumentModel::Nfce, 3).unwrap(), 1);
        assert_eq!(alloc.next(CNPJ, DocumentModel::Nfce, 3).unwrap(), 2);
    }

    let db = sled::open(&path).unwrap();
    let alloc = SequenceAllocator::open(&db).unwrap();
    assert_eq!(alloc.next(CNPJ, DocumentModel::Nfce, 3).unwrap(), 3);
}

#[test]
fn different_issuers_do_not_share_counters() {
    let dir = tempdir().unwrap();
    let db = sled::open(dir.path().join("seq_issuers.db")).unwrap();
    let alloc = SequenceAllocator::open(&db).unwrap();

    assert_eq!(alloc.next("11111111000191", DocumentModel::Nfce, 1).unwrap(), 1);
    assert_eq!(alloc.next("22222222000191", DocumentModel::Nfce, 1).unwrap(), 1);
    assert_eq!(alloc.next("11111111000191", DocumentModel::Nfce, 1).unwrap(), 2);
}
