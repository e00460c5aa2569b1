use kernel_alloc::TokenPool;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn concurrent_acquire_never_hands_out_a_token_twice() {
    let threads = 8;
    let capacity = 1_024;
    let pool = Arc::new(TokenPool::new("ids", capacity));
    let start = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut mine = Vec::new();
                while let Some(token) = pool.acquire() {
                    mine.push(token);
                    thread::yield_now();
                }
                mine
            })
        })
        .collect();

    let mut all: Vec<usize> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..capacity).collect::<Vec<_>>());
    assert_eq!(pool.available(), 0);
}

#[test]
fn released_tokens_return_from_any_thread() {
    let pool = Arc::new(TokenPool::new("frames", 4));
    let held: Vec<usize> = (0..4).map(|_| pool.acquire().unwrap()).collect();

    let releaser = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || {
            for token in held {
                pool.release(token);
            }
        })
    };
    releaser.join().unwrap();

    assert_eq!(pool.available(), 4);
    assert!(!pool.is_held(2));
}
