use async_trait::async_trait;
use rs2_sequence::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source that takes a while to produce every item
struct SlowSource {
    items: VecDeque<u32>,
    delay: Duration,
}

impl SlowSource {
    fn new(items: impl IntoIterator<Item = u32>, delay: Duration) -> Self {
        Self {
            items: items.into_iter().collect(),
            delay,
        }
    }
}

#[async_trait]
impl Source for SlowSource {
    type Raw = u32;

    fn has_next(&self) -> bool {
        !self.items.is_empty()
    }

    async fn next(&mut self) -> Option<u32> {
        tokio::time::sleep(self.delay).await;
        self.items.pop_front()
    }
}

fn numbers(items: Vec<i32>) -> Sequence<IterSource<std::vec::IntoIter<i32>>, i32> {
    Sequence::from_source(IterSource::new(items))
}

#[tokio::test]
async fn test_second_terminal_operation_is_rejected() {
    let sequence = numbers(vec![1, 2, 3]);

    let first = sequence.take_all().join_async().unwrap();
    assert!(sequence.is_active());

    let second = sequence.take(1).join(|_| {});
    match second {
        Err(err) => assert!(err.is_concurrency_violation()),
        Ok(_) => panic!("expected a concurrency violation"),
    }

    // The running operation is unaffected
    assert_eq!(first.await.unwrap(), vec![1, 2, 3]);
    assert!(!sequence.is_active());
    assert_eq!(sequence.stats().violations, 1);
}

#[tokio::test]
async fn test_same_view_cannot_run_twice_at_once() {
    let sequence = numbers(vec![1, 2, 3]);
    let view = sequence.take_while(|x| *x < 3);

    let running = view.each_async(|_| {}).unwrap();
    let again = view.seek(|_| {});
    assert_eq!(
        again,
        Err(SequenceError::ConcurrencyViolation {
            label: "sequence".to_string()
        })
    );

    assert_eq!(running.await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_violation_does_not_disturb_installed_window() {
    let sequence = numbers(vec![1, 2, 3, 4, 5]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let running = sequence
        .take(4)
        .each_async(move |x| seen_clone.lock().unwrap().push(x))
        .unwrap();

    assert!(sequence.take_all().join(|_| {}).is_err());
    assert!(sequence.take(1).map(|x| x, |_| {}).is_err());

    assert_eq!(running.await.unwrap(), Some(5));
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
#[should_panic(expected = "ConcurrencyViolation")]
async fn test_panic_policy_is_fatal() {
    let config = SequenceConfig::new()
        .label("fatal")
        .violation_policy(ViolationPolicy::Panic);
    let sequence = Sequence::with_config(IterSource::new(vec![1, 2]), |x: i32| x, config);

    let _running = sequence.take_all().join_async().unwrap();
    let _ = sequence.take_all().join(|_| {});
}

#[tokio::test]
async fn test_slow_source_keeps_order() {
    let sequence = Sequence::from_source(SlowSource::new(1..=6, Duration::from_millis(5)));

    let head = sequence
        .take_while(|x| *x <= 2)
        .join_async()
        .unwrap()
        .await
        .unwrap();
    let middle = sequence.take(2).join_async().unwrap().await.unwrap();
    let tail = sequence.take_all().join_async().unwrap().await.unwrap();

    assert_eq!(head, vec![1, 2]);
    assert_eq!(middle, vec![3, 4]);
    assert_eq!(tail, vec![5, 6]);
}

#[tokio::test]
async fn test_sequence_is_active_while_source_is_slow() {
    let sequence = Sequence::from_source(SlowSource::new(0..3, Duration::from_millis(20)));

    let pending = sequence.take_all().join_async().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(sequence.is_active());

    assert_eq!(pending.await.unwrap(), vec![0, 1, 2]);
    assert!(!sequence.is_active());
}

#[tokio::test]
async fn test_other_tasks_run_between_items() {
    let sequence = numbers(vec![1, 2, 3]);
    let events = Arc::new(Mutex::new(Vec::new()));

    let events_clone = events.clone();
    let done = sequence
        .take_all()
        .each_async(move |x| events_clone.lock().unwrap().push(x.to_string()))
        .unwrap();

    let events_clone = events.clone();
    let other = tokio::spawn(async move {
        events_clone.lock().unwrap().push("other".to_string());
    });

    done.await.unwrap();
    other.await.unwrap();

    let events = events.lock().unwrap();
    let other_at = events.iter().position(|e| e == "other").unwrap();
    let last_at = events.iter().position(|e| e == "3").unwrap();
    assert!(other_at < last_at, "events: {:?}", *events);
}

#[tokio::test]
async fn test_long_sequence_does_not_grow_stack() {
    let sequence = Sequence::from_source(IterSource::new(0..200_000u32));

    let total = sequence
        .take_all()
        .map_async(|x| x as u64)
        .unwrap()
        .await
        .unwrap()
        .into_iter()
        .sum::<u64>();

    assert_eq!(total, (0..200_000u64).sum::<u64>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_windows_on_multi_thread_runtime() {
    let sequence = numbers((0..1000).collect());
    let mut chunks = Vec::new();

    loop {
        let chunk = sequence.take(100).join_async().unwrap().await.unwrap();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 10);
    let flattened: Vec<i32> = chunks.into_iter().flatten().collect();
    assert_eq!(flattened, (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_operations_outside_runtime_fail_cleanly() {
    let sequence = numbers(vec![1, 2]);

    assert_eq!(
        sequence.take_all().join(|_| {}),
        Err(SequenceError::NoRuntime)
    );
    assert!(!sequence.is_active());
    assert_eq!(sequence.peek(|_| {}), Err(SequenceError::NoRuntime));

    // A runtime can pick the sequence up afterwards
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(async {
        let all = sequence.take_all().join_async().unwrap().await.unwrap();
        assert_eq!(all, vec![1, 2]);
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_peek_then_each_keeps_the_whole_window() {
    for round in 0..300 {
        let sequence = numbers(vec![1, 2, 3]);
        assert_eq!(sequence.peek_async().unwrap().await.unwrap(), Some(1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let done = sequence
            .take_all()
            .each_async(move |x| {
                std::thread::sleep(Duration::from_millis(2));
                seen_clone.lock().unwrap().push(x);
            })
            .unwrap()
            .await;

        assert_eq!(done, Ok(None), "round {}", round);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3], "round {}", round);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_window_started_from_peek_callback() {
    for round in 0..300 {
        let sequence = Arc::new(numbers(vec![1, 2, 3]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = tokio::sync::oneshot::channel();

        let next = sequence.clone();
        let seen_clone = seen.clone();
        sequence
            .peek(move |peeked| {
                assert_eq!(peeked, Some(1));
                // The peeking step is still in flight when this window starts
                let pending = next
                    .take_all()
                    .each_async(move |x| {
                        std::thread::sleep(Duration::from_millis(1));
                        seen_clone.lock().unwrap().push(x);
                    })
                    .unwrap();
                tokio::spawn(async move {
                    let _ = tx.send(pending.await);
                });
            })
            .unwrap();

        assert_eq!(rx.await.unwrap(), Ok(None), "round {}", round);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3], "round {}", round);
        assert_eq!(sequence.stats().windows_completed, 1);
    }
}
