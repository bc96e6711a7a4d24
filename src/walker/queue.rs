//! Bounded task queue with outstanding-work tracking
//!
//! Besides the FIFO itself, the queue counts *outstanding* tasks: every
//! enqueue adds one, and the worker that finishes a task removes one with
//! [`TaskQueue::mark_complete`]. Workers enqueue children before completing
//! the parent, so the count only reaches zero once nothing is queued and no
//! worker is mid-task. That is the crawl's termination signal.
//!
//! One mutex guards the state, with three condition variables:
//! space available (producers), task available (consumers) and all done
//! (the coordinator).

use crate::error::QueueError;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Statistics for the task queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Total tasks dequeued
    pub dequeued: AtomicU64,

    /// Times a producer blocked on a full queue
    pub producer_waits: AtomicU64,
}

impl QueueStats {
    /// Get queue throughput (dequeued tasks)
    pub fn throughput(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    /// Get producer wait count
    pub fn wait_count(&self) -> u64 {
        self.producer_waits.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    outstanding: usize,
}

/// Blocking FIFO shared by the coordinator and all workers
#[derive(Debug)]
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    space_available: Condvar,
    task_available: Condvar,
    all_done: Condvar,
    capacity: usize,
    stats: QueueStats,
}

impl<T> TaskQueue<T> {
    /// Create a queue holding at most `capacity` tasks
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                outstanding: 0,
            }),
            space_available: Condvar::new(),
            task_available: Condvar::new(),
            all_done: Condvar::new(),
            capacity,
            stats: QueueStats::default(),
        })
    }

    /// Create a queue whose producers never block
    pub fn unbounded() -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                outstanding: 0,
            }),
            space_available: Condvar::new(),
            task_available: Condvar::new(),
            all_done: Condvar::new(),
            capacity: usize::MAX,
            stats: QueueStats::default(),
        }
    }

    /// Append a task, blocking while the queue is full
    pub fn enqueue(&self, task: T) {
        let mut state = self.state.lock();
        if state.items.len() >= self.capacity {
            self.stats.producer_waits.fetch_add(1, Ordering::Relaxed);
            while state.items.len() >= self.capacity {
                self.space_available.wait(&mut state);
            }
        }
        state.items.push_back(task);
        state.outstanding += 1;
        drop(state);

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        self.task_available.notify_all();
    }

    /// Take the oldest task, blocking while the queue is empty
    pub fn dequeue(&self) -> T {
        let mut state = self.state.lock();
        loop {
            if let Some(task) = state.items.pop_front() {
                drop(state);
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                self.space_available.notify_all();
                return task;
            }
            self.task_available.wait(&mut state);
        }
    }

    /// Take the oldest task if there is one
    pub fn try_dequeue(&self) -> Option<T> {
        let task = self.state.lock().items.pop_front()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        self.space_available.notify_all();
        Some(task)
    }

    /// Record that a dequeued task has finished, including enqueuing its
    /// children.
    pub fn mark_complete(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.outstanding > 0, "mark_complete without a task");
        state.outstanding = state.outstanding.saturating_sub(1);
        if state.outstanding == 0 {
            self.all_done.notify_all();
        }
    }

    /// Block until nothing is queued or in flight
    pub fn wait_all_done(&self) {
        let mut state = self.state.lock();
        while state.outstanding > 0 || !state.items.is_empty() {
            self.all_done.wait(&mut state);
        }
    }

    /// Like [`wait_all_done`](Self::wait_all_done), giving up after
    /// `timeout`. Returns whether all work is done.
    pub fn wait_all_done_for(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if state.outstanding > 0 || !state.items.is_empty() {
            self.all_done.wait_for(&mut state, timeout);
        }
        state.outstanding == 0 && state.items.is_empty()
    }

    /// Tasks physically queued
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks queued or being executed
    pub fn outstanding(&self) -> usize {
        self.state.lock().outstanding
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_bounded(&self) -> bool {
        self.capacity != usize::MAX
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    /// Tear down the queue.
    ///
    /// Fails if tasks are still queued or another handle is alive; in
    /// either case this handle is released without draining anything.
    pub fn destroy(self: Arc<Self>) -> Result<(), QueueError> {
        let pending = self.len();
        if pending > 0 {
            return Err(QueueError::Busy { pending });
        }
        match Arc::try_unwrap(self) {
            Ok(_) => Ok(()),
            Err(shared) => Err(QueueError::StillShared {
                holders: Arc::strong_count(&shared),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::thread;

    #[test]
    fn test_queue_fifo() {
        let queue = TaskQueue::new(10).unwrap();
        queue.enqueue("/a");
        queue.enqueue("/b");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.outstanding(), 2);

        assert_eq!(queue.dequeue(), "/a");
        assert_eq!(queue.try_dequeue(), Some("/b"));
        assert_eq!(queue.try_dequeue(), None);
        assert_eq!(queue.outstanding(), 2);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(
            TaskQueue::<u32>::new(0).unwrap_err(),
            QueueError::ZeroCapacity
        );
        assert!(!TaskQueue::<u32>::unbounded().is_bounded());
    }

    #[test]
    fn test_full_queue_blocks_until_dequeue() {
        let queue = Arc::new(TaskQueue::new(2).unwrap());
        queue.enqueue(1);
        queue.enqueue(2);

        let (tx, rx) = bounded(1);
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.enqueue(3);
                tx.send(()).unwrap();
            })
        };

        // Producer must still be blocked
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(queue.len(), 2);

        // One dequeue lets exactly that producer through
        assert_eq!(queue.dequeue(), 1);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().wait_count(), 1);
        assert_eq!(queue.dequeue(), 2);
        assert_eq!(queue.dequeue(), 3);
    }

    #[test]
    fn test_one_dequeue_releases_one_producer() {
        let queue = Arc::new(TaskQueue::new(1).unwrap());
        queue.enqueue(0u32);

        let (tx, rx) = bounded(3);
        let producers: Vec<_> = (1..=3)
            .map(|n| {
                let queue = Arc::clone(&queue);
                let tx = tx.clone();
                thread::spawn(move || {
                    queue.enqueue(n);
                    tx.send(n).unwrap();
                })
            })
            .collect();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while queue.stats().wait_count() < 3 {
            assert!(std::time::Instant::now() < deadline, "producers never blocked");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        assert_eq!(queue.dequeue(), 0);
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.outstanding(), 2);

        // Release the rest one at a time
        assert_eq!(queue.dequeue(), first);
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue(), second);
        let third = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(queue.dequeue(), third);

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_outstanding_covers_children() {
        let queue = TaskQueue::new(16).unwrap();
        queue.enqueue(0u32);
        let parent = queue.dequeue();
        assert_eq!(parent, 0);

        // Parent in flight: nothing queued, work outstanding
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.outstanding(), 1);
        assert!(!queue.wait_all_done_for(Duration::from_millis(10)));

        for child in 1..=3 {
            queue.enqueue(child);
            assert!(queue.outstanding() >= queue.len());
        }
        queue.mark_complete();
        assert_eq!(queue.outstanding(), 3);

        while let Some(_child) = queue.try_dequeue() {
            queue.mark_complete();
        }
        assert_eq!(queue.outstanding(), 0);
        assert!(queue.wait_all_done_for(Duration::from_millis(10)));
        queue.wait_all_done();
    }

    #[test]
    fn test_wait_all_done_wakes_on_completion() {
        let queue = Arc::new(TaskQueue::new(4).unwrap());
        queue.enqueue("task");

        let worker = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let _task = queue.dequeue();
                thread::sleep(Duration::from_millis(20));
                queue.mark_complete();
            })
        };

        queue.wait_all_done();
        assert_eq!(queue.outstanding(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_destroy() {
        let queue = Arc::new(TaskQueue::new(4).unwrap());
        queue.enqueue(1);
        assert_eq!(
            Arc::clone(&queue).destroy(),
            Err(QueueError::Busy { pending: 1 })
        );

        queue.dequeue();
        let other = Arc::clone(&queue);
        assert_eq!(
            Arc::clone(&queue).destroy(),
            Err(QueueError::StillShared { holders: 3 })
        );
        drop(other);
        assert_eq!(queue.destroy(), Ok(()));
    }

    #[test]
    fn test_queue_stats() {
        let queue = TaskQueue::unbounded();
        queue.enqueue('a');
        queue.enqueue('b');
        queue.dequeue();
        queue.dequeue();

        let stats = queue.stats();
        assert_eq!(stats.enqueued.load(Ordering::Relaxed), 2);
        assert_eq!(stats.throughput(), 2);
        assert_eq!(stats.wait_count(), 0);
    }
}
