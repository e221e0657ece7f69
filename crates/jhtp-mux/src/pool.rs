use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool for concurrent handler dispatch.
///
/// Bounds thread creation under high message rates: jobs queue on a
/// channel and a fixed set of threads drains them. Workers exit when the
/// channel closes and are joined on drop.
pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn a pool of `size` workers (at least one).
    pub fn new(size: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let workers = (0..size.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || worker_loop(&receiver))
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    /// Schedule a job onto the pool.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            // Workers outlive the sender, so this only fails during drop.
            let _ = sender.send(Box::new(job));
        }
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(receiver: &Mutex<mpsc::Receiver<Job>>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn executes_all_jobs() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = WorkerPool::new(4);
        for _ in 0..64 {
            let counter = Arc::clone(&counter);
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        drop(pool); // joins the workers
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn at_least_one_worker() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn slow_jobs_run_in_parallel() {
        let pool = WorkerPool::new(4);
        let started = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let started = Arc::clone(&started);
            pool.execute(move || {
                started.fetch_add(1, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(100));
            });
        }
        // All four jobs should be in flight well before one finishes.
        thread::sleep(Duration::from_millis(60));
        assert_eq!(started.load(Ordering::SeqCst), 4);
        drop(pool);
    }
}
