//! Coarse timer thread for deferred and repeating work
//!
//! The engine schedules everything that is not sample-accurate here:
//! isochronic pulse cycles, deferred fade-in starts during transitions, and
//! delayed voice release after fade-outs. Tasks are owned handles that can be
//! cancelled at any time; a cancelled task never fires again. Granularity is
//! milliseconds — callbacks capture the sample-accurate device clock
//! themselves when they fire.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

type Job = Box<dyn FnMut() + Send + 'static>;

struct Task {
    next_due: Instant,
    period: Option<Duration>,
    job: Job,
    cancelled: Arc<AtomicBool>,
}

struct SchedulerShared {
    tasks: Mutex<Vec<Task>>,
    should_stop: AtomicBool,
}

/// Cancellation handle for a scheduled task.
#[derive(Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Cloneable scheduling endpoint, usable from inside running tasks.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<SchedulerShared>,
}

impl SchedulerHandle {
    /// Run `job` once after `delay`.
    pub fn schedule_once(
        &self,
        delay: Duration,
        job: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        let mut job = Some(job);
        self.push(delay, None, Box::new(move || {
            if let Some(job) = job.take() {
                job();
            }
        }))
    }

    /// Run `job` every `period`, starting one period from now.
    pub fn schedule_repeating(
        &self,
        period: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        self.push(period, Some(period), Box::new(job))
    }

    fn push(&self, delay: Duration, period: Option<Duration>, job: Job) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle {
            cancelled: Arc::clone(&cancelled),
        };
        self.shared.tasks.lock().push(Task {
            next_due: Instant::now() + delay,
            period,
            job,
            cancelled,
        });
        handle
    }
}

/// Owns the timer thread; joins it on drop.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl Scheduler {
    pub fn new() -> Self {
        let shared = Arc::new(SchedulerShared {
            tasks: Mutex::new(Vec::new()),
            should_stop: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);
        let thread_handle = thread::spawn(move || {
            timer_thread(shared_clone);
        });

        Self {
            shared,
            thread_handle: Some(thread_handle),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn schedule_once(
        &self,
        delay: Duration,
        job: impl FnOnce() + Send + 'static,
    ) -> TaskHandle {
        self.handle().schedule_once(delay, job)
    }

    pub fn schedule_repeating(
        &self,
        period: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        self.handle().schedule_repeating(period, job)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shared.should_stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Timer thread function
fn timer_thread(shared: Arc<SchedulerShared>) {
    // Short tick while work is queued, longer when idle to save CPU.
    let active_tick = Duration::from_millis(1);
    let idle_tick = Duration::from_millis(20);

    loop {
        if shared.should_stop.load(Ordering::SeqCst) {
            break;
        }

        let has_tasks = !shared.tasks.lock().is_empty();
        thread::sleep(if has_tasks { active_tick } else { idle_tick });

        let now = Instant::now();

        // Pull due tasks out, then run them without holding the lock so
        // jobs can schedule further tasks.
        let mut due = Vec::new();
        {
            let mut tasks = shared.tasks.lock();
            tasks.retain(|t| !t.cancelled.load(Ordering::SeqCst));
            let mut i = 0;
            while i < tasks.len() {
                if tasks[i].next_due <= now {
                    due.push(tasks.swap_remove(i));
                } else {
                    i += 1;
                }
            }
        }

        for mut task in due {
            if task.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            (task.job)();
            if let Some(period) = task.period {
                task.next_due = now + period;
                shared.tasks.lock().push(task);
            }
        }
    }
}
