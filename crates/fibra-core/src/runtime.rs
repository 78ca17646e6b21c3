//! Runtime plumbing between state setters, the renderer, and the
//! scheduling port.
//!
//! A [`Runtime`] owns the pluggable [`WorkScheduler`] plus two flags: the
//! pending root re-render request raised by state setters, and the
//! work-slot request the engine re-arms after every slot. [`RuntimeHandle`]
//! is the weak, cloneable face of it that setters and drivers hold.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::WorkScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn WorkScheduler>,
    render_requested: Cell<bool>,
    slot_requested: Cell<bool>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            scheduler,
            render_requested: Cell::new(false),
            slot_requested: Cell::new(false),
        }
    }

    fn request_render(&self) {
        self.render_requested.set(true);
        self.request_work_slot();
    }

    fn request_work_slot(&self) {
        self.slot_requested.set(true);
        self.scheduler.request_work_slot();
    }
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn WorkScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn render_requested(&self) -> bool {
        self.inner.render_requested.get()
    }

    /// Consumes the pending re-render request, if any.
    pub(crate) fn take_render_request(&self) -> bool {
        self.inner.render_requested.replace(false)
    }

    pub(crate) fn request_work_slot(&self) {
        self.inner.request_work_slot();
    }

    /// Consumes the pending work-slot request, if any. Drivers poll this
    /// to decide whether the engine asked to be called again.
    pub fn take_slot_request(&self) -> bool {
        self.inner.slot_requested.replace(false)
    }
}

#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn request_render(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_render();
        }
    }

    pub fn request_work_slot(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.request_work_slot();
        }
    }

    pub fn render_requested(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.render_requested.get())
            .unwrap_or(false)
    }
}

/// Scheduler that records nothing; suitable when a driver polls the
/// renderer directly.
#[derive(Default)]
pub struct DefaultScheduler;

impl WorkScheduler for DefaultScheduler {
    fn request_work_slot(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScheduler(AtomicUsize);

    impl WorkScheduler for CountingScheduler {
        fn request_work_slot(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn render_requests_reach_the_scheduler_and_latch() {
        let scheduler = Arc::new(CountingScheduler::default());
        let runtime = Runtime::new(scheduler.clone());
        let handle = runtime.handle();

        assert!(!runtime.render_requested());
        handle.request_render();
        assert!(runtime.render_requested());
        assert!(runtime.take_slot_request());
        assert_eq!(scheduler.0.load(Ordering::SeqCst), 1);

        assert!(runtime.take_render_request());
        assert!(!runtime.render_requested());
        assert!(!runtime.take_render_request());
    }

    #[test]
    fn handles_outlive_the_runtime_harmlessly() {
        let scheduler = Arc::new(CountingScheduler::default());
        let handle = {
            let runtime = Runtime::new(scheduler.clone());
            runtime.handle()
        };
        handle.request_render();
        handle.request_work_slot();
        assert!(!handle.render_requested());
        assert_eq!(scheduler.0.load(Ordering::SeqCst), 0);
    }
}
