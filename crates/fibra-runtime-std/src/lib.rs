//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the scheduling ports
//! defined in `fibra-core`: a wall-clock [`TimeSliceDeadline`], a
//! [`SignalScheduler`] that records slot requests for a polling loop, and
//! [`run_until_idle`], a synchronous driver that runs a renderer to
//! quiescence in fixed time slices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use fibra_core::{Deadline, HostError, HostTree, Renderer, WorkScheduler};

/// Scheduler that latches work-slot requests into a flag.
///
/// The engine may request slots from event handlers at any point; a driver
/// polls [`SignalScheduler::take`] between turns of its own loop and grants
/// one slot per observed request.
#[derive(Debug, Default)]
pub struct SignalScheduler {
    requested: AtomicBool,
}

impl SignalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the pending request, if any.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }
}

impl WorkScheduler for SignalScheduler {
    fn request_work_slot(&self) {
        self.requested.store(true, Ordering::Release);
    }
}

/// Deadline backed by [`std::time`]: a fixed budget counted down from the
/// moment the slot starts.
#[derive(Debug)]
pub struct TimeSliceDeadline {
    started: Instant,
    budget: Duration,
}

impl TimeSliceDeadline {
    pub fn new(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }
}

impl Deadline for TimeSliceDeadline {
    fn time_remaining(&self) -> f64 {
        self.budget
            .saturating_sub(self.started.elapsed())
            .as_secs_f64()
            * 1000.0
    }

    fn did_timeout(&self) -> bool {
        self.started.elapsed() >= self.budget
    }
}

/// Drives `renderer` until it reports no pending work, granting one
/// `slice`-long slot per turn.
///
/// Each dispatched event or state update after this returns requires
/// another call; interactive drivers call it once per loop iteration.
pub fn run_until_idle<H: HostTree>(
    renderer: &mut Renderer<H>,
    slice: Duration,
) -> Result<(), HostError> {
    let mut slots = 0usize;
    while renderer.has_pending_work() {
        let mut deadline = TimeSliceDeadline::new(slice);
        renderer.work_slot(&mut deadline)?;
        slots += 1;
    }
    log::trace!("renderer idle after {slots} work slots of {slice:?}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibra_core::{Element, MemoryHost, Runtime, NODE_VALUE};
    use std::sync::Arc;

    #[test]
    fn time_slice_counts_down_and_never_goes_negative() {
        let deadline = TimeSliceDeadline::new(Duration::from_millis(50));
        let first = deadline.time_remaining();
        assert!(first > 0.0 && first <= 50.0);
        assert!(!deadline.did_timeout());

        let spent = TimeSliceDeadline::new(Duration::ZERO);
        assert_eq!(spent.time_remaining(), 0.0);
        assert!(spent.did_timeout());
    }

    #[test]
    fn signal_scheduler_latches_requests() {
        let scheduler = Arc::new(SignalScheduler::new());
        let runtime = Runtime::new(scheduler.clone());
        let mut renderer = Renderer::with_runtime(MemoryHost::new(), runtime);
        assert!(!scheduler.take());

        let container = renderer.host_mut().create_root();
        renderer.render(Element::host("p").child("hi"), container);
        assert!(scheduler.take());
        assert!(!scheduler.take());
    }

    #[test]
    fn run_until_idle_commits_the_whole_tree() {
        let mut renderer = Renderer::new(MemoryHost::new());
        let container = renderer.host_mut().create_root();
        renderer.render(
            Element::host("div").child(Element::host("h1").child("Hello")),
            container,
        );
        run_until_idle(&mut renderer, Duration::from_millis(4)).unwrap();
        assert!(!renderer.has_pending_work());

        let host = renderer.host();
        let div = host.node(container).unwrap().children()[0];
        let h1 = host.node(div).unwrap().children()[0];
        let text = host.node(h1).unwrap().children()[0];
        assert_eq!(host.node(text).unwrap().attribute(NODE_VALUE), Some("Hello"));
    }
}
