//! Platform abstraction traits for the engine's scheduling services.
//!
//! The engine makes no assumption about the host runtime's timing
//! mechanism beyond these two ports: a way to ask for a future work slot,
//! and a monotonically decreasing remaining-budget signal inside one.

/// Requests work slots from the host runtime.
///
/// The engine re-registers itself through this port after every slot it is
/// given; it is a persistent process, not a one-shot callback. Drivers are
/// free to coalesce requests and to stop polling while the renderer
/// reports no pending work.
pub trait WorkScheduler: Send + Sync {
    fn request_work_slot(&self);
}

/// Remaining-budget signal for one work slot.
pub trait Deadline {
    /// Milliseconds of budget left in this slot.
    fn time_remaining(&self) -> f64;

    /// Whether the host granted this slot because a timeout forced it
    /// rather than because it was idle.
    fn did_timeout(&self) -> bool {
        false
    }
}
