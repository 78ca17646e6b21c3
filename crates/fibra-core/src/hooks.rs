//! Hook records: per-component, positionally indexed state and effect
//! slots, carried across renders through the fiber's alternate link.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::runtime::RuntimeHandle;

/// One hook slot of a component fiber. Slot identity is positional: the
/// record at index `i` must correspond to the same call-site on every
/// render of that fiber.
pub(crate) enum Hook {
    State(StateHook),
    Effect(EffectHook),
}

pub(crate) struct StateHook {
    /// Type-erased `Rc<StateCell<T>>`.
    pub(crate) cell: Rc<dyn Any>,
}

pub(crate) struct EffectHook {
    pub(crate) deps: Option<Vec<DepValue>>,
}

type Updater<T> = Box<dyn Fn(&T) -> T>;

/// State storage shared between a hook record and the setters handed out
/// for it. The queue is only appended to by setters and only read by the
/// next render's fold; it is never cleared in place, so a render pass that
/// gets abandoned and restarted folds the full set of pending updates
/// again from the unchanged base value.
pub(crate) struct StateCell<T> {
    pub(crate) value: T,
    pub(crate) queue: RefCell<Vec<Updater<T>>>,
}

/// Updates one `use_state` slot.
///
/// Calling [`Setter::set`] enqueues the updater on the hook's queue and
/// unconditionally requests a fresh root-level render pass; the updater
/// runs when that pass re-evaluates the owning component.
pub struct Setter<T> {
    pub(crate) cell: Rc<StateCell<T>>,
    pub(crate) runtime: RuntimeHandle,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T: 'static> Setter<T> {
    pub fn set(&self, updater: impl Fn(&T) -> T + 'static) {
        self.cell.queue.borrow_mut().push(Box::new(updater));
        self.runtime.request_render();
    }
}

impl<T: Clone + 'static> Setter<T> {
    /// Replaces the state with a fixed value.
    pub fn assign(&self, value: T) {
        self.set(move |_| value.clone());
    }
}

/// A single effect dependency, compared element-wise by value between
/// consecutive renders.
#[derive(Clone, Debug, PartialEq)]
pub enum DepValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl From<i32> for DepValue {
    fn from(value: i32) -> Self {
        DepValue::Int(value as i64)
    }
}

impl From<i64> for DepValue {
    fn from(value: i64) -> Self {
        DepValue::Int(value)
    }
}

impl From<usize> for DepValue {
    fn from(value: usize) -> Self {
        DepValue::Int(value as i64)
    }
}

impl From<f64> for DepValue {
    fn from(value: f64) -> Self {
        DepValue::Float(value)
    }
}

impl From<bool> for DepValue {
    fn from(value: bool) -> Self {
        DepValue::Bool(value)
    }
}

impl From<&str> for DepValue {
    fn from(value: &str) -> Self {
        DepValue::Text(value.to_owned())
    }
}

impl From<String> for DepValue {
    fn from(value: String) -> Self {
        DepValue::Text(value)
    }
}

/// Builds the dependency list for [`crate::use_effect`]. `deps![]` gates
/// the effect to run exactly once; omitting deps (`None`) makes it run on
/// every render.
#[macro_export]
macro_rules! deps {
    () => {
        Some(Vec::new())
    };
    ($($dep:expr),+ $(,)?) => {
        Some(vec![$($crate::DepValue::from($dep)),+])
    };
}

/// Structural misuse of the hook store. These are programming errors, so
/// they are raised as panics rather than recoverable results: silently
/// misattributing state to the wrong slot would be far worse than failing
/// the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    OutsideComponent,
    KindMismatch { index: usize },
    StateTypeMismatch { index: usize },
    CountMismatch { previous: usize, current: usize },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookError::OutsideComponent => {
                write!(f, "hook called outside of a component evaluation")
            }
            HookError::KindMismatch { index } => {
                write!(f, "hook order changed between renders: slot {index} changed kind")
            }
            HookError::StateTypeMismatch { index } => {
                write!(
                    f,
                    "hook order changed between renders: state slot {index} changed type"
                )
            }
            HookError::CountMismatch { previous, current } => {
                write!(
                    f,
                    "hook count changed between renders: previous render registered \
                     {previous} hooks, this render registered {current}"
                )
            }
        }
    }
}

impl std::error::Error for HookError {}
