#![doc = r"Interruptible fiber-based reconciliation engine.

Given a declarative [`Element`] tree, a [`Renderer`] builds and maintains a
matching tree of host nodes behind the [`HostTree`] port, re-rendering only
what changed. Render-phase work is split into per-fiber units and driven by
an external deadline so a host scheduler can interleave it with
higher-priority work; the commit phase applies all host mutations for a
completed pass in one uninterruptible step."]

pub mod element;
pub mod host;
pub mod platform;
pub mod runtime;

mod fiber;
mod hooks;

pub use element::{
    create_element, create_text_element, ComponentFn, Element, ElementKind, PropValue, Props,
    NODE_VALUE,
};
pub use hooks::{DepValue, HookError, Setter};
pub use host::{Event, EventHandler, HostError, HostTree, MemoryHost, NodeHandle};
pub use platform::{Deadline, WorkScheduler};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;
use std::thread_local;

use element::style_text;
use fiber::{EffectTag, Fiber, FiberArena, FiberId, FiberKind};
use hooks::{EffectHook, Hook, StateCell, StateHook};

/// Yield once the deadline reports less than this many milliseconds left.
const YIELD_BUDGET_MS: f64 = 1.0;

thread_local! {
    static CURRENT_ENGINE: RefCell<Vec<*mut ()>> = RefCell::new(Vec::new());
}

fn with_current_engine<R>(f: impl FnOnce(&mut Engine) -> R) -> Option<R> {
    CURRENT_ENGINE.with(|stack| {
        let ptr = *stack.borrow().last()?;
        let engine = unsafe { &mut *(ptr as *mut Engine) };
        Some(f(engine))
    })
}

/// Returns the current state for this hook slot and a setter that queues
/// functional updates and schedules a re-render.
///
/// May only be called from within a component function's synchronous
/// execution; anywhere else it panics with a [`HookError`].
pub fn use_state<T: Clone + 'static>(initial: T) -> (T, Setter<T>) {
    with_current_engine(|engine| engine.use_state(initial))
        .unwrap_or_else(|| panic!("{}", HookError::OutsideComponent))
}

/// Registers an effect to run after the upcoming commit, gated on `deps`:
/// the effect runs when `deps` is `None`, on the slot's first render, or
/// when any dependency differs element-wise from the previous render.
pub fn use_effect(effect: impl FnOnce() + 'static, deps: Option<Vec<DepValue>>) {
    with_current_engine(|engine| engine.use_effect(Box::new(effect), deps))
        .unwrap_or_else(|| panic!("{}", HookError::OutsideComponent))
}

/// Render-pass state shared by the scheduler, reconciler, and hook store.
///
/// Exactly one committed ("current") tree exists at a time, and at most one
/// work-in-progress tree rooted at `wip_root`. Starting a new pass while a
/// previous one is still pending overwrites the pending root: the
/// partially built tree is abandoned, not merged, and reclaimed by the
/// arena sweep after the next commit.
struct Engine {
    fibers: FiberArena,
    runtime: Runtime,
    current_root: Option<FiberId>,
    wip_root: Option<FiberId>,
    next_unit: Option<FiberId>,
    deletions: Vec<FiberId>,
    wip_fiber: Option<FiberId>,
    hook_index: usize,
    pending_effects: Vec<Box<dyn FnOnce()>>,
}

impl Engine {
    fn new(runtime: Runtime) -> Self {
        Self {
            fibers: FiberArena::new(),
            runtime,
            current_root: None,
            wip_root: None,
            next_unit: None,
            deletions: Vec::new(),
            wip_fiber: None,
            hook_index: 0,
            pending_effects: Vec::new(),
        }
    }

    fn begin_pass(&mut self, root: Fiber) {
        let id = self.fibers.alloc(root);
        self.wip_root = Some(id);
        self.next_unit = Some(id);
        self.deletions.clear();
        self.pending_effects.clear();
        self.runtime.request_work_slot();
    }

    /// Starts a fresh pass targeting `container`, discarding any pass
    /// still in flight.
    fn begin_pass_from_element(&mut self, element: Element, container: NodeHandle) {
        // A full pass re-evaluates everything, so it subsumes any pending
        // setter-requested re-render.
        self.runtime.take_render_request();
        let mut props = Props::new();
        props.children = vec![element];
        let mut root = Fiber::new(FiberKind::Root, props);
        root.node = Some(container);
        root.alternate = self.current_root;
        self.begin_pass(root);
    }

    /// Starts a pass that re-renders the committed tree in place, aliasing
    /// the current root's node and props.
    fn begin_pass_from_current(&mut self) {
        let Some(current) = self.current_root else {
            return;
        };
        let mut root = Fiber::new(FiberKind::Root, self.fibers[current].props.clone());
        root.node = self.fibers[current].node;
        root.alternate = Some(current);
        self.begin_pass(root);
    }

    /// Pre-order successor: child first, then sibling, then the nearest
    /// ancestor's sibling. `None` once the walk returns past the root.
    fn next_after(&self, unit: FiberId) -> Option<FiberId> {
        if let Some(child) = self.fibers[unit].child {
            return Some(child);
        }
        let mut cursor = Some(unit);
        while let Some(id) = cursor {
            if let Some(sibling) = self.fibers[id].sibling {
                return Some(sibling);
            }
            cursor = self.fibers[id].parent;
        }
        None
    }

    /// Positional diff of `wip`'s new child elements against the alternate
    /// fiber's recorded children. No keys, no move detection: old fibers
    /// are consumed index-by-index alongside the new elements.
    fn reconcile_children(&mut self, wip: FiberId, elements: Vec<Element>) {
        let mut index = 0;
        let mut old_fiber = self.fibers[wip]
            .alternate
            .and_then(|alt| self.fibers[alt].child);
        let mut prev_sibling: Option<FiberId> = None;

        while index < elements.len() || old_fiber.is_some() {
            let element = elements.get(index);
            let matched = match (old_fiber, element) {
                (Some(old), Some(el)) if self.fibers[old].kind.same_type(&el.kind) => {
                    Some((old, el))
                }
                _ => None,
            };

            let new_fiber = if let Some((old, el)) = matched {
                // Same type at this position: keep the host node, take the
                // new props, remember the old fiber for commit-time diffing.
                let mut fiber = Fiber::new(self.fibers[old].kind.clone(), el.props.clone());
                fiber.node = self.fibers[old].node;
                fiber.parent = Some(wip);
                fiber.alternate = Some(old);
                fiber.effect_tag = Some(EffectTag::Update);
                Some(self.fibers.alloc(fiber))
            } else if let Some(el) = element {
                let mut fiber = Fiber::new(FiberKind::of_element(&el.kind), el.props.clone());
                fiber.parent = Some(wip);
                fiber.effect_tag = Some(EffectTag::Placement);
                Some(self.fibers.alloc(fiber))
            } else {
                None
            };

            if matched.is_none() {
                if let Some(old) = old_fiber {
                    self.fibers[old].effect_tag = Some(EffectTag::Deletion);
                    self.deletions.push(old);
                }
            }

            if let Some(old) = old_fiber {
                old_fiber = self.fibers[old].sibling;
            }

            if index == 0 {
                self.fibers[wip].child = new_fiber;
            } else if let Some(prev) = prev_sibling {
                self.fibers[prev].sibling = new_fiber;
            }
            if new_fiber.is_some() {
                prev_sibling = new_fiber;
            }
            index += 1;
        }
    }

    /// Nearest ancestor-owned host node; component fibers own none and are
    /// skipped. The root fiber always owns the container, so the walk
    /// terminates.
    fn host_parent_of(&self, fiber: FiberId) -> NodeHandle {
        let mut cursor = self.fibers[fiber].parent;
        while let Some(id) = cursor {
            if let Some(node) = self.fibers[id].node {
                return node;
            }
            cursor = self.fibers[id].parent;
        }
        panic!("fiber {fiber:?} has no host-owning ancestor");
    }

    fn use_state<T: Clone + 'static>(&mut self, initial: T) -> (T, Setter<T>) {
        let fiber = match self.wip_fiber {
            Some(fiber) => fiber,
            None => panic!("{}", HookError::OutsideComponent),
        };
        let index = self.hook_index;
        self.hook_index += 1;

        let old_cell: Option<Rc<StateCell<T>>> = self.fibers[fiber]
            .alternate
            .and_then(|alt| self.fibers[alt].hooks.get(index))
            .map(|hook| match hook {
                Hook::State(state) => state
                    .cell
                    .clone()
                    .downcast::<StateCell<T>>()
                    .unwrap_or_else(|_| panic!("{}", HookError::StateTypeMismatch { index })),
                Hook::Effect(_) => panic!("{}", HookError::KindMismatch { index }),
            });

        // Fold updates queued since the last render, oldest first. The old
        // queue is left intact: it dies with the old tree at the next
        // sweep, and an abandoned pass that restarts must see it again.
        let resolved = match &old_cell {
            Some(cell) => {
                let mut value = cell.value.clone();
                for updater in cell.queue.borrow().iter() {
                    value = updater(&value);
                }
                value
            }
            None => initial,
        };

        let cell = Rc::new(StateCell {
            value: resolved.clone(),
            queue: RefCell::new(Vec::new()),
        });
        self.fibers[fiber].hooks.push(Hook::State(StateHook {
            cell: cell.clone(),
        }));
        let setter = Setter {
            cell,
            runtime: self.runtime.handle(),
        };
        (resolved, setter)
    }

    fn use_effect(&mut self, effect: Box<dyn FnOnce()>, deps: Option<Vec<DepValue>>) {
        let fiber = match self.wip_fiber {
            Some(fiber) => fiber,
            None => panic!("{}", HookError::OutsideComponent),
        };
        let index = self.hook_index;
        self.hook_index += 1;

        let previous: Option<Option<Vec<DepValue>>> = self.fibers[fiber]
            .alternate
            .and_then(|alt| self.fibers[alt].hooks.get(index))
            .map(|hook| match hook {
                Hook::Effect(effect) => effect.deps.clone(),
                Hook::State(_) => panic!("{}", HookError::KindMismatch { index }),
            });

        let changed = match (&previous, &deps) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(old), Some(new)) => old.as_ref() != Some(new),
        };

        self.fibers[fiber]
            .hooks
            .push(Hook::Effect(EffectHook { deps }));
        if changed {
            self.pending_effects.push(effect);
        }
    }

    fn assert_hook_alignment(&self, fiber: FiberId) {
        if let Some(alt) = self.fibers[fiber].alternate {
            let previous = self.fibers[alt].hooks.len();
            let current = self.fibers[fiber].hooks.len();
            if previous != current {
                panic!("{}", HookError::CountMismatch { previous, current });
            }
        }
    }
}

/// Runs a component function with the engine installed for hook access.
fn evaluate_component(engine: &mut Engine, func: ComponentFn, props: &Props) -> Element {
    CURRENT_ENGINE.with(|stack| {
        stack
            .borrow_mut()
            .push(engine as *mut Engine as *mut ())
    });
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            CURRENT_ENGINE.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
    let guard = Guard;
    let child = func(props);
    drop(guard);
    child
}

fn event_name(attr: &str) -> Option<String> {
    attr.strip_prefix("on").map(str::to_lowercase)
}

/// The reconciliation engine bound to one host tree.
///
/// Drives render passes in deadline-bounded work slots and commits each
/// completed pass to the host. The analog of the external idle-callback
/// loop: call [`Renderer::work_slot`] whenever the [`WorkScheduler`] port
/// was asked for a slot (or simply while [`Renderer::has_pending_work`]).
pub struct Renderer<H: HostTree> {
    engine: Engine,
    host: H,
}

impl<H: HostTree> Renderer<H> {
    pub fn new(host: H) -> Self {
        Self::with_runtime(host, Runtime::new(Arc::new(DefaultScheduler)))
    }

    pub fn with_runtime(host: H, runtime: Runtime) -> Self {
        Self {
            engine: Engine::new(runtime),
            host,
        }
    }

    /// Begins a fresh render pass of `element` into `container`. Calling
    /// this while a previous pass is unfinished abandons that pass.
    pub fn render(&mut self, element: Element, container: NodeHandle) {
        self.engine.begin_pass_from_element(element, container);
    }

    /// Performs render-phase units until the deadline is spent, commits if
    /// the pass completed, and re-requests a work slot.
    ///
    /// Errors from host mutations and panics from component evaluation
    /// propagate to the caller; the engine attempts no recovery.
    pub fn work_slot(&mut self, deadline: &mut dyn Deadline) -> Result<(), HostError> {
        if self.engine.current_root.is_some() && self.engine.runtime.take_render_request() {
            self.engine.begin_pass_from_current();
        }

        let mut should_yield = false;
        while !should_yield {
            let Some(unit) = self.engine.next_unit else {
                break;
            };
            self.engine.next_unit = self.perform_unit(unit)?;
            should_yield = deadline.time_remaining() < YIELD_BUDGET_MS;
        }

        if self.engine.next_unit.is_none() && self.engine.wip_root.is_some() {
            self.commit_root()?;
        }

        // Persistent loop: always ask for the next slot.
        self.engine.runtime.request_work_slot();
        Ok(())
    }

    pub fn has_pending_work(&self) -> bool {
        self.engine.next_unit.is_some()
            || self.engine.wip_root.is_some()
            || (self.engine.current_root.is_some() && self.engine.runtime.render_requested())
    }

    pub fn runtime(&self) -> &Runtime {
        &self.engine.runtime
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.engine.runtime.handle()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Number of live fibers across the current and in-progress trees.
    pub fn live_fibers(&self) -> usize {
        self.engine.fibers.len()
    }

    fn perform_unit(&mut self, unit: FiberId) -> Result<Option<FiberId>, HostError> {
        let kind = self.engine.fibers[unit].kind.clone();
        match kind {
            FiberKind::Component(func) => self.update_component(unit, func),
            _ => self.update_host_fiber(unit)?,
        }
        Ok(self.engine.next_after(unit))
    }

    fn update_component(&mut self, unit: FiberId, func: ComponentFn) {
        self.engine.wip_fiber = Some(unit);
        self.engine.hook_index = 0;
        self.engine.fibers[unit].hooks.clear();
        let props = self.engine.fibers[unit].props.clone();
        let child = evaluate_component(&mut self.engine, func, &props);
        self.engine.assert_hook_alignment(unit);
        self.engine.wip_fiber = None;
        self.engine.reconcile_children(unit, vec![child]);
    }

    fn update_host_fiber(&mut self, unit: FiberId) -> Result<(), HostError> {
        if self.engine.fibers[unit].node.is_none() {
            let kind = self.engine.fibers[unit].kind.clone();
            let node = match kind {
                FiberKind::Text => self.host.create_text_node()?,
                FiberKind::Host(tag) => self.host.create_node(&tag)?,
                FiberKind::Root | FiberKind::Component(_) => {
                    unreachable!("root and component fibers never create host nodes")
                }
            };
            let props = self.engine.fibers[unit].props.clone();
            self.apply_props(node, None, &props)?;
            self.engine.fibers[unit].node = Some(node);
        }
        let children = self.engine.fibers[unit].props.children.clone();
        self.engine.reconcile_children(unit, children);
        Ok(())
    }

    /// Uninterruptible commit of the finished pass: deletions first, then
    /// one depth-first mutation walk, then effects, with the finished tree
    /// published as current in between.
    fn commit_root(&mut self) -> Result<(), HostError> {
        let deletions = mem::take(&mut self.engine.deletions);
        for fiber in deletions {
            let parent = self.engine.host_parent_of(fiber);
            self.commit_deletion(fiber, parent)?;
        }

        let Some(wip) = self.engine.wip_root.take() else {
            return Ok(());
        };
        if let Some(child) = self.engine.fibers[wip].child {
            self.commit_work(child)?;
        }
        self.engine.current_root = Some(wip);
        self.engine.fibers.sweep(wip);

        let effects = mem::take(&mut self.engine.pending_effects);
        for effect in effects {
            effect();
        }
        Ok(())
    }

    fn commit_work(&mut self, fiber: FiberId) -> Result<(), HostError> {
        let parent_node = self.engine.host_parent_of(fiber);
        let node = self.engine.fibers[fiber].node;
        match self.engine.fibers[fiber].effect_tag {
            Some(EffectTag::Placement) => {
                if let Some(node) = node {
                    self.host.append_child(parent_node, node)?;
                }
            }
            Some(EffectTag::Update) => {
                if let Some(node) = node {
                    let prev = self.engine.fibers[fiber]
                        .alternate
                        .map(|alt| self.engine.fibers[alt].props.clone());
                    let next = self.engine.fibers[fiber].props.clone();
                    self.apply_props(node, prev.as_ref(), &next)?;
                }
            }
            // Deletions were handled in the first sub-pass and are not
            // linked into the new tree.
            Some(EffectTag::Deletion) | None => {}
        }
        if let Some(child) = self.engine.fibers[fiber].child {
            self.commit_work(child)?;
        }
        if let Some(sibling) = self.engine.fibers[fiber].sibling {
            self.commit_work(sibling)?;
        }
        Ok(())
    }

    /// Removes the deleted fiber's nearest owned host node, walking down
    /// through component fibers that own none.
    fn commit_deletion(&mut self, fiber: FiberId, parent: NodeHandle) -> Result<(), HostError> {
        let mut cursor = fiber;
        loop {
            if let Some(node) = self.engine.fibers[cursor].node {
                return self.host.remove_child(parent, node);
            }
            match self.engine.fibers[cursor].child {
                Some(child) => cursor = child,
                None => return Ok(()),
            }
        }
    }

    /// Applies the property delta between `prev` and `next` to `node`:
    /// removals for vanished attributes and stale listeners, writes for
    /// new or changed values, listener re-registration on handler change.
    fn apply_props(
        &mut self,
        node: NodeHandle,
        prev: Option<&Props>,
        next: &Props,
    ) -> Result<(), HostError> {
        if let Some(prev) = prev {
            for (name, value) in prev.attrs() {
                let gone_or_changed = next.get(name).map_or(true, |new| new != value);
                if !gone_or_changed {
                    continue;
                }
                match (value, event_name(name)) {
                    (PropValue::Handler(handler), Some(event)) => {
                        self.host.remove_event_listener(node, &event, handler)?;
                    }
                    _ => {
                        if !next.contains(name) {
                            self.host.remove_attribute(node, name)?;
                        }
                    }
                }
            }
        }
        for (name, value) in next.attrs() {
            let changed = prev
                .and_then(|prev| prev.get(name))
                .map_or(true, |old| old != value);
            if !changed {
                continue;
            }
            match (value, event_name(name)) {
                (PropValue::Handler(handler), Some(event)) => {
                    self.host.add_event_listener(node, &event, handler.clone())?;
                }
                (PropValue::Handler(_), None) => {}
                (PropValue::Style(style), _) => {
                    self.host.set_attribute(node, name, &style_text(style))?;
                }
                (value, _) => {
                    if let Some(text) = value.host_text() {
                        self.host.set_attribute(node, name, &text)?;
                    }
                }
            }
        }
        Ok(())
    }
}
