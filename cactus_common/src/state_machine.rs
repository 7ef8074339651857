use std::sync::{Mutex, MutexGuard, PoisonError};

/// A state wrapped in a mutex, changed only through closures that see the
/// current state.
///
/// A panic inside a transition poisons nothing: the next caller sees the
/// state as the panicking closure left it.
///
/// # Example
///
/// ```rust
/// use cactus_common::state_machine::StateMachine;
///
/// #[derive(Debug, Clone, PartialEq)]
/// enum Exchange {
///     AwaitingService,
///     Dispatched,
/// }
///
/// let machine = StateMachine::new(Exchange::AwaitingService);
/// let moved = machine.transition(|state| match state {
///     Exchange::AwaitingService => {
///         *state = Exchange::Dispatched;
///         true
///     }
///     Exchange::Dispatched => false,
/// });
/// assert!(moved);
/// assert_eq!(machine.current(), Exchange::Dispatched);
/// ```
#[derive(Debug, Default)]
pub struct StateMachine<S> {
    state: Mutex<S>,
}

impl<S> StateMachine<S> {
    pub fn new(initial_state: S) -> Self {
        Self {
            state: Mutex::new(initial_state),
        }
    }

    /// Direct access for reads that need no transition.
    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state with the lock held and returns its result.
    pub fn transition<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut state = self.lock();
        f(&mut state)
    }
}

impl<S: Clone> StateMachine<S> {
    /// Snapshot of the current state.
    pub fn current(&self) -> S {
        self.lock().clone()
    }
}
