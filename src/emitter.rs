//! Action emission
//!
//! The adapter's single output surface. Every decoded command becomes one
//! `UiAction`, published synchronously to all subscribers in call order
//! before the next command is decoded. No buffering and no reordering:
//! the emitted order is the decode order.

use crate::core::redraw::UiAction;

type ActionObserver = Box<dyn FnMut(&UiAction)>;
type ModeObserver = Box<dyn FnMut(&str)>;

/// Which observer list a subscription belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Actions,
    Modes,
}

/// Handle returned by registration; pass back to `unsubscribe` to cancel.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    channel: Channel,
}

/// Synchronous fan-out of UI actions and mode-change signals.
#[derive(Default)]
pub struct ActionEmitter {
    actions: Vec<(u64, ActionObserver)>,
    modes: Vec<(u64, ModeObserver)>,
    next_id: u64,
}

impl ActionEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action observer. Observers are invoked in registration
    /// order, synchronously, for every emitted action.
    pub fn subscribe_actions<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&UiAction) + 'static,
    {
        let id = self.next_sub_id();
        self.actions.push((id, Box::new(observer)));
        Subscription {
            id,
            channel: Channel::Actions,
        }
    }

    /// Register a mode-change observer for the side-channel signal raised
    /// by `mode_change` commands.
    pub fn subscribe_modes<F>(&mut self, observer: F) -> Subscription
    where
        F: FnMut(&str) + 'static,
    {
        let id = self.next_sub_id();
        self.modes.push((id, Box::new(observer)));
        Subscription {
            id,
            channel: Channel::Modes,
        }
    }

    /// Cancel a subscription. Unknown handles are ignored.
    pub fn unsubscribe(&mut self, subscription: Subscription) {
        match subscription.channel {
            Channel::Actions => self.actions.retain(|(id, _)| *id != subscription.id),
            Channel::Modes => self.modes.retain(|(id, _)| *id != subscription.id),
        }
    }

    /// Publish one action to every action observer, in order.
    pub fn emit(&mut self, action: &UiAction) {
        for (_, observer) in &mut self.actions {
            observer(action);
        }
    }

    /// Raise the mode-change signal.
    pub fn emit_mode(&mut self, mode: &str) {
        for (_, observer) in &mut self.modes {
            observer(mode);
        }
    }

    fn next_sub_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}
