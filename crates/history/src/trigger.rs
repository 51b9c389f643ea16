use std::fmt;

use crate::identity::Generation;

/// Identifies one sentinel attachment.
///
/// A key changes with every generation and every merged page, so visibility reports for a
/// sentinel that has since been replaced never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentinelKey {
    pub generation: Generation,
    pub page: u32,
}

impl fmt::Display for SentinelKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "loading-older-{}-{}", self.generation, self.page)
    }
}

/// "Becomes visible" event source the trigger subscribes the sentinel to.
pub trait VisibilitySource {
    fn subscribe(&mut self, key: SentinelKey);
    fn unsubscribe(&mut self, key: SentinelKey);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Disarmed,
    Suppressed,
}

/// One-shot request for the next older page.
///
/// Firing unsubscribes before anything else happens, so repeated visibility reports for the
/// same sentinel cannot issue a second request.
#[derive(Debug)]
pub struct LazyLoadTrigger {
    state: TriggerState,
    subscribed: Option<SentinelKey>,
}

impl Default for LazyLoadTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl LazyLoadTrigger {
    pub fn new() -> Self {
        Self {
            state: TriggerState::Suppressed,
            subscribed: None,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Sentinel currently watched for visibility.
    pub fn sentinel(&self) -> Option<SentinelKey> {
        self.subscribed
    }

    pub fn arm(&mut self, key: SentinelKey, source: &mut dyn VisibilitySource) {
        if self.state == TriggerState::Armed && self.subscribed == Some(key) {
            return;
        }

        self.release(source);
        source.subscribe(key);
        self.subscribed = Some(key);
        self.state = TriggerState::Armed;
    }

    /// Stops watching without firing, e.g. while a fetch issued elsewhere is in flight.
    pub fn disarm(&mut self, source: &mut dyn VisibilitySource) {
        self.release(source);
        self.state = TriggerState::Disarmed;
    }

    pub fn suppress(&mut self, source: &mut dyn VisibilitySource) {
        self.release(source);
        self.state = TriggerState::Suppressed;
    }

    /// Handles a visibility report; returns true exactly once per arming.
    pub fn fire(&mut self, key: SentinelKey, source: &mut dyn VisibilitySource) -> bool {
        if self.state != TriggerState::Armed || self.subscribed != Some(key) {
            return false;
        }

        self.release(source);
        self.state = TriggerState::Disarmed;
        true
    }

    fn release(&mut self, source: &mut dyn VisibilitySource) {
        if let Some(key) = self.subscribed.take() {
            source.unsubscribe(key);
        }
    }
}
