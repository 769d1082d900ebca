//! Container events.
//!
//! Listeners are told about every committed change to the wiring.

use std::sync::Arc;

use crate::resource::Resource;
use crate::wiring::WiringDelta;

/// Container event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Resolved,
    Unresolved,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Resolved => "resolved",
            EventType::Unresolved => "unresolved",
        }
    }
}

/// A committed change to the wiring
#[derive(Debug, Clone)]
pub enum ContainerEvent {
    /// Resources newly resolved by a resolve call, with their wires
    Resolved { delta: WiringDelta },
    /// Resources whose wiring was removed
    Unresolved { resources: Vec<Arc<Resource>> },
}

impl ContainerEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            ContainerEvent::Resolved { .. } => EventType::Resolved,
            ContainerEvent::Unresolved { .. } => EventType::Unresolved,
        }
    }

    /// Resources affected by the event
    pub fn resources(&self) -> Vec<Arc<Resource>> {
        match self {
            ContainerEvent::Resolved { delta } => delta.resources().cloned().collect(),
            ContainerEvent::Unresolved { resources } => resources.clone(),
        }
    }
}

/// Trait for event listeners.
///
/// Listeners run on the thread that made the change, after the new wiring
/// is visible, while the container still holds its writer lock. They must
/// not call back into operations that change the container.
pub trait ContainerListener: Send + Sync {
    fn handle(&self, event: &ContainerEvent);
}

impl<F> ContainerListener for F
where
    F: Fn(&ContainerEvent) + Send + Sync,
{
    fn handle(&self, event: &ContainerEvent) {
        self(event)
    }
}

/// Dispatches events to listeners in registration order
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Vec<Arc<dyn ContainerListener>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ContainerListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn dispatch(&self, event: &ContainerEvent) {
        log::debug!(
            "Dispatching {} event for {} resource(s) to {} listener(s)",
            event.event_type().as_str(),
            event.resources().len(),
            self.listeners.len()
        );
        for listener in &self.listeners {
            listener.handle(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_event_types() {
        let event = ContainerEvent::Unresolved { resources: Vec::new() };
        assert_eq!(event.event_type(), EventType::Unresolved);
        assert_eq!(event.event_type().as_str(), "unresolved");
        assert_eq!(
            ContainerEvent::Resolved {
                delta: WiringDelta::new()
            }
            .event_type(),
            EventType::Resolved
        );
    }

    #[test]
    fn test_dispatch_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for i in 0..3 {
            let seen = seen.clone();
            dispatcher.add_listener(Arc::new(move |event: &ContainerEvent| {
                seen.lock().unwrap().push(format!("{}:{}", i, event.event_type().as_str()));
            }));
        }

        dispatcher.dispatch(&ContainerEvent::Unresolved { resources: Vec::new() });
        assert_eq!(dispatcher.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec!["0:unresolved", "1:unresolved", "2:unresolved"]);
    }
}
