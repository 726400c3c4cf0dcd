//! # Events
//!
//! Double-buffered typed message queues.
//!
//! An event written during frame N can be read during frames N and N+1 and
//! is dropped by the end-of-frame [`Events::update`] of frame N+1. Readers
//! keep their own cursor, so every reader observes each event at most once.

/// Marker trait for event types.
pub trait Event: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Event for T {}

#[derive(Debug)]
struct EventInstance<E> {
    id: usize,
    event: E,
}

/// Storage for one event type. Lives in the world as a resource.
#[derive(Debug)]
pub struct Events<E: Event> {
    previous: Vec<EventInstance<E>>,
    current: Vec<EventInstance<E>>,
    next_id: usize,
}

impl<E: Event> Default for Events<E> {
    fn default() -> Self {
        Self {
            previous: Vec::new(),
            current: Vec::new(),
            next_id: 0,
        }
    }
}

impl<E: Event> Events<E> {
    /// Queues an event for readers.
    pub fn send(&mut self, event: E) {
        let id = self.next_id;
        self.next_id += 1;
        self.current.push(EventInstance { id, event });
    }

    /// Queues every event of `events`.
    pub fn send_batch(&mut self, events: impl IntoIterator<Item = E>) {
        for event in events {
            self.send(event);
        }
    }

    /// Swaps buffers: drops the previous frame's events and ages the current ones.
    pub fn update(&mut self) {
        self.previous = std::mem::take(&mut self.current);
    }

    /// Drops every buffered event.
    pub fn clear(&mut self) {
        self.previous.clear();
        self.current.clear();
    }

    /// Number of buffered events across both buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.previous.len() + self.current.len()
    }

    /// Returns `true` when no event is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.previous.is_empty() && self.current.is_empty()
    }

    /// Id the next sent event will get.
    #[must_use]
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    /// Buffered events with id `>= cursor`, oldest first.
    pub fn since(&self, cursor: usize) -> impl Iterator<Item = &E> + '_ {
        self.previous
            .iter()
            .chain(self.current.iter())
            .filter(move |instance| instance.id >= cursor)
            .map(|instance| &instance.event)
    }

    /// Every buffered event, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.since(0)
    }
}

/// World-level hook: swaps the buffers of `Events<E>` if registered.
pub fn update_events<E: Event>(world: &mut super::World) {
    if let Some(events) = world.get_resource_mut::<Events<E>>() {
        events.update();
    }
}
