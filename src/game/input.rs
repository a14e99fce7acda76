//! Raw key/pointer/wheel events folded into queryable action state.
//!
//! Hosts push events into an [`EventHub`]. Each [`InputCollector`] attached
//! to the hub owns a [`Subscription`]; dropping the collector deregisters it,
//! so a torn-down scene never leaves a live listener behind.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

use crate::config::InputConfig;

/// Logical actions the character responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    MoveForward,
    MoveBack,
    MoveLeft,
    MoveRight,
    Jump,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::MoveForward,
        Action::MoveBack,
        Action::MoveLeft,
        Action::MoveRight,
        Action::Jump,
    ];
}

/// Raw host event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    KeyDown { key: String },
    KeyUp { key: String },
    PointerMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    /// Click in client coordinates
    Click { x: f32, y: f32 },
    /// The host dropped pointer capture on its own (e.g. browser UI)
    CaptureLost,
}

impl InputEvent {
    pub fn key_down(key: impl Into<String>) -> Self {
        InputEvent::KeyDown { key: key.into() }
    }

    pub fn key_up(key: impl Into<String>) -> Self {
        InputEvent::KeyUp { key: key.into() }
    }
}

/// Lowercases a key name and folds the spellings of the space bar together.
pub fn normalize_key(key: &str) -> String {
    let lower = key.to_lowercase();
    match lower.as_str() {
        " " | "space" | "spacebar" => "space".to_string(),
        _ => lower,
    }
}

/// Physical key name to action lookup.
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<String, Action>,
    jump_key: String,
}

impl KeyBindings {
    pub fn from_config(config: &InputConfig) -> Self {
        let mut map = HashMap::new();
        let groups: [(&[String], Action); 4] = [
            (&config.move_forward, Action::MoveForward),
            (&config.move_back, Action::MoveBack),
            (&config.move_left, Action::MoveLeft),
            (&config.move_right, Action::MoveRight),
        ];
        for (keys, action) in groups {
            for key in keys {
                map.insert(normalize_key(key), action);
            }
        }
        let jump_key = normalize_key(&config.jump);
        map.insert(jump_key.clone(), Action::Jump);
        Self { map, jump_key }
    }

    pub fn action_for(&self, key: &str) -> Option<Action> {
        self.map.get(&normalize_key(key)).copied()
    }

    pub fn jump_key(&self) -> &str {
        &self.jump_key
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::from_config(&InputConfig::default())
    }
}

/// Viewport rectangle in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Viewport {
    pub fn from_rect(rect: [f32; 4]) -> Self {
        Self {
            left: rect[0],
            top: rect[1],
            right: rect[2],
            bottom: rect[3],
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Fan-out point for raw host events.
pub struct EventHub {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, Sender<InputEvent>>>,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        })
    }

    /// Registers a listener. The returned guard deregisters it on drop.
    pub fn subscribe(self: &Arc<Self>) -> (Subscription, Receiver<InputEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(id, tx);
        debug!(target: "input", id, "listener registered");
        (
            Subscription {
                hub: Arc::downgrade(self),
                id,
            },
            rx,
        )
    }

    /// Delivers `event` to every listener, returning how many received it.
    pub fn dispatch(&self, event: InputEvent) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn unsubscribe(&self, id: u64) {
        if self.listeners.lock().remove(&id).is_some() {
            info!(target: "input", id, "listener deregistered");
        }
    }
}

/// Live registration on an [`EventHub`].
pub struct Subscription {
    hub: Weak<EventHub>,
    id: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}

/// Persistent action state built from raw events.
pub struct InputCollector {
    bindings: KeyBindings,
    viewport: Viewport,
    held: HashSet<String>,
    /// A jump press may only latch once per physical press
    jump_armed: bool,
    jump_latched: bool,
    pointer: (f32, f32),
    wheel: f32,
    captured: bool,
    inbox: Option<(Subscription, Receiver<InputEvent>)>,
}

impl InputCollector {
    /// Collector fed directly through [`InputCollector::handle_event`].
    pub fn new(config: &InputConfig) -> Self {
        Self {
            bindings: KeyBindings::from_config(config),
            viewport: Viewport::from_rect(config.viewport),
            held: HashSet::new(),
            jump_armed: true,
            jump_latched: false,
            pointer: (0.0, 0.0),
            wheel: 0.0,
            captured: false,
            inbox: None,
        }
    }

    /// Collector subscribed to `hub` for its whole lifetime.
    pub fn attach(hub: &Arc<EventHub>, config: &InputConfig) -> Self {
        let mut collector = Self::new(config);
        collector.inbox = Some(hub.subscribe());
        collector
    }

    /// Drops the hub subscription early. Further events must be fed directly.
    pub fn detach(&mut self) {
        self.inbox = None;
    }

    pub fn is_attached(&self) -> bool {
        self.inbox.is_some()
    }

    /// Applies every event queued by the hub since the last pump.
    pub fn pump(&mut self) -> usize {
        let pending: Vec<InputEvent> = match &self.inbox {
            Some((_, rx)) => rx.try_iter().collect(),
            None => return 0,
        };
        let count = pending.len();
        for event in pending {
            self.handle_event(event);
        }
        count
    }

    pub fn handle_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::KeyDown { key } => self.key_down(&key),
            InputEvent::KeyUp { key } => self.key_up(&key),
            InputEvent::PointerMove { dx, dy } => {
                if self.captured {
                    self.pointer.0 += dx;
                    self.pointer.1 += dy;
                }
            }
            InputEvent::Wheel { delta } => self.wheel += delta,
            InputEvent::Click { x, y } => {
                if self.viewport.contains(x, y) {
                    self.set_captured(!self.captured);
                }
            }
            InputEvent::CaptureLost => {
                if self.captured {
                    warn!(target: "input", "pointer capture lost outside the scene");
                }
                self.set_captured(false);
            }
        }
    }

    fn key_down(&mut self, key: &str) {
        let key = normalize_key(key);
        if key == self.bindings.jump_key() && self.jump_armed {
            self.jump_armed = false;
            self.jump_latched = true;
        }
        self.held.insert(key);
    }

    fn key_up(&mut self, key: &str) {
        let key = normalize_key(key);
        if key == self.bindings.jump_key() {
            self.jump_armed = true;
        }
        self.held.remove(&key);
    }

    fn set_captured(&mut self, captured: bool) {
        if self.captured != captured {
            info!(target: "input", captured, "pointer capture changed");
        }
        self.captured = captured;
        if !captured {
            self.pointer = (0.0, 0.0);
        }
    }

    /// Whether any key bound to `action` is held.
    pub fn is_action_active(&self, action: Action) -> bool {
        self.held
            .iter()
            .any(|key| self.bindings.action_for(key) == Some(action))
    }

    /// Consumes the latched jump press, if any. One physical press yields at
    /// most one request.
    pub fn take_jump_request(&mut self) -> bool {
        std::mem::take(&mut self.jump_latched)
    }

    pub fn jump_pending(&self) -> bool {
        self.jump_latched
    }

    /// Accumulated pointer movement this frame; zero while not captured.
    pub fn pointer_delta(&self) -> (f32, f32) {
        if self.captured {
            self.pointer
        } else {
            (0.0, 0.0)
        }
    }

    pub fn wheel_delta(&self) -> f32 {
        self.wheel
    }

    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Clears per-frame deltas. Held keys, the jump latch and capture persist.
    pub fn end_frame(&mut self) {
        self.pointer = (0.0, 0.0);
        self.wheel = 0.0;
    }

    /// Snapshot of every action's state.
    pub fn action_states(&self) -> HashMap<Action, bool> {
        Action::ALL
            .iter()
            .map(|&a| (a, self.is_action_active(a)))
            .collect()
    }
}
