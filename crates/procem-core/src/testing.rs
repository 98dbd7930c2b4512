//! In-memory engine and bus used by the unit tests.
use std::{
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    bus::{MessageBus, PublishError},
    engine::{ContainerEngine, CreateUnit, EngineError, RunningUnit, UnitHandle},
};

/// Engine call as recorded by [`FakeEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create(String),
    Attach(String, String),
    Start(String),
    Stop(String),
    Remove(String),
    Close,
}

#[derive(Default)]
struct EngineState {
    /// Created units, started or not.
    units: Vec<(UnitHandle, bool)>,
    requests: Vec<CreateUnit>,
    calls: Vec<Call>,
}

/// Engine double: units become "running" on start; calls are recorded in order.
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
    next_id: AtomicUsize,
    fail_create: Mutex<Option<String>>,
    fail_start: Mutex<Option<String>>,
    fail_stop: Mutex<Option<String>>,
    stall: Mutex<Option<Duration>>,
    stall_after_create: Mutex<Option<(String, Duration)>>,
    closed: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend a foreign unit is already running.
    pub fn add_running(&self, name: &str) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = UnitHandle {
            id: format!("id-{id}"),
            name: name.to_string(),
        };
        self.lock().units.push((handle, true));
    }

    /// Fail the create of any unit whose name ends with `suffix`.
    pub fn fail_create_of(&self, suffix: &str) {
        *lock(&self.fail_create) = Some(suffix.to_string());
    }

    pub fn fail_start_of(&self, suffix: &str) {
        *lock(&self.fail_start) = Some(suffix.to_string());
    }

    pub fn fail_stop_of(&self, suffix: &str) {
        *lock(&self.fail_stop) = Some(suffix.to_string());
    }

    /// Register the unit matching `suffix`, then hang for `delay` before answering.
    pub fn stall_after_create_of(&self, suffix: &str, delay: Duration) {
        *lock(&self.stall_after_create) = Some((suffix.to_string(), delay));
    }

    /// Make every create hang for `delay`.
    pub fn stall_creates(&self, delay: Duration) {
        *lock(&self.stall) = Some(delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn requests(&self) -> Vec<CreateUnit> {
        self.lock().requests.clone()
    }

    pub fn running(&self) -> Vec<String> {
        self.lock()
            .units
            .iter()
            .filter(|(_, running)| *running)
            .map(|(h, _)| h.name.clone())
            .collect()
    }

    pub fn existing(&self) -> Vec<String> {
        self.lock().units.iter().map(|(h, _)| h.name.clone()).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        lock(&self.state)
    }

    fn record(&self, call: Call) {
        self.lock().calls.push(call);
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn matches(rule: &Mutex<Option<String>>, name: &str) -> bool {
    lock(rule).as_deref().is_some_and(|suffix| name.ends_with(suffix))
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn list_running(&self) -> Result<Vec<RunningUnit>, EngineError> {
        self.record(Call::List);
        let running = self
            .lock()
            .units
            .iter()
            .filter(|(_, running)| *running)
            .map(|(h, _)| RunningUnit {
                id: h.id.clone(),
                name: h.name.clone(),
            })
            .collect();
        // let a concurrent caller interleave here
        tokio::task::yield_now().await;
        Ok(running)
    }

    async fn create(&self, request: &CreateUnit) -> Result<UnitHandle, EngineError> {
        self.record(Call::Create(request.name.clone()));
        let stall = *lock(&self.stall);
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        tokio::task::yield_now().await;
        if matches(&self.fail_create, &request.name) {
            return Err(EngineError::Rejected(format!("create of {} refused", request.name)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = UnitHandle {
            id: format!("id-{id}"),
            name: request.name.clone(),
        };
        {
            let mut state = self.lock();
            state.units.retain(|(h, _)| h.name != request.name);
            state.units.push((handle.clone(), false));
            state.requests.push(request.clone());
        }
        let late = lock(&self.stall_after_create)
            .as_ref()
            .filter(|(suffix, _)| request.name.ends_with(suffix.as_str()))
            .map(|(_, delay)| *delay);
        if let Some(delay) = late {
            tokio::time::sleep(delay).await;
        }
        Ok(handle)
    }

    async fn attach_network(&self, unit: &str, network: &str) -> Result<(), EngineError> {
        self.record(Call::Attach(unit.to_string(), network.to_string()));
        Ok(())
    }

    async fn start(&self, unit: &UnitHandle) -> Result<(), EngineError> {
        self.record(Call::Start(unit.name.clone()));
        if matches(&self.fail_start, &unit.name) {
            return Err(EngineError::Rejected(format!("start of {} refused", unit.name)));
        }
        let mut state = self.lock();
        match state.units.iter_mut().find(|(h, _)| h.id == unit.id) {
            Some((_, running)) => {
                *running = true;
                Ok(())
            }
            None => Err(EngineError::NotFound(unit.name.clone())),
        }
    }

    async fn stop(&self, unit: &str) -> Result<(), EngineError> {
        self.record(Call::Stop(unit.to_string()));
        if matches(&self.fail_stop, unit) {
            return Err(EngineError::Rejected(format!("stop of {unit} refused")));
        }
        let mut state = self.lock();
        if let Some((_, running)) = state.units.iter_mut().find(|(h, _)| h.name == unit) {
            *running = false;
        }
        Ok(())
    }

    async fn remove(&self, unit: &str) -> Result<(), EngineError> {
        self.record(Call::Remove(unit.to_string()));
        self.lock().units.retain(|(h, _)| h.name != unit);
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(Call::Close);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Bus double recording every publish.
#[derive(Default)]
pub struct FakeBus {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    fail: AtomicBool,
    closes: AtomicUsize,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let bus = Self::default();
        bus.fail.store(true, Ordering::SeqCst);
        bus
    }

    pub fn published(&self) -> Vec<(String, serde_json::Value)> {
        lock(&self.published)
            .iter()
            .map(|(topic, payload)| {
                let value = serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null);
                (topic.clone(), value)
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for FakeBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PublishError::Transport("broker unreachable".into()));
        }
        lock(&self.published).push((topic.to_string(), payload));
        Ok(())
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
