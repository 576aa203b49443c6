//! In-process component framework
//!
//! Components confirm state transitions from a spawned thread after a short
//! delay, the way a real framework calls back from its own threads.
//! Failures are scripted per component name.

use ilgraph_core::framework::{BUFFER_FLAG_EOS, COMMAND_STATE_SET};
use ilgraph_core::{
    BufferSupplier, ComponentFramework, ComponentHandle, ComponentParam, ComponentState,
    EventKind, EventSink, FrameworkError, PortIndex,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Framework call as recorded by the mock, with handles resolved to names
#[derive(Debug, Clone, PartialEq)]
pub enum FrameworkCall {
    Init,
    Deinit,
    Instantiate(String),
    Destroy(String),
    Transition(String, ComponentState),
    SetupTunnel(String, PortIndex, String, PortIndex),
    TeardownTunnel(String, String),
    Supplier(String, PortIndex, BufferSupplier),
    Parameter(String, ComponentParam),
}

#[derive(Default)]
struct MockState {
    next_handle: u64,
    components: HashMap<ComponentHandle, String>,
    sinks: HashMap<ComponentHandle, Arc<dyn EventSink>>,
    states: HashMap<ComponentHandle, ComponentState>,
    calls: Vec<FrameworkCall>,
    fail_instantiate: HashSet<String>,
    reject_transition: HashSet<String>,
    fail_tunnel_from: HashSet<String>,
    silent: HashSet<String>,
}

pub struct MockFramework {
    state: Mutex<MockState>,
    callback_delay: Duration,
}

impl MockFramework {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_handle: 0x100,
                ..Default::default()
            }),
            callback_delay: Duration::from_millis(5),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Make instantiation of `component` fail
    pub fn fail_instantiate(self, component: &str) -> Self {
        self.lock().fail_instantiate.insert(component.to_string());
        self
    }

    /// Make tunnel setup out of `component` fail
    pub fn fail_tunnel_from(self, component: &str) -> Self {
        self.lock().fail_tunnel_from.insert(component.to_string());
        self
    }

    /// Make transition requests to `component` fail synchronously
    pub fn reject_transitions(&self, component: &str) {
        self.lock().reject_transition.insert(component.to_string());
    }

    /// Accept transitions for `component` but never confirm them
    pub fn set_silent(&self, component: &str, silent: bool) {
        let mut state = self.lock();
        if silent {
            state.silent.insert(component.to_string());
        } else {
            state.silent.remove(component);
        }
    }

    pub fn calls(&self) -> Vec<FrameworkCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Components asked to move to `target`, in request order
    pub fn transitions_to(&self, target: ComponentState) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FrameworkCall::Transition(name, state) if state == target => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&FrameworkCall) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FrameworkCall::Destroy(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Parameters set on `component`, oldest first
    pub fn parameters(&self, component: &str) -> Vec<ComponentParam> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FrameworkCall::Parameter(name, param) if name == component => Some(param),
                _ => None,
            })
            .collect()
    }

    pub fn live_handles(&self) -> usize {
        self.lock().components.len()
    }

    pub fn handle_of(&self, component: &str) -> Option<ComponentHandle> {
        self.lock()
            .components
            .iter()
            .find(|(_, name)| name.as_str() == component)
            .map(|(handle, _)| *handle)
    }

    pub fn state_of(&self, component: &str) -> Option<ComponentState> {
        let handle = self.handle_of(component)?;
        self.lock().states.get(&handle).copied()
    }

    fn sink_of(&self, component: &str) -> (ComponentHandle, Arc<dyn EventSink>) {
        let handle = self.handle_of(component).expect("component not instantiated");
        let sink = Arc::clone(&self.lock().sinks[&handle]);
        (handle, sink)
    }

    /// Deliver end-of-stream from `component` on the calling thread
    pub fn emit_eos(&self, component: &str) {
        let (handle, sink) = self.sink_of(component);
        sink.on_event(handle, EventKind::BufferFlag, 0, BUFFER_FLAG_EOS, None);
    }

    /// Deliver an asynchronous error from `component` on the calling thread
    pub fn emit_error(&self, component: &str, code: u32) {
        let (handle, sink) = self.sink_of(component);
        sink.on_event(handle, EventKind::Error, code, 0, None);
    }

    fn name(&self, handle: ComponentHandle) -> String {
        self.lock()
            .components
            .get(&handle)
            .cloned()
            .unwrap_or_else(|| handle.to_string())
    }

    fn error(code: u32, message: &str) -> FrameworkError {
        FrameworkError::new(code, message)
    }
}

impl ComponentFramework for MockFramework {
    fn init(&self) -> Result<(), FrameworkError> {
        self.lock().calls.push(FrameworkCall::Init);
        Ok(())
    }

    fn deinit(&self) -> Result<(), FrameworkError> {
        self.lock().calls.push(FrameworkCall::Deinit);
        Ok(())
    }

    fn instantiate(
        &self,
        component: &str,
        sink: Arc<dyn EventSink>,
    ) -> Result<ComponentHandle, FrameworkError> {
        let mut state = self.lock();
        state
            .calls
            .push(FrameworkCall::Instantiate(component.to_string()));
        if state.fail_instantiate.contains(component) {
            return Err(Self::error(0x8000_1000, "insufficient resources"));
        }
        state.next_handle += 1;
        let handle = ComponentHandle::new(state.next_handle);
        state.components.insert(handle, component.to_string());
        state.sinks.insert(handle, sink);
        state.states.insert(handle, ComponentState::Loaded);
        Ok(handle)
    }

    fn destroy(&self, handle: ComponentHandle) -> Result<(), FrameworkError> {
        let mut state = self.lock();
        let name = state
            .components
            .remove(&handle)
            .ok_or_else(|| Self::error(0x8000_1008, "bad handle"))?;
        state.sinks.remove(&handle);
        state.states.remove(&handle);
        state.calls.push(FrameworkCall::Destroy(name));
        Ok(())
    }

    fn request_state_transition(
        &self,
        handle: ComponentHandle,
        target: ComponentState,
    ) -> Result<(), FrameworkError> {
        let mut state = self.lock();
        let name = state
            .components
            .get(&handle)
            .cloned()
            .ok_or_else(|| Self::error(0x8000_1008, "bad handle"))?;
        state
            .calls
            .push(FrameworkCall::Transition(name.clone(), target));
        if state.reject_transition.contains(&name) {
            return Err(Self::error(0x8000_100F, "incorrect state transition"));
        }
        if state.silent.contains(&name) {
            return Ok(());
        }
        state.states.insert(handle, target);
        let sink = Arc::clone(&state.sinks[&handle]);
        drop(state);

        let delay = self.callback_delay;
        thread::spawn(move || {
            thread::sleep(delay);
            sink.on_event(
                handle,
                EventKind::CmdComplete,
                COMMAND_STATE_SET,
                target.code(),
                None,
            );
        });
        Ok(())
    }

    fn setup_tunnel(
        &self,
        output: ComponentHandle,
        output_port: PortIndex,
        input: ComponentHandle,
        input_port: PortIndex,
    ) -> Result<(), FrameworkError> {
        let (out_name, in_name) = (self.name(output), self.name(input));
        let mut state = self.lock();
        state.calls.push(FrameworkCall::SetupTunnel(
            out_name.clone(),
            output_port,
            in_name,
            input_port,
        ));
        if state.fail_tunnel_from.contains(&out_name) {
            return Err(Self::error(0x8000_101E, "ports not compatible"));
        }
        Ok(())
    }

    fn teardown_tunnel(
        &self,
        output: ComponentHandle,
        _output_port: PortIndex,
        input: ComponentHandle,
        _input_port: PortIndex,
    ) -> Result<(), FrameworkError> {
        let (out_name, in_name) = (self.name(output), self.name(input));
        self.lock()
            .calls
            .push(FrameworkCall::TeardownTunnel(out_name, in_name));
        Ok(())
    }

    fn set_buffer_supplier(
        &self,
        handle: ComponentHandle,
        port: PortIndex,
        supplier: BufferSupplier,
    ) -> Result<(), FrameworkError> {
        let name = self.name(handle);
        self.lock()
            .calls
            .push(FrameworkCall::Supplier(name, port, supplier));
        Ok(())
    }

    fn set_parameter(
        &self,
        handle: ComponentHandle,
        param: ComponentParam,
    ) -> Result<(), FrameworkError> {
        let name = self.name(handle);
        self.lock().calls.push(FrameworkCall::Parameter(name, param));
        Ok(())
    }
}
