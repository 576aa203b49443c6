//! Shared graph algorithms
//!
//! Everything a concrete graph does to its components goes through
//! [`GraphContext`]: existence and role checks, instantiation with rollback,
//! tunnels, buffer suppliers and batched state transitions. The context is
//! owned by the worker thread and lent to the concrete graph's steps.

use crate::callback::{CallbackHandler, ComponentEvent};
use crate::config::GraphConfig;
use crate::engine::registry::{ComponentEntry, ComponentRegistry};
use crate::error::{Error, Result};
use crate::framework::{
    BufferSupplier, ComponentFramework, ComponentHandle, ComponentParam, ComponentState,
    EventSink, PortIndex,
};
use crate::probe::CapabilityProbe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Input port every tunnel connects to
pub const TUNNEL_INPUT_PORT: PortIndex = 0;

/// Output port a tunnel leaves from, by upstream pipeline position
///
/// The first component of a pipeline exposes its output on port 0, every
/// later one on port 1 (port 0 being its input).
pub fn tunnel_output_port(position: usize) -> PortIndex {
    if position == 0 {
        0
    } else {
        1
    }
}

pub struct GraphContext {
    framework: Arc<dyn ComponentFramework>,
    probe: Arc<dyn CapabilityProbe>,
    callbacks: Arc<CallbackHandler>,
    sink: Arc<dyn EventSink>,
    registry: ComponentRegistry,
    expected_components: usize,
    tunnels_up: bool,
    config: GraphConfig,
}

impl GraphContext {
    pub(crate) fn new(
        framework: Arc<dyn ComponentFramework>,
        probe: Arc<dyn CapabilityProbe>,
        callbacks: Arc<CallbackHandler>,
        sink: Arc<dyn EventSink>,
        expected_components: usize,
        config: GraphConfig,
    ) -> Self {
        Self {
            framework,
            probe,
            callbacks,
            sink,
            registry: ComponentRegistry::new(),
            expected_components,
            tunnels_up: false,
            config,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn components(&self) -> &[ComponentEntry] {
        self.registry.entries()
    }

    /// Handle of the component at pipeline `position`
    pub fn handle_at(&self, position: usize) -> Option<ComponentHandle> {
        self.registry
            .entries()
            .iter()
            .find(|e| e.position == position)
            .map(|e| e.handle)
    }

    pub fn expected_components(&self) -> usize {
        self.expected_components
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// Fail with `ComponentNotFound` for the first name discovery does not know
    pub fn verify_existence(&self, components: &[&str]) -> Result<()> {
        for component in components {
            if self.probe.resolve_role(component).is_none() {
                warn!("Component not found: {}", component);
                return Err(Error::ComponentNotFound(component.to_string()));
            }
        }
        Ok(())
    }

    pub fn verify_role(&self, component: &str, role: &str) -> Result<()> {
        match self.probe.resolve_role(component) {
            None => Err(Error::ComponentNotFound(component.to_string())),
            Some(actual) if actual == role => Ok(()),
            Some(actual) => {
                warn!(
                    "Component {} has role {}, expected {}",
                    component, actual, role
                );
                Err(Error::RoleMismatch {
                    component: component.to_string(),
                    expected: role.to_string(),
                    actual,
                })
            }
        }
    }

    /// Check each component against the role at the same index
    pub fn verify_role_list(&self, components: &[&str], roles: &[&str]) -> Result<()> {
        if components.len() != roles.len() {
            return Err(Error::Config(format!(
                "{} components but {} roles",
                components.len(),
                roles.len()
            )));
        }
        components
            .iter()
            .zip(roles)
            .try_for_each(|(component, role)| self.verify_role(component, role))
    }

    /// Create one component and register it at `position`
    pub fn instantiate_component(&mut self, component: &str, position: usize) -> Result<()> {
        let handle = self
            .framework
            .instantiate(component, Arc::clone(&self.sink))
            .map_err(|source| Error::Instantiation {
                component: component.to_string(),
                position,
                source,
            })?;
        debug!("Instantiated {} at position {} ({})", component, position, handle);
        self.registry.insert(position, component, handle);
        Ok(())
    }

    /// Instantiate the whole pipeline, or nothing
    ///
    /// If component `k` fails, the `k` handles already created are destroyed
    /// in reverse order before the error is returned.
    pub fn instantiate_list(&mut self, components: &[&str]) -> Result<()> {
        if components.len() != self.expected_components {
            return Err(Error::GraphSize {
                expected: self.expected_components,
                actual: components.len(),
            });
        }

        for (position, component) in components.iter().enumerate() {
            if let Err(e) = self.instantiate_component(component, position) {
                warn!(
                    "Instantiation failed at position {}, rolling back {} components",
                    position,
                    self.registry.len()
                );
                self.destroy_list();
                return Err(e);
            }
        }

        info!(
            "Instantiated {} components: {}",
            self.registry.len(),
            components.join(" -> ")
        );
        Ok(())
    }

    /// Destroy every registered component in reverse pipeline order
    ///
    /// Destruction errors are logged; the handle is released from the
    /// registry either way. Queued callback events of destroyed handles are
    /// discarded.
    pub fn destroy_list(&mut self) {
        for handle in self.registry.handles().into_iter().rev() {
            let name = self.registry.describe(handle);
            if let Err(e) = self.framework.destroy(handle) {
                warn!("Failed to destroy {} ({}): {}", name, handle, e);
            }
            let purged = self.callbacks.forget(handle);
            if purged > 0 {
                debug!("Discarded {} queued events of {}", purged, name);
            }
            self.registry.remove(handle);
        }
        self.tunnels_up = false;
    }

    /// Connect each adjacent pair of components
    ///
    /// A failure tears down the tunnels already connected.
    pub fn setup_tunnels(&mut self) -> Result<()> {
        let entries = self.registry.entries().to_vec();
        for (index, pair) in entries.windows(2).enumerate() {
            let (up, down) = (&pair[0], &pair[1]);
            let out_port = tunnel_output_port(up.position);
            if let Err(source) =
                self.framework
                    .setup_tunnel(up.handle, out_port, down.handle, TUNNEL_INPUT_PORT)
            {
                warn!("Tunnel {} -> {} failed: {}", up.name, down.name, source);
                self.tear_down_pairs(&entries[..=index]);
                return Err(Error::Tunnel {
                    upstream: up.name.clone(),
                    downstream: down.name.clone(),
                    source,
                });
            }
            debug!(
                "Tunnel {}:{} -> {}:{}",
                up.name, out_port, down.name, TUNNEL_INPUT_PORT
            );
        }
        self.tunnels_up = true;
        Ok(())
    }

    /// Disconnect every tunnel, last pair first
    ///
    /// All pairs are attempted; the first failure is returned.
    pub fn tear_down_tunnels(&mut self) -> Result<()> {
        if !self.tunnels_up {
            return Ok(());
        }
        let entries = self.registry.entries().to_vec();
        self.tunnels_up = false;
        match self.tear_down_pairs(&entries) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn tear_down_pairs(&self, entries: &[ComponentEntry]) -> Option<Error> {
        let mut first_error = None;
        for pair in entries.windows(2).rev() {
            let (up, down) = (&pair[0], &pair[1]);
            if let Err(source) = self.framework.teardown_tunnel(
                up.handle,
                tunnel_output_port(up.position),
                down.handle,
                TUNNEL_INPUT_PORT,
            ) {
                warn!("Tunnel teardown {} -> {} failed: {}", up.name, down.name, source);
                first_error.get_or_insert(Error::Tunnel {
                    upstream: up.name.clone(),
                    downstream: down.name.clone(),
                    source,
                });
            }
        }
        first_error
    }

    /// Make each downstream input port the buffer supplier of its tunnel
    pub fn setup_suppliers(&self) -> Result<()> {
        for entry in self.registry.entries().iter().skip(1) {
            self.framework
                .set_buffer_supplier(entry.handle, TUNNEL_INPUT_PORT, BufferSupplier::Input)?;
        }
        Ok(())
    }

    pub fn set_parameter(&self, handle: ComponentHandle, param: ComponentParam) -> Result<()> {
        debug!("Setting {:?} on {}", param, self.registry.describe(handle));
        self.framework.set_parameter(handle, param)?;
        Ok(())
    }

    /// Move every registered component from `from` to `to` and wait for all confirmations
    ///
    /// Requests go in pipeline order when activating and in reverse order
    /// otherwise.
    pub fn transition_all(&self, to: ComponentState, from: ComponentState) -> Result<()> {
        let mut handles = self.registry.handles();
        if !ComponentState::is_activating(from, to) {
            handles.reverse();
        }
        let started = Instant::now();
        self.transition(&handles, to)?;
        info!(
            "{} components {} -> {} in {:?}",
            handles.len(),
            from,
            to,
            started.elapsed()
        );
        Ok(())
    }

    fn transition(&self, handles: &[ComponentHandle], to: ComponentState) -> Result<()> {
        // The expected set is complete before the first request goes out;
        // confirmations that beat the wait are queued and still count.
        let expected: Vec<_> = handles
            .iter()
            .map(|&h| ComponentEvent::state_set(h, to))
            .collect();

        for (index, &handle) in handles.iter().enumerate() {
            if let Err(source) = self.framework.request_state_transition(handle, to) {
                let component = self.registry.describe(handle);
                warn!("Transition of {} to {} rejected: {}", component, to, source);
                self.settle(&expected[..index]);
                return Err(Error::TransitionRequest {
                    component,
                    target: to,
                    source,
                });
            }
        }

        self.callbacks
            .wait_for_events(expected, self.config.transition_timeout)
            .map_err(|timeout| {
                let pending: Vec<_> = timeout
                    .pending
                    .iter()
                    .map(|e| self.registry.describe(e.handle))
                    .collect();
                warn!(
                    "Transition to {} timed out after {:?}, unconfirmed: {:?}",
                    to, timeout.timeout, pending
                );
                Error::TransitionTimeout {
                    target: to,
                    timeout: timeout.timeout,
                    pending,
                }
            })
    }

    /// Absorb confirmations of requests issued before a rejected one
    fn settle(&self, requested: &[ComponentEvent]) {
        if requested.is_empty() {
            return;
        }
        if let Err(timeout) = self
            .callbacks
            .wait_for_events(requested.to_vec(), self.config.transition_timeout)
        {
            debug!(
                "{} components did not confirm before the rejected request",
                timeout.pending.len()
            );
        }
    }

    /// Tear down and destroy whatever is left, ignoring failures
    pub(crate) fn release_all(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        if let Err(e) = self.tear_down_tunnels() {
            warn!("Forced tunnel teardown: {}", e);
        }
        self.destroy_list();
    }
}
