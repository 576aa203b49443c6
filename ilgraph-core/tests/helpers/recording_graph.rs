//! Graph steps that record the order in which the worker ran them

use ilgraph_core::{ComponentHandle, EosAction, Error, GraphContext, GraphSteps, Result};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// One-shot latch a step can block on until the test opens it
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, cond) = &*self.inner;
        *open.lock().unwrap() = true;
        cond.notify_all();
    }

    /// Block until opened; gives up after `limit` so a broken test cannot hang
    pub fn wait(&self, limit: Duration) {
        let (open, cond) = &*self.inner;
        let guard = open.lock().unwrap();
        let _unused = cond.wait_timeout_while(guard, limit, |open| !*open).unwrap();
    }
}

/// Steps that instantiate their components and log every command
pub struct RecordingGraph {
    components: Vec<String>,
    log: Arc<Mutex<Vec<String>>>,
    load_gate: Option<Gate>,
    configure_gate: Option<Gate>,
    stop_on_eos: bool,
    fail_execute: bool,
}

impl RecordingGraph {
    pub fn new(components: &[&str]) -> Self {
        Self {
            components: components.iter().map(|c| c.to_string()).collect(),
            log: Arc::new(Mutex::new(Vec::new())),
            load_gate: None,
            configure_gate: None,
            stop_on_eos: false,
            fail_execute: false,
        }
    }

    /// Shared view of the step log
    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }

    /// Hold the load step until `gate` opens
    pub fn gate_load(mut self, gate: Gate) -> Self {
        self.load_gate = Some(gate);
        self
    }

    /// Hold the configure step until `gate` opens
    pub fn gate_configure(mut self, gate: Gate) -> Self {
        self.configure_gate = Some(gate);
        self
    }

    pub fn stop_on_eos(mut self) -> Self {
        self.stop_on_eos = true;
        self
    }

    pub fn fail_execute(mut self) -> Self {
        self.fail_execute = true;
        self
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

const GATE_LIMIT: Duration = Duration::from_secs(10);

impl GraphSteps for RecordingGraph {
    fn do_load(&mut self, ctx: &mut GraphContext) -> Result<()> {
        if let Some(gate) = &self.load_gate {
            gate.wait(GATE_LIMIT);
        }
        let names: Vec<&str> = self.components.iter().map(String::as_str).collect();
        ctx.verify_existence(&names)?;
        ctx.instantiate_list(&names)?;
        self.record("load".to_string());
        Ok(())
    }

    fn do_configure(&mut self, _ctx: &mut GraphContext, uris: &[String]) -> Result<()> {
        if let Some(gate) = &self.configure_gate {
            gate.wait(GATE_LIMIT);
        }
        self.record(format!("configure:{}", uris.len()));
        Ok(())
    }

    fn do_execute(&mut self, _ctx: &mut GraphContext) -> Result<()> {
        self.record("execute".to_string());
        if self.fail_execute {
            return Err(Error::Config("execute disabled".to_string()));
        }
        Ok(())
    }

    fn do_pause(&mut self, _ctx: &mut GraphContext) -> Result<()> {
        self.record("pause".to_string());
        Ok(())
    }

    fn do_seek(&mut self, _ctx: &mut GraphContext) -> Result<()> {
        self.record("seek".to_string());
        Ok(())
    }

    fn do_skip(&mut self, _ctx: &mut GraphContext, jump: i32) -> Result<()> {
        self.record(format!("skip:{jump}"));
        Ok(())
    }

    fn do_volume(&mut self, _ctx: &mut GraphContext) -> Result<()> {
        self.record("volume".to_string());
        Ok(())
    }

    fn do_eos(&mut self, ctx: &mut GraphContext, handle: ComponentHandle) -> Result<EosAction> {
        self.record(format!("eos:{}", ctx.registry().describe(handle)));
        if self.stop_on_eos {
            Ok(EosAction::Stopped)
        } else {
            Ok(EosAction::Continue)
        }
    }

    fn do_unload(&mut self, ctx: &mut GraphContext) -> Result<()> {
        ctx.destroy_list();
        self.record("unload".to_string());
        Ok(())
    }
}
