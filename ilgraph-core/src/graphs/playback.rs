//! Playlist playback graph
//!
//! A linear pipeline (source -> ... -> renderer) that plays a list of
//! resources one after another. The first component reads the current
//! resource, the last one renders it; end-of-stream from the renderer moves
//! to the next resource.

use crate::config::GraphConfig;
use crate::engine::{EosAction, Graph, GraphContext, GraphSteps};
use crate::error::{Error, Result};
use crate::framework::{ComponentFramework, ComponentHandle, ComponentParam, ComponentState};
use crate::probe::CapabilityProbe;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// One component of a pipeline and the role it must implement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStage {
    pub component: String,
    pub role: String,
}

/// Ordered component list of a linear pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub stages: Vec<PipelineStage>,
}

impl PipelineSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage downstream of the existing ones
    pub fn stage(mut self, component: impl Into<String>, role: impl Into<String>) -> Self {
        self.stages.push(PipelineStage {
            component: component.into(),
            role: role.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    fn components(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.component.as_str()).collect()
    }

    fn roles(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.role.as_str()).collect()
    }
}

/// Graph steps for playlist playback
#[derive(Debug)]
pub struct PlaybackGraph {
    pipeline: PipelineSpec,
    playlist: Vec<String>,
    cursor: usize,
    muted: bool,
    /// State every component is in right now
    current: ComponentState,
    /// State to return to after retargeting the source
    resume: ComponentState,
}

impl PlaybackGraph {
    pub fn new(pipeline: PipelineSpec) -> Self {
        Self {
            pipeline,
            playlist: Vec::new(),
            cursor: 0,
            muted: false,
            current: ComponentState::Loaded,
            resume: ComponentState::Idle,
        }
    }

    /// Build a [`Graph`] running this pipeline
    pub fn spawn(
        pipeline: PipelineSpec,
        framework: Arc<dyn ComponentFramework>,
        probe: Arc<dyn CapabilityProbe>,
        config: GraphConfig,
    ) -> Result<Graph> {
        let expected = pipeline.len();
        Graph::new(Self::new(pipeline), expected, framework, probe, config)
    }

    /// Move every component to `to`; nothing happens if they are already there
    fn move_to(&mut self, ctx: &GraphContext, to: ComponentState) -> Result<()> {
        if self.current == to {
            return Ok(());
        }
        ctx.transition_all(to, self.current)?;
        self.current = to;
        Ok(())
    }

    fn source(ctx: &GraphContext) -> Result<ComponentHandle> {
        ctx.handle_at(0)
            .ok_or_else(|| Error::Config("pipeline has no source component".to_string()))
    }

    fn renderer(ctx: &GraphContext) -> Result<ComponentHandle> {
        ctx.registry()
            .last()
            .map(|e| e.handle)
            .ok_or_else(|| Error::Config("pipeline has no renderer component".to_string()))
    }

    /// Point the source at the resource under the cursor
    fn retarget(&self, ctx: &GraphContext) -> Result<()> {
        let uri = self
            .playlist
            .get(self.cursor)
            .ok_or_else(|| Error::Config("playlist is empty".to_string()))?;
        info!(
            "Playing item {}/{}: {}",
            self.cursor + 1,
            self.playlist.len(),
            uri
        );
        ctx.set_parameter(Self::source(ctx)?, ComponentParam::ContentUri(uri.clone()))
    }

    /// Bring every component down to Loaded, through Idle when running
    fn park(&mut self, ctx: &GraphContext) -> Result<()> {
        if matches!(
            self.current,
            ComponentState::Executing | ComponentState::Pause
        ) {
            self.move_to(ctx, ComponentState::Idle)?;
        }
        self.move_to(ctx, ComponentState::Loaded)
    }

    /// Stop, point the source at the current item and come back to `resume`
    fn restart(&mut self, ctx: &GraphContext) -> Result<()> {
        let resume = self.resume;
        self.park(ctx)?;
        self.retarget(ctx)?;
        self.move_to(ctx, ComponentState::Idle)?;
        self.move_to(ctx, resume)
    }

    /// Cursor after moving `jump` items, wrapping at both ends
    fn wrapped(&self, jump: i32) -> usize {
        let len = self.playlist.len() as i64;
        if len == 0 {
            return 0;
        }
        (self.cursor as i64 + i64::from(jump)).rem_euclid(len) as usize
    }
}

impl GraphSteps for PlaybackGraph {
    fn do_load(&mut self, ctx: &mut GraphContext) -> Result<()> {
        let components = self.pipeline.components();
        ctx.verify_existence(&components)?;
        ctx.verify_role_list(&components, &self.pipeline.roles())?;
        ctx.instantiate_list(&components)?;

        if let Err(e) = ctx.setup_tunnels() {
            ctx.destroy_list();
            return Err(e);
        }
        if let Err(e) = ctx.setup_suppliers() {
            ctx.release_all();
            return Err(e);
        }

        self.current = ComponentState::Loaded;
        self.resume = ComponentState::Idle;
        Ok(())
    }

    fn do_configure(&mut self, ctx: &mut GraphContext, uris: &[String]) -> Result<()> {
        if uris.is_empty() {
            return Err(Error::Config("nothing to play".to_string()));
        }
        self.park(ctx)?;

        self.playlist = uris.to_vec();
        self.cursor = 0;
        self.retarget(ctx)?;

        self.move_to(ctx, ComponentState::Idle)?;
        self.resume = ComponentState::Idle;
        Ok(())
    }

    fn do_execute(&mut self, ctx: &mut GraphContext) -> Result<()> {
        self.move_to(ctx, ComponentState::Executing)?;
        self.resume = ComponentState::Executing;
        Ok(())
    }

    fn do_pause(&mut self, ctx: &mut GraphContext) -> Result<()> {
        self.move_to(ctx, ComponentState::Pause)?;
        self.resume = ComponentState::Pause;
        Ok(())
    }

    fn do_seek(&mut self, ctx: &mut GraphContext) -> Result<()> {
        ctx.set_parameter(Self::source(ctx)?, ComponentParam::Position(Duration::ZERO))
    }

    fn do_skip(&mut self, ctx: &mut GraphContext, jump: i32) -> Result<()> {
        if jump == 0 {
            debug!("Skip by 0, nothing to do");
            return Ok(());
        }
        self.cursor = self.wrapped(jump);
        self.restart(ctx)
    }

    fn do_volume(&mut self, ctx: &mut GraphContext) -> Result<()> {
        let muted = !self.muted;
        ctx.set_parameter(Self::renderer(ctx)?, ComponentParam::Mute(muted))?;
        self.muted = muted;
        Ok(())
    }

    fn do_eos(&mut self, ctx: &mut GraphContext, handle: ComponentHandle) -> Result<EosAction> {
        if Self::renderer(ctx)? != handle {
            debug!(
                "End-of-stream from {} is not from the renderer, ignored",
                ctx.registry().describe(handle)
            );
            return Ok(EosAction::Continue);
        }

        if self.cursor + 1 < self.playlist.len() {
            self.cursor += 1;
            self.restart(ctx)?;
            return Ok(EosAction::Continue);
        }

        // End of the playlist: rewind and park, ready for another execute
        self.resume = ComponentState::Idle;
        self.cursor = 0;
        self.restart(ctx)?;
        Ok(EosAction::Stopped)
    }

    fn do_unload(&mut self, ctx: &mut GraphContext) -> Result<()> {
        let result = self.park(ctx);
        let teardown = ctx.tear_down_tunnels();
        ctx.destroy_list();

        self.playlist.clear();
        self.cursor = 0;
        self.muted = false;
        self.current = ComponentState::Loaded;
        self.resume = ComponentState::Idle;

        result.and(teardown)
    }
}
