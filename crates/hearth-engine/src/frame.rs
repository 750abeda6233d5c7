//! Fixed-timestep frame loop.
//!
//! The [`FrameLoop`] drives a [`World`] through the host loop contract. Each
//! frame:
//!
//! 1. [`World::update`] with the fixed time step.
//! 2. [`World::draw`] with the renderer (skipped in headless mode).
//! 3. [`World::flush_queues`], applying every request made during 1 and 2.
//! 4. The frame counter advances.
//!
//! # Example
//!
//! ```
//! use hearth_engine::frame::{FrameConfig, FrameLoop};
//! use hearth_world::prelude::*;
//!
//! struct Clock { elapsed: f32 }
//!
//! impl Entity<()> for Clock {
//!     fn on_update(&mut self, _ctx: &mut Context<'_, ()>, dt: f32) {
//!         self.elapsed += dt;
//!     }
//! }
//!
//! let mut world: World<()> = World::new();
//! world.request_admit(Box::new(Clock { elapsed: 0.0 }), true, false);
//!
//! let config = FrameConfig { fixed_dt: 1.0 / 30.0, ..Default::default() };
//! let mut frames = FrameLoop::new(world, config);
//! frames.run_frames(10, &mut ());
//!
//! assert_eq!(frames.frame_count(), 10);
//! assert_eq!(frames.world().entity_count(), 1);
//! ```

use std::time::{Duration, Instant};

use hearth_world::command::FlushReport;
use hearth_world::world::World;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Configuration for the frame loop.
///
/// `fixed_dt` is the duration in seconds handed to every `on_update`. A value
/// of `1.0 / 60.0` gives 60 frames per simulated second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Fixed time step in seconds per frame. Must be positive and finite.
    pub fixed_dt: f32,
    /// Headless mode: the draw pass is skipped.
    pub headless: bool,
    /// Upper bound on frames run by [`FrameLoop::run`]; `None` runs until
    /// the world is empty.
    pub max_frames: Option<u64>,
}

impl Default for FrameConfig {
    /// Defaults to 60 Hz, drawing enabled, no frame limit.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            headless: false,
            max_frames: None,
        }
    }
}

impl FrameConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// ```
    /// use hearth_engine::frame::FrameConfig;
    ///
    /// let config = FrameConfig::from_json_str(r#"{ "headless": true }"#).unwrap();
    /// assert!(config.headless);
    /// assert_eq!(config.fixed_dt, 1.0 / 60.0);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive a loop.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::InvalidTimeStep(self.fixed_dt));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FrameDiagnostics
// ---------------------------------------------------------------------------

/// Timing and flush summary for the last frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDiagnostics {
    /// Time spent in the update pass.
    pub update_time: Duration,
    /// Time spent in the draw pass (zero when headless).
    pub draw_time: Duration,
    /// Time spent flushing request queues.
    pub flush_time: Duration,
    /// Total time for the frame.
    pub total_time: Duration,
    /// What the flush applied.
    pub flush: FlushReport,
}

// ---------------------------------------------------------------------------
// FrameLoop
// ---------------------------------------------------------------------------

/// Drives a [`World`] one fixed-step frame at a time.
///
/// Simulation time is computed as `frame_count * fixed_dt` rather than
/// accumulated, so it does not drift.
pub struct FrameLoop<R> {
    world: World<R>,
    config: FrameConfig,
    frame_counter: u64,
    last_diagnostics: FrameDiagnostics,
}

impl<R> FrameLoop<R> {
    /// Create a loop around `world`.
    ///
    /// Requests already queued on `world` are applied by the first frame's
    /// flush.
    ///
    /// # Panics
    ///
    /// Panics if `config.fixed_dt` is not positive and finite. Use
    /// [`try_new`](Self::try_new) to get an error instead.
    pub fn new(world: World<R>, config: FrameConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        Self::build(world, config)
    }

    /// Create a loop, rejecting an invalid configuration.
    pub fn try_new(world: World<R>, config: FrameConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self::build(world, config))
    }

    fn build(world: World<R>, config: FrameConfig) -> Self {
        info!(
            fixed_dt = config.fixed_dt,
            headless = config.headless,
            max_frames = ?config.max_frames,
            "frame loop created"
        );
        Self {
            world,
            config,
            frame_counter: 0,
            last_diagnostics: FrameDiagnostics::default(),
        }
    }

    /// Run one frame: update, draw (unless headless), flush.
    ///
    /// Returns what the flush applied.
    pub fn frame(&mut self, renderer: &mut R) -> FlushReport {
        let frame_start = Instant::now();

        let update_start = Instant::now();
        self.world.update(self.config.fixed_dt);
        let update_time = update_start.elapsed();

        let draw_start = Instant::now();
        if !self.config.headless {
            self.world.draw(renderer);
        }
        let draw_time = if self.config.headless {
            Duration::ZERO
        } else {
            draw_start.elapsed()
        };

        let flush_start = Instant::now();
        let flush = self.world.flush_queues();
        let flush_time = flush_start.elapsed();

        self.frame_counter += 1;
        debug!(
            frame = self.frame_counter,
            entities = self.world.entity_count(),
            applied = flush.applied(),
            failed = flush.failed,
            "frame complete"
        );

        self.last_diagnostics = FrameDiagnostics {
            update_time,
            draw_time,
            flush_time,
            total_time: frame_start.elapsed(),
            flush: flush.clone(),
        };
        flush
    }

    /// Run `count` frames in sequence. Returns the number of requests
    /// applied across all of them.
    pub fn run_frames(&mut self, count: u64, renderer: &mut R) -> usize {
        let mut applied = 0;
        for _ in 0..count {
            applied += self.frame(renderer).applied();
        }
        applied
    }

    /// Run until the world has no entities and no pending requests, or
    /// until `max_frames` frames have run in total. Returns the frame count.
    pub fn run(&mut self, renderer: &mut R) -> u64 {
        loop {
            if self
                .config
                .max_frames
                .is_some_and(|max| self.frame_counter >= max)
            {
                break;
            }
            self.frame(renderer);
            if self.world.entity_count() == 0 && self.world.pending_count() == 0 {
                break;
            }
        }
        info!(frames = self.frame_counter, "frame loop stopped");
        self.frame_counter
    }

    // -- accessors ----------------------------------------------------------

    /// Number of frames run so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    /// Simulated time in seconds.
    pub fn sim_time(&self) -> f64 {
        self.frame_counter as f64 * self.config.fixed_dt as f64
    }

    /// The fixed time step in seconds.
    pub fn fixed_dt(&self) -> f32 {
        self.config.fixed_dt
    }

    /// Whether the draw pass is skipped.
    pub fn is_headless(&self) -> bool {
        self.config.headless
    }

    /// The configuration this loop was built with.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Read-only access to the registry.
    pub fn world(&self) -> &World<R> {
        &self.world
    }

    /// Mutable access to the registry, for setup between frames.
    pub fn world_mut(&mut self) -> &mut World<R> {
        &mut self.world
    }

    /// Give the registry back.
    pub fn into_world(self) -> World<R> {
        self.world
    }

    /// Diagnostics from the last frame.
    pub fn last_diagnostics(&self) -> &FrameDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
