//! Hearth Engine -- fixed-timestep host loop around the entity registry.
//!
//! This crate builds on [`hearth_world`] to provide the frame driver: each
//! frame it runs the registry's update pass, its draw pass (unless headless),
//! and the request flush, in that order.
//!
//! # Quick Start
//!
//! ```
//! use hearth_engine::prelude::*;
//!
//! struct Blinker { frames: u32 }
//!
//! impl Entity<()> for Blinker {
//!     fn on_update(&mut self, ctx: &mut Context<'_, ()>, _dt: f32) {
//!         self.frames += 1;
//!         if self.frames % 2 == 0 {
//!             ctx.request_set_draw(ctx.key(), false);
//!         } else {
//!             ctx.request_set_draw(ctx.key(), true);
//!         }
//!     }
//! }
//!
//! let mut world: World<()> = World::new();
//! world.request_admit(Box::new(Blinker { frames: 0 }), true, true);
//!
//! let mut frames = FrameLoop::new(world, FrameConfig::default());
//! frames.run_frames(3, &mut ());
//! assert_eq!(frames.frame_count(), 3);
//! ```

#![deny(unsafe_code)]

pub mod frame;
pub mod telemetry;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while configuring the frame loop.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `fixed_dt` was zero, negative, NaN or infinite.
    #[error("fixed_dt must be positive and finite, got {0}")]
    InvalidTimeStep(f32),

    /// The configuration text was not valid JSON for [`frame::FrameConfig`].
    #[error("failed to parse frame configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the registry crate for convenience.
pub use hearth_world;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use hearth_world::prelude::*;

    pub use crate::frame::{FrameConfig, FrameDiagnostics, FrameLoop};
    pub use crate::telemetry::init_tracing;
    pub use crate::EngineError;
}
