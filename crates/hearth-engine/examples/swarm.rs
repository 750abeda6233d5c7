//! Headless swarm: boids that breed, tag and retire each other mid-frame.
//!
//! Run with: `cargo run -p hearth-engine --example swarm`
//! Optional config path as first argument (JSON `FrameConfig`), e.g.
//! `{ "fixed_dt": 0.02, "headless": false, "max_frames": 300 }`.
//! Set `RUST_LOG=hearth_world=info` to see every admission and tag change.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Context as _;
use hearth_engine::prelude::*;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

/// Counts draw calls and accumulates a checksum of drawn positions.
#[derive(Debug, Default)]
struct TextRenderer {
    draw_calls: u64,
    checksum: f64,
}

struct Boid {
    rng: Rc<RefCell<Pcg64>>,
    x: f32,
    vx: f32,
    energy: f32,
}

impl Boid {
    fn spawn(rng: &Rc<RefCell<Pcg64>>) -> Self {
        let (x, vx) = {
            let mut r = rng.borrow_mut();
            (r.gen_range(-10.0..10.0), r.gen_range(-1.0..1.0))
        };
        Self {
            rng: Rc::clone(rng),
            x,
            vx,
            energy: 1.0,
        }
    }
}

fn side_of(x: f32) -> (&'static str, &'static str) {
    if x < 0.0 {
        ("west", "east")
    } else {
        ("east", "west")
    }
}

impl Entity<TextRenderer> for Boid {
    fn on_retire(&mut self, ctx: &mut Context<'_, TextRenderer>) {
        tracing::debug!(world_id = %ctx.world_id(), x = self.x, "boid expired");
    }

    fn on_update(&mut self, ctx: &mut Context<'_, TextRenderer>, dt: f32) {
        self.x += self.vx * dt * 10.0;
        self.energy -= dt * 0.5;

        // Tags requested here are flushed before the next update, so the
        // held set is always settled when it is read.
        let key = ctx.key();
        let (side, other) = side_of(self.x);
        if ctx.holds_tag(key, other) {
            ctx.untag_self(other);
        }
        if !ctx.holds_tag(key, side) {
            ctx.tag_self(side);
        }

        if self.energy <= 0.0 {
            ctx.retire_self();
        } else if self.rng.borrow_mut().gen_bool(0.02) && ctx.get_tagged("west").len() < 64 {
            ctx.request_admit(Box::new(Boid::spawn(&self.rng)), true, true);
        }
    }

    fn on_draw(&mut self, _ctx: &mut Context<'_, TextRenderer>, renderer: &mut TextRenderer) {
        renderer.draw_calls += 1;
        renderer.checksum += self.x as f64;
    }
}

fn load_config() -> anyhow::Result<FrameConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading frame config from {path}"))?;
            Ok(FrameConfig::from_json_str(&text)?)
        }
        None => Ok(FrameConfig {
            headless: false,
            max_frames: Some(600),
            ..Default::default()
        }),
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing("warn");
    let config = load_config()?;

    let rng = Rc::new(RefCell::new(Pcg64::seed_from_u64(0x5eed)));
    let mut world: World<TextRenderer> = World::new();
    for _ in 0..32 {
        world.request_admit_default(Box::new(Boid::spawn(&rng)));
    }

    let mut frames = FrameLoop::try_new(world, config)?;
    let mut renderer = TextRenderer::default();
    let total = frames.run(&mut renderer);

    frames.world().check_consistency()?;
    let snapshot = frames.world().membership_snapshot();
    println!(
        "{total} frames, {} alive ({} admitted overall), west={} east={}",
        frames.world().entity_count(),
        frames.world().admitted_total(),
        frames.world().get_tagged("west").len(),
        frames.world().get_tagged("east").len(),
    );
    println!(
        "{} draw calls, checksum {:.3}, layout hash {}",
        renderer.draw_calls,
        renderer.checksum,
        snapshot.state_hash()
    );
    Ok(())
}
