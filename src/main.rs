//! Portal Sim entry point
//!
//! Headless demo: runs a time portal scene and a bulk scatter, then builds
//! the views a camera would see. Pass a JSON config path to override the
//! defaults.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Portal Sim (headless) starting...");

    let config = match std::env::args().nth(1) {
        Some(path) => portal_sim::EngineConfig::load_or_default(path),
        None => portal_sim::EngineConfig::default(),
    };
    if let Err(e) = demo::run(&config) {
        log::error!("demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library only on the web
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use std::f32::consts::PI;

    use portal_sim::consts::SIM_DT;
    use portal_sim::renderer::draw_passes;
    use portal_sim::sim::{step_bulk, tick};
    use portal_sim::{Camera2, EngineConfig, NodeId, NodeKind, Result, Scene, Transform2, Velocity2, view};

    const SCATTER_SEED: u64 = 0x5eed;
    const SCATTER_COUNT: usize = 64;
    const TICKS: u32 = 180;

    pub fn run(config: &EngineConfig) -> Result<()> {
        let (mut scene, mover) = time_portal_scene()?;
        let mut camera = Camera2::new(Transform2::from_position(Vec2::new(0.0, 1.0)), 12.0, 16.0 / 9.0);

        let mut crossings = 0;
        for _ in 0..TICKS {
            let report = tick(&mut scene, SIM_DT, config)?;
            crossings += report.events.len();
            for event in &report.events {
                log::info!(
                    "tick {}: {} went {} -> {} at {:.3}, clock {:+}",
                    scene.time_ticks,
                    event.node,
                    event.portal,
                    event.exit,
                    event.time_fraction,
                    event.time_offset
                );
            }
            camera.follow_portal_entries(mover, &report.events);
        }
        let end = scene.graph.world_transform(mover)?;
        log::info!(
            "mover at ({:.2}, {:.2}) after {} crossings, clock {}",
            end.position.x,
            end.position.y,
            crossings,
            scene.graph.clock(mover)?
        );

        let tree = view::build(&scene, &camera, config)?;
        let passes = draw_passes(&tree, camera.half_extents() * 2.0);
        log::info!(
            "{} views (depth {}), {} draw passes",
            tree.count(),
            tree.max_depth(),
            passes.len()
        );

        scatter(&mut scene, config)
    }

    /// A linked pair side by side, crossing A winds the clock forward
    fn time_portal_scene() -> Result<(Scene, NodeId)> {
        let mut scene = Scene::new();
        let root = scene.graph.create_root("world");
        let a = scene.graph.create_node(root, "portal-a", NodeKind::Generic)?;
        let b = scene.graph.create_node(root, "portal-b", NodeKind::Generic)?;
        scene
            .graph
            .set_local_transform(a, Transform2::from_position(Vec2::new(4.0, 0.0)))?;
        scene
            .graph
            .set_local_transform(b, Transform2::from_position(Vec2::new(-4.0, 0.0)))?;
        let (pa, _) = scene.attach_linked_pair(a, b)?;
        scene.portals.set_time_offset(pa, 60)?;

        let mover = scene.graph.create_node(root, "mover", NodeKind::Generic)?;
        scene.graph.set_portalable(mover, true)?;
        scene.graph.set_local_velocity(mover, Velocity2::linear(Vec2::new(3.0, 0.0)))?;
        Ok((scene, mover))
    }

    /// Scatter many small movers and push them through in bulk
    fn scatter(scene: &mut Scene, config: &EngineConfig) -> Result<()> {
        let mut rng = Pcg32::seed_from_u64(SCATTER_SEED);
        let root = scene.graph.ids()[0];
        let mut movers = Vec::with_capacity(SCATTER_COUNT);
        for i in 0..SCATTER_COUNT {
            let node = scene
                .graph
                .create_node(root, format!("scatter-{i}"), NodeKind::Generic)?;
            let position = Vec2::new(rng.random_range(-8.0..8.0), rng.random_range(-4.0..4.0));
            let heading = rng.random_range(-PI..PI);
            let speed: f32 = rng.random_range(1.0..6.0);
            scene.graph.set_portalable(node, true)?;
            scene
                .graph
                .set_local_transform(node, Transform2::from_position(position))?;
            scene
                .graph
                .set_local_velocity(node, Velocity2::linear(Vec2::from_angle(heading) * speed))?;
            movers.push(node);
        }

        let mut crossings = 0;
        for _ in 0..TICKS {
            let report = step_bulk(scene, &movers, SIM_DT, config.bulk_iterations, config)?;
            crossings += report.events.len();
        }
        log::info!("{} scattered movers, {} bulk crossings", movers.len(), crossings);
        Ok(())
    }
}
