//! Reproducibility: repeated runs, snapshot resume and event streams

use approx::assert_relative_eq;
use physisim_physics::prelude::*;

/// A scene touching every stage of the pipeline
fn scene() -> (Vec<Body>, Vec<Connector>) {
    let mut bodies = vec![BodyDesc::fixed(Shape::rectangle(30.0, 1.0).unwrap())
        .with_position(0.0, -0.5)
        .build(BodyId(1))
        .unwrap()];

    // A small stack of boxes
    for i in 0..4 {
        bodies.push(
            BodyDesc::dynamic(Shape::rectangle(1.0, 1.0).unwrap())
                .with_position(-4.0 + 0.05 * i as f64, 0.5 + 1.01 * i as f64)
                .with_material(PhysicsMaterial::wood())
                .build(BodyId(10 + i))
                .unwrap(),
        );
    }

    // A pendulum chain hanging from a fixed pin
    bodies.push(
        BodyDesc::fixed(Shape::circle(0.1).unwrap())
            .with_position(3.0, 6.0)
            .build(BodyId(20))
            .unwrap(),
    );
    for i in 0..3 {
        bodies.push(
            BodyDesc::dynamic(Shape::circle(0.25).unwrap())
                .with_position(3.0 + (i + 1) as f64, 6.0)
                .with_material(PhysicsMaterial::rubber())
                .build(BodyId(21 + i))
                .unwrap(),
        );
    }

    // A triangle bouncing into the stack
    bodies.push(
        BodyDesc::dynamic(Shape::polygon(vec![Vec2::new(-0.5, -0.4), Vec2::new(0.5, -0.4), Vec2::new(0.0, 0.6)]).unwrap())
            .with_position(0.0, 3.0)
            .with_linear_velocity(-2.0, 0.0)
            .with_angular_velocity(1.5)
            .build(BodyId(30))
            .unwrap(),
    );

    let connectors = vec![
        Connector::revolute(ConnectorId(1), BodyId(20), BodyId(21)).with_anchors(Vec2::ZERO, Vec2::new(-1.0, 0.0)),
        Connector::rod(ConnectorId(2), BodyId(21), BodyId(22), 1.0),
        Connector::rope(ConnectorId(3), BodyId(22), BodyId(23), 1.2),
        Connector::spring(ConnectorId(4), BodyId(30), BodyId(13), 15.0, 0.3, 3.0).with_break_threshold(40.0),
    ];
    (bodies, connectors)
}

/// Irregular but reproducible frame times
fn dt_sequence(ticks: usize) -> Vec<f64> {
    (0..ticks).map(|i| if i % 3 == 0 { 1.0 / 120.0 } else { 1.0 / 60.0 }).collect()
}

fn run(config: PhysicsConfig, ticks: usize) -> (Vec<BodyState>, Vec<StepReport>) {
    let (mut bodies, mut connectors) = scene();
    let mut world = PhysicsWorld::new(config);
    let reports = dt_sequence(ticks)
        .into_iter()
        .map(|dt| world.step(&mut bodies, &mut connectors, dt).unwrap())
        .collect();
    (bodies.iter().map(Body::state).collect(), reports)
}

/// Identical input and dt sequence give bit-identical trajectories
#[test]
fn independent_runs_are_identical() {
    let (states_a, reports_a) = run(PhysicsConfig::default(), 240);
    let (states_b, reports_b) = run(PhysicsConfig::default(), 240);
    assert_eq!(states_a, states_b);
    assert_eq!(reports_a, reports_b);

    let (states_a, _) = run(PhysicsConfig::default().with_substeps(4), 120);
    let (states_b, _) = run(PhysicsConfig::default().with_substeps(4), 120);
    assert_eq!(states_a, states_b);
}

/// The scene exercises contacts and joints, so the comparison above is not vacuous
#[test]
fn scene_exercises_pipeline() {
    let start: Vec<BodyState> = scene().0.iter().map(Body::state).collect();
    let (end, reports) = run(PhysicsConfig::default(), 120);
    assert_ne!(start, end);
    assert!(reports.iter().any(|r| !r.manifolds.is_empty()));
    assert!(reports.iter().all(|r| r.reaction(ConnectorId(2)).is_some()));
    assert!(reports.iter().all(|r| r.solver.iterations >= 1));
}

/// Resuming from a snapshot gives the same trajectory in any world
///
/// Restoring discards carried solver impulses, so the reference run restores
/// its own snapshot in place before continuing.
#[test]
fn snapshot_resume_is_reproducible() {
    let dts = dt_sequence(160);
    let (mut bodies, mut connectors) = scene();
    let mut world = PhysicsWorld::default();

    for &dt in &dts[..80] {
        world.step(&mut bodies, &mut connectors, dt).unwrap();
    }
    let snapshot = world.snapshot(&bodies, &connectors);
    let json = serde_json::to_string(&snapshot).unwrap();
    world.restore(&snapshot, &mut bodies, &mut connectors).unwrap();

    for &dt in &dts[80..] {
        world.step(&mut bodies, &mut connectors, dt).unwrap();
    }
    let continuous: Vec<BodyState> = bodies.iter().map(Body::state).collect();

    // In-memory snapshot into a fresh world and fresh entities
    let (mut bodies, mut connectors) = scene();
    let mut resumed = PhysicsWorld::default();
    resumed.restore(&snapshot, &mut bodies, &mut connectors).unwrap();
    assert_eq!(resumed.tick(), 80);
    for &dt in &dts[80..] {
        resumed.step(&mut bodies, &mut connectors, dt).unwrap();
    }
    let replayed: Vec<BodyState> = bodies.iter().map(Body::state).collect();
    assert_eq!(continuous, replayed);

    // Through JSON the trajectory agrees to within float parsing
    let restored: SimulationSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.bodies.len(), snapshot.bodies.len());
    assert_eq!(restored.connectors, snapshot.connectors);
    for (a, b) in restored.bodies.iter().zip(&snapshot.bodies) {
        assert_eq!(a.id, b.id);
        assert_relative_eq!(a.position.x, b.position.x, epsilon = 1e-12);
        assert_relative_eq!(a.position.y, b.position.y, epsilon = 1e-12);
        assert_relative_eq!(a.angle, b.angle, epsilon = 1e-12);
        assert_relative_eq!(a.angular_velocity, b.angular_velocity, epsilon = 1e-12);
    }
}

/// Subscribers see the same events the report carries, in the same order
#[test]
fn event_stream_matches_reports() {
    let (mut bodies, mut connectors) = scene();
    let mut world = PhysicsWorld::default();
    let receiver = world.subscribe();

    let mut reported = Vec::new();
    for dt in dt_sequence(200) {
        let report = world.step(&mut bodies, &mut connectors, dt).unwrap();
        reported.extend(report.events);
    }
    let received: Vec<PhysicsEvent> = receiver.try_iter().collect();
    assert!(!received.is_empty());
    assert_eq!(received, reported);

    // Every pair that ended had begun before
    let mut collector = EventCollector::new();
    for event in &received {
        collector.handle(event);
    }
    for ended in collector.ended_collisions() {
        assert!(collector
            .began_collisions()
            .any(|b| b.body1 == ended.body1 && b.body2 == ended.body2));
    }
}
