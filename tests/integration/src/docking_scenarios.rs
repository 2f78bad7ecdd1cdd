//! Whole-system docking runs: base, bus, agents and physics together

use crate::test_utils::{test_config, World, CONNECT_RANGE};
use baymaster_approach::{ShipMotion, TickOutcome};
use baymaster_base::{Connector, RequestState};
use baymaster_core::{angle_between, MemorySnapshotStore, SqliteSnapshotStore, Vec3};
use baymaster_protocol::{LossProfile, MemoryBus, ShipStatus};

fn docked_at(world: &World, index: usize, bay: &str) -> bool {
    let name = world.ships[index].agent.name();
    world.status(index) == ShipStatus::Docked
        && world
            .base
            .bay(bay)
            .map(|b| b.occupant() == Some(name))
            .unwrap_or(false)
}

fn assert_exclusive(world: &World) {
    for (bay, claimants) in world.claims() {
        assert!(
            claimants.len() <= 1,
            "bay {} promised to {:?} at t={}",
            bay,
            claimants,
            world.now_ms()
        );
    }
    for rig in &world.ships {
        let name = rig.agent.name();
        let held: Vec<String> = world
            .claims()
            .into_iter()
            .filter(|(_, claimants)| claimants.iter().any(|c| c == name))
            .map(|(bay, _)| bay)
            .collect();
        assert!(held.len() <= 1, "{} holds {:?}", name, held);
    }
}

#[test]
fn test_single_ship_docks_from_misaligned_start() {
    let mut world = World::new(test_config(), &[("Bay 1", Vec3::ZERO)]);
    let ship = world.add_ship("Miner-7", Vec3::new(25.0, 5.0, 90.0), Vec3::UNIT_X, Vec3::UNIT_Y);
    world.request_dock(ship);

    let mut outcomes = Vec::new();
    for _ in 0..3_000 {
        if docked_at(&world, ship, "Bay 1") {
            break;
        }
        let report = world.step();
        outcomes.extend(report.agents.into_iter().map(|(_, r)| r.outcome));
    }
    assert!(docked_at(&world, ship, "Bay 1"), "ship did not dock: {:?}", world.status(ship));

    // Orientation is corrected before the first thruster burn.
    let first_translation = outcomes
        .iter()
        .position(|o| matches!(o, TickOutcome::Translating { .. }))
        .unwrap();
    assert!(outcomes[..first_translation]
        .iter()
        .any(|o| matches!(o, TickOutcome::Aligning { .. })));
    assert!(outcomes[..first_translation]
        .iter()
        .all(|o| matches!(o, TickOutcome::Idle | TickOutcome::Aligning { .. })));

    let sim = &world.ships[ship].sim;
    assert!(angle_between(sim.forward(), -Vec3::UNIT_Z) < 0.05);
    assert!(sim.position().distance(world.connectors[0].position()) <= CONNECT_RANGE);
    assert_eq!(world.ships[ship].agent.bay(), Some("Bay 1"));

    // Fulfilled request is retired and purged, reservation cleared.
    assert!(world.base.requests().is_empty());
    assert!(world.base.bay("Bay 1").unwrap().reserved_for().is_none());
}

#[test]
fn test_two_ships_two_bays_never_share() {
    let mut world = World::new(test_config(), &[("Bay 1", Vec3::ZERO), ("Bay 2", Vec3::new(30.0, 0.0, 0.0))]);
    let alpha = world.add_ship("Alpha", Vec3::new(-20.0, 0.0, 100.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    let bravo = world.add_ship("Bravo", Vec3::new(50.0, 0.0, 100.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_dock(alpha);
    world.request_dock(bravo);

    let mut assignments = Vec::new();
    for _ in 0..4_000 {
        if docked_at(&world, alpha, "Bay 1") && docked_at(&world, bravo, "Bay 2") {
            break;
        }
        let report = world.step();
        assignments.extend(report.base.assignment);
        assert_exclusive(&world);
    }

    assert!(docked_at(&world, alpha, "Bay 1"));
    assert!(docked_at(&world, bravo, "Bay 2"));

    // Alpha queued first and took its nearest bay; Bravo got the other one
    // on the following cycle.
    assert_eq!(assignments.len(), 2);
    assert_eq!((assignments[0].agent.as_str(), assignments[0].bay.as_str()), ("Alpha", "Bay 1"));
    assert_eq!((assignments[1].agent.as_str(), assignments[1].bay.as_str()), ("Bravo", "Bay 2"));
    assert_eq!(world.base.status().free_bays, 0);
}

#[test]
fn test_lossy_channel_all_ships_dock() {
    let bus = MemoryBus::with_loss(
        LossProfile {
            drop_probability: 0.3,
            duplicate_probability: 0.2,
        },
        7,
    );
    let bays = [
        ("Bay 1", Vec3::ZERO),
        ("Bay 2", Vec3::new(30.0, 0.0, 0.0)),
        ("Bay 3", Vec3::new(60.0, 0.0, 0.0)),
    ];
    let mut config = test_config();
    config.approach.request_retry_ms = 2_000;
    let mut world = World::with_bus(config, &bays, bus, Box::new(MemorySnapshotStore::new()));

    for (i, name) in ["Scout", "Tug", "Barge"].iter().enumerate() {
        let index = world.add_ship(name, Vec3::new(i as f64 * 30.0, 10.0, 110.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
        world.request_dock(index);
    }

    let settled = |world: &World| {
        world.all(ShipStatus::Docked)
            && world
                .base
                .bays()
                .iter()
                .all(|b| b.occupant().is_some() && b.reserved_for().is_none())
    };
    let mut done = false;
    for _ in 0..8_000 {
        if settled(&world) {
            done = true;
            break;
        }
        world.step();
        assert_exclusive(&world);
    }
    assert!(done, "fleet did not settle: {:?}", world.base.status());

    let (_, dropped) = world.bus.stats();
    assert!(dropped > 0);

    let mut occupants: Vec<&str> = world.base.bays().iter().filter_map(|b| b.occupant()).collect();
    occupants.sort_unstable();
    assert_eq!(occupants, vec!["Barge", "Scout", "Tug"]);
}

#[test]
fn test_silent_ship_loses_reservation() {
    let mut config = test_config();
    config.base.reservation_timeout_ms = 10_000;
    config.approach.request_retry_ms = 2_000;
    let mut world = World::new(config, &[("Bay 1", Vec3::ZERO)]);

    let ghost = world.add_ship("Ghost", Vec3::new(0.0, 0.0, 120.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_dock(ghost);
    world.ships[ghost].powered = false;
    world.step();
    assert_eq!(world.base.bay("Bay 1").unwrap().reserved_for(), Some("Ghost"));

    let hauler = world.add_ship("Hauler", Vec3::new(20.0, 0.0, 90.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_dock(hauler);
    for _ in 0..50 {
        world.step();
    }
    assert_eq!(world.status(hauler), ShipStatus::WaitingForBay);
    assert_eq!(world.base.bay("Bay 1").unwrap().reserved_for(), Some("Ghost"));

    let handed_over = world.run_until(200, |w| {
        w.base.bay("Bay 1").map(|b| b.reserved_for() == Some("Hauler")).unwrap_or(false)
    });
    assert!(handed_over.is_some());
    assert!(world.base.requests().get("Ghost").is_none());
    assert!(matches!(
        world.base.requests().get("Hauler").map(|r| &r.state),
        Some(RequestState::Assigned { bay, .. }) if bay == "Bay 1"
    ));

    assert!(world.run_until(3_000, |w| docked_at(w, hauler, "Bay 1")).is_some());
    assert_eq!(world.status(ghost), ShipStatus::WaitingForBay);
}

#[test]
fn test_undock_returns_ship_to_idle_and_frees_bay() {
    let mut world = World::new(test_config(), &[("Bay 1", Vec3::ZERO)]);
    let ship = world.add_ship("Courier", Vec3::new(-15.0, 0.0, 80.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_dock(ship);
    assert!(world.run_until(3_000, |w| docked_at(w, ship, "Bay 1")).is_some());
    assert!(!world.base.bay("Bay 1").unwrap().is_free());

    world.request_undock(ship);
    let report = world.step();
    assert_eq!(report.base.undocked, vec!["Courier".to_string()]);
    assert_eq!(world.status(ship), ShipStatus::Undocking);
    assert!(world.connectors[0].other_ship().is_none());

    assert!(world.run_until(3_000, |w| w.status(ship) == ShipStatus::Idle).is_some());
    world.step();

    assert!(world.base.bay("Bay 1").unwrap().is_free());
    assert!(world.ships[ship].agent.bay().is_none());
    let clearance = world.ships[ship].sim.position().distance(world.connectors[0].position());
    assert!(clearance > 30.0, "only {} m clear", clearance);
}

#[test]
fn test_undock_from_unknown_ship_ignored() {
    let mut world = World::new(test_config(), &[("Bay 1", Vec3::ZERO)]);
    let ship = world.add_ship("Drifter", Vec3::new(0.0, 0.0, 80.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_undock(ship);
    let report = world.step();
    assert!(report.base.undocked.is_empty());
    assert_eq!(world.status(ship), ShipStatus::Idle);
}

#[test]
fn test_base_restart_resumes_assignment() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("base.db");
    let store = SqliteSnapshotStore::open(&path).unwrap();
    let mut world = World::with_bus(test_config(), &[("Bay 1", Vec3::ZERO)], MemoryBus::new(), Box::new(store));

    let ship = world.add_ship("Tanker", Vec3::new(10.0, 0.0, 100.0), -Vec3::UNIT_Z, Vec3::UNIT_Y);
    world.request_dock(ship);
    let underway = world.run_until(2_000, |w| {
        w.ships[ship]
            .agent
            .controller()
            .progress()
            .is_some_and(|p| p.index >= 1)
    });
    assert!(underway.is_some());
    let before = world.base.snapshot();
    assert!(matches!(before.requests[0].state, RequestState::Assigned { .. }));

    let restored = world
        .restart_base(Box::new(SqliteSnapshotStore::open(&path).unwrap()))
        .unwrap();
    assert!(restored);
    assert_eq!(world.base.snapshot(), before);
    assert_eq!(world.base.bay("Bay 1").unwrap().reserved_for(), Some("Tanker"));

    assert!(world.run_until(3_000, |w| docked_at(w, ship, "Bay 1")).is_some());
    assert!(world.base.requests().is_empty());
}
