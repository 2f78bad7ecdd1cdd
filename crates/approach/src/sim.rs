//! Rigid-body stand-in for real ship hardware.
//!
//! Six body-fixed thrusters (one per local direction), a rate-commanded gyro
//! and a connector flag. [`SimulatedShip::step`] integrates with explicit
//! Euler; good enough for driving the controller in tests and demos.

use crate::hardware::{Gyro, ShipConnector, ShipHandles, ShipMotion, Thruster};
use baymaster_core::Vec3;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy)]
struct Body {
    position: Vec3,
    velocity: Vec3,
    forward: Vec3,
    up: Vec3,
    mass: f64,
    rotation_rate: Vec3,
}

impl Body {
    fn right(&self) -> Vec3 {
        self.forward.cross(self.up)
    }
}

#[derive(Debug, Clone, Copy)]
enum LocalAxis {
    Forward,
    Backward,
    Up,
    Down,
    Right,
    Left,
}

impl LocalAxis {
    const ALL: [LocalAxis; 6] = [
        LocalAxis::Forward,
        LocalAxis::Backward,
        LocalAxis::Up,
        LocalAxis::Down,
        LocalAxis::Right,
        LocalAxis::Left,
    ];

    fn world(self, body: &Body) -> Vec3 {
        match self {
            LocalAxis::Forward => body.forward,
            LocalAxis::Backward => -body.forward,
            LocalAxis::Up => body.up,
            LocalAxis::Down => -body.up,
            LocalAxis::Right => body.right(),
            LocalAxis::Left => -body.right(),
        }
    }
}

type SharedBody = Arc<Mutex<Body>>;

fn lock(body: &SharedBody) -> MutexGuard<'_, Body> {
    body.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug)]
struct SimThruster {
    body: SharedBody,
    axis: LocalAxis,
    max_thrust: f64,
    output: Mutex<f64>,
}

impl SimThruster {
    fn output(&self) -> f64 {
        *self.output.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Thruster for SimThruster {
    fn direction(&self) -> Vec3 {
        self.axis.world(&lock(&self.body))
    }

    fn max_thrust(&self) -> f64 {
        self.max_thrust
    }

    fn set_output(&self, newtons: f64) {
        *self.output.lock().unwrap_or_else(|p| p.into_inner()) = newtons.clamp(0.0, self.max_thrust);
    }
}

#[derive(Debug)]
struct SimGyro {
    body: SharedBody,
}

impl Gyro for SimGyro {
    fn set_rotation(&self, rate: Vec3) {
        lock(&self.body).rotation_rate = rate;
    }

    fn release(&self) {
        lock(&self.body).rotation_rate = Vec3::ZERO;
    }
}

/// Connector that connects whenever asked.
#[derive(Debug, Default)]
pub struct SimConnector {
    connected: AtomicBool,
}

impl ShipConnector for SimConnector {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connect(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}

/// Simulated ship. Clones share the same body.
#[derive(Debug, Clone)]
pub struct SimulatedShip {
    body: SharedBody,
    thrusters: Vec<Arc<SimThruster>>,
    connector: Arc<SimConnector>,
}

impl SimulatedShip {
    /// Ship at rest at `position` with the given frame, mass (kg) and
    /// per-thruster maximum force (N).
    pub fn new(position: Vec3, forward: Vec3, up: Vec3, mass: f64, max_thrust: f64) -> Self {
        let body = Arc::new(Mutex::new(Body {
            position,
            velocity: Vec3::ZERO,
            forward: forward.normalize_or_zero(),
            up: up.normalize_or_zero(),
            mass,
            rotation_rate: Vec3::ZERO,
        }));
        let thrusters = LocalAxis::ALL
            .iter()
            .map(|&axis| {
                Arc::new(SimThruster {
                    body: body.clone(),
                    axis,
                    max_thrust,
                    output: Mutex::new(0.0),
                })
            })
            .collect();
        Self {
            body,
            thrusters,
            connector: Arc::new(SimConnector::default()),
        }
    }

    /// Handles wired to this ship, using its built-in connector.
    pub fn handles(&self) -> ShipHandles {
        self.handles_with(self.connector.clone())
    }

    /// Handles wired to this ship with an external connector.
    pub fn handles_with(&self, connector: Arc<dyn ShipConnector>) -> ShipHandles {
        ShipHandles {
            motion: Arc::new(self.clone()),
            thrusters: self
                .thrusters
                .iter()
                .map(|t| t.clone() as Arc<dyn Thruster>)
                .collect(),
            gyros: vec![Arc::new(SimGyro {
                body: self.body.clone(),
            })],
            connector,
        }
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&self, dt: f64) {
        let outputs: Vec<(LocalAxis, f64)> = self.thrusters.iter().map(|t| (t.axis, t.output())).collect();
        let mut body = lock(&self.body);

        let force = outputs
            .iter()
            .fold(Vec3::ZERO, |acc, (axis, output)| acc + axis.world(&body) * *output);
        let acceleration = force / body.mass;
        body.velocity += acceleration * dt;
        let velocity = body.velocity;
        body.position += velocity * dt;

        let rate = body.rotation_rate;
        if rate.try_normalize().is_some() {
            let angle = rate.length() * dt;
            let forward = body.forward.rotate_about(rate, angle);
            let up = body.up.rotate_about(rate, angle);
            body.forward = forward.normalize_or_zero();
            body.up = (up - body.forward * up.dot(body.forward)).normalize_or_zero();
        }
    }

    /// Move the ship instantly.
    pub fn teleport(&self, position: Vec3) {
        lock(&self.body).position = position;
    }

    pub fn set_velocity(&self, velocity: Vec3) {
        lock(&self.body).velocity = velocity;
    }

    pub fn set_orientation(&self, forward: Vec3, up: Vec3) {
        let mut body = lock(&self.body);
        body.forward = forward.normalize_or_zero();
        body.up = up.normalize_or_zero();
    }

    /// Commanded angular rate.
    pub fn rotation_rate(&self) -> Vec3 {
        lock(&self.body).rotation_rate
    }

    /// Current thruster outputs in newtons.
    pub fn thrust_outputs(&self) -> Vec<f64> {
        self.thrusters.iter().map(|t| t.output()).collect()
    }

    /// Sum of thruster outputs.
    pub fn total_thrust(&self) -> f64 {
        self.thrust_outputs().iter().sum()
    }

    /// Built-in connector.
    pub fn connector(&self) -> Arc<SimConnector> {
        self.connector.clone()
    }
}

impl ShipMotion for SimulatedShip {
    fn position(&self) -> Vec3 {
        lock(&self.body).position
    }

    fn velocity(&self) -> Vec3 {
        lock(&self.body).velocity
    }

    fn forward(&self) -> Vec3 {
        lock(&self.body).forward
    }

    fn up(&self) -> Vec3 {
        lock(&self.body).up
    }

    fn mass(&self) -> f64 {
        lock(&self.body).mass
    }
}
