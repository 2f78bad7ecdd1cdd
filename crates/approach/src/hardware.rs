//! Ship-side capability handles.
//!
//! Supplied once at startup; the controller never looks hardware up by name.
//! All methods take `&self` so handles can be shared with a simulator or a
//! host telemetry feed.

use baymaster_core::Vec3;
use std::sync::Arc;

/// One thruster. Pushes the ship along [`direction`](Self::direction) only.
pub trait Thruster: Send + Sync {
    /// World-space unit direction the thruster accelerates the ship in.
    fn direction(&self) -> Vec3;

    /// Maximum force in newtons.
    fn max_thrust(&self) -> f64;

    /// Commanded force in newtons, `0..=max_thrust`.
    fn set_output(&self, newtons: f64);
}

/// Gyroscope override.
pub trait Gyro: Send + Sync {
    /// Command a world-space angular rate (rad/s, axis times magnitude).
    fn set_rotation(&self, rate: Vec3);

    /// Hand control back to the ship's own stabilization.
    fn release(&self);
}

/// Motion telemetry of the ship's reference point.
pub trait ShipMotion: Send + Sync {
    fn position(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
    /// Forward unit vector
    fn forward(&self) -> Vec3;
    /// Up unit vector
    fn up(&self) -> Vec3;
    /// Mass in kilograms
    fn mass(&self) -> f64;
}

/// The ship's own docking connector.
pub trait ShipConnector: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Start the mechanical connection sequence.
    fn connect(&self);

    /// Release the connection.
    fn disconnect(&self);
}

/// Every handle the approach controller drives.
#[derive(Clone)]
pub struct ShipHandles {
    pub motion: Arc<dyn ShipMotion>,
    pub thrusters: Vec<Arc<dyn Thruster>>,
    pub gyros: Vec<Arc<dyn Gyro>>,
    pub connector: Arc<dyn ShipConnector>,
}

impl ShipHandles {
    /// Zero every thruster.
    pub fn zero_thrust(&self) {
        for thruster in &self.thrusters {
            thruster.set_output(0.0);
        }
    }

    /// Command the same rate on every gyro.
    pub fn set_rotation(&self, rate: Vec3) {
        for gyro in &self.gyros {
            gyro.set_rotation(rate);
        }
    }

    /// Release every gyro override.
    pub fn release_gyros(&self) {
        for gyro in &self.gyros {
            gyro.release();
        }
    }
}

impl std::fmt::Debug for ShipHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipHandles")
            .field("thrusters", &self.thrusters.len())
            .field("gyros", &self.gyros.len())
            .finish()
    }
}
