//! Approach controller: turns a waypoint path plus target orientation into
//! gyro and thruster commands, one tick at a time.
//!
//! Each active tick runs, in order:
//! 1. end of path: zero everything, connect (docking only), clear state
//! 2. already connected: nothing to do
//! 3. orientation: while forward or up is off by more than the threshold,
//!    rotate and keep thrust at zero
//! 4. translation: steer toward the current waypoint with a three-segment
//!    speed profile, advancing on arrival
//!
//! Departure paths skip the orientation phase and never connect.

use crate::error::{ApproachError, ApproachResult};
use crate::hardware::ShipHandles;
use baymaster_core::geometry::DEGENERATE_EPSILON;
use baymaster_core::{angle_between, rotation_axis, ApproachConfig, Vec3};
use tracing::{debug, info};

/// What a path is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproachMode {
    /// Toward a bay connector; connects at the end
    Docking,
    /// Away from a bay; translation only
    Departing,
}

impl ApproachMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ApproachMode::Docking => "docking",
            ApproachMode::Departing => "departing",
        }
    }
}

/// A path and the frame to hold while following it.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachPlan {
    pub waypoints: Vec<Vec3>,
    pub forward: Vec3,
    pub up: Vec3,
    pub mode: ApproachMode,
}

impl ApproachPlan {
    /// Check the plan is followable.
    pub fn validate(&self) -> ApproachResult<()> {
        if self.waypoints.is_empty() {
            return Err(ApproachError::EmptyPath);
        }
        if !self.waypoints.iter().all(|p| p.is_finite()) {
            return Err(ApproachError::NonFinite("waypoints"));
        }
        if !self.forward.is_finite() || !self.up.is_finite() {
            return Err(ApproachError::NonFinite("orientation"));
        }
        if self.forward.try_normalize().is_none() || self.up.try_normalize().is_none() {
            return Err(ApproachError::DegenerateOrientation);
        }
        Ok(())
    }
}

/// Plan in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachProgress {
    pub plan: ApproachPlan,
    /// Index of the waypoint being steered toward
    pub index: usize,
}

/// Result of one controller tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No plan
    Idle,
    /// Skipped by the tick throttle; outputs unchanged
    Throttled,
    /// Connector already locked
    Connected,
    /// Rotating; thrust held at zero
    Aligning {
        forward_error: f64,
        up_error: f64,
    },
    /// Thrusting toward the current waypoint
    Translating {
        index: usize,
        distance: f64,
        speed: f64,
    },
    /// Waypoint `index` reached; thrust zeroed
    WaypointReached {
        index: usize,
    },
    /// Path finished; state cleared
    Arrived {
        mode: ApproachMode,
    },
}

/// Drives one ship along one path at a time.
#[derive(Debug)]
pub struct ApproachController {
    config: ApproachConfig,
    handles: ShipHandles,
    progress: Option<ApproachProgress>,
    ticks: u64,
}

impl ApproachController {
    pub fn new(config: ApproachConfig, handles: ShipHandles) -> Self {
        Self {
            config,
            handles,
            progress: None,
            ticks: 0,
        }
    }

    /// Begin following `plan`. Restarting with the plan already in progress
    /// keeps the current waypoint; returns whether progress was resumed.
    pub fn start(&mut self, plan: ApproachPlan) -> ApproachResult<bool> {
        plan.validate()?;
        if let Some(progress) = &self.progress {
            if progress.plan == plan {
                debug!(index = progress.index, "Approach restarted with identical plan, resuming");
                return Ok(true);
            }
        }
        info!(
            mode = plan.mode.as_str(),
            waypoints = plan.waypoints.len(),
            "Approach started"
        );
        self.progress = Some(ApproachProgress { plan, index: 0 });
        Ok(false)
    }

    /// Drop the plan and zero all outputs immediately.
    pub fn abort(&mut self) {
        if self.progress.take().is_some() {
            info!("Approach aborted");
        }
        self.handles.zero_thrust();
        self.handles.release_gyros();
    }

    /// Abort and restart the tick throttle.
    pub fn reset(&mut self) {
        self.abort();
        self.ticks = 0;
    }

    pub fn progress(&self) -> Option<&ApproachProgress> {
        self.progress.as_ref()
    }

    /// Restore progress and the throttle counter from a snapshot.
    pub fn restore(&mut self, progress: Option<ApproachProgress>, ticks: u64) {
        self.progress = progress;
        self.ticks = ticks;
    }

    /// Ticks counted by the throttle since the last reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_active(&self) -> bool {
        self.progress.is_some()
    }

    pub fn handles(&self) -> &ShipHandles {
        &self.handles
    }

    /// Run one control tick.
    pub fn tick(&mut self) -> TickOutcome {
        let Some(progress) = &self.progress else {
            return TickOutcome::Idle;
        };

        self.ticks += 1;
        if self.ticks % u64::from(self.config.tick_throttle.max(1)) != 0 {
            return TickOutcome::Throttled;
        }

        let mode = progress.plan.mode;
        if progress.index >= progress.plan.waypoints.len() {
            return self.arrive(mode);
        }

        if self.handles.connector.is_connected() {
            return TickOutcome::Connected;
        }

        if mode == ApproachMode::Docking {
            if let Some(outcome) = self.align() {
                return outcome;
            }
        }
        self.translate()
    }

    fn arrive(&mut self, mode: ApproachMode) -> TickOutcome {
        self.progress = None;
        self.handles.zero_thrust();
        self.handles.release_gyros();
        if mode == ApproachMode::Docking {
            self.handles.connector.connect();
        }
        info!(mode = mode.as_str(), "Approach complete");
        TickOutcome::Arrived { mode }
    }

    /// Rotate toward the target frame. `None` once both axes are within the
    /// threshold.
    fn align(&self) -> Option<TickOutcome> {
        let progress = self.progress.as_ref()?;
        let motion = &self.handles.motion;
        let forward = motion.forward();
        let up = motion.up();
        let target_forward = progress.plan.forward;
        let target_up = progress.plan.up;

        let forward_error = angle_between(forward, target_forward);
        let up_error = angle_between(up, target_up);
        let threshold = self.config.gyro_threshold;
        if forward_error <= threshold && up_error <= threshold {
            self.handles.release_gyros();
            return None;
        }

        let mut rate = Vec3::ZERO;
        if forward_error > threshold {
            rate += correction(forward, target_forward, up, forward_error);
        }
        if up_error > threshold {
            rate += correction(up, target_up, forward, up_error);
        }
        rate = rate * self.config.gyro_speed;

        self.handles.zero_thrust();
        self.handles.set_rotation(rate);
        Some(TickOutcome::Aligning {
            forward_error,
            up_error,
        })
    }

    fn translate(&mut self) -> TickOutcome {
        let Some(progress) = self.progress.as_mut() else {
            return TickOutcome::Idle;
        };
        let motion = &self.handles.motion;
        let count = progress.plan.waypoints.len();
        let index = progress.index;
        let target = progress.plan.waypoints[index];
        let offset = target - motion.position();
        let distance = offset.length();

        if distance < self.config.arrival_threshold {
            progress.index += 1;
            self.handles.zero_thrust();
            debug!(index, remaining = count - progress.index, "Waypoint reached");
            return TickOutcome::WaypointReached { index };
        }

        let speed = desired_speed(&self.config, index, count, distance);
        let desired_velocity = offset / distance * speed;
        let force = (desired_velocity - motion.velocity()) * (motion.mass() * self.config.force_gain);
        for thruster in &self.handles.thrusters {
            let projected = force.dot(thruster.direction());
            thruster.set_output(projected.clamp(0.0, thruster.max_thrust()));
        }

        TickOutcome::Translating {
            index,
            distance,
            speed,
        }
    }
}

/// Rotation that turns `from` toward `to`, scaled by `sin(angle)`. Parallel
/// or anti-parallel directions have no usable cross product and get the unit
/// `fallback` axis instead.
fn correction(from: Vec3, to: Vec3, fallback: Vec3, angle: f64) -> Vec3 {
    let axis = rotation_axis(from, to, fallback);
    if from.cross(to).length() < DEGENERATE_EPSILON {
        axis
    } else {
        axis * angle.sin()
    }
}

/// Target speed toward waypoint `index` of `count`, `distance` metres away.
///
/// First and last waypoints use their own speeds and ramp down linearly
/// inside the slowdown distance; interior waypoints use the medium speed
/// with no ramp. The result never drops below `min_speed`. A one-point path
/// counts as its last waypoint.
pub fn desired_speed(config: &ApproachConfig, index: usize, count: usize, distance: f64) -> f64 {
    let is_last = index + 1 >= count;
    let is_first = index == 0;
    let cruise = if is_last {
        config.last_speed
    } else if is_first {
        config.first_speed
    } else {
        config.medium_speed
    };

    let ramped = if (is_first || is_last) && distance < config.slowdown_distance {
        cruise * distance / config.slowdown_distance
    } else {
        cruise
    };
    ramped.max(config.min_speed)
}
