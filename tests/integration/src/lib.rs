//! End-to-end docking scenarios
//!
//! A base coordinator and several simulated ships share one in-memory
//! broadcast bus and one manual clock. The suite covers:
//! - complete dock and undock cycles driven by physics
//! - bay exclusivity with competing ships
//! - recovery over a lossy, duplicating channel
//! - reservation timeout when a ship goes silent
//! - base restart from a SQLite snapshot

pub mod test_utils;

#[cfg(test)]
mod docking_scenarios;
