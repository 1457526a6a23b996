//! Hardware-independent core library for sprout
//!
//! This crate contains all platform-agnostic logic for the sprout sensing
//! node: battery sampling and calibration, the charge-trend history, the
//! sleep-duration policy, the pure per-wake cycle planner, the upload
//! payload/retry client and the async cycle controller that sequences them.
//!
//! Hardware is reached only through the traits in [`sensors`] and [`upload`],
//! plus `embedded-hal` pins and delays, so every decision can be exercised on
//! a desktop host (tests and the simulator) as well as on the ESP32-C6.

#![cfg_attr(not(test), no_std)]

pub mod battery;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod history;
pub mod indicator;
#[cfg(test)]
mod mock;
pub mod policy;
pub mod reading;
pub mod sensors;
pub mod state;
pub mod trend;
pub mod upload;

pub use config::NodeConfig;
pub use controller::{CycleController, CycleReport, NodePeripherals, UploadOutcome};
pub use cycle::{CycleInputs, CyclePlan, NetworkAction, SuppressReason, plan_cycle};
pub use policy::{PowerState, SleepDecision, SleepPolicy};
pub use state::{CycleState, WakeCause};
