//! Family network simulation: configuration and the scripted walkthrough.

pub mod config;
pub mod scenario;

pub use config::SimConfig;
pub use scenario::{ScenarioReport, run};
