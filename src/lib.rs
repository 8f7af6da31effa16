pub mod artifacts;
pub mod cli;
pub mod config;
pub mod crew;
pub mod doctor;
pub mod engine;
pub mod error;
pub mod generator;
pub mod naming;
pub mod profiles;
pub mod provider;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
mod tests;
