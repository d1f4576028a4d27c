//! depdoctor - npm dependency upgrade checker library
//!
//! This library provides the core functionality for checking npm
//! dependencies against newer registry versions:
//! - semver specifier parsing and target policy resolution
//! - concurrent registry fetching with a TTL cache
//! - format-preserving package.json rewriting
//! - a doctor protocol that verifies upgrades against the project's tests

pub mod cache;
pub mod cli;
pub mod doctor;
pub mod domain;
pub mod engine;
pub mod error;
pub mod filter;
pub mod manifest;
pub mod output;
pub mod package_manager;
pub mod progress;
pub mod registry;
pub mod resolver;
