//! Core domain models for depdoctor
//!
//! This module contains the fundamental types used throughout the crate:
//! - Specifier parsing into comparator clauses
//! - Published version sets with dist-tags and deprecation flags
//! - Target policies (fixed modes and custom callbacks)
//! - Upgrade decisions

pub mod comparator;
mod decision;
mod target;
mod version_set;

pub use comparator::{has_non_registry_protocol, Comparator, Operator, Specifier, SpecifierKind};
pub use decision::{SkipReason, UpgradeDecision};
pub use target::{Target, TargetFn, TargetPolicy};
pub use version_set::VersionSet;
