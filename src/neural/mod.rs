//! Neural service interfaces
//!
//! This module provides:
//! - `SeparationService` trait for vocal/accompaniment separation
//! - `NoSeparation`, the default when no backend is installed
//! - Mock backends for pipeline testing

mod mock;
mod separation;

pub use mock::{MockBehavior, MockSeparation};
pub use separation::{NoSeparation, SeparatedStems, SeparationService};
