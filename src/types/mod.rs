//! Document types for the run store
//!
//! RunStart → Descriptor → Event, plus the RunStop control-plane record.

mod descriptor;
mod event;
mod run;

pub use descriptor::Descriptor;
pub use event::Event;
pub use run::{RunStart, RunStop};
