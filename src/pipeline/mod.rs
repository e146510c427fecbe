// src/pipeline/mod.rs — The factory pipeline

pub mod machine;
pub mod orchestrator;
pub mod snapshot;
pub mod stages;
pub mod state;

pub use machine::Stage;
pub use orchestrator::{FactoryOutcome, Orchestrator};
pub use state::{EnvMode, FactoryRequest, FactoryState};
