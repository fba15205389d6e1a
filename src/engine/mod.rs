//! Engine module - dependency graph and recomputation orchestration
//! over the collaborator traits.

mod dependency_graph;
mod engine_traits;
mod orchestrator;


pub use dependency_graph::DependencyGraph;
pub use engine_traits::{
    FxRateProvider, HoldingsProvider, IdentifierValueProvider, RawValue, RecomputeTrigger,
};
pub use orchestrator::RecomputeOrchestrator;
