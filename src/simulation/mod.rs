pub mod engine;
pub mod ensemble;
pub mod metrics;
pub mod snapshot;
pub mod state;

pub use engine::{ring_neighbors, Simulation, SimulationRun};
pub use ensemble::{fitted_slope, run_ensemble, valence_sweep, SweepPoint};
pub use metrics::{
    EmergenceMetrics, EmotionAggregate, PopulationView, ReferenceMetrics, TickMetricRecord,
};
pub use snapshot::{AgentSample, PopulationSnapshot};
pub use state::SimulationState;
