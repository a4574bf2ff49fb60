pub mod cancel;
pub mod config;
pub mod error;
pub mod types;

pub use cancel::{CancelFlag, RunStatus};
pub use config::{DetectorConfig, EmergenceConfig, SimulationConfig};
pub use error::{EmergenceError, Result};
pub use types::{AgentId, Symbol, Tick, Vad};
