//! Agent-level components: emotion, vocabulary, emission policy

pub mod agent;
pub mod emission;
pub mod emotion;
pub mod vocabulary;

pub use agent::{Agent, Observation};
pub use emission::CompressionPolicy;
pub use emotion::Stimulus;
pub use vocabulary::{SymbolUsage, VocabularyStore};
