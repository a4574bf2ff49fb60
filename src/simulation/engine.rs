//! Simulation engine - owns the population and advances it tick by tick
//!
//! Each tick runs four phases over the whole population:
//! observe -> emotion update -> emission -> consolidation, then emits one
//! `TickMetricRecord`. Observations are gathered for every agent before any
//! agent changes, so no agent ever reads another's post-update state within
//! the same tick.
//!
//! All state lives in the `Simulation` value; separate instances share
//! nothing and can run side by side.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::cancel::{CancelFlag, RunStatus};
use crate::core::config::SimulationConfig;
use crate::core::error::{EmergenceError, Result};
use crate::core::types::{AgentId, Symbol, Tick, Vad};
use crate::entity::agent::{Agent, Observation};
use crate::entity::emission::CompressionPolicy;
use crate::entity::vocabulary::VocabularyStore;
use crate::simulation::metrics::{
    EmergenceMetrics, PopulationView, ReferenceMetrics, TickMetricRecord,
};
use crate::simulation::snapshot::{AgentSample, PopulationSnapshot};
use crate::simulation::state::SimulationState;

const POPULATION_VOCABULARY: &str = "population vocabulary";

/// Records produced by a run plus how the run ended
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub records: Vec<TickMetricRecord>,
    pub status: RunStatus,
}

pub struct Simulation {
    config: SimulationConfig,
    policy: CompressionPolicy,
    metrics: Box<dyn EmergenceMetrics>,
    agents: Vec<Agent>,
    /// Ring neighbors of each agent, by index
    neighbors: Vec<Vec<usize>>,
    population_vocabulary: VocabularyStore,
    /// Next tick to simulate
    tick: Tick,
    rng: ChaCha8Rng,
}

impl Simulation {
    /// Create a simulation with the reference emergence metrics
    pub fn new(config: SimulationConfig) -> Result<Self> {
        let metrics = Box::new(ReferenceMetrics::new(config.cluster_radius));
        Self::with_metrics(config, metrics)
    }

    /// Create a simulation with a custom metrics strategy
    ///
    /// Fails fast with a configuration error before any state is built.
    pub fn with_metrics(
        config: SimulationConfig,
        metrics: Box<dyn EmergenceMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let bias = config.emotion.valence_bias;
        let spread = config.initial_spread;

        let agents = (0..config.population)
            .map(|i| {
                let valence = bias + jitter(&mut rng, spread);
                let arousal = jitter(&mut rng, 0.5);
                let dominance = jitter(&mut rng, 0.5);
                Agent::new(
                    AgentId(i as u32),
                    Vad::new(valence, arousal, dominance),
                    config.alphabet_size,
                    config.compression.prior_strength,
                )
            })
            .collect();

        let neighbors = ring_neighbors(config.population, config.neighbor_radius);
        let policy = CompressionPolicy::new(config.compression.clone(), config.alphabet_size);

        tracing::info!(
            seed = config.seed,
            population = config.population,
            window = config.vocabulary_window,
            valence_bias = bias,
            "simulation initialized"
        );

        Ok(Self {
            config,
            policy,
            metrics,
            agents,
            neighbors,
            population_vocabulary: VocabularyStore::named(POPULATION_VOCABULARY),
            tick: 0,
            rng,
        })
    }

    /// Rebuild a simulation from saved state with the reference metrics
    pub fn restore(state: SimulationState) -> Result<Self> {
        let metrics = Box::new(ReferenceMetrics::new(state.config.cluster_radius));
        Self::restore_with_metrics(state, metrics)
    }

    /// Rebuild a simulation from saved state with a custom metrics strategy
    ///
    /// The saved configuration is validated and must agree with the saved
    /// population. A rewound `tick` is not checked here; the first `step`
    /// rejects it.
    pub fn restore_with_metrics(
        state: SimulationState,
        metrics: Box<dyn EmergenceMetrics>,
    ) -> Result<Self> {
        let SimulationState {
            config,
            tick,
            mut agents,
            mut population_vocabulary,
            rng,
        } = state;
        config.validate()?;

        if agents.len() != config.population {
            return Err(EmergenceError::config(
                "population",
                agents.len(),
                "saved agent count differs from the saved configuration",
            ));
        }
        if let Some(agent) = agents
            .iter()
            .find(|a| a.familiarity().len() != config.alphabet_size)
        {
            return Err(EmergenceError::config(
                "alphabet_size",
                agent.familiarity().len(),
                "saved agent alphabet differs from the saved configuration",
            ));
        }

        for agent in &mut agents {
            agent.relabel_vocabulary();
        }
        population_vocabulary.relabel(POPULATION_VOCABULARY);

        let neighbors = ring_neighbors(config.population, config.neighbor_radius);
        let policy = CompressionPolicy::new(config.compression.clone(), config.alphabet_size);

        tracing::info!(
            tick,
            seed = config.seed,
            population = config.population,
            "simulation restored"
        );

        Ok(Self {
            config,
            policy,
            metrics,
            agents,
            neighbors,
            population_vocabulary,
            tick,
            rng,
        })
    }

    /// Copy of everything needed to resume this run later
    pub fn state(&self) -> SimulationState {
        SimulationState {
            config: self.config.clone(),
            tick: self.tick,
            agents: self.agents.clone(),
            population_vocabulary: self.population_vocabulary.clone(),
            rng: self.rng.clone(),
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// Tick that the next call to `step` will simulate (= ticks completed)
    pub fn current_tick(&self) -> Tick {
        self.tick
    }

    pub fn population_vocabulary(&self) -> &VocabularyStore {
        &self.population_vocabulary
    }

    /// Advance exactly one tick and return its record
    ///
    /// On error nothing has changed: every store is checked against the tick
    /// before the first phase runs.
    pub fn step(&mut self) -> Result<TickMetricRecord> {
        let tick = self.tick;
        let window = self.config.vocabulary_window;

        self.population_vocabulary.check_tick(tick)?;
        for agent in &self.agents {
            agent.vocabulary().check_tick(tick)?;
        }

        let Self {
            config,
            policy,
            metrics,
            agents,
            neighbors,
            population_vocabulary,
            rng,
            ..
        } = self;

        // Phase 1: observation (read-only)
        let population: &[Agent] = &agents[..];
        let observations: Vec<Observation> = population
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                let seen: Vec<&Agent> = neighbors[i].iter().map(|&j| &population[j]).collect();
                agent.observe(&seen, tick, window)
            })
            .collect();

        // Phase 2: emotion update, each agent from its own observation
        for (agent, observation) in agents.iter_mut().zip(&observations) {
            agent.update_emotion(observation, &config.emotion);
        }

        // Phase 3: emission from post-update valence
        let emissions: Vec<Vec<Symbol>> = agents
            .iter()
            .map(|agent| agent.emit(&*policy, config.emissions_per_tick, &mut *rng))
            .collect();

        // Phase 4: consolidation
        for ((agent, emitted), observation) in agents.iter_mut().zip(emissions).zip(&observations)
        {
            for symbol in &emitted {
                population_vocabulary.record_use(*symbol, tick)?;
            }
            agent.commit(emitted, &observation.heard, tick, config.compression.adoption)?;
            agent.evict_stale(tick, window);
        }
        population_vocabulary.evict(tick, window);

        let vocabulary_size = population_vocabulary.vocabulary_size(tick, window);
        let view = PopulationView {
            tick,
            agents: &agents[..],
            vocabulary_size,
        };
        let emotion = Vad::mean(agents.iter().map(|a| a.vad())).unwrap_or_default();

        let record = TickMetricRecord {
            tick,
            score: metrics.score(&view),
            recursion_depth: metrics.recursion_depth(&view),
            cluster_count: metrics.cluster_count(&view),
            vocabulary_size: vocabulary_size as u32,
            emotion_aggregate: emotion.into(),
        };

        tracing::debug!(
            tick,
            score = record.score,
            vocabulary = record.vocabulary_size,
            clusters = record.cluster_count,
            depth = record.recursion_depth,
            "tick complete"
        );

        self.tick += 1;
        Ok(record)
    }

    /// Run `ticks` ticks to completion
    pub fn run(&mut self, ticks: u64) -> Result<Vec<TickMetricRecord>> {
        let mut records = Vec::with_capacity(ticks as usize);
        for _ in 0..ticks {
            records.push(self.step()?);
        }
        Ok(records)
    }

    /// Run up to `ticks` ticks, stopping early at a tick boundary when
    /// `cancel` is set
    pub fn run_cancellable(&mut self, ticks: u64, cancel: &CancelFlag) -> Result<SimulationRun> {
        let mut records = Vec::new();
        let status = self.run_with(ticks, cancel, |record, _| {
            records.push(record.clone());
            Ok(())
        })?;
        Ok(SimulationRun { records, status })
    }

    /// Run up to `ticks` ticks, handing each record and the post-tick state
    /// to `on_record`
    ///
    /// The flag is checked before every tick. A tick that has started always
    /// finishes and its record is delivered before the run stops.
    pub fn run_with<F>(
        &mut self,
        ticks: u64,
        cancel: &CancelFlag,
        mut on_record: F,
    ) -> Result<RunStatus>
    where
        F: FnMut(&TickMetricRecord, &Simulation) -> Result<()>,
    {
        let mut last: Option<Tick> = None;
        for _ in 0..ticks {
            if cancel.is_cancelled() {
                tracing::info!(after = ?last, "simulation cancelled");
                return Ok(RunStatus::Cancelled { after: last });
            }
            let record = self.step()?;
            last = Some(record.tick);
            on_record(&record, self)?;
        }
        Ok(RunStatus::Completed)
    }

    /// Capture population-level state plus up to `sample` agents
    pub fn snapshot(&self, sample: usize) -> PopulationSnapshot {
        let window = self.config.vocabulary_window;
        let last_tick = self.tick.checked_sub(1);
        let vocabulary_size = last_tick
            .map(|t| self.population_vocabulary.vocabulary_size(t, window))
            .unwrap_or(0);

        PopulationSnapshot {
            ticks_completed: self.tick,
            agent_count: self.agents.len(),
            vocabulary_size,
            emotion_aggregate: Vad::mean(self.agents.iter().map(|a| a.vad()))
                .unwrap_or_default(),
            sample_agents: self
                .agents
                .iter()
                .take(sample)
                .map(AgentSample::from_agent)
                .collect(),
        }
    }
}

fn jitter<R: Rng>(rng: &mut R, half_width: f32) -> f32 {
    if half_width <= 0.0 {
        0.0
    } else {
        rng.gen_range(-half_width..=half_width)
    }
}

/// Neighbor indices on a ring: up to `radius` agents on each side, excluding
/// the agent itself and without duplicates on small rings
pub fn ring_neighbors(population: usize, radius: usize) -> Vec<Vec<usize>> {
    (0..population)
        .map(|i| {
            let mut around: Vec<usize> = (1..=radius.min(population))
                .flat_map(|d| {
                    let d = d % population;
                    [(i + d) % population, (i + population - d) % population]
                })
                .filter(|&j| j != i)
                .collect();
            around.sort_unstable();
            around.dedup();
            around
        })
        .collect()
}
