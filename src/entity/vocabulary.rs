//! Symbol vocabulary store with a rolling-window index
//!
//! Each symbol is filed under the tick of its most recent use in an ordered
//! map, so a window query only touches the ticks inside the window and
//! eviction drops whole stale buckets at once.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::core::error::{EmergenceError, Result};
use crate::core::types::{Symbol, Tick};

/// Usage weight and recency of a single symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUsage {
    pub count: u64,
    pub first_used: Tick,
    pub last_used: Tick,
}

/// Per-agent or population-level record of symbol usage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "StoredVocabulary", into = "StoredVocabulary")]
pub struct VocabularyStore {
    usage: AHashMap<Symbol, SymbolUsage>,
    /// last-use tick -> symbols whose most recent use is that tick
    by_last_use: BTreeMap<Tick, AHashSet<Symbol>>,
    last_committed: Option<Tick>,
    /// Human-readable owner for ordering errors
    #[serde(skip)]
    component: &'static str,
}

impl VocabularyStore {
    pub fn new() -> Self {
        Self::named("vocabulary store")
    }

    pub fn named(component: &'static str) -> Self {
        Self {
            usage: AHashMap::new(),
            by_last_use: BTreeMap::new(),
            last_committed: None,
            component,
        }
    }

    /// Register one use of `symbol` at `tick`
    ///
    /// Repeated symbols and many uses within one tick are fine. A tick earlier
    /// than the last committed tick is rejected and leaves the store unchanged.
    pub fn record_use(&mut self, symbol: Symbol, tick: Tick) -> Result<()> {
        self.check_tick(tick)?;

        match self.usage.get_mut(&symbol) {
            Some(entry) => {
                if entry.last_used != tick {
                    remove_from_bucket(&mut self.by_last_use, entry.last_used, symbol);
                    self.by_last_use.entry(tick).or_default().insert(symbol);
                    entry.last_used = tick;
                }
                entry.count += 1;
            }
            None => {
                self.usage.insert(
                    symbol,
                    SymbolUsage {
                        count: 1,
                        first_used: tick,
                        last_used: tick,
                    },
                );
                self.by_last_use.entry(tick).or_default().insert(symbol);
            }
        }

        self.last_committed = Some(tick);
        Ok(())
    }

    /// Fails with `Ordering` if `tick` precedes the last committed tick
    pub fn check_tick(&self, tick: Tick) -> Result<()> {
        match self.last_committed {
            Some(last) if tick < last => Err(EmergenceError::Ordering {
                component: self.component,
                tick,
                last,
            }),
            _ => Ok(()),
        }
    }

    pub(crate) fn relabel(&mut self, component: &'static str) {
        self.component = component;
    }

    /// Distinct symbols whose most recent use falls in (current_tick - window, current_tick]
    pub fn vocabulary_size(&self, current_tick: Tick, window: Tick) -> usize {
        self.by_last_use
            .range(window_bounds(current_tick, window))
            .map(|(_, symbols)| symbols.len())
            .sum()
    }

    /// Whether `symbol` was used inside the window ending at `current_tick`
    pub fn contains(&self, symbol: Symbol, current_tick: Tick, window: Tick) -> bool {
        match self.usage.get(&symbol) {
            Some(usage) => {
                usage.last_used <= current_tick
                    && current_tick
                        .checked_sub(window)
                        .map_or(true, |floor| usage.last_used > floor)
            }
            None => false,
        }
    }

    /// Symbols active in the window, ordered by symbol id
    pub fn active_symbols(&self, current_tick: Tick, window: Tick) -> Vec<Symbol> {
        let mut symbols: Vec<Symbol> = self
            .by_last_use
            .range(window_bounds(current_tick, window))
            .flat_map(|(_, symbols)| symbols.iter().copied())
            .collect();
        symbols.sort_unstable();
        symbols
    }

    /// Drop every symbol whose most recent use is at or before `current_tick - window`
    ///
    /// Returns the number of symbols evicted.
    pub fn evict(&mut self, current_tick: Tick, window: Tick) -> usize {
        let Some(floor) = current_tick.checked_sub(window) else {
            return 0;
        };
        let keep = self.by_last_use.split_off(&(floor + 1));
        let stale = std::mem::replace(&mut self.by_last_use, keep);

        let mut evicted = 0;
        for symbol in stale.into_values().flatten() {
            self.usage.remove(&symbol);
            evicted += 1;
        }
        evicted
    }

    pub fn usage(&self, symbol: Symbol) -> Option<&SymbolUsage> {
        self.usage.get(&symbol)
    }

    pub fn last_committed(&self) -> Option<Tick> {
        self.last_committed
    }

    /// Symbols currently tracked (active or not yet evicted)
    pub fn tracked(&self) -> usize {
        self.usage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usage.is_empty()
    }
}

/// On-disk form: usage sorted by symbol, the recency index is rebuilt on load
#[derive(Serialize, Deserialize)]
struct StoredVocabulary {
    usage: Vec<(Symbol, SymbolUsage)>,
    last_committed: Option<Tick>,
}

impl From<VocabularyStore> for StoredVocabulary {
    fn from(store: VocabularyStore) -> Self {
        let mut usage: Vec<(Symbol, SymbolUsage)> = store.usage.into_iter().collect();
        usage.sort_unstable_by_key(|(symbol, _)| *symbol);
        Self {
            usage,
            last_committed: store.last_committed,
        }
    }
}

impl From<StoredVocabulary> for VocabularyStore {
    fn from(stored: StoredVocabulary) -> Self {
        let mut store = VocabularyStore::new();
        for (symbol, usage) in stored.usage {
            store
                .by_last_use
                .entry(usage.last_used)
                .or_default()
                .insert(symbol);
            store.usage.insert(symbol, usage);
        }
        store.last_committed = stored.last_committed;
        store
    }
}

fn remove_from_bucket(index: &mut BTreeMap<Tick, AHashSet<Symbol>>, tick: Tick, symbol: Symbol) {
    if let Some(bucket) = index.get_mut(&tick) {
        bucket.remove(&symbol);
        if bucket.is_empty() {
            index.remove(&tick);
        }
    }
}

fn window_bounds(current_tick: Tick, window: Tick) -> (Bound<Tick>, Bound<Tick>) {
    let lower = match current_tick.checked_sub(window) {
        Some(floor) => Bound::Excluded(floor),
        None => Bound::Unbounded,
    };
    (lower, Bound::Included(current_tick))
}
