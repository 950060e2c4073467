//! Named circuit registry.
//!
//! # Responsibilities
//! - Own the name → circuit mapping
//! - Create circuits lazily on first use with default + caller options
//! - Look up, reset and remove circuits
//!
//! The map supports concurrent lookup, insert-if-absent and delete. Each
//! circuit sits behind its own lock so calls on different names never
//! contend.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

use crate::config::validation::validate_options;
use crate::resilience::circuit::{Circuit, Transition};
use crate::resilience::error::InvalidOptions;
use crate::resilience::options::{CircuitOptions, CircuitOptionsUpdate, OptionsChange};

/// Shared handle to one circuit.
pub type CircuitRef = Arc<Mutex<Circuit>>;

/// Result of [`CircuitRegistry::get_or_create`].
#[derive(Debug)]
pub struct Resolved {
    pub circuit: CircuitRef,
    pub created: bool,
    pub change: OptionsChange,
}

#[derive(Debug, Default)]
pub struct CircuitRegistry {
    circuits: DashMap<String, CircuitRef>,
    defaults: CircuitOptions,
}

impl CircuitRegistry {
    pub fn new(defaults: CircuitOptions) -> Self {
        Self {
            circuits: DashMap::new(),
            defaults,
        }
    }

    pub fn defaults(&self) -> &CircuitOptions {
        &self.defaults
    }

    pub fn get(&self, name: &str) -> Option<CircuitRef> {
        self.circuits.get(name).map(|r| r.value().clone())
    }

    /// Fetch the circuit for `name`, creating it if absent, and merge
    /// `update` into its options. Existing counters are kept.
    ///
    /// Merged options that fail validation are rejected: no circuit is
    /// created and an existing one keeps its options.
    pub fn get_or_create(
        &self,
        name: &str,
        update: Option<&CircuitOptionsUpdate>,
        now: Instant,
    ) -> Result<Resolved, InvalidOptions> {
        match self.circuits.entry(name.to_string()) {
            Entry::Occupied(entry) => {
                let circuit = entry.get().clone();
                drop(entry);
                let change = match update {
                    Some(update) => Self::merge(name, &circuit, update)?,
                    None => OptionsChange::default(),
                };
                Ok(Resolved {
                    circuit,
                    created: false,
                    change,
                })
            }
            Entry::Vacant(entry) => {
                let mut options = self.defaults.clone();
                let change = match update {
                    Some(update) => update.apply(&mut options),
                    None => OptionsChange::default(),
                };
                check(name, &options)?;

                let circuit = Arc::new(Mutex::new(Circuit::new(name, options, now)));
                entry.insert(circuit.clone());
                tracing::debug!(circuit = %name, "Circuit created");
                Ok(Resolved {
                    circuit,
                    created: true,
                    change,
                })
            }
        }
    }

    /// Merge `update` into an existing circuit's options if the result is
    /// valid.
    pub fn update(
        &self,
        name: &str,
        update: &CircuitOptionsUpdate,
    ) -> Option<Result<(CircuitRef, OptionsChange), InvalidOptions>> {
        let circuit = self.get(name)?;
        Some(Self::merge(name, &circuit, update).map(|change| (circuit, change)))
    }

    fn merge(
        name: &str,
        circuit: &CircuitRef,
        update: &CircuitOptionsUpdate,
    ) -> Result<OptionsChange, InvalidOptions> {
        let mut guard = circuit.lock();
        let mut options = guard.options().clone();
        let change = update.apply(&mut options);
        if change.changed {
            check(name, &options)?;
            *guard.options_mut() = options;
        }
        Ok(change)
    }

    /// Remove a circuit, cancelling its health timer.
    pub fn remove(&self, name: &str) -> Option<CircuitRef> {
        let (_, circuit) = self.circuits.remove(name)?;
        circuit.lock().cancel_health_timer();
        Some(circuit)
    }

    /// Force a circuit closed. `None` when the name is unknown.
    pub fn reset(&self, name: &str, now: Instant) -> Option<Option<Transition>> {
        let circuit = self.get(name)?;
        let transition = circuit.lock().force_close(now);
        Some(transition)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.circuits.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// All circuits, sorted by name.
    pub fn snapshot(&self) -> Vec<CircuitRef> {
        let mut entries: Vec<(String, CircuitRef)> = self
            .circuits
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, c)| c).collect()
    }

    /// Remove every circuit, cancelling all health timers.
    pub fn clear(&self) {
        for entry in self.circuits.iter() {
            entry.value().lock().cancel_health_timer();
        }
        self.circuits.clear();
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

fn check(name: &str, options: &CircuitOptions) -> Result<(), InvalidOptions> {
    let mut errors = Vec::new();
    validate_options(&format!("circuits.{name}"), options, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(InvalidOptions {
            name: name.to_string(),
            errors,
        })
    }
}
