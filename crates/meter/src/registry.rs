//! Named meters
//!
//! Applications that measure in several places without threading a meter
//! through every call keep one [`MeterRegistry`] and look meters up by key.

use crate::meter::{Meter, MeterConfig};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Key used by [`MeterRegistry::get_default`].
pub const DEFAULT_METER: &str = "default";

/// Keyed collection of shared meters
#[derive(Debug, Default)]
pub struct MeterRegistry {
    /// Settings for meters the registry creates itself
    config: MeterConfig,
    meters: BTreeMap<String, Rc<Meter>>,
}

impl MeterRegistry {
    /// Create an empty registry creating default meters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry whose meters use `config`.
    pub fn with_config(config: MeterConfig) -> Self {
        Self {
            config,
            meters: BTreeMap::new(),
        }
    }

    /// Settings used for new meters.
    pub fn config(&self) -> &MeterConfig {
        &self.config
    }

    /// The meter under `key`, created on first request.
    pub fn get(&mut self, key: &str) -> Rc<Meter> {
        if let Some(meter) = self.meters.get(key) {
            return Rc::clone(meter);
        }
        tracing::debug!(target: "meter::registry", key, "creating meter");
        let meter = Rc::new(Meter::with_config(self.config.clone()));
        self.meters.insert(key.to_string(), Rc::clone(&meter));
        meter
    }

    /// The meter under [`DEFAULT_METER`], created on first request.
    pub fn get_default(&mut self) -> Rc<Meter> {
        self.get(DEFAULT_METER)
    }

    /// The meter under `key` if there is one.
    pub fn find(&self, key: &str) -> Option<Rc<Meter>> {
        self.meters.get(key).cloned()
    }

    /// Register `meter` under `key`, returning the meter it replaces.
    pub fn set_meter(&mut self, key: &str, meter: Rc<Meter>) -> Option<Rc<Meter>> {
        self.meters.insert(key.to_string(), meter)
    }

    /// Register `meter` as the default meter.
    pub fn set_default(&mut self, meter: Rc<Meter>) -> Option<Rc<Meter>> {
        self.set_meter(DEFAULT_METER, meter)
    }

    /// Snapshot of every registered meter, sorted by key.
    pub fn all(&self) -> Vec<(String, Rc<Meter>)> {
        self.meters
            .iter()
            .map(|(key, meter)| (key.clone(), Rc::clone(meter)))
            .collect()
    }

    /// Number of registered meters.
    pub fn len(&self) -> usize {
        self.meters.len()
    }

    /// True when no meter is registered.
    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }

    /// Forget the meter under `key`. Holders of the meter keep it alive.
    pub fn clear_meter(&mut self, key: &str) -> Option<Rc<Meter>> {
        let removed = self.meters.remove(key);
        if removed.is_some() {
            tracing::debug!(target: "meter::registry", key, "meter removed");
        }
        removed
    }

    /// Forget every meter.
    pub fn clear_all(&mut self) {
        tracing::debug!(target: "meter::registry", count = self.meters.len(), "clearing meters");
        self.meters.clear();
    }
}
