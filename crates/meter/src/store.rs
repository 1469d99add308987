//! Path-keyed measurement storage

use crate::path::{Forest, MeasurementPath};
use crate::timing::TimeSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated timing for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Where this measurement sits in its forest
    pub path: MeasurementPath,
    /// Number of entries into this path, reentrant ones included
    pub count: u64,
    /// Accumulated time of the outermost entries
    pub time: TimeSample,
    /// Number of frames currently measuring this path
    #[serde(skip)]
    pub(crate) depth: u32,
}

impl Measurement {
    /// Create an empty measurement for `path`.
    pub fn new(path: MeasurementPath) -> Self {
        Self {
            path,
            count: 0,
            time: TimeSample::ZERO,
            depth: 0,
        }
    }

    /// Current reentrancy depth; zero when no frame is measuring this path.
    pub fn reentrancy_depth(&self) -> u32 {
        self.depth
    }

    /// Fold another measurement's count and time into this one.
    pub fn merge(&mut self, other: &Measurement) {
        self.count += other.count;
        self.time += other.time;
    }

    /// Mean time per entry; the total time when there were no entries.
    pub fn mean(&self) -> TimeSample {
        if self.count == 0 {
            self.time
        } else {
            self.time / self.count as f64
        }
    }
}

/// Mapping from path to measurement, owned by exactly one meter.
#[derive(Debug, Clone, Default)]
pub struct MeasurementStore {
    measurements: BTreeMap<MeasurementPath, Measurement>,
}

impl MeasurementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the measurement for `path`, creating it and any missing
    /// ancestors first.
    pub fn get_or_create(&mut self, path: &MeasurementPath) -> &mut Measurement {
        if !self.measurements.contains_key(path) {
            for ancestor in path.ancestors() {
                self.measurements
                    .entry(ancestor.clone())
                    .or_insert_with(|| Measurement::new(ancestor));
            }
        }
        self.measurements
            .entry(path.clone())
            .or_insert_with(|| Measurement::new(path.clone()))
    }

    /// Look up a measurement.
    pub fn get(&self, path: &MeasurementPath) -> Option<&Measurement> {
        self.measurements.get(path)
    }

    pub(crate) fn get_mut(&mut self, path: &MeasurementPath) -> Option<&mut Measurement> {
        self.measurements.get_mut(path)
    }

    /// Remove a single record, leaving descendants in place.
    pub fn remove(&mut self, path: &MeasurementPath) -> Option<Measurement> {
        self.measurements.remove(path)
    }

    /// All measurements, ordered by path.
    pub fn snapshot(&self) -> Vec<(MeasurementPath, Measurement)> {
        self.measurements
            .iter()
            .map(|(path, m)| (path.clone(), m.clone()))
            .collect()
    }

    /// Iterate measurements in path order without cloning.
    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.values()
    }

    /// Number of stored paths.
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// True when nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Drop every measurement.
    pub fn clear(&mut self) {
        self.measurements.clear();
    }

    /// Aggregate time recorded on a forest root.
    pub fn forest_time(&self, forest: Forest) -> TimeSample {
        self.measurements
            .get(&MeasurementPath::root(forest))
            .map(|m| m.time)
            .unwrap_or_default()
    }

    /// Fold `from` and its whole subtree onto `to`.
    ///
    /// Counts and times accumulate into the destination records. Source
    /// records that are still being measured keep their slot (zeroed) so the
    /// frame measuring them can still find it on exit; all others are
    /// deleted.
    pub fn merge_into(&mut self, from: &MeasurementPath, to: &MeasurementPath) {
        if from == to {
            return;
        }
        let moved: Vec<MeasurementPath> = self
            .measurements
            .range(from.clone()..)
            .take_while(|(path, _)| from.contains(path))
            .map(|(path, _)| path.clone())
            .collect();

        for source_path in moved {
            let Some(target_path) = source_path.rebase(from, to) else {
                continue;
            };
            let Some(source) = self.measurements.remove(&source_path) else {
                continue;
            };
            self.get_or_create(&target_path).merge(&source);

            if source.depth > 0 {
                let mut active = Measurement::new(source_path.clone());
                active.depth = source.depth;
                self.measurements.insert(source_path, active);
            }
        }
    }
}
