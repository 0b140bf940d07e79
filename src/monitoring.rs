use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::sim_config::{HostConfig, MonitoringConfig};
use crate::workload_generators::events::ResourceVector;

/// Raw committed amounts of one host at one instant. Diffs between states may
/// be negative, so this is not a `ResourceVector`.
#[derive(Serialize, Clone, Copy, Debug)]
pub struct MonitoringState {
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
}

impl MonitoringState {
    pub fn from_vector(v: &ResourceVector) -> Self {
        Self {
            cpu: v.cpu,
            memory: v.memory,
            storage: v.storage,
        }
    }

    pub fn diff(&self, other: &MonitoringState) -> MonitoringState {
        MonitoringState {
            cpu: self.cpu - other.cpu,
            memory: self.memory - other.memory,
            storage: self.storage - other.storage,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ResourcePoint {
    pub value: f64,
    pub time: f64,
}

/// Time-weighted accumulator over a piecewise-constant signal. With a
/// compression interval set, it emits one averaged point per window;
/// otherwise it records raw points on every update.
#[derive(Clone, Serialize)]
pub struct ResourceLoad {
    pub total: f64,
    consumed: f64,
    previous_update: f64,
    previous_update_time: f64,
    start_time: f64,
    compression_time_interval: Option<f64>,
    dump_points: Vec<ResourcePoint>,
}

impl ResourceLoad {
    pub fn new_fraction(start_time: f64, total: f64, compression_time_interval: Option<f64>) -> Self {
        Self {
            total,
            consumed: 0.,
            previous_update: 0.,
            previous_update_time: start_time,
            start_time,
            compression_time_interval,
            dump_points: Vec::new(),
        }
    }

    pub fn new_absolute(start_time: f64, compression_time_interval: Option<f64>) -> Self {
        Self::new_fraction(start_time, 1., compression_time_interval)
    }

    pub fn update(&mut self, current_value: f64, time: f64) -> f64 {
        let previous_update = self.previous_update;
        if let Some(interval) = self.compression_time_interval {
            while time - self.start_time > interval {
                let reset_time = self.start_time + interval;
                let value = self.reset(reset_time);
                self.dump_points.push(ResourcePoint {
                    value,
                    time: reset_time,
                });
            }
            self.previous_update = current_value;
            self.consumed += previous_update * (time - self.previous_update_time);
            self.previous_update_time = time;
        } else {
            self.dump_points.push(ResourcePoint {
                value: current_value,
                time,
            });
            self.previous_update = current_value;
        }
        previous_update
    }

    pub fn add(&mut self, addition: f64, time: f64) {
        let consumed_value = self.previous_update + addition;
        self.update(consumed_value, time);
    }

    /// Closes the current window and returns its time-weighted mean as a
    /// fraction of `total`.
    pub fn reset(&mut self, time: f64) -> f64 {
        self.consumed += self.previous_update * (time - self.previous_update_time);
        let window = time - self.start_time;
        let result = if window > 0. && self.total > 0. {
            (self.consumed / window) / self.total
        } else {
            0.
        };
        self.start_time = time;
        self.previous_update_time = time;
        self.consumed = 0.;
        result
    }

    /// Closes a trailing partial window, if any signal accumulated in it.
    pub fn flush(&mut self, time: f64) {
        if time > self.start_time {
            let value = self.reset(time);
            self.dump_points.push(ResourcePoint { value, time });
        }
    }

    pub fn dump(&mut self) -> Vec<ResourcePoint> {
        std::mem::take(&mut self.dump_points)
    }

    pub fn extend(&mut self, amount: f64) {
        self.total += amount;
    }
}

/// Per-host (and cluster-total) committed-resource loads across the three
/// dimensions.
#[derive(Clone, Serialize)]
pub struct LoadInfo {
    pub cpu: ResourceLoad,
    pub memory: ResourceLoad,
    pub storage: ResourceLoad,
}

impl LoadInfo {
    pub fn new(
        start_time: f64,
        capacity: &ResourceVector,
        compression_time_interval: Option<f64>,
    ) -> Self {
        Self {
            cpu: ResourceLoad::new_fraction(start_time, capacity.cpu, compression_time_interval),
            memory: ResourceLoad::new_fraction(start_time, capacity.memory, compression_time_interval),
            storage: ResourceLoad::new_fraction(start_time, capacity.storage, compression_time_interval),
        }
    }

    pub fn extend(&mut self, other: &ResourceVector) {
        self.cpu.extend(other.cpu);
        self.memory.extend(other.memory);
        self.storage.extend(other.storage);
    }

    pub fn update(&mut self, state: MonitoringState, time: f64) -> MonitoringState {
        MonitoringState {
            cpu: self.cpu.update(state.cpu, time),
            memory: self.memory.update(state.memory, time),
            storage: self.storage.update(state.storage, time),
        }
    }

    pub fn add(&mut self, state: MonitoringState, time: f64) {
        self.cpu.add(state.cpu, time);
        self.memory.add(state.memory, time);
        self.storage.add(state.storage, time);
    }

    pub fn flush(&mut self, time: f64) {
        self.cpu.flush(time);
        self.memory.flush(time);
        self.storage.flush(time);
    }
}

/// One averaged point of the cluster-wide utilization time series.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UtilizationSample {
    pub time: f64,
    pub cpu: f64,
    pub memory: f64,
    pub storage: f64,
    /// Mean of the dimensions the cluster actually has capacity on.
    pub utilization: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DominantSharePoint {
    pub time: f64,
    pub user: String,
    pub share: f64,
}

/// Integrates one host's power draw over its committed-state changes.
struct EnergyMeter {
    idle_watts: f64,
    peak_watts: f64,
    cpu_capacity: f64,
    last_time: f64,
    last_cpu_committed: f64,
    last_active: bool,
    idle_joules: f64,
    dynamic_joules: f64,
}

impl EnergyMeter {
    fn new(config: &HostConfig) -> Self {
        Self {
            idle_watts: config.idle_power_watts,
            peak_watts: config.peak_power_watts,
            cpu_capacity: config.cpu,
            last_time: 0.,
            last_cpu_committed: 0.,
            last_active: false,
            idle_joules: 0.,
            dynamic_joules: 0.,
        }
    }

    fn accrue(&mut self, time: f64) {
        let dt = time - self.last_time;
        if dt > 0. && self.last_active {
            self.idle_joules += self.idle_watts * dt;
            if self.cpu_capacity > 0. {
                let cpu_utilization = self.last_cpu_committed / self.cpu_capacity;
                self.dynamic_joules += (self.peak_watts - self.idle_watts) * cpu_utilization * dt;
            }
        }
        self.last_time = time;
    }

    fn update(&mut self, time: f64, committed: &ResourceVector) {
        self.accrue(time);
        self.last_cpu_committed = committed.cpu;
        self.last_active = !committed.is_zero();
    }
}

/// Summed power-draw integral of the fleet over one run.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EnergyReport {
    pub idle_joules: f64,
    pub dynamic_joules: f64,
}

impl EnergyReport {
    pub fn total_joules(&self) -> f64 {
        self.idle_joules + self.dynamic_joules
    }
}

/// In-memory run telemetry: host loads, the cluster utilization series,
/// per-tenant dominant shares, scheduler queue sizes and energy draw.
/// Nothing is written out during a run; everything is read after completion.
pub struct Monitoring {
    hosts: FxHashMap<String, LoadInfo>,
    total: LoadInfo,
    total_capacity: ResourceVector,

    scheduler_queue_size: ResourceLoad,
    scheduler_queue_size_by_user: BTreeMap<String, ResourceLoad>,
    collect_user_queues: bool,

    user_resources: BTreeMap<String, ResourceVector>,
    dominant_share_series: Vec<DominantSharePoint>,

    energy: FxHashMap<String, EnergyMeter>,

    samples: Vec<UtilizationSample>,
    queue_samples: Vec<ResourcePoint>,
    queue_samples_by_user: BTreeMap<String, Vec<ResourcePoint>>,
    finalized_at: Option<f64>,
    host_load_compression_time_interval: Option<f64>,
}

pub const DEFAULT_SAMPLE_INTERVAL: f64 = 1.0;

impl Monitoring {
    pub fn new(config: MonitoringConfig, sample_interval: Option<f64>) -> Self {
        let sample_interval = sample_interval.unwrap_or(DEFAULT_SAMPLE_INTERVAL);
        Monitoring {
            hosts: FxHashMap::default(),
            total: LoadInfo::new(0., &ResourceVector::default(), Some(sample_interval)),
            total_capacity: ResourceVector::default(),
            scheduler_queue_size: ResourceLoad::new_absolute(0., Some(sample_interval)),
            scheduler_queue_size_by_user: BTreeMap::new(),
            collect_user_queues: config.collect_user_queues.unwrap_or(false),
            user_resources: BTreeMap::new(),
            dominant_share_series: Vec::new(),
            energy: FxHashMap::default(),
            samples: Vec::new(),
            queue_samples: Vec::new(),
            queue_samples_by_user: BTreeMap::new(),
            finalized_at: None,
            host_load_compression_time_interval: config.host_load_compression_time_interval,
        }
    }

    pub fn add_host(&mut self, name: String, host_config: &HostConfig) {
        let capacity = host_config.capacity();
        self.total.extend(&capacity);
        self.total_capacity.add(&capacity);
        self.hosts.insert(
            name.clone(),
            LoadInfo::new(0., &capacity, self.host_load_compression_time_interval),
        );
        self.energy.insert(name, EnergyMeter::new(host_config));
    }

    pub fn update_host(&mut self, time: f64, name: &str, committed: &ResourceVector) {
        let state = MonitoringState::from_vector(committed);
        let load = self.hosts.get_mut(name).expect("unknown host in monitoring");
        let old_state = load.update(state, time);
        self.total.add(state.diff(&old_state), time);
        self.energy
            .get_mut(name)
            .expect("unknown host in monitoring")
            .update(time, committed);
    }

    pub fn add_scheduler_queue_size(&mut self, time: f64, addition: i64, user: Option<String>) {
        self.scheduler_queue_size.add(addition as f64, time);
        if self.collect_user_queues {
            if let Some(user) = user {
                self.scheduler_queue_size_by_user
                    .entry(user)
                    .or_insert_with(|| ResourceLoad::new_absolute(time, None))
                    .add(addition as f64, time);
            }
        }
    }

    pub fn charge_user(&mut self, time: f64, user: &str, demand: &ResourceVector) {
        self.user_resources
            .entry(user.to_string())
            .or_default()
            .add(demand);
        self.record_user_share(time, user);
    }

    pub fn credit_user(&mut self, time: f64, user: &str, demand: &ResourceVector) {
        self.user_resources
            .entry(user.to_string())
            .or_default()
            .subtract(demand);
        self.record_user_share(time, user);
    }

    fn record_user_share(&mut self, time: f64, user: &str) {
        let consumed = self.user_resources.get(user).copied().unwrap_or_default();
        let share = consumed.max_share_of(&self.total_capacity);
        self.dominant_share_series.push(DominantSharePoint {
            time,
            user: user.to_string(),
            share,
        });
    }

    pub fn dominant_share_series(&self) -> &[DominantSharePoint] {
        &self.dominant_share_series
    }

    /// Closes all accumulators at `time` and materializes the utilization
    /// sample series. Idempotent per run: repeated calls keep the first
    /// finalization.
    pub fn finalize(&mut self, time: f64) {
        if self.finalized_at.is_some() {
            return;
        }
        self.finalized_at = Some(time);
        self.total.flush(time);

        let cpus = self.total.cpu.dump();
        let memories = self.total.memory.dump();
        let storages = self.total.storage.dump();
        assert_eq!(cpus.len(), memories.len());
        assert_eq!(cpus.len(), storages.len());

        let mut active_dims = 0;
        for capacity in [
            self.total_capacity.cpu,
            self.total_capacity.memory,
            self.total_capacity.storage,
        ] {
            if capacity > 0. {
                active_dims += 1;
            }
        }

        for i in 0..cpus.len() {
            let mut sum = 0.;
            if self.total_capacity.cpu > 0. {
                sum += cpus[i].value;
            }
            if self.total_capacity.memory > 0. {
                sum += memories[i].value;
            }
            if self.total_capacity.storage > 0. {
                sum += storages[i].value;
            }
            let utilization = if active_dims > 0 {
                sum / active_dims as f64
            } else {
                0.
            };
            self.samples.push(UtilizationSample {
                time: cpus[i].time,
                cpu: cpus[i].value,
                memory: memories[i].value,
                storage: storages[i].value,
                utilization,
            });
        }

        self.scheduler_queue_size.flush(time);
        self.queue_samples = self.scheduler_queue_size.dump();
        for (user, load) in self.scheduler_queue_size_by_user.iter_mut() {
            load.flush(time);
            self.queue_samples_by_user.insert(user.clone(), load.dump());
        }

        for meter in self.energy.values_mut() {
            meter.accrue(time);
        }
    }

    pub fn utilization_samples(&self) -> &[UtilizationSample] {
        &self.samples
    }

    /// Time-averaged pending-queue sizes, total and per tenant.
    pub fn queue_size_samples(&self) -> (&[ResourcePoint], &BTreeMap<String, Vec<ResourcePoint>>) {
        (&self.queue_samples, &self.queue_samples_by_user)
    }

    pub fn energy_report(&self) -> EnergyReport {
        let mut report = EnergyReport::default();
        for meter in self.energy.values() {
            report.idle_joules += meter.idle_joules;
            report.dynamic_joules += meter.dynamic_joules;
        }
        report
    }
}
