use fuse_scheduling::config::sim_config::{HostConfig, MonitoringConfig};
use fuse_scheduling::monitoring::{Monitoring, ResourceLoad, ResourcePoint};
use fuse_scheduling::ResourceVector;

#[test]
fn windowed_load_averages_signal_over_time() {
    let mut load = ResourceLoad::new_fraction(0., 100.0, Some(10.0));
    load.update(50., 5.);
    load.update(0., 11.);
    load.update(100., 0.);

    let expected = vec![ResourcePoint {
        value: 0.25,
        time: 10.,
    }];
    assert_eq!(load.dump(), expected);
}

#[test]
fn flush_closes_partial_window() {
    let mut load = ResourceLoad::new_fraction(0., 100.0, Some(10.0));
    load.update(50., 5.);
    load.flush(8.);
    // 50 units over [5, 8) of an 8-second window
    let points = load.dump();
    assert_eq!(points.len(), 1);
    assert!((points[0].value - (50. * 3. / 8.) / 100.).abs() < 1e-12);
    assert_eq!(points[0].time, 8.);
}

fn host_config(name: &str, cpu: f64, memory: f64, storage: f64) -> HostConfig {
    HostConfig {
        id: 0,
        name: name.to_string(),
        cpu,
        memory,
        storage,
        idle_power_watts: 100.,
        peak_power_watts: 400.,
        group_prefix: None,
    }
}

#[test]
fn cluster_samples_average_across_dimensions() {
    let mut monitoring = Monitoring::new(MonitoringConfig::default(), Some(10.0));
    monitoring.add_host("host-0".to_string(), &host_config("host-0", 10., 20., 40.));

    // half the cpu, a quarter of the memory, nothing on storage, for the
    // whole window
    monitoring.update_host(0., "host-0", &ResourceVector::new(5., 5., 0.));
    monitoring.finalize(10.);

    let samples = monitoring.utilization_samples();
    assert_eq!(samples.len(), 1);
    let sample = &samples[0];
    assert!((sample.cpu - 0.5).abs() < 1e-12);
    assert!((sample.memory - 0.25).abs() < 1e-12);
    assert!((sample.storage - 0.).abs() < 1e-12);
    assert!((sample.utilization - 0.25).abs() < 1e-12);
}

#[test]
fn energy_meter_splits_idle_and_dynamic_draw() {
    let mut monitoring = Monitoring::new(MonitoringConfig::default(), Some(100.0));
    monitoring.add_host("host-0".to_string(), &host_config("host-0", 10., 10., 10.));

    // parked until t=10, then half cpu load for 10 seconds, then parked again
    monitoring.update_host(10., "host-0", &ResourceVector::new(5., 1., 1.));
    monitoring.update_host(20., "host-0", &ResourceVector::default());
    monitoring.finalize(30.);

    let report = monitoring.energy_report();
    assert!((report.idle_joules - 100. * 10.).abs() < 1e-9);
    assert!((report.dynamic_joules - 300. * 0.5 * 10.).abs() < 1e-9);
}

#[test]
fn dominant_share_series_tracks_only_the_charged_user() {
    let mut monitoring = Monitoring::new(MonitoringConfig::default(), Some(10.0));
    monitoring.add_host("host-0".to_string(), &host_config("host-0", 10., 10., 10.));

    monitoring.charge_user(1., "alpha", &ResourceVector::new(2., 1., 1.));
    monitoring.charge_user(2., "beta", &ResourceVector::new(1., 5., 1.));
    monitoring.credit_user(3., "alpha", &ResourceVector::new(2., 1., 1.));

    let series = monitoring.dominant_share_series();
    assert_eq!(series.len(), 3);
    assert_eq!(series[0].user, "alpha");
    assert!((series[0].share - 0.2).abs() < 1e-12);
    assert_eq!(series[1].user, "beta");
    assert!((series[1].share - 0.5).abs() < 1e-12);
    assert_eq!(series[2].user, "alpha");
    assert!((series[2].share - 0.).abs() < 1e-12);
}
