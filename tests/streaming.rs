//! End-to-end streaming scenarios

use adaptive_anomaly::prelude::*;
use adaptive_anomaly::Result;
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

const BASELINE: f64 = 10.0;
const SPIKE_AT: usize = 30;

fn constant_config() -> DetectorConfig {
    DetectorConfig::default()
        .with_lookback(5)
        .with_train_size(20)
        .with_hidden_size(8)
        .with_epochs(10, 2)
        .with_seed(1)
}

/// Positive weights make the generator's response to a large error window
/// predictable: every gate saturates open. With other initializations the
/// spike is still flagged but the next threshold may go either way.
fn spike_config() -> DetectorConfig {
    let base = DetectorConfig::default()
        .with_lookback(5)
        .with_train_size(20)
        .with_hidden_size(8)
        .with_epochs(10, 1)
        .with_learning_rate(0.005)
        .with_minimal_threshold(0.3)
        .with_value_range(0.0, 100.0)
        .with_seed(7);
    DetectorConfig {
        weight_init: WeightInit::Uniform {
            low: 0.01,
            high: 0.5,
        },
        ..base
    }
}

fn spike_series(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| if i == SPIKE_AT { 2.0 * BASELINE } else { BASELINE })
        .collect()
}

/// Test constant stream: predictions settle on the constant, nothing is flagged
#[test]
fn test_constant_stream_has_no_anomalies() {
    let mut detector = AdaptiveDetector::new(constant_config()).unwrap();

    let decisions: Vec<Decision> = (0..50)
        .filter_map(|_| detector.feed_observation(BASELINE).unwrap())
        .collect();

    assert_eq!(decisions.len(), 30);
    for decision in &decisions {
        assert!(!decision.is_anomaly);
        assert!((decision.predicted - BASELINE).abs() < 1e-6);
        assert!(decision.threshold >= 0.05);
        assert_eq!(decision.error, 0.0);
    }
}

/// Test spike detection: only the spike is flagged and the threshold rises after it.
///
/// The rise comes from the spike's error entering the generator's input
/// window. The online Adam step does not push the generator toward the larger
/// error: the update multiplies the moment ratio by the clipped gradient, so
/// parameters with a nonzero gradient shrink whatever the gradient's sign.
#[test]
fn test_spike_is_flagged_and_threshold_rises() {
    let series = spike_series(50);
    let mut detector = AdaptiveDetector::new(spike_config()).unwrap();

    let mut decisions = Vec::new();
    for (index, &value) in series.iter().enumerate() {
        if let Some(decision) = detector.feed_observation(value).unwrap() {
            decisions.push((index, decision));
        }
    }

    let flagged: Vec<usize> = decisions
        .iter()
        .filter(|(_, d)| d.is_anomaly)
        .map(|(i, _)| *i)
        .collect();
    assert_eq!(flagged, vec![SPIKE_AT]);

    let threshold_at = |index: usize| {
        decisions
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, d)| d.threshold)
            .unwrap()
    };
    let at_spike = threshold_at(SPIKE_AT);
    assert!((at_spike - 0.5).abs() < 1e-12);
    assert!(threshold_at(SPIKE_AT + 1) > at_spike);
}

/// Test that the spike reaches the generator's error window but not the
/// observation window
#[test]
fn test_spike_is_substituted_in_observation_window() {
    let series = spike_series(SPIKE_AT + 1);
    let mut detector = AdaptiveDetector::new(spike_config()).unwrap();
    for &value in &series[..SPIKE_AT] {
        detector.feed_observation(value).unwrap();
    }
    let predictor_before = detector.predictor().clone();
    let window_before = detector.observation_window().unwrap();

    let decision = detector.feed_observation(series[SPIKE_AT]).unwrap().unwrap();

    assert!(decision.is_anomaly);
    assert!(!decision.out_of_range);
    let expected = predictor_before.predict(&window_before).unwrap();
    assert_eq!(detector.observation_window().unwrap().last().copied(), Some(expected));
    assert_eq!(detector.error_window().unwrap().last().copied(), Some(decision.error));
    assert!(decision.error > 1e8);
}

/// Test that disabling substitution keeps the raw reading
#[test]
fn test_substitution_can_be_disabled() {
    let series = spike_series(SPIKE_AT + 1);
    let mut detector = AdaptiveDetector::new(spike_config().with_substitution(false)).unwrap();

    let mut last = None;
    for &value in &series {
        last = detector.feed_observation(value).unwrap();
    }

    let decision = last.unwrap();
    assert!(decision.is_anomaly);
    assert_eq!(
        detector.observation_window().unwrap().last().copied(),
        Some(decision.normalized)
    );
}

/// Test recurrent state continuity: by default each window starts from the
/// state left by the previous update instead of zeros
#[test]
fn test_recurrent_state_continues_across_observations() {
    let series: Vec<f64> = (0..40)
        .map(|i| (i as f64 * 0.3).sin() * 3.0 + BASELINE)
        .collect();
    let run = |config: DetectorConfig| {
        let mut detector = AdaptiveDetector::new(config).unwrap();
        let predictions: Vec<f64> = series
            .iter()
            .filter_map(|&v| detector.feed_observation(v).unwrap())
            .map(|d| d.predicted)
            .collect();
        (detector, predictions)
    };

    let (carried, with_state) = run(constant_config());
    let (_, from_zero) = run(constant_config().with_stateful(false));
    assert_eq!(with_state.len(), 20);
    assert_ne!(with_state, from_zero);

    let window = carried.observation_window().unwrap();
    assert!(!carried.predictor().sequence_model().state().is_zero());
    let mut reset = carried.predictor().clone();
    reset.reset_state();
    assert_ne!(
        reset.predict(&window).unwrap(),
        carried.predictor().predict(&window).unwrap()
    );
}

/// Test that NaN and infinite readings are rejected without poisoning the models
#[test]
fn test_non_finite_readings_leave_detection_working() {
    let series: Vec<f64> = (0..40)
        .map(|i| (i as f64 * 0.3).sin() * 3.0 + BASELINE)
        .collect();
    let mut detector = AdaptiveDetector::new(constant_config()).unwrap();
    for &value in &series[..20] {
        detector.feed_observation(value).unwrap();
    }

    assert!(detector.feed_observation(f64::NAN).is_err());
    assert!(detector.feed_observation(f64::INFINITY).is_err());

    for &value in &series[20..] {
        let decision = detector.feed_observation(value).unwrap().unwrap();
        assert!(decision.predicted.is_finite());
        assert!(decision.threshold.is_finite());
    }
    let spike = detector.feed_observation(BASELINE + 1e6).unwrap().unwrap();
    assert!(spike.is_anomaly);
}

/// Test value range: readings outside the bounds are anomalies even with zero error
#[test]
fn test_out_of_range_values_are_flagged() {
    let config = constant_config().with_value_range(0.0, 9.5);
    let mut detector = AdaptiveDetector::new(config).unwrap();

    let decisions: Vec<Decision> = (0..30)
        .filter_map(|_| detector.feed_observation(BASELINE).unwrap())
        .collect();

    assert_eq!(decisions.len(), 10);
    assert!(decisions
        .iter()
        .all(|d| d.is_anomaly && d.out_of_range && d.error == 0.0));
}

/// Stops the stream after a fixed number of decisions
struct StopAfter {
    handle: StopHandle,
    limit: usize,
    records: Vec<DecisionRecord>,
}

impl DecisionSink for StopAfter {
    fn record(&mut self, record: &DecisionRecord) -> Result<()> {
        self.records.push(record.clone());
        if self.records.len() == self.limit {
            self.handle.stop();
        }
        Ok(())
    }
}

/// Test cooperative stop between observations
#[test]
fn test_stop_handle_ends_stream() {
    let points: Vec<DataPoint> = (0..50)
        .map(|i| DataPoint::new(i.to_string(), BASELINE, false))
        .collect();
    let mut detector = AdaptiveDetector::new(constant_config()).unwrap();
    let handle = StopHandle::new();
    let mut sink = StopAfter {
        handle: handle.clone(),
        limit: 5,
        records: Vec::new(),
    };

    let summary = detector.run(points, &mut sink, &handle).unwrap();

    assert!(summary.stopped);
    assert_eq!(summary.processed, 25);
    assert_eq!(sink.records.len(), 5);
    assert_eq!(sink.records[4].index, 24);
}

/// Test the full file pipeline: CSV in, decisions out, metrics against labels
#[test]
fn test_csv_pipeline_with_metrics() {
    let dir = tempdir().unwrap();
    let data_path = dir.path().join("series.csv");
    let log_path = dir.path().join("decisions.csv");

    let mut file = File::create(&data_path).unwrap();
    writeln!(file, "timestamp,value,is_anomaly").unwrap();
    for (i, value) in spike_series(50).iter().enumerate() {
        writeln!(file, "{},{},{}", 1_600_000_000 + i * 60, value, (i == SPIKE_AT) as u8).unwrap();
    }
    writeln!(file, "bad,row,here").unwrap();
    drop(file);

    let points = load_csv(&data_path).unwrap();
    assert_eq!(points.len(), 50);

    let mut detector = AdaptiveDetector::new(spike_config()).unwrap();
    let mut sink = CsvSink::create(&log_path).unwrap();
    let summary = detector.run(points, &mut sink, &StopHandle::new()).unwrap();
    drop(sink);

    assert_eq!(summary.decided, 30);
    assert_eq!(summary.anomalies, 1);
    let metrics = summary.metrics().unwrap();
    assert_eq!(metrics.true_positives, 1);
    assert_eq!(metrics.false_positives, 0);
    assert_eq!(metrics.f1, 1.0);

    let mut reader = csv::Reader::from_path(&log_path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("index"));
    assert_eq!(headers.get(7), Some("is_anomaly"));
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 30);
    assert_eq!(rows[SPIKE_AT - 20].get(7), Some("true"));
    assert_eq!(rows[SPIKE_AT - 20].get(8), Some("true"));
}
