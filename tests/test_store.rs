//! End-to-end tests: write participant folders with the crate's own writers,
//! then load and slice them through `TrialMatrixStore`.
//!
//! Each test gets its own directory under the system temp dir, removed when
//! the test's `ScratchDir` is dropped.

use std::path::{Path, PathBuf};

use ndarray::{concatenate, Array2, Axis};

use trialmat::data::writer;
use trialmat::{
    FeatureIndex, Interpolation, MatrixFormat, Modality, ModalityRange, Phase, StoreConfig,
    StoreError, TrialMatrixStore,
};

struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("trialmat-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn standard_index(phase1: Vec<usize>, phase2: Vec<usize>) -> FeatureIndex {
    FeatureIndex::new(
        vec![
            ModalityRange { name: "otb".into(), range: (0, 112).into() },
            ModalityRange { name: "myo".into(), range: (112, 117).into() },
            ModalityRange { name: "kin_hand".into(), range: (117, 180).into() },
        ],
        phase1,
        phase2,
    )
    .unwrap()
}

/// Cell value encodes its own position so slices can be checked exactly.
fn matrix(rows: usize, cols: usize, phase: Phase) -> Array2<f64> {
    let base = f64::from(phase.number()) * 1e6;
    Array2::from_shape_fn((rows, cols), |(i, j)| base + (i * 1000 + j) as f64 + 0.25)
}

struct Fixture {
    store: TrialMatrixStore,
    phase1: Array2<f64>,
    phase2: Array2<f64>,
    _dir: ScratchDir,
}

fn write_fixture(name: &str, format: MatrixFormat, pid: u32) -> Fixture {
    let dir = ScratchDir::new(name);
    let config = StoreConfig::new(dir.path()).with_format(format);
    let index = standard_index(vec![50, 30, 20], vec![12, 0, 18]);
    let phase1 = matrix(100, 180, Phase::One);
    let phase2 = matrix(30, 180, Phase::Two);
    writer::write_participant(&config.paths(pid), format, &phase1, &phase2, &index).unwrap();
    Fixture {
        store: TrialMatrixStore::new(config),
        phase1,
        phase2,
        _dir: dir,
    }
}

#[test]
fn every_format_loads_back_exactly() {
    for format in [MatrixFormat::Parquet, MatrixFormat::Csv, MatrixFormat::Json] {
        let fx = write_fixture(&format!("roundtrip-{format}"), format, 4);
        let ds = fx.store.load(4).unwrap();
        assert_eq!(ds.pid(), 4);
        assert_eq!(ds.matrix(Phase::One), &fx.phase1, "{format}");
        assert_eq!(ds.matrix(Phase::Two), &fx.phase2, "{format}");
        assert!(ds.scaler_path().is_none());
    }
}

#[test]
fn documented_trial_and_modality_scenarios() {
    let fx = write_fixture("scenarios", MatrixFormat::Parquet, 1);
    let ds = fx.store.load(1).unwrap();

    assert_eq!(TrialMatrixStore::get_trial(&ds, Phase::One, 1).unwrap(), 50..80);

    let kin = TrialMatrixStore::get_modality_slice(&ds, Phase::One, Modality::KinHand).unwrap();
    assert_eq!(kin.ncols(), 63);
    assert_eq!(kin.nrows(), 100);
    assert_eq!(kin[[0, 0]], fx.phase1[[0, 117]]);

    let err = TrialMatrixStore::get_trial(&ds, Phase::One, 5).unwrap_err();
    assert!(matches!(err, StoreError::IndexOutOfRange { index: 5, num_trials: 3, .. }));

    let err = TrialMatrixStore::get_modality_slice(&ds, Phase::One, "emg").unwrap_err();
    assert!(matches!(err, StoreError::UnknownModality { .. }));
}

#[test]
fn ranges_partition_columns_and_lengths_match_rows() {
    let fx = write_fixture("invariants", MatrixFormat::Csv, 2);
    let ds = fx.store.load(2).unwrap();

    let mut next = 0;
    for m in ds.index().modalities() {
        assert_eq!(m.range.start, next);
        next = m.range.end;
    }
    assert_eq!(next, ds.matrix(Phase::One).ncols());

    for phase in Phase::ALL {
        let total: usize = ds.index().trial_lengths(phase).iter().sum();
        assert_eq!(total, ds.matrix(phase).nrows());
    }
}

#[test]
fn trials_concatenate_to_the_phase_matrix() {
    let fx = write_fixture("concat", MatrixFormat::Json, 3);
    let ds = fx.store.load(3).unwrap();
    for phase in Phase::ALL {
        let views: Vec<_> = (0..ds.num_trials(phase))
            .map(|k| TrialMatrixStore::get_trial_slice(&ds, phase, k).unwrap())
            .collect();
        let rebuilt = concatenate(Axis(0), &views).unwrap();
        assert_eq!(&rebuilt, ds.matrix(phase));
    }
}

#[test]
fn trial_modality_is_the_intersection() {
    let fx = write_fixture("intersection", MatrixFormat::Parquet, 5);
    let ds = fx.store.load(5).unwrap();
    let myo = TrialMatrixStore::get_trial_modality(&ds, Phase::Two, 2, "myo").unwrap();
    assert_eq!(myo.dim(), (18, 5));
    assert_eq!(myo[[0, 0]], fx.phase2[[12, 112]]);
    assert_eq!(myo[[17, 4]], fx.phase2[[29, 116]]);

    let empty = TrialMatrixStore::get_trial_modality(&ds, Phase::Two, 1, "otb").unwrap();
    assert_eq!(empty.dim(), (0, 112));
}

#[test]
fn resampling_a_loaded_trial() {
    let fx = write_fixture("resample", MatrixFormat::Parquet, 6);
    let ds = fx.store.load(6).unwrap();
    let slice = TrialMatrixStore::get_trial_modality(&ds, Phase::One, 0, "kin_hand").unwrap();
    for method in [Interpolation::Linear, Interpolation::CubicSpline] {
        let out = TrialMatrixStore::resample(slice, 101, method).unwrap();
        assert_eq!(out.dim(), (101, 63));
        assert!((out[[0, 0]] - slice[[0, 0]]).abs() < 1e-9);
        assert!((out[[100, 62]] - slice[[49, 62]]).abs() < 1e-9);
    }

    // Phase 2 trial 1 is empty.
    let err =
        TrialMatrixStore::resampled_trials(&ds, Phase::Two, "myo", 50, Interpolation::Linear)
            .unwrap_err();
    assert!(matches!(err, StoreError::InsufficientSamples { got: 0, .. }));
}

#[test]
fn missing_files_are_not_found() {
    let fx = write_fixture("missing", MatrixFormat::Parquet, 7);

    let err = fx.store.load(8).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));

    let paths = fx.store.config().paths(7);
    std::fs::remove_file(&paths.phase2).unwrap();
    match fx.store.load(7) {
        Err(StoreError::NotFound { path }) => assert_eq!(path, paths.phase2),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn short_trial_lengths_are_corrupt() {
    let dir = ScratchDir::new("corrupt-lengths");
    let config = StoreConfig::new(dir.path());
    // 99 declared rows against a 100-row matrix.
    let index = standard_index(vec![50, 30, 19], vec![30]);
    writer::write_participant(
        &config.paths(9),
        config.matrix_format,
        &matrix(100, 180, Phase::One),
        &matrix(30, 180, Phase::Two),
        &index,
    )
    .unwrap();

    let err = TrialMatrixStore::new(config).load(9).unwrap_err();
    match err {
        StoreError::CorruptData { pid, reason } => {
            assert_eq!(pid, 9);
            assert!(reason.contains("99"), "{reason}");
        }
        other => panic!("expected CorruptData, got {other:?}"),
    }
}

#[test]
fn overflowing_trial_lengths_are_corrupt() {
    let fx = write_fixture("corrupt-overflow", MatrixFormat::Csv, 15);
    let paths = fx.store.config().paths(15);
    std::fs::write(
        &paths.feature_indices,
        format!(
            r#"{{ "otb_indices": [0, 112], "myo_indices": [112, 117], "kin_hand_indices": [117, 180],
                 "phase1_trial_lengths": [{}, 2], "phase2_trial_lengths": [12, 0, 18] }}"#,
            usize::MAX
        ),
    )
    .unwrap();
    match fx.store.load(15) {
        Err(StoreError::CorruptData { pid, reason }) => {
            assert_eq!(pid, 15);
            assert!(reason.contains("overflow"), "{reason}");
        }
        other => panic!("expected CorruptData, got {other:?}"),
    }
}

#[test]
fn non_covering_ranges_are_corrupt() {
    let fx = write_fixture("corrupt-ranges", MatrixFormat::Csv, 10);
    let paths = fx.store.config().paths(10);
    std::fs::write(
        &paths.feature_indices,
        r#"{ "otb_indices": [0, 112], "myo_indices": [113, 117], "kin_hand_indices": [117, 180],
             "phase1_trial_lengths": [50, 30, 20], "phase2_trial_lengths": [12, 0, 18] }"#,
    )
    .unwrap();
    assert!(matches!(fx.store.load(10), Err(StoreError::CorruptData { pid: 10, .. })));
}

#[test]
fn undecodable_matrix_is_corrupt() {
    let fx = write_fixture("corrupt-matrix", MatrixFormat::Csv, 11);
    let paths = fx.store.config().paths(11);
    std::fs::write(&paths.phase1, "1.0,2.0\nnot-a-number,3.0\n").unwrap();
    assert!(matches!(fx.store.load(11), Err(StoreError::CorruptData { .. })));
}

#[test]
fn scaler_file_is_discovered_but_not_parsed() {
    let fx = write_fixture("scaler", MatrixFormat::Parquet, 12);
    let paths = fx.store.config().paths(12);
    let scaler = paths.dir.join("P12_global_scaler.joblib");
    std::fs::write(&scaler, b"opaque").unwrap();

    let ds = fx.store.load(12).unwrap();
    assert_eq!(ds.scaler_path(), Some(scaler.as_path()));
}

#[test]
fn participants_load_independently_across_threads() {
    let fx = write_fixture("parallel", MatrixFormat::Parquet, 13);
    let store = &fx.store;
    std::thread::scope(|scope| {
        let good = scope.spawn(|| store.load(13).map(|ds| ds.num_trials(Phase::One)));
        let bad = scope.spawn(|| store.load(14).map(|ds| ds.num_trials(Phase::One)));
        assert_eq!(good.join().unwrap().unwrap(), 3);
        assert!(matches!(bad.join().unwrap(), Err(StoreError::NotFound { .. })));
    });
}
