use bcstream::pipeline::batcher::BatchLabels;
use bcstream::pipeline::config::PipelineConfig;
use bcstream::pipeline::split::{build_generator, train_test};
use bcstream::{LabelVector, PipelineError};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// ESC-10 class ids inside ESC-50, in ascending order.
const ESC10_IDS: [usize; 10] = [0, 1, 10, 11, 12, 20, 21, 38, 40, 41];

struct Fixture {
    dir: TempDir,
}

struct Clip {
    name: String,
    fold: u32,
    target: usize,
    esc10: bool,
    value: i16,
    len: usize,
}

impl Fixture {
    fn new(clips: &[Clip]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("audio");
        fs::create_dir_all(&audio).unwrap();

        let mut csv = String::from("filename,fold,target,category,esc10,src_file,take\n");
        for clip in clips {
            let flag = if clip.esc10 { "True" } else { "False" };
            writeln!(csv, "{},{},{},cat{},{},0,A", clip.name, clip.fold, clip.target, clip.target, flag).unwrap();
            write_wav(&audio.join(&clip.name), 8000, clip.value, clip.len);
        }
        fs::write(dir.path().join("meta.csv"), csv).unwrap();
        Fixture { dir }
    }

    fn config(&self, folds: &str, extra: &str) -> PipelineConfig {
        let text = format!(
            "[dataset]\nmetadata_path = '{}'\naudio_dir = '{}'\nfolds = {}\naudio_rate = 8000\nconverter = \"sinc\"\n{}",
            self.dir.path().join("meta.csv").display(),
            self.dir.path().join("audio").display(),
            folds,
            extra
        );
        PipelineConfig::from_toml(&text).unwrap()
    }
}

fn write_wav(path: &Path, rate: u32, value: i16, len: usize) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for _ in 0..len {
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

fn clip(name: &str, fold: u32, target: usize, esc10: bool, value: i16, len: usize) -> Clip {
    Clip { name: name.to_string(), fold, target, esc10, value, len }
}

fn folds(ids: &[u32]) -> BTreeSet<u32> {
    ids.iter().copied().collect()
}

/// Ten ESC-10 clips over folds 1-3, plus ESC-50-only clips mixed in.
/// Clips are written at the target rate, so conversion keeps them intact.
fn esc10_fixture() -> Fixture {
    let order = [7, 0, 3, 9, 1, 5, 2, 8, 4, 6];
    let mut clips = Vec::new();
    for (i, &class) in order.iter().enumerate() {
        clips.push(clip(
            &format!("{}-{i}.wav", i % 3 + 1),
            (i % 3 + 1) as u32,
            ESC10_IDS[class],
            true,
            100 * (i as i16 + 1),
            200 + 20 * i,
        ));
        clips.push(clip(&format!("x-{i}.wav"), (i % 3 + 1) as u32, 30 + i, false, 7, 200));
    }
    Fixture::new(&clips)
}

#[test]
fn test_first_unmixed_example_is_remapped_and_untouched() {
    let fixture = esc10_fixture();
    let config = fixture.config(
        "[1, 2, 3]",
        "only_esc10 = true\n[augment]\nrandomize = false\nmix = false\ncrop_length = 0\nnormalize = false\n",
    );
    let generator = build_generator(&config, &folds(&[1, 2, 3]), &config.augment).unwrap();
    assert_eq!(generator.catalog().len(), 10);
    assert_eq!(generator.class_count(), 10);

    let first_entry = generator.catalog().entry(0).unwrap().clone();
    assert_eq!(first_entry.filename, "1-0.wav");
    // raw id 38 is the eighth ESC-10 class
    assert_eq!(first_entry.label, 7);

    let example = generator.stream().next().unwrap().unwrap();
    assert_eq!(example.label, LabelVector::Class(7));
    assert_eq!(example.audio, generator.loader().load(&first_entry).unwrap());
    assert_eq!(example.audio.len(), 200);
    assert!(example.audio.samples.iter().all(|&s| s == 100.0));
}

#[test]
fn test_empty_view_fails_at_construction() {
    let fixture = esc10_fixture();
    let config = fixture.config("[1, 2, 3, 4]", "");
    let err = build_generator(&config, &folds(&[4]), &config.augment).err().unwrap();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[test]
fn test_epoch_wraps_inside_a_batch() {
    let fixture = Fixture::new(&[
        clip("a.wav", 1, 5, false, 1000, 160),
        clip("b.wav", 1, 9, false, 2000, 160),
    ]);
    let config = fixture.config("[1]", "[augment]\nrandomize = false\nmix = false\n");
    let generator = build_generator(&config, &folds(&[1]), &config.augment).unwrap();

    let batch = generator.batches(4).unwrap().next().unwrap().unwrap();
    assert_eq!(batch.audio.shape(), &[4, 160, 1]);
    let BatchLabels::Classes(labels) = &batch.labels else {
        panic!("expected class labels");
    };
    assert_eq!(labels.to_vec(), vec![5, 9, 5, 9]);
    let firsts: Vec<f32> = (0..4).map(|row| batch.audio[[row, 0, 0]]).collect();
    assert_eq!(firsts, vec![1000.0, 2000.0, 1000.0, 2000.0]);
}

#[test]
fn test_mixed_batches_have_fixed_shape_and_unit_labels() {
    let fixture = esc10_fixture();
    let config = fixture.config(
        "[1, 2, 3]",
        "only_esc10 = true\n[augment]\nstrong_augment = true\npad = 10\ncrop_length = 300\nmix = true\nnormalize = true\nseed = 3\n",
    );
    let generator = build_generator(&config, &folds(&[1, 2, 3]), &config.augment).unwrap();

    for batch in generator.batches(3).unwrap().take(8) {
        let batch = batch.unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.audio.shape(), &[3, 300, 1]);
        assert_eq!(batch.label_shape(), vec![3, 10]);
        let BatchLabels::Soft(labels) = &batch.labels else {
            panic!("expected soft labels");
        };
        for row in labels.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
        assert!(batch.audio.iter().all(|s| s.abs() < 1.0));
    }
}

#[test]
fn test_variable_length_without_crop_is_shape_mismatch() {
    let fixture = Fixture::new(&[
        clip("a.wav", 1, 0, false, 10, 100),
        clip("b.wav", 1, 1, false, 10, 120),
    ]);
    let config = fixture.config("[1]", "[augment]\nrandomize = false\n");
    let generator = build_generator(&config, &folds(&[1]), &config.augment).unwrap();

    let err = generator.batches(2).unwrap().next().unwrap().unwrap_err();
    match err {
        PipelineError::ShapeMismatch { expected, found } => {
            assert_eq!(expected.clip_length, 100);
            assert_eq!(found.clip_length, 120);
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_stopped_stream_yields_no_partial_batch() {
    let fixture = Fixture::new(&[clip("a.wav", 1, 0, false, 10, 100)]);
    let config = fixture.config("[1]", "[augment]\nrandomize = false\n");
    let generator = build_generator(&config, &folds(&[1]), &config.augment).unwrap();

    let mut batches = generator.batches(2).unwrap();
    assert!(batches.next().unwrap().is_ok());
    generator.stop();
    assert!(batches.next().is_none());
}

#[test]
fn test_train_test_split() {
    let fixture = esc10_fixture();
    let config = fixture.config(
        "[1, 2, 3]",
        "only_esc10 = true\n[augment]\nrandomize = true\nmix = true\nstrong_augment = true\ncrop_length = 200\nseed = 1\n",
    );
    let (train, test) = train_test(&config, 2).unwrap();

    assert!(train.catalog().entries().iter().all(|e| e.fold != 2));
    assert!(test.catalog().entries().iter().all(|e| e.fold == 2));
    assert_eq!(train.catalog().len() + test.catalog().len(), 10);
    assert_eq!(train.class_count(), test.class_count());

    let pass = |n| -> Vec<LabelVector> { test.stream().take(n).map(|e| e.unwrap().label).collect() };
    let first = pass(6);
    assert_eq!(first, pass(6));
    assert!(first.iter().all(|l| matches!(l, LabelVector::Class(_))));

    let example = train.stream().next().unwrap().unwrap();
    assert!(matches!(example.label, LabelVector::Soft(_)));

    assert!(matches!(train_test(&config, 5), Err(PipelineError::Configuration(_))));
}

#[test]
fn test_missing_audio_propagates_through_batches() {
    let fixture = Fixture::new(&[
        clip("a.wav", 1, 0, false, 10, 100),
        clip("b.wav", 1, 1, false, 10, 100),
    ]);
    fs::remove_file(fixture.dir.path().join("audio").join("b.wav")).unwrap();
    let config = fixture.config("[1]", "[augment]\nrandomize = false\n");
    let generator = build_generator(&config, &folds(&[1]), &config.augment).unwrap();

    let err = generator.batches(2).unwrap().next().unwrap().unwrap_err();
    assert!(matches!(err, PipelineError::DataUnavailable { .. }));
}
