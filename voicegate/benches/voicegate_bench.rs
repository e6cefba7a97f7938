use criterion::{black_box, criterion_group, criterion_main, Criterion};
use voicegate::{
    dtw_distance, Config, FeatureExtractor, FeatureConfig, MemoryStore, Preprocessor,
    PreprocessConfig, SampleStore, VoiceGate, Waveform,
};

fn make_sine(freq_hz: f64, n_samples: usize, sample_rate: u32) -> Waveform {
    let samples = (0..n_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.5 * (freq_hz * 2.0 * std::f64::consts::PI * t).sin()) as f32
        })
        .collect();
    Waveform::new(samples, sample_rate).unwrap()
}

fn bench_preprocess(c: &mut Criterion) {
    let pre = Preprocessor::new(PreprocessConfig::default(), 16000, true);
    let wave = make_sine(440.0, 48000, 16000); // 3s

    c.bench_function("voicegate_preprocess_3s", |b| {
        b.iter(|| {
            let _ = black_box(pre.process(black_box(&wave)));
        });
    });
}

fn bench_preprocess_denoise(c: &mut Criterion) {
    let mut cfg = PreprocessConfig::default();
    cfg.noise_suppression.enabled = true;
    let pre = Preprocessor::new(cfg, 16000, true);
    let wave = make_sine(440.0, 48000, 16000); // 3s

    c.bench_function("voicegate_preprocess_denoise_3s", |b| {
        b.iter(|| {
            let _ = black_box(pre.process(black_box(&wave)));
        });
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
    let wave = make_sine(440.0, 16000, 16000); // 1s

    c.bench_function("voicegate_aggregate_1s", |b| {
        b.iter(|| {
            let _ = black_box(ex.extract_aggregate(black_box(&wave)));
        });
    });
}

fn bench_frames(c: &mut Criterion) {
    let ex = FeatureExtractor::new(FeatureConfig::default(), 16000);
    let wave = make_sine(220.0, 16000, 16000); // 1s

    c.bench_function("voicegate_frames_1s", |b| {
        b.iter(|| {
            let _ = black_box(ex.extract_frames(black_box(&wave)));
        });
    });
}

fn bench_dtw(c: &mut Criterion) {
    let a: Vec<Vec<f32>> = (0..100).map(|i| vec![(i as f32 * 0.1).sin(); 14]).collect();
    let b_seq: Vec<Vec<f32>> = (0..120).map(|i| vec![(i as f32 * 0.08).sin(); 14]).collect();

    c.bench_function("voicegate_dtw_100x120", |b| {
        b.iter(|| black_box(dtw_distance(black_box(&a), black_box(&b_seq), None)));
    });
    c.bench_function("voicegate_dtw_100x120_band20", |b| {
        b.iter(|| black_box(dtw_distance(black_box(&a), black_box(&b_seq), Some(20))));
    });
}

fn bench_test(c: &mut Criterion) {
    let gate = VoiceGate::new(Config::default()).unwrap();
    let mut store = MemoryStore::new();
    for (i, label) in ["open", "close", "owner"].iter().enumerate() {
        for k in 0..3 {
            let f = 150.0 + 120.0 * i as f64 + 3.0 * k as f64;
            store.add_reference(label, &make_sine(f, 16000, 16000)).unwrap();
        }
    }
    let query = make_sine(150.0, 48000, 16000);

    c.bench_function("voicegate_test_9_refs", |b| {
        b.iter(|| {
            let _ = black_box(gate.test(black_box(&query), &store));
        });
    });
}

criterion_group!(
    benches,
    bench_preprocess,
    bench_preprocess_denoise,
    bench_aggregate,
    bench_frames,
    bench_dtw,
    bench_test,
);
criterion_main!(benches);
