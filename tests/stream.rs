//! End-to-end stream scenarios over real backing files.

use std::io::Write;

use voxkit_features::{
    ByteOrder, Feature, FeatureReader, FeatureStream, FileFormat, HistoricMode, MaskedStream,
    MultiFileReader, ReaderConfig,
};

/// Writes a big-endian HTK file with `n` records of `vect` f32 values,
/// record i holding `i*vect .. i*vect+vect`.
fn write_htk(path: &std::path::Path, n: usize, vect: usize) {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(n as i32).to_be_bytes());
    buf.extend_from_slice(&100_000i32.to_be_bytes());
    buf.extend_from_slice(&((vect * 4) as i16).to_be_bytes());
    buf.extend_from_slice(&6i16.to_be_bytes());
    for i in 0..n {
        for k in 0..vect {
            buf.extend_from_slice(&((i * vect + k) as f32).to_be_bytes());
        }
    }
    std::fs::File::create(path)
        .unwrap()
        .write_all(&buf)
        .unwrap();
}

fn write_raw(path: &std::path::Path, records: usize, vect: usize, base: f32) {
    let mut buf = Vec::new();
    for i in 0..records * vect {
        buf.extend_from_slice(&(base + i as f32).to_le_bytes());
    }
    std::fs::File::create(path)
        .unwrap()
        .write_all(&buf)
        .unwrap();
}

fn htk_cfg(dir: &std::path::Path) -> ReaderConfig {
    ReaderConfig {
        format: FileFormat::Htk,
        byte_order: ByteOrder::Auto,
        feature_path: format!("{}/", dir.display()),
        extension: ".htk".into(),
        ..ReaderConfig::default()
    }
}

fn raw_cfg(dir: &std::path::Path, vect: usize) -> ReaderConfig {
    ReaderConfig {
        format: FileFormat::Raw,
        raw_vect_size: vect,
        feature_path: format!("{}/", dir.display()),
        extension: ".raw".into(),
        ..ReaderConfig::default()
    }
}

#[test]
fn htk_single_file_scenario() {
    let dir = tempfile::tempdir().unwrap();
    write_htk(&dir.path().join("utt.htk"), 89, 36);

    let mut stream = FeatureReader::open("utt", &htk_cfg(dir.path())).unwrap();
    assert_eq!(stream.vect_size().unwrap(), 36);
    assert_eq!(stream.feature_count().unwrap(), 89);

    // Reading past the end reports end of stream, not an error.
    stream.seek_feature(89);
    let mut f = Feature::new(36);
    assert!(!stream.read_feature(&mut f).unwrap());

    // A seek matches the corresponding record of a full forward scan.
    stream.reset();
    let mut sixth = Feature::new(36);
    for _ in 0..6 {
        assert!(stream.read_feature(&mut sixth).unwrap());
    }
    stream.seek_feature(5);
    assert!(stream.read_feature(&mut f).unwrap());
    assert_eq!(f, sixth);

    // Masking to 9 of the 36 dimensions narrows the stream width.
    let mut masked =
        MaskedStream::with_mask(stream, "1-2,10-11,24,26,33-35").unwrap();
    assert_eq!(masked.selection_size(), Some(9));
    assert_eq!(masked.vect_size().unwrap(), 9);

    let mut g = Feature::new(9);
    masked.seek_feature(0);
    assert!(masked.read_feature(&mut g).unwrap());
    assert_eq!(
        g.values(),
        &[1.0, 2.0, 10.0, 11.0, 24.0, 26.0, 33.0, 34.0, 35.0]
    );
}

#[test]
fn full_width_mask_is_identity() {
    let dir = tempfile::tempdir().unwrap();
    write_htk(&dir.path().join("utt.htk"), 4, 36);

    let cfg = htk_cfg(dir.path());
    let mut raw = FeatureReader::open("utt", &cfg).unwrap();
    let mut masked =
        MaskedStream::with_mask(FeatureReader::open("utt", &cfg).unwrap(), "0-35").unwrap();
    assert_eq!(masked.vect_size().unwrap(), 36);

    let mut a = Feature::new(36);
    let mut b = Feature::new(36);
    while raw.read_feature(&mut a).unwrap() {
        assert!(masked.read_feature(&mut b).unwrap());
        assert_eq!(a, b);
    }
    assert!(!masked.read_feature(&mut b).unwrap());
}

#[test]
fn two_source_concatenation() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(&dir.path().join("a.raw"), 6, 3, 0.0);
    write_raw(&dir.path().join("b.raw"), 6, 3, 1000.0);

    let mut stream =
        FeatureReader::open_list(vec!["a".into(), "b".into()], &raw_cfg(dir.path(), 3));
    assert_eq!(stream.feature_count().unwrap(), 12);
    assert_eq!(stream.first_index_of(1).unwrap(), 6);
    assert_eq!(
        stream.first_index_of_named("b").unwrap(),
        stream.feature_count_of_named("a").unwrap()
    );

    // The boundary crossing is invisible to the caller.
    let mut f = Feature::new(3);
    stream.seek_feature(5);
    assert!(stream.read_feature(&mut f).unwrap());
    assert_eq!(f.values()[0], 15.0);
    assert!(stream.read_feature(&mut f).unwrap());
    assert_eq!(f.values()[0], 1000.0);
}

#[test]
fn index_mapping_invariant() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(&dir.path().join("a.raw"), 3, 2, 0.0);
    write_raw(&dir.path().join("b.raw"), 7, 2, 0.0);
    write_raw(&dir.path().join("c.raw"), 1, 2, 0.0);

    let mut stream = FeatureReader::open_list(
        vec!["a".into(), "b".into(), "c".into()],
        &raw_cfg(dir.path(), 2),
    );
    let total = stream.feature_count().unwrap();
    let sources = stream.source_count();
    for i in 0..sources {
        let first = stream.first_index_of(i).unwrap();
        let count = stream.feature_count_of(i).unwrap();
        let next = if i + 1 < sources {
            stream.first_index_of(i + 1).unwrap()
        } else {
            total
        };
        assert_eq!(first + count, next);
    }
}

#[test]
fn budget_bounds_memory_across_many_sources() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..8)
        .map(|i| {
            let name = format!("s{i}");
            write_raw(&dir.path().join(format!("{name}.raw")), 16, 4, i as f32 * 1e4);
            name
        })
        .collect();

    // Each source needs 16*4*4 = 256 bytes; the budget holds three.
    let cfg = ReaderConfig {
        memory_budget: 768,
        ..raw_cfg(dir.path(), 4)
    };
    let mut stream = MultiFileReader::new(names, &cfg);

    let mut f = Feature::new(4);
    let total = stream.feature_count().unwrap();
    // A full scan, then revisits, never exceed the budget.
    while stream.read_feature(&mut f).unwrap() {}
    assert!(stream.mem_used() <= 768);
    for g in [0u64, 40, 90, 3, 127] {
        stream.seek_feature(g);
        assert!(stream.read_feature(&mut f).unwrap());
        assert!(stream.mem_used() <= 768);
        assert!(stream.open_entries() <= 3);
    }
    assert_eq!(total, 128);
}

#[test]
fn writable_multi_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(&dir.path().join("a.raw"), 5, 2, 0.0);
    write_raw(&dir.path().join("b.raw"), 5, 2, 500.0);

    let cfg = ReaderConfig {
        writable: true,
        ..raw_cfg(dir.path(), 2)
    };
    let mut stream = FeatureReader::open_list(vec!["a".into(), "b".into()], &cfg);

    // Overwrite every feature with its negated global index.
    let count = stream.feature_count().unwrap();
    let mut f = Feature::new(2);
    for i in 0..count {
        f.values_mut().copy_from_slice(&[-(i as f64), i as f64]);
        assert!(stream.write_feature(&f).unwrap());
    }

    // Read everything back, in order and via seeks.
    stream.reset();
    for i in 0..count {
        assert!(stream.read_feature(&mut f).unwrap());
        assert_eq!(f.values(), &[-(i as f64), i as f64]);
    }
    stream.seek_feature(7);
    assert!(stream.read_feature(&mut f).unwrap());
    assert_eq!(f.values(), &[-7.0, 7.0]);
}

#[test]
fn limited_history_over_concatenation() {
    let dir = tempfile::tempdir().unwrap();
    write_raw(&dir.path().join("a.raw"), 10, 1, 0.0);
    write_raw(&dir.path().join("b.raw"), 10, 1, 100.0);

    let cfg = ReaderConfig {
        historic: HistoricMode::Limited(4),
        ..raw_cfg(dir.path(), 1)
    };
    let mut stream = FeatureReader::open_list(vec!["a".into(), "b".into()], &cfg);

    let mut f = Feature::new(1);
    for _ in 0..15 {
        assert!(stream.read_feature(&mut f).unwrap());
    }
    // High-water mark is 14; the window reaches back into source a.
    stream.seek_feature(10);
    assert!(stream.read_feature(&mut f).unwrap());
    assert!(f.is_valid());
    assert_eq!(f.values()[0], 100.0);

    stream.seek_feature(9);
    assert!(stream.read_feature(&mut f).unwrap());
    assert!(!f.is_valid());
}
