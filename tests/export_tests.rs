use edf_export::container::{CHUNK_BLOB, CHUNK_CONTAINER, CHUNK_METADATA, CHUNK_SEGMENT, SCF_MAGIC};
use edf_export::doctest_utils::{simple_fixture, EdfFixture};
use edf_export::export::MetadataScope;
use edf_export::{export_recording, ContainerWriter, EdfError, EdfReader, ExportOptions, MemorySink};
use std::io::Cursor;

fn export_fixture(fixture: &EdfFixture, options: &ExportOptions) -> edf_export::Result<MemorySink> {
    let mut reader = EdfReader::from_reader(Cursor::new(fixture.to_bytes()))?;
    let mut sink = MemorySink::new();
    export_recording(&mut reader, &mut sink, options)?;
    Ok(sink)
}

#[test]
fn test_container_properties() {
    let sink = export_fixture(&simple_fixture(), &ExportOptions::default()).unwrap();
    let props = sink.container.unwrap();

    assert_eq!(props.start.to_string(), "2002-03-02 14:27:00");
    assert_eq!(props.end.to_string(), "2002-03-02 14:27:03");
    assert_eq!(props.sample_rate, 4.0);
    assert_eq!(props.description, "EDF+ recording");

    // Annotation signals are never channels
    let names: Vec<&str> = props.channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["ECG I", "ECG II"]);
    assert_eq!(props.channels[1].index, 1);
    assert_eq!(props.channels[0].unit, "mV");
    assert_eq!(props.channels[0].comment, "Physical (-5,5) to (-32768,32767)");
}

#[test]
fn test_segments_are_contiguous_and_ordered() {
    let sink = export_fixture(&simple_fixture(), &ExportOptions::default()).unwrap();

    assert_eq!(sink.segments.len(), 3);
    let ranges: Vec<(u64, u64)> = sink.segments.iter().map(|s| (s.first_sample, s.last_sample)).collect();
    assert_eq!(ranges, vec![(0, 3), (4, 7), (8, 11)]);

    for pair in sink.segments.windows(2) {
        assert!(pair[0].last_sample < pair[1].first_sample);
        assert_eq!(pair[0].last_sample + 1, pair[1].first_sample);
    }
    for (segment, blob_id) in sink.segments.iter().zip(1u32..) {
        assert_eq!(segment.blob_id, blob_id);
        assert_eq!(segment.recording_id, 1);
    }
}

#[test]
fn test_blobs_are_frame_major() {
    let sink = export_fixture(&simple_fixture(), &ExportOptions::default()).unwrap();

    let values: Vec<i16> = sink.blobs[1]
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect();
    // record 1: ECG I = 10..=13, ECG II = -1..=-4
    assert_eq!(values, vec![10, -1, 11, -2, 12, -3, 13, -4]);
}

#[test]
fn test_metadata() {
    let options = ExportOptions {
        original_filename: Some("session.edf".to_string()),
        recording_type: Some("EKG 6-lead".to_string()),
        ..ExportOptions::default()
    };
    let sink = export_fixture(&simple_fixture(), &options).unwrap();

    assert_eq!(sink.metadata_value("Recording.Software"), Some("edf-export"));
    assert_eq!(sink.metadata_value("Recording.OriginalFilename"), Some("session.edf"));
    assert_eq!(sink.metadata_value("Recording.Type"), Some("EKG 6-lead"));
    assert_eq!(sink.metadata_value("Recording.Format"), Some("EDF+C"));
    assert_eq!(sink.metadata_value("Patient.Code"), Some("MCH-0234567"));
    assert_eq!(sink.metadata_value("Annotations.Count"), Some("1"));
    assert_eq!(sink.metadata_value("Annotation.0"), Some("1.5;0.2;Beat"));

    let scopes: Vec<MetadataScope> = sink
        .metadata
        .iter()
        .filter(|(_, key, _)| key == "Recording.Software" || key == "Patient.Code")
        .map(|(scope, _, _)| *scope)
        .collect();
    assert_eq!(scopes, vec![MetadataScope::Global, MetadataScope::Recording(1)]);
}

#[test]
fn test_sample_rate_override() {
    let options = ExportOptions { sample_rate: Some(2000.0), ..ExportOptions::default() };
    let sink = export_fixture(&simple_fixture(), &options).unwrap();
    assert_eq!(sink.container.unwrap().sample_rate, 2000.0);
}

#[test]
fn test_skipped_annotations_still_export_samples() {
    let fixture = EdfFixture::new()
        .signal("EDF Annotations", 6)
        .signal("ECG", 2)
        .record(vec![EdfFixture::annotations(b"+0\x14\x14\x00", 6), EdfFixture::samples(&[1, 2])])
        .record(vec![EdfFixture::annotations(b"broken", 6), EdfFixture::samples(&[3, 4])]);

    let mut reader = EdfReader::from_reader(Cursor::new(fixture.to_bytes())).unwrap();
    let mut sink = MemorySink::new();
    let summary = export_recording(&mut reader, &mut sink, &ExportOptions::default()).unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.skipped_annotation_spans, 1);
    assert_eq!(summary.samples_per_channel, 4);
    assert_eq!(sink.blobs[1], vec![3, 0, 4, 0]);
}

#[test]
fn test_mixed_sample_counts_are_rejected() {
    let fixture = EdfFixture::new()
        .signal("ECG", 4)
        .signal("Resp", 1)
        .signal("EDF Annotations", 6)
        .record(vec![
            EdfFixture::samples(&[0, 0, 0, 0]),
            EdfFixture::samples(&[0]),
            EdfFixture::annotations(b"+0\x14\x14\x00", 6),
        ]);

    let result = export_fixture(&fixture, &ExportOptions::default());
    assert!(matches!(result, Err(EdfError::Export(_))));
}

#[test]
fn test_export_to_container_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.scf");

    let mut reader = EdfReader::from_reader(Cursor::new(simple_fixture().to_bytes())).unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = ContainerWriter::new(file).unwrap();
    export_recording(&mut reader, &mut writer, &ExportOptions::default()).unwrap();
    writer.finish().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(&bytes[..4], &SCF_MAGIC);

    let mut kinds = Vec::new();
    let mut rest = &bytes[4..];
    while !rest.is_empty() {
        let len = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
        kinds.push(rest[0]);
        rest = &rest[5 + len..];
    }

    assert_eq!(kinds[0], CHUNK_CONTAINER);
    assert_eq!(kinds.iter().filter(|&&k| k == CHUNK_BLOB).count(), 3);
    assert_eq!(kinds.iter().filter(|&&k| k == CHUNK_SEGMENT).count(), 3);
    assert!(kinds.iter().any(|&k| k == CHUNK_METADATA));
    // every segment follows its blob
    assert_eq!(&kinds[1..7], &[CHUNK_BLOB, CHUNK_SEGMENT, CHUNK_BLOB, CHUNK_SEGMENT, CHUNK_BLOB, CHUNK_SEGMENT]);
}
