use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use log_ids::{output_path_for, Diagnostics, IdIndexer, IndexError, IndexerConfig, PairingMode, ScanError};

fn index_str(input: &str, config: IndexerConfig) -> (Result<log_ids::IndexSummary, IndexError>, String) {
    let mut indexer = IdIndexer::new(config);
    let mut out = Vec::new();
    let result = indexer.index(Cursor::new(input.as_bytes()), &mut out);
    (result, String::from_utf8(out).unwrap())
}

fn write_input(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn writes_one_line_per_record_in_order() {
    let input = concat!(
        r#"{"_eventid":"a","_modelid":"1"}"#, "\n",
        r#"{"_modelid":"2","_eventid":"b"}"#, "\n",
        r#"{"x":{"_eventid":"c"}}"#, "\n",
    );
    let (result, out) = index_str(input, IndexerConfig::default());
    let summary = result.unwrap();
    assert_eq!(out, "a 1\nb 2\nc \n");
    assert_eq!(summary.lines_written, 3);
    assert_eq!(summary.early_stops, 2);
}

#[test]
fn last_line_without_newline_and_crlf() {
    let input = "{\"_eventid\":\"a\"}\r\n{\"_eventid\":\"b\",\"_modelid\":\"m\"}";
    let (result, out) = index_str(input, IndexerConfig::default());
    assert_eq!(result.unwrap().lines_written, 2);
    assert_eq!(out, "a \nb m\n");
}

#[test]
fn concrete_scenarios() {
    let input = concat!(
        r#"{"_eventid":"ev1","_modelid":"m1","other":{"_eventid":"ignored"}}"#, "\n",
        r#"{"a":1,"_eventid":"ev2"}"#, "\n",
    );
    let (result, out) = index_str(input, IndexerConfig::default());
    assert!(result.is_ok());
    assert_eq!(out, "ev1 m1\nev2 \n");
}

#[test]
fn aborts_on_first_missing_event_id() {
    let input = concat!(
        r#"{"_eventid":"one"}"#, "\n",
        r#"{"_modelid":"no event"}"#, "\n",
        r#"{"_eventid":"three"}"#, "\n",
    );
    let (result, out) = index_str(input, IndexerConfig::default());
    let err = result.unwrap_err();
    assert!(matches!(err, IndexError::MissingEventId { line: 2 }), "got {err:?}");
    assert_eq!(err.to_string(), "Missing event id on line 2");
    assert_eq!(out, "one \n");
}

#[test]
fn empty_event_id_counts_as_missing() {
    let (result, _) = index_str("{\"_eventid\":\"\"}\n", IndexerConfig::default());
    assert!(matches!(result, Err(IndexError::MissingEventId { line: 1 })));
}

#[test]
fn blank_line_aborts() {
    let (result, out) = index_str("{\"_eventid\":\"a\"}\n\n{\"_eventid\":\"b\"}\n", IndexerConfig::default());
    assert!(matches!(result, Err(IndexError::MissingEventId { line: 2 })));
    assert_eq!(out, "a \n");
}

#[test]
fn malformed_line_is_collapsed_by_default() {
    let (result, _) = index_str("{\"_eventid\":\"a\"}\n{\"_eventid\":\n", IndexerConfig::default());
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "Missing event id on line 2");
    assert_eq!(err.line(), Some(2));
}

#[test]
fn malformed_line_is_reported_in_detailed_mode() {
    let config = IndexerConfig { diagnostics: Diagnostics::Detailed, ..IndexerConfig::default() };
    let (result, _) = index_str("{\"_eventid\":\"a\"} trailing\n", config);
    match result {
        Err(IndexError::MalformedLine { line, source }) => {
            assert_eq!(line, 1);
            assert_eq!(source, ScanError::TrailingCharacters { offset: 17 });
        }
        other => panic!("expected MalformedLine, got {other:?}"),
    }

    // A valid line without the key is still a missing event id.
    let config = IndexerConfig { diagnostics: Diagnostics::Detailed, ..IndexerConfig::default() };
    let (result, _) = index_str("{\"a\":1}\n", config);
    assert!(matches!(result, Err(IndexError::MissingEventId { line: 1 })));
}

#[test]
fn lenient_pairing_flows_through_the_pipeline() {
    let input = "{\"_eventid\":5,\"x\":\"y\"}\n";
    let (strict, _) = index_str(input, IndexerConfig::default());
    assert!(matches!(strict, Err(IndexError::MissingEventId { line: 1 })));

    let config = IndexerConfig { pairing: PairingMode::Lenient, ..IndexerConfig::default() };
    let (lenient, out) = index_str(input, config);
    assert!(lenient.is_ok());
    assert_eq!(out, "y \n");
}

#[test]
fn raw_bytes_are_copied_verbatim() {
    let mut indexer = IdIndexer::new(IndexerConfig::default());
    let mut out = Vec::new();
    let input: &[u8] = b"{\"_eventid\":\"caf\xe9\",\"_modelid\":\"m\"}\n";
    indexer.index(Cursor::new(input), &mut out).unwrap();
    assert_eq!(out, b"caf\xe9 m\n");
}

#[test]
fn output_path_appends_suffix() {
    assert_eq!(output_path_for(Path::new("logs/events.json"), ".ids"), PathBuf::from("logs/events.json.ids"));
    assert_eq!(output_path_for(Path::new("events"), ".out"), PathBuf::from("events.out"));
}

#[test]
fn index_file_writes_sidecar_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(
        dir.path(),
        "events.json",
        "{\"_eventid\":\"a\",\"_modelid\":\"x\"}\n{\"_eventid\":\"b\"}\n",
    );

    let mut indexer = IdIndexer::new(IndexerConfig::default());
    let report = indexer.index_file(&input).unwrap();
    assert_eq!(report.output, dir.path().join("events.json.ids"));
    assert_eq!(report.summary.lines_written, 2);
    let first = fs::read(&report.output).unwrap();
    assert_eq!(first, b"a x\nb \n");

    let again = indexer.index_file(&input).unwrap();
    assert_eq!(fs::read(&again.output).unwrap(), first);
}

#[test]
fn index_file_keeps_partial_output_on_abort() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.json", "{\"_eventid\":\"one\"}\n{\"nope\":1}\n{\"_eventid\":\"three\"}\n");

    let mut indexer = IdIndexer::new(IndexerConfig::default());
    let err = indexer.index_file(&input).unwrap_err();
    assert_eq!(err.line(), Some(2));
    assert_eq!(fs::read_to_string(dir.path().join("in.json.ids")).unwrap(), "one \n");
}

#[test]
fn index_file_truncates_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.json", "{\"_eventid\":\"new\"}\n");
    fs::write(dir.path().join("in.json.ids"), "stale line\nanother\n").unwrap();

    IdIndexer::new(IndexerConfig::default()).index_file(&input).unwrap();
    assert_eq!(fs::read_to_string(dir.path().join("in.json.ids")).unwrap(), "new \n");
}

#[test]
fn index_file_creates_output_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.json", "not json\n");

    let err = IdIndexer::new(IndexerConfig::default()).index_file(&input).unwrap_err();
    assert!(matches!(err, IndexError::MissingEventId { line: 1 }));
    assert_eq!(fs::read(dir.path().join("in.json.ids")).unwrap(), b"");
}

#[test]
fn missing_input_is_reported_and_no_output_created() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("absent.json");

    let err = IdIndexer::new(IndexerConfig::default()).index_file(&input).unwrap_err();
    assert!(matches!(err, IndexError::OpenInput { .. }));
    assert!(!dir.path().join("absent.json.ids").exists());
}

#[test]
fn custom_suffix() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(dir.path(), "in.json", "{\"_eventid\":\"a\"}\n");
    let config = IndexerConfig { output_suffix: ".index".to_string(), ..IndexerConfig::default() };

    let report = IdIndexer::new(config).index_file(&input).unwrap();
    assert_eq!(report.output, dir.path().join("in.json.index"));
    assert!(report.output.exists());
}

/// Accepts writes, fails every flush.
struct FailingFlush {
    written: Vec<u8>,
}

impl Write for FailingFlush {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Other, "disk full"))
    }
}

#[test]
fn flush_failure_names_the_output_not_a_line() {
    let mut indexer = IdIndexer::new(IndexerConfig::default());
    let sink = FailingFlush { written: Vec::new() };
    let input = "{\"_eventid\":\"a\"}\n{\"_eventid\":\"b\"}\n";

    let err = indexer
        .index_and_flush(Cursor::new(input.as_bytes()), sink, Path::new("out.ids"))
        .unwrap_err();
    match &err {
        IndexError::Flush { path, .. } => assert_eq!(path, Path::new("out.ids")),
        other => panic!("expected Flush, got {other:?}"),
    }
    assert_eq!(err.line(), None);
    assert_eq!(err.to_string(), "failed to flush output out.ids");
}

#[test]
fn line_failure_wins_over_flush_failure() {
    let mut indexer = IdIndexer::new(IndexerConfig::default());
    let sink = FailingFlush { written: Vec::new() };

    let err = indexer
        .index_and_flush(Cursor::new("{\"_eventid\":\"a\"}\n{}\n".as_bytes()), sink, Path::new("out.ids"))
        .unwrap_err();
    assert!(matches!(err, IndexError::MissingEventId { line: 2 }), "got {err:?}");
}
