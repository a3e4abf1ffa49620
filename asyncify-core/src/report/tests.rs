//! Tests for report recording and the report store

#[cfg(test)]
mod report_tests {
    use crate::naming::FunctionKind;
    use crate::report::*;
    use std::sync::Arc;
    use swc_common::{sync::Lrc, FileName, SourceMap, Span};

    fn sample_report(path: &str) -> FileReport {
        FileReport {
            file_path: path.to_string(),
            ignored_promise_awaits: vec![SkipRecord {
                start: "3:14".to_string(),
                end: "3:40".to_string(),
            }],
            converted_functions: vec![ConversionRecord {
                name: "load".to_string(),
                kind: "ObjectMethod".to_string(),
                start: "1:12".to_string(),
                end: "5:3".to_string(),
            }],
        }
    }

    #[test]
    fn test_serialized_field_names() {
        let json = serde_json::to_value(sample_report("src/api.js")).unwrap();
        assert_eq!(json["filePath"], "src/api.js");
        assert_eq!(json["ignoredPromiseAwaits"][0]["start"], "3:14");
        assert_eq!(json["convertedFunctions"][0]["name"], "load");
        assert_eq!(json["convertedFunctions"][0]["type"], "ObjectMethod");
        assert_eq!(json["convertedFunctions"][0]["end"], "5:3");
    }

    #[test]
    fn test_recorder_formats_line_and_column() {
        let cm: Lrc<SourceMap> = Default::default();
        let src = "const a = 1;\n  const b = () => 2;\n";
        let file = cm.new_source_file(FileName::Custom("pos.js".into()).into(), src.to_string());
        let lo = file.start_pos + swc_common::BytePos(15);
        let hi = file.start_pos + swc_common::BytePos(33);

        let mut recorder = Recorder::new(&cm);
        recorder.convert("b", FunctionKind::ArrowFunctionExpression, Span::new(lo, hi));
        recorder.skip(Span::new(lo, hi));
        assert_eq!(recorder.conversion_count(), 1);
        assert_eq!(recorder.skip_count(), 1);

        let report = recorder.into_report("pos.js");
        assert_eq!(report.converted_functions[0].start, "2:2");
        assert_eq!(report.converted_functions[0].end, "2:20");
        assert_eq!(report.converted_functions[0].kind, "ArrowFunctionExpression");
        assert_eq!(report.ignored_promise_awaits[0].start, "2:2");
    }

    fn item_count(contents: &str) -> usize {
        contents.lines().filter(|line| line.starts_with("- ")).count()
    }

    #[test]
    fn test_store_appends_one_item_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.yaml");

        let store = ReportStore::open(&path).unwrap();
        store.append(&sample_report("a.js")).unwrap();
        store.append(&sample_report("b.js")).unwrap();
        store.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(item_count(&contents), 2);
        assert!(contents.starts_with("- filePath: a.js\n"));

        let reports = read_reports(&path).unwrap();
        assert_eq!(reports[0].file_path, "a.js");
        assert_eq!(reports[1].file_path, "b.js");
    }

    #[test]
    fn test_store_is_append_only_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");

        let first = ReportStore::open(&path).unwrap();
        first.append(&sample_report("a.js")).unwrap();
        first.close().unwrap();

        let second = ReportStore::open(&path).unwrap();
        second.append(&sample_report("b.js")).unwrap();
        second.close().unwrap();

        let names: Vec<String> = read_reports(&path)
            .unwrap()
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_parallel_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let store = Arc::new(ReportStore::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        store.append(&sample_report(&format!("file-{}-{}.js", i, j))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        Arc::try_unwrap(store).unwrap().close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(item_count(&contents), 200);
        let reports = read_reports(&path).unwrap();
        assert_eq!(reports.len(), 200, "every append should produce one intact item");
        assert!(reports.iter().all(|r| r.converted_functions.len() == 1));
    }

    #[test]
    fn test_store_without_appends_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("out.yaml");

        let store = ReportStore::open(&path).unwrap();
        assert_eq!(store.path(), path.as_path());
        store.close().unwrap();

        assert!(!path.exists());
        assert!(!dir.path().join("reports").exists());
    }

    #[test]
    fn test_open_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ReportStore::open(dir.path()).is_err());
    }

    #[test]
    fn test_read_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        std::fs::write(&path, "\n").unwrap();
        assert!(read_reports(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_rejects_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        std::fs::write(&path, "- filePath: [unterminated\n").unwrap();
        assert!(read_reports(&path).is_err());
    }
}
