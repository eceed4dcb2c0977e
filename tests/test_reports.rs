mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use buildrelay::fs::MockFileSystem;
use buildrelay::report::{parse_report, summarize, ReportError, ReportParser};
use buildrelay_test_utils::builders::{junit_suites, JunitSuiteBuilder};
use common::{init_tracing, TestResult};

const RESULTS: &str = "/app/build/test-results";

fn parser_over(fs: &MockFileSystem) -> ReportParser {
    ReportParser::new(Arc::new(fs.clone()))
}

#[test]
fn parses_a_hand_built_suite() -> TestResult {
    init_tracing();
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuite name="S" tests="2" skipped="0" failures="1" errors="0" time="0.02">
  <testcase name="passes" classname="com.example.S" time="0.01"/>
  <testcase name="fails" classname="com.example.S" time="0.01">
    <failure message="expected 1 but was 2" type="java.lang.AssertionError">stack trace here</failure>
  </testcase>
</testsuite>"#;

    let suites = parse_report(Path::new("TEST-S.xml"), xml)?;
    assert_eq!(suites.len(), 1);
    let suite = &suites[0];
    assert_eq!(suite.name, "S");
    assert_eq!(suite.tests, 2);
    assert_eq!(suite.failures, 1);
    assert!((suite.duration.as_secs_f64() - 0.02).abs() < 1e-9);
    assert_eq!(suite.test_cases.len(), 2);

    let failing: Vec<_> = suite.test_cases.iter().filter(|c| !c.failures.is_empty()).collect();
    assert_eq!(failing.len(), 1);
    let failure = &failing[0].failures[0];
    assert_eq!(failure.message, "expected 1 but was 2");
    assert_eq!(failure.kind.as_deref(), Some("java.lang.AssertionError"));
    assert_eq!(failure.contents.as_deref(), Some("stack trace here"));
    assert!(!failure.is_error);
    assert!(suite.test_cases[0].passed());
    Ok(())
}

#[test]
fn missing_skipped_attribute_defaults_to_zero() -> TestResult {
    let xml = JunitSuiteBuilder::new("NoSkipped")
        .without_skipped_attr()
        .passing("a", "0.5")
        .build();
    let suites = parse_report(Path::new("r.xml"), &xml)?;
    assert_eq!(suites[0].skipped, 0);
    assert_eq!(suites[0].test_cases[0].duration, Duration::from_millis(500));
    Ok(())
}

#[test]
fn missing_required_attribute_is_an_error() {
    let xml = r#"<testsuite name="S" tests="1" errors="0" time="1"><testcase name="a"/></testsuite>"#;
    match parse_report(Path::new("/r/bad.xml"), xml) {
        Err(ReportError::MissingAttribute { element, attribute, path }) => {
            assert_eq!(element, "testsuite");
            assert_eq!(attribute, "failures");
            assert_eq!(path, Path::new("/r/bad.xml"));
        }
        other => panic!("expected MissingAttribute, got {other:?}"),
    }
}

#[test]
fn non_numeric_attribute_is_an_error() {
    let xml = r#"<testsuite name="S" tests="many" failures="0" errors="0" time="1"/>"#;
    assert!(matches!(
        parse_report(Path::new("r.xml"), xml),
        Err(ReportError::InvalidAttribute { .. })
    ));
}

#[test]
fn testsuites_root_wraps_several_suites() -> TestResult {
    let xml = junit_suites(&[
        JunitSuiteBuilder::new("First").passing("a", "0.1"),
        JunitSuiteBuilder::new("Second").failing("b", "nope", "trace").skipped("c"),
    ]);
    let suites = parse_report(Path::new("all.xml"), &xml)?;
    let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["First", "Second"]);
    assert_eq!(suites[1].skipped, 1);
    assert!(suites[1].test_cases[1].skipped);
    Ok(())
}

#[test]
fn error_elements_are_failures_flagged_as_errors() -> TestResult {
    let xml = JunitSuiteBuilder::new("E").erroring("crashes", "boom").build();
    let suites = parse_report(Path::new("e.xml"), &xml)?;
    let failure = &suites[0].test_cases[0].failures[0];
    assert!(failure.is_error);
    assert_eq!(failure.message, "boom");
    assert_eq!(failure.contents, None);
    assert_eq!(suites[0].errors, 1);
    Ok(())
}

#[test]
fn system_output_is_concatenated() -> TestResult {
    let xml = JunitSuiteBuilder::new("Out")
        .passing("a", "0")
        .system_out("first ")
        .system_out("second")
        .system_err("err")
        .build();
    let suites = parse_report(Path::new("o.xml"), &xml)?;
    assert_eq!(suites[0].system_out, "first second");
    assert_eq!(suites[0].system_err, "err");
    Ok(())
}

#[test]
fn unrelated_root_element_yields_nothing() -> TestResult {
    let suites = parse_report(Path::new("lint.xml"), "<issues><issue/></issues>")?;
    assert!(suites.is_empty());
    Ok(())
}

#[test]
fn malformed_xml_is_an_error() {
    assert!(matches!(
        parse_report(Path::new("broken.xml"), "<testsuite"),
        Err(ReportError::Xml { .. })
    ));
}

#[test]
fn scans_task_directories_and_skips_other_files() -> TestResult {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_file(
        format!("{RESULTS}/testDebugUnitTest/TEST-B.xml"),
        JunitSuiteBuilder::new("B").passing("b1", "0.2").build(),
    );
    fs.add_file(
        format!("{RESULTS}/testDebugUnitTest/TEST-A.xml"),
        JunitSuiteBuilder::new("A").failing("a1", "bad", "trace").build(),
    );
    fs.add_file(format!("{RESULTS}/testDebugUnitTest/output.bin"), vec![0u8, 159, 146]);
    fs.add_file(
        format!("{RESULTS}/testReleaseUnitTest/TEST-C.xml"),
        JunitSuiteBuilder::new("C").skipped("c1").build(),
    );

    let suites = parser_over(&fs).parse_dir(Path::new(RESULTS))?;
    let names: Vec<&str> = suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "C"]);
    Ok(())
}

#[test]
fn missing_results_directory_is_an_error() {
    let fs = MockFileSystem::new();
    assert!(matches!(
        parser_over(&fs).parse_dir(Path::new("/nowhere")),
        Err(ReportError::MissingDirectory(_))
    ));
}

#[test]
fn one_bad_report_fails_the_whole_parse() {
    let fs = MockFileSystem::new();
    fs.add_file(
        format!("{RESULTS}/test/TEST-Good.xml"),
        JunitSuiteBuilder::new("Good").passing("a", "0").build(),
    );
    fs.add_file(format!("{RESULTS}/test/TEST-Bad.xml"), "<testsuite name=");
    assert!(parser_over(&fs).parse_dir(Path::new(RESULTS)).is_err());
}

#[test]
fn custom_pattern_filters_files() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file(
        format!("{RESULTS}/test/TEST-Kept.xml"),
        JunitSuiteBuilder::new("Kept").passing("a", "0").build(),
    );
    fs.add_file(
        format!("{RESULTS}/test/coverage.xml"),
        "<coverage/>",
    );

    let parser = parser_over(&fs).with_pattern("TEST-*.xml")?;
    let files = parser.report_files(Path::new(RESULTS))?;
    assert_eq!(files.len(), 1);
    assert!(files[0].ends_with("TEST-Kept.xml"));

    assert!(matches!(
        parser_over(&fs).with_pattern("[unclosed"),
        Err(ReportError::InvalidPattern { .. })
    ));
    Ok(())
}

#[test]
fn summary_totals_and_failed_cases() -> TestResult {
    let xml = junit_suites(&[
        JunitSuiteBuilder::new("First").time("1.5").passing("a", "1.0").failing("b", "wrong", "t"),
        JunitSuiteBuilder::new("Second").time("0.5").skipped("c").erroring("d", "crash"),
    ]);
    let suites = parse_report(Path::new("all.xml"), &xml)?;
    let summary = summarize(&suites);

    assert_eq!(summary.suites, 2);
    assert_eq!(summary.tests, 4);
    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.duration, Duration::from_secs(2));
    assert!(!summary.is_success());

    let failed: Vec<&str> = summary.failed_cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(failed, ["First.b", "Second.d"]);

    let rendered = summary.to_string();
    assert!(rendered.starts_with("4 tests in 2 suites: 1 passed, 1 skipped, 1 failed, 1 errors"));
    assert!(rendered.contains("FAILED First > First.b: wrong"));
    Ok(())
}
