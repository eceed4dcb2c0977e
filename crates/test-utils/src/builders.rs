#![allow(dead_code)]

use std::path::PathBuf;

use buildrelay::config::{ConfigFile, ExitCheckSetting, RawConfigFile};
use buildrelay::diagnostics::{MapEntry, Position, Range, SourceFile, SourceMap};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn with_program(mut self, program: &str, args: &[&str]) -> Self {
        self.config.run.program = Some(program.to_string());
        self.config.run.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.config.run.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_exit_check(mut self, check: ExitCheckSetting) -> Self {
        self.config.run.exit_check = check;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.run.working_dir = Some(dir.into());
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tests.results_dir = Some(dir.into());
        self
    }

    pub fn with_results_pattern(mut self, pattern: &str) -> Self {
        self.config.tests.pattern = pattern.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for position-map JSON documents.
#[derive(Default)]
pub struct SourceMapBuilder {
    map: SourceMap,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generated lines `start..=end` map to `source` at `line:column`.
    pub fn entry(mut self, source: &str, start: u32, end: u32, line: u32, column: u32) -> Self {
        let origin = Position { line, column };
        self.map.entries.push(MapEntry {
            source_file: SourceFile {
                path: PathBuf::from(source),
            },
            source_range: Some(Range {
                start: origin,
                end: origin,
            }),
            range: Range::lines(start, end),
        });
        self
    }

    /// An entry with no known origin.
    pub fn unmapped(mut self, source: &str, start: u32, end: u32) -> Self {
        self.map.entries.push(MapEntry {
            source_file: SourceFile {
                path: PathBuf::from(source),
            },
            source_range: None,
            range: Range::lines(start, end),
        });
        self
    }

    pub fn build(self) -> SourceMap {
        self.map
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.map).expect("position map serialises")
    }
}

/// Builder for JUnit XML `<testsuite>` documents.
pub struct JunitSuiteBuilder {
    name: String,
    time: String,
    skipped_attr: bool,
    cases: Vec<String>,
    system_out: Vec<String>,
    system_err: Vec<String>,
    tests: usize,
    skipped: usize,
    failures: usize,
    errors: usize,
}

impl JunitSuiteBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            time: "0.0".to_string(),
            skipped_attr: true,
            cases: Vec::new(),
            system_out: Vec::new(),
            system_err: Vec::new(),
            tests: 0,
            skipped: 0,
            failures: 0,
            errors: 0,
        }
    }

    pub fn time(mut self, time: &str) -> Self {
        self.time = time.to_string();
        self
    }

    /// Leave the optional `skipped` attribute out of the suite element.
    pub fn without_skipped_attr(mut self) -> Self {
        self.skipped_attr = false;
        self
    }

    pub fn passing(mut self, name: &str, time: &str) -> Self {
        self.tests += 1;
        self.cases.push(format!(
            r#"<testcase name="{name}" classname="{}" time="{time}"/>"#,
            self.name
        ));
        self
    }

    pub fn failing(mut self, name: &str, message: &str, trace: &str) -> Self {
        self.tests += 1;
        self.failures += 1;
        self.cases.push(format!(
            r#"<testcase name="{name}" classname="{}" time="0.001"><failure message="{message}" type="java.lang.AssertionError">{trace}</failure></testcase>"#,
            self.name
        ));
        self
    }

    pub fn erroring(mut self, name: &str, message: &str) -> Self {
        self.tests += 1;
        self.errors += 1;
        self.cases.push(format!(
            r#"<testcase name="{name}" classname="{}" time="0.001"><error message="{message}" type="java.lang.IllegalStateException"/></testcase>"#,
            self.name
        ));
        self
    }

    pub fn skipped(mut self, name: &str) -> Self {
        self.tests += 1;
        self.skipped += 1;
        self.cases.push(format!(
            r#"<testcase name="{name}" classname="{}" time="0"><skipped/></testcase>"#,
            self.name
        ));
        self
    }

    pub fn system_out(mut self, text: &str) -> Self {
        self.system_out.push(text.to_string());
        self
    }

    pub fn system_err(mut self, text: &str) -> Self {
        self.system_err.push(text.to_string());
        self
    }

    /// The `<testsuite>` element on its own.
    pub fn element(&self) -> String {
        let skipped = if self.skipped_attr {
            format!(r#" skipped="{}""#, self.skipped)
        } else {
            String::new()
        };
        let mut xml = format!(
            r#"<testsuite name="{}" tests="{}"{skipped} failures="{}" errors="{}" time="{}">"#,
            self.name, self.tests, self.failures, self.errors, self.time
        );
        for case in &self.cases {
            xml.push_str(case);
        }
        for text in &self.system_out {
            xml.push_str(&format!("<system-out><![CDATA[{text}]]></system-out>"));
        }
        for text in &self.system_err {
            xml.push_str(&format!("<system-err><![CDATA[{text}]]></system-err>"));
        }
        xml.push_str("</testsuite>");
        xml
    }

    /// A complete document with this suite as its root.
    pub fn build(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}",
            self.element()
        )
    }
}

/// A `<testsuites>` document wrapping several suites.
pub fn junit_suites(suites: &[JunitSuiteBuilder]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites>");
    for suite in suites {
        xml.push_str(&suite.element());
    }
    xml.push_str("</testsuites>");
    xml
}
