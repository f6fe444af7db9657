// Shared fixtures for cgextract integration tests
#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;
use zip::write::FileOptions;

pub const APP_MAIN: &str = "com.acme.App.main([Ljava/lang/String;)V";
pub const UTIL_HELP: &str = "com.acme.Util.help()V";
pub const TASK_RUN: &str = "com.acme.Task.run()V";

pub const HELP_SITE: &str = "invokestatic < Application, Lcom/acme/Util, help()V >@3";
pub const RUN_SITE: &str = "invokevirtual < Application, Lcom/acme/Task, run()V >@10";

pub const APP_SOURCE: &str = "package com.acme;

public class App {
    public static void main(String[] args) { Util.help();
        Task task = new Task();
        task.run();
    }
}
";

/// Methods shared by every snapshot: `App.main` has debug info, the others do not.
fn methods() -> String {
    format!(
        r#"[
        {{"id": 0, "signature": {{"declaring_class": "Lcom/acme/App", "name": "main", "descriptor": "([Ljava/lang/String;)V"}},
         "instructions": [
            {{"kind": "other", "offset": 0}},
            {{"kind": "invoke", "site": "{help}", "offset": 3}},
            {{"kind": "new", "site": "new Lcom/acme/Task@6", "offset": 6}},
            {{"kind": "invoke", "site": "{run}", "offset": 10}}
         ],
         "line_table": [{{"start_pc": 0, "line": 4}}, {{"start_pc": 6, "line": 5}}, {{"start_pc": 10, "line": 6}}]}},
        {{"id": 1, "signature": {{"declaring_class": "Lcom/acme/Util", "name": "help", "descriptor": "()V"}}}},
        {{"id": 2, "signature": {{"declaring_class": "Lcom/acme/Task", "name": "run", "descriptor": "()V"}}}}
    ]"#,
        help = HELP_SITE,
        run = RUN_SITE
    )
}

/// Context-insensitive graph: 3 nodes, 5 call edges
pub fn insensitive_snapshot() -> String {
    format!(
        r#"{{
    "policy": "zero-cfa",
    "methods": {methods},
    "nodes": [
        {{"id": 0, "method": 0, "call_sites": [
            {{"site": "{help}", "pc": 3, "targets": [1]}},
            {{"site": "{run}", "pc": 10, "targets": [2]}}
        ]}},
        {{"id": 1, "method": 1, "call_sites": [
            {{"site": "invokevirtual < Application, Lcom/acme/Task, run()V >@2", "pc": 2, "targets": [2]}},
            {{"site": "invokestatic < Application, Lcom/acme/Util, help()V >@5", "pc": 5, "targets": [1]}}
        ]}},
        {{"id": 2, "method": 2, "call_sites": [
            {{"site": "invokestatic < Application, Lcom/acme/Util, help()V >@1", "pc": 1, "targets": [1]}}
        ]}}
    ]
}}"#,
        methods = methods(),
        help = HELP_SITE,
        run = RUN_SITE
    )
}

/// 1-CFA graph: `Task.run` is analyzed in the context of the call from `App.main`
pub fn call_string_snapshot() -> String {
    format!(
        r#"{{
    "policy": "n-cfa",
    "sensitivity": 1,
    "methods": {methods},
    "nodes": [
        {{"id": 0, "method": 0, "call_sites": [
            {{"site": "{run}", "pc": 10, "targets": [2]}}
        ]}},
        {{"id": 2, "method": 2,
          "context": {{"kind": "call-string", "entries": [{{"method": 0, "pc": 10, "site": "{run}"}}]}},
          "call_sites": [
            {{"site": "invokestatic < Application, Lcom/acme/Util, help()V >@1", "pc": 1, "targets": [3]}}
        ]}},
        {{"id": 3, "method": 1,
          "context": {{"kind": "call-string", "entries": [{{"method": 2, "pc": 1, "site": "Task.run@1"}}]}}}}
    ]
}}"#,
        methods = methods(),
        run = RUN_SITE
    )
}

/// Write a zip archive with the given `(name, content)` entries
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in entries {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Workspace with `app.jar` and `graph.json` in place
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new(snapshot: &str) -> Self {
        let dir = TempDir::new().unwrap();
        write_zip(dir.child("app.jar").path(), &[("com/acme/App.class", "class bytes")]);
        dir.child("graph.json").write_str(snapshot).unwrap();
        Self { dir }
    }

    pub fn jar(&self) -> PathBuf {
        self.dir.child("app.jar").path().to_path_buf()
    }

    pub fn graph(&self) -> PathBuf {
        self.dir.child("graph.json").path().to_path_buf()
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.child(name).path().to_path_buf()
    }
}

/// Parse a JSON output chunk into its records
pub fn read_records(path: &Path) -> Vec<serde_json::Value> {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}
