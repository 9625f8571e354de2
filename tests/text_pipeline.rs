mod common;

use std::fs;
use std::path::Path;

use cachepipe::caching::{Cache, CacheConfig, CacheKey};
use cachepipe::pipeline::{Parameters, PipelineOptions};
use cachepipe::runtime::{Runtime, TextPipelinePlan};
use filetime::{FileTime, set_file_mtime};
use tempfile::TempDir;

use common::SharedBuffer;

const T0: i64 = 1_700_000_000;

fn runtime() -> Runtime {
    Runtime::new(&CacheConfig::default(), PipelineOptions::default()).expect("runtime")
}

fn write_at(path: &Path, contents: &str, mtime: i64) {
    fs::write(path, contents).expect("write");
    set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).expect("mtime");
}

fn request(runtime: &Runtime, plan: &TextPipelinePlan, params: &[(&str, &str)]) -> String {
    let mut pipeline = runtime.text_pipeline(plan).expect("assemble");
    let mut parameters = Parameters::for_run();
    for (name, value) in params {
        parameters.insert_text(*name, *value);
    }

    let out = SharedBuffer::default();
    pipeline
        .setup(Box::new(out.clone()), &mut parameters)
        .expect("setup");
    pipeline.execute().expect("execute");
    out.contents()
}

#[test]
fn replacements_apply_in_order() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("input.txt");
    write_at(&input, "hello world\nworld peace\n", T0);

    let plan = TextPipelinePlan {
        replacements: vec![
            ("world".to_string(), "there".to_string()),
            ("there peace".to_string(), "calm".to_string()),
        ],
        ..TextPipelinePlan::new(&input)
    };

    assert_eq!(request(&runtime(), &plan, &[]), "hello there\ncalm\n");
}

#[test]
fn template_wraps_document_and_keys_on_used_parameters() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("input.txt");
    let template = dir.path().join("page.tpl");
    write_at(&input, "body\n", T0);
    write_at(&template, "<{{title}}>\n{{content}}\n</{{title}}>\n", T0);

    let runtime = runtime();
    let plan = TextPipelinePlan {
        template: Some(template.clone()),
        ..TextPipelinePlan::new(&input)
    };

    assert_eq!(
        request(&runtime, &plan, &[("title", "home"), ("unused", "x")]),
        "<home>\nbody\n</home>\n"
    );
    assert_eq!(
        request(&runtime, &plan, &[("title", "about")]),
        "<about>\nbody\n</about>\n"
    );
    assert_eq!(runtime.cache().len(), 2, "each title value gets its own entry");
    assert_eq!(runtime.resources().len(), 1, "template compiled once");

    // Template edits recompile and invalidate.
    write_at(&template, "[{{title}}]\n{{content}}\n", T0 + 60);
    assert_eq!(
        request(&runtime, &plan, &[("title", "about")]),
        "[about]\nbody\n"
    );
}

#[test]
fn includes_are_tracked_through_the_key_cache() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("input.txt");
    let header = dir.path().join("header.txt");
    write_at(&input, "@include header.txt\nbody\n", T0);
    write_at(&header, "header v1\n", T0);

    let runtime = runtime();
    let plan = TextPipelinePlan {
        include_base: Some(dir.path().to_path_buf()),
        ..TextPipelinePlan::new(&input)
    };

    // First run records the include list, second stores under the resolved key.
    assert_eq!(request(&runtime, &plan, &[]), "header v1\nbody\n");
    assert_eq!(request(&runtime, &plan, &[]), "header v1\nbody\n");
    assert_eq!(runtime.keys().len(), 1);

    // Unchanged stamp: the stored output is replayed.
    write_at(&header, "header v2\n", T0);
    assert_eq!(request(&runtime, &plan, &[]), "header v1\nbody\n");

    write_at(&header, "header v2\n", T0 + 60);
    assert_eq!(request(&runtime, &plan, &[]), "header v2\nbody\n");
}

#[test]
fn key_composition_follows_stage_order() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("input.txt");
    write_at(&input, "text\n", T0);

    let runtime = runtime();
    let plan = TextPipelinePlan {
        replacements: vec![("a".to_string(), "b".to_string())],
        ..TextPipelinePlan::new(&input)
    };
    let mut pipeline = runtime.text_pipeline(&plan).expect("assemble");
    pipeline
        .setup(Box::new(SharedBuffer::default()), &mut Parameters::new())
        .expect("setup");

    let Some(CacheKey::Compound(compound)) = pipeline.cache_key() else {
        panic!("expected a compound key");
    };
    let kinds: Vec<_> = compound
        .keys()
        .iter()
        .map(|key| match key {
            CacheKey::TimestampUrl(_) => "timestamp-url",
            CacheKey::Parameter(_) => "parameter",
            CacheKey::Simple => "simple",
            _ => "other",
        })
        .collect();
    assert_eq!(kinds, ["timestamp-url", "parameter", "simple"]);
}
