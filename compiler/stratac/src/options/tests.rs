use std::path::PathBuf;
use std::time::Duration;

use pretty_assertions::assert_eq;

use super::{parse_args, Options, Output, UsageError};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[test]
fn defaults_read_stdin_and_print_text() {
    assert_eq!(
        parse_args(&[]),
        Ok(Options {
            text: Some(Output::Stdout),
            ..Options::default()
        })
    );
}

#[test]
fn every_flag() {
    let options = parse_args(&args(&[
        "-d",
        "--timeout",
        "1.5",
        "--cache-dir",
        "/tmp/c",
        "--json",
        "-",
        "--text",
        "out.txt",
        "input.strata",
    ]))
    .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(
        options,
        Options {
            file: Some(PathBuf::from("input.strata")),
            disable_cache: true,
            timeout: Some(Duration::from_millis(1500)),
            cache_dir: Some(PathBuf::from("/tmp/c")),
            text: Some(Output::File(PathBuf::from("out.txt"))),
            json: Some(Output::Stdout),
            help: false,
        }
    );
}

#[test]
fn json_alone_suppresses_the_default_text() {
    let options = parse_args(&args(&["--json", "plans.json"])).unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(options.text, None);
}

#[test]
fn bad_arguments() {
    assert_eq!(parse_args(&args(&["-t"])), Err(UsageError::MissingValue("-t".into())));
    assert_eq!(parse_args(&args(&["-t", "-3"])), Err(UsageError::BadTimeout("-3".into())));
    assert_eq!(parse_args(&args(&["-t", "soon"])), Err(UsageError::BadTimeout("soon".into())));
    assert_eq!(parse_args(&args(&["--java", "x"])), Err(UsageError::UnknownOption("--java".into())));
    assert_eq!(parse_args(&args(&["a", "b"])), Err(UsageError::ExtraFile("b".into())));
}
