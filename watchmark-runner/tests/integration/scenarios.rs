// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs through extraction and reconciliation.

use crate::fixtures::*;
use camino::Utf8Path;
use color_eyre::eyre::Result;
use indoc::indoc;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use watchmark_metadata::{REPORT_MARKER, RunReport};
use watchmark_runner::{
    extract::extract,
    identifier::{Position, Status},
    locate::Diagnostic,
    reconcile::{Reconciler, RunState},
    render::RecordingRenderer,
    session::RunSession,
};

const FILE: &str = "/proj/src/file.test.js";

fn passed_at(line: usize) -> String {
    format!(
        r#"{{"numFailedTests":0,"numTotalTests":2,"testResults":[{{"name":"{FILE}","message":"","assertionResults":[{{"status":"passed","location":{{"line":{line},"column":3}},"failureMessages":[]}}]}}]}}"#
    )
}

#[test]
fn sibling_keeps_suite_loading() -> Result<()> {
    test_init();

    let reconciler = Reconciler::new(FILE);
    let mut state = RunState::new(extract(&two_tests()));
    let mut renderer = RecordingRenderer::new();
    assert_eq!(statuses(&state.identifiers), all_loading(&[0, 1, 4]));

    let report = RunReport::parse(&passed_at(2))?;
    let summary = reconciler.apply_report(&mut state, &report, &mut renderer);
    assert_eq!(summary.matched, 1);
    assert_eq!(
        statuses(&state.identifiers),
        two_tests_statuses(Status::Passed, Status::Loading, Status::Loading)
    );

    let report = RunReport::parse(&passed_at(5))?;
    reconciler.apply_report(&mut state, &report, &mut renderer);
    assert_eq!(
        statuses(&state.identifiers),
        two_tests_statuses(Status::Passed, Status::Passed, Status::Passed)
    );

    Ok(())
}

#[test]
fn unreported_test_leaves_suite_pending() -> Result<()> {
    test_init();

    let reconciler = Reconciler::new(FILE);
    let mut state = RunState::new(extract(&two_tests()));
    let mut renderer = RecordingRenderer::new();
    reconciler.apply_report(&mut state, &RunReport::parse(&passed_at(2))?, &mut renderer);
    reconciler.finish_cycle(&mut state, &mut renderer);

    assert_eq!(
        statuses(&state.identifiers),
        btreemap! {
            0 => Status::Pending,
            1 => Status::Passed,
            4 => Status::Pending,
        }
    );
    Ok(())
}

#[test]
fn skipped_test_stays_pending() -> Result<()> {
    test_init();

    let captures = CaptureSetBuilder::new()
        .add_match(&[("root_suite", 0, 0, 7), ("test", 1, 2, 3)])
        .add_match(&[("root_suite", 0, 0, 7), ("test.skip", 4, 2, 6)])
        .build();
    let identifiers = extract(&captures);
    assert_eq!(
        statuses(&identifiers),
        two_tests_statuses(Status::Loading, Status::Pending, Status::Loading)
    );

    let reconciler = Reconciler::new(FILE);
    let mut state = RunState::new(identifiers);
    let mut renderer = RecordingRenderer::new();
    reconciler.apply_report(&mut state, &RunReport::parse(&passed_at(2))?, &mut renderer);
    reconciler.finish_cycle(&mut state, &mut renderer);

    assert_eq!(
        statuses(&state.identifiers),
        two_tests_statuses(Status::Passed, Status::Pending, Status::Passed)
    );
    Ok(())
}

#[test]
fn only_excludes_siblings() {
    test_init();

    // describe("A") {            // 0
    //   test("w")                // 1
    //   describe("B") {          // 3
    //     test.only("x")         // 4
    //     test("y")              // 6
    //   }
    //   test("z")                // 9
    // }
    // describe("C") {            // 12
    //   test("v")                // 13
    // }
    let captures = CaptureSetBuilder::new()
        .add_match(&[("root_suite", 0, 0, 11), ("test", 1, 2, 2)])
        .add_match(&[("root_suite", 0, 0, 11), ("suite", 3, 2, 8)])
        .add_match(&[("root_suite", 0, 0, 11), ("test", 9, 2, 10)])
        .add_match(&[("root_suite", 12, 0, 15), ("test", 13, 2, 14)])
        // Tests of a nested suite come in their own matches, with the suite as
        // the enclosing one, after the siblings above.
        .add_match(&[("root_suite", 3, 2, 8), ("test.only", 4, 4, 5)])
        .add_match(&[("root_suite", 3, 2, 8), ("test", 6, 4, 7)])
        .build();

    let identifiers = extract(&captures);
    assert_eq!(
        statuses(&identifiers),
        btreemap! {
            0 => Status::Loading,
            1 => Status::Pending,
            3 => Status::Loading,
            4 => Status::Loading,
            6 => Status::Pending,
            9 => Status::Pending,
            12 => Status::Pending,
            13 => Status::Pending,
        }
    );
}

#[test]
fn failure_located_by_stack_frame() -> Result<()> {
    test_init();

    // test("adds", () => {             // 10
    //   const sum = add(1, 2);
    //   expect(sum).toBe(4);           // 12, column 5
    // });                              // 13
    let captures = CaptureSetBuilder::new()
        .add_match(&[("root_suite", 8, 0, 14), ("test", 10, 2, 13)])
        .build();
    let reconciler = Reconciler::new(FILE);
    let mut state = RunState::new(extract(&captures));
    let mut renderer = RecordingRenderer::new();

    let report = RunReport::parse(indoc! {r#"
        {
          "numFailedTests": 1,
          "numTotalTests": 1,
          "testResults": [{
            "name": "/proj/src/file.test.js",
            "message": "",
            "assertionResults": [{
              "status": "failed",
              "location": null,
              "failureMessages": [
                "Error: expect(received).toBe(expected)\n\nExpected: 4\nReceived: 3\n\n    at Object.<anonymous> (file.test.js:12:5)\n    at Promise.then.completed (node_modules/jest-circus/build/utils.js:298:28)"
              ]
            }]
          }]
        }
    "#})?;
    reconciler.apply_report(&mut state, &report, &mut renderer);
    reconciler.finish_cycle(&mut state, &mut renderer);

    let expected = vec![Diagnostic::new(
        Position::new(11, 4),
        "Error: expect(received).toBe(expected)\n\nExpected: 4\nReceived: 3",
    )];
    assert_eq!(state.diagnostics, expected);
    assert_eq!(renderer.diagnostics(Utf8Path::new(FILE)), expected.as_slice());
    assert_eq!(state.identifiers.get(10).map(|i| i.status), Some(Status::Failed));
    assert_eq!(state.identifiers.get(8).map(|i| i.status), Some(Status::Failed));
    Ok(())
}

#[test]
fn noisy_split_output() {
    test_init();

    let mut session = RunSession::new(FILE, "describe('A')", two_tests(), REPORT_MARKER);
    let mut renderer = RecordingRenderer::new();
    let report = passed_at(2);
    let (first, second) = report.split_at(report.len() / 2);

    let summaries: Vec<_> = ["Suites: 1 passed", first, second, "Test Suites: 1 passed"]
        .into_iter()
        .filter_map(|line| session.on_stdout_line(line, &mut renderer))
        .collect();

    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].matched, 1);
    assert_eq!(
        statuses(session.identifiers()),
        two_tests_statuses(Status::Passed, Status::Pending, Status::Pending)
    );
}

#[test]
fn table_variants_render_at_declaration() -> Result<()> {
    test_init();

    // describe("math", () => {                  // 0
    //   test.each`                              // 1
    //     a    | b    | expected
    //     ${1} | ${1} | ${2}                     // 3
    //     ${2} | ${1} | ${3}                     // 4
    //   `("add($a, $b)", ...);                  // 5
    // });                                       // 6
    let captures = CaptureSetBuilder::new()
        .add_match(&[("root_suite", 0, 0, 6), ("test.each", 1, 2, 5), ("inner_args", 3, 4, 3)])
        .add_match(&[("root_suite", 0, 0, 6), ("test.each", 1, 2, 5), ("inner_args", 4, 4, 4)])
        .build();
    let reconciler = Reconciler::new(FILE);
    let mut state = RunState::new(extract(&captures));
    let mut renderer = RecordingRenderer::new();

    reconciler.apply_report(&mut state, &RunReport::parse(&passed_at(4))?, &mut renderer);
    reconciler.apply_report(&mut state, &RunReport::parse(&passed_at(5))?, &mut renderer);

    assert_eq!(
        statuses(&state.identifiers),
        btreemap! {
            0 => Status::Passed,
            3 => Status::Passed,
            4 => Status::Passed,
        }
    );
    let mark = renderer
        .mark_for_line(Utf8Path::new(FILE), 3)
        .expect("variant was rendered");
    assert_eq!(mark.position, Position::new(1, 2));
    Ok(())
}
