//! Scenario runner tests
//!
//! Runs whole scenarios against the scripted browser in `support` and checks
//! guard scoping, navigation, console scanning and failure reporting.

mod support;

use ssc_checker::scenario::Predicate;
use ssc_checker::{
    placeholder, Assertion, CheckError, Checker, CheckerConfig, Guard, Locator, Placeholders, Scenario, Step,
};
use support::{FakeBrowser, Node, OnClick, Page};
use test_case::test_case;

const HOME: &str = "http://127.0.0.1:8080/";
const FOO: &str = "http://127.0.0.1:8080/foo.html";
const HOME_HTML: &str = "<html><head><title>Home</title></head><body><h3>Home 001</h3></body></html>";

fn config() -> CheckerConfig {
    CheckerConfig {
        timeout_ms: 150,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

fn site() -> FakeBrowser {
    FakeBrowser::new()
        .page(
            HOME,
            Page::new(HOME_HTML)
                .node(Node::new("h3").text("Home 001"))
                .node(Node::new("a").text("Foo").on_click(OnClick::Navigate(FOO.to_string()))),
        )
        .page(FOO, Page::new("<html><body><h3>Foo</h3></body></html>").node(Node::new("h3").text("Foo")))
}

fn checker(browser: FakeBrowser) -> Checker<FakeBrowser> {
    Checker::with_config(browser, config())
}

fn scenario(yaml: &str) -> Scenario {
    Scenario::from_yaml(yaml).unwrap()
}

#[tokio::test]
async fn false_guard_skips_only_its_own_sequence() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- scenario:
    - execif: [[{bool: false}]]
    - checks:
        - exists: {css: .missing}
"#,
    );

    let summary = checker(site()).run(&steps).await.unwrap();
    // the guard step itself ran; only the check after it was skipped
    assert_eq!(summary.steps, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.navigations, 1);
}

#[tokio::test]
async fn true_guard_lets_the_sequence_fail() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- scenario:
    - execif: [[{bool: true}]]
    - checks:
        - exists: {css: .missing}
"#,
    );

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "NoSuchElementError");
}

#[tokio::test]
async fn nested_guard_does_not_reach_outer_siblings() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- scenario:
    - execif: [[{bool: false}]]
- checks:
    - exists: {css: .missing}
"#,
    );

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "NoSuchElementError");
}

#[tokio::test]
async fn false_guard_skips_its_own_step() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- execif: [[{bool: false}]]
  url: http://127.0.0.1:8080/foo.html
"#,
    );

    let checker = checker(site());
    let summary = checker.run(&steps).await.unwrap();
    assert_eq!(summary.navigations, 1);
    assert_eq!(checker.driver().visits(), vec![HOME.to_string()]);
}

#[test_case(vec![vec![false, true]], true ; "or of false and true")]
#[test_case(vec![vec![false, false]], false ; "or of false and false")]
#[test_case(vec![vec![true], vec![false]], false ; "and of true and false")]
#[test_case(vec![vec![true], vec![true]], true ; "and of true and true")]
#[test_case(vec![vec![false, true], vec![true, false]], true ; "and of ors")]
#[test_case(vec![vec![]], false ; "empty group")]
#[tokio::test]
async fn guard_is_an_and_of_ors(groups: Vec<Vec<bool>>, holds: bool) {
    let guard = Guard(
        groups
            .into_iter()
            .map(|group| group.into_iter().map(|b| Predicate::Bool(b.into())).collect())
            .collect(),
    );
    let steps = vec![
        Step::visit(HOME),
        Step::guard(guard),
        Step::checks(vec![Assertion::exists(Locator::css(".missing"))]),
    ];

    // the failing check only runs when the guard holds
    let result = checker(site()).run(&steps).await;
    assert_eq!(result.is_err(), holds);
}

#[tokio::test]
async fn guard_checks_the_page() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- execif:
    - - exists: {css: .missing}
        timeout: 0
      - equals: {css: h3}
        value: Home 001
    - - notExists: {css: .missing}
- checks:
    - exists: {css: .missing}
"#,
    );

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "NoSuchElementError");
}

#[tokio::test]
async fn guard_mismatch_is_false_not_an_error() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- execif:
    - - equals: {css: h3}
        value: Somewhere else
- checks:
    - exists: {css: .missing}
"#,
    );

    let summary = checker(site()).run(&steps).await.unwrap();
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn guard_configuration_errors_still_propagate() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- execif:
    - - satisfies: {css: h3}
        predicate: unregistered
"#,
    );

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn nested_placeholders_are_resolved_when_reached() {
    let gated = r#"
- url: http://127.0.0.1:8080/
- execif: [[{bool: false}]]
- url: {placeholder: prod_only}
"#;
    let flat = scenario(gated);
    let nested = Scenario::new(vec![Step::nested(flat.to_vec())]);

    let summary = checker(site()).run(&flat).await.unwrap();
    assert_eq!(summary.skipped, 1);

    // the same list one level down behaves the same
    let summary = checker(site()).run(&nested).await.unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.navigations, 1);
}

#[tokio::test]
async fn nested_placeholder_errors_surface_when_reached() {
    let steps = vec![
        Step::visit(HOME),
        Step::nested(vec![Step::visit(placeholder("prod_only"))]),
    ];

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "MissingPlaceholderError");
    match err {
        CheckError::Reported(failure) => assert!(failure.step_json.contains("prod_only")),
        other => panic!("expected a reported failure, got {:?}", other),
    }
}

#[tokio::test]
async fn link_follows_the_clicked_element() {
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- link: {linkText: Foo}
  checks:
    - equals: url
      value: http://127.0.0.1:8080/foo.html
    - equals: {css: h3}
      value: Foo
"#,
    );

    let summary = checker(site()).run(&steps).await.unwrap();
    assert_eq!(summary.navigations, 2);
}

#[tokio::test]
async fn base_url_prefixes_relative_urls() {
    let config = CheckerConfig {
        base_url: Some("http://127.0.0.1:8080".to_string()),
        ..config()
    };
    let checker = Checker::with_config(site(), config);

    checker.run(&[Step::visit("/foo.html")]).await.unwrap();
    assert_eq!(checker.driver().visits(), vec![FOO.to_string()]);
}

#[tokio::test]
async fn script_error_fails_a_passing_page() {
    let browser = FakeBrowser::new().page(
        HOME,
        Page::new(HOME_HTML)
            .node(Node::new("h3").text("Home 001"))
            .log("http://127.0.0.1:8080/ 12:5 Uncaught ReferenceError: foo is not defined"),
    );
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
  checks:
    - equals: {css: h3}
      value: Home 001
"#,
    );

    let err = checker(browser).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "JavascriptError");
    assert!(err.to_string().contains("ReferenceError: foo is not defined"));
}

#[tokio::test]
async fn script_error_after_navigation_fails_the_step() {
    let browser = FakeBrowser::new().page(
        HOME,
        Page::new(HOME_HTML)
            .node(Node::new("h3").text("Home 001"))
            .node(
                Node::new("button")
                    .id("broken")
                    .on_click(OnClick::Log("http://127.0.0.1:8080/ 3:9 Uncaught TypeError: x is undefined".to_string())),
            ),
    );
    let steps = scenario(
        r#"
- url: http://127.0.0.1:8080/
- actions:
    - click: {id: broken}
  checks:
    - equals: {css: h3}
      value: Home 001
"#,
    );

    let err = checker(browser).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "JavascriptError");
    assert!(err.to_string().contains("TypeError: x is undefined"));
}

#[tokio::test]
async fn http_error_for_current_page_fails() {
    let browser = FakeBrowser::new().page(
        HOME,
        Page::new(HOME_HTML).log(
            "http://127.0.0.1:8080/ - Failed to load resource: the server responded with a status of 404 (Not Found)",
        ),
    );

    let err = checker(browser).run(&[Step::visit(HOME)]).await.unwrap_err();
    assert_eq!(err.name(), "StatusCodeError");
    assert!(matches!(err.root(), CheckError::StatusCode { status: 404, .. }));
}

#[tokio::test]
async fn logs_before_navigation_are_ignored() {
    let browser = FakeBrowser::new()
        .page(HOME, Page::new(HOME_HTML).log("http://127.0.0.1:8080/foo.html - status of 500"))
        .page(FOO, Page::new("<html></html>"));

    // the entry names the next page but is logged before it is loaded
    let steps = vec![Step::visit(HOME), Step::visit(FOO)];
    checker(browser).run(&steps).await.unwrap();
}

#[tokio::test]
async fn failures_carry_page_context() {
    let steps = vec![
        Step::visit(HOME),
        Step::checks(vec![Assertion::exists(Locator::css(".missing"))]),
    ];

    let err = checker(site()).run(&steps).await.unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with(HOME), "{}", message);
    assert!(message.contains(r#"JSON: {"checks":[{"exists":{"css":".missing"}}]}"#), "{}", message);
    assert!(message.contains("Message: exists: waiting for element to be located By(css selector, .missing)"));
    assert!(message.ends_with(HOME_HTML));
}

#[tokio::test]
async fn debug_mode_keeps_the_raw_error() {
    let steps = vec![
        Step::visit(HOME),
        Step::checks(vec![Assertion::exists(Locator::css(".missing"))]),
    ];

    let err = checker(site()).debug(true).run(&steps).await.unwrap_err();
    assert!(matches!(err, CheckError::NoSuchElement { .. }));
    assert!(!err.to_string().contains("<html>"));
}

#[tokio::test]
async fn nested_failures_are_reported_once() {
    let steps = vec![
        Step::visit(HOME),
        Step::nested(vec![Step::checks(vec![Assertion::exists(Locator::css(".missing"))])]),
    ];

    match checker(site()).run(&steps).await.unwrap_err() {
        CheckError::Reported(failure) => {
            assert!(matches!(failure.source, CheckError::NoSuchElement { .. }));
            // the innermost step is the one rendered, not its parent
            assert!(!failure.step_json.contains("scenario"));
        }
        other => panic!("expected a reported failure, got {:?}", other),
    }
}

#[tokio::test]
async fn placeholders_are_resolved_per_step() {
    let steps = vec![
        Step::visit(placeholder("host").append("/")),
        Step::checks(vec![scenario_check()]),
    ];
    let placeholders = Placeholders::new()
        .with("host", "http://127.0.0.1:8080")
        .with("heading", "Home")
        .with("title", Locator::css("h3"));

    let checker = checker(site()).placeholders(placeholders);
    checker.run(&steps).await.unwrap();

    // the authored tree still holds the references
    assert!(steps[0].url.as_ref().unwrap().is_placeholder());
}

fn scenario_check() -> Assertion {
    let yaml = r#"
equals: {placeholder: title}
value: {placeholder: heading, append: [" 001"]}
"#;
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test]
async fn missing_placeholder_is_reported() {
    let steps = vec![Step::visit(placeholder("nowhere"))];

    let err = checker(site()).run(&steps).await.unwrap_err();
    assert_eq!(err.name(), "MissingPlaceholderError");
    assert!(err.is_configuration());
}

#[tokio::test]
async fn scenarios_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("01-home.yaml"),
        "- url: http://127.0.0.1:8080/\n- checks:\n    - likes: html\n      value: <title>Home</title>\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("02-foo.json"),
        r#"[{"url": "http://127.0.0.1:8080/foo.html", "checks": [{"equals": {"css": "h3"}, "value": "Foo"}]}]"#,
    )
    .unwrap();

    let checker = checker(site());
    for (_, scenario) in Scenario::load_all(dir.path()).unwrap() {
        checker.run(&scenario).await.unwrap();
    }
    assert_eq!(checker.driver().visits(), vec![HOME.to_string(), FOO.to_string()]);
}
