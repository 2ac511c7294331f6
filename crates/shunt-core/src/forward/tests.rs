//! Tests for port forward specification parsing.

use super::*;

fn specs(entries: &[&str]) -> Vec<String> {
    entries.iter().map(|s| s.to_string()).collect()
}

fn rendered(set: &ForwardSet) -> Vec<String> {
    set.iter().map(|i| i.to_string()).collect()
}

// =============================================================================
// Well-formed entries
// =============================================================================

#[test]
fn parse_local_with_bound_host() {
    let set = ForwardSet::parse(&[], &specs(&["foo:123:bar:456"])).unwrap();
    let intent = set.iter().next().unwrap();

    assert_eq!(intent.direction(), ForwardDirection::Local);
    assert_eq!(intent.bound_host(), "foo");
    assert_eq!(intent.bound_port(), 123);
    assert_eq!(intent.target_host(), "bar");
    assert_eq!(intent.target_port(), 456);
}

#[test]
fn parse_local_without_bound_host_defaults_to_empty() {
    let set = ForwardSet::parse(&[], &specs(&["123:127.0.0.1:456"])).unwrap();
    let intent = set.iter().next().unwrap();

    assert_eq!(intent.bound_host(), "");
    assert_eq!(intent.bound_port(), 123);
    assert_eq!(intent.target_host(), "127.0.0.1");
    assert_eq!(intent.target_port(), 456);
}

#[test]
fn parse_local_forwards() {
    let set = ForwardSet::parse(
        &[],
        &specs(&["123:127.0.0.1:456", "123:foo:456", "foo:123:bar:456"]),
    )
    .unwrap();

    assert_eq!(
        rendered(&set),
        vec![
            "Local 123 => 127.0.0.1:456",
            "Local 123 => foo:456",
            "Local foo:123 => bar:456",
        ]
    );
}

#[test]
fn parse_remote_forwards() {
    let set = ForwardSet::parse(
        &specs(&["123:127.0.0.1:456", "123:foo:456", "foo:123:bar:456"]),
        &[],
    )
    .unwrap();

    assert_eq!(
        rendered(&set),
        vec![
            "Remote 123 => 127.0.0.1:456",
            "Remote 123 => foo:456",
            "Remote foo:123 => bar:456",
        ]
    );
}

#[test]
fn remote_entries_precede_local_entries_in_input_order() {
    let set = ForwardSet::parse(&specs(&["1:a:2", "3:b:4"]), &specs(&["5:c:6"])).unwrap();

    assert_eq!(
        rendered(&set),
        vec!["Remote 1 => a:2", "Remote 3 => b:4", "Local 5 => c:6"]
    );
}

#[test]
fn parse_five_digit_ports() {
    // The grammar accepts up to five digits; the 16-bit range is enforced
    // only when a live forward is built.
    let set = ForwardSet::parse(&[], &specs(&["99999:host:99999"])).unwrap();
    let intent = set.iter().next().unwrap();
    assert_eq!(intent.bound_port(), 99999);
    assert_eq!(intent.target_port(), 99999);
}

#[test]
fn empty_input_yields_empty_set() {
    let set = ForwardSet::parse(&[], &[]).unwrap();
    assert!(set.is_empty());
    assert_eq!(set.len(), 0);
}

// =============================================================================
// Malformed entries
// =============================================================================

#[test]
fn negative_target_port_fails_with_quoted_entry() {
    let errors = ForwardSet::parse(&[], &specs(&["123:foo.com:-123"])).unwrap_err();
    assert_eq!(errors, vec!["unable to parse port forward '123:foo.com:-123'"]);
}

#[test]
fn non_numeric_bound_port_fails_with_quoted_entry() {
    let errors = ForwardSet::parse(&[], &specs(&["a:foo.com:123"])).unwrap_err();
    assert_eq!(errors, vec!["unable to parse port forward 'a:foo.com:123'"]);
}

#[test]
fn six_digit_port_fails() {
    assert!(ForwardSet::parse(&[], &specs(&["123456:host:80"])).is_err());
    assert!(ForwardSet::parse(&[], &specs(&["80:host:123456"])).is_err());
}

#[test]
fn structurally_invalid_entries_fail() {
    for entry in [
        "",
        "80",
        "80:host",
        "a:80:host:80:extra",
        ":80:host:80",
        "80::80",
        "80:host:",
        "bind:port:host:port",
    ] {
        let errors = ForwardSet::parse(&[], &specs(&[entry])).unwrap_err();
        assert_eq!(
            errors,
            vec![format!("unable to parse port forward '{entry}'")],
            "entry {entry:?} should fail"
        );
    }
}

#[test]
fn one_message_per_malformed_entry() {
    let errors = ForwardSet::parse(
        &specs(&["bad", "1:ok:2"]),
        &specs(&["3:ok:4", "also:bad:x:y:z"]),
    )
    .unwrap_err();

    assert_eq!(
        errors,
        vec![
            "unable to parse port forward 'bad'",
            "unable to parse port forward 'also:bad:x:y:z'",
        ]
    );
}

#[test]
fn any_failure_rejects_the_whole_set() {
    // No partial set: the valid entries are not surfaced.
    let result = ForwardSet::parse(&specs(&["1:a:2"]), &specs(&["nope"]));
    assert!(result.is_err());
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn parsing_is_idempotent() {
    let remote = specs(&["1:a:2", "3:b:4"]);
    let local = specs(&["foo:5:c:6"]);

    let first = ForwardSet::parse(&remote, &local).unwrap();
    let second = ForwardSet::parse(&remote, &local).unwrap();
    assert_eq!(first, second);
}
