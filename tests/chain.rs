use faultline::{Category, Cause, Error, Join, chain};

#[derive(Debug, thiserror::Error)]
#[error("pool exhausted")]
struct PoolExhausted;

#[derive(Debug, thiserror::Error)]
#[error("query failed")]
struct QueryFailed {
    #[source]
    source: Error,
}

fn validation(field: &'static str) -> Error {
    Error::new(format!("validation.{field}")).with_category("app.validation")
}

#[test]
fn joined_members_are_all_found() {
    let joined = chain::join([
        Some(validation("email")),
        None,
        Some(validation("name")),
        Some(Error::new("db.timeout").with_category("app.database")),
    ])
    .unwrap();

    let found = chain::filter_by_category(&joined, "app.validation");
    let ids: Vec<_> = found.iter().map(Error::id).collect();
    assert_eq!(ids, ["validation.email", "validation.name"]);
    assert!(chain::has_category(&joined, "app.database"));
    assert!(!chain::has_category(&joined, "app.auth"));
}

#[test]
fn join_of_nothing_is_none() {
    assert!(chain::join(Vec::<Option<Error>>::new()).is_none());
    assert!(chain::join([None::<Error>]).is_none());
}

#[test]
fn filter_descends_below_matches_and_foreign_errors() {
    let root = Error::new("db.timeout").with_category("app.database");
    let foreign = QueryFailed { source: root.clone() };
    let outer = Error::new("repo.load")
        .with_category("app.database")
        .with_cause(foreign);

    let found = chain::filter_by_category(&outer, "app.database");
    assert_eq!(found.len(), 2);
    assert!(found[0].ptr_eq(&outer));
    assert!(found[1].ptr_eq(&root));
}

#[test]
fn nested_joins_are_walked() {
    let inner = chain::join([Some(validation("zip")), Some(validation("city"))]).unwrap();
    let outer = chain::join([
        Some(Cause::new(inner)),
        Some(Cause::from(validation("email"))),
    ])
    .unwrap();

    assert_eq!(chain::filter_by_category(&outer, "app.validation").len(), 3);
    assert_eq!(outer.to_string(), "validation.zip; validation.city; validation.email");
}

#[test]
fn is_finds_targets_through_joins() {
    let missing = Error::new("user.not_found");
    let joined = chain::join([
        Some(Error::new("audit.failed")),
        Some(Error::new("lookup.failed").with_cause(missing.clone().with_http_status(404))),
    ])
    .unwrap();

    assert!(chain::is(&joined, &missing));
    assert!(!chain::is(&joined, &Error::new("user.banned")));

    let foreign = Cause::new(PoolExhausted);
    let wrapped = Error::new("db.failed").with_cause(foreign.clone());
    assert!(chain::is(&wrapped, foreign.as_error()));
    assert!(!chain::is(&wrapped, &PoolExhausted));
}

#[test]
fn iteration_is_depth_first() {
    let joined = chain::join([
        Some(Error::new("a").with_cause(Error::new("a.inner"))),
        Some(Error::new("b")),
    ])
    .unwrap();

    let seen: Vec<_> = chain::iter(&joined).map(ToString::to_string).collect();
    assert_eq!(seen, ["a; b", "a", "a.inner", "b"]);
}

#[test]
fn root_cause_of_a_join_is_the_join() {
    let joined = chain::join([Some(Error::new("a"))]).unwrap();
    let root = chain::root_cause(&joined);
    assert!(root.downcast_ref::<Join>().is_some());
}

#[test]
fn flags_come_from_the_first_native_error() {
    let inner = Error::not_found("user.not_found").with_http_status(404);
    let foreign = QueryFailed { source: inner };
    let outer = Error::new("svc.failed").with_cause(foreign);

    // The outer error is the first native node and carries no status.
    assert_eq!(chain::http_status(&outer), None);
    assert!(!chain::is_not_found(&outer));

    let bare = QueryFailed {
        source: Error::retryable("db.busy").with_http_status(503),
    };
    assert_eq!(chain::http_status(&bare), Some(503));
    assert!(chain::is_retryable(&bare));
    assert_eq!(chain::category(&PoolExhausted), Category::UNKNOWN);
}

#[test]
fn replace_payload_on_native_and_foreign_chains() {
    let native = Error::new("user.not_found").with_payload("old");
    let replaced = chain::replace_payload(native.clone(), "new");
    assert_eq!(replaced.id(), "user.not_found");
    assert_eq!(chain::payload::<&str>(&replaced), Some(&"new"));
    assert_eq!(chain::payload::<&str>(&native), Some(&"old"));

    let wrapped = chain::replace_payload(PoolExhausted, 42_u32);
    assert_eq!(wrapped.id(), "unknown.error");
    assert_eq!(chain::payload_or(&wrapped, 0_u32), 42);
    assert_eq!(wrapped.stacks().len(), 1);
    assert_eq!(chain::root_cause(&wrapped).to_string(), "pool exhausted");
}

#[test]
fn replace_category_on_native_and_foreign_chains() {
    let replaced = chain::replace_category(Error::new("db.timeout"), "app.database");
    assert_eq!(chain::category(replaced.as_error()), "app.database");

    let untouched = Cause::new(PoolExhausted);
    let same = chain::replace_category(untouched.clone(), "app.database");
    assert!(same.ptr_eq(&untouched));
    assert!(same.native().is_none());
}

#[test]
fn stack_traces_are_empty_without_stacks() {
    let err = Error::new("plain");
    assert_eq!(chain::root_stack_trace(&err), "");
    assert_eq!(chain::full_stack_trace(&err), "");
    assert_eq!(chain::root_stack_trace(&PoolExhausted), "");
}

#[test]
fn root_stack_trace_uses_the_innermost_snapshot() {
    let inner = Error::new("db.timeout").with_cause(PoolExhausted);
    let outer = Error::new("api.failed").with_cause(inner.clone());

    let expected = inner.stacks()[0]
        .cleaned_lines(inner.effective_stack_cleaner().as_ref())
        .join("\n");
    assert_eq!(chain::root_stack_trace(&outer), expected);
}
