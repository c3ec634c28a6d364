//! Inspection of error chains.
//!
//! The functions here accept any `&(dyn Error + 'static)` and walk the
//! structure below it. Three shapes of node are understood:
//!
//! - a [`Join`], which wraps several errors;
//! - a native [`Error`], which wraps at most its [`cause`](Error::cause);
//! - any other error, which wraps at most its
//!   [`source`](core::error::Error::source).
//!
//! Nothing here fails. A missing match shows up as an empty `Vec`, `false`,
//! `None`, or the input itself.
//!
//! ```
//! use faultline::{Error, chain};
//!
//! let a = Error::new("validation.email").with_category("X");
//! let b = Error::new("validation.name").with_category("X");
//! let joined = chain::join([Some(a), Some(b)]).unwrap();
//!
//! let found = chain::filter_by_category(&joined, "X");
//! assert_eq!(found.len(), 2);
//! assert!(found.iter().all(|e| e.resolve() == "X"));
//! ```

mod iter;
mod join;

use alloc::{string::String, vec::Vec};
use core::{any::Any, error::Error as StdError, ops::ControlFlow};

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;

pub use self::{
    iter::Iter,
    join::{Join, join},
};
use crate::{Category, Cause, Error, StackTrace};

/// Iterates over `error` and every node below it, depth first.
pub fn iter<'a>(error: &'a (dyn StdError + 'static)) -> Iter<'a> {
    Iter::new(error)
}

/// Visits every native error below `error` once, depth first.
///
/// A native error reached a second time (through another join member) is
/// skipped together with its subtree.
fn walk_native<'a, B>(
    error: &'a (dyn StdError + 'static),
    mut visit: impl FnMut(&'a Error) -> ControlFlow<B>,
) -> Option<B> {
    let mut seen: HashSet<usize, FxBuildHasher> = HashSet::default();
    let mut stack = alloc::vec![error];
    while let Some(cur) = stack.pop() {
        if let Some(native) = cur.downcast_ref::<Error>() {
            if !seen.insert(native.identity()) {
                continue;
            }
            if let ControlFlow::Break(value) = visit(native) {
                return Some(value);
            }
        }
        stack.extend(iter::children(cur).rev());
    }
    None
}

/// Every distinct native error below `error` whose resolved category is
/// `category`, in depth-first order.
///
/// Errors are told apart by identity, so an error reachable through several
/// join members is returned once. The walk continues below every match.
#[must_use]
pub fn filter_by_category(
    error: &(dyn StdError + 'static),
    category: impl Into<Category>,
) -> Vec<Error> {
    let category = category.into();
    let mut found = Vec::new();
    walk_native(error, |native| {
        if native.resolve() == category {
            found.push(native.clone());
        }
        ControlFlow::<()>::Continue(())
    });
    found
}

/// Returns `true` if [`filter_by_category`] would return anything.
#[must_use]
pub fn has_category(error: &(dyn StdError + 'static), category: impl Into<Category>) -> bool {
    let category = category.into();
    walk_native(error, |native| {
        if native.resolve() == category {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .is_some()
}

/// The innermost error of the chain: the end of the cause/source links.
///
/// Returns `error` itself when it wraps nothing. A [`Join`] wraps no single
/// error, so it is its own root cause.
///
/// ```
/// use faultline::{Error, chain};
///
/// let err = Error::new("db.timeout").with_cause(std::io::Error::other("conn refused"));
/// assert_eq!(chain::root_cause(&err).to_string(), "conn refused");
/// ```
#[must_use]
pub fn root_cause<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut last = error;
    loop {
        let next = match last.downcast_ref::<Error>() {
            Some(native) => native.cause().map(Cause::as_error),
            None => last.source(),
        };
        match next {
            Some(next) => last = next,
            None => return last,
        }
    }
}

/// Returns `true` if any node below `error` is the same logical error as
/// `target`: a native error with the same id, or the very same object.
///
/// ```
/// use faultline::{Error, chain};
///
/// let not_found = Error::new("user.not_found");
/// let err = Error::new("request.failed").with_cause(not_found.clone().with_http_status(404));
/// assert!(chain::is(&err, &not_found));
/// ```
#[must_use]
pub fn is(error: &(dyn StdError + 'static), target: &(dyn StdError + 'static)) -> bool {
    let target_native = target.downcast_ref::<Error>();
    iter(error).any(|node| {
        core::ptr::addr_eq(node, target)
            || target_native.is_some_and(|target| {
                node.downcast_ref::<Error>()
                    .is_some_and(|native| native.id() == target.id())
            })
    })
}

/// The first native error below `error`, depth first.
#[must_use]
pub fn find_native<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a Error> {
    iter(error).find_map(|node| node.downcast_ref::<Error>())
}

/// The resolved category of the first native error, or
/// [`Category::UNKNOWN`].
#[must_use]
pub fn category(error: &(dyn StdError + 'static)) -> Category {
    find_native(error).map_or(Category::UNKNOWN, Error::resolve)
}

/// The HTTP status of the first native error, if it has one.
///
/// Like the other flag helpers this looks past foreign wrappers, so a status
/// set on an error wrapped by a foreign type is still found. Use
/// [`Error::http_status`] to read only the outermost error.
#[must_use]
pub fn http_status(error: &(dyn StdError + 'static)) -> Option<u16> {
    find_native(error).and_then(Error::http_status)
}

/// Returns `true` if the first native error is flagged retryable.
#[must_use]
pub fn is_retryable(error: &(dyn StdError + 'static)) -> bool {
    find_native(error).is_some_and(Error::is_retryable)
}

/// Returns `true` if the first native error is flagged "not found".
#[must_use]
pub fn is_not_found(error: &(dyn StdError + 'static)) -> bool {
    find_native(error).is_some_and(Error::is_not_found)
}

/// The payload of `error` as a `T`, if `error` itself is a native error
/// carrying a payload of that type.
///
/// ```
/// use std::collections::HashMap;
///
/// use faultline::{Error, chain};
///
/// let translations = HashMap::from([("en", "User not found")]);
/// let err = Error::new("user.not_found").with_payload(translations);
///
/// let found = chain::payload::<HashMap<&str, &str>>(&err);
/// assert_eq!(found.and_then(|m| m.get("en")), Some(&"User not found"));
/// assert_eq!(chain::payload_or(&err, "fallback"), "fallback");
/// ```
#[must_use]
pub fn payload<'a, T: Any>(error: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    error
        .downcast_ref::<Error>()
        .and_then(Error::payload)
        .and_then(|payload| payload.downcast_ref::<T>())
}

/// Like [`payload`], returning a clone of the payload or `fallback`.
#[must_use]
pub fn payload_or<T: Any + Clone>(error: &(dyn StdError + 'static), fallback: T) -> T {
    payload::<T>(error).cloned().unwrap_or(fallback)
}

/// Attaches a payload to any error.
///
/// When a native error is reachable, that error is returned with its payload
/// replaced. Otherwise `error` is wrapped in a new `"unknown.error"` error
/// carrying the payload.
///
/// ```
/// use faultline::chain;
///
/// let err = chain::replace_payload(std::io::Error::other("disk full"), "Try again later");
/// assert_eq!(err.id(), "unknown.error");
/// assert_eq!(err.payload().and_then(|p| p.as_str()), Some("Try again later"));
/// assert_eq!(chain::root_cause(&err).to_string(), "disk full");
/// ```
#[inline(never)]
#[track_caller]
#[must_use]
pub fn replace_payload<T>(error: impl Into<Cause>, payload: T) -> Error
where
    T: Any + core::fmt::Debug + Send + Sync,
{
    let error = error.into();
    match find_native(error.as_error()) {
        Some(native) => native.clone().with_payload(payload),
        None => Error::new("unknown.error")
            .with_payload(payload)
            .with_cause(error),
    }
}

/// Sets the category of the first native error reachable from `error` and
/// returns that error. Chains without a native error are returned unchanged.
#[must_use]
pub fn replace_category(error: impl Into<Cause>, category: impl Into<Category>) -> Cause {
    let error = error.into();
    match find_native(error.as_error()) {
        Some(native) => Cause::from(native.clone().with_category(category)),
        None => error,
    }
}

/// Renders the innermost stack of the first native error in the source chain
/// that holds any, or returns an empty string.
#[must_use]
pub fn root_stack_trace(error: &(dyn StdError + 'static)) -> String {
    source_chain(error)
        .filter_map(|node| node.downcast_ref::<Error>())
        .find_map(|native| {
            let stack = native.stacks().last()?;
            Some(stack.cleaned_lines(native.effective_stack_cleaner().as_ref()).join("\n"))
        })
        .unwrap_or_default()
}

/// Renders every stack in the source chain, outermost first, each under a
/// `--- stack (msg: <message>) ---` header.
///
/// A wrapping error carries its cause's stacks as well; each snapshot is
/// rendered once, at the outermost layer that holds it, rather than once per
/// layer. Within a layer, snapshots keep the order of
/// [`Error::stacks`](crate::Error::stacks), outermost first.
#[must_use]
pub fn full_stack_trace(error: &(dyn StdError + 'static)) -> String {
    let mut rendered: Vec<&StackTrace> = Vec::new();
    let mut out = String::new();
    for native in source_chain(error).filter_map(|node| node.downcast_ref::<Error>()) {
        let cleaner = native.effective_stack_cleaner();
        for stack in native.stacks() {
            if rendered.iter().any(|seen| seen.ptr_eq(stack)) {
                continue;
            }
            rendered.push(stack);
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("--- stack (msg: ");
            out.push_str(stack.message());
            out.push_str(") ---");
            for line in stack.cleaned_lines(cleaner.as_ref()) {
                out.push('\n');
                out.push_str(&line);
            }
        }
    }
    out
}

fn source_chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    core::iter::successors(Some(error), |node: &&'a (dyn StdError + 'static)| (*node).source())
}
