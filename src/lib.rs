#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![forbid(unsafe_code)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Structured, classifiable error values for layered applications.
//!
//! ## Overview
//!
//! An [`Error`] names a logical fault with a stable id (`"db.timeout"`) and
//! carries what the layers above need to handle it: a [`Category`], an HTTP
//! status, a user-facing [`Payload`], "not found" and "retryable" flags, the
//! [`Cause`] it wraps, and the [`StackTrace`]s captured on the way up.
//!
//! Errors are immutable. Every `with_*` builder returns an updated value and
//! leaves other holders of the original untouched, so a predefined error can
//! be shared freely:
//!
//! ```
//! use faultline::{Category, Error, chain};
//!
//! const DATABASE: Category = Category::from_static("app.database");
//!
//! fn load_user() -> Result<(), Error> {
//!     let io = std::io::Error::other("conn refused");
//!     Err(Error::new("db.timeout")
//!         .with_category(DATABASE)
//!         .with_retryable()
//!         .with_cause(io))
//! }
//!
//! let err = load_user().unwrap_err();
//! assert!(chain::has_category(&err, DATABASE));
//! assert!(chain::is_retryable(&err));
//! assert_eq!(chain::root_cause(&err).to_string(), "conn refused");
//! ```
//!
//! ## Categories
//!
//! A category is either set explicitly with [`Error::with_category`] or
//! computed by a [`Classifier`], per error or process-wide. See the
//! [`classify`] module for the resolution order and for the built-in
//! classifiers.
//!
//! ## Chains
//!
//! The [`chain`] module inspects whole error trees: errors wrapping errors,
//! foreign errors with a [`source`](core::error::Error::source), and
//! [`Join`]s of several errors.
//!
//! ## Stacks
//!
//! [`Error::with_cause`], [`Error::with_stack`] and
//! [`Error::with_caller_stack`] capture the call stack, once per error. The
//! [`stack`] module covers capture, rendering and [cleaners](Cleaner).
//!
//! ## Features
//!
//! - `backtrace` (default): record frame addresses and resolve them to
//!   `file:line function` text. Implies `std`.
//! - `std`: use the standard library's `RwLock` for process-wide settings
//!   instead of a spin lock.
//! - `serde`: `Serialize` for [`ErrorReport`].

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod chain;
pub mod classify;
pub mod stack;

mod category;
mod cause;
mod error;
mod hook_lock;
mod payload;
mod report;

pub use self::{
    category::Category,
    cause::Cause,
    chain::Join,
    classify::{
        Classifier, Classify, clear_global_classifier, global_classifier, set_global_classifier,
    },
    error::{Error, ErrorOption},
    payload::Payload,
    report::{CauseSummary, ErrorReport, StackReport},
    stack::{
        Cleaner, Frame, MAX_STACK_FRAMES, SkipCrates, StackCleaner, StackTrace,
        clear_default_cleaner, default_cleaner, set_default_cleaner,
    },
};
#[cfg(feature = "backtrace")]
pub use self::stack::{ShortenPaths, StackConfig};

/// A [`Result`](core::result::Result) type alias where the error is
/// [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;
