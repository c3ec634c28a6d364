//! Call-stack snapshots.
//!
//! A [`StackTrace`] is taken when an error is wrapped with a cause or when a
//! stack is requested explicitly. Capturing only records raw instruction
//! addresses (at most [`MAX_STACK_FRAMES`]) together with the
//! `#[track_caller]` location and the error message; turning addresses into
//! `file:line function` text happens later, when [`StackTrace::lines`] is
//! called.
//!
//! Rendered lines can be post-processed by a [`Cleaner`]. Cleaners run at
//! render time only and never touch the stored snapshot.
//!
//! ## Feature Requirement
//!
//! Frame addresses are only recorded when the `backtrace` feature is enabled
//! (it is by default). Without it a snapshot still carries the capture
//! location and message, and renders as a single location line.

mod cleaner;
#[cfg(feature = "backtrace")]
mod config;
mod frame;

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::{fmt, panic::Location};

use triomphe::Arc;

pub use self::{
    cleaner::{Cleaner, SkipCrates, StackCleaner, clear_default_cleaner, default_cleaner, set_default_cleaner},
    frame::Frame,
};
#[cfg(feature = "backtrace")]
pub use self::{cleaner::ShortenPaths, config::StackConfig};

/// The maximum number of frames recorded by a single capture.
pub const MAX_STACK_FRAMES: usize = 32;

/// Fixed-size frame buffer; capturing never allocates more than this.
#[derive(Clone, Copy)]
struct RawFrames {
    ips: [usize; MAX_STACK_FRAMES],
    len: usize,
}

impl RawFrames {
    const EMPTY: Self = Self {
        ips: [0; MAX_STACK_FRAMES],
        len: 0,
    };

    /// Returns `false` once the buffer is full.
    #[cfg(feature = "backtrace")]
    fn push(&mut self, ip: usize) -> bool {
        if self.len < MAX_STACK_FRAMES {
            self.ips[self.len] = ip;
            self.len += 1;
        }
        self.len < MAX_STACK_FRAMES
    }

    #[cfg(feature = "backtrace")]
    fn drop_front(mut self, count: usize) -> Self {
        let count = count.min(self.len);
        self.ips.copy_within(count..self.len, 0);
        self.len -= count;
        self
    }

    fn as_slice(&self) -> &[usize] {
        &self.ips[..self.len]
    }
}

struct Snapshot {
    frames: RawFrames,
    message: String,
    location: &'static Location<'static>,
}

/// One captured call stack.
///
/// Cloning is cheap: clones share the same immutable snapshot, which is how
/// a wrapping error carries the stacks of its cause.
#[derive(Clone)]
pub struct StackTrace(Arc<Snapshot>);

impl StackTrace {
    /// Captures the current thread's call stack.
    ///
    /// With `skip = 0` the topmost recorded frame is the function that called
    /// `capture`; every increment drops one more frame. The frames of
    /// `capture` itself and of the unwinder are never recorded.
    ///
    /// `message` is stored alongside the frames so a rendered trace can tell
    /// which error layer it belongs to.
    ///
    /// ```
    /// use faultline::StackTrace;
    ///
    /// let trace = StackTrace::capture("loading config", 0);
    /// assert_eq!(trace.message(), "loading config");
    /// assert!(trace.frame_addresses().len() <= faultline::MAX_STACK_FRAMES);
    /// ```
    #[inline(never)]
    #[track_caller]
    #[must_use]
    pub fn capture(message: impl Into<String>, skip: usize) -> Self {
        let location = Location::caller();
        let frames = capture_raw(skip);
        Self(Arc::new(Snapshot {
            frames,
            message: message.into(),
            location,
        }))
    }

    /// The message of the error that was active when the stack was captured.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0.message
    }

    /// The source location of the call that triggered the capture.
    #[must_use]
    pub fn location(&self) -> &'static Location<'static> {
        self.0.location
    }

    /// The raw instruction addresses, innermost frame first.
    #[must_use]
    pub fn frame_addresses(&self) -> &[usize] {
        self.0.frames.as_slice()
    }

    /// Resolves the snapshot into frames, innermost first.
    ///
    /// An address that maps to inlined code yields one frame per inlined
    /// function. Resolution has no side effects and returns the same result
    /// every time for the same process.
    #[must_use]
    pub fn frames(&self) -> Vec<Frame> {
        let addresses = self.frame_addresses();
        if addresses.is_empty() {
            return alloc::vec![Frame::from_location(self.0.location)];
        }
        addresses
            .iter()
            .flat_map(|&ip| frame::resolve(ip))
            .collect()
    }

    /// The topmost frame: the first resolved frame, or the capture location
    /// when no addresses were recorded.
    #[must_use]
    pub fn top_frame(&self) -> Frame {
        self.frame_addresses()
            .first()
            .and_then(|&ip| frame::resolve(ip).into_iter().next())
            .unwrap_or_else(|| Frame::from_location(self.0.location))
    }

    /// Renders every frame as a `file:line function` line.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.frames().iter().map(ToString::to_string).collect()
    }

    /// Renders the frames and passes them through `cleaner`, if any.
    #[must_use]
    pub fn cleaned_lines(&self, cleaner: Option<&Cleaner>) -> Vec<String> {
        let lines = self.lines();
        match cleaner {
            Some(cleaner) => cleaner.clean(lines),
            None => lines,
        }
    }

    /// Returns `true` if both values share the same snapshot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackTrace")
            .field("message", &self.0.message)
            .field("location", &self.0.location)
            .field("frames", &self.0.frames.len)
            .finish()
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(feature = "backtrace")]
#[inline(never)]
fn capture_raw(skip: usize) -> RawFrames {
    if StackConfig::get().capture_disabled {
        return RawFrames::EMPTY;
    }

    // The unwinder reports its own frames first. Everything up to and
    // including this function is dropped by locating this function's frame.
    let anchor: fn(usize) -> RawFrames = capture_raw;
    let anchor = anchor as usize;

    let mut frames = RawFrames::EMPTY;
    let mut unanchored = RawFrames::EMPTY;
    let mut anchored = false;
    // `StackTrace::capture` sits between this function and its caller.
    let mut pending_skip = skip.saturating_add(1);

    backtrace::trace(|frame| {
        if !anchored {
            if frame.symbol_address() as usize == anchor {
                anchored = true;
                return true;
            }
            return unanchored.push(frame.ip() as usize);
        }
        if pending_skip > 0 {
            pending_skip -= 1;
            return true;
        }
        frames.push(frame.ip() as usize)
    });

    if anchored {
        frames
    } else {
        unanchored.drop_front(skip)
    }
}

#[cfg(not(feature = "backtrace"))]
#[inline(always)]
fn capture_raw(_skip: usize) -> RawFrames {
    RawFrames::EMPTY
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(StackTrace: Send, Sync, Clone);

    #[test]
    fn test_capture_records_location_and_message() {
        let trace = StackTrace::capture("boom", 0);
        assert_eq!(trace.message(), "boom");
        assert_eq!(trace.location().file(), file!());
        assert!(trace.frame_addresses().len() <= MAX_STACK_FRAMES);
    }

    #[test]
    fn test_clones_share_snapshot() {
        let trace = StackTrace::capture("boom", 0);
        let clone = trace.clone();
        assert!(trace.ptr_eq(&clone));
        assert!(!trace.ptr_eq(&StackTrace::capture("boom", 0)));
    }

    #[test]
    fn test_rendering_is_repeatable() {
        let trace = StackTrace::capture("boom", 0);
        assert_eq!(trace.lines(), trace.lines());
        assert!(!trace.lines().is_empty());
    }

    #[cfg(feature = "backtrace")]
    #[test]
    fn test_drop_front_is_bounded() {
        let mut frames = RawFrames::EMPTY;
        for ip in 1..=4 {
            frames.push(ip);
        }
        assert_eq!(frames.drop_front(1).as_slice(), &[2, 3, 4]);
        assert_eq!(frames.drop_front(10).as_slice(), &[] as &[usize]);
    }
}
