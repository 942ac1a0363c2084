//! Progress reporting for archive commits.
//!
//! Rewriting an archive on close can take a while. A caller-supplied
//! [`ProgressReporter`] receives integer percentages in `0..=100` that never
//! decrease, the last one being 100. Callbacks run synchronously on the
//! committing thread; the session is borrowed by the commit, so a reporter
//! cannot reach back into it.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::progress::progress_fn;
//! use zipsession::{ArchiveSession, OpenMode};
//!
//! let mut session = ArchiveSession::open("archive.zip", OpenMode::Create)?;
//! session.add_buffer(b"hello.txt", b"Hello!".to_vec())?;
//! let mut progress = progress_fn(|percent| println!("{}%", percent));
//! session.close(Some(&mut progress))?;
//! # Ok::<(), zipsession::Error>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::mpsc;

/// Default minimum progress step, as a fraction of the total work.
pub const DEFAULT_STEP: f64 = 0.02;

/// Receives commit progress.
pub trait ProgressReporter: Send {
    /// Called with the completed percentage.
    fn on_progress(&mut self, percent: u8);

    /// Called before each entry is written to the new archive body.
    fn on_entry_start(&mut self, name: &[u8]) {
        let _ = name;
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for &mut P {
    fn on_progress(&mut self, percent: u8) {
        (**self).on_progress(percent)
    }

    fn on_entry_start(&mut self, name: &[u8]) {
        (**self).on_entry_start(name)
    }
}

impl<P: ProgressReporter + ?Sized> ProgressReporter for Box<P> {
    fn on_progress(&mut self, percent: u8) {
        (**self).on_progress(percent)
    }

    fn on_entry_start(&mut self, name: &[u8]) {
        (**self).on_entry_start(name)
    }
}

/// A progress reporter that does nothing (null object pattern).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn on_progress(&mut self, _percent: u8) {}
}

/// A progress reporter that calls a closure.
pub struct ClosureProgress<F> {
    callback: F,
}

impl<F> ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    /// Creates a progress reporter from a closure receiving the percentage.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    fn on_progress(&mut self, percent: u8) {
        (self.callback)(percent)
    }
}

/// Creates a closure-based progress reporter.
pub fn progress_fn<F>(f: F) -> ClosureProgress<F>
where
    F: FnMut(u8) + Send,
{
    ClosureProgress::new(f)
}

/// A thread-safe progress reporter using atomics.
///
/// Allows progress to be monitored from another thread while the commit
/// runs on a worker.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    percent: AtomicU8,
    updates: AtomicU64,
}

impl AtomicProgress {
    /// Creates a new atomic progress reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared atomic progress reporter.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns the last reported percentage.
    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }

    /// Returns how many times progress was reported.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::Relaxed)
    }

    fn record(&self, percent: u8) {
        self.percent.store(percent, Ordering::Relaxed);
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
}

impl ProgressReporter for AtomicProgress {
    fn on_progress(&mut self, percent: u8) {
        self.record(percent);
    }
}

/// Progress reporter for shared `Arc<AtomicProgress>`.
impl ProgressReporter for Arc<AtomicProgress> {
    fn on_progress(&mut self, percent: u8) {
        self.record(percent);
    }
}

/// Forwards progress over a channel.
///
/// Useful when the commit runs on a worker thread and the caller wants to
/// consume updates elsewhere. A disconnected receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    sender: mpsc::Sender<u8>,
}

impl ChannelProgress {
    /// Creates a reporter and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::Receiver<u8>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl ProgressReporter for ChannelProgress {
    fn on_progress(&mut self, percent: u8) {
        let _ = self.sender.send(percent);
    }
}

/// Converts work units into throttled percentage callbacks.
///
/// A callback fires when completion has advanced by at least `step` since the
/// last one, plus once at 0 % and once at 100 %.
pub struct ProgressTracker<'a> {
    sink: Option<&'a mut dyn ProgressReporter>,
    total: u64,
    done: u64,
    step: f64,
    last: Option<f64>,
}

impl<'a> ProgressTracker<'a> {
    /// Creates a tracker over `total` units of work.
    ///
    /// A non-positive or non-finite `step` falls back to [`DEFAULT_STEP`].
    pub fn new(sink: Option<&'a mut dyn ProgressReporter>, total: u64, step: f64) -> Self {
        let step = if step.is_finite() && step > 0.0 {
            step.min(1.0)
        } else {
            DEFAULT_STEP
        };
        Self {
            sink,
            total,
            done: 0,
            step,
            last: None,
        }
    }

    /// Reports 0 %.
    pub fn start(&mut self) {
        self.emit(0.0);
    }

    /// Notes the start of an entry.
    pub fn entry(&mut self, name: &[u8]) {
        if let Some(sink) = self.sink.as_mut() {
            sink.on_entry_start(name);
        }
    }

    /// Records `units` of completed work.
    pub fn advance(&mut self, units: u64) {
        self.done = self.done.saturating_add(units).min(self.total);
        let fraction = self.fraction();
        let due = match self.last {
            None => true,
            Some(last) => fraction - last >= self.step,
        };
        if due && fraction < 1.0 {
            self.emit(fraction);
        }
    }

    /// Reports 100 % unless already reported.
    pub fn finish(&mut self) {
        self.done = self.total;
        self.emit(1.0);
    }

    fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.done as f64 / self.total as f64
        }
    }

    fn emit(&mut self, fraction: f64) {
        if self.last.is_some_and(|last| fraction <= last && fraction < 1.0) {
            return;
        }
        if self.last == Some(1.0) {
            return;
        }
        self.last = Some(fraction);
        let percent = (fraction * 100.0).floor().clamp(0.0, 100.0) as u8;
        if let Some(sink) = self.sink.as_mut() {
            sink.on_progress(percent);
        }
    }
}

impl std::fmt::Debug for ProgressTracker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("has_sink", &self.sink.is_some())
            .field("total", &self.total)
            .field("done", &self.done)
            .field("step", &self.step)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(total: u64, step: f64, chunks: &[u64]) -> Vec<u8> {
        let mut seen = Vec::new();
        {
            let mut sink = progress_fn(|p| seen.push(p));
            let mut tracker = ProgressTracker::new(Some(&mut sink), total, step);
            tracker.start();
            for &c in chunks {
                tracker.advance(c);
            }
            tracker.finish();
        }
        seen
    }

    #[test]
    fn test_monotonic_bounded_and_ends_at_100() {
        let seen = collect(1000, DEFAULT_STEP, &[1; 1000]);
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|&p| p <= 100));
        // 2 % steps over 1000 units: at most 50 intermediate reports
        assert!(seen.len() <= 52, "{} reports", seen.len());
    }

    #[test]
    fn test_step_throttles() {
        let seen = collect(100, 0.25, &[10; 10]);
        assert_eq!(seen, vec![0, 30, 60, 90, 100]);
    }

    #[test]
    fn test_zero_total() {
        assert_eq!(collect(0, DEFAULT_STEP, &[]), vec![0, 100]);
    }

    #[test]
    fn test_finish_once() {
        let mut count = 0;
        {
            let mut sink = progress_fn(|p| {
                assert_eq!(p, 100);
                count += 1;
            });
            let mut tracker = ProgressTracker::new(Some(&mut sink), 10, DEFAULT_STEP);
            tracker.finish();
            tracker.finish();
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_atomic_and_channel() {
        let shared = AtomicProgress::shared();
        let mut reporter = Arc::clone(&shared);
        reporter.on_progress(42);
        assert_eq!(shared.percent(), 42);
        assert_eq!(shared.updates(), 1);

        let (mut tx, rx) = ChannelProgress::channel();
        tx.on_progress(7);
        tx.on_progress(100);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![7, 100]);
    }

    #[test]
    fn test_invalid_step_falls_back() {
        let tracker = ProgressTracker::new(None, 1, f64::NAN);
        assert_eq!(tracker.step, DEFAULT_STEP);
    }
}
