//! Progress reporting hooks for long-running tracking loops.

/// Receiver of progress updates from tracking and interpolation.
///
/// Calls are synchronous: the loop continues once the method returns. Both
/// methods default to no-ops so an implementation can pick either form.
///
/// # Example
///
/// ```
/// use vesseltrack::ProgressSink;
///
/// #[derive(Default)]
/// struct Collect(Vec<String>);
///
/// impl ProgressSink for Collect {
///     fn report(&mut self, message: &str) {
///         self.0.push(message.to_owned());
///     }
/// }
///
/// let mut sink = Collect::default();
/// sink.report("Centerline points found: 1");
/// sink.report_progress(1, 4);
/// assert_eq!(sink.0.len(), 1);
/// ```
pub trait ProgressSink {
    /// Free-form status message.
    fn report(&mut self, _message: &str) {}
    /// `completed` out of `total` work items done.
    fn report_progress(&mut self, _completed: usize, _total: usize) {}
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Forwards updates to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, message: &str) {
        tracing::debug!("{}", message.replace('\n', ", "));
    }

    fn report_progress(&mut self, completed: usize, total: usize) {
        tracing::debug!("progress {}/{}", completed, total);
    }
}
