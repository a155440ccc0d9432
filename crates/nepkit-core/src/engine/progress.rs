/// Events emitted while a batch of frames is processed.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    /// Processing of `total` frames begins.
    FramesStart { total: usize },
    /// Frame `index` is done; frames may finish out of order.
    FrameDone { index: usize, flagged: bool },

    /// Final tally of a phase: `flagged` of `checked` frames need attention.
    Summary { checked: usize, flagged: usize },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards [`Progress`] events to an optional callback, from any rayon worker.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    /// A reporter that discards every event.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Brackets `body` with [`Progress::PhaseStart`] and [`Progress::PhaseFinish`].
    pub fn phase<T>(&self, name: &'static str, body: impl FnOnce() -> T) -> T {
        self.report(Progress::PhaseStart { name });
        let result = body();
        self.report(Progress::PhaseFinish);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn phase_brackets_the_events_of_its_body() {
        let events = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            events.lock().unwrap().push(event);
        }));

        let value = reporter.phase("Screening", || {
            reporter.report(Progress::FramesStart { total: 1 });
            reporter.report(Progress::FrameDone {
                index: 0,
                flagged: true,
            });
            reporter.report(Progress::Summary {
                checked: 1,
                flagged: 1,
            });
            7
        });
        drop(reporter);

        assert_eq!(value, 7);
        assert_eq!(
            events.into_inner().unwrap(),
            vec![
                Progress::PhaseStart { name: "Screening" },
                Progress::FramesStart { total: 1 },
                Progress::FrameDone {
                    index: 0,
                    flagged: true
                },
                Progress::Summary {
                    checked: 1,
                    flagged: 1
                },
                Progress::PhaseFinish,
            ]
        );
    }

    #[test]
    fn silent_reporter_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::FramesStart { total: 3 });
        assert_eq!(reporter.phase("Idle", || 1), 1);
    }
}
