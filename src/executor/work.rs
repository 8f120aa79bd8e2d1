//! Work items for the thread-affine executor

use std::collections::VecDeque;
use std::fmt;

/// Outcome of one step of a resumable sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend until the next drain
    Yield,
    /// Finished; drop the sequence
    Done,
}

/// Multi-step work that runs one step per drain on the owner thread
pub trait Sequence: Send {
    fn resume(&mut self) -> Step;
}

impl<F> Sequence for F
where
    F: FnMut() -> Step + Send,
{
    fn resume(&mut self) -> Step {
        self()
    }
}

/// A unit of deferred work captured at enqueue time
pub enum WorkItem {
    Once(Box<dyn FnOnce() + Send>),
    Sequence(Box<dyn Sequence>),
}

impl WorkItem {
    pub fn once(f: impl FnOnce() + Send + 'static) -> Self {
        WorkItem::Once(Box::new(f))
    }

    pub fn sequence(sequence: impl Sequence + 'static) -> Self {
        WorkItem::Sequence(Box::new(sequence))
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Once(_) => write!(f, "WorkItem::Once"),
            WorkItem::Sequence(_) => write!(f, "WorkItem::Sequence"),
        }
    }
}

/// Ordered stages, one per drain
///
/// ```rust,ignore
/// let stages = Stages::new()
///     .then(|| shelf.spawn_products())
///     .then(|| camera.frame_shelf());
/// executor.handle().enqueue_sequence(stages);
/// ```
#[derive(Default)]
pub struct Stages {
    stages: VecDeque<Box<dyn FnOnce() + Send>>,
}

impl Stages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, stage: impl FnOnce() + Send + 'static) -> Self {
        self.stages.push_back(Box::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl Sequence for Stages {
    fn resume(&mut self) -> Step {
        if let Some(stage) = self.stages.pop_front() {
            stage();
        }
        if self.stages.is_empty() {
            Step::Done
        } else {
            Step::Yield
        }
    }
}
