//! Result reduction for request buses
//!
//! Every subscriber registered under a name runs on each raise; a reducer
//! decides which of their return values reach the result handler. The
//! default, `Last`, keeps only the value of the most recently registered
//! subscriber and discards the rest.
//!
//! The async request bus hands the reducer per-responder outcomes instead of
//! plain values, since a responder's future may panic:
//!
//! - `Last` only waits for the last-registered responder. Earlier responders
//!   run for their side effects; their failures are logged and dropped.
//! - `Collect` waits for every responder and keeps the values of the ones
//!   that completed. It reports a failure only when none of them did.

use crate::error::DispatchError;

/// Outcome of one async responder
pub type Outcome<O> = Result<O, DispatchError>;

/// Combines the return values of one subscriber chain
pub trait Reduce<O>: Send + Sync + 'static {
    type Output;

    /// Only the last-registered responder's outcome is awaited and reduced
    const LAST_ONLY: bool = false;

    /// `results` holds one value per subscriber, in registration order.
    /// Returning `None` suppresses the result handler.
    fn reduce(results: Vec<O>) -> Option<Self::Output>;

    /// Reduce async outcomes, in registration order
    ///
    /// Failed outcomes are skipped. When every outcome failed, the last
    /// failure is returned.
    fn reduce_outcomes(outcomes: Vec<Outcome<O>>) -> Option<Outcome<Self::Output>> {
        let mut values = Vec::with_capacity(outcomes.len());
        let mut last_failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(value) => values.push(value),
                Err(e) => last_failure = Some(e),
            }
        }

        if values.is_empty() {
            return last_failure.map(Err);
        }
        Self::reduce(values).map(Ok)
    }
}

/// Last-writer-wins: the last-registered subscriber's value
#[derive(Debug, Clone, Copy, Default)]
pub struct Last;

impl<O> Reduce<O> for Last {
    type Output = O;

    const LAST_ONLY: bool = true;

    fn reduce(results: Vec<O>) -> Option<O> {
        results.into_iter().last()
    }

    fn reduce_outcomes(outcomes: Vec<Outcome<O>>) -> Option<Outcome<O>> {
        outcomes.into_iter().last()
    }
}

/// Every subscriber's value, in registration order
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect;

impl<O> Reduce<O> for Collect {
    type Output = Vec<O>;

    fn reduce(results: Vec<O>) -> Option<Vec<O>> {
        if results.is_empty() {
            None
        } else {
            Some(results)
        }
    }
}
