// The headless wrapper: drains the scheduler as fast as the host allows,
// with an optional cooperative yield for hosts (batch runners, test
// harnesses) where starving the calling thread is undesirable.
//
// Unlike the real-time wrapper this never crosses a thread boundary —
// there is no pacing to isolate from a render/input loop, just a tight
// drain.

use std::cell::Cell;

use tracing::{debug, warn};

use crate::error::WrapperError;
use crate::event::EventScheduler;
use crate::types::Tick;

/// Optional chunking for [`HeadlessWrapper::run_to`].
pub struct RunToOptions<'a, C> {
    /// Invoke `yield_handler` every this many ticks. Must be > 0.
    pub yield_every_ticks: u32,
    pub yield_handler: &'a mut dyn FnMut(&mut C, &mut EventScheduler<C>),
}

/// Drives `drain_to_end` (or a bounded `run_to`) in a tight loop, guarding
/// against re-entrant `run` calls.
///
/// The running flag lives behind a `Cell`, not a plain `bool` behind
/// `&mut self`, so a callback that reaches back into the same wrapper
/// (through an `Rc` or similar) observes the guard instead of tripping a
/// `RefCell` borrow panic first.
pub struct HeadlessWrapper {
    running: Cell<bool>,
}

impl Default for HeadlessWrapper {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessWrapper {
    pub fn new() -> Self {
        Self { running: Cell::new(false) }
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Drain the scheduler to completion. Fails with `AlreadyRunning` if
    /// called while a previous `run`/`run_to` on this wrapper is still in
    /// flight (re-entrant call from inside a callback).
    pub fn run<C>(&self, context: &mut C, scheduler: &mut EventScheduler<C>) -> Result<(), WrapperError> {
        if self.running.get() {
            return Err(WrapperError::HeadlessAlreadyRunning);
        }
        self.running.set(true);
        debug!("headless wrapper draining to end");
        scheduler.drain_to_end(context);
        self.running.set(false);
        Ok(())
    }

    /// Advance to `final_tick` (exclusive of anything scheduled at or
    /// beyond it), optionally chunked so `opts.yield_handler` runs exactly
    /// every `opts.yield_every_ticks` ticks, without allocating
    /// intermediate arrays.
    pub fn run_to<C>(
        &self,
        context: &mut C,
        scheduler: &mut EventScheduler<C>,
        final_tick: Tick,
        mut opts: Option<RunToOptions<'_, C>>,
    ) -> Result<(), WrapperError> {
        if self.running.get() {
            return Err(WrapperError::HeadlessAlreadyRunning);
        }
        self.running.set(true);

        let result = (|| -> Result<(), WrapperError> {
            let remaining = final_tick.saturating_sub(scheduler.current_tick());
            match opts.as_mut() {
                None => {
                    let offset: u32 = remaining.try_into().unwrap_or(u32::MAX);
                    scheduler.advance(context, offset);
                    Ok(())
                }
                Some(opts) => {
                    if opts.yield_every_ticks == 0 {
                        return Err(WrapperError::InvalidYieldInterval);
                    }
                    if u64::from(opts.yield_every_ticks) > remaining {
                        warn!(
                            yield_every_ticks = opts.yield_every_ticks,
                            remaining, "yield interval exceeds remaining span"
                        );
                    }
                    let mut left = remaining;
                    while left > 0 {
                        let chunk = left.min(u64::from(opts.yield_every_ticks));
                        scheduler.advance(context, chunk as u32);
                        left -= chunk;
                        (opts.yield_handler)(context, scheduler);
                    }
                    Ok(())
                }
            }
        })();

        self.running.set(false);
        result
    }
}
