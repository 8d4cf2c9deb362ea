// The real-time wrapper: paces `EventScheduler::advance` by wall-clock
// time, scaled by a live-adjustable speed multiplier, with a fractional-
// tick carry to avoid long-run drift and a bounded idle back-off when the
// queue goes quiet.
//
// The loop runs on a dedicated background thread (grounded on the
// relay crate's `recv_timeout`-paced server loop in this workspace):
// the production host is a live match UI that must keep its own thread
// free to render and take input. This is the one place this crate
// crosses a thread boundary; the scheduler itself stays single-threaded
// cooperative — only one thread ever touches a given scheduler at a
// time, handed off at `run`/`stop` boundaries.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::WrapperError;
use crate::event::EventScheduler;

/// A source of wall-clock milliseconds. `SystemClock` in production; a
/// `FakeClock` in tests so the pacing and idle back-off logic can be
/// exercised without sleeping real time.
pub trait Clock: Send + 'static {
    fn now_ms(&self) -> u64;
}

/// Wall-clock time since construction, in milliseconds.
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// A manually-advanced clock for deterministic tests. Cloning shares the
/// same underlying counter, so a test can hold one handle to advance time
/// while the wrapper thread reads another.
#[derive(Clone)]
pub struct FakeClock {
    ms: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            ms: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Advance the clock by `delta_ms`, observable by every handle.
    pub fn advance(&self, delta_ms: u64) {
        self.ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> u64 {
        self.ms.load(Ordering::SeqCst)
    }
}

const IDLE_YIELD_ITERATIONS: u32 = 16;
const IDLE_SLEEP: Duration = Duration::from_millis(2);
const IDLE_COUNT_SATURATION: u32 = 4096;

/// Paces a scheduler's `advance` by wall-clock time on a dedicated
/// background thread.
pub struct RealTimeWrapper<C> {
    speed: Arc<Mutex<f64>>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(C, EventScheduler<C>), WrapperError>>>,
}

impl<C: Send + 'static> RealTimeWrapper<C> {
    pub fn new(initial_speed: f64) -> Self {
        Self {
            speed: Arc::new(Mutex::new(initial_speed)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn speed(&self) -> f64 {
        *self.speed.lock().expect("speed mutex poisoned")
    }

    /// Changes take effect starting with the loop's next iteration.
    pub fn set_speed(&self, new_speed: f64) {
        debug!(new_speed, "real-time wrapper speed changed");
        *self.speed.lock().expect("speed mutex poisoned") = new_speed;
    }

    /// Start the loop on a background thread. No-op (returns an error) if
    /// already running.
    pub fn run<K: Clock>(
        &mut self,
        context: C,
        scheduler: EventScheduler<C>,
        clock: K,
    ) -> Result<(), WrapperError> {
        if self.handle.is_some() {
            return Err(WrapperError::RealTimeAlreadyRunning);
        }
        debug!("real-time wrapper starting");
        self.stop_flag.store(false, Ordering::SeqCst);
        let speed = Arc::clone(&self.speed);
        let stop_flag = Arc::clone(&self.stop_flag);
        self.handle = Some(thread::spawn(move || {
            run_loop(context, scheduler, clock, speed, stop_flag)
        }));
        Ok(())
    }

    /// Request loop termination and wait for the in-flight `advance` call
    /// to return, guaranteeing no torn callback. Returns the context and
    /// scheduler ownership, or `Ok(None)` if the wrapper was not running.
    pub fn stop(&mut self) -> Result<Option<(C, EventScheduler<C>)>, WrapperError> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };
        self.stop_flag.store(true, Ordering::SeqCst);
        let outcome = handle
            .join()
            .map_err(|_| WrapperError::CallbackPanicked("real-time loop thread panicked".into()))??;
        debug!("real-time wrapper stopped");
        Ok(Some(outcome))
    }
}

fn run_loop<C, K: Clock>(
    mut context: C,
    mut scheduler: EventScheduler<C>,
    clock: K,
    speed: Arc<Mutex<f64>>,
    stop_flag: Arc<AtomicBool>,
) -> Result<(C, EventScheduler<C>), WrapperError> {
    let mut last_now = clock.now_ms();
    let mut fractional_carry: f64 = 0.0;
    let mut idle_count: u32 = 0;

    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }

        let now = clock.now_ms();
        let delta_ms = now.saturating_sub(last_now) as f64;
        last_now = now;

        let current_speed = *speed.lock().expect("speed mutex poisoned");
        let ticks_float = delta_ms * current_speed + fractional_carry;
        let ticks_int = ticks_float.floor();
        fractional_carry = ticks_float - ticks_int;

        if ticks_int > 0.0 {
            let result = catch_unwind(AssertUnwindSafe(|| {
                scheduler.advance(&mut context, ticks_int as u32);
            }));
            if let Err(panic) = result {
                error!("callback panicked inside real-time advance");
                return Err(WrapperError::CallbackPanicked(panic_message(panic)));
            }
            idle_count = 0;
        } else {
            idle_count = idle_count.saturating_add(1).min(IDLE_COUNT_SATURATION);
            if idle_count < IDLE_YIELD_ITERATIONS {
                thread::yield_now();
            } else {
                thread::sleep(IDLE_SLEEP);
            }
        }
    }

    Ok((context, scheduler))
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{FiredEvent, Payload};
    use crate::types::EventType;

    fn bump(ctx: &mut u32, sched: &mut EventScheduler<u32>, fired: FiredEvent) {
        *ctx += 1;
        crate::event::reschedule(sched, &fired, 1).unwrap();
    }

    #[test]
    fn speed_change_mid_run_with_fake_clock() {
        // Scenario S5, deterministic via FakeClock instead of real sleeps.
        let mut scheduler = EventScheduler::<u32>::new();
        scheduler
            .schedule(0, EventType::BallPhysics, bump, Payload::BallPhysics)
            .unwrap();

        let clock = FakeClock::new();
        let mut wrapper = RealTimeWrapper::new(1.0);
        wrapper.run(0u32, scheduler, clock.clone()).unwrap();

        clock.advance(100);
        std::thread::sleep(Duration::from_millis(20));
        wrapper.set_speed(10.0);
        clock.advance(100);
        std::thread::sleep(Duration::from_millis(20));

        let (_, scheduler) = wrapper.stop().unwrap().unwrap();
        let tick = scheduler.current_tick();
        assert!(
            (1_050..=1_150).contains(&tick),
            "expected tick within [1050, 1150], got {tick}"
        );
    }

    #[test]
    fn run_twice_without_stop_is_rejected() {
        let scheduler = EventScheduler::<()>::new();
        let clock = FakeClock::new();
        let mut wrapper = RealTimeWrapper::new(1.0);
        wrapper.run((), scheduler, clock.clone()).unwrap();
        let scheduler2 = EventScheduler::<()>::new();
        assert!(matches!(
            wrapper.run((), scheduler2, clock),
            Err(WrapperError::RealTimeAlreadyRunning)
        ));
        wrapper.stop().unwrap();
    }

    #[test]
    fn stop_without_run_is_a_noop() {
        let mut wrapper = RealTimeWrapper::<()>::new(1.0);
        assert!(wrapper.stop().unwrap().is_none());
    }
}
