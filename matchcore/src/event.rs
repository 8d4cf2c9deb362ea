// The event scheduler: a min-heap ordered by `(tick, type, seq)`, plus the
// payload taxonomy and the generic scheduler that owns the heap.
//
// The heap is index-addressed rather than built on `std::collections::
// BinaryHeap`: cancel and reschedule must be O(log n) against an arbitrary
// pending event, which a plain `BinaryHeap` cannot do without a linear
// scan. Each arena slot remembers its own heap position so these
// operations never need to search.
//
// **Critical constraint: determinism.** Draining must visit events in
// strict `(tick, type, seq)` order with no exceptions; see `advance` and
// `drain_to_end` below, and the scenario tests under `tests/`.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ScheduleError;
use crate::external::ExternalPayload;
use crate::types::{EventHandle, EventType, Seq, Tick, EXTERNAL_SEQ_MAX, SIMULATION_SEQ_MIN};

/// The closed union of data an event may carry. The scheduler treats this
/// opaquely; callbacks discriminate on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// No data; used for events whose identity alone drives behavior.
    Empty,
    /// An operator-injected event. Only ever constructed by
    /// [`crate::external::ExternalGate`].
    External(ExternalPayload),
    /// One tick of ball-physics integration.
    BallPhysics,
    /// One tick of a single player's physics integration.
    PlayerPhysics { player_id: u32 },
    /// One tick of a single player's AI decision loop.
    PlayerAi { player_id: u32 },
    /// One tick of a single player's vision-cone update.
    Vision { player_id: u32 },
    /// One tick of the referee/assistant "head" AI loop.
    HeadAi,
    /// One tick of the head's own physics (position, orientation).
    HeadPhysics,
    /// Match-control bookkeeping (kickoff, half-time, full-time, ...).
    MatchControl(MatchControlKind),
}

/// Match-control events: the small set of "the match itself" events, as
/// opposed to a specific player/ball/head event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchControlKind {
    KickOff,
    HalfTime,
    FullTime,
}

/// The callback invoked when a scheduled event fires.
///
/// A plain function pointer, not a boxed closure: per-event heap
/// allocation is avoided by having periodic callers (physics, AI) pass
/// whatever identifying data they need through `payload` and reschedule
/// themselves from inside the callback body via `scheduler.reschedule`.
pub type Callback<C> = fn(&mut C, &mut EventScheduler<C>, FiredEvent);

/// A fired event, as delivered to its callback. Carries the event's own
/// handle so a callback can call `scheduler.reschedule(fired.handle, ..)`
/// to re-arm itself with the same identity.
#[derive(Clone, Debug)]
pub struct FiredEvent {
    pub handle: EventHandle,
    pub tick: Tick,
    pub event_type: EventType,
    pub seq: Seq,
    pub payload: Payload,
}

/// Sugar for `scheduler.reschedule(fired.handle, tick_offset)`, matching
/// the `event.reschedule(offset)` shorthand described for the handle's
/// public interface. The scheduler reference is required because a fired
/// event cannot hold a live reference back into the heap it was just
/// removed from.
pub fn reschedule<C>(
    scheduler: &mut EventScheduler<C>,
    fired: &FiredEvent,
    tick_offset: u32,
) -> Result<(), ScheduleError> {
    scheduler.reschedule(fired.handle, tick_offset)
}

struct StoredEvent<C> {
    tick: Tick,
    event_type: EventType,
    seq: Seq,
    payload: Payload,
    callback: Callback<C>,
}

struct Slot<C> {
    event: Option<StoredEvent<C>>,
    generation: u32,
    /// Position of this slot's arena index within `heap`, or `None` if not
    /// currently in the heap (either never inserted, already fired and not
    /// yet re-armed, or freed).
    heap_pos: Option<usize>,
}

impl<C> Default for Slot<C> {
    fn default() -> Self {
        Self {
            event: None,
            generation: 0,
            heap_pos: None,
        }
    }
}

/// Owns the current tick, the event heap, both sequence counters, and the
/// external-event barrier. Generic over a host context `C` passed to every
/// callback alongside the scheduler itself.
pub struct EventScheduler<C> {
    current_tick: Tick,
    min_external_tick: Tick,
    next_simulation_seq: Seq,
    next_external_seq: Seq,
    heap: Vec<u32>,
    slots: Vec<Slot<C>>,
    free_list: Vec<u32>,
    gate_issued: bool,
    /// Arena index of the event currently mid-callback, if any. Lets
    /// `reschedule`/`cancel` distinguish "just fired, still eligible for
    /// self-reschedule" from "settled and gone".
    firing: Option<u32>,
}

impl<C> Default for EventScheduler<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventScheduler<C> {
    /// Construct a scheduler with `current_tick == 0`.
    pub fn new() -> Self {
        Self {
            current_tick: 0,
            min_external_tick: 0,
            next_simulation_seq: SIMULATION_SEQ_MIN,
            next_external_seq: 0,
            heap: Vec::new(),
            slots: Vec::new(),
            free_list: Vec::new(),
            gate_issued: false,
            firing: None,
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// Move `current_tick` (and the external barrier) forward without
    /// draining anything. Used only at construction time, when a host
    /// resumes a match at a non-zero starting tick and the heap is
    /// guaranteed empty.
    pub(crate) fn set_starting_tick(&mut self, tick: Tick) {
        debug_assert!(self.heap.is_empty(), "set_starting_tick requires an empty heap");
        self.current_tick = tick;
        self.min_external_tick = tick;
    }

    pub fn has_pending(&self) -> bool {
        !self.heap.is_empty()
    }

    pub fn next_scheduled_tick(&self) -> Option<Tick> {
        self.heap.first().map(|&idx| {
            self.slots[idx as usize]
                .event
                .as_ref()
                .expect("heap entries always reference a live event")
                .tick
        })
    }

    /// Insert a new simulation event. `event_type` must not be `External`;
    /// external events are only created through
    /// [`crate::external::ExternalGate`].
    pub fn schedule(
        &mut self,
        tick_offset: u32,
        event_type: EventType,
        callback: Callback<C>,
        payload: Payload,
    ) -> Result<EventHandle, ScheduleError> {
        if event_type == EventType::External {
            return Err(ScheduleError::InvalidType(event_type));
        }
        let seq = self.next_simulation_seq;
        self.next_simulation_seq += 1;
        let tick = self.current_tick + tick_offset as Tick;
        Ok(self.insert(tick, event_type, seq, payload, callback))
    }

    /// Used exclusively by [`crate::external::ExternalGate`] to insert an
    /// `External`-typed event drawing from the reserved sequence range.
    pub(crate) fn schedule_external(
        &mut self,
        tick_offset: u32,
        payload: ExternalPayload,
        callback: Callback<C>,
    ) -> (EventHandle, Tick, Seq) {
        let seq = self.next_external_seq;
        self.next_external_seq += 1;
        debug_assert!(
            seq <= EXTERNAL_SEQ_MAX,
            "external sequence space exhausted"
        );
        let tick = self.min_external_tick + tick_offset as Tick;
        let handle = self.insert(
            tick,
            EventType::External,
            seq,
            Payload::External(payload),
            callback,
        );
        (handle, tick, seq)
    }

    pub(crate) fn min_external_tick(&self) -> Tick {
        self.min_external_tick
    }

    /// Issue the external gate. Returns `Ok` exactly once per scheduler
    /// lifetime; every subsequent call fails.
    pub(crate) fn mark_gate_issued(&mut self) -> Result<(), crate::error::GateError> {
        if self.gate_issued {
            return Err(crate::error::GateError::AlreadyIssued);
        }
        self.gate_issued = true;
        Ok(())
    }

    fn insert(
        &mut self,
        tick: Tick,
        event_type: EventType,
        seq: Seq,
        payload: Payload,
        callback: Callback<C>,
    ) -> EventHandle {
        let stored = StoredEvent {
            tick,
            event_type,
            seq,
            payload,
            callback,
        };
        let idx = if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            self.slots.push(Slot::default());
            (self.slots.len() - 1) as u32
        };
        let slot = &mut self.slots[idx as usize];
        slot.event = Some(stored);
        self.heap_push(idx);
        EventHandle {
            index: idx,
            generation: self.slots[idx as usize].generation,
        }
    }

    /// Move a pending (or just-fired, self-rescheduling) event to
    /// `current_tick + tick_offset`, preserving its `seq` and `type`.
    pub fn reschedule(&mut self, handle: EventHandle, tick_offset: u32) -> Result<(), ScheduleError> {
        let idx = handle.index;
        let slot = self
            .slots
            .get_mut(idx as usize)
            .ok_or(ScheduleError::NotPending(handle))?;
        if slot.generation != handle.generation || slot.event.is_none() {
            return Err(ScheduleError::NotPending(handle));
        }
        let pending_or_firing = slot.heap_pos.is_some() || self.firing == Some(idx);
        if !pending_or_firing {
            return Err(ScheduleError::NotPending(handle));
        }
        let new_tick = self.current_tick + tick_offset as Tick;
        if slot.heap_pos.is_some() {
            self.heap_remove(idx);
        }
        self.slots[idx as usize]
            .event
            .as_mut()
            .expect("checked above")
            .tick = new_tick;
        self.heap_push(idx);
        Ok(())
    }

    /// Remove a pending event. A no-op if the event has already fired (and
    /// was not rescheduled) or was already cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> Result<(), ScheduleError> {
        let idx = handle.index;
        let Some(slot) = self.slots.get_mut(idx as usize) else {
            return Ok(());
        };
        if slot.generation != handle.generation || slot.event.is_none() {
            return Ok(());
        }
        if slot.heap_pos.is_some() {
            self.heap_remove(idx);
        }
        if self.firing != Some(idx) {
            self.free_slot(idx);
        } else {
            // Cancelled from inside its own callback: clear the payload now;
            // the post-callback settle step sees `event: None` and will not
            // double-free it.
            self.slots[idx as usize].event = None;
        }
        Ok(())
    }

    fn free_slot(&mut self, idx: u32) {
        let slot = &mut self.slots[idx as usize];
        slot.event = None;
        slot.heap_pos = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(idx);
    }

    /// Drain every event with `tick <= current_tick + ticks`, in strict
    /// `(tick, type, seq)` order, then set `current_tick := current_tick +
    /// ticks`.
    pub fn advance(&mut self, context: &mut C, ticks: u32) {
        let target = self.current_tick + ticks as Tick;
        let mut bumped_tick: Option<Tick> = None;
        loop {
            let Some(&idx) = self.heap.first() else {
                break;
            };
            let tick = self.slots[idx as usize]
                .event
                .as_ref()
                .expect("heap entries reference live events")
                .tick;
            if tick > target {
                break;
            }
            if bumped_tick != Some(tick) {
                self.current_tick = tick;
                self.min_external_tick = tick + 1;
                bumped_tick = Some(tick);
            }
            self.fire_top(context);
        }
        self.current_tick = target;
    }

    /// Drain every pending event regardless of tick. `current_tick` ends at
    /// the tick of the last event fired, or is unchanged if the queue was
    /// already empty.
    pub fn drain_to_end(&mut self, context: &mut C) {
        let mut bumped_tick: Option<Tick> = None;
        loop {
            let Some(&idx) = self.heap.first() else {
                break;
            };
            let tick = self.slots[idx as usize]
                .event
                .as_ref()
                .expect("heap entries reference live events")
                .tick;
            if bumped_tick != Some(tick) {
                self.current_tick = tick;
                self.min_external_tick = tick + 1;
                bumped_tick = Some(tick);
            }
            self.fire_top(context);
        }
    }

    fn fire_top(&mut self, context: &mut C) {
        let idx = self.heap[0];
        self.heap_remove_at(0);
        let stored = self.slots[idx as usize]
            .event
            .as_ref()
            .expect("heap entries reference live events");
        let fired = FiredEvent {
            handle: EventHandle {
                index: idx,
                generation: self.slots[idx as usize].generation,
            },
            tick: stored.tick,
            event_type: stored.event_type,
            seq: stored.seq,
            payload: stored.payload.clone(),
        };
        let callback = stored.callback;
        trace!(tick = fired.tick, event_type = ?fired.event_type, seq = fired.seq, "dispatching event");

        self.firing = Some(idx);
        callback(context, self, fired);
        self.firing = None;

        // If the callback didn't reschedule itself, the slot is settled
        // (whether it fired normally or cancelled itself mid-callback,
        // which leaves `event: None` already) and can be recycled.
        if self.slots[idx as usize].heap_pos.is_none() {
            self.free_slot(idx);
        }
    }

    // --- binary heap over `heap: Vec<u32>` of arena indices --------------

    fn less(&self, a: u32, b: u32) -> bool {
        let ea = self.slots[a as usize].event.as_ref().unwrap();
        let eb = self.slots[b as usize].event.as_ref().unwrap();
        (ea.tick, ea.event_type, ea.seq) < (eb.tick, eb.event_type, eb.seq)
    }

    fn heap_push(&mut self, idx: u32) {
        self.heap.push(idx);
        let pos = self.heap.len() - 1;
        self.slots[idx as usize].heap_pos = Some(pos);
        self.sift_up(pos);
    }

    /// Remove the arena index currently at heap position `pos`.
    fn heap_remove_at(&mut self, pos: usize) {
        let last = self.heap.len() - 1;
        self.heap.swap(pos, last);
        let removed = self.heap.pop().expect("heap non-empty");
        self.slots[removed as usize].heap_pos = None;
        if pos < self.heap.len() {
            let moved = self.heap[pos];
            self.slots[moved as usize].heap_pos = Some(pos);
            self.sift_down(pos);
            self.sift_up(pos);
        }
    }

    /// Remove whichever heap position currently holds arena index `idx`.
    fn heap_remove(&mut self, idx: u32) {
        let pos = self.slots[idx as usize]
            .heap_pos
            .expect("heap_remove called on an index not in the heap");
        self.heap_remove_at(pos);
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.less(self.heap[pos], self.heap[parent]) {
                self.heap.swap(pos, parent);
                self.slots[self.heap[pos] as usize].heap_pos = Some(pos);
                self.slots[self.heap[parent] as usize].heap_pos = Some(parent);
                pos = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = 2 * pos + 2;
            let mut smallest = pos;
            if left < len && self.less(self.heap[left], self.heap[smallest]) {
                smallest = left;
            }
            if right < len && self.less(self.heap[right], self.heap[smallest]) {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.heap.swap(pos, smallest);
            self.slots[self.heap[pos] as usize].heap_pos = Some(pos);
            self.slots[self.heap[smallest] as usize].heap_pos = Some(smallest);
            pos = smallest;
        }
    }
}

/// Obtain the scheduler's exclusive external gate. Not public API: callers
/// go through [`crate::match_::Match::new`], which calls this once and
/// stores the result.
pub(crate) fn issue_gate<C>(scheduler: &mut EventScheduler<C>) -> Result<(), crate::error::GateError> {
    let result = scheduler.mark_gate_issued();
    if result.is_ok() {
        debug!("external gate issued");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    struct Log(Vec<&'static str>);

    fn push_a(ctx: &mut Log, _s: &mut EventScheduler<Log>, _e: FiredEvent) {
        ctx.0.push("A");
    }
    fn push_b(ctx: &mut Log, _s: &mut EventScheduler<Log>, _e: FiredEvent) {
        ctx.0.push("B");
    }
    fn push_c(ctx: &mut Log, _s: &mut EventScheduler<Log>, _e: FiredEvent) {
        ctx.0.push("C");
    }

    #[test]
    fn same_tick_orders_by_type_then_seq() {
        // Scenario S1: schedule A (PlayerAi), B (BallPhysics), C (PlayerAi)
        // at the same offset, in that order. Expect firing order B, A, C.
        let mut sched = EventScheduler::<Log>::new();
        let mut ctx = Log(Vec::new());
        sched
            .schedule(10, EventType::PlayerAi, push_a, Payload::PlayerAi { player_id: 1 })
            .unwrap();
        sched
            .schedule(10, EventType::BallPhysics, push_b, Payload::BallPhysics)
            .unwrap();
        sched
            .schedule(10, EventType::PlayerAi, push_c, Payload::PlayerAi { player_id: 3 })
            .unwrap();

        sched.advance(&mut ctx, 10);
        assert_eq!(ctx.0, vec!["B", "A", "C"]);
        assert_eq!(sched.current_tick(), 10);
    }

    fn self_reschedule(ctx: &mut Vec<Tick>, sched: &mut EventScheduler<Vec<Tick>>, fired: FiredEvent) {
        ctx.push(fired.tick);
        reschedule(sched, &fired, 100).unwrap();
    }

    #[test]
    fn self_reschedule_repeats_on_interval() {
        // Scenario S2.
        let mut sched = EventScheduler::<Vec<Tick>>::new();
        let mut ctx = Vec::new();
        sched
            .schedule(0, EventType::BallPhysics, self_reschedule, Payload::BallPhysics)
            .unwrap();

        sched.advance(&mut ctx, 350);
        assert_eq!(ctx, vec![0, 100, 200, 300]);
        assert_eq!(sched.current_tick(), 350);
        assert_eq!(sched.next_scheduled_tick(), Some(400));
    }

    fn noop(_ctx: &mut (), _s: &mut EventScheduler<()>, _e: FiredEvent) {}

    #[test]
    fn cancel_before_advance_leaves_has_pending_unchanged() {
        let mut sched = EventScheduler::<()>::new();
        let before = sched.has_pending();
        let handle = sched
            .schedule(5, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched.cancel(handle).unwrap();
        assert_eq!(sched.has_pending(), before);
    }

    #[test]
    fn cancel_is_noop_after_fire() {
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        let handle = sched
            .schedule(0, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched.advance(&mut ctx, 0);
        // Already fired and settled (did not reschedule itself).
        assert!(sched.cancel(handle).is_ok());
    }

    #[test]
    fn reschedule_after_settle_is_an_error() {
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        let handle = sched
            .schedule(0, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched.advance(&mut ctx, 0);
        assert!(matches!(
            sched.reschedule(handle, 10),
            Err(ScheduleError::NotPending(_))
        ));
    }

    #[test]
    fn invalid_type_rejected() {
        let mut sched = EventScheduler::<()>::new();
        let err = sched.schedule(0, EventType::External, noop, Payload::Empty);
        assert!(matches!(err, Err(ScheduleError::InvalidType(EventType::External))));
    }

    #[test]
    fn advance_is_monotonic_and_lands_on_target() {
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        sched.advance(&mut ctx, 50);
        assert_eq!(sched.current_tick(), 50);
        sched.advance(&mut ctx, 0);
        assert_eq!(sched.current_tick(), 50);
    }

    #[test]
    fn reschedule_preserves_seq_ordering_against_siblings() {
        let mut sched = EventScheduler::<Log>::new();
        let mut ctx = Log(Vec::new());
        let handle_a = sched
            .schedule(10, EventType::PlayerAi, push_a, Payload::PlayerAi { player_id: 1 })
            .unwrap();
        sched
            .schedule(10, EventType::PlayerAi, push_c, Payload::PlayerAi { player_id: 3 })
            .unwrap();
        // Move A later than C; C should now fire first despite being
        // scheduled second.
        sched.reschedule(handle_a, 20).unwrap();
        sched.advance(&mut ctx, 20);
        assert_eq!(ctx.0, vec!["C", "A"]);
    }

    fn cancel_self(ctx: &mut u32, sched: &mut EventScheduler<u32>, fired: FiredEvent) {
        *ctx += 1;
        sched.cancel(fired.handle).unwrap();
    }

    #[test]
    fn self_cancel_frees_its_slot_for_reuse() {
        let mut sched = EventScheduler::<u32>::new();
        let mut ctx = 0u32;
        sched
            .schedule(0, EventType::HeadAi, cancel_self, Payload::HeadAi)
            .unwrap();
        sched.advance(&mut ctx, 0);
        assert_eq!(ctx, 1);
        assert!(!sched.has_pending());
        assert_eq!(sched.free_list.len(), 1, "self-cancelled slot must return to the free list");
    }

    #[test]
    fn drain_to_end_empties_queue_and_lands_on_last_tick() {
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        sched
            .schedule(5, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched
            .schedule(50, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched.drain_to_end(&mut ctx);
        assert!(!sched.has_pending());
        assert_eq!(sched.current_tick(), 50);
    }

    #[traced_test]
    #[test]
    fn firing_an_event_is_logged_at_trace_level() {
        let mut sched = EventScheduler::<()>::new();
        let mut ctx = ();
        sched
            .schedule(0, EventType::HeadAi, noop, Payload::HeadAi)
            .unwrap();
        sched.advance(&mut ctx, 0);
        assert!(logs_contain("dispatching event"));
    }
}
