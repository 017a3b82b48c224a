//! Fixed-size pool of hardware channels.
//!
//! Each channel moves through a small state machine:
//!
//! ```text
//!            acquire           start             finish
//!   Free ────────────▶ Bound ─────────▶ Active ──────────▶ Releasing
//!    ▲                   │                 │                   │
//!    └───────────────────┴─────────────────┴───────────────────┘
//!                                release
//! ```
//!
//! A channel is owned by at most one sound from `acquire` until `release`.
//! Illegal transitions are rejected and leave the channel untouched.

use cadence_common::{ChannelId, SoundHandle};
use tracing::{error, trace};

/// Lifecycle state of a pooled channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelState {
    /// Available for acquisition.
    #[default]
    Free,
    /// Owned by a sound, attributes being pushed, not yet started.
    Bound,
    /// Started; scanned every frame for natural completion.
    Active,
    /// Stopped; released during the next cleanup phase.
    Releasing,
}

/// Transition requests accepted by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Hand the channel to a sound.
    Acquire,
    /// Playback started.
    Start,
    /// Playback stopped or ran out.
    Finish,
    /// Return the channel to the pool.
    Release,
}

impl ChannelState {
    /// Next state for `event`, or `None` if the transition is illegal.
    #[must_use]
    pub const fn next(self, event: ChannelEvent) -> Option<Self> {
        use ChannelEvent as E;
        match (self, event) {
            (Self::Free, E::Acquire) => Some(Self::Bound),
            (Self::Bound, E::Start) => Some(Self::Active),
            (Self::Bound | Self::Active, E::Finish) => Some(Self::Releasing),
            (Self::Bound | Self::Active | Self::Releasing, E::Release) => Some(Self::Free),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    state: ChannelState,
    owner: Option<SoundHandle>,
}

/// Pool of channels with single ownership.
#[derive(Debug, Default)]
pub struct ChannelPool {
    slots: Vec<Slot>,
}

impl ChannelPool {
    /// Create a pool of `capacity` free channels.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(usize::from(u16::MAX));
        Self {
            slots: vec![Slot::default(); capacity],
        }
    }

    /// Take the lowest-numbered free channel for `owner`.
    pub fn acquire(&mut self, owner: SoundHandle) -> Option<ChannelId> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.state == ChannelState::Free)?;
        let id = ChannelId::new(index as u16);
        if self.transition(id, ChannelEvent::Acquire) {
            self.slots[index].owner = Some(owner);
            trace!("{} acquired by {}", id, owner);
            Some(id)
        } else {
            None
        }
    }

    /// Mark a bound channel as playing.
    pub fn start(&mut self, id: ChannelId) -> bool {
        self.transition(id, ChannelEvent::Start)
    }

    /// Mark a channel as stopped and awaiting release.
    pub fn finish(&mut self, id: ChannelId) -> bool {
        self.transition(id, ChannelEvent::Finish)
    }

    /// Return a channel to the pool, yielding its former owner.
    pub fn release(&mut self, id: ChannelId) -> Option<SoundHandle> {
        if !self.transition(id, ChannelEvent::Release) {
            return None;
        }
        let owner = self.slots[id.index()].owner.take();
        trace!("{} released", id);
        owner
    }

    /// State of a channel (`Free` for out-of-range ids).
    #[must_use]
    pub fn state(&self, id: ChannelId) -> ChannelState {
        self.slots
            .get(id.index())
            .map_or(ChannelState::Free, |slot| slot.state)
    }

    /// Sound owning a channel.
    #[must_use]
    pub fn owner(&self, id: ChannelId) -> Option<SoundHandle> {
        self.slots.get(id.index()).and_then(|slot| slot.owner)
    }

    /// Channels currently in the `Active` state, in id order.
    pub fn active(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state == ChannelState::Active)
            .map(|(i, _)| ChannelId::new(i as u16))
    }

    /// Number of free channels.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.count(ChannelState::Free)
    }

    /// Number of channels in the `Active` state.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.count(ChannelState::Active)
    }

    fn count(&self, state: ChannelState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }

    fn transition(&mut self, id: ChannelId, event: ChannelEvent) -> bool {
        let Some(slot) = self.slots.get_mut(id.index()) else {
            error!("{:?} on unknown {}", event, id);
            return false;
        };
        match slot.state.next(event) {
            Some(next) => {
                slot.state = next;
                true
            },
            None => {
                error!("Illegal {:?} on {} in state {:?}", event, id, slot.state);
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sound(i: u32) -> SoundHandle {
        SoundHandle::new(i, 1)
    }

    #[test]
    fn test_transition_table() {
        use ChannelEvent as E;
        use ChannelState as S;

        assert_eq!(S::Free.next(E::Acquire), Some(S::Bound));
        assert_eq!(S::Bound.next(E::Start), Some(S::Active));
        assert_eq!(S::Active.next(E::Finish), Some(S::Releasing));
        assert_eq!(S::Releasing.next(E::Release), Some(S::Free));

        assert_eq!(S::Free.next(E::Start), None);
        assert_eq!(S::Free.next(E::Release), None);
        assert_eq!(S::Active.next(E::Acquire), None);
        assert_eq!(S::Releasing.next(E::Start), None);
    }

    #[test]
    fn test_acquire_until_exhausted() {
        let mut pool = ChannelPool::new(2);
        let a = pool.acquire(sound(0)).expect("first");
        let b = pool.acquire(sound(1)).expect("second");
        assert_ne!(a, b);
        assert!(pool.acquire(sound(2)).is_none());
        assert_eq!(pool.available_count(), 0);

        assert_eq!(pool.owner(a), Some(sound(0)));
        assert_eq!(pool.release(a), Some(sound(0)));
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.acquire(sound(2)), Some(a));
    }

    #[test]
    fn test_full_cycle() {
        let mut pool = ChannelPool::new(1);
        let id = pool.acquire(sound(3)).expect("acquire");
        assert_eq!(pool.state(id), ChannelState::Bound);
        assert_eq!(pool.active().count(), 0);

        assert!(pool.start(id));
        assert_eq!(pool.active().collect::<Vec<_>>(), vec![id]);
        assert_eq!(pool.active_count(), 1);

        assert!(pool.finish(id));
        assert_eq!(pool.state(id), ChannelState::Releasing);
        assert_eq!(pool.active_count(), 0);

        assert_eq!(pool.release(id), Some(sound(3)));
        assert_eq!(pool.state(id), ChannelState::Free);
        assert_eq!(pool.owner(id), None);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut pool = ChannelPool::new(1);
        let id = ChannelId::new(0);

        assert!(!pool.start(id));
        assert_eq!(pool.release(id), None);
        assert_eq!(pool.state(id), ChannelState::Free);

        assert!(!pool.finish(ChannelId::new(9)));
        assert_eq!(pool.state(ChannelId::new(9)), ChannelState::Free);
    }
}
