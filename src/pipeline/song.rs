use crate::shared::SlotId;

/// Ordered list of slots played one bar each. Never empty: a chain built from
/// nothing plays slot A.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SongChain {
    slots: Vec<SlotId>,
    looping: bool,
}

impl Default for SongChain {
    fn default() -> Self {
        Self::new(Vec::new(), true)
    }
}

impl SongChain {
    pub fn new(slots: Vec<SlotId>, looping: bool) -> Self {
        let slots = if slots.is_empty() { vec![SlotId::default()] } else { slots };
        Self { slots, looping }
    }

    pub fn slots(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrangerState {
    Idle,
    Playing { slot: SlotId, bars_elapsed: u32 },
}

/// What the scheduler should do once a bar has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarOutcome {
    Continue(SlotId),
    Stop,
}

// Walks a song chain one bar at a time. The scheduler calls `on_bar_end` each
// time the step counter wraps back to 0, so the opening slot always gets its
// full first bar.
#[derive(Clone, Debug)]
pub struct SongArranger {
    chain: SongChain,
    position: usize,
    state: ArrangerState,
}

impl SongArranger {
    pub fn new(chain: SongChain) -> Self {
        Self {
            chain,
            position: 0,
            state: ArrangerState::Idle,
        }
    }

    pub fn start(&mut self) -> SlotId {
        self.position = 0;
        let slot = self.chain.slots[0];
        self.state = ArrangerState::Playing { slot, bars_elapsed: 0 };
        slot
    }

    pub fn state(&self) -> ArrangerState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn chain(&self) -> &SongChain {
        &self.chain
    }

    pub fn current_slot(&self) -> Option<SlotId> {
        match self.state {
            ArrangerState::Playing { slot, .. } => Some(slot),
            ArrangerState::Idle => None,
        }
    }

    pub fn on_bar_end(&mut self) -> BarOutcome {
        let ArrangerState::Playing { bars_elapsed, .. } = self.state else {
            return BarOutcome::Stop;
        };
        self.position += 1;
        if self.position >= self.chain.len() {
            if !self.chain.looping {
                log::info!("song chain finished after {} bars", bars_elapsed + 1);
                self.state = ArrangerState::Idle;
                self.position = 0;
                return BarOutcome::Stop;
            }
            self.position = 0;
        }
        let slot = self.chain.slots[self.position];
        log::debug!("song chain advancing to slot {slot} (position {})", self.position);
        self.state = ArrangerState::Playing { slot, bars_elapsed: bars_elapsed + 1 };
        BarOutcome::Continue(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SlotId::*;

    #[test]
    fn empty_chain_plays_slot_a() {
        let chain = SongChain::new(vec![], false);
        assert_eq!(chain.slots(), &[A]);
    }

    #[test]
    fn one_shot_chain_stops_after_last_bar() {
        let mut arranger = SongArranger::new(SongChain::new(vec![A, B], false));
        assert_eq!(arranger.state(), ArrangerState::Idle);
        assert_eq!(arranger.start(), A);
        assert_eq!(arranger.on_bar_end(), BarOutcome::Continue(B));
        assert_eq!(arranger.state(), ArrangerState::Playing { slot: B, bars_elapsed: 1 });
        assert_eq!(arranger.on_bar_end(), BarOutcome::Stop);
        assert_eq!(arranger.state(), ArrangerState::Idle);
        assert_eq!(arranger.current_slot(), None);
    }

    #[test]
    fn looping_chain_wraps_around() {
        let mut arranger = SongArranger::new(SongChain::new(vec![C, A, D], true));
        arranger.start();
        let order: Vec<BarOutcome> = (0..4).map(|_| arranger.on_bar_end()).collect();
        assert_eq!(
            order,
            vec![
                BarOutcome::Continue(A),
                BarOutcome::Continue(D),
                BarOutcome::Continue(C),
                BarOutcome::Continue(A),
            ]
        );
        assert_eq!(arranger.position(), 1);
    }

    #[test]
    fn single_slot_loop_keeps_playing() {
        let mut arranger = SongArranger::new(SongChain::new(vec![B], true));
        arranger.start();
        assert_eq!(arranger.on_bar_end(), BarOutcome::Continue(B));
        assert_eq!(arranger.state(), ArrangerState::Playing { slot: B, bars_elapsed: 1 });
    }

    #[test]
    fn restart_rewinds_to_the_top() {
        let mut arranger = SongArranger::new(SongChain::new(vec![A, B, C], false));
        arranger.start();
        arranger.on_bar_end();
        assert_eq!(arranger.start(), A);
        assert_eq!(arranger.position(), 0);
    }

    #[test]
    fn idle_arranger_asks_to_stop() {
        let mut arranger = SongArranger::new(SongChain::default());
        assert_eq!(arranger.on_bar_end(), BarOutcome::Stop);
    }
}
