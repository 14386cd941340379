use std::time::Duration;
use tracing::{info, warn};

use crate::dedup::DedupIndex;
use crate::viewport::Viewport;
use crate::{HarvestError, RawItem, Result};

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Stop once this many distinct rows are collected.
    pub target_count: usize,
    /// Stop after this many consecutive rounds that add nothing.
    pub max_stable_rounds: usize,
    /// Pause after each reveal so new rows can render.
    pub settle_delay: Duration,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            target_count: 2000,
            max_stable_rounds: 150,
            settle_delay: Duration::from_millis(800),
        }
    }
}

impl HarvestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_count == 0 {
            return Err(HarvestError::Config("target_count must be positive".into()));
        }
        if self.max_stable_rounds == 0 {
            return Err(HarvestError::Config("max_stable_rounds must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    ReachedTarget,
    /// No new rows for `max_stable_rounds` consecutive rounds.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStat {
    pub total: usize,
    pub new: usize,
}

#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub termination: Termination,
    pub items: Vec<RawItem>,
    pub rounds: Vec<RoundStat>,
}

/// Rows collected so far. `seen` and `items` only grow; `stable_rounds`
/// counts consecutive rounds without a new row.
#[derive(Debug, Default)]
pub struct HarvestState {
    seen: DedupIndex,
    items: Vec<RawItem>,
    stable_rounds: usize,
}

impl HarvestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the rows whose identity key is new and returns how many.
    pub fn absorb(&mut self, visible: Vec<RawItem>) -> usize {
        let mut new_count = 0;
        for item in visible {
            if self.seen.add(&item.identity_key) {
                self.items.push(item);
                new_count += 1;
            }
        }
        new_count
    }

    /// Decides whether the harvest is over after a round that added
    /// `new_count` rows. The target is checked before stability.
    pub fn settle(&mut self, new_count: usize, config: &HarvestConfig) -> Option<Termination> {
        if self.items.len() >= config.target_count {
            return Some(Termination::ReachedTarget);
        }

        if new_count == 0 {
            self.stable_rounds += 1;
            if self.stable_rounds >= config.max_stable_rounds {
                return Some(Termination::Exhausted);
            }
        } else {
            self.stable_rounds = 0;
        }
        None
    }

    pub fn items(&self) -> &[RawItem] {
        &self.items
    }

    pub fn seen(&self) -> &DedupIndex {
        &self.seen
    }

    pub fn stable_rounds(&self) -> usize {
        self.stable_rounds
    }

    pub fn into_items(self) -> Vec<RawItem> {
        self.items
    }
}

/// Reads, reveals and waits until the target is reached or the list
/// stops producing new rows. There is no other round limit.
pub async fn harvest<V: Viewport + ?Sized>(
    viewport: &mut V,
    config: &HarvestConfig,
) -> Result<HarvestReport> {
    config.validate()?;

    let mut state = HarvestState::new();
    let mut rounds = Vec::new();

    let termination = loop {
        let visible = viewport.read_visible_items().await?;
        let new_count = state.absorb(visible);

        let stat = RoundStat {
            total: state.items().len(),
            new: new_count,
        };
        rounds.push(stat);
        info!(total = stat.total, new = stat.new, "harvest round");

        if let Some(termination) = state.settle(new_count, config) {
            break termination;
        }

        viewport.reveal_more().await?;
        tokio::time::sleep(config.settle_delay).await;
    };

    match termination {
        Termination::ReachedTarget => {
            info!(total = state.items().len(), "reached target of {}", config.target_count)
        }
        Termination::Exhausted => warn!(
            total = state.items().len(),
            stable_rounds = state.stable_rounds(),
            "no new rows for {} rounds, assuming end of list",
            config.max_stable_rounds
        ),
    }

    Ok(HarvestReport {
        termination,
        items: state.into_items(),
        rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(labels: &[&str]) -> Vec<RawItem> {
        labels.iter().copied().map(RawItem::new).collect()
    }

    fn config(target_count: usize, max_stable_rounds: usize) -> HarvestConfig {
        HarvestConfig {
            target_count,
            max_stable_rounds,
            settle_delay: Duration::ZERO,
        }
    }

    #[test]
    fn absorb_skips_known_keys() {
        let mut state = HarvestState::new();
        assert_eq!(state.absorb(items(&["a", "b"])), 2);
        assert_eq!(state.absorb(items(&["b", "c", "c"])), 1);
        assert_eq!(state.items().len(), 3);
        assert_eq!(state.seen().len(), 3);
    }

    #[test]
    fn stable_counter_resets_on_progress() {
        let cfg = config(100, 3);
        let mut state = HarvestState::new();

        assert_eq!(state.settle(0, &cfg), None);
        assert_eq!(state.settle(0, &cfg), None);
        assert_eq!(state.stable_rounds(), 2);

        state.absorb(items(&["a"]));
        assert_eq!(state.settle(1, &cfg), None);
        assert_eq!(state.stable_rounds(), 0);

        assert_eq!(state.settle(0, &cfg), None);
        assert_eq!(state.settle(0, &cfg), None);
        assert_eq!(state.settle(0, &cfg), Some(Termination::Exhausted));
    }

    #[test]
    fn target_wins_over_stability() {
        let cfg = config(1, 1);
        let mut state = HarvestState::new();
        state.absorb(items(&["a"]));
        assert_eq!(state.settle(0, &cfg), Some(Termination::ReachedTarget));
    }

    #[test]
    fn zero_limits_are_rejected() {
        assert!(config(0, 1).validate().is_err());
        assert!(config(1, 0).validate().is_err());
        assert!(HarvestConfig::default().validate().is_ok());
    }
}
