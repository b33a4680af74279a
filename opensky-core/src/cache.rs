//! Bounded per-aircraft decode state.
//!
//! Contexts live in a slot arena indexed by ICAO address. Eviction returns
//! a slot to the free list after resetting its state, so a long archive
//! reuses the same allocations instead of growing with every aircraft ever
//! seen.

use std::collections::{HashMap, HashSet};

use crate::normalize::ResolvedPosition;
use crate::types::Icao;

/// Decode state for one aircraft.
#[derive(Debug, Clone)]
pub struct AircraftContext<S> {
    pub icao: Icao,
    /// Resolver state
    pub state: S,
    /// Receipt time of the most recent position message
    pub last_seen: f64,
    /// Most recent position that passed the plausibility checks
    pub last_good: Option<(f64, ResolvedPosition)>,
}

pub struct AircraftCache<S> {
    index: HashMap<Icao, usize>,
    slots: Vec<AircraftContext<S>>,
    free: Vec<usize>,
    max_aircraft: Option<usize>,
    /// Every identity ever admitted, tracked only when a cap is set
    admitted: HashSet<Icao>,
    created: u64,
}

impl<S: Default> AircraftCache<S> {
    pub fn new(max_aircraft: Option<usize>) -> Self {
        AircraftCache {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            max_aircraft,
            admitted: HashSet::new(),
            created: 0,
        }
    }

    /// Whether `icao` may be served without exceeding the cardinality cap.
    ///
    /// Identities admitted once stay admitted for the whole run, even after
    /// their context is evicted.
    pub fn would_admit(&self, icao: &Icao) -> bool {
        match self.max_aircraft {
            None => true,
            Some(max) => self.admitted.contains(icao) || self.admitted.len() < max,
        }
    }

    /// Look up the context for `icao`, creating one if needed, and mark it
    /// seen at `now`. Returns `None` only when the cap rejects a new identity.
    pub fn get_or_create(&mut self, icao: Icao, now: f64) -> Option<&mut AircraftContext<S>> {
        if let Some(&slot) = self.index.get(&icao) {
            let ctx = &mut self.slots[slot];
            ctx.last_seen = now;
            return Some(ctx);
        }

        if !self.would_admit(&icao) {
            return None;
        }
        if self.max_aircraft.is_some() {
            self.admitted.insert(icao);
        }
        self.created += 1;

        let slot = match self.free.pop() {
            Some(slot) => {
                let ctx = &mut self.slots[slot];
                ctx.icao = icao;
                ctx.last_seen = now;
                slot
            }
            None => {
                self.slots.push(AircraftContext {
                    icao,
                    state: S::default(),
                    last_seen: now,
                    last_good: None,
                });
                self.slots.len() - 1
            }
        };
        self.index.insert(icao, slot);
        Some(&mut self.slots[slot])
    }

    /// Evict every context not seen since `now - window`.
    ///
    /// `reset` is applied to each evicted state before its slot is freed.
    /// Returns the number of evicted contexts.
    pub fn sweep<F>(&mut self, now: f64, window: f64, mut reset: F) -> usize
    where
        F: FnMut(&mut S),
    {
        let cutoff = now - window;
        let slots = &mut self.slots;
        let free = &mut self.free;
        let before = self.index.len();

        self.index.retain(|_, &mut slot| {
            let ctx = &mut slots[slot];
            if ctx.last_seen >= cutoff {
                return true;
            }
            reset(&mut ctx.state);
            ctx.last_good = None;
            free.push(slot);
            false
        });

        before - self.index.len()
    }

    pub fn get(&self, icao: &Icao) -> Option<&AircraftContext<S>> {
        self.index.get(icao).map(|&slot| &self.slots[slot])
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of contexts ever created.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Number of allocated slots, live or free.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
