//! Event perimeters and the point-to-event index.
//!
//! Perimeters are never deleted. Absorbing one event into another leaves a
//! `Merged` tombstone behind so ids stay stable until the final renumbering.

use std::collections::HashMap;

use thiserror::Error;

use crate::core::grid::Point;

/// Tile-local event identifier. Ids start at 1 and are never reused.
pub type EventId = u64;

/// Errors raised by perimeter bookkeeping. All of them indicate a logic bug
/// in the caller, never bad input data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PerimeterError {
    #[error("event {0} does not exist")]
    UnknownEvent(EventId),

    #[error("event {id} was already merged into event {into}")]
    AlreadyMerged { id: EventId, into: EventId },

    #[error("cannot merge event {0} into itself")]
    SelfMerge(EventId),

    #[error("event id {id} is out of sequence, expected {expected}")]
    OutOfSequence { id: EventId, expected: EventId },
}

/// Lifecycle of a perimeter.
#[derive(Debug, Clone, PartialEq)]
pub enum PerimeterState {
    Active { points: Vec<Point> },
    Merged { into: EventId },
}

/// One event cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPerimeter {
    id: EventId,
    state: PerimeterState,
}

impl EventPerimeter {
    pub fn new(id: EventId, points: Vec<Point>) -> Self {
        Self {
            id,
            state: PerimeterState::Active { points },
        }
    }

    #[inline]
    pub fn id(&self) -> EventId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, PerimeterState::Active { .. })
    }

    /// Points of a live perimeter; `None` once tombstoned.
    pub fn points(&self) -> Option<&[Point]> {
        match &self.state {
            PerimeterState::Active { points } => Some(points),
            PerimeterState::Merged { .. } => None,
        }
    }

    /// Id this perimeter was absorbed into, if any.
    pub fn merged_into(&self) -> Option<EventId> {
        match self.state {
            PerimeterState::Merged { into } => Some(into),
            PerimeterState::Active { .. } => None,
        }
    }
}

/// Maps every assigned point to the live event that owns it.
#[derive(Debug, Default, Clone)]
pub struct EventGridMap {
    entries: HashMap<Point, EventId>,
}

impl EventGridMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, point: &Point) -> Option<EventId> {
        self.entries.get(point).copied()
    }

    /// Register `points` under `id`, overwriting any previous owner.
    pub fn assign<'a, I>(&mut self, id: EventId, points: I)
    where
        I: IntoIterator<Item = &'a Point>,
    {
        for point in points {
            self.entries.insert(*point, id);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Point, &EventId)> {
        self.entries.iter()
    }
}

/// Owns every perimeter of a tile, indexed by id.
#[derive(Debug, Default, Clone)]
pub struct PerimeterStore {
    // perimeters[id - 1] holds event `id`
    perimeters: Vec<EventPerimeter>,
}

impl PerimeterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of perimeters ever created, tombstones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.perimeters.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.perimeters.is_empty()
    }

    pub fn get(&self, id: EventId) -> Option<&EventPerimeter> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.perimeters.get(idx)
    }

    fn get_mut(&mut self, id: EventId) -> Result<&mut EventPerimeter, PerimeterError> {
        let idx = usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or(PerimeterError::UnknownEvent(id))?;
        self.perimeters
            .get_mut(idx)
            .ok_or(PerimeterError::UnknownEvent(id))
    }

    /// Register a new perimeter. Ids must arrive as 1, 2, 3, ...
    pub fn create(&mut self, id: EventId, points: Vec<Point>) -> Result<(), PerimeterError> {
        let expected = self.perimeters.len() as EventId + 1;
        if id != expected {
            return Err(PerimeterError::OutOfSequence { id, expected });
        }
        self.perimeters.push(EventPerimeter::new(id, points));
        Ok(())
    }

    /// Append points to a live perimeter. Duplicates are kept.
    pub fn add_points(&mut self, id: EventId, new_points: &[Point]) -> Result<(), PerimeterError> {
        let perimeter = self.get_mut(id)?;
        match &mut perimeter.state {
            PerimeterState::Active { points } => {
                points.extend_from_slice(new_points);
                Ok(())
            }
            PerimeterState::Merged { into } => Err(PerimeterError::AlreadyMerged { id, into: *into }),
        }
    }

    /// Move every point of `obsolete` into `survivor`, re-point the grid map
    /// at the survivor and leave a tombstone behind.
    ///
    /// Both ids must be live and distinct.
    pub fn merge(
        &mut self,
        survivor: EventId,
        obsolete: EventId,
        grid: &mut EventGridMap,
    ) -> Result<(), PerimeterError> {
        if survivor == obsolete {
            return Err(PerimeterError::SelfMerge(survivor));
        }
        let target = self
            .get(survivor)
            .ok_or(PerimeterError::UnknownEvent(survivor))?;
        if let Some(into) = target.merged_into() {
            return Err(PerimeterError::AlreadyMerged { id: survivor, into });
        }

        let absorbed = {
            let perimeter = self.get_mut(obsolete)?;
            match std::mem::replace(&mut perimeter.state, PerimeterState::Merged { into: survivor }) {
                PerimeterState::Active { points } => points,
                PerimeterState::Merged { into } => {
                    perimeter.state = PerimeterState::Merged { into };
                    return Err(PerimeterError::AlreadyMerged { id: obsolete, into });
                }
            }
        };

        grid.assign(survivor, &absorbed);
        self.add_points(survivor, &absorbed)
    }

    /// Follow tombstones from `id` to the live perimeter that owns its points.
    pub fn resolve(&self, mut id: EventId) -> Option<EventId> {
        for _ in 0..=self.perimeters.len() {
            match self.get(id)?.merged_into() {
                Some(into) => id = into,
                None => return Some(id),
            }
        }
        None
    }

    /// Live perimeters in id order.
    pub fn active(&self) -> impl Iterator<Item = &EventPerimeter> {
        self.perimeters.iter().filter(|p| p.is_active())
    }

    /// Every perimeter, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = &EventPerimeter> {
        self.perimeters.iter()
    }
}
