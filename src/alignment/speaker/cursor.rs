use std::iter::Enumerate;
use std::slice::Iter;

use crate::types::SpeakerTurn;

/// Forward-only position in a time-ordered turn sequence.
///
/// Words are merged against turns by seeking the cursor to each word's
/// position; the cursor only ever moves to later turns.
pub struct TurnCursor<'a> {
    upcoming: Enumerate<Iter<'a, SpeakerTurn>>,
    index: usize,
    current: &'a SpeakerTurn,
}

impl<'a> TurnCursor<'a> {
    /// `None` when there are no turns.
    pub fn new(turns: &'a [SpeakerTurn]) -> Option<Self> {
        let mut upcoming = turns.iter().enumerate();
        let (index, current) = upcoming.next()?;
        Some(Self {
            upcoming,
            index,
            current,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current(&self) -> &'a SpeakerTurn {
        self.current
    }

    pub fn is_last(&self) -> bool {
        self.upcoming.len() == 0
    }

    /// Moves past every turn ending at or before `position_sec`, stopping on the
    /// last turn. Returns how many turns were skipped.
    pub fn seek(&mut self, position_sec: f64) -> usize {
        let mut advanced = 0usize;
        while position_sec >= self.current.end_sec {
            let Some((index, next)) = self.upcoming.next() else {
                break;
            };
            self.index = index;
            self.current = next;
            advanced += 1;
        }
        advanced
    }
}
