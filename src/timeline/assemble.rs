//! Sequential timeline assembly
//!
//! Fragments are laid end to end: each one starts at a cursor that advances
//! by the previous fragment's slot length, not its content length, so every
//! fragment begins on the grid its slot policy defines.

use super::align::Aligned;
use crate::models::{Document, Fragment, Track};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    /// No master tracks yet
    Empty,
    /// Processing fragments; `placed` have been written so far
    Building { placed: usize },
    Done,
}

/// Where one fragment landed on the timeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub source: String,
    pub start_tick: u64,
    pub slot_length: u64,
}

#[derive(Debug)]
pub struct Assembler {
    state: AssemblyState,
    master: Option<Document>,
    /// Cached end tick of each master track
    track_ends: Vec<u64>,
    cursor: u64,
    placements: Vec<Placement>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            state: AssemblyState::Empty,
            master: None,
            track_ends: Vec::new(),
            cursor: 0,
            placements: Vec::new(),
        }
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    /// Tick at which the next fragment will start
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Append one fragment at the cursor, then advance the cursor by `slot_length`
    ///
    /// The first fragment fixes the master resolution and initial track
    /// count; later fragments must already be at that resolution. Extra
    /// tracks in later fragments are appended to the master as they appear.
    pub fn push(&mut self, fragment: &Fragment, slot_length: u64) -> Result<(), String> {
        let placed = match self.state {
            AssemblyState::Done => return Err("assembler already finished".to_string()),
            AssemblyState::Empty => {
                let tpb = fragment.ticks_per_beat();
                self.master = Some(Document::with_tracks(
                    tpb,
                    vec![Track::new(); fragment.track_count()],
                ));
                self.track_ends = vec![0; fragment.track_count()];
                0
            }
            AssemblyState::Building { placed } => placed,
        };

        let master = self
            .master
            .as_mut()
            .ok_or_else(|| "master document missing".to_string())?;
        if fragment.ticks_per_beat() != master.ticks_per_beat {
            return Err(format!(
                "{} is at {} ticks per beat, timeline is at {}",
                fragment.source,
                fragment.ticks_per_beat(),
                master.ticks_per_beat
            ));
        }

        for (index, track) in fragment.document.tracks.iter().enumerate() {
            if index >= master.tracks.len() {
                master.tracks.push(Track::new());
                self.track_ends.push(0);
            }
            if track.is_empty() {
                continue;
            }

            let master_end = self.track_ends[index];
            // An overrunning predecessor just abuts; never a negative delta
            let gap = self.cursor.saturating_sub(master_end);

            let dest = &mut master.tracks[index];
            let mut events = track.events.iter();
            if let Some(first) = events.next() {
                let delta = u32::try_from(first.delta as u64 + gap).map_err(|_| {
                    format!("{}: gap of {} ticks overflows a delta", fragment.source, gap)
                })?;
                let mut first = first.clone();
                first.delta = delta;
                dest.push(first);
            }
            dest.events.extend(events.cloned());

            self.track_ends[index] = master_end + gap + track.end_tick();
        }

        self.placements.push(Placement {
            source: fragment.source.clone(),
            start_tick: self.cursor,
            slot_length,
        });
        self.cursor = self
            .cursor
            .checked_add(slot_length)
            .ok_or_else(|| "timeline cursor overflow".to_string())?;
        self.state = AssemblyState::Building { placed: placed + 1 };
        Ok(())
    }

    /// Hand over the assembled document; the assembler is `Done` afterwards
    pub fn finish(&mut self) -> Result<Document, String> {
        match self.state {
            AssemblyState::Empty => Err("no fragments were assembled".to_string()),
            AssemblyState::Done => Err("assembler already finished".to_string()),
            AssemblyState::Building { placed } => {
                let master = self
                    .master
                    .take()
                    .ok_or_else(|| "master document missing".to_string())?;
                log::info!(
                    "Stitched {} fragments into {} tracks ({} ticks)",
                    placed,
                    master.tracks.len(),
                    self.cursor
                );
                self.state = AssemblyState::Done;
                Ok(master)
            }
        }
    }
}

/// Assemble aligned fragments in order
pub fn assemble(fragments: &[Aligned]) -> Result<Document, String> {
    let mut assembler = Assembler::new();
    for aligned in fragments {
        assembler.push(&aligned.fragment, aligned.slot_length)?;
    }
    assembler.finish()
}
