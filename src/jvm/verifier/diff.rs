use super::{Frame, VerificationType};
use crate::util::Width;

/// How the locals of a frame differ from those of the previous frame
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DiffResult {
    /// Locals only differ at the end: this many were appended (positive) or chopped (negative)
    ///
    /// `Small(0)` means the locals are the same.
    Small(i32),

    /// Locals differ somewhere other than the end, so only a full frame can describe them
    ForceFull,
}

impl Frame {
    /// Compare the locals against those of the previous frame
    ///
    /// Locals are walked in lockstep (wide values count once) and any change in type or in slot
    /// alignment forces a full frame. An unused slot where a local should be is unexpected
    /// and also forces a full frame.
    ///
    /// The result is cached until the locals change. The cache is not keyed on `previous`, since a
    /// frame is only ever compared against the frame preceding it in the table.
    pub fn number_of_different_locals(&self, previous: Option<&Frame>) -> DiffResult {
        if let Some(diff) = self.diff_cache.get() {
            log::trace!("Reusing locals diff {:?} at {}", diff, self.pc);
            return diff;
        }
        let diff = match previous {
            None => DiffResult::Small(0),
            Some(previous) => diff_locals(previous, self),
        };
        self.diff_cache.set(Some(diff));
        diff
    }
}

fn diff_locals(previous: &Frame, current: &Frame) -> DiffResult {
    let previous_count = previous.number_of_locals();
    let current_count = current.number_of_locals();
    let previous_locals = previous.locals();
    let current_locals = current.locals();

    let mut previous_slot = 0;
    let mut current_slot = 0;
    let mut common = 0;
    while common < previous_count && common < current_count {
        match (&previous_locals[previous_slot], &current_locals[current_slot]) {
            (Some(previous_local), Some(current_local)) => {
                if previous_local != current_local || previous_slot != current_slot {
                    return DiffResult::ForceFull;
                }
                previous_slot += previous_local.width();
                current_slot += current_local.width();
                common += 1;
            }
            _ => {
                let pc = current.pc;
                log::warn!("Unused local slot among live locals at {}, using a full frame", pc);
                return DiffResult::ForceFull;
            }
        }
    }

    if common < current_count {
        match skip_locals(current_locals, current_slot, current_count - common) {
            Some(_) => DiffResult::Small((current_count - common) as i32),
            None => {
                log::warn!("Unused local slot among appended locals at {}", current.pc);
                DiffResult::ForceFull
            }
        }
    } else if common < previous_count {
        match skip_locals(previous_locals, previous_slot, previous_count - common) {
            Some(_) => DiffResult::Small(-((previous_count - common) as i32)),
            None => {
                log::warn!("Unused local slot among chopped locals at {}", current.pc);
                DiffResult::ForceFull
            }
        }
    } else {
        DiffResult::Small(0)
    }
}

/// Step over `count` locals starting at `slot`, returning the slot after them
///
/// Fails if an unused slot is encountered first.
fn skip_locals(locals: &[Option<VerificationType>], mut slot: usize, count: usize) -> Option<usize> {
    for _ in 0..count {
        slot += locals.get(slot)?.as_ref()?.width();
    }
    Some(slot)
}
