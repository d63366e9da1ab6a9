use super::DiffResult;
use std::fmt;

/// Compact encodings a stack map frame can take
///
/// See [the `StackMapTable` attribute][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.4
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FrameType {
    /// Same locals, empty stack, short offset delta
    Same,

    /// Same locals, empty stack
    SameExtended,

    /// Same locals, one stack item, short offset delta
    SameLocalsOneStackItem,

    /// Same locals, one stack item
    SameLocalsOneStackItemExtended,

    /// Last `k` locals are gone, empty stack (`k` is between 1 and 3)
    Chop(u8),

    /// `k` extra locals, empty stack (`k` is between 1 and 3)
    Append(u8),

    /// Everything is listed out
    Full,
}

impl FrameType {
    /// Largest offset delta that fits in the tag of a short frame
    pub const MAX_SHORT_OFFSET_DELTA: i32 = 63;

    /// Most locals that can be appended or chopped without a full frame
    pub const MAX_LOCALS_DIFFERENCE: i32 = 3;

    /// Pick the most compact encoding
    pub fn select(diff: DiffResult, stack_count: usize, offset_delta: i32) -> FrameType {
        let is_short = offset_delta <= FrameType::MAX_SHORT_OFFSET_DELTA;
        match (stack_count, diff) {
            (0, DiffResult::Small(0)) if is_short => FrameType::Same,
            (0, DiffResult::Small(0)) => FrameType::SameExtended,
            (0, DiffResult::Small(k)) if 0 < k && k <= FrameType::MAX_LOCALS_DIFFERENCE => {
                FrameType::Append(k as u8)
            }
            (0, DiffResult::Small(k)) if -FrameType::MAX_LOCALS_DIFFERENCE <= k && k < 0 => {
                FrameType::Chop(-k as u8)
            }
            (1, DiffResult::Small(0)) if is_short => FrameType::SameLocalsOneStackItem,
            (1, DiffResult::Small(0)) => FrameType::SameLocalsOneStackItemExtended,
            _ => FrameType::Full,
        }
    }
}

/// Name of the frame type in the `StackMapTable` attribute
impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameType::Same => "same_frame",
            FrameType::SameExtended => "same_frame_extended",
            FrameType::SameLocalsOneStackItem => "same_locals_1_stack_item_frame",
            FrameType::SameLocalsOneStackItemExtended => "same_locals_1_stack_item_frame_extended",
            FrameType::Chop(_) => "chop_frame",
            FrameType::Append(_) => "append_frame",
            FrameType::Full => "full_frame",
        })
    }
}
