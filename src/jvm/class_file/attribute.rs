use super::{ClassConstantIndex, Serialize};
use crate::jvm::verifier::FrameType;
use byteorder::WriteBytesExt;
use std::io;

/// [`StackMapTable` attribute][0] of a method's `Code`
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.4
#[derive(Debug)]
pub struct StackMapTable(pub Vec<StackMapFrame<VerificationTypeInfo>>);

impl StackMapTable {
    pub const NAME: &'static str = "StackMapTable";
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        self.0.serialize(writer)
    }
}

/// Verification type, as it is written in a class file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationTypeInfo {
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,
    UninitializedThis,
    Object(ClassConstantIndex),

    /// Offset of the `new` instruction
    Uninitialized(u16),
}

impl Serialize for VerificationTypeInfo {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            VerificationTypeInfo::Top => 0u8.serialize(writer)?,
            VerificationTypeInfo::Integer => 1u8.serialize(writer)?,
            VerificationTypeInfo::Float => 2u8.serialize(writer)?,
            VerificationTypeInfo::Double => 3u8.serialize(writer)?,
            VerificationTypeInfo::Long => 4u8.serialize(writer)?,
            VerificationTypeInfo::Null => 5u8.serialize(writer)?,
            VerificationTypeInfo::UninitializedThis => 6u8.serialize(writer)?,
            VerificationTypeInfo::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationTypeInfo::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

/// One entry in the stack map table
///
/// Short and extended forms share a variant: which one gets written depends only on whether the
/// offset delta fits in the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame<V> {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack { offset_delta: u16, stack: V },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack { offset_delta: u16, locals: Vec<V> },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<V>,
        stack: Vec<V>,
    },
}

impl<V> StackMapFrame<V> {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    /// Which of the encodings this frame gets written with
    pub fn frame_type(&self) -> FrameType {
        let is_short = i32::from(self.offset_delta()) <= FrameType::MAX_SHORT_OFFSET_DELTA;
        match self {
            StackMapFrame::SameLocalsNoStack { .. } if is_short => FrameType::Same,
            StackMapFrame::SameLocalsNoStack { .. } => FrameType::SameExtended,
            StackMapFrame::SameLocalsOneStack { .. } if is_short => {
                FrameType::SameLocalsOneStackItem
            }
            StackMapFrame::SameLocalsOneStack { .. } => FrameType::SameLocalsOneStackItemExtended,
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => FrameType::Chop(*chopped_k),
            StackMapFrame::AppendLocalsNoStack { locals, .. } => {
                FrameType::Append(u8::try_from(locals.len()).unwrap_or(u8::MAX))
            }
            StackMapFrame::Full { .. } => FrameType::Full,
        }
    }

    /// Tag byte the frame starts with
    pub fn tag(&self) -> u8 {
        match self.frame_type() {
            FrameType::Same => self.offset_delta() as u8,
            FrameType::SameLocalsOneStackItem => self.offset_delta() as u8 + 64,
            FrameType::SameLocalsOneStackItemExtended => 247,
            FrameType::Chop(k) => 251u8.wrapping_sub(k),
            FrameType::SameExtended => 251,
            FrameType::Append(k) => 251u8.wrapping_add(k),
            FrameType::Full => 255,
        }
    }

    /// Convert the verification types of the frame
    pub fn try_map<W, E>(
        &self,
        mut map: impl FnMut(&V) -> Result<W, E>,
    ) -> Result<StackMapFrame<W>, E> {
        Ok(match self {
            StackMapFrame::SameLocalsNoStack { offset_delta } => StackMapFrame::SameLocalsNoStack {
                offset_delta: *offset_delta,
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => StackMapFrame::SameLocalsOneStack {
                offset_delta: *offset_delta,
                stack: map(stack)?,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => StackMapFrame::ChopLocalsNoStack {
                offset_delta: *offset_delta,
                chopped_k: *chopped_k,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => StackMapFrame::AppendLocalsNoStack {
                offset_delta: *offset_delta,
                locals: locals.iter().map(&mut map).collect::<Result<_, E>>()?,
            },
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => StackMapFrame::Full {
                offset_delta: *offset_delta,
                locals: locals.iter().map(&mut map).collect::<Result<_, E>>()?,
                stack: stack.iter().map(&mut map).collect::<Result<_, E>>()?,
            },
        })
    }
}

fn invalid_frame(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

impl Serialize for StackMapFrame<VerificationTypeInfo> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            StackMapFrame::ChopLocalsNoStack { chopped_k, .. } if !(1..=3).contains(chopped_k) => {
                return Err(invalid_frame("chop frames remove 1-3 locals"));
            }
            StackMapFrame::AppendLocalsNoStack { locals, .. } if !(1..=3).contains(&locals.len()) => {
                return Err(invalid_frame("append frames add 1-3 locals"));
            }
            _ => (),
        }

        let tag = self.tag();
        tag.serialize(writer)?;
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if tag == 251 {
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if tag == 247 {
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack { offset_delta, .. } => {
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}
