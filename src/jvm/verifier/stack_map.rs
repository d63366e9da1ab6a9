use super::{Frame, FrameType, VerificationType};
use crate::jvm::class_file::{ClassConstants, ConstantPoolOverflow, StackMapFrame, StackMapTable};
use crate::jvm::class_graph::CommonSuperType;
use crate::jvm::Error;
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

/// Stack map frame for a program point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapRecord {
    /// Offset of the frame in the method body
    pub pc: i32,

    /// Frame, encoded relative to the frame before it
    pub frame: StackMapFrame<VerificationType>,
}

impl Frame {
    /// Encode the frame relative to the frame before it
    pub fn stack_map_frame(
        &self,
        previous: &Frame,
    ) -> Result<StackMapFrame<VerificationType>, Error> {
        let offset_delta = self.offset_delta(Some(previous));
        let offset_delta = u16::try_from(offset_delta).map_err(|_| Error::OffsetDeltaOverflow {
            pc: self.pc,
            offset_delta,
        })?;

        let frame = match self.frame_type(Some(previous)) {
            FrameType::Same | FrameType::SameExtended => {
                StackMapFrame::SameLocalsNoStack { offset_delta }
            }
            FrameType::SameLocalsOneStackItem | FrameType::SameLocalsOneStackItemExtended => {
                match self.stack.first() {
                    Some(stack) => StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: stack.clone(),
                    },
                    None => self.full_stack_map_frame(offset_delta),
                }
            }
            FrameType::Chop(chopped_k) => StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            },
            FrameType::Append(added_k) => {
                match self.index_of_different_locals(usize::from(added_k)) {
                    Some(first_added) => StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: super::frame::verification_locals(&self.locals()[first_added..]),
                    },
                    None => self.full_stack_map_frame(offset_delta),
                }
            }
            FrameType::Full => self.full_stack_map_frame(offset_delta),
        };
        Ok(frame)
    }

    /// Encode the frame without reference to any other frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame<VerificationType> {
        StackMapFrame::Full {
            offset_delta,
            locals: self.verification_locals(),
            stack: self.stack.clone(),
        }
    }
}

/// Encode frames (in increasing offset order) into stack map records
///
/// The entry frame is implicit in a method, so it only serves as the predecessor of the first
/// frame and does not get a record of its own.
pub fn stack_map_records<'f>(
    entry: &'f Frame,
    frames: impl IntoIterator<Item = &'f Frame>,
) -> Result<Vec<StackMapRecord>, Error> {
    let mut records = vec![];
    let mut previous = entry;
    for frame in frames {
        if !previous.is_placeholder() && frame.pc <= previous.pc {
            return Err(Error::UnorderedFrame {
                pc: frame.pc,
                previous_pc: previous.pc,
            });
        }
        let stack_map_frame = frame.stack_map_frame(previous)?;
        log::debug!(
            "Stack map frame at {}: {:?}",
            frame.pc,
            stack_map_frame.frame_type()
        );
        records.push(StackMapRecord {
            pc: frame.pc,
            frame: stack_map_frame,
        });
        previous = frame;
    }
    Ok(records)
}

/// Resolve records into a `StackMapTable` attribute
pub fn stack_map_table(
    records: &[StackMapRecord],
    constants: &mut impl ClassConstants,
) -> Result<StackMapTable, ConstantPoolOverflow> {
    let frames = records
        .iter()
        .map(|record| record.frame.try_map(|t| t.into_serializable(&mut *constants)))
        .collect::<Result<_, _>>()?;
    Ok(StackMapTable(frames))
}

/// Frames of a method, keyed by offset
///
/// Each control flow edge into an offset is recorded separately, and the frames from all of the
/// edges into the same offset are merged.
pub struct FrameTable {
    entry: Frame,
    frames: BTreeMap<i32, Frame>,
}

impl FrameTable {
    /// Start a table from the frame on method entry
    pub fn new(entry: Frame) -> FrameTable {
        FrameTable {
            entry,
            frames: BTreeMap::new(),
        }
    }

    pub fn entry_frame(&self) -> &Frame {
        &self.entry
    }

    /// Frame recorded at an offset
    pub fn frame_at(&self, pc: i32) -> Option<&Frame> {
        self.frames.get(&pc)
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Record the frame flowing along an edge into `frame.pc`
    ///
    /// Placeholder frames carry no information and are ignored.
    pub fn record(
        &mut self,
        frame: Frame,
        super_types: &impl CommonSuperType,
    ) -> Result<(), Error> {
        let pc = frame.pc;
        if frame.is_placeholder() {
            return Ok(());
        }

        let merged = match self.frames.get(&pc) {
            Some(existing) => existing
                .clone()
                .merge(frame, super_types)
                .map_err(|kind| kind.at(pc))?,
            None => {
                // The frame after this one now has a different predecessor
                frame.reset_diff_cache();
                if let Some((_, next)) = self.frames.range((Excluded(pc), Unbounded)).next() {
                    next.reset_diff_cache();
                }
                frame
            }
        };
        self.frames.insert(pc, merged);
        Ok(())
    }

    /// Encode all the recorded frames
    pub fn stack_map_records(&self) -> Result<Vec<StackMapRecord>, Error> {
        stack_map_records(&self.entry, self.frames.values())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{ConstantsPool, Serialize};
    use crate::jvm::verifier::MarkerGenerator;
    use crate::jvm::{BinaryName, MethodDescriptor, Name, ParseDescriptor};
    use VerificationType::*;

    fn frame<const N: usize, const M: usize>(
        pc: i32,
        locals: [Option<VerificationType>; N],
        stack: [VerificationType; M],
    ) -> Frame {
        Frame::from_snapshot(pc, Vec::from(locals), Vec::from(stack)).unwrap()
    }

    fn no_super_types(_: &BinaryName, _: &BinaryName) -> Option<BinaryName> {
        None
    }

    #[test]
    fn first_frame_is_relative_to_entry() {
        let mut markers = MarkerGenerator::new();
        let desc = MethodDescriptor::parse("(I)I").unwrap();
        let class = BinaryName::from_string(String::from("me/Foo")).unwrap();
        let entry = Frame::method_entry(&class, &desc, true, false, &mut markers);

        let records = stack_map_records(&entry, &[frame(7, [Some(Integer)], [])]).unwrap();
        assert_eq!(
            records,
            vec![StackMapRecord {
                pc: 7,
                frame: StackMapFrame::SameLocalsNoStack { offset_delta: 7 }
            }]
        );
    }

    #[test]
    fn frames_relative_to_each_other() {
        let entry = frame(-1, [Some(Integer)], []);
        let frames = [
            frame(4, [Some(Integer), Some(Long), None], []),
            frame(9, [Some(Integer), Some(Long), None], [Float]),
            frame(100, [Some(Integer)], []),
            frame(101, [Some(Float)], [Integer, Integer]),
        ];

        let records = stack_map_records(&entry, &frames).unwrap();
        let frames: Vec<_> = records.iter().map(|r| r.frame.clone()).collect();
        assert_eq!(
            frames,
            vec![
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta: 4,
                    locals: vec![Long]
                },
                StackMapFrame::SameLocalsOneStack {
                    offset_delta: 4,
                    stack: Float
                },
                StackMapFrame::ChopLocalsNoStack {
                    offset_delta: 90,
                    chopped_k: 1
                },
                StackMapFrame::Full {
                    offset_delta: 0,
                    locals: vec![Float],
                    stack: vec![Integer, Integer]
                },
            ]
        );
    }

    #[test]
    fn unordered_frames() {
        let entry = Frame::placeholder();
        let frames = [frame(10, [], []), frame(10, [], [])];
        assert!(matches!(
            stack_map_records(&entry, &frames),
            Err(Error::UnorderedFrame {
                pc: 10,
                previous_pc: 10
            })
        ));
    }

    #[test]
    fn offset_delta_overflow() {
        let entry = Frame::placeholder();
        let frames = [frame(70000, [], [])];
        assert!(matches!(
            stack_map_records(&entry, &frames),
            Err(Error::OffsetDeltaOverflow { pc: 70000, .. })
        ));
    }

    #[test]
    fn table_merges_edges() {
        let super_types = |_: &BinaryName, _: &BinaryName| Some(BinaryName::NUMBER);
        let integer = Object(BinaryName::INTEGER);
        let long = Object(BinaryName::LONG);

        let mut table = FrameTable::new(frame(-1, [Some(Integer)], []));
        table
            .record(frame(12, [Some(Integer)], [integer.clone()]), &super_types)
            .unwrap();
        table.record(frame(3, [Some(Integer)], []), &super_types).unwrap();
        table
            .record(frame(12, [Some(Integer)], [long]), &super_types)
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.frame_at(12).unwrap().stack(),
            &[Object(BinaryName::NUMBER)]
        );

        let records = table.stack_map_records().unwrap();
        let pcs: Vec<i32> = records.iter().map(|r| r.pc).collect();
        assert_eq!(pcs, vec![3, 12]);
        assert_eq!(
            records[1].frame,
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 8,
                stack: Object(BinaryName::NUMBER)
            }
        );

        let bad = table.record(frame(12, [Some(Integer)], []), &no_super_types);
        assert!(matches!(bad, Err(Error::VerifierError { pc: 12, .. })));
    }

    #[test]
    fn resolved_table() {
        let entry = Frame::placeholder();
        let frames = [
            frame(2, [Some(Object(BinaryName::STRING))], []),
            frame(5, [Some(Object(BinaryName::STRING))], [Object(BinaryName::STRING)]),
        ];
        let records = stack_map_records(&entry, &frames).unwrap();

        let mut pool = ConstantsPool::new();
        let table = stack_map_table(&records, &mut pool).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(
            table.to_bytes().unwrap(),
            vec![0, 2, 253 - 1, 0, 2, 7, 0, 2, 64 + 2, 7, 0, 2]
        );
    }
}
