//! Text format for frames
//!
//! A listing has one frame per line, written as `PC | LOCALS | STACK`. Blank lines and lines
//! starting with `#` are ignored. The first frame is the frame on method entry and has `entry`
//! in place of its offset. Several lines may have the same offset: each line is then one edge
//! into that offset.
//!
//! Types are separated by whitespace and are written as field descriptors (`I`, `J`,
//! `Ljava/lang/String;`, `[D`, etc.) or as one of:
//!
//!   - `top` for an unusable slot
//!   - `null` for the type of `null`
//!   - `this` for the uninitialized `this` of a constructor
//!   - `new@OFFSET` for an object created at `OFFSET` but not yet initialized
//!   - `-` for an unused local slot (including the second slot of every `J` and `D`)
//!
//! ```text
//! # static Number pick(boolean flag, long value)
//! entry | I J -   |
//! 7     | I J -   |
//! 11    | I J -   | Ljava/lang/Integer;
//! 11    | I J -   | Ljava/lang/Long;
//! ```

use crate::jvm::class_file::StackMapFrame;
use crate::jvm::verifier::{Frame, Marker, MarkerGenerator, StackMapRecord, VerificationType};
use crate::jvm::{Error, FieldType, ParseDescriptor};
use crate::util::Width;
use std::collections::HashMap;

/// Frames read from a listing
#[derive(Debug)]
pub struct Listing {
    /// Frame on method entry
    pub entry: Frame,

    /// Other frames, in the order they were listed
    pub frames: Vec<Frame>,
}

/// Parse a listing
///
/// Markers for uninitialized types come from `markers`: all `new@N` with the same `N` share
/// one origin, as do all `this`.
pub fn parse_listing(source: &str, markers: &mut MarkerGenerator) -> Result<Listing, Error> {
    let mut parser = LineParser {
        markers,
        this_marker: None,
        new_markers: HashMap::new(),
    };

    let mut entry = None;
    let mut frames = vec![];
    for (line_idx, line) in source.lines().enumerate() {
        let line_no = line_idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let frame = parser
            .parse_line(line, entry.is_none())
            .map_err(|msg| Error::BadInput(line_no, msg))??;
        if entry.is_none() {
            entry = Some(frame);
        } else {
            frames.push(frame);
        }
    }

    match entry {
        Some(entry) => Ok(Listing { entry, frames }),
        None => Err(Error::BadInput(0, String::from("Listing has no entry frame"))),
    }
}

struct LineParser<'m> {
    markers: &'m mut MarkerGenerator,
    this_marker: Option<Marker>,
    new_markers: HashMap<u16, Marker>,
}

impl<'m> LineParser<'m> {
    /// Parse one frame
    ///
    /// Malformed text is reported as a message, while frames that can't be built are reported
    /// as errors at their offset.
    fn parse_line(&mut self, line: &str, is_entry: bool) -> Result<Result<Frame, Error>, String> {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        let (pc, locals, stack) = match fields.as_slice() {
            [pc, locals] => (*pc, *locals, ""),
            [pc, locals, stack] => (*pc, *locals, *stack),
            _ => return Err(String::from("Expected `PC | LOCALS | STACK`")),
        };

        let pc = match (is_entry, pc) {
            (true, "entry") => Frame::PLACEHOLDER_PC,
            (true, other) => return Err(format!("Expected `entry` frame, but got '{}'", other)),
            (false, "entry") => return Err(String::from("Only the first frame is `entry`")),
            (false, other) => match other.parse::<u16>() {
                Ok(pc) => i32::from(pc),
                Err(_) => return Err(format!("Invalid offset '{}'", other)),
            },
        };

        let mut local_types = vec![];
        let mut expect_hole = false;
        for token in locals.split_whitespace() {
            let local = self.parse_type(token)?;
            if expect_hole && local.is_some() {
                let slot = local_types.len();
                return Err(format!("Expected `-` in slot {} after a wide value", slot));
            }
            expect_hole = matches!(&local, Some(t) if t.width() == 2);
            local_types.push(local);
        }
        if expect_hole {
            return Err(String::from("Missing `-` after a wide value"));
        }

        let mut stack_types = vec![];
        for token in stack.split_whitespace() {
            match self.parse_type(token)? {
                Some(typ) => stack_types.push(typ),
                None => return Err(String::from("Unused slots (`-`) cannot be on the stack")),
            }
        }

        Ok(Frame::from_snapshot(pc, local_types, stack_types).map_err(|kind| kind.at(pc)))
    }

    /// Parse a type, where `None` is an unused slot
    fn parse_type(&mut self, token: &str) -> Result<Option<VerificationType>, String> {
        let typ = match token {
            "-" => return Ok(None),
            "top" => VerificationType::Top,
            "null" => VerificationType::Null,
            "this" => {
                let markers = &mut self.markers;
                let marker = *self.this_marker.get_or_insert_with(|| markers.fresh_marker());
                VerificationType::UninitializedThis(marker)
            }
            _ => {
                if let Some(offset) = token.strip_prefix("new@") {
                    let offset: u16 = offset
                        .parse()
                        .map_err(|_| format!("Invalid offset in '{}'", token))?;
                    let markers = &mut self.markers;
                    let marker = *self
                        .new_markers
                        .entry(offset)
                        .or_insert_with(|| markers.fresh_marker());
                    VerificationType::Uninitialized { offset, marker }
                } else {
                    let field_type = FieldType::parse(token)
                        .map_err(|err| format!("Invalid type '{}': {}", token, err))?;
                    VerificationType::from(field_type)
                }
            }
        };
        Ok(Some(typ))
    }
}

/// Render a stack map record on one line
///
/// The line has the offset, the frame type (with its tag), the offset delta, and then whatever
/// types the frame lists.
pub fn render_record(record: &StackMapRecord) -> String {
    let frame = &record.frame;
    let payload = match frame {
        StackMapFrame::SameLocalsNoStack { .. } => String::new(),
        StackMapFrame::SameLocalsOneStack { stack, .. } => format!(" stack=[{}]", stack),
        StackMapFrame::ChopLocalsNoStack { chopped_k, .. } => format!(" chop={}", chopped_k),
        StackMapFrame::AppendLocalsNoStack { locals, .. } => {
            format!(" append=[{}]", render_types(locals))
        }
        StackMapFrame::Full { locals, stack, .. } => format!(
            " locals=[{}] stack=[{}]",
            render_types(locals),
            render_types(stack)
        ),
    };
    format!(
        "{:>5}  {} ({}) delta={}{}",
        record.pc,
        frame.frame_type(),
        frame.tag(),
        frame.offset_delta(),
        payload
    )
}

fn render_types(types: &[VerificationType]) -> String {
    types
        .iter()
        .map(VerificationType::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::BinaryName;
    use VerificationType::*;

    #[test]
    fn parse_frames() {
        let mut markers = MarkerGenerator::new();
        let listing = parse_listing(
            "
            # comment
            entry | this I J - |

            3 | this I J - | new@3 new@3 Ljava/lang/String;
            9 | I - - [Z | null
            ",
            &mut markers,
        )
        .unwrap();

        assert!(listing.entry.is_placeholder());
        assert!(matches!(listing.entry.local(0), Some(UninitializedThis(_))));
        assert_eq!(listing.entry.local(2), Some(&Long));
        assert_eq!(listing.frames.len(), 2);

        let frame3 = &listing.frames[0];
        assert_eq!(frame3.pc, 3);
        assert_eq!(frame3.local(0), listing.entry.local(0));
        assert!(matches!(
            frame3.stack(),
            [Uninitialized { offset: 3, .. }, Uninitialized { offset: 3, .. }, Object(_)]
        ));
        assert_eq!(frame3.stack()[0], frame3.stack()[1]);
        assert_eq!(frame3.stack()[2], Object(BinaryName::STRING));

        let frame9 = &listing.frames[1];
        assert_eq!(frame9.number_of_locals(), 2);
        assert_eq!(frame9.stack(), &[Null]);
    }

    #[test]
    fn malformed_listings() {
        let bad = |source: &str| {
            let mut markers = MarkerGenerator::new();
            match parse_listing(source, &mut markers) {
                Err(Error::BadInput(line, _)) => line,
                other => panic!("Expected bad input, got {:?}", other),
            }
        };

        assert_eq!(bad(""), 0);
        assert_eq!(bad("3 | I |"), 1);
        assert_eq!(bad("entry | I |\nentry | I |"), 2);
        assert_eq!(bad("entry | I |\n-3 | I |"), 2);
        assert_eq!(bad("entry | J I |"), 1);
        assert_eq!(bad("entry | D |"), 1);
        assert_eq!(bad("entry | Q |"), 1);
        assert_eq!(bad("entry | I | -"), 1);
        assert_eq!(bad("entry | new@x |"), 1);
        assert_eq!(bad("entry"), 1);
        assert_eq!(bad("entry | | | "), 1);
    }

    #[test]
    fn unbuildable_frames() {
        let mut markers = MarkerGenerator::new();
        assert!(matches!(
            parse_listing("entry | |\n5 | | top", &mut markers),
            Err(Error::VerifierError { pc: 5, .. })
        ));
    }

    #[test]
    fn rendered_records() {
        let record = StackMapRecord {
            pc: 12,
            frame: StackMapFrame::Full {
                offset_delta: 4,
                locals: vec![Integer, Object(BinaryName::STRING)],
                stack: vec![Long],
            },
        };
        assert_eq!(
            render_record(&record),
            "   12  full_frame (255) delta=4 locals=[I Ljava/lang/String;] stack=[J]"
        );

        let record = StackMapRecord {
            pc: 3,
            frame: StackMapFrame::ChopLocalsNoStack {
                offset_delta: 3,
                chopped_k: 2,
            },
        };
        assert_eq!(render_record(&record), "    3  chop_frame (249) delta=3 chop=2");

        let record = StackMapRecord {
            pc: 80,
            frame: StackMapFrame::SameLocalsNoStack { offset_delta: 70 },
        };
        assert_eq!(render_record(&record), "   80  same_frame_extended (251) delta=70");

        let record = StackMapRecord {
            pc: 9,
            frame: StackMapFrame::AppendLocalsNoStack {
                offset_delta: 9,
                locals: vec![Long, Null],
            },
        };
        assert_eq!(
            render_record(&record),
            "    9  append_frame (253) delta=9 append=[J null]"
        );
    }
}
