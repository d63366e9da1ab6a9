use super::class_file::ConstantPoolOverflow;
use super::verifier::VerificationType;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// A frame operation failed (indicates a bug in whatever produced the frames)
    VerifierError {
        pc: i32,
        kind: VerifierErrorKind,
    },

    /// Offset between two frames is negative or does not fit in a `u16`
    OffsetDeltaOverflow {
        pc: i32,
        offset_delta: i32,
    },

    /// Frames are not in increasing program counter order
    UnorderedFrame {
        pc: i32,
        previous_pc: i32,
    },

    /// More classes were referenced than fit in a constant pool
    ConstantPoolOverflow(ConstantPoolOverflow),

    /// Malformed frame listing (line number and message)
    BadInput(usize, String),

    /// Invalid command line argument
    BadArgument(String),
}

#[derive(Debug)]
pub enum VerifierErrorKind {
    /// Tried to push a missing value onto the stack
    AbsentStackItem,

    /// Tried to push `top` onto the stack
    TopOnStack,

    /// A `long` or `double` local is not followed by an unused slot (the slot is given)
    MissingWideHole(usize),

    EmptyStack,
    NotArrayType(VerificationType),

    /// Merged frames have stacks of different depths
    StackDepthMismatch(usize, usize),

    /// Merged frames have types that have no common verification type
    IncompatibleTypes(VerificationType, VerificationType),
}

impl VerifierErrorKind {
    /// Attach the program counter at which the error happened
    pub fn at(self, pc: i32) -> Error {
        Error::VerifierError { pc, kind: self }
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow(overflow)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
