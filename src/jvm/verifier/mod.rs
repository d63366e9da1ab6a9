//! Stack map frames and their compression
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. In other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`Frame`]) and the set of stack map frames for all possible jump
//! targets in a method is the _stack map table_. The "types" used (represented using
//! [`VerificationType`]) are slightly augmented to take into account initialization and null.
//!
//! When an offset can be reached from multiple locations, the frames flowing along each edge are
//! merged (see [`Frame::merge`] and [`FrameTable`]).
//!
//! Since most frames only differ slightly from the frame before them, the stack map table stores
//! each frame relative to the previous one, using the most compact of a handful of encodings
//! ([`FrameType`]). Picking that encoding means comparing the locals of consecutive frames
//! ([`Frame::number_of_different_locals`]).
//!
//! Uninitialized objects (created with `new` but not yet passed to `<init>`) need to be tracked
//! by identity: see [`Marker`].

mod diff;
mod frame;
mod frame_type;
mod marker;
mod merge;
mod stack_map;
mod types;

pub use diff::*;
pub use frame::{Frame, FrameCache};
pub use frame_type::*;
pub use marker::*;
pub use stack_map::*;
pub use types::*;
