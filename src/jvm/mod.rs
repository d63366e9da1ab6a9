//! Stack map frames for JVM methods
//!
//! ### Simple example
//!
//! Consider the following static method:
//!
//! ```java,ignore,no_run
//! static Number pick(boolean flag, long value) {
//!     Number result = flag ? Integer.valueOf(1) : Long.valueOf(value);
//!     return result;
//! }
//! ```
//!
//! The conditional expression joins two edges with different values on the stack. Computing the
//! `StackMapTable` attribute for the method can be done as follows:
//!
//! ```
//! use stackmap::jvm::class_graph::*;
//! use stackmap::jvm::class_file::{ConstantsPool, Serialize};
//! use stackmap::jvm::verifier::*;
//! use stackmap::jvm::*;
//!
//! # fn compute_table() -> Result<(), Error> {
//! // Setup the class graph, add in Java standard library types
//! let class_graph_arenas = ClassGraphArenas::new();
//! let class_graph = ClassGraph::new(&class_graph_arenas);
//! class_graph.insert_java_library_types();
//!
//! // Frame on entry to the method
//! let class = BinaryName::from_string(String::from("com/acme/Picker")).unwrap();
//! let descriptor = MethodDescriptor::parse("(ZJ)Ljava/lang/Number;").map_err(Error::IoError)?;
//! let mut markers = MarkerGenerator::new();
//! let entry = Frame::method_entry(&class, &descriptor, true, false, &mut markers);
//! let mut table = FrameTable::new(entry.duplicate(&mut markers));
//!
//! // Edge into the `else` branch
//! let mut else_branch = entry.duplicate(&mut markers);
//! else_branch.pc = 7;
//! table.record(else_branch, &class_graph)?;
//!
//! // Edges from both branches into the join point
//! for boxed in [BinaryName::INTEGER, BinaryName::LONG] {
//!     let mut join = entry.duplicate(&mut markers);
//!     join.pc = 11;
//!     join.add_stack_item(Some(VerificationType::Object(boxed)))
//!         .map_err(|kind| kind.at(11))?;
//!     table.record(join, &class_graph)?;
//! }
//!
//! // Encode the frames
//! let records = table.stack_map_records()?;
//! let mut constants = ConstantsPool::new();
//! let stack_map_table = stack_map_table(&records, &mut constants)?;
//! let mut bytes: Vec<u8> = vec![];
//! stack_map_table.serialize(&mut bytes).map_err(Error::IoError)?;
//! # Ok(())
//! # }
//! ```

mod access_flags;
pub mod class_file;
pub mod class_graph;
mod descriptors;
mod errors;
mod names;
pub mod verifier;

pub use access_flags::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
