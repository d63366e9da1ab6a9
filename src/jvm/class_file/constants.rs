use super::Serialize;
use crate::jvm::{BinaryName, Name};
use byteorder::WriteBytesExt;
use std::collections::HashMap;

/// Constants pool holding the class constants that stack map frames refer to
///
/// Constants are deduplicated. Indexing starts at 1, as in a class file.
#[derive(Debug)]
pub struct ConstantsPool {
    constants: Vec<Constant>,
    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<BinaryName, ClassConstantIndex>,
}

/// Anything that can hand out class constants
///
/// Stack map frames only ever need class constants (for object verification types).
pub trait ClassConstants {
    /// Get or insert the class constant for a class (or array) name
    fn class_constant(
        &mut self,
        name: &BinaryName,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow>;
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: vec![],
            utf8s: HashMap::new(),
            classes: HashMap::new(),
        }
    }

    /// Number of constants in the pool
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    /// Constant at an index
    pub fn get(&self, index: ConstantIndex) -> Option<&Constant> {
        let offset = usize::from(index.0).checked_sub(1)?;
        self.constants.get(offset)
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65535 and indexing starts at 1.
    fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, ConstantPoolOverflow> {
        let offset = self.constants.len() + 1;
        match u16::try_from(offset) {
            Ok(offset) if offset < u16::MAX => {
                self.constants.push(constant);
                Ok(ConstantIndex(offset))
            }
            _ => Err(ConstantPoolOverflow { constant }),
        }
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let owned = utf8.to_owned();
            let idx = Utf8ConstantIndex(self.push_constant(Constant::Utf8(owned.clone()))?);
            self.utf8s.insert(owned, idx);
            Ok(idx)
        }
    }

    /// Get or insert a class constant from the constant pool
    ///
    /// Array classes are named by their descriptor.
    pub fn get_class(&mut self, name: &BinaryName) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        if let Some(idx) = self.classes.get(name) {
            Ok(*idx)
        } else {
            let utf8 = self.get_utf8(name.as_str())?;
            let idx = ClassConstantIndex(self.push_constant(Constant::Class(utf8))?);
            self.classes.insert(name.clone(), idx);
            Ok(idx)
        }
    }
}

impl Default for ConstantsPool {
    fn default() -> ConstantsPool {
        ConstantsPool::new()
    }
}

impl ClassConstants for ConstantsPool {
    fn class_constant(
        &mut self,
        name: &BinaryName,
    ) -> Result<ClassConstantIndex, ConstantPoolOverflow> {
        self.get_class(name)
    }
}

/// Serializes as the `constant_pool_count` followed by the constants
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        // Constants are only ever pushed while there is room, so this cannot truncate
        ((self.constants.len() + 1) as u16).serialize(writer)?;
        for constant in &self.constants {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

/// The constant pool has no room left
#[derive(Debug)]
pub struct ConstantPoolOverflow {
    pub constant: Constant,
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Class or interface (or array type)
    Class(Utf8ConstantIndex),

    /// UTF-8 string (encoded in the class file as modified UTF-8)
    Utf8(String),
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                encode_modified_utf8(string).serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        }
        Ok(())
    }
}

/// Encode a string using Java's modified UTF-8 format
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4.7
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // `\u{0000}` takes two bytes
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters are written as surrogate pairs
            _ => {
                let code = code - 0x10000;
                for surrogate in [0xD800 | (code >> 10), 0xDC00 | (code & 0x3FF)] {
                    buffer.push((surrogate >> 12 & 0x0F) as u8 | 0b1110_0000);
                    buffer.push((surrogate >> 6 & 0x3F) as u8 | 0b1000_0000);
                    buffer.push((surrogate & 0x3F) as u8 | 0b1000_0000);
                }
            }
        }
    }
    buffer
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

impl From<ClassConstantIndex> for ConstantIndex {
    fn from(index: ClassConstantIndex) -> ConstantIndex {
        index.0
    }
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for Utf8ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Serialize for ClassConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
