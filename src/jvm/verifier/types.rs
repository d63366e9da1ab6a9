use super::{FrameCache, Marker};
use crate::jvm::class_file::{ClassConstants, ConstantPoolOverflow, VerificationTypeInfo};
use crate::jvm::{BaseType, BinaryName, FieldType, Name, VerifierErrorKind};
use crate::util::Width;
use std::fmt;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType {
    /// Unusable slot
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis(Marker),

    /// Object type (including arrays, which are named by their descriptor)
    Object(BinaryName),

    /// State of an object after `new` has been called but `<init>` has not
    ///
    /// `offset` is the offset of the `new` instruction from the start of the method body.
    Uninitialized { offset: u16, marker: Marker },
}

impl VerificationType {
    /// Is this a reference type (including `null` and uninitialized objects)?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis(_)
            | VerificationType::Object(_)
            | VerificationType::Uninitialized { .. } => true,
        }
    }

    /// Marker, if this is an uninitialized type
    pub fn marker(&self) -> Option<&Marker> {
        match self {
            VerificationType::UninitializedThis(marker)
            | VerificationType::Uninitialized { marker, .. } => Some(marker),
            _ => None,
        }
    }

    /// Is this the same copy of an uninitialized value as `other`?
    ///
    /// This is always `false` for initialized types, even if they are equal.
    pub fn is_same_instance(&self, other: &VerificationType) -> bool {
        match (self.marker(), other.marker()) {
            (Some(marker1), Some(marker2)) => marker1.is_same_instance(marker2),
            _ => false,
        }
    }

    /// Copy the type
    ///
    /// Initialized types are copied by value. Uninitialized types go through the cache, so that
    /// all copies made inside one frame duplication agree on a single new instance.
    pub fn duplicate(&self, cache: &mut FrameCache) -> VerificationType {
        match self {
            VerificationType::UninitializedThis(marker) => {
                VerificationType::UninitializedThis(cache.duplicate_marker(marker))
            }
            VerificationType::Uninitialized { offset, marker } => VerificationType::Uninitialized {
                offset: *offset,
                marker: cache.duplicate_marker(marker),
            },
            other => other.clone(),
        }
    }

    /// Type of the elements of an array type
    ///
    /// `null` is treated as an array of `null`, matching what `aaload` on a `null` produces.
    pub fn element_type(&self) -> Result<VerificationType, VerifierErrorKind> {
        match self {
            VerificationType::Null => Ok(VerificationType::Null),
            VerificationType::Object(name) => name
                .array_element_type()
                .map(VerificationType::from)
                .ok_or_else(|| VerifierErrorKind::NotArrayType(self.clone())),
            _ => Err(VerifierErrorKind::NotArrayType(self.clone())),
        }
    }

    /// Resolve the type into its serializable form
    pub fn into_serializable(
        &self,
        constants: &mut impl ClassConstants,
    ) -> Result<VerificationTypeInfo, ConstantPoolOverflow> {
        Ok(match self {
            VerificationType::Top => VerificationTypeInfo::Top,
            VerificationType::Integer => VerificationTypeInfo::Integer,
            VerificationType::Float => VerificationTypeInfo::Float,
            VerificationType::Double => VerificationTypeInfo::Double,
            VerificationType::Long => VerificationTypeInfo::Long,
            VerificationType::Null => VerificationTypeInfo::Null,
            VerificationType::UninitializedThis(_) => VerificationTypeInfo::UninitializedThis,
            VerificationType::Object(name) => {
                VerificationTypeInfo::Object(constants.class_constant(name)?)
            }
            VerificationType::Uninitialized { offset, .. } => {
                VerificationTypeInfo::Uninitialized(*offset)
            }
        })
    }
}

impl Width for VerificationType {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl From<FieldType> for VerificationType {
    fn from(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(name) => VerificationType::Object(name),
        }
    }
}

/// Renders in the same syntax that frame listings are written in
impl fmt::Display for VerificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("I"),
            VerificationType::Float => f.write_str("F"),
            VerificationType::Double => f.write_str("D"),
            VerificationType::Long => f.write_str("J"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis(_) => f.write_str("this"),
            VerificationType::Object(name) if name.is_array() => f.write_str(name.as_str()),
            VerificationType::Object(name) => write!(f, "L{};", name.as_str()),
            VerificationType::Uninitialized { offset, .. } => write!(f, "new@{}", offset),
        }
    }
}
