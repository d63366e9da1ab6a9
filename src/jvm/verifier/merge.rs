use super::{Frame, VerificationType};
use crate::jvm::class_graph::CommonSuperType;
use crate::jvm::{BinaryName, VerifierErrorKind};

impl Frame {
    /// Combine the frames of two edges converging on the same offset
    ///
    /// Placeholder frames (not yet reached by any edge) are absorbed. Otherwise, stacks must have
    /// the same depth and are merged entry by entry. Locals are taken from `self` as is: callers
    /// are expected to have already agreed on the locals at the join point.
    pub fn merge(
        self,
        other: Frame,
        super_types: &impl CommonSuperType,
    ) -> Result<Frame, VerifierErrorKind> {
        if other.is_placeholder() {
            return Ok(self);
        }
        if self.is_placeholder() {
            return Ok(other);
        }

        if self.stack.len() != other.stack.len() {
            return Err(VerifierErrorKind::StackDepthMismatch(
                self.stack.len(),
                other.stack.len(),
            ));
        }

        let mut merged = self;
        for (item, other_item) in merged.stack.iter_mut().zip(other.stack) {
            if let Some(merged_item) = merge_types(item, other_item, super_types)? {
                *item = merged_item;
            }
        }
        log::debug!("Merged frames at {}: {:?}", merged.pc, merged.stack);
        Ok(merged)
    }
}

/// Merge two types, returning `None` when the first type already covers both
fn merge_types(
    t1: &VerificationType,
    t2: VerificationType,
    super_types: &impl CommonSuperType,
) -> Result<Option<VerificationType>, VerifierErrorKind> {
    if *t1 == t2 {
        return Ok(None);
    }
    match (t1, &t2) {
        (VerificationType::Object(_), VerificationType::Null) => Ok(None),
        (VerificationType::Null, VerificationType::Object(_)) => Ok(Some(t2)),
        (VerificationType::Object(name1), VerificationType::Object(name2)) => {
            let super_type = super_types
                .common_super_type(name1, name2)
                .unwrap_or(BinaryName::OBJECT);
            Ok(Some(VerificationType::Object(super_type)))
        }
        _ => Err(VerifierErrorKind::IncompatibleTypes(t1.clone(), t2)),
    }
}
