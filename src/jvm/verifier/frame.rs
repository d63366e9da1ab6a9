use super::*;
use crate::jvm::{BinaryName, MethodDescriptor, VerifierErrorKind};
use crate::util::Width;
use std::cell::Cell;
use std::collections::HashMap;

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Local variables are indexed by slot: a `long` or `double` in slot `n` leaves slot `n + 1`
/// empty (`None`). Apart from those holes, `None` is only expected for slots that are unused or
/// have been chopped off the end.
///
/// Frames memoize the number of locals and the locals difference from their predecessor (see
/// [`Frame::number_of_different_locals`]). Every mutating method resets both caches.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Offset of the frame in the method body
    ///
    /// [`Frame::PLACEHOLDER_PC`] marks a frame that no real edge has reached yet (and also the
    /// implicit frame at method entry, which sits right before the first instruction).
    pub pc: i32,

    /// Local variables
    locals: Vec<Option<VerificationType>>,

    /// Types of values on the stack
    pub(super) stack: Vec<VerificationType>,

    /// Does this frame keep the stack of the frame it is duplicated from?
    ///
    /// Code that completes abruptly (eg. `athrow`) followed by a fresh block does not carry its
    /// stack forward.
    pub adopt_stack_shape: bool,

    number_of_locals_cache: Cell<Option<usize>>,
    pub(super) diff_cache: Cell<Option<DiffResult>>,
}

/// Duplication state for exactly one call to [`Frame::duplicate`]
///
/// Maps each uninitialized marker instance of the source frame to the instance used in the copy.
/// A cache must never outlive the duplication it was made for, otherwise unrelated copies would
/// end up sharing instances.
pub struct FrameCache<'m> {
    markers: &'m mut MarkerGenerator,
    duplicates: HashMap<MarkerInstance, Marker>,
}

impl<'m> FrameCache<'m> {
    pub fn new(markers: &'m mut MarkerGenerator) -> FrameCache<'m> {
        FrameCache {
            markers,
            duplicates: HashMap::new(),
        }
    }

    /// Copy of the marker, which is the same for every occurrence of the original instance
    pub fn duplicate_marker(&mut self, marker: &Marker) -> Marker {
        let FrameCache {
            markers,
            duplicates,
        } = self;
        *duplicates
            .entry(marker.instance())
            .or_insert_with(|| markers.fresh_instance(marker))
    }
}

impl Frame {
    pub const PLACEHOLDER_PC: i32 = -1;

    /// Empty frame at the given offset
    pub fn new(pc: i32) -> Frame {
        Frame {
            pc,
            locals: vec![],
            stack: vec![],
            adopt_stack_shape: true,
            number_of_locals_cache: Cell::new(None),
            diff_cache: Cell::new(None),
        }
    }

    /// Frame standing in for a jump target that has not been reached yet
    pub fn placeholder() -> Frame {
        Frame::new(Frame::PLACEHOLDER_PC)
    }

    /// Frame from an already resolved snapshot
    ///
    /// Every wide value must already be followed by its hole.
    pub fn from_snapshot(
        pc: i32,
        locals: Vec<Option<VerificationType>>,
        stack: Vec<VerificationType>,
    ) -> Result<Frame, VerifierErrorKind> {
        for (slot, local) in locals.iter().enumerate() {
            let is_wide = matches!(local, Some(t) if t.width() == 2);
            if is_wide && !matches!(locals.get(slot + 1), Some(None)) {
                return Err(VerifierErrorKind::MissingWideHole(slot + 1));
            }
        }

        let mut frame = Frame::new(pc);
        frame.locals = locals;
        for item in stack {
            frame.add_stack_item(Some(item))?;
        }
        Ok(frame)
    }

    /// Frame on entry to a method
    ///
    /// The initial local variables are just the parameters (including maybe "this"). In a
    /// constructor, `this` starts uninitialized.
    pub fn method_entry(
        class: &BinaryName,
        descriptor: &MethodDescriptor,
        is_static: bool,
        is_constructor: bool,
        markers: &mut MarkerGenerator,
    ) -> Frame {
        let mut frame = Frame::placeholder();
        let mut slot = 0;
        if is_constructor {
            frame.put_local(slot, VerificationType::UninitializedThis(markers.fresh_marker()));
            slot += 1;
        } else if !is_static {
            frame.put_local(slot, VerificationType::Object(class.clone()));
            slot += 1;
        }
        for parameter in &descriptor.parameters {
            let parameter = VerificationType::from(parameter.clone());
            let width = parameter.width();
            frame.put_local(slot, parameter);
            slot += width;
        }
        frame
    }

    /// Is this a placeholder for a frame no edge has reached yet?
    pub fn is_placeholder(&self) -> bool {
        self.pc == Frame::PLACEHOLDER_PC
    }

    pub fn locals(&self) -> &[Option<VerificationType>] {
        &self.locals
    }

    pub fn stack(&self) -> &[VerificationType] {
        &self.stack
    }

    /// Type of the local in a slot (`None` for holes and slots past the end)
    pub fn local(&self, slot: usize) -> Option<&VerificationType> {
        self.locals.get(slot).and_then(Option::as_ref)
    }

    /// Push onto the stack
    ///
    /// A missing item means whatever produced it lost track of the stack, so this fails instead of
    /// pushing a placeholder. `top` is rejected too, since it never appears on a stack.
    pub fn add_stack_item(&mut self, item: Option<VerificationType>) -> Result<(), VerifierErrorKind> {
        match item {
            None => Err(VerifierErrorKind::AbsentStackItem),
            Some(VerificationType::Top) => Err(VerifierErrorKind::TopOnStack),
            Some(item) => {
                self.stack.push(item);
                Ok(())
            }
        }
    }

    /// Pop off the stack
    pub fn pop_stack(&mut self) -> Result<VerificationType, VerifierErrorKind> {
        self.stack.pop().ok_or(VerifierErrorKind::EmptyStack)
    }

    /// Update the type of a local variable
    ///
    /// Storing over half of a wide value invalidates the whole wide value (it becomes `top`),
    /// and storing a wide value claims the next slot as its hole.
    pub fn put_local(&mut self, slot: usize, local: VerificationType) {
        let width = local.width();
        if self.locals.len() < slot + width {
            self.locals.resize(slot + width, None);
        }

        // Overwriting the hole of a wide value
        let breaks_previous = slot > 0 && matches!(&self.locals[slot - 1], Some(t) if t.width() == 2);
        if breaks_previous {
            self.locals[slot - 1] = Some(VerificationType::Top);
        }

        // Overwriting a wide value with a narrow one
        let was_wide = matches!(&self.locals[slot], Some(t) if t.width() == 2);
        if was_wide && width == 1 && slot + 1 < self.locals.len() {
            self.locals[slot + 1] = Some(VerificationType::Top);
        }

        if width == 2 {
            self.locals[slot + 1] = None;
        }
        self.locals[slot] = Some(local);
        self.invalidate_caches();
    }

    /// Replace the array on top of the stack with its element type
    ///
    /// The top entry is copied and the copy is what gets replaced, so frames sharing the original
    /// type are unaffected.
    pub fn replace_with_element_type(&mut self) -> Result<(), VerifierErrorKind> {
        let array_type = self.stack.last().ok_or(VerifierErrorKind::EmptyStack)?.clone();
        let element_type = array_type.element_type()?;
        if let Some(top) = self.stack.last_mut() {
            *top = element_type;
        }
        Ok(())
    }

    /// Mark an uninitialized value as initialized (after its `<init>` method was called)
    ///
    /// Every copy of the value (on the stack or in locals) is replaced.
    pub fn initialize(&mut self, uninitialized: &VerificationType, class: &BinaryName) {
        let initialized = VerificationType::Object(class.clone());
        for local in self.locals.iter_mut().flatten() {
            if local == uninitialized {
                *local = initialized.clone();
            }
        }
        for item in self.stack.iter_mut() {
            if item == uninitialized {
                *item = initialized.clone();
            }
        }
        self.invalidate_caches();
    }

    /// Number of local variables, where wide values count only once
    pub fn number_of_locals(&self) -> usize {
        if let Some(count) = self.number_of_locals_cache.get() {
            return count;
        }

        let mut count = 0;
        let mut slot = 0;
        while slot < self.locals.len() {
            match &self.locals[slot] {
                Some(local) => {
                    count += 1;
                    slot += local.width();
                }
                None => slot += 1,
            }
        }

        self.number_of_locals_cache.set(Some(count));
        count
    }

    /// Slot of the `n`-th local counting backwards from the last one (`n` starts at 1)
    ///
    /// This is where the locals get cut when the last `n` locals are appended or chopped.
    pub fn index_of_different_locals(&self, n: usize) -> Option<usize> {
        self.locals
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, local)| local.is_some())
            .nth(n.checked_sub(1)?)
            .map(|(slot, _)| slot)
    }

    /// Deep copy of the frame
    ///
    /// Uninitialized values are copied through a fresh [`FrameCache`]: slots that shared a marker
    /// instance share one new instance in the copy, and no two calls hand out the same instance.
    /// The stack is only copied if the frame adopts its predecessor's stack shape.
    pub fn duplicate(&self, markers: &mut MarkerGenerator) -> Frame {
        let mut cache = FrameCache::new(markers);
        let locals = self
            .locals
            .iter()
            .map(|local| local.as_ref().map(|t| t.duplicate(&mut cache)))
            .collect();
        let stack = if self.adopt_stack_shape {
            self.stack.iter().map(|t| t.duplicate(&mut cache)).collect()
        } else {
            vec![]
        };

        Frame {
            pc: self.pc,
            locals,
            stack,
            adopt_stack_shape: self.adopt_stack_shape,
            number_of_locals_cache: Cell::new(None),
            diff_cache: Cell::new(None),
        }
    }

    /// Offset delta to record in the stack map table, relative to the previous frame
    pub fn offset_delta(&self, previous: Option<&Frame>) -> i32 {
        match previous {
            None => self.pc,
            Some(previous) if previous.is_placeholder() => self.pc,
            Some(previous) => self.pc - previous.pc - 1,
        }
    }

    /// Compact encoding that can express this frame relative to the previous frame
    pub fn frame_type(&self, previous: Option<&Frame>) -> FrameType {
        FrameType::select(
            self.number_of_different_locals(previous),
            self.stack.len(),
            self.offset_delta(previous),
        )
    }

    /// Locals as listed in a stack map frame
    ///
    /// Wide values take one entry (their holes are implicit), unused slots at the end are left
    /// off, and any other unused slot is `top`.
    pub fn verification_locals(&self) -> Vec<VerificationType> {
        verification_locals(&self.locals)
    }

    /// Forget the cached locals diff (eg. because the previous frame changed)
    pub fn reset_diff_cache(&self) {
        self.diff_cache.set(None);
    }

    fn invalidate_caches(&mut self) {
        *self.number_of_locals_cache.get_mut() = None;
        *self.diff_cache.get_mut() = None;
    }
}

pub(super) fn verification_locals(locals: &[Option<VerificationType>]) -> Vec<VerificationType> {
    let end = locals
        .iter()
        .rposition(Option::is_some)
        .map_or(0, |last| last + 1);

    let mut entries = vec![];
    let mut slot = 0;
    while slot < end {
        match &locals[slot] {
            Some(local) => {
                entries.push(local.clone());
                slot += local.width();
            }
            None => {
                entries.push(VerificationType::Top);
                slot += 1;
            }
        }
    }
    entries
}

/// Frames are equal if they are at the same offset and have the same types
impl PartialEq for Frame {
    fn eq(&self, other: &Frame) -> bool {
        self.pc == other.pc && self.locals == other.locals && self.stack == other.stack
    }
}

impl Eq for Frame {}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::names::Name;
    use crate::jvm::ParseDescriptor;
    use VerificationType::*;

    fn new_frame<const N: usize, const M: usize>(
        pc: i32,
        locals: [Option<VerificationType>; N],
        stack: [VerificationType; M],
    ) -> Frame {
        Frame::from_snapshot(pc, Vec::from(locals), Vec::from(stack)).unwrap()
    }

    #[test]
    fn stack_items() {
        let mut frame = Frame::new(3);
        assert!(frame.add_stack_item(Some(Integer)).is_ok());
        assert!(frame.add_stack_item(Some(Null)).is_ok());
        assert!(matches!(
            frame.add_stack_item(None),
            Err(VerifierErrorKind::AbsentStackItem)
        ));
        assert!(matches!(
            frame.add_stack_item(Some(Top)),
            Err(VerifierErrorKind::TopOnStack)
        ));
        assert_eq!(frame.stack(), &[Integer, Null]);
        assert_eq!(frame.pop_stack().unwrap(), Null);
        assert_eq!(frame.pop_stack().unwrap(), Integer);
        assert!(matches!(frame.pop_stack(), Err(VerifierErrorKind::EmptyStack)));
    }

    #[test]
    fn snapshots_need_wide_holes() {
        let missing_last = Frame::from_snapshot(5, vec![Some(Integer), Some(Long)], vec![]);
        assert!(matches!(missing_last, Err(VerifierErrorKind::MissingWideHole(2))));

        let overwritten = Frame::from_snapshot(
            5,
            vec![Some(Integer), Some(Long), Some(Integer)],
            vec![],
        );
        assert!(matches!(overwritten, Err(VerifierErrorKind::MissingWideHole(2))));

        let double_first = Frame::from_snapshot(5, vec![Some(Double), Some(Float)], vec![]);
        assert!(matches!(double_first, Err(VerifierErrorKind::MissingWideHole(1))));

        let frame = Frame::from_snapshot(5, vec![Some(Integer), Some(Long), None], vec![]).unwrap();
        assert_eq!(frame.number_of_locals(), 2);
        assert_eq!(frame.index_of_different_locals(1), Some(1));
        assert_eq!(frame.verification_locals(), vec![Integer, Long]);
    }

    #[test]
    fn put_local_grows_with_holes() {
        let mut frame = Frame::new(0);
        frame.put_local(3, Integer);
        assert_eq!(frame.locals(), &[None, None, None, Some(Integer)]);
        assert_eq!(frame.number_of_locals(), 1);

        frame.put_local(0, Double);
        assert_eq!(frame.locals(), &[Some(Double), None, None, Some(Integer)]);
        assert_eq!(frame.number_of_locals(), 2);
        assert_eq!(frame.local(0), Some(&Double));
        assert_eq!(frame.local(1), None);
        assert_eq!(frame.local(10), None);
    }

    #[test]
    fn put_local_over_wide_values() {
        let mut frame = Frame::new(0);
        frame.put_local(0, Long);
        frame.put_local(2, Float);
        assert_eq!(frame.locals(), &[Some(Long), None, Some(Float)]);

        // Clobbering the hole of the long
        frame.put_local(1, Integer);
        assert_eq!(frame.locals(), &[Some(Top), Some(Integer), Some(Float)]);
        assert_eq!(frame.number_of_locals(), 3);

        // Replacing a wide value with a narrow one
        let mut frame = Frame::new(0);
        frame.put_local(0, Double);
        frame.put_local(2, Integer);
        frame.put_local(0, Integer);
        assert_eq!(frame.locals(), &[Some(Integer), Some(Top), Some(Integer)]);
    }

    #[test]
    fn number_of_locals_skips_wide_holes() {
        let frame = new_frame(0, [Some(Integer), Some(Long), None, Some(Double), None], []);
        assert_eq!(frame.number_of_locals(), 3);
        assert_eq!(frame.number_of_locals(), 3);

        let frame = new_frame(0, [Some(Integer), None, None], []);
        assert_eq!(frame.number_of_locals(), 1);
    }

    #[test]
    fn number_of_locals_cache_resets() {
        let mut frame = new_frame(0, [Some(Integer)], []);
        assert_eq!(frame.number_of_locals(), 1);
        frame.put_local(1, Float);
        assert_eq!(frame.number_of_locals(), 2);
    }

    #[test]
    fn index_of_different_locals() {
        let frame = new_frame(
            0,
            [Some(Integer), Some(Long), None, Some(Float), None, None],
            [],
        );
        assert_eq!(frame.index_of_different_locals(1), Some(3));
        assert_eq!(frame.index_of_different_locals(2), Some(1));
        assert_eq!(frame.index_of_different_locals(3), Some(0));
        assert_eq!(frame.index_of_different_locals(4), None);
        assert_eq!(frame.index_of_different_locals(0), None);
    }

    #[test]
    fn replace_with_element_type() {
        let string_array = VerificationType::from(
            crate::jvm::FieldType::parse("[Ljava/lang/String;").unwrap(),
        );
        let mut frame = new_frame(0, [], [Integer, string_array.clone()]);
        let original = frame.clone();

        frame.replace_with_element_type().unwrap();
        assert_eq!(frame.stack(), &[Integer, Object(BinaryName::STRING)]);
        assert_eq!(original.stack(), &[Integer, string_array]);

        assert!(matches!(
            frame.replace_with_element_type(),
            Err(VerifierErrorKind::NotArrayType(_))
        ));
        assert!(matches!(
            Frame::new(0).replace_with_element_type(),
            Err(VerifierErrorKind::EmptyStack)
        ));
    }

    #[test]
    fn duplicate_preserves_instances_within_one_copy() {
        let mut markers = MarkerGenerator::new();
        let marker = markers.fresh_marker();
        let uninit = Uninitialized { offset: 7, marker };

        let frame = new_frame(
            4,
            [Some(Integer), Some(uninit.clone())],
            [uninit.clone(), uninit.clone()],
        );

        let copy1 = frame.duplicate(&mut markers);
        let copy2 = frame.duplicate(&mut markers);
        assert_eq!(copy1, frame);
        assert_eq!(copy2, frame);

        // All occurrences agree within a copy
        let local1 = copy1.local(1).unwrap();
        assert!(local1.is_same_instance(&copy1.stack()[0]));
        assert!(local1.is_same_instance(&copy1.stack()[1]));

        // But nothing is shared with the original or across copies
        let local2 = copy2.local(1).unwrap();
        assert!(!local1.is_same_instance(&uninit));
        assert!(!local2.is_same_instance(&uninit));
        assert!(!local1.is_same_instance(local2));
    }

    #[test]
    fn duplicate_keeps_distinct_markers_distinct() {
        let mut markers = MarkerGenerator::new();
        let this = UninitializedThis(markers.fresh_marker());
        let obj = Uninitialized {
            offset: 0,
            marker: markers.fresh_marker(),
        };
        let frame = new_frame(0, [Some(this.clone()), Some(obj.clone())], [obj]);

        let copy = frame.duplicate(&mut markers);
        assert!(!copy.local(0).unwrap().is_same_instance(copy.local(1).unwrap()));
        assert!(copy.local(1).unwrap().is_same_instance(&copy.stack()[0]));
        assert_eq!(copy.local(0), Some(&this));
    }

    #[test]
    fn duplicate_without_stack_shape() {
        let mut markers = MarkerGenerator::new();
        let mut frame = new_frame(9, [Some(Integer)], [Float, Null]);
        frame.adopt_stack_shape = false;

        let copy = frame.duplicate(&mut markers);
        assert_eq!(copy.locals(), frame.locals());
        assert!(copy.stack().is_empty());
        assert!(!copy.adopt_stack_shape);
    }

    #[test]
    fn offset_deltas() {
        let first = Frame::new(5);
        let second = Frame::new(12);
        assert_eq!(first.offset_delta(None), 5);
        assert_eq!(second.offset_delta(Some(&first)), 6);
        assert_eq!(second.offset_delta(Some(&Frame::placeholder())), 12);
    }

    #[test]
    fn method_entry_frames() {
        let mut markers = MarkerGenerator::new();
        let desc = MethodDescriptor::parse("(JLjava/lang/String;I)V").unwrap();
        let class = BinaryName::from_string(String::from("me/Point")).unwrap();

        let static_entry = Frame::method_entry(&class, &desc, true, false, &mut markers);
        assert!(static_entry.is_placeholder());
        assert_eq!(
            static_entry.locals(),
            &[Some(Long), None, Some(Object(BinaryName::STRING)), Some(Integer)]
        );

        let instance_entry = Frame::method_entry(&class, &desc, false, false, &mut markers);
        assert_eq!(instance_entry.local(0), Some(&Object(class.clone())));
        assert_eq!(instance_entry.number_of_locals(), 4);

        let constructor_entry = Frame::method_entry(&class, &desc, false, true, &mut markers);
        assert!(matches!(constructor_entry.local(0), Some(UninitializedThis(_))));
        assert_eq!(constructor_entry.local(1), Some(&Long));
    }

    #[test]
    fn initialize_replaces_all_copies() {
        let mut markers = MarkerGenerator::new();
        let point = BinaryName::from_string(String::from("me/Point")).unwrap();
        let uninit = Uninitialized {
            offset: 3,
            marker: markers.fresh_marker(),
        };
        let other = Uninitialized {
            offset: 10,
            marker: markers.fresh_marker(),
        };
        let mut frame = new_frame(
            20,
            [Some(uninit.clone()), Some(other.clone())],
            [uninit.clone(), uninit.clone()],
        );

        frame.initialize(&uninit, &point);
        assert_eq!(frame.locals(), &[Some(Object(point.clone())), Some(other)]);
        assert_eq!(frame.stack(), &[Object(point.clone()), Object(point)]);
    }

    #[test]
    fn verification_locals_of_frame() {
        let frame = new_frame(
            0,
            [Some(Integer), None, Some(Double), None, Some(Null), None, None],
            [],
        );
        assert_eq!(
            frame.verification_locals(),
            vec![Integer, Top, Double, Null]
        );
        assert!(Frame::new(0).verification_locals().is_empty());
    }
}
