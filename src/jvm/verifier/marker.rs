use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of an uninitialized object
///
/// Every `new` instruction (and the `this` parameter of a constructor) produces a fresh marker
/// origin. Two uninitialized values are only the same verification type if they share an origin,
/// since initializing one of them (by calling `<init>`) must initialize all of its copies and
/// none of the others.
///
/// On top of the origin, each marker carries an instance handle. Instances are only relevant
/// while copying frames: a duplicated frame gets fresh instances, but all the slots that shared
/// an instance in the original frame still share one in the copy (see
/// [`super::FrameCache`]). Instances never affect equality or hashing.
#[derive(Copy, Clone)]
pub struct Marker {
    origin: MarkerOrigin,
    instance: MarkerInstance,
}

/// Allocation point of an uninitialized value
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct MarkerOrigin(usize);

/// Handle for one particular copy of a marker
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct MarkerInstance(usize);

impl Marker {
    pub fn origin(&self) -> MarkerOrigin {
        self.origin
    }

    pub fn instance(&self) -> MarkerInstance {
        self.instance
    }

    /// Is this the exact same copy of the marker (not just the same origin)?
    pub fn is_same_instance(&self, other: &Marker) -> bool {
        self.origin == other.origin && self.instance == other.instance
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Marker) -> bool {
        self.origin == other.origin
    }
}

impl Eq for Marker {}

impl Hash for Marker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state)
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("u{}.{}", self.origin.0, self.instance.0))
    }
}

/// Generates markers for one method body
///
/// There is no global marker source: every method being compiled owns its own generator, so
/// methods can be processed independently (and in parallel).
#[derive(Default, Debug)]
pub struct MarkerGenerator {
    next_origin: usize,
    next_instance: usize,
}

impl MarkerGenerator {
    pub fn new() -> MarkerGenerator {
        MarkerGenerator::default()
    }

    /// Marker for a new allocation point
    pub fn fresh_marker(&mut self) -> Marker {
        let origin = MarkerOrigin(self.next_origin);
        self.next_origin += 1;
        Marker {
            origin,
            instance: self.next_instance(),
        }
    }

    /// New copy of an existing marker (same origin, fresh instance)
    pub fn fresh_instance(&mut self, marker: &Marker) -> Marker {
        Marker {
            origin: marker.origin,
            instance: self.next_instance(),
        }
    }

    fn next_instance(&mut self) -> MarkerInstance {
        let instance = MarkerInstance(self.next_instance);
        self.next_instance += 1;
        instance
    }
}
