use super::{BinaryName, ClassAccessFlags, FieldType};
use elsa::map::FrozenMap;
use std::fmt;
use typed_arena::Arena;

/// Query for the most specific class two reference types have in common
///
/// `None` means nothing more specific than `java/lang/Object` is known.
pub trait CommonSuperType {
    fn common_super_type(&self, type1: &BinaryName, type2: &BinaryName) -> Option<BinaryName>;
}

impl<F> CommonSuperType for F
where
    F: Fn(&BinaryName, &BinaryName) -> Option<BinaryName>,
{
    fn common_super_type(&self, type1: &BinaryName, type2: &BinaryName) -> Option<BinaryName> {
        self(type1, type2)
    }
}

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        ClassGraphArenas::new()
    }
}

/// Tracks the superclass relationships between the classes that frames refer to
///
/// Classes that are not in the graph are treated as if they were direct subclasses of
/// `java/lang/Object`.
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<&'g BinaryName, &'g ClassData<'g>>,
}

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    pub fn lookup_class(&'g self, name: &BinaryName) -> Option<&'g ClassData<'g>> {
        self.classes.get(name)
    }

    /// Add a new class to the class graph
    pub fn add_class(&self, data: ClassData<'g>) -> &'g ClassData<'g> {
        let data = &*self.arenas.class_arena.alloc(data);
        self.classes.insert(&data.name, data);
        data
    }

    /// Add standard types to the class graph
    pub fn insert_java_library_types(&self) -> JavaClasses<'g> {
        JavaClasses::add_to_graph(self)
    }

    /// Most specific common superclass, mirroring how the verifier merges reference types
    ///
    ///   - arrays of references merge their element types (`[LInteger;` and `[LLong;` become
    ///     `[LNumber;`) while any other mix involving an array is just `java/lang/Object`
    ///   - interfaces are not tracked by the verifier, so they merge into `java/lang/Object`
    ///   - classes merge into the first superclass they share
    ///
    pub fn common_superclass(&self, type1: &BinaryName, type2: &BinaryName) -> Option<BinaryName> {
        if type1 == type2 {
            return Some(type1.clone());
        }

        match (type1.array_element_type(), type2.array_element_type()) {
            (Some(FieldType::Ref(elem1)), Some(FieldType::Ref(elem2))) => {
                let elem = self
                    .common_superclass(&elem1, &elem2)
                    .unwrap_or(BinaryName::OBJECT);
                match FieldType::array(&FieldType::Ref(elem)) {
                    FieldType::Ref(array) => Some(array),
                    FieldType::Base(_) => None,
                }
            }
            (Some(_), _) | (_, Some(_)) => Some(BinaryName::OBJECT),
            (None, None) => {
                let class1 = self.classes.get(type1)?;
                let class2 = self.classes.get(type2)?;
                if class1.is_interface() || class2.is_interface() {
                    return Some(BinaryName::OBJECT);
                }

                let superclasses1: Vec<&BinaryName> =
                    class1.superclasses().map(|class| &class.name).collect();
                class2
                    .superclasses()
                    .find(|class| superclasses1.contains(&&class.name))
                    .map(|class| class.name.clone())
            }
        }
    }
}

impl<'g> CommonSuperType for ClassGraph<'g> {
    fn common_super_type(&self, type1: &BinaryName, type2: &BinaryName) -> Option<BinaryName> {
        let super_type = self.common_superclass(type1, type2);
        log::trace!("Common super type of {} and {}: {:?}", type1, type2, super_type);
        super_type
    }
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<&'g ClassData<'g>>,

    pub access_flags: ClassAccessFlags,
}

impl<'g> ClassData<'g> {
    pub fn new(
        name: BinaryName,
        superclass: &'g ClassData<'g>,
        access_flags: ClassAccessFlags,
    ) -> ClassData<'g> {
        ClassData {
            name,
            superclass: Some(superclass),
            access_flags,
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    /// This class, followed by its superclasses (ending with `java/lang/Object`)
    pub fn superclasses(&self) -> impl Iterator<Item = &ClassData<'g>> {
        std::iter::successors(Some(self), |class| class.superclass)
    }
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> fmt::Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassData")
            .field("name", &self.name)
            .field("superclass", &self.superclass.map(|sup| &sup.name))
            .field("access_flags", &self.access_flags)
            .finish()
    }
}

/// Classes inside `java.*` that frames commonly mention
pub struct JavaClasses<'g> {
    pub object: &'g ClassData<'g>,
    pub char_sequence: &'g ClassData<'g>,
    pub comparable: &'g ClassData<'g>,
    pub cloneable: &'g ClassData<'g>,
    pub serializable: &'g ClassData<'g>,
    pub string: &'g ClassData<'g>,
    pub class: &'g ClassData<'g>,
    pub number: &'g ClassData<'g>,
    pub integer: &'g ClassData<'g>,
    pub float: &'g ClassData<'g>,
    pub long: &'g ClassData<'g>,
    pub double: &'g ClassData<'g>,
    pub throwable: &'g ClassData<'g>,
    pub error: &'g ClassData<'g>,
    pub exception: &'g ClassData<'g>,
    pub runtime_exception: &'g ClassData<'g>,
}

impl<'g> JavaClasses<'g> {
    pub fn add_to_graph(class_graph: &ClassGraph<'g>) -> JavaClasses<'g> {
        let public = ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER;
        let public_final = public | ClassAccessFlags::FINAL;
        let public_interface =
            ClassAccessFlags::PUBLIC | ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;

        let object = class_graph.add_class(ClassData {
            name: BinaryName::OBJECT,
            superclass: None,
            access_flags: public,
        });
        let add = |name: BinaryName, superclass, access_flags| {
            class_graph.add_class(ClassData::new(name, superclass, access_flags))
        };

        let char_sequence = add(BinaryName::CHARSEQUENCE, object, public_interface);
        let comparable = add(BinaryName::COMPARABLE, object, public_interface);
        let cloneable = add(BinaryName::CLONEABLE, object, public_interface);
        let serializable = add(BinaryName::SERIALIZABLE, object, public_interface);
        let string = add(BinaryName::STRING, object, public_final);
        let class = add(BinaryName::CLASS, object, public_final);
        let number = add(BinaryName::NUMBER, object, public | ClassAccessFlags::ABSTRACT);
        let integer = add(BinaryName::INTEGER, number, public_final);
        let float = add(BinaryName::FLOAT, number, public_final);
        let long = add(BinaryName::LONG, number, public_final);
        let double = add(BinaryName::DOUBLE, number, public_final);
        let throwable = add(BinaryName::THROWABLE, object, public);
        let error = add(BinaryName::ERROR, throwable, public);
        let exception = add(BinaryName::EXCEPTION, throwable, public);
        let runtime_exception = add(BinaryName::RUNTIMEEXCEPTION, exception, public);

        JavaClasses {
            object,
            char_sequence,
            comparable,
            cloneable,
            serializable,
            string,
            class,
            number,
            integer,
            float,
            long,
            double,
            throwable,
            error,
            exception,
            runtime_exception,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::{Name, ParseDescriptor};

    fn name(name: &str) -> BinaryName {
        BinaryName::from_string(String::from(name)).unwrap()
    }

    fn array(descriptor: &str) -> BinaryName {
        match FieldType::parse(descriptor).unwrap() {
            FieldType::Ref(name) => name,
            FieldType::Base(_) => panic!("not an array"),
        }
    }

    #[test]
    fn java_library_classes() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();

        assert_eq!(java.integer.superclass, Some(java.number));
        assert!(java.char_sequence.is_interface());
        assert!(!java.string.is_interface());
        assert_eq!(
            graph.lookup_class(&BinaryName::RUNTIMEEXCEPTION),
            Some(java.runtime_exception)
        );

        let chain: Vec<&BinaryName> = java
            .runtime_exception
            .superclasses()
            .map(|class| &class.name)
            .collect();
        assert_eq!(
            chain,
            vec![
                &BinaryName::RUNTIMEEXCEPTION,
                &BinaryName::EXCEPTION,
                &BinaryName::THROWABLE,
                &BinaryName::OBJECT
            ]
        );
    }

    #[test]
    fn common_superclasses() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        let java = graph.insert_java_library_types();
        let public = ClassAccessFlags::PUBLIC;
        let shape = graph.add_class(ClassData::new(name("me/Shape"), java.object, public));
        graph.add_class(ClassData::new(name("me/Circle"), shape, public));
        graph.add_class(ClassData::new(name("me/Square"), shape, public));

        let query = |a: &str, b: &str| graph.common_super_type(&name(a), &name(b));
        assert_eq!(query("me/Circle", "me/Square"), Some(name("me/Shape")));
        assert_eq!(query("me/Circle", "me/Shape"), Some(name("me/Shape")));
        assert_eq!(query("me/Circle", "me/Circle"), Some(name("me/Circle")));
        assert_eq!(
            query("java/lang/Integer", "java/lang/Double"),
            Some(BinaryName::NUMBER)
        );
        assert_eq!(
            query("java/lang/Error", "java/lang/RuntimeException"),
            Some(BinaryName::THROWABLE)
        );
        assert_eq!(
            query("me/Circle", "java/lang/String"),
            Some(BinaryName::OBJECT)
        );
        assert_eq!(
            query("java/lang/String", "java/lang/Comparable"),
            Some(BinaryName::OBJECT)
        );
        assert_eq!(query("me/Circle", "me/Unknown"), None);
    }

    #[test]
    fn common_array_superclasses() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        graph.insert_java_library_types();

        let query = |a: &str, b: &str| graph.common_super_type(&array(a), &array(b));
        assert_eq!(
            query("[Ljava/lang/Integer;", "[Ljava/lang/Long;"),
            Some(array("[Ljava/lang/Number;"))
        );
        assert_eq!(
            query("[[Ljava/lang/Integer;", "[[Ljava/lang/String;"),
            Some(array("[[Ljava/lang/Object;"))
        );
        assert_eq!(query("[[I", "[[J"), Some(array("[Ljava/lang/Object;")));
        assert_eq!(query("[I", "[J"), Some(BinaryName::OBJECT));
        assert_eq!(query("[I", "Ljava/lang/String;"), Some(BinaryName::OBJECT));
        assert_eq!(
            query("[Lme/Unknown;", "[Ljava/lang/String;"),
            Some(array("[Ljava/lang/Object;"))
        );
    }
}
