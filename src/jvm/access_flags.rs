use bitflags::bitflags;

bitflags! {
    /// [Access flags][0] on classes
    ///
    /// Only `INTERFACE` matters to the verifier: interfaces are treated like `java/lang/Object`
    /// when computing common super types.
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
    }
}
