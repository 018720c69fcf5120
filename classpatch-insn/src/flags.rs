use bitflags::bitflags;

bitflags! {
    /// JVM access flags for methods and classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNTHETIC = 0x1000;
    }
}

impl AccessFlags {
    pub fn is_static(self) -> bool {
        self.contains(AccessFlags::STATIC)
    }
}
