//! Method access flags (JVMS 4.6)

pub mod access_flags {
    pub const ACC_PUBLIC: u16 = 0x0001;
    pub const ACC_PRIVATE: u16 = 0x0002;
    pub const ACC_PROTECTED: u16 = 0x0004;
    pub const ACC_STATIC: u16 = 0x0008;
    pub const ACC_FINAL: u16 = 0x0010;
    pub const ACC_SYNCHRONIZED: u16 = 0x0020;
    pub const ACC_BRIDGE: u16 = 0x0040;
    pub const ACC_VARARGS: u16 = 0x0080;
    pub const ACC_NATIVE: u16 = 0x0100;
    pub const ACC_ABSTRACT: u16 = 0x0400;
    pub const ACC_STRICT: u16 = 0x0800;
    pub const ACC_SYNTHETIC: u16 = 0x1000;

    pub fn is_static(access: u16) -> bool {
        access & ACC_STATIC != 0
    }

    pub fn is_abstract(access: u16) -> bool {
        access & ACC_ABSTRACT != 0
    }

    pub fn is_native(access: u16) -> bool {
        access & ACC_NATIVE != 0
    }

    /// Abstract and native methods carry no code to verify
    pub fn has_no_code(access: u16) -> bool {
        is_abstract(access) || is_native(access)
    }
}
