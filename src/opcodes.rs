//! JVM opcode enumeration
//!
//! Only the opcodes a tree-level assembler can name are listed: the short
//! forms (`iload_0`, `ldc_w`, `goto_w`, `wide`, ...) are an encoding concern
//! and are chosen by the serializer.

use std::fmt;

/// Operand layout an opcode expects in the syntax tree and instruction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandShape {
    /// No operands
    None,
    /// Signed integer immediate (`BIPUSH`, `SIPUSH`, `NEWARRAY`)
    Int,
    /// Local variable slot (`xLOAD`, `xSTORE`, `RET`)
    Var,
    /// `IINC slot, increment`
    Iinc,
    /// Single branch target
    Jump,
    /// Loadable constant (`LDC`)
    Ldc,
    /// Type descriptor or internal name (`NEW`, `ANEWARRAY`, `CHECKCAST`, `INSTANCEOF`)
    Type,
    /// Field reference
    Field,
    /// Method reference
    Method,
    /// `INVOKEDYNAMIC` call site
    InvokeDynamic,
    TableSwitch,
    LookupSwitch,
    MultiANewArray,
}

macro_rules! opcodes {
    ($($variant:ident = $code:literal, $mnemonic:literal, $shape:ident;)*) => {
        /// JVM instruction opcode
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            /// All opcodes in ascending byte order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$variant,)*];

            /// Byte value of the opcode in the class file encoding
            pub fn code(self) -> u8 {
                match self {
                    $(Opcode::$variant => $code,)*
                }
            }

            /// Upper-case assembler mnemonic
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$variant => $mnemonic,)*
                }
            }

            pub fn shape(self) -> OperandShape {
                match self {
                    $(Opcode::$variant => OperandShape::$shape,)*
                }
            }

            pub fn from_code(code: u8) -> Option<Opcode> {
                match code {
                    $($code => Some(Opcode::$variant),)*
                    _ => None,
                }
            }

            /// Look up an opcode by mnemonic, ignoring ASCII case
            pub fn from_mnemonic(name: &str) -> Option<Opcode> {
                let upper = name.to_ascii_uppercase();
                match upper.as_str() {
                    $($mnemonic => Some(Opcode::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Nop = 0x00, "NOP", None;
    AconstNull = 0x01, "ACONST_NULL", None;
    IconstM1 = 0x02, "ICONST_M1", None;
    Iconst0 = 0x03, "ICONST_0", None;
    Iconst1 = 0x04, "ICONST_1", None;
    Iconst2 = 0x05, "ICONST_2", None;
    Iconst3 = 0x06, "ICONST_3", None;
    Iconst4 = 0x07, "ICONST_4", None;
    Iconst5 = 0x08, "ICONST_5", None;
    Lconst0 = 0x09, "LCONST_0", None;
    Lconst1 = 0x0a, "LCONST_1", None;
    Fconst0 = 0x0b, "FCONST_0", None;
    Fconst1 = 0x0c, "FCONST_1", None;
    Fconst2 = 0x0d, "FCONST_2", None;
    Dconst0 = 0x0e, "DCONST_0", None;
    Dconst1 = 0x0f, "DCONST_1", None;
    Bipush = 0x10, "BIPUSH", Int;
    Sipush = 0x11, "SIPUSH", Int;
    Ldc = 0x12, "LDC", Ldc;
    Iload = 0x15, "ILOAD", Var;
    Lload = 0x16, "LLOAD", Var;
    Fload = 0x17, "FLOAD", Var;
    Dload = 0x18, "DLOAD", Var;
    Aload = 0x19, "ALOAD", Var;
    Iaload = 0x2e, "IALOAD", None;
    Laload = 0x2f, "LALOAD", None;
    Faload = 0x30, "FALOAD", None;
    Daload = 0x31, "DALOAD", None;
    Aaload = 0x32, "AALOAD", None;
    Baload = 0x33, "BALOAD", None;
    Caload = 0x34, "CALOAD", None;
    Saload = 0x35, "SALOAD", None;
    Istore = 0x36, "ISTORE", Var;
    Lstore = 0x37, "LSTORE", Var;
    Fstore = 0x38, "FSTORE", Var;
    Dstore = 0x39, "DSTORE", Var;
    Astore = 0x3a, "ASTORE", Var;
    Iastore = 0x4f, "IASTORE", None;
    Lastore = 0x50, "LASTORE", None;
    Fastore = 0x51, "FASTORE", None;
    Dastore = 0x52, "DASTORE", None;
    Aastore = 0x53, "AASTORE", None;
    Bastore = 0x54, "BASTORE", None;
    Castore = 0x55, "CASTORE", None;
    Sastore = 0x56, "SASTORE", None;
    Pop = 0x57, "POP", None;
    Pop2 = 0x58, "POP2", None;
    Dup = 0x59, "DUP", None;
    DupX1 = 0x5a, "DUP_X1", None;
    DupX2 = 0x5b, "DUP_X2", None;
    Dup2 = 0x5c, "DUP2", None;
    Dup2X1 = 0x5d, "DUP2_X1", None;
    Dup2X2 = 0x5e, "DUP2_X2", None;
    Swap = 0x5f, "SWAP", None;
    Iadd = 0x60, "IADD", None;
    Ladd = 0x61, "LADD", None;
    Fadd = 0x62, "FADD", None;
    Dadd = 0x63, "DADD", None;
    Isub = 0x64, "ISUB", None;
    Lsub = 0x65, "LSUB", None;
    Fsub = 0x66, "FSUB", None;
    Dsub = 0x67, "DSUB", None;
    Imul = 0x68, "IMUL", None;
    Lmul = 0x69, "LMUL", None;
    Fmul = 0x6a, "FMUL", None;
    Dmul = 0x6b, "DMUL", None;
    Idiv = 0x6c, "IDIV", None;
    Ldiv = 0x6d, "LDIV", None;
    Fdiv = 0x6e, "FDIV", None;
    Ddiv = 0x6f, "DDIV", None;
    Irem = 0x70, "IREM", None;
    Lrem = 0x71, "LREM", None;
    Frem = 0x72, "FREM", None;
    Drem = 0x73, "DREM", None;
    Ineg = 0x74, "INEG", None;
    Lneg = 0x75, "LNEG", None;
    Fneg = 0x76, "FNEG", None;
    Dneg = 0x77, "DNEG", None;
    Ishl = 0x78, "ISHL", None;
    Lshl = 0x79, "LSHL", None;
    Ishr = 0x7a, "ISHR", None;
    Lshr = 0x7b, "LSHR", None;
    Iushr = 0x7c, "IUSHR", None;
    Lushr = 0x7d, "LUSHR", None;
    Iand = 0x7e, "IAND", None;
    Land = 0x7f, "LAND", None;
    Ior = 0x80, "IOR", None;
    Lor = 0x81, "LOR", None;
    Ixor = 0x82, "IXOR", None;
    Lxor = 0x83, "LXOR", None;
    Iinc = 0x84, "IINC", Iinc;
    I2l = 0x85, "I2L", None;
    I2f = 0x86, "I2F", None;
    I2d = 0x87, "I2D", None;
    L2i = 0x88, "L2I", None;
    L2f = 0x89, "L2F", None;
    L2d = 0x8a, "L2D", None;
    F2i = 0x8b, "F2I", None;
    F2l = 0x8c, "F2L", None;
    F2d = 0x8d, "F2D", None;
    D2i = 0x8e, "D2I", None;
    D2l = 0x8f, "D2L", None;
    D2f = 0x90, "D2F", None;
    I2b = 0x91, "I2B", None;
    I2c = 0x92, "I2C", None;
    I2s = 0x93, "I2S", None;
    Lcmp = 0x94, "LCMP", None;
    Fcmpl = 0x95, "FCMPL", None;
    Fcmpg = 0x96, "FCMPG", None;
    Dcmpl = 0x97, "DCMPL", None;
    Dcmpg = 0x98, "DCMPG", None;
    Ifeq = 0x99, "IFEQ", Jump;
    Ifne = 0x9a, "IFNE", Jump;
    Iflt = 0x9b, "IFLT", Jump;
    Ifge = 0x9c, "IFGE", Jump;
    Ifgt = 0x9d, "IFGT", Jump;
    Ifle = 0x9e, "IFLE", Jump;
    IfIcmpeq = 0x9f, "IF_ICMPEQ", Jump;
    IfIcmpne = 0xa0, "IF_ICMPNE", Jump;
    IfIcmplt = 0xa1, "IF_ICMPLT", Jump;
    IfIcmpge = 0xa2, "IF_ICMPGE", Jump;
    IfIcmpgt = 0xa3, "IF_ICMPGT", Jump;
    IfIcmple = 0xa4, "IF_ICMPLE", Jump;
    IfAcmpeq = 0xa5, "IF_ACMPEQ", Jump;
    IfAcmpne = 0xa6, "IF_ACMPNE", Jump;
    Goto = 0xa7, "GOTO", Jump;
    Jsr = 0xa8, "JSR", Jump;
    Ret = 0xa9, "RET", Var;
    Tableswitch = 0xaa, "TABLESWITCH", TableSwitch;
    Lookupswitch = 0xab, "LOOKUPSWITCH", LookupSwitch;
    Ireturn = 0xac, "IRETURN", None;
    Lreturn = 0xad, "LRETURN", None;
    Freturn = 0xae, "FRETURN", None;
    Dreturn = 0xaf, "DRETURN", None;
    Areturn = 0xb0, "ARETURN", None;
    Return = 0xb1, "RETURN", None;
    Getstatic = 0xb2, "GETSTATIC", Field;
    Putstatic = 0xb3, "PUTSTATIC", Field;
    Getfield = 0xb4, "GETFIELD", Field;
    Putfield = 0xb5, "PUTFIELD", Field;
    Invokevirtual = 0xb6, "INVOKEVIRTUAL", Method;
    Invokespecial = 0xb7, "INVOKESPECIAL", Method;
    Invokestatic = 0xb8, "INVOKESTATIC", Method;
    Invokeinterface = 0xb9, "INVOKEINTERFACE", Method;
    Invokedynamic = 0xba, "INVOKEDYNAMIC", InvokeDynamic;
    New = 0xbb, "NEW", Type;
    Newarray = 0xbc, "NEWARRAY", Int;
    Anewarray = 0xbd, "ANEWARRAY", Type;
    Arraylength = 0xbe, "ARRAYLENGTH", None;
    Athrow = 0xbf, "ATHROW", None;
    Checkcast = 0xc0, "CHECKCAST", Type;
    Instanceof = 0xc1, "INSTANCEOF", Type;
    Monitorenter = 0xc2, "MONITORENTER", None;
    Monitorexit = 0xc3, "MONITOREXIT", None;
    Multianewarray = 0xc5, "MULTIANEWARRAY", MultiANewArray;
    Ifnull = 0xc6, "IFNULL", Jump;
    Ifnonnull = 0xc7, "IFNONNULL", Jump;
}

impl Opcode {
    /// Conditional branches: both the target and the next instruction are successors
    pub fn is_conditional_jump(self) -> bool {
        self.shape() == OperandShape::Jump && !matches!(self, Opcode::Goto | Opcode::Jsr)
    }

    /// Instructions after which control never reaches the next instruction
    pub fn ends_flow(self) -> bool {
        matches!(
            self,
            Opcode::Goto
                | Opcode::Ret
                | Opcode::Tableswitch
                | Opcode::Lookupswitch
                | Opcode::Athrow
                | Opcode::Ireturn
                | Opcode::Lreturn
                | Opcode::Freturn
                | Opcode::Dreturn
                | Opcode::Areturn
                | Opcode::Return
        )
    }

    /// Loads and stores of `long`/`double` touch two consecutive slots
    pub fn is_wide_var(self) -> bool {
        matches!(self, Opcode::Lload | Opcode::Dload | Opcode::Lstore | Opcode::Dstore)
    }

    pub fn is_store(self) -> bool {
        matches!(
            self,
            Opcode::Istore | Opcode::Lstore | Opcode::Fstore | Opcode::Dstore | Opcode::Astore
        )
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// `NEWARRAY` primitive element type codes (JVMS 6.5)
pub mod array_types {
    pub const T_BOOLEAN: i32 = 4;
    pub const T_CHAR: i32 = 5;
    pub const T_FLOAT: i32 = 6;
    pub const T_DOUBLE: i32 = 7;
    pub const T_BYTE: i32 = 8;
    pub const T_SHORT: i32 = 9;
    pub const T_INT: i32 = 10;
    pub const T_LONG: i32 = 11;

    /// Array descriptor created by `NEWARRAY` with the given type code
    pub fn descriptor(code: i32) -> Option<&'static str> {
        match code {
            T_BOOLEAN => Some("[Z"),
            T_CHAR => Some("[C"),
            T_FLOAT => Some("[F"),
            T_DOUBLE => Some("[D"),
            T_BYTE => Some("[B"),
            T_SHORT => Some("[S"),
            T_INT => Some("[I"),
            T_LONG => Some("[J"),
            _ => None,
        }
    }
}
