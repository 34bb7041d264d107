//! Pickle opcode table, protocols 0 through 5.

use std::fmt;

/// How an opcode's inline argument is encoded in the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    None,
    Uint1,
    Uint2,
    Int4,
    Uint4,
    Uint8,
    /// `uint1` byte count, then a little-endian two's-complement integer.
    Long1,
    /// `int4` byte count, then a little-endian two's-complement integer.
    Long4,
    String1,
    String4,
    Bytes1,
    Bytes4,
    Bytes8,
    Bytearray8,
    Unicode1,
    Unicode4,
    Unicode8,
    /// Newline-terminated decimal; `00`/`01` are the protocol 0 booleans.
    DecimalNlShort,
    /// Newline-terminated decimal with an optional trailing `L`.
    DecimalNlLong,
    FloatNl,
    /// Big-endian IEEE 754 double.
    Float8,
    /// Newline-terminated, quoted string.
    StringNl,
    StringNlNoescape,
    /// Two newline-terminated strings (module, then qualified name).
    StringNlNoescapePair,
    UnicodeNl,
}

macro_rules! opcodes {
    ($($variant:ident = $code:literal, $name:literal, $arg:ident;)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($variant,)*
        }

        impl Opcode {
            pub fn from_code(code: u8) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)*
                    _ => None,
                }
            }

            pub fn code(self) -> u8 {
                match self {
                    $(Self::$variant => $code,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            pub fn arg_kind(self) -> ArgKind {
                match self {
                    $(Self::$variant => ArgKind::$arg,)*
                }
            }
        }
    };
}

opcodes! {
    // protocol 0
    Mark = b'(', "MARK", None;
    Stop = b'.', "STOP", None;
    Pop = b'0', "POP", None;
    PopMark = b'1', "POP_MARK", None;
    Dup = b'2', "DUP", None;
    Float = b'F', "FLOAT", FloatNl;
    Int = b'I', "INT", DecimalNlShort;
    Long = b'L', "LONG", DecimalNlLong;
    NoneObj = b'N', "NONE", None;
    Persid = b'P', "PERSID", StringNlNoescape;
    Reduce = b'R', "REDUCE", None;
    String = b'S', "STRING", StringNl;
    Unicode = b'V', "UNICODE", UnicodeNl;
    Append = b'a', "APPEND", None;
    Build = b'b', "BUILD", None;
    Global = b'c', "GLOBAL", StringNlNoescapePair;
    Dict = b'd', "DICT", None;
    Get = b'g', "GET", DecimalNlShort;
    Inst = b'i', "INST", StringNlNoescapePair;
    List = b'l', "LIST", None;
    Obj = b'o', "OBJ", None;
    Put = b'p', "PUT", DecimalNlShort;
    Setitem = b's', "SETITEM", None;
    Tuple = b't', "TUPLE", None;
    // protocol 1
    BinInt = b'J', "BININT", Int4;
    BinInt1 = b'K', "BININT1", Uint1;
    BinInt2 = b'M', "BININT2", Uint2;
    BinPersid = b'Q', "BINPERSID", None;
    BinString = b'T', "BINSTRING", String4;
    ShortBinString = b'U', "SHORT_BINSTRING", String1;
    BinUnicode = b'X', "BINUNICODE", Unicode4;
    EmptyDict = b'}', "EMPTY_DICT", None;
    Appends = b'e', "APPENDS", None;
    BinGet = b'h', "BINGET", Uint1;
    LongBinGet = b'j', "LONG_BINGET", Uint4;
    EmptyList = b']', "EMPTY_LIST", None;
    BinPut = b'q', "BINPUT", Uint1;
    LongBinPut = b'r', "LONG_BINPUT", Uint4;
    EmptyTuple = b')', "EMPTY_TUPLE", None;
    Setitems = b'u', "SETITEMS", None;
    BinFloat = b'G', "BINFLOAT", Float8;
    // protocol 2
    Proto = 0x80, "PROTO", Uint1;
    NewObj = 0x81, "NEWOBJ", None;
    Ext1 = 0x82, "EXT1", Uint1;
    Ext2 = 0x83, "EXT2", Uint2;
    Ext4 = 0x84, "EXT4", Int4;
    Tuple1 = 0x85, "TUPLE1", None;
    Tuple2 = 0x86, "TUPLE2", None;
    Tuple3 = 0x87, "TUPLE3", None;
    NewTrue = 0x88, "NEWTRUE", None;
    NewFalse = 0x89, "NEWFALSE", None;
    Long1 = 0x8a, "LONG1", Long1;
    Long4 = 0x8b, "LONG4", Long4;
    // protocol 3
    BinBytes = b'B', "BINBYTES", Bytes4;
    ShortBinBytes = b'C', "SHORT_BINBYTES", Bytes1;
    // protocol 4
    ShortBinUnicode = 0x8c, "SHORT_BINUNICODE", Unicode1;
    BinUnicode8 = 0x8d, "BINUNICODE8", Unicode8;
    BinBytes8 = 0x8e, "BINBYTES8", Bytes8;
    EmptySet = 0x8f, "EMPTY_SET", None;
    AddItems = 0x90, "ADDITEMS", None;
    FrozenSet = 0x91, "FROZENSET", None;
    NewObjEx = 0x92, "NEWOBJ_EX", None;
    StackGlobal = 0x93, "STACK_GLOBAL", None;
    Memoize = 0x94, "MEMOIZE", None;
    Frame = 0x95, "FRAME", Uint8;
    // protocol 5
    ByteArray8 = 0x96, "BYTEARRAY8", Bytearray8;
    NextBuffer = 0x97, "NEXT_BUFFER", None;
    ReadonlyBuffer = 0x98, "READONLY_BUFFER", None;
}

impl Opcode {
    /// Opcodes that carry an integer argument, recognised by name: anything
    /// spelled with `INT` or `LONG`.
    ///
    /// This covers the literal family and also the long memo opcodes
    /// (`LONG_BINGET`, `LONG_BINPUT`), whose memo index counts as the
    /// integer. Short memo and extension opcodes (`BINPUT`, `EXT2`, ...) do
    /// not match.
    pub fn is_integer_like(self) -> bool {
        let name = self.name();
        name.contains("INT") || name.contains("LONG")
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
