//! ioctl-idlc primitive type definitions

/// Builtin integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Size,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 9] = [
        BuiltinType::U8,
        BuiltinType::U16,
        BuiltinType::U32,
        BuiltinType::U64,
        BuiltinType::I8,
        BuiltinType::I16,
        BuiltinType::I32,
        BuiltinType::I64,
        BuiltinType::Size,
    ];

    /// Return type size (in bytes)
    pub fn size(&self) -> usize {
        match self {
            BuiltinType::U8 | BuiltinType::I8 => 1,
            BuiltinType::U16 | BuiltinType::I16 => 2,
            BuiltinType::U32 | BuiltinType::I32 => 4,
            BuiltinType::U64 | BuiltinType::I64 | BuiltinType::Size => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            BuiltinType::I8 | BuiltinType::I16 | BuiltinType::I32 | BuiltinType::I64
        )
    }

    /// Parse from the C spelling
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uint8_t" => Some(BuiltinType::U8),
            "uint16_t" => Some(BuiltinType::U16),
            "uint32_t" => Some(BuiltinType::U32),
            "uint64_t" => Some(BuiltinType::U64),
            "int8_t" => Some(BuiltinType::I8),
            "int16_t" => Some(BuiltinType::I16),
            "int32_t" => Some(BuiltinType::I32),
            "int64_t" => Some(BuiltinType::I64),
            "size_t" => Some(BuiltinType::Size),
            _ => None,
        }
    }

    /// C spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinType::U8 => "uint8_t",
            BuiltinType::U16 => "uint16_t",
            BuiltinType::U32 => "uint32_t",
            BuiltinType::U64 => "uint64_t",
            BuiltinType::I8 => "int8_t",
            BuiltinType::I16 => "int16_t",
            BuiltinType::I32 => "int32_t",
            BuiltinType::I64 => "int64_t",
            BuiltinType::Size => "size_t",
        }
    }

    /// Type to cast to before streaming the value as a number.
    ///
    /// `std::ostream` prints 8-bit integers as characters.
    pub fn print_as(&self) -> Option<BuiltinType> {
        match self {
            BuiltinType::U8 => Some(BuiltinType::U32),
            BuiltinType::I8 => Some(BuiltinType::I32),
            _ => None,
        }
    }
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interface or command number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Number(pub u64);

impl Number {
    /// Number formatted as hex
    pub fn hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
