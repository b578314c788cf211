//! Catalog of CoE basic data types (ETG.2000 table 7, ETG.1000.6 5.6.7.3).
//!
//! Every entry carries two bit widths. They differ only for [`SUBINDEX0`]: the
//! count held in sub-object 0 is advertised as an 8-bit unsigned in the
//! dictionary but occupies 16 bits in the slave stack's object memory, so SDO
//! complete-access offsets of the following sub-objects must skip 16 bits.
//! Callers pick [`BasicType::pdo_bits`] or [`BasicType::sdo_bits`] for their
//! context and never special-case the entry themselves.

use crate::error::CompileError;

/// Catalog symbol of the type used for sub-object 0 of arrays and records.
pub const SUBINDEX0: &str = "SUBINDEX0";

/// Little-endian binary encoding of a default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Unsigned(usize),
    Signed(usize),
    Real32,
    /// Fixed-length visible string, NUL padded.
    Text(usize),
}

impl Encoding {
    pub fn byte_len(&self) -> usize {
        match *self {
            Encoding::Unsigned(n) | Encoding::Signed(n) | Encoding::Text(n) => n,
            Encoding::Real32 => 4,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct BasicType {
    pub name: &'static str,
    pub pdo_bits: u32,
    pub sdo_bits: u32,
    /// CoE data type class name (`UNSIGNED8`, `REAL32`, `NULL`, ...).
    pub class: &'static str,
    /// CoE data type code; 0 marks padding.
    pub code: u16,
    /// C declaration pattern, `{}` stands for the symbol.
    pub c_decl: &'static str,
    pub encoding: Encoding,
}

impl BasicType {
    /// Padding entries (class `NULL`).
    pub fn is_null(&self) -> bool {
        self.code == 0
    }

    /// Types that may only be transferred from a byte boundary in process data.
    pub fn is_byte_aligned(&self) -> bool {
        matches!(self.encoding, Encoding::Real32 | Encoding::Text(_))
    }

    /// Slave stack `DEFTYPE_*` token.
    pub fn deftype(&self) -> String {
        format!("DEFTYPE_{}", self.class)
    }

    pub fn c_declaration(&self, symbol: &str) -> String {
        self.c_decl.replace("{}", symbol)
    }
}

macro_rules! basic_type {
    ($name:expr, $pdo:expr, $sdo:expr, $class:expr, $code:expr, $decl:expr, $enc:expr) => {
        BasicType {
            name: $name,
            pdo_bits: $pdo,
            sdo_bits: $sdo,
            class: $class,
            code: $code,
            c_decl: $decl,
            encoding: $enc,
        }
    };
}

static CATALOG: &[BasicType] = &[
    basic_type!(SUBINDEX0, 8, 16, "UNSIGNED8", 5, "uint16_t {}", Encoding::Unsigned(1)),
    basic_type!("PAD1", 1, 1, "NULL", 0, "unsigned {}:1", Encoding::Unsigned(1)),
    basic_type!("PAD2", 2, 2, "NULL", 0, "unsigned {}:2", Encoding::Unsigned(1)),
    basic_type!("PAD3", 3, 3, "NULL", 0, "unsigned {}:3", Encoding::Unsigned(1)),
    basic_type!("PAD4", 4, 4, "NULL", 0, "unsigned {}:4", Encoding::Unsigned(1)),
    basic_type!("PAD5", 5, 5, "NULL", 0, "unsigned {}:5", Encoding::Unsigned(1)),
    basic_type!("PAD6", 6, 6, "NULL", 0, "unsigned {}:6", Encoding::Unsigned(1)),
    basic_type!("PAD7", 7, 7, "NULL", 0, "unsigned {}:7", Encoding::Unsigned(1)),
    basic_type!("PAD8", 8, 8, "NULL", 0, "unsigned {}:8", Encoding::Unsigned(1)),
    basic_type!("BOOL", 1, 1, "BOOLEAN", 1, "unsigned {}:1", Encoding::Unsigned(1)),
    basic_type!("BIT2", 2, 2, "BIT2", 0x31, "unsigned {}:2", Encoding::Unsigned(1)),
    basic_type!("BIT3", 3, 3, "BIT3", 0x32, "unsigned {}:3", Encoding::Unsigned(1)),
    basic_type!("SINT", 8, 8, "INTEGER8", 2, "int8_t {}", Encoding::Signed(1)),
    basic_type!("USINT", 8, 8, "UNSIGNED8", 5, "uint8_t {}", Encoding::Unsigned(1)),
    basic_type!("INT", 16, 16, "INTEGER16", 3, "int16_t {}", Encoding::Signed(2)),
    basic_type!("UINT", 16, 16, "UNSIGNED16", 6, "uint16_t {}", Encoding::Unsigned(2)),
    basic_type!("DINT", 32, 32, "INTEGER32", 4, "int32_t {}", Encoding::Signed(4)),
    basic_type!("UDINT", 32, 32, "UNSIGNED32", 7, "uint32_t {}", Encoding::Unsigned(4)),
    basic_type!("REAL", 32, 32, "REAL32", 8, "float {}", Encoding::Real32),
    basic_type!("STRING(5)", 40, 40, "VISIBLESTRING", 9, "char *{}", Encoding::Text(5)),
    basic_type!("STRING(8)", 64, 64, "VISIBLESTRING", 9, "char *{}", Encoding::Text(8)),
    basic_type!("STRING(10)", 80, 80, "VISIBLESTRING", 9, "char *{}", Encoding::Text(10)),
];

/// Look up a basic type by catalog symbol.
pub fn lookup(name: &str) -> Result<&'static BasicType, CompileError> {
    CATALOG
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| CompileError::UnknownType(name.to_string()))
}

/// All catalog entries in declaration order.
pub fn all() -> &'static [BasicType] {
    CATALOG
}

/// The double-booked sub-object 0 type.
pub fn subindex0() -> &'static BasicType {
    &CATALOG[0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_subindex0_is_double_booked() {
        for t in all() {
            if t.name == SUBINDEX0 {
                assert_eq!((t.pdo_bits, t.sdo_bits), (8, 16));
            } else {
                assert_eq!(t.pdo_bits, t.sdo_bits, "{}", t.name);
            }
        }
    }

    #[test]
    fn unknown_type() {
        assert!(matches!(lookup("LREAL"), Err(CompileError::UnknownType(_))));
        assert_eq!(lookup("STRING(8)").unwrap().pdo_bits, 64);
        assert!(lookup("REAL").unwrap().is_byte_aligned());
        assert!(lookup("PAD3").unwrap().is_null());
    }
}
