//! CoE object dictionary: objects, sub-objects, access permissions and PDO map references.
//!
//! An [`Object`] always aggregates one or more [`SubObject`]s where the data lives.
//! A variable has exactly one sub-object (`:00`). Arrays and records keep their
//! element/field count in sub-object 0 (typed [`types::SUBINDEX0`]) followed by
//! the payload sub-objects `1..=N`.

use crate::error::CompileError;
use crate::types::{self, BasicType, Encoding};
use crate::value::{hex_i64, Value};
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// Access permission bitmask of a sub-object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Access(u16);

/// Character and bit of each position of the `rwrwrwRT` string form.
const ACCESS_STRING: [(char, u16); 8] = [
    ('r', 0x01),
    ('w', 0x08),
    ('r', 0x02),
    ('w', 0x10),
    ('r', 0x04),
    ('w', 0x20),
    ('R', 0x40),
    ('T', 0x80),
];

impl Access {
    pub const NONE: Access = Access(0);
    pub const READ_PREOP: Access = Access(0x01);
    pub const READ_SAFEOP: Access = Access(0x02);
    pub const READ_OP: Access = Access(0x04);
    pub const WRITE_PREOP: Access = Access(0x08);
    pub const WRITE_SAFEOP: Access = Access(0x10);
    pub const WRITE_OP: Access = Access(0x20);
    pub const RX_PDO: Access = Access(0x40);
    pub const TX_PDO: Access = Access(0x80);
    pub const BACKUP: Access = Access(0x100);
    pub const SETTINGS: Access = Access(0x200);
    pub const SAFE_INPUTS: Access = Access(0x400);
    pub const SAFE_OUTPUTS: Access = Access(0x800);
    pub const SAFE_PARAMETER: Access = Access(0x1000);
    pub const READ: Access = Access(0x07);
    pub const WRITE: Access = Access(0x38);
    pub const READWRITE: Access = Access(0x3f);

    pub const fn from_bits(bits: u16) -> Self {
        Access(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Access) -> bool {
        self.0 & other.0 == other.0
    }

    /// DSL access keyword. `no_pdo_mapping` is accepted and grants nothing.
    pub fn from_keyword(keyword: &str) -> Option<Access> {
        let access = match keyword {
            "readwrite" => Access::READWRITE,
            "read" => Access::READ,
            "read_preop" => Access::READ_PREOP,
            "read_safeop" => Access::READ_SAFEOP,
            "read_op" => Access::READ_OP,
            "write" => Access::WRITE,
            "write_preop" => Access::WRITE_PREOP,
            "write_safeop" => Access::WRITE_SAFEOP,
            "write_op" => Access::WRITE_OP,
            "no_pdo_mapping" => Access::NONE,
            "rx_pdo_mapping" => Access::RX_PDO,
            "tx_pdo_mapping" => Access::TX_PDO,
            "backup" => Access::BACKUP,
            "settings" => Access::SETTINGS,
            "safe_inputs" => Access::SAFE_INPUTS,
            "safe_outputs" => Access::SAFE_OUTPUTS,
            "safe_parameter" => Access::SAFE_PARAMETER,
            _ => return None,
        };
        Some(access)
    }

    pub fn is_tx_pdo(self) -> bool {
        self.contains(Access::TX_PDO)
    }

    pub fn is_rx_pdo(self) -> bool {
        self.contains(Access::RX_PDO)
    }

    pub fn hex(self) -> String {
        format!("{:#x}", self.0)
    }
}

impl BitOr for Access {
    type Output = Access;
    fn bitor(self, rhs: Access) -> Access {
        Access(self.0 | rhs.0)
    }
}

impl BitOrAssign for Access {
    fn bitor_assign(&mut self, rhs: Access) {
        self.0 |= rhs.0;
    }
}

/// `rwrwrwRT`: read/write at PREOP, SAFEOP, OP, then Rx/Tx PDO mapping. `-` marks an absent bit.
impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (c, bit) in ACCESS_STRING {
            let c = if self.0 & bit == 0 { '-' } else { c };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl FromStr for Access {
    type Err = CompileError;

    /// Short strings are padded with `-` (so `r-r-r-` is read-only without PDO mapping).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.chars().count() > ACCESS_STRING.len() {
            return Err(CompileError::InvalidAccess(s.to_string()));
        }
        let mut bits = 0u16;
        let mut chars = s.chars();
        for (expected, bit) in ACCESS_STRING {
            match chars.next().unwrap_or('-') {
                '-' => {}
                c if c == expected => bits |= bit,
                _ => return Err(CompileError::InvalidAccess(s.to_string())),
            }
        }
        Ok(Access(bits))
    }
}

/// Direction of a PDO mapping, from the master's point of view of the slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdoDirection {
    /// RxPDO, mapping objects 0x16xx.
    Receive,
    /// TxPDO, mapping objects 0x1Axx.
    Transmit,
}

impl PdoDirection {
    pub fn from_map_index(index: u16) -> Option<Self> {
        match index >> 8 {
            0x16 => Some(PdoDirection::Receive),
            0x1A => Some(PdoDirection::Transmit),
            _ => None,
        }
    }

    pub fn flag(self) -> Access {
        match self {
            PdoDirection::Receive => Access::RX_PDO,
            PdoDirection::Transmit => Access::TX_PDO,
        }
    }
}

/// Pack an (index, subindex, bitsize) triple into the 32-bit PDO mapping entry.
pub fn pack_reference(index: u16, subindex: u8, bitsize: u8) -> u32 {
    (index as u32) << 16 | (subindex as u32) << 8 | bitsize as u32
}

pub fn unpack_reference(reference: u32) -> (u16, u8, u8) {
    (
        (reference >> 16) as u16,
        (reference >> 8) as u8,
        reference as u8,
    )
}

fn default_sub_description(subindex: u8) -> String {
    format!("SubIndex {:03}", subindex)
}

/// Description given to objects declared without one.
pub fn default_object_description(index: u16) -> String {
    format!("Index 0x{:04X}", index)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubObject {
    pub index: u16,
    pub subindex: u8,
    pub access: Access,
    pub basic_type: &'static BasicType,
    pub symbol: String,
    pub default: Value,
    pub description: String,
}

impl SubObject {
    pub fn new(
        index: u16,
        subindex: u8,
        access: Access,
        basic_type: &'static BasicType,
        symbol: impl Into<String>,
        default: Value,
        description: Option<String>,
    ) -> Self {
        SubObject {
            index,
            subindex,
            access,
            basic_type,
            symbol: symbol.into(),
            default,
            description: description.unwrap_or_else(|| default_sub_description(subindex)),
        }
    }

    pub fn pdo_bitsize(&self) -> u32 {
        self.basic_type.pdo_bits
    }

    pub fn sdo_bitsize(&self) -> u32 {
        self.basic_type.sdo_bits
    }

    /// Packed `index << 16 | subindex << 8 | pdo_bitsize` mapping entry.
    pub fn reference(&self) -> u32 {
        pack_reference(self.index, self.subindex, self.pdo_bitsize() as u8)
    }

    pub fn is_null(&self) -> bool {
        self.basic_type.is_null()
    }

    pub fn deftype(&self) -> String {
        self.basic_type.deftype()
    }

    /// C declaration of this sub-object's storage.
    pub fn ctype(&self) -> String {
        self.basic_type.c_declaration(&self.symbol)
    }

    /// Index in EtherCATInfo XML hex format.
    pub fn xml_index(&self) -> String {
        format!("#x{:04X}", self.index)
    }

    /// Little-endian bytes of the default value in this sub-object's encoding.
    pub fn encoded_default(&self) -> Result<Vec<u8>, CompileError> {
        encode_value(self.basic_type, &self.default, &self.symbol)
    }

    /// `xs:hexBinary` representation of the default value.
    pub fn hexbinary_default(&self) -> Result<String, CompileError> {
        Ok(self
            .encoded_default()?
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect())
    }

    /// `HexDecValue` representation of the default value; negatives clamp to zero.
    pub fn hexdec_default(&self) -> String {
        match &self.default {
            Value::Int(x) => format!("#x{:x}", (*x).max(0)),
            Value::Real(x) => format!("#x{:x}", (*x as f32).to_bits()),
            Value::Str(_) => "#x0".to_string(),
        }
    }
}

impl fmt::Display for SubObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x}:{:02x}, {}, {}, {} bit, {} [{}]",
            self.index,
            self.subindex,
            self.access,
            self.basic_type.name,
            self.pdo_bitsize(),
            self.description,
            self.default
        )
    }
}

fn encode_value(
    basic_type: &BasicType,
    value: &Value,
    field: &str,
) -> Result<Vec<u8>, CompileError> {
    let mismatch = |expected: &'static str| CompileError::TypeMismatch {
        context: format!("default of {}", field),
        expected,
        found: value.kind().to_string(),
    };
    let mut out = Vec::with_capacity(basic_type.encoding.byte_len());
    match basic_type.encoding {
        Encoding::Unsigned(n) => {
            let v = value.as_i64().ok_or_else(|| mismatch("integer"))?;
            let max = if n >= 8 { u64::MAX } else { (1u64 << (8 * n)) - 1 };
            if v < 0 || v as u64 > max {
                return Err(CompileError::overflow(field, v));
            }
            out.write_uint::<LittleEndian>(v as u64, n)
                .map_err(|e| CompileError::io(field, e))?;
        }
        Encoding::Signed(n) => {
            let v = value.as_i64().ok_or_else(|| mismatch("integer"))?;
            let bits = 8 * n as u32;
            let (min, max) = (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1);
            if v < min || v > max {
                return Err(CompileError::overflow(field, v));
            }
            out.write_int::<LittleEndian>(v, n)
                .map_err(|e| CompileError::io(field, e))?;
        }
        Encoding::Real32 => {
            let v = value.as_f64().ok_or_else(|| mismatch("number"))?;
            out.write_f32::<LittleEndian>(v as f32)
                .map_err(|e| CompileError::io(field, e))?;
        }
        Encoding::Text(n) => {
            let bytes = match value {
                Value::Str(s) => s.as_bytes(),
                Value::Int(0) => &[],
                _ => return Err(mismatch("string")),
            };
            if bytes.len() > n {
                return Err(CompileError::overflow(field, format!("{} bytes > {}", bytes.len(), n)));
            }
            out.extend_from_slice(bytes);
            out.resize(n, 0);
        }
    }
    Ok(out)
}

/// CoE object code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectCode {
    Variable = 7,
    Array = 8,
    Record = 9,
}

impl ObjectCode {
    pub fn name(self) -> &'static str {
        match self {
            ObjectCode::Variable => "variable",
            ObjectCode::Array => "array",
            ObjectCode::Record => "record",
        }
    }
}

/// Construction parameters of a variable (single sub-object at subindex 0).
#[derive(Debug, Clone)]
pub struct VariableSpec {
    pub access: Access,
    pub basic_type: &'static BasicType,
    pub default: Value,
}

/// Construction parameters of an array: one basic type and access for every element.
#[derive(Debug, Clone)]
pub struct ArraySpec {
    pub access: Access,
    pub basic_type: &'static BasicType,
    /// Declared element count; `None` infers it from `values`.
    pub size: Option<usize>,
    pub values: Vec<Value>,
}

/// One record field. `subindex: None` takes the previous subindex + 1.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub subindex: Option<u8>,
    pub access: Access,
    pub basic_type: &'static BasicType,
    pub symbol: String,
    pub default: Value,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordSpec {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub code: ObjectCode,
    pub index: u16,
    pub symbol: String,
    pub description: String,
    subs: Vec<SubObject>,
    /// Arbitrary `.key = value` annotations.
    pub properties: BTreeMap<String, Value>,
}

impl Object {
    pub fn variable(
        index: u16,
        symbol: impl Into<String>,
        description: impl Into<String>,
        spec: VariableSpec,
    ) -> Object {
        let symbol = symbol.into();
        let description = description.into();
        let sub = SubObject::new(
            index,
            0,
            spec.access,
            spec.basic_type,
            symbol.clone(),
            spec.default,
            Some(description.clone()),
        );
        Object {
            code: ObjectCode::Variable,
            index,
            symbol,
            description,
            subs: vec![sub],
            properties: BTreeMap::new(),
        }
    }

    /// Build an array. More values than an explicit size is an error; fewer are zero padded.
    pub fn array(
        index: u16,
        symbol: impl Into<String>,
        description: impl Into<String>,
        spec: ArraySpec,
    ) -> Result<Object, CompileError> {
        let symbol = symbol.into();
        let size = match spec.size {
            Some(size) if spec.values.len() > size => {
                return Err(CompileError::ArrayOversize {
                    symbol,
                    expected: size,
                    actual: spec.values.len(),
                })
            }
            Some(size) => size,
            None => spec.values.len(),
        };
        if size > u8::MAX as usize {
            return Err(CompileError::overflow(format!("{} element count", symbol), size));
        }
        let mut subs = Vec::with_capacity(size + 1);
        subs.push(count_subobject(index, size));
        let padding = std::iter::repeat(Value::Int(0)).take(size - spec.values.len());
        for (i, value) in spec.values.into_iter().chain(padding).enumerate() {
            subs.push(SubObject::new(
                index,
                (i + 1) as u8,
                spec.access,
                spec.basic_type,
                format!("data_{}", i),
                value,
                None,
            ));
        }
        Ok(Object {
            code: ObjectCode::Array,
            index,
            symbol,
            description: description.into(),
            subs,
            properties: BTreeMap::new(),
        })
    }

    /// Build a record; sub-object 0 holds the number of fields.
    pub fn record(
        index: u16,
        symbol: impl Into<String>,
        description: impl Into<String>,
        spec: &RecordSpec,
    ) -> Result<Object, CompileError> {
        let symbol = symbol.into();
        if spec.fields.len() > u8::MAX as usize {
            return Err(CompileError::overflow(
                format!("{} field count", symbol),
                spec.fields.len(),
            ));
        }
        let mut subs = Vec::with_capacity(spec.fields.len() + 1);
        subs.push(count_subobject(index, spec.fields.len()));
        let mut previous = 0u8;
        for field in &spec.fields {
            let subindex = match field.subindex {
                Some(s) if s > previous => s,
                Some(s) => {
                    return Err(CompileError::SubindexOrder {
                        symbol: format!("{}.{}", symbol, field.symbol),
                        subindex: s as u32,
                    })
                }
                None => previous.checked_add(1).ok_or_else(|| {
                    CompileError::overflow(format!("{}.{} subindex", symbol, field.symbol), 256)
                })?,
            };
            previous = subindex;
            subs.push(SubObject::new(
                index,
                subindex,
                field.access,
                field.basic_type,
                field.symbol.clone(),
                field.default.clone(),
                field.description.clone(),
            ));
        }
        Ok(Object {
            code: ObjectCode::Record,
            index,
            symbol,
            description: description.into(),
            subs,
            properties: BTreeMap::new(),
        })
    }

    pub fn is_variable(&self) -> bool {
        self.code == ObjectCode::Variable
    }

    pub fn is_array(&self) -> bool {
        self.code == ObjectCode::Array
    }

    pub fn is_record(&self) -> bool {
        self.code == ObjectCode::Record
    }

    pub fn pdo_direction(&self) -> Option<PdoDirection> {
        PdoDirection::from_map_index(self.index)
    }

    pub fn is_rx_pdo_map(&self) -> bool {
        self.pdo_direction() == Some(PdoDirection::Receive)
    }

    pub fn is_tx_pdo_map(&self) -> bool {
        self.pdo_direction() == Some(PdoDirection::Transmit)
    }

    pub fn subs(&self) -> &[SubObject] {
        &self.subs
    }

    pub fn sub(&self, subindex: u8) -> Option<&SubObject> {
        self.subs.iter().find(|s| s.subindex == subindex)
    }

    pub(crate) fn sub_mut(&mut self, subindex: u8) -> Option<&mut SubObject> {
        self.subs.iter_mut().find(|s| s.subindex == subindex)
    }

    /// Sub-objects after the count entry (all of them for a variable).
    pub fn payload(&self) -> &[SubObject] {
        match self.code {
            ObjectCode::Variable => &self.subs,
            ObjectCode::Array | ObjectCode::Record => &self.subs[1..],
        }
    }

    pub fn hex_index(&self) -> String {
        format!("{:04X}", self.index)
    }

    pub fn xml_index(&self) -> String {
        format!("#x{:04X}", self.index)
    }

    pub fn max_subindex(&self) -> u8 {
        self.subs.iter().map(|s| s.subindex).max().unwrap_or(0)
    }

    /// Comma separated hex defaults for a C initializer.
    pub fn hex_defaults(&self) -> String {
        self.subs
            .iter()
            .map(|s| match &s.default {
                Value::Int(x) => hex_i64(*x),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Process data size in bits, excluding subindex 0.
    pub fn pdo_data_bitsize(&self) -> u32 {
        self.subs
            .iter()
            .filter(|s| s.subindex > 0)
            .map(SubObject::pdo_bitsize)
            .sum()
    }

    /// SDO memory size in bits, including the 16-bit subindex 0 slot.
    pub fn sdo_bitsize(&self) -> u32 {
        self.subs.iter().map(SubObject::sdo_bitsize).sum()
    }

    /// Bit offset of `subindex` within the SDO complete-access memory image.
    pub fn sdo_bitoffset(&self, subindex: u8) -> u32 {
        self.subs
            .iter()
            .filter(|s| s.subindex < subindex)
            .map(SubObject::sdo_bitsize)
            .sum()
    }

    /// Slave stack `DEFTYPE_*` classification of the whole object.
    pub fn deftype(&self) -> String {
        match self.code {
            ObjectCode::Variable => self.subs[0].deftype(),
            ObjectCode::Array => self.subs.get(1).unwrap_or(&self.subs[0]).deftype(),
            ObjectCode::Record if self.pdo_direction().is_some() => "DEFTYPE_PDOMAPPING".to_string(),
            ObjectCode::Record => "DEFTYPE_RECORD".to_string(),
        }
    }

    /// `object_code << 8 | max_subindex`, as used by the slave stack object descriptions.
    pub fn object_flags(&self) -> u16 {
        (self.code as u16) << 8 | self.max_subindex() as u16
    }
}

fn count_subobject(index: u16, count: usize) -> SubObject {
    SubObject::new(
        index,
        0,
        Access::READ,
        types::subindex0(),
        "u16SubIndex0",
        Value::Int(count as i64),
        Some("Subindex 000".to_string()),
    )
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SDO 0x{:04x}, {:?}", self.index, self.description)?;
        for sub in &self.subs {
            write!(f, "\n\t{}", sub)?;
        }
        Ok(())
    }
}

/// The resolved dictionary, in declaration order. Indices are unique.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    objects: Vec<Object>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn insert(&mut self, object: Object) -> Result<(), CompileError> {
        if self.get(object.index).is_some() {
            return Err(CompileError::DuplicateIndex(object.index));
        }
        self.objects.push(object);
        Ok(())
    }

    pub fn get(&self, index: u16) -> Option<&Object> {
        self.objects.iter().find(|o| o.index == index)
    }

    pub(crate) fn get_mut(&mut self, index: u16) -> Option<&mut Object> {
        self.objects.iter_mut().find(|o| o.index == index)
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Object> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Sub-object addressed by a packed mapping entry (bit size is ignored).
    pub fn find_by_reference(&self, reference: u32) -> Option<&SubObject> {
        let (index, subindex, _) = unpack_reference(reference);
        self.get(index)?.sub(subindex)
    }

    /// Sub-objects referenced by every mapping object of one direction, in mapping order.
    pub fn mapped_subobjects(&self, direction: PdoDirection) -> Result<Vec<&SubObject>, CompileError> {
        let mut out = Vec::new();
        for map in self.objects.iter().filter(|o| o.pdo_direction() == Some(direction)) {
            out.extend(self.map_entries(map)?);
        }
        Ok(out)
    }

    /// Sub-objects referenced by one mapping object. Zero entries are reserved slots and skipped.
    pub fn map_entries<'a>(&'a self, map: &Object) -> Result<Vec<&'a SubObject>, CompileError> {
        let mut out = Vec::new();
        for entry in map.payload() {
            let reference = entry
                .default
                .as_i64()
                .and_then(|r| u32::try_from(r).ok())
                .ok_or_else(|| CompileError::TypeMismatch {
                    context: format!("{}.{}", map.symbol, entry.symbol),
                    expected: "PDO mapping reference",
                    found: entry.default.to_string(),
                })?;
            if reference == 0 {
                continue;
            }
            let sub = self.find_by_reference(reference).ok_or_else(|| {
                CompileError::UndefinedSymbol(format!("&0x{:08X} in {}", reference, map.symbol))
            })?;
            out.push(sub);
        }
        Ok(out)
    }

    /// OR the direction flag into the sub-object a mapping entry points at. Returns false if absent.
    pub(crate) fn tag_pdo(&mut self, reference: u32, direction: PdoDirection) -> bool {
        let (index, subindex, _) = unpack_reference(reference);
        match self.get_mut(index).and_then(|o| o.sub_mut(subindex)) {
            Some(sub) => {
                sub.access |= direction.flag();
                true
            }
            None => false,
        }
    }

    /// Build the mapping object at `map_index` for the payload object at `source_index`,
    /// tagging every referenced sub-object with the mapping direction.
    pub fn synthesize_pdo_map(&mut self, map_index: u16, source_index: u16) -> Result<(), CompileError> {
        let direction = PdoDirection::from_map_index(map_index).ok_or_else(|| {
            CompileError::Unsupported(format!("0x{:04X} is not a PDO mapping index", map_index))
        })?;
        let source = self
            .get(source_index)
            .ok_or_else(|| CompileError::UndefinedSymbol(format!("0x{:04X}", source_index)))?;
        let udint = types::lookup("UDINT")?;
        let spec = RecordSpec {
            fields: source
                .payload()
                .iter()
                .map(|so| FieldSpec {
                    subindex: None,
                    access: Access::READ,
                    basic_type: udint,
                    symbol: so.symbol.clone(),
                    default: Value::from(so.reference()),
                    description: Some(so.description.clone()),
                })
                .collect(),
        };
        let references: Vec<u32> = source.payload().iter().map(SubObject::reference).collect();
        let map = Object::record(
            map_index,
            format!("{}_map", source.symbol),
            format!("PDO Map: {}", source.description),
            &spec,
        )?;
        self.insert(map)?;
        for reference in references {
            self.tag_pdo(reference, direction);
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = &'a Object;
    type IntoIter = std::slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_string_round_trip() {
        for bits in 0..=0xffu16 {
            let a = Access::from_bits(bits);
            let parsed: Access = a.to_string().parse().expect("parse");
            assert_eq!(parsed, a);
        }
    }

    #[test]
    fn access_string_positions() {
        assert_eq!(Access::READ.to_string(), "r-r-r---");
        assert_eq!(Access::WRITE.to_string(), "-w-w-w--");
        assert_eq!((Access::READ | Access::TX_PDO).to_string(), "r-r-r--T");
        assert_eq!("rw".parse::<Access>().unwrap(), Access::READ_PREOP | Access::WRITE_PREOP);
        assert!("wr".parse::<Access>().is_err());
        assert!("rwrwrwRTx".parse::<Access>().is_err());
    }

    #[test]
    fn reference_round_trip() {
        for &(index, subindex, bits) in &[(0u16, 0u8, 0u8), (0x6000, 1, 1), (0xffff, 0xff, 0xff), (0x1a00, 0x12, 32)] {
            assert_eq!(unpack_reference(pack_reference(index, subindex, bits)), (index, subindex, bits));
        }
        assert_eq!(pack_reference(0x7000, 0x10, 8), 0x7000_1008);
    }
}
