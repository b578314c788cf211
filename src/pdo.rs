//! PDO bit packing: the byte-buffer transfer sequence for the fields of one mapping object.
//!
//! [`synthesize`] walks the fields with a bit cursor and emits a list of [`Op`]s per
//! field. The same op list renders as C "collect" code (live values into the
//! outgoing buffer) and "scatter" code (incoming buffer back into live values),
//! and can be run directly with [`Packing::collect`] / [`Packing::scatter`].
//!
//! Single bits fill the current byte from bit 0 upwards. Integers are copied a
//! whole byte at a time while the cursor is on a byte boundary and at least 8
//! bits remain, bit by bit otherwise. REAL and STRING fields are first moved to
//! the next byte boundary. After the last field the buffer pointer is moved to
//! the next byte boundary so the following PDO starts aligned.

use crate::dictionary::{Dictionary, Object};
use crate::error::CompileError;
use log::trace;

/// One mapped field, as named in the generated C code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub symbol: String,
    pub bits: u32,
    /// REAL / STRING: copied as whole bytes from a byte boundary.
    pub byte_aligned: bool,
}

impl Field {
    pub fn new(symbol: impl Into<String>, bits: u32, byte_aligned: bool) -> Self {
        Field {
            symbol: symbol.into(),
            bits,
            byte_aligned,
        }
    }
}

/// One step of the transfer sequence. Bit positions refer to the current buffer byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// 1-bit field at bit `bit`.
    Bool { bit: u8 },
    /// Bit `shift` of the field at bit `bit`.
    Bit { shift: u32, bit: u8 },
    /// Aligned byte `field >> shift`; advances the pointer.
    Byte { shift: u32 },
    /// Bulk copy of `len` bytes; advances the pointer.
    Bytes { len: usize },
    /// Bit cursor rolled over, or alignment before a byte-aligned field.
    Advance,
    /// Alignment after the last field of the PDO.
    Align,
}

impl Op {
    /// Bytes the buffer pointer moves by.
    pub fn advance(&self) -> usize {
        match *self {
            Op::Bool { .. } | Op::Bit { .. } => 0,
            Op::Byte { .. } | Op::Advance | Op::Align => 1,
            Op::Bytes { len } => len,
        }
    }

    fn collect(&self, symbol: &str) -> Vec<String> {
        match *self {
            Op::Bool { bit } => vec![
                format!("if ({}) *data |= (1 << {});", symbol, bit),
                format!("else *data &= ~(1 << {});", bit),
            ],
            Op::Bit { shift, bit } => vec![
                format!("if ({} & (1 << {})) *data |= (1 << {});", symbol, shift, bit),
                format!("else *data &= ~(1 << {});", bit),
            ],
            Op::Byte { shift: 0 } => vec![format!("*data++ = {};", symbol)],
            Op::Byte { shift } => vec![format!("*data++ = {} >> {};", symbol, shift)],
            Op::Bytes { len } => vec![
                format!("memcpy(data, &{}, {});", symbol, len),
                format!("data += {};", len),
            ],
            Op::Advance => vec!["data += 1;".to_string()],
            Op::Align => vec!["data += 1; // byte align to next PDO".to_string()],
        }
    }

    fn scatter(&self, symbol: &str) -> Vec<String> {
        match *self {
            Op::Bool { bit } => vec![
                format!("if (*data & (1 << {})) {} = 1;", bit, symbol),
                format!("else {} = 0;", symbol),
            ],
            Op::Bit { shift, bit } => vec![
                format!("if (*data & (1 << {})) {} |= (1 << {});", bit, symbol, shift),
                format!("else {} &= ~(1 << {});", symbol, shift),
            ],
            Op::Byte { shift: 0 } => vec![format!("{} = *data++;", symbol)],
            Op::Byte { shift } => vec![format!("{} |= (*data++ << {});", symbol, shift)],
            Op::Bytes { len } => vec![
                format!("memcpy(&{}, data, {});", symbol, len),
                format!("data += {};", len),
            ],
            Op::Advance | Op::Align => self.collect(symbol),
        }
    }
}

/// A field and the ops that transfer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedField {
    pub field: Field,
    pub ops: Vec<Op>,
}

impl PackedField {
    /// C statements copying the live value into the buffer.
    pub fn collect(&self) -> Vec<String> {
        self.ops.iter().flat_map(|op| op.collect(&self.field.symbol)).collect()
    }

    /// C statements copying the buffer into the live value.
    pub fn scatter(&self) -> Vec<String> {
        self.ops.iter().flat_map(|op| op.scatter(&self.field.symbol)).collect()
    }
}

/// Transfer sequence of one PDO.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packing {
    pub fields: Vec<PackedField>,
}

/// Build the transfer sequence for `fields`, in order.
pub fn synthesize(fields: &[Field]) -> Result<Packing, CompileError> {
    let mut bit_index: u8 = 0;
    let mut packed = Vec::with_capacity(fields.len());
    for field in fields {
        let mut ops = Vec::new();
        if field.bits == 1 {
            ops.push(Op::Bool { bit: bit_index });
            step(&mut bit_index, &mut ops);
        } else if field.byte_aligned {
            if field.bits % 8 != 0 {
                return Err(CompileError::Unsupported(format!(
                    "{}: {} bits cannot be copied bytewise",
                    field.symbol, field.bits
                )));
            }
            if bit_index != 0 {
                bit_index = 0;
                ops.push(Op::Advance);
            }
            ops.push(Op::Bytes {
                len: (field.bits / 8) as usize,
            });
        } else {
            let mut remaining = field.bits;
            let mut shift = 0;
            while remaining > 0 {
                if remaining >= 8 && bit_index == 0 {
                    ops.push(Op::Byte { shift });
                    remaining -= 8;
                    shift += 8;
                } else {
                    ops.push(Op::Bit { shift, bit: bit_index });
                    remaining -= 1;
                    shift += 1;
                    step(&mut bit_index, &mut ops);
                }
            }
        }
        trace!("{} ({} bits): {:?}", field.symbol, field.bits, ops);
        packed.push(PackedField {
            field: field.clone(),
            ops,
        });
    }
    if bit_index != 0 {
        if let Some(last) = packed.last_mut() {
            last.ops.push(Op::Align);
        }
    }
    Ok(Packing { fields: packed })
}

fn step(bit_index: &mut u8, ops: &mut Vec<Op>) {
    *bit_index += 1;
    if *bit_index >= 8 {
        *bit_index = 0;
        ops.push(Op::Advance);
    }
}

/// Fields referenced by a mapping object, named `object.sub` (a variable by its own name).
pub fn map_fields(dictionary: &Dictionary, map: &Object) -> Result<Vec<Field>, CompileError> {
    dictionary
        .map_entries(map)?
        .into_iter()
        .map(|so| {
            let owner = dictionary
                .get(so.index)
                .ok_or_else(|| CompileError::UndefinedSymbol(format!("0x{:04X}", so.index)))?;
            let symbol = if owner.is_variable() {
                owner.symbol.clone()
            } else {
                format!("{}.{}", owner.symbol, so.symbol)
            };
            Ok(Field::new(symbol, so.pdo_bitsize(), so.basic_type.is_byte_aligned()))
        })
        .collect()
}

/// Transfer sequence of a mapping object.
pub fn synthesize_map(dictionary: &Dictionary, map: &Object) -> Result<Packing, CompileError> {
    synthesize(&map_fields(dictionary, map)?)
}

impl Packing {
    /// Bytes the whole sequence moves the buffer pointer by.
    pub fn byte_len(&self) -> usize {
        self.ops().map(|(_, op)| op.advance()).sum()
    }

    pub fn total_bits(&self) -> u32 {
        self.fields.iter().map(|f| f.field.bits).sum()
    }

    fn ops(&self) -> impl Iterator<Item = (usize, &Op)> {
        self.fields
            .iter()
            .enumerate()
            .flat_map(|(i, f)| f.ops.iter().map(move |op| (i, op)))
    }

    /// Run the collect sequence over field values (low `bits` of each are used).
    pub fn collect(&self, values: &[u128]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.byte_len());
        let mut pos = 0usize;
        for (i, op) in self.ops() {
            let value = values.get(i).copied().unwrap_or(0);
            match *op {
                Op::Bool { bit } => write_bit(&mut buf, pos, bit, value & 1 != 0),
                Op::Bit { shift, bit } => write_bit(&mut buf, pos, bit, (value >> shift) & 1 != 0),
                Op::Byte { shift } => *byte_at(&mut buf, pos) = (value >> shift) as u8,
                Op::Bytes { len } => {
                    for (k, b) in value.to_le_bytes().iter().take(len).enumerate() {
                        *byte_at(&mut buf, pos + k) = *b;
                    }
                }
                Op::Advance | Op::Align => {}
            }
            pos += op.advance();
        }
        buf.resize(self.byte_len(), 0);
        buf
    }

    /// Run the scatter sequence over a received buffer; missing bytes read as zero.
    pub fn scatter(&self, data: &[u8]) -> Vec<u128> {
        let mut values = vec![0u128; self.fields.len()];
        let mut pos = 0usize;
        for (i, op) in self.ops() {
            let byte = data.get(pos).copied().unwrap_or(0);
            let value = &mut values[i];
            match *op {
                Op::Bool { bit } => *value = u128::from((byte >> bit) & 1),
                Op::Bit { shift, bit } => {
                    if (byte >> bit) & 1 != 0 {
                        *value |= 1u128 << shift;
                    } else {
                        *value &= !(1u128 << shift);
                    }
                }
                Op::Byte { shift } => *value |= u128::from(byte) << shift,
                Op::Bytes { len } => {
                    let mut raw = [0u8; 16];
                    for (k, slot) in raw.iter_mut().take(len).enumerate() {
                        *slot = data.get(pos + k).copied().unwrap_or(0);
                    }
                    *value = u128::from_le_bytes(raw);
                }
                Op::Advance | Op::Align => {}
            }
            pos += op.advance();
        }
        values
    }
}

fn byte_at(buf: &mut Vec<u8>, pos: usize) -> &mut u8 {
    if buf.len() <= pos {
        buf.resize(pos + 1, 0);
    }
    &mut buf[pos]
}

fn write_bit(buf: &mut Vec<u8>, pos: usize, bit: u8, set: bool) {
    let byte = byte_at(buf, pos);
    if set {
        *byte |= 1 << bit;
    } else {
        *byte &= !(1 << bit);
    }
}
