//! PDO bit packing: op sequences, generated C statements and the executable collect/scatter.

use coedsl::compile;
use coedsl::pdo::{self, Field, Op};
use coedsl::CompileError;

fn bools(n: usize) -> Vec<Field> {
    (0..n).map(|i| Field::new(format!("in{}", i), 1, false)).collect()
}

// ==================== Op sequences ====================

#[test]
fn eight_bools_then_real() {
    let mut fields = bools(8);
    fields.push(Field::new("temperature", 32, true));
    let packing = pdo::synthesize(&fields).expect("synthesize");

    for (i, f) in packing.fields.iter().take(7).enumerate() {
        assert_eq!(f.ops, vec![Op::Bool { bit: i as u8 }]);
    }
    // the eighth bit rolls the cursor over, so the REAL needs no extra alignment
    assert_eq!(packing.fields[7].ops, vec![Op::Bool { bit: 7 }, Op::Advance]);
    assert_eq!(packing.fields[8].ops, vec![Op::Bytes { len: 4 }]);
    assert_eq!(packing.byte_len(), 5);
}

#[test]
fn real_after_partial_byte_is_aligned() {
    let mut fields = bools(3);
    fields.push(Field::new("temperature", 32, true));
    let packing = pdo::synthesize(&fields).expect("synthesize");
    assert_eq!(packing.fields[2].ops, vec![Op::Bool { bit: 2 }]);
    assert_eq!(packing.fields[3].ops, vec![Op::Advance, Op::Bytes { len: 4 }]);
    assert_eq!(packing.byte_len(), 5);
}

#[test]
fn integer_straddling_bytes() {
    let mut fields = bools(3);
    fields.push(Field::new("count", 16, false));
    let packing = pdo::synthesize(&fields).expect("synthesize");
    let ops = &packing.fields[3].ops;
    let expected = vec![
        Op::Bit { shift: 0, bit: 3 },
        Op::Bit { shift: 1, bit: 4 },
        Op::Bit { shift: 2, bit: 5 },
        Op::Bit { shift: 3, bit: 6 },
        Op::Bit { shift: 4, bit: 7 },
        Op::Advance,
        Op::Byte { shift: 5 },
        Op::Bit { shift: 13, bit: 0 },
        Op::Bit { shift: 14, bit: 1 },
        Op::Bit { shift: 15, bit: 2 },
        Op::Align,
    ];
    assert_eq!(ops, &expected);
    assert_eq!(packing.total_bits(), 19);
    assert_eq!(packing.byte_len(), 3);
}

#[test]
fn aligned_integers_copy_bytes() {
    let fields = vec![Field::new("status", 16, false), Field::new("position", 32, false)];
    let packing = pdo::synthesize(&fields).expect("synthesize");
    assert_eq!(packing.fields[0].ops, vec![Op::Byte { shift: 0 }, Op::Byte { shift: 8 }]);
    assert_eq!(packing.fields[1].ops.len(), 4);
    assert_eq!(packing.byte_len(), 6);
}

#[test]
fn byte_len_rounds_up_bit_count() {
    let cases: Vec<Vec<Field>> = vec![
        bools(1),
        bools(8),
        bools(9),
        vec![Field::new("a", 3, false), Field::new("b", 5, false), Field::new("c", 16, false)],
        vec![Field::new("a", 7, false), Field::new("b", 16, false)],
        vec![Field::new("s", 40, true)],
    ];
    for fields in cases {
        let packing = pdo::synthesize(&fields).expect("synthesize");
        let bits = packing.total_bits() as usize;
        assert_eq!(packing.byte_len(), bits.div_ceil(8), "{:?}", fields);
    }
}

#[test]
fn empty_field_list() {
    let packing = pdo::synthesize(&[]).expect("synthesize");
    assert!(packing.fields.is_empty());
    assert_eq!(packing.byte_len(), 0);
}

#[test]
fn bytewise_field_must_be_whole_bytes() {
    let err = pdo::synthesize(&[Field::new("odd", 12, true)]).unwrap_err();
    assert!(matches!(err, CompileError::Unsupported(_)));
}

// ==================== Generated C ====================

#[test]
fn bool_statements_and_final_align() {
    let packing = pdo::synthesize(&[Field::new("ready", 1, false)]).expect("synthesize");
    let field = &packing.fields[0];
    assert_eq!(
        field.collect(),
        vec![
            "if (ready) *data |= (1 << 0);",
            "else *data &= ~(1 << 0);",
            "data += 1; // byte align to next PDO",
        ]
    );
    assert_eq!(
        field.scatter(),
        vec![
            "if (*data & (1 << 0)) ready = 1;",
            "else ready = 0;",
            "data += 1; // byte align to next PDO",
        ]
    );
}

#[test]
fn byte_and_bulk_statements() {
    let packing = pdo::synthesize(&[Field::new("level", 16, false), Field::new("gain", 32, true)])
        .expect("synthesize");
    assert_eq!(packing.fields[0].collect(), vec!["*data++ = level;", "*data++ = level >> 8;"]);
    assert_eq!(packing.fields[0].scatter(), vec!["level = *data++;", "level |= (*data++ << 8);"]);
    assert_eq!(packing.fields[1].collect(), vec!["memcpy(data, &gain, 4);", "data += 4;"]);
    assert_eq!(packing.fields[1].scatter(), vec!["memcpy(&gain, data, 4);", "data += 4;"]);
}

#[test]
fn bit_statements() {
    let packing = pdo::synthesize(&[Field::new("mode", 2, false)]).expect("synthesize");
    assert_eq!(
        packing.fields[0].collect(),
        vec![
            "if (mode & (1 << 0)) *data |= (1 << 0);",
            "else *data &= ~(1 << 0);",
            "if (mode & (1 << 1)) *data |= (1 << 1);",
            "else *data &= ~(1 << 1);",
            "data += 1; // byte align to next PDO",
        ]
    );
    assert_eq!(
        packing.fields[0].scatter()[..2],
        ["if (*data & (1 << 0)) mode |= (1 << 0);", "else mode &= ~(1 << 0);"]
    );
}

// ==================== Executable sequence ====================

#[test]
fn collect_layout() {
    let mut fields = bools(8);
    fields.push(Field::new("temperature", 32, true));
    let packing = pdo::synthesize(&fields).expect("synthesize");
    let values = [1, 0, 1, 1, 0, 0, 0, 1, 0x4049_0fdb];
    assert_eq!(packing.collect(&values), vec![0x8d, 0xdb, 0x0f, 0x49, 0x40]);
}

#[test]
fn scatter_inverts_collect() {
    let fields = vec![
        Field::new("b0", 1, false),
        Field::new("b1", 1, false),
        Field::new("b2", 1, false),
        Field::new("count", 16, false),
        Field::new("gain", 32, true),
        Field::new("nibble", 4, false),
    ];
    let packing = pdo::synthesize(&fields).expect("synthesize");
    let values = vec![1u128, 0, 1, 0xbeef, 0x4049_0fdb, 0xa];
    let buffer = packing.collect(&values);
    assert_eq!(buffer.len(), packing.byte_len());
    assert_eq!(packing.scatter(&buffer), values);
}

#[test]
fn scatter_short_buffer_reads_zero() {
    let packing = pdo::synthesize(&[Field::new("a", 8, false), Field::new("b", 8, false)]).expect("synthesize");
    assert_eq!(packing.scatter(&[0x12]), vec![0x12, 0]);
}

// ==================== Mapping objects ====================

#[test]
fn mapping_object_fields() {
    let c = compile(
        r#"
record read inputs @0x6000 { BOOL b0; PAD7 gap; UINT count; };
REAL read temperature @0x6100;
UDINT read tx_map[] @0x1A00 = { &inputs.*, &temperature };
"#,
    )
    .expect("compile");
    let dictionary = &c.world.dictionary;
    let map = dictionary.get(0x1A00).expect("map");
    let fields = pdo::map_fields(dictionary, map).expect("fields");
    let names: Vec<&str> = fields.iter().map(|f| f.symbol.as_str()).collect();
    assert_eq!(names, vec!["inputs.b0", "inputs.gap", "inputs.count", "temperature"]);
    assert!(fields[3].byte_aligned);

    let packing = pdo::synthesize_map(dictionary, map).expect("packing");
    assert_eq!(packing.byte_len(), 7);
    assert_eq!(packing.total_bits(), 56);
}

#[test]
fn mapping_entry_without_target_fails() {
    let c = compile("UDINT read tx_map[] @0x1A00 = { 0x70000108 };").expect("compile");
    let map = c.world.dictionary.get(0x1A00).expect("map");
    assert!(matches!(
        pdo::synthesize_map(&c.world.dictionary, map),
        Err(CompileError::UndefinedSymbol(_))
    ));
}
