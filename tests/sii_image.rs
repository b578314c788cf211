//! SII EEPROM image: configuration area, checksum, category blocks and size limits.

use coedsl::sii::{self, CATEGORY_DC, CATEGORY_FMMU, CATEGORY_GENERAL, CATEGORY_SM, CATEGORY_STRINGS};
use coedsl::{CompileError, Settings, Value};

fn settings(entries: &[(&str, Value)]) -> Settings {
    entries.iter().map(|(k, v)| (*k, v.clone())).collect()
}

fn category_kinds(image: &[u8]) -> Vec<u16> {
    sii::categories(image)
        .expect("categories")
        .into_iter()
        .map(|(kind, _)| kind)
        .collect()
}

// ==================== Configuration area ====================

#[test]
fn crc_of_default_head() {
    let head = [0x80, 0x00, 0xe0, 0x00, 0xe8, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
    assert_eq!(sii::crc8(&head), 0x3c);
    assert_eq!(sii::crc8(&[]), 0xff);
}

#[test]
fn config_area_defaults() {
    let image = sii::build_image(&Settings::new()).expect("image");
    let bytes = &image.bytes;
    assert_eq!(&bytes[..6], &[0x80, 0x00, 0xe0, 0x00, 0xe8, 0x03]);
    assert_eq!(image.checksum, 0x3c);
    assert_eq!(&bytes[0x0e..0x10], &[0x3c, 0x00]);
    assert_eq!(&bytes[0x10..0x14], &[0xff; 4], "vendor id");
    assert_eq!(&bytes[0x18..0x1c], &[0x01, 0x00, 0x00, 0x00], "revision");
    assert_eq!(&bytes[0x7c..0x80], &[0x0f, 0x00, 0x01, 0x00], "size and version");
    assert_eq!(image.published.str("config_data"), Some("8000E000E8030000000000000000"));
    assert_eq!(image.published.str("bootstrap"), Some("0010800000148000"));
    assert_eq!(image.published.get("sii.checksum"), Some(&Value::Int(0x3c)));
}

#[test]
fn checksum_tracks_head() {
    let s = settings(&[("sta_alias", Value::Int(1)), ("VENDOR_ID", Value::Int(0xabcd))]);
    let image = sii::build_image(&s).expect("image");
    assert_eq!(image.bytes[0x0e], sii::crc8(&image.bytes[..sii::CHECKSUM_LEN]));
    assert_ne!(image.checksum, 0x3c);
    assert_eq!(&image.bytes[0x10..0x14], &[0xcd, 0xab, 0x00, 0x00]);
}

// ==================== Categories ====================

#[test]
fn minimal_image_layout() {
    let image = sii::build_image(&Settings::new()).expect("image");
    assert_eq!(image.bytes.len(), 0x800);
    assert!(image.strings.is_empty());
    let cats = sii::categories(&image.bytes).expect("categories");
    assert_eq!(cats.len(), 2);
    assert_eq!(cats[0].0, CATEGORY_GENERAL);
    assert_eq!(cats[0].1.len(), 32);
    assert_eq!(cats[1], (CATEGORY_FMMU, &[0xff, 0xff][..]));
    let end = sii::CONFIG_AREA_LEN + 4 + 32 + 4 + 2;
    assert!(image.bytes[end..].iter().all(|&b| b == 0xff));
}

#[test]
fn strings_are_indexed_in_order() {
    let s = settings(&[
        ("DEVICE_NAME", Value::from("Gadget")),
        ("TYPE_NAME", Value::from("T1")),
    ]);
    let image = sii::build_image(&s).expect("image");
    assert_eq!(image.strings, vec!["T1".to_string(), "Gadget".to_string()]);
    assert_eq!(image.published.get("TYPE_IDX"), Some(&Value::Int(1)));
    assert_eq!(image.published.get("DEVICE_IDX"), Some(&Value::Int(2)));
    assert_eq!(image.published.get("GROUP_IDX"), Some(&Value::Int(0)));

    let cats = sii::categories(&image.bytes).expect("categories");
    assert_eq!(cats[0].0, CATEGORY_STRINGS);
    assert_eq!(cats[0].1, b"\x02\x02T1\x06Gadget\x00");
    let general = cats[1].1;
    assert_eq!(&general[..4], &[0, 0, 0, 2], "group, image, order, device");
}

#[test]
fn string_setting_must_be_text() {
    let s = settings(&[("DEVICE_NAME", Value::Int(5))]);
    assert!(matches!(sii::build_image(&s), Err(CompileError::TypeMismatch { .. })));
}

#[test]
fn general_category_fields() {
    let s = settings(&[
        ("coe_details", Value::Int(0x23)),
        ("current_on_ebus", Value::Int(-100)),
        ("sii.phys_port", Value::Int(0x11)),
    ]);
    let image = sii::build_image(&s).expect("image");
    let cats = sii::categories(&image.bytes).expect("categories");
    let general = cats[0].1;
    assert_eq!(general[5], 0x23);
    assert_eq!(&general[12..14], &(-100i16).to_le_bytes());
    assert_eq!(&general[16..18], &[0x11, 0x00]);
}

#[test]
fn fmmu_trailing_unused_entries_are_dropped() {
    let cases: &[(&[(&str, i64)], &[u8])] = &[
        (&[("fmmu0.mode", 1), ("fmmu1.mode", 2)], &[1, 2]),
        (&[("fmmu0.mode", 1)], &[1, 0xff]),
        (&[("fmmu0.mode", 1), ("fmmu2.mode", 3)], &[1, 0xff, 3, 0xff]),
    ];
    for (entries, expected) in cases {
        let s: Settings = entries.iter().map(|&(k, v)| (k, v)).collect();
        let image = sii::build_image(&s).expect("image");
        let cats = sii::categories(&image.bytes).expect("categories");
        let fmmu = cats.iter().find(|(kind, _)| *kind == CATEGORY_FMMU).expect("fmmu");
        assert_eq!(fmmu.1, *expected);
    }
}

#[test]
fn sync_managers_keep_their_position() {
    let s = settings(&[
        ("sm2.enable", Value::Int(1)),
        ("sm2.start_addr", Value::Int(0x1100)),
        ("sm2.size", Value::Int(4)),
        ("sm2.control", Value::Int(0x24)),
        ("sm2.type", Value::Int(3)),
    ]);
    let image = sii::build_image(&s).expect("image");
    let cats = sii::categories(&image.bytes).expect("categories");
    let (_, sm) = cats.iter().find(|(kind, _)| *kind == CATEGORY_SM).expect("sm category");
    assert_eq!(sm.len(), 24);
    assert!(sm[..16].iter().all(|&b| b == 0));
    assert_eq!(&sm[16..], &[0x00, 0x11, 0x04, 0x00, 0x24, 0x00, 0x01, 0x03]);
}

#[test]
fn no_enabled_sync_manager_means_no_category() {
    let s = settings(&[("sm0.start_addr", Value::Int(0x1000)), ("sm1.enable", Value::Int(0))]);
    let image = sii::build_image(&s).expect("image");
    assert!(!category_kinds(&image.bytes).contains(&CATEGORY_SM));
}

#[test]
fn distributed_clock_units() {
    let s = settings(&[
        ("DC_SUPPORTED", Value::Int(1)),
        ("dc0.name", Value::from("SYNC0")),
        ("dc0.assign_activate", Value::Int(0x300)),
        ("dc0.sync0_shift", Value::Int(-1)),
    ]);
    let image = sii::build_image(&s).expect("image");
    assert_eq!(image.strings, vec!["SYNC0".to_string()]);
    assert_eq!(image.published.get("dc0.name_idx"), Some(&Value::Int(1)));
    assert_eq!(
        category_kinds(&image.bytes),
        vec![CATEGORY_STRINGS, CATEGORY_GENERAL, CATEGORY_FMMU, CATEGORY_DC]
    );
    let cats = sii::categories(&image.bytes).expect("categories");
    let (_, dc) = cats[3];
    assert_eq!(dc.len(), 24);
    assert_eq!(&dc[4..8], &[0xff; 4]);
    assert_eq!(&dc[14..16], &[0x00, 0x03]);
    assert_eq!(dc[18], 1);
}

#[test]
fn dc_disabled_omits_category_and_names() {
    let s = settings(&[("DC_SUPPORTED", Value::Int(0)), ("dc0.name", Value::from("SYNC0"))]);
    let image = sii::build_image(&s).expect("image");
    assert!(image.strings.is_empty());
    assert!(!category_kinds(&image.bytes).contains(&CATEGORY_DC));
    assert_eq!(image.bytes.len(), 0x800);
    assert_eq!(*image.bytes.last().unwrap(), 0xff);
}

// ==================== Limits ====================

#[test]
fn oversize_value_is_rejected() {
    let s = settings(&[("VENDOR_ID", Value::Int(0x1_0000_0000))]);
    match sii::build_image(&s) {
        Err(CompileError::LayoutOverflow { field, .. }) => assert_eq!(field, "VENDOR_ID"),
        other => panic!("expected overflow, got {:?}", other),
    }
    let s = settings(&[("sm0.enable", Value::Int(1)), ("sm0.start_addr", Value::Int(-1))]);
    assert!(matches!(sii::build_image(&s), Err(CompileError::LayoutOverflow { .. })));
}

#[test]
fn image_must_fit_eeprom() {
    let s = settings(&[("ESC_EEPROM_SIZE", Value::Int(160))]);
    assert!(matches!(sii::build_image(&s), Err(CompileError::LayoutOverflow { .. })));
    let s = settings(&[("ESC_EEPROM_SIZE", Value::Int(256))]);
    assert_eq!(sii::build_image(&s).expect("image").bytes.len(), 256);
}

#[test]
fn initializer_covers_whole_image() {
    let image = sii::build_image(&Settings::new()).expect("image");
    let text = image.published.str("sii_eeprom_initializer").expect("initializer");
    assert_eq!(text.lines().count(), 0x800 / 16);
    assert!(text.starts_with("    0x80, 0x00, 0xe0, 0x00"));
}
