//! SII EEPROM image (ETG.1000.6 / ETG.2010): configuration area followed by category blocks.
//!
//! Every field is read from [`Settings`] by name and packed little-endian. A
//! value that does not fit its field is a [`CompileError::LayoutOverflow`];
//! nothing is truncated.
//!
//! ```text
//! 0x0000  configuration area (128 bytes, CRC-8 over the first 14 bytes at 0x000E)
//! 0x0080  [Strings 10] General 30, FMMU 40, [SM 41], [DC 60]
//!         0xFF padding up to ESC_EEPROM_SIZE
//! ```

use crate::dump;
use crate::error::CompileError;
use crate::settings::Settings;
use crate::value::Value;
use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

pub const CATEGORY_STRINGS: u16 = 10;
pub const CATEGORY_GENERAL: u16 = 30;
pub const CATEGORY_FMMU: u16 = 40;
pub const CATEGORY_SM: u16 = 41;
pub const CATEGORY_DC: u16 = 60;

/// Size of the configuration area preceding the categories.
pub const CONFIG_AREA_LEN: usize = 128;
/// Bytes covered by the configuration checksum.
pub const CHECKSUM_LEN: usize = 14;

const DEFAULT_EEPROM_SIZE: i64 = 0x800;
/// Largest size the kibibit `sii.size` word can describe.
const MAX_EEPROM_SIZE: usize = 0x80_0000;
const MAX_SYNC_MANAGERS: usize = 8;
const MAX_FMMUS: usize = 8;
const MAX_DC_UNITS: usize = 8;

/// Name-bearing settings stored in the Strings category, with the key of their index.
const NAMED_STRINGS: &[(&str, &str)] = &[
    ("TYPE_NAME", "TYPE_IDX"),
    ("GROUP_NAME", "GROUP_IDX"),
    ("IMG_NAME", "IMG_IDX"),
    ("ORDER_NO_NAME", "ORDER_NO_IDX"),
    ("DEVICE_NAME", "DEVICE_IDX"),
];

#[derive(Debug, Clone, Copy)]
enum Format {
    U8,
    U16,
    I16,
    U32,
    I32,
    Pad(usize),
}

/// One field of a fixed layout: settings key, fallback, packed format.
#[derive(Debug, Clone, Copy)]
struct Slot {
    key: &'static str,
    default: i64,
    format: Format,
}

const fn slot(key: &'static str, default: i64, format: Format) -> Slot {
    Slot { key, default, format }
}

const fn pad(n: usize) -> Slot {
    slot("", 0, Format::Pad(n))
}

const CONFIG_AREA: &[Slot] = &[
    slot("pdi_control", 0x0080, Format::U16),
    slot("pdi_config", 0x00e0, Format::U16),
    slot("sync_impulse_len", 0x03e8, Format::U16),
    slot("pdi_config2", 0, Format::U16),
    slot("sta_alias", 0, Format::U16),
    pad(4),
    slot("sii.checksum", 0, Format::U16),
    slot("VENDOR_ID", 0xffff_ffff, Format::U32),
    slot("PRODUCT_CODE", 0xffff_ffff, Format::U32),
    slot("REVISION_NUMBER", 1, Format::U32),
    slot("SERIAL_NUMBER", 0, Format::U32),
    pad(8),
    slot("bs_mbx_rx_off", 0x1000, Format::U16),
    slot("bs_mbx_rx_size", 0x0080, Format::U16),
    slot("bs_mbx_tx_off", 0x1400, Format::U16),
    slot("bs_mbx_tx_size", 0x0080, Format::U16),
    slot("std_mbx_rx_off", 0x1000, Format::U16),
    slot("std_mbx_rx_size", 0x0080, Format::U16),
    slot("std_mbx_tx_off", 0x1400, Format::U16),
    slot("std_mbx_tx_size", 0x0080, Format::U16),
    slot("mbx_protocol", 0, Format::U16),
    pad(66),
    slot("sii.size", 0x000f, Format::U16),
    slot("sii.version", 1, Format::U16),
];

/// Leading slots of [`CONFIG_AREA`] covered by the checksum.
const CHECKSUMMED_SLOTS: usize = 6;

const GENERAL: &[Slot] = &[
    slot("GROUP_IDX", 0, Format::U8),
    slot("IMG_IDX", 0, Format::U8),
    slot("ORDER_NO_IDX", 0, Format::U8),
    slot("DEVICE_IDX", 0, Format::U8),
    pad(1),
    slot("coe_details", 0, Format::U8),
    slot("foe_details", 0, Format::U8),
    slot("eoe_details", 0, Format::U8),
    slot("soe_channels", 0, Format::U8),
    slot("ds402_channels", 0, Format::U8),
    slot("sysman_class", 0, Format::U8),
    slot("general_flags", 0, Format::U8),
    slot("current_on_ebus", 0, Format::I16),
    pad(2),
    slot("sii.phys_port", 0, Format::U16),
    pad(14),
];

const SYNC_MANAGER: &[Slot] = &[
    slot("start_addr", 0, Format::U16),
    slot("size", 0, Format::U16),
    slot("control", 0, Format::U8),
    slot("status", 0, Format::U8),
    slot("enable", 0, Format::U8),
    slot("type", 0, Format::U8),
];

const DISTRIBUTED_CLOCK: &[Slot] = &[
    slot("sync0_cycle", 0, Format::U32),
    slot("sync0_shift", 0, Format::I32),
    slot("sync1_shift", 0, Format::I32),
    slot("sync1_cycle_factor", 0, Format::I16),
    slot("assign_activate", 0, Format::U16),
    slot("sync0_cycle_factor", 0, Format::I16),
    slot("name_idx", 0, Format::U8),
    pad(5),
];

/// CRC-8 of the configuration area: x^8 + x^2 + x + 1, initial 0xFF, MSB first (ETG.1000.6 table 16).
pub fn crc8(data: &[u8]) -> u8 {
    let mut rem = 0xffu8;
    for &octet in data {
        rem ^= octet;
        for _ in 0..8 {
            rem = if rem & 0x80 != 0 { (rem << 1) ^ 0x07 } else { rem << 1 };
        }
    }
    rem
}

fn pack_layout(settings: &Settings, layout: &[Slot], prefix: &str) -> Result<Vec<u8>, CompileError> {
    let mut out = Vec::new();
    for slot in layout {
        if let Format::Pad(n) = slot.format {
            out.resize(out.len() + n, 0);
            continue;
        }
        let key = format!("{}{}", prefix, slot.key);
        let value = settings.int_or(&key, slot.default)?;
        let overflow = || CompileError::overflow(key.as_str(), value);
        let written = match slot.format {
            Format::U8 => out.write_u8(u8::try_from(value).map_err(|_| overflow())?),
            Format::U16 => out.write_u16::<LittleEndian>(u16::try_from(value).map_err(|_| overflow())?),
            Format::I16 => out.write_i16::<LittleEndian>(i16::try_from(value).map_err(|_| overflow())?),
            Format::U32 => out.write_u32::<LittleEndian>(u32::try_from(value).map_err(|_| overflow())?),
            Format::I32 => out.write_i32::<LittleEndian>(i32::try_from(value).map_err(|_| overflow())?),
            Format::Pad(_) => Ok(()),
        };
        written.map_err(|e| CompileError::io(key.as_str(), e))?;
    }
    Ok(out)
}

/// Category header `<type, length in words>` followed by the data padded to an even length.
fn category(kind: u16, mut data: Vec<u8>) -> Result<Vec<u8>, CompileError> {
    if data.len() % 2 != 0 {
        data.push(0);
    }
    let words = u16::try_from(data.len() / 2)
        .map_err(|_| CompileError::overflow(format!("category {} length", kind), data.len()))?;
    let mut out = Vec::with_capacity(data.len() + 4);
    out.write_u16::<LittleEndian>(kind)
        .and_then(|_| out.write_u16::<LittleEndian>(words))
        .map_err(|e| CompileError::io(format!("category {}", kind), e))?;
    out.extend(data);
    Ok(out)
}

fn strings_category(strings: &[String]) -> Result<Vec<u8>, CompileError> {
    let count = u8::try_from(strings.len())
        .map_err(|_| CompileError::overflow("string count", strings.len()))?;
    let mut data = vec![count];
    for s in strings {
        let len = u8::try_from(s.len()).map_err(|_| CompileError::overflow("string length", s))?;
        data.push(len);
        data.extend_from_slice(s.as_bytes());
    }
    category(CATEGORY_STRINGS, data)
}

/// Modes of `fmmu0..7` (unset = 0xFF); trailing unused entries dropped, then 0xFF padded to an even, non-zero length.
fn fmmu_category(settings: &Settings) -> Result<Vec<u8>, CompileError> {
    let mut data = Vec::with_capacity(MAX_FMMUS);
    for i in 0..MAX_FMMUS {
        let key = format!("fmmu{}.mode", i);
        let mode = settings.int_or(&key, 0xff)?;
        data.push(u8::try_from(mode).map_err(|_| CompileError::overflow(key, mode))?);
    }
    while data.last() == Some(&0xff) {
        data.pop();
    }
    while data.is_empty() || data.len() % 2 != 0 {
        data.push(0xff);
    }
    category(CATEGORY_FMMU, data)
}

/// One entry per sync manager up to the last enabled one. `None` when none is enabled.
fn sm_category(settings: &Settings) -> Result<Option<Vec<u8>>, CompileError> {
    let count = (0..MAX_SYNC_MANAGERS)
        .filter(|i| settings.flag(&format!("sm{}.enable", i)))
        .map(|i| i + 1)
        .max()
        .unwrap_or(0);
    if count == 0 {
        return Ok(None);
    }
    let mut data = Vec::with_capacity(count * 8);
    for i in 0..count {
        data.extend(pack_layout(settings, SYNC_MANAGER, &format!("sm{}.", i))?);
    }
    category(CATEGORY_SM, data).map(Some)
}

/// One entry per named DC unit. `None` when DC is unsupported or no unit is named.
fn dc_category(settings: &Settings) -> Result<Option<Vec<u8>>, CompileError> {
    if !settings.flag("DC_SUPPORTED") {
        return Ok(None);
    }
    let mut data = Vec::new();
    for i in 0..MAX_DC_UNITS {
        if settings.flag(&format!("dc{}.name", i)) {
            data.extend(pack_layout(settings, DISTRIBUTED_CLOCK, &format!("dc{}.", i))?);
        }
    }
    if data.is_empty() {
        return Ok(None);
    }
    category(CATEGORY_DC, data).map(Some)
}

fn string_setting(settings: &Settings, key: &str) -> Result<String, CompileError> {
    match settings.get(key) {
        Some(Value::Str(s)) => Ok(s.clone()),
        Some(other) => Err(CompileError::TypeMismatch {
            context: key.to_string(),
            expected: "string",
            found: other.to_string(),
        }),
        None => Err(CompileError::UndefinedSymbol(key.to_string())),
    }
}

/// A complete EEPROM image and the settings it publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct SiiImage {
    pub bytes: Vec<u8>,
    pub checksum: u8,
    /// String table, in index order (index 1 first).
    pub strings: Vec<String>,
    /// `sii.checksum`, string indices, `config_data`, `bootstrap`, `sii_eeprom_initializer`.
    pub published: Settings,
}

/// Pack the EEPROM image from `settings`.
pub fn build_image(settings: &Settings) -> Result<SiiImage, CompileError> {
    let mut working = settings.clone();
    let mut published = Settings::new();

    // the checksum lives inside the area it protects: pack the head, then the whole area
    let head = pack_layout(&working, &CONFIG_AREA[..CHECKSUMMED_SLOTS], "")?;
    let checksum = crc8(&head);
    published.insert("config_data", dump::hex_string(&head));
    published.insert("sii.checksum", i64::from(checksum));
    working.insert("sii.checksum", i64::from(checksum));

    let mut image = pack_layout(&working, CONFIG_AREA, "")?;
    published.insert("bootstrap", dump::hex_string(&image[0x28..0x30]));

    let mut strings = Vec::new();
    for &(name_key, index_key) in NAMED_STRINGS {
        let index = if working.contains(name_key) {
            strings.push(string_setting(&working, name_key)?);
            strings.len()
        } else {
            0
        };
        published.insert(index_key, index as i64);
        working.insert(index_key, index as i64);
    }
    if working.flag("DC_SUPPORTED") {
        for i in 0..MAX_DC_UNITS {
            let name_key = format!("dc{}.name", i);
            if working.contains(&name_key) {
                strings.push(string_setting(&working, &name_key)?);
                let index_key = format!("{}_idx", name_key);
                published.insert(index_key.clone(), strings.len() as i64);
                working.insert(index_key, strings.len() as i64);
            }
        }
    }

    if !strings.is_empty() {
        image.extend(strings_category(&strings)?);
    }
    image.extend(category(CATEGORY_GENERAL, pack_layout(&working, GENERAL, "")?)?);
    image.extend(fmmu_category(&working)?);
    if let Some(sm) = sm_category(&working)? {
        image.extend(sm);
    }
    if let Some(dc) = dc_category(&working)? {
        image.extend(dc);
    }

    let eeprom_size = working.int_or("ESC_EEPROM_SIZE", DEFAULT_EEPROM_SIZE)?;
    let size = usize::try_from(eeprom_size)
        .ok()
        .filter(|&n| n <= MAX_EEPROM_SIZE)
        .ok_or_else(|| CompileError::overflow("ESC_EEPROM_SIZE", eeprom_size))?;
    if image.len() > size {
        return Err(CompileError::overflow(
            "ESC_EEPROM_SIZE",
            format!("{} byte image", image.len()),
        ));
    }
    debug!(
        "SII image: {} bytes of content, {} strings, checksum 0x{:02x}",
        image.len(),
        strings.len(),
        checksum
    );
    image.resize(size, 0xff);
    published.insert("sii_eeprom_initializer", dump::c_initializer(&image));

    Ok(SiiImage {
        bytes: image,
        checksum,
        strings,
        published,
    })
}

/// Category blocks of an image: `(type, data)` until the 0xFFFF terminator or the end.
pub fn categories(image: &[u8]) -> Result<Vec<(u16, &[u8])>, CompileError> {
    let mut out = Vec::new();
    let mut pos = CONFIG_AREA_LEN;
    while pos + 4 <= image.len() {
        let kind = u16::from_le_bytes([image[pos], image[pos + 1]]);
        if kind == 0xffff {
            break;
        }
        let len = usize::from(u16::from_le_bytes([image[pos + 2], image[pos + 3]])) * 2;
        let data = image
            .get(pos + 4..pos + 4 + len)
            .ok_or_else(|| CompileError::overflow(format!("category {} at 0x{:04X}", kind, pos), len))?;
        out.push((kind, data));
        pos += 4 + len;
    }
    Ok(out)
}
