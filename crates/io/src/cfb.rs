//! Minimal Compound File Binary writer.
//!
//! Writes a version 3 container (512-byte sectors) holding a single stream
//! under the root storage, which is all a legacy workbook needs. DIFAT
//! sectors are only written once the FAT outgrows the header's 109 slots.
//! Layout:
//!
//! ```text
//! header | FAT sectors | DIFAT sectors | directory sector | stream sectors
//! ```
//!
//! The stream is padded to the mini-stream cutoff so it always lives in
//! regular sectors and no MiniFAT is needed. Readers take the stream
//! length from the directory entry, and BIFF readers stop at the final
//! EOF record, so the zero padding is never interpreted.

use crate::error::CodecError;
use crate::format::CFB_MAGIC;

const SECTOR_SIZE: usize = 512;
const MINI_STREAM_CUTOFF: usize = 4096;
const DIR_ENTRY_SIZE: usize = 128;
const FAT_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / 4;
/// FAT sector ids that fit in the header's DIFAT array
const HEADER_DIFAT_ENTRIES: usize = 109;
/// FAT sector ids per DIFAT sector; the last slot chains to the next one
const DIFAT_ENTRIES_PER_SECTOR: usize = FAT_ENTRIES_PER_SECTOR - 1;
/// Version 3 stream sizes must stay below 2 GiB
const MAX_STREAM_LEN: usize = 0x7FFF_FFFF;

const FREESECT: u32 = 0xFFFF_FFFF;
const ENDOFCHAIN: u32 = 0xFFFF_FFFE;
const FATSECT: u32 = 0xFFFF_FFFD;
const DIFSECT: u32 = 0xFFFF_FFFC;
const NOSTREAM: u32 = 0xFFFF_FFFF;

const STGTY_STREAM: u8 = 2;
const STGTY_ROOT: u8 = 5;
const COLOR_BLACK: u8 = 1;

/// Wrap `data` as the only stream of a new compound file.
pub fn write_single_stream(stream_name: &str, data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() > MAX_STREAM_LEN {
        return Err(CodecError::Encode(format!(
            "{} byte stream is too large for a version 3 compound file",
            data.len()
        )));
    }
    let stream_len = data.len().max(MINI_STREAM_CUTOFF);
    let stream_sectors = stream_len.div_ceil(SECTOR_SIZE);
    let (fat_sectors, difat_sectors) = allocation(stream_sectors);

    let first_difat_sector = fat_sectors as u32;
    let dir_sector = (fat_sectors + difat_sectors) as u32;
    let first_stream_sector = dir_sector + 1;
    let total_sectors = fat_sectors + difat_sectors + 1 + stream_sectors;

    let mut out = Vec::with_capacity(SECTOR_SIZE * (total_sectors + 1));
    out.extend_from_slice(&header(fat_sectors, difat_sectors, dir_sector));

    // FAT
    let mut fat = vec![FREESECT; fat_sectors * FAT_ENTRIES_PER_SECTOR];
    for entry in fat.iter_mut().take(fat_sectors) {
        *entry = FATSECT;
    }
    for entry in fat.iter_mut().skip(fat_sectors).take(difat_sectors) {
        *entry = DIFSECT;
    }
    fat[dir_sector as usize] = ENDOFCHAIN;
    for i in 0..stream_sectors {
        let sector = first_stream_sector as usize + i;
        fat[sector] = if i + 1 == stream_sectors {
            ENDOFCHAIN
        } else {
            (sector + 1) as u32
        };
    }
    for entry in &fat {
        out.extend_from_slice(&entry.to_le_bytes());
    }

    // DIFAT: FAT sector ids past the header's 109, then the next DIFAT sector
    let overflow: Vec<u32> = (HEADER_DIFAT_ENTRIES..fat_sectors).map(|id| id as u32).collect();
    for (i, ids) in overflow.chunks(DIFAT_ENTRIES_PER_SECTOR).enumerate() {
        let mut sector = [FREESECT; FAT_ENTRIES_PER_SECTOR];
        sector[..ids.len()].copy_from_slice(ids);
        sector[DIFAT_ENTRIES_PER_SECTOR] = if i + 1 == difat_sectors {
            ENDOFCHAIN
        } else {
            first_difat_sector + i as u32 + 1
        };
        for entry in &sector {
            out.extend_from_slice(&entry.to_le_bytes());
        }
    }

    // Directory: root, the stream, two unused entries
    let mut dir = Vec::with_capacity(SECTOR_SIZE);
    dir.extend_from_slice(&dir_entry("Root Entry", STGTY_ROOT, 1, ENDOFCHAIN, 0)?);
    dir.extend_from_slice(&dir_entry(
        stream_name,
        STGTY_STREAM,
        NOSTREAM,
        first_stream_sector,
        stream_len as u64,
    )?);
    dir.extend_from_slice(&unused_dir_entry());
    dir.extend_from_slice(&unused_dir_entry());
    out.extend_from_slice(&dir);

    // Stream, zero-padded to whole sectors
    out.extend_from_slice(data);
    out.resize(SECTOR_SIZE * (total_sectors + 1), 0);

    Ok(out)
}

/// Smallest (FAT, DIFAT) sector counts whose FAT covers every sector,
/// itself and the DIFAT included.
fn allocation(stream_sectors: usize) -> (usize, usize) {
    let mut fat_sectors: usize = 1;
    loop {
        let difat_sectors = fat_sectors
            .saturating_sub(HEADER_DIFAT_ENTRIES)
            .div_ceil(DIFAT_ENTRIES_PER_SECTOR);
        let needed = fat_sectors + difat_sectors + 1 + stream_sectors;
        if fat_sectors * FAT_ENTRIES_PER_SECTOR >= needed {
            return (fat_sectors, difat_sectors);
        }
        fat_sectors += 1;
    }
}

fn header(fat_sectors: usize, difat_sectors: usize, dir_sector: u32) -> [u8; SECTOR_SIZE] {
    let mut h = [0u8; SECTOR_SIZE];

    h[0..8].copy_from_slice(&CFB_MAGIC);
    // CLSID (16 bytes) stays zero
    h[24..26].copy_from_slice(&0x003Eu16.to_le_bytes()); // minor version
    h[26..28].copy_from_slice(&3u16.to_le_bytes()); // major version 3
    h[28..30].copy_from_slice(&0xFFFEu16.to_le_bytes()); // little-endian
    h[30..32].copy_from_slice(&9u16.to_le_bytes()); // 2^9 = 512
    h[32..34].copy_from_slice(&6u16.to_le_bytes()); // mini sectors: 2^6 = 64
    // csectDir must be 0 for version 3
    h[44..48].copy_from_slice(&(fat_sectors as u32).to_le_bytes());
    h[48..52].copy_from_slice(&dir_sector.to_le_bytes());
    h[56..60].copy_from_slice(&(MINI_STREAM_CUTOFF as u32).to_le_bytes());
    h[60..64].copy_from_slice(&ENDOFCHAIN.to_le_bytes()); // no MiniFAT

    // DIFAT sectors directly follow the FAT
    let first_difat = if difat_sectors == 0 {
        ENDOFCHAIN
    } else {
        fat_sectors as u32
    };
    h[68..72].copy_from_slice(&first_difat.to_le_bytes());
    h[72..76].copy_from_slice(&(difat_sectors as u32).to_le_bytes());

    for i in 0..HEADER_DIFAT_ENTRIES {
        let id = if i < fat_sectors { i as u32 } else { FREESECT };
        let offset = 76 + i * 4;
        h[offset..offset + 4].copy_from_slice(&id.to_le_bytes());
    }

    h
}

fn dir_entry(
    name: &str,
    entry_type: u8,
    child: u32,
    start_sector: u32,
    size: u64,
) -> Result<[u8; DIR_ENTRY_SIZE], CodecError> {
    let utf16: Vec<u16> = name.encode_utf16().collect();
    // 31 code units plus the terminator fill the 64-byte name field
    if utf16.len() > 31 {
        return Err(CodecError::Encode(format!("directory entry name '{name}' is too long")));
    }

    let mut e = [0u8; DIR_ENTRY_SIZE];
    for (i, unit) in utf16.iter().enumerate() {
        e[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
    }
    let name_len = ((utf16.len() + 1) * 2) as u16;
    e[64..66].copy_from_slice(&name_len.to_le_bytes());
    e[66] = entry_type;
    e[67] = COLOR_BLACK;
    e[68..72].copy_from_slice(&NOSTREAM.to_le_bytes()); // left sibling
    e[72..76].copy_from_slice(&NOSTREAM.to_le_bytes()); // right sibling
    e[76..80].copy_from_slice(&child.to_le_bytes());
    e[116..120].copy_from_slice(&start_sector.to_le_bytes());
    e[120..128].copy_from_slice(&size.to_le_bytes());
    Ok(e)
}

fn unused_dir_entry() -> [u8; DIR_ENTRY_SIZE] {
    let mut e = [0u8; DIR_ENTRY_SIZE];
    e[68..80].copy_from_slice(&[0xFF; 12]);
    e
}
