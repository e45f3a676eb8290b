///! .core format - per-node core marker, stored as a packed bitset

use anyhow::Result;
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};

const MAGIC: u32 = 0x434F5245; // "CORE"

pub fn write<P: AsRef<Path>>(path: P, is_core: &[bool]) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, is_core.len() as u32)?;
    let byte_len = is_core.len().div_ceil(8);
    let mut bits = vec![0u8; byte_len];
    for (node, &core) in is_core.iter().enumerate() {
        if core {
            bits[node / 8] |= 1 << (node % 8);
        }
    }
    writer.write(&bits)?;
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<bool>> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let count = reader.count() as usize;
    let mut bits = vec![0u8; count.div_ceil(8)];
    reader.read(&mut bits)?;
    reader.finish()?;
    Ok((0..count).map(|node| bits[node / 8] & (1 << (node % 8)) != 0).collect())
}
