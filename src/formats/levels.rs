///! .level format - per-node importance levels

use anyhow::Result;
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};

const MAGIC: u32 = 0x4C45564C; // "LEVL"

pub fn write<P: AsRef<Path>>(path: P, levels: &[f32]) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, levels.len() as u32)?;
    for &level in levels {
        writer.write(&level.to_le_bytes())?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<f32>> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let mut levels = Vec::with_capacity(reader.count() as usize);
    let mut buf = [0u8; 4];
    for _ in 0..reader.count() {
        reader.read(&mut buf)?;
        levels.push(f32::from_le_bytes(buf));
    }
    reader.finish()?;
    Ok(levels)
}
