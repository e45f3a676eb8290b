///! .ebg_nodes format - per-node class bitmasks of the edge-expanded graph

use anyhow::Result;
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};

const MAGIC: u32 = 0x4542474E; // "EBGN"

pub fn write<P: AsRef<Path>>(path: P, class_data: &[u32]) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, class_data.len() as u32)?;
    for &classes in class_data {
        writer.write(&classes.to_le_bytes())?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let mut class_data = Vec::with_capacity(reader.count() as usize);
    let mut buf = [0u8; 4];
    for _ in 0..reader.count() {
        reader.read(&mut buf)?;
        class_data.push(u32::from_le_bytes(buf));
    }
    reader.finish()?;
    Ok(class_data)
}
