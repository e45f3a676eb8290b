///! .enw format - per-node traversal weights

use anyhow::Result;
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};
use crate::contractor::edge::EdgeWeight;

const MAGIC: u32 = 0x454E5754; // "ENWT"

pub fn write<P: AsRef<Path>>(path: P, weights: &[EdgeWeight]) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, weights.len() as u32)?;
    for &weight in weights {
        writer.write(&weight.to_le_bytes())?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<EdgeWeight>> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let mut weights = Vec::with_capacity(reader.count() as usize);
    let mut buf = [0u8; 4];
    for _ in 0..reader.count() {
        reader.read(&mut buf)?;
        weights.push(EdgeWeight::from_le_bytes(buf));
    }
    reader.finish()?;
    Ok(weights)
}
