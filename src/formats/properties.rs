///! .properties format - profile properties consumed by the contractor

use anyhow::Result;
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};

const MAGIC: u32 = 0x50524F50; // "PROP"

/// Profile properties. Only the excludable class masks matter to the
/// contractor; one exclusion filter is derived per mask.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileProperties {
    pub excludable_classes: Vec<u32>,
}

pub fn write<P: AsRef<Path>>(path: P, properties: &ProfileProperties) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, properties.excludable_classes.len() as u32)?;
    for &mask in &properties.excludable_classes {
        writer.write(&mask.to_le_bytes())?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<ProfileProperties> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let mut excludable_classes = Vec::with_capacity(reader.count() as usize);
    let mut buf = [0u8; 4];
    for _ in 0..reader.count() {
        reader.read(&mut buf)?;
        excludable_classes.push(u32::from_le_bytes(buf));
    }
    reader.finish()?;
    Ok(ProfileProperties {
        excludable_classes,
    })
}
