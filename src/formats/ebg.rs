///! .ebg format - edge-expanded edge list
///!
///! Record (21 bytes):
///!   source:   u32
///!   target:   u32
///!   weight:   u32  // strictly positive
///!   duration: u32
///!   turn_id:  u32  // 31-bit
///!   flags:    u8   // bit0 forward, bit1 backward

use anyhow::{ensure, Result};
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};
use crate::contractor::edge::InputEdge;

const MAGIC: u32 = 0x45424745; // "EBGE"
const RECORD_SIZE: usize = 21;

pub fn write<P: AsRef<Path>>(path: P, edges: &[InputEdge]) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, edges.len() as u32)?;
    let mut record = [0u8; RECORD_SIZE];
    for edge in edges {
        record[0..4].copy_from_slice(&edge.source.to_le_bytes());
        record[4..8].copy_from_slice(&edge.target.to_le_bytes());
        record[8..12].copy_from_slice(&edge.weight.to_le_bytes());
        record[12..16].copy_from_slice(&edge.duration.to_le_bytes());
        record[16..20].copy_from_slice(&edge.turn_id.to_le_bytes());
        record[20] = (edge.forward as u8) | (edge.backward as u8) << 1;
        writer.write(&record)?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<Vec<InputEdge>> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let mut edges = Vec::with_capacity(reader.count() as usize);
    let mut record = [0u8; RECORD_SIZE];
    for _ in 0..reader.count() {
        reader.read(&mut record)?;
        let edge = InputEdge {
            source: u32::from_le_bytes(record[0..4].try_into().unwrap()),
            target: u32::from_le_bytes(record[4..8].try_into().unwrap()),
            weight: u32::from_le_bytes(record[8..12].try_into().unwrap()),
            duration: u32::from_le_bytes(record[12..16].try_into().unwrap()),
            turn_id: u32::from_le_bytes(record[16..20].try_into().unwrap()),
            forward: record[20] & 1 != 0,
            backward: record[20] & 2 != 0,
        };
        ensure!(
            edge.weight > 0,
            "Zero-weight edge {} -> {} in {}",
            edge.source,
            edge.target,
            reader.path().display()
        );
        ensure!(
            edge.forward || edge.backward,
            "Directionless edge {} -> {} in {}",
            edge.source,
            edge.target,
            reader.path().display()
        );
        ensure!(
            edge.turn_id <= i32::MAX as u32,
            "Turn id {} exceeds 31 bits in {}",
            edge.turn_id,
            reader.path().display()
        );
        edges.push(edge);
    }
    reader.finish()?;
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.ebg");
        let edges = vec![
            InputEdge {
                source: 0,
                target: 1,
                weight: 10,
                duration: 12,
                turn_id: 7,
                forward: true,
                backward: false,
            },
            InputEdge {
                source: 1,
                target: 2,
                weight: 3,
                duration: 3,
                turn_id: 8,
                forward: true,
                backward: true,
            },
        ];
        write(&path, &edges)?;
        assert_eq!(read(&path)?, edges);
        Ok(())
    }

    #[test]
    fn test_rejects_zero_weight() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.ebg");
        let edges = vec![InputEdge {
            source: 0,
            target: 1,
            weight: 0,
            duration: 0,
            turn_id: 0,
            forward: true,
            backward: false,
        }];
        write(&path, &edges)?;
        let result = read(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Zero-weight"));
        Ok(())
    }
}
