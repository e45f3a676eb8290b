///! Shared artifact framing.
///!
///! Every artifact (little-endian):
///!
///! Header (64 bytes):
///!   magic:    u32
///!   version:  u16 = 1
///!   reserved: u16 = 0
///!   count:    u32
///!   pad:      [52]u8
///!
///! Body: format-specific records.
///!
///! Footer (16 bytes):
///!   body_crc64: u64
///!   file_crc64: u64  // header + body
///!
///! Writers emit to `<path>.tmp` and rename on completion, so a failed run
///! never leaves a plausible-looking artifact behind.

use anyhow::{ensure, Context, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::crc::Digest;

pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 64;
pub const FOOTER_SIZE: usize = 16;

pub struct FrameWriter {
    writer: BufWriter<File>,
    body_digest: Digest,
    file_digest: Digest,
    tmp_path: PathBuf,
    path: PathBuf,
}

impl FrameWriter {
    pub fn create<P: AsRef<Path>>(path: P, magic: u32, count: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
        let file = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);

        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(&magic.to_le_bytes());
        header.extend_from_slice(&VERSION.to_le_bytes());
        header.extend_from_slice(&0u16.to_le_bytes());
        header.extend_from_slice(&count.to_le_bytes());
        header.resize(HEADER_SIZE, 0);
        writer.write_all(&header)?;

        let mut file_digest = Digest::new();
        file_digest.update(&header);

        Ok(Self {
            writer,
            body_digest: Digest::new(),
            file_digest,
            tmp_path,
            path,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.body_digest.update(data);
        self.file_digest.update(data);
        Ok(())
    }

    pub fn finish(self) -> Result<()> {
        let FrameWriter {
            mut writer,
            body_digest,
            file_digest,
            tmp_path,
            path,
        } = self;
        writer.write_all(&body_digest.finalize().to_le_bytes())?;
        writer.write_all(&file_digest.finalize().to_le_bytes())?;
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        drop(writer);
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to finalize {}", path.display()))?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct FrameReader {
    reader: BufReader<File>,
    body_digest: Digest,
    file_digest: Digest,
    path: PathBuf,
    count: u32,
}

impl FrameReader {
    pub fn open<P: AsRef<Path>>(path: P, magic: u32) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file =
            File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .with_context(|| format!("Truncated header in {}", path.display()))?;

        let got_magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        ensure!(
            got_magic == magic,
            "Invalid magic in {}: expected 0x{:08X}, got 0x{:08X}",
            path.display(),
            magic,
            got_magic
        );
        let version = u16::from_le_bytes([header[4], header[5]]);
        ensure!(
            version == VERSION,
            "Unsupported version in {}: {}",
            path.display(),
            version
        );
        let count = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        let mut file_digest = Digest::new();
        file_digest.update(&header);

        Ok(Self {
            reader,
            body_digest: Digest::new(),
            file_digest,
            path,
            count,
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader
            .read_exact(buf)
            .with_context(|| format!("Truncated body in {}", self.path.display()))?;
        self.body_digest.update(buf);
        self.file_digest.update(buf);
        Ok(())
    }

    /// Verify the footer CRCs against everything read so far.
    pub fn finish(self) -> Result<()> {
        let FrameReader {
            mut reader,
            body_digest,
            file_digest,
            path,
            ..
        } = self;
        let mut footer = [0u8; FOOTER_SIZE];
        reader
            .read_exact(&mut footer)
            .with_context(|| format!("Truncated footer in {}", path.display()))?;
        let stored_body = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let stored_file = u64::from_le_bytes(footer[8..16].try_into().unwrap());

        let body_crc = body_digest.finalize();
        ensure!(
            body_crc == stored_body,
            "CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
            path.display(),
            body_crc,
            stored_body
        );
        let file_crc = file_digest.finalize();
        ensure!(
            file_crc == stored_file,
            "Header CRC64 mismatch in {}: computed 0x{:016X}, stored 0x{:016X}",
            path.display(),
            file_crc,
            stored_file
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom, Write as IoWrite};
    use tempfile::tempdir;

    const TEST_MAGIC: u32 = 0x54455354;

    #[test]
    fn test_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame.bin");

        let mut writer = FrameWriter::create(&path, TEST_MAGIC, 2)?;
        writer.write(&7u32.to_le_bytes())?;
        writer.write(&9u32.to_le_bytes())?;
        writer.finish()?;

        let mut reader = FrameReader::open(&path, TEST_MAGIC)?;
        assert_eq!(reader.count(), 2);
        let mut buf = [0u8; 4];
        reader.read(&mut buf)?;
        assert_eq!(u32::from_le_bytes(buf), 7);
        reader.read(&mut buf)?;
        assert_eq!(u32::from_le_bytes(buf), 9);
        reader.finish()?;
        Ok(())
    }

    #[test]
    fn test_no_tmp_left_behind() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame.bin");

        let writer = FrameWriter::create(&path, TEST_MAGIC, 0)?;
        writer.finish()?;

        assert!(path.exists());
        assert!(!PathBuf::from(format!("{}.tmp", path.display())).exists());
        Ok(())
    }

    #[test]
    fn test_wrong_magic() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame.bin");
        FrameWriter::create(&path, TEST_MAGIC, 0)?.finish()?;

        let result = FrameReader::open(&path, 0xDEADBEEF);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid magic"));
        Ok(())
    }

    #[test]
    fn test_crc_detects_corruption() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("frame.bin");

        let mut writer = FrameWriter::create(&path, TEST_MAGIC, 1)?;
        writer.write(&42u32.to_le_bytes())?;
        writer.finish()?;

        // Flip a body byte
        {
            let mut file = std::fs::OpenOptions::new().write(true).open(&path)?;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64))?;
            file.write_all(&[0xFF])?;
        }

        let mut reader = FrameReader::open(&path, TEST_MAGIC)?;
        let mut buf = [0u8; 4];
        reader.read(&mut buf)?;
        let result = reader.finish();
        assert!(result.is_err(), "corrupted body should fail CRC check");
        assert!(result.unwrap_err().to_string().contains("CRC64 mismatch"));
        Ok(())
    }
}
