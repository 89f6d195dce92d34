//! Executable subsystem detection.
//!
//! Reads a handful of fixed-offset fields from a PE image to decide whether
//! the target is a windowed or a console program. Every field is read with
//! an explicit seek and a little-endian decode; nothing is mapped onto
//! in-memory structs.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

const DOS_SIGNATURE: [u8; 2] = *b"MZ";
const PE_SIGNATURE: [u8; 4] = *b"PE\0\0";

const DOS_LFANEW_OFFSET: u64 = 0x3C;
const FILE_HEADER_OFFSET: u64 = 4;
const SIZE_OF_OPTIONAL_HEADER_OFFSET: u64 = 0x10;
const OPTIONAL_HEADER_OFFSET: u64 = 0x14;
const SUBSYSTEM_OFFSET: u64 = 0x44;

const MACHINE_I386: u16 = 0x014C;
const MACHINE_AMD64: u16 = 0x8664;

const PE32_MAGIC: u16 = 0x010B;
const PE32_PLUS_MAGIC: u16 = 0x020B;

const SUBSYSTEM_WINDOWS_GUI: u16 = 2;
const SUBSYSTEM_WINDOWS_CUI: u16 = 3;

/// Classification of a candidate executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExeType {
    Gui,
    Console,
    InvalidHeaderSignature,
    InvalidExtendedHeaderSignature,
    UnsupportedMachine,
    MissingOptionalHeader,
    InvalidOptionalHeaderMagic,
    UnsupportedSubsystem,
    InspectionFailed,
}

impl ExeType {
    pub fn is_gui(self) -> bool { self == Self::Gui }
}

/// Inspect the executable at `path`. Never fails; I/O problems map to
/// [`ExeType::InspectionFailed`].
pub fn inspect(path: impl AsRef<Path>) -> ExeType {
    let path = path.as_ref();
    let kind = match File::open(path) {
        Ok(file) => inspect_reader(BufReader::new(file)),
        Err(_) => ExeType::InspectionFailed,
    };
    tracing::debug!(path = %path.display(), ?kind, "inspected target");
    kind
}

pub fn inspect_reader<R: Read + Seek>(reader: R) -> ExeType {
    let mut header = HeaderReader::new(reader);
    classify(&mut header).unwrap_or(ExeType::InspectionFailed)
}

fn classify<R: Read + Seek>(header: &mut HeaderReader<R>) -> io::Result<ExeType> {
    if header.bytes_at::<2>(0)? != DOS_SIGNATURE {
        return Ok(ExeType::InvalidHeaderSignature);
    }

    let pe_offset = u64::from(header.u32_at(DOS_LFANEW_OFFSET)?);
    if header.bytes_at::<4>(pe_offset)? != PE_SIGNATURE {
        return Ok(ExeType::InvalidExtendedHeaderSignature);
    }

    let file_header = pe_offset + FILE_HEADER_OFFSET;
    let machine = header.u16_at(file_header)?;
    if machine != MACHINE_I386 && machine != MACHINE_AMD64 {
        return Ok(ExeType::UnsupportedMachine);
    }

    if header.u16_at(file_header + SIZE_OF_OPTIONAL_HEADER_OFFSET)? == 0 {
        return Ok(ExeType::MissingOptionalHeader);
    }

    let optional_header = file_header + OPTIONAL_HEADER_OFFSET;
    let magic = header.u16_at(optional_header)?;
    if magic != PE32_MAGIC && magic != PE32_PLUS_MAGIC {
        return Ok(ExeType::InvalidOptionalHeaderMagic);
    }

    Ok(match header.u16_at(optional_header + SUBSYSTEM_OFFSET)? {
        SUBSYSTEM_WINDOWS_GUI => ExeType::Gui,
        SUBSYSTEM_WINDOWS_CUI => ExeType::Console,
        _ => ExeType::UnsupportedSubsystem,
    })
}

/// Seek-and-read access to header fields. Short reads are errors.
struct HeaderReader<R> {
    inner: R,
}

impl<R: Read + Seek> HeaderReader<R> {
    fn new(inner: R) -> Self { Self { inner } }

    fn bytes_at<const N: usize>(&mut self, offset: u64) -> io::Result<[u8; N]> {
        self.inner.seek(SeekFrom::Start(offset))?;
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u16_at(&mut self, offset: u64) -> io::Result<u16> {
        self.bytes_at::<2>(offset).map(u16::from_le_bytes)
    }

    fn u32_at(&mut self, offset: u64) -> io::Result<u32> {
        self.bytes_at::<4>(offset).map(u32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    const PE_OFFSET: usize = 0x80;

    /// Smallest header that passes every check, with the given subsystem.
    fn minimal_pe(machine: u16, magic: u16, subsystem: u16) -> Vec<u8> {
        let optional = PE_OFFSET + 4 + 0x14;
        let mut image = vec![0u8; optional + 0x44 + 2];
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());
        image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");
        image[PE_OFFSET + 4..PE_OFFSET + 6].copy_from_slice(&machine.to_le_bytes());
        image[PE_OFFSET + 4 + 0x10..PE_OFFSET + 4 + 0x12].copy_from_slice(&0xF0u16.to_le_bytes());
        image[optional..optional + 2].copy_from_slice(&magic.to_le_bytes());
        image[optional + 0x44..optional + 0x46].copy_from_slice(&subsystem.to_le_bytes());
        image
    }

    fn classify_bytes(bytes: Vec<u8>) -> ExeType { inspect_reader(Cursor::new(bytes)) }

    #[test]
    fn test_gui_subsystem() {
        let image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        assert_eq!(classify_bytes(image), ExeType::Gui);
    }

    #[test]
    fn test_console_subsystem() {
        let image = minimal_pe(MACHINE_I386, PE32_MAGIC, 3);
        assert_eq!(classify_bytes(image), ExeType::Console);
    }

    #[test]
    fn test_other_subsystem() {
        let image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 1);
        assert_eq!(classify_bytes(image), ExeType::UnsupportedSubsystem);
    }

    #[test]
    fn test_invalid_dos_signature() {
        let mut image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        image[0..2].copy_from_slice(b"\x7fE");
        assert_eq!(classify_bytes(image), ExeType::InvalidHeaderSignature);
    }

    #[test]
    fn test_invalid_pe_signature() {
        let mut image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        image[PE_OFFSET + 2] = b'X';
        assert_eq!(classify_bytes(image), ExeType::InvalidExtendedHeaderSignature);
    }

    #[test]
    fn test_unsupported_machine() {
        let image = minimal_pe(0xAA64, PE32_PLUS_MAGIC, 2);
        assert_eq!(classify_bytes(image), ExeType::UnsupportedMachine);
    }

    #[test]
    fn test_missing_optional_header() {
        let mut image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        image[PE_OFFSET + 4 + 0x10..PE_OFFSET + 4 + 0x12].copy_from_slice(&[0, 0]);
        assert_eq!(classify_bytes(image), ExeType::MissingOptionalHeader);
    }

    #[test]
    fn test_invalid_optional_magic() {
        let image = minimal_pe(MACHINE_AMD64, 0x0107, 2);
        assert_eq!(classify_bytes(image), ExeType::InvalidOptionalHeaderMagic);
    }

    #[test]
    fn test_truncated_image() {
        let mut image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        image.truncate(PE_OFFSET + 10);
        assert_eq!(classify_bytes(image), ExeType::InspectionFailed);
    }

    #[test]
    fn test_offset_past_end() {
        let mut image = minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2);
        image[0x3C..0x40].copy_from_slice(&u32::MAX.to_le_bytes());
        assert_eq!(classify_bytes(image), ExeType::InspectionFailed);
    }

    #[test]
    fn test_empty_and_tiny_inputs() {
        assert_eq!(classify_bytes(Vec::new()), ExeType::InspectionFailed);
        assert_eq!(classify_bytes(b"M".to_vec()), ExeType::InspectionFailed);
        assert_eq!(classify_bytes(b"#!".to_vec()), ExeType::InvalidHeaderSignature);
    }

    #[test]
    fn test_inspect_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.exe");
        std::fs::write(&path, minimal_pe(MACHINE_AMD64, PE32_PLUS_MAGIC, 2)).unwrap();

        assert_eq!(inspect(&path), ExeType::Gui);
        assert!(inspect(&path).is_gui());
    }

    #[test]
    fn test_inspect_missing_file() {
        let dir = tempdir().unwrap();
        assert_eq!(inspect(dir.path().join("nope.exe")), ExeType::InspectionFailed);
    }

    #[cfg(unix)]
    #[test]
    fn test_inspect_elf_binary() {
        assert_eq!(inspect("/bin/sh"), ExeType::InvalidHeaderSignature);
    }
}
