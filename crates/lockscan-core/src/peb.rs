//! Walks a remote process's PEB to recover its command line or current directory.

use crate::bitness::{PebLayout, PebOffsets};
use crate::process::ParameterField;
use tracing::trace;

/// Read access to another process's address space.
///
/// Each implementation fixes one bitness strategy: how the PEB address is
/// obtained, which read primitive is used, and which layout the target has.
pub trait RemoteMemory {
    fn layout(&self) -> PebLayout;

    fn peb_address(&self) -> Option<u64>;

    /// Read exactly `len` bytes at `address`, or nothing
    fn read(&self, address: u64, len: usize) -> Option<Vec<u8>>;
}

/// Pointer + byte length of a UNICODE_STRING living in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnicodeStringHeader {
    pub length: u16,
    pub maximum_length: u16,
    pub buffer: u64,
}

impl UnicodeStringHeader {
    /// Parse the raw struct bytes; the buffer pointer follows the two
    /// lengths, aligned to the pointer size.
    pub fn parse(bytes: &[u8], layout: PebLayout) -> Option<Self> {
        let pointer_size = layout.pointer_size();
        if bytes.len() < pointer_size * 2 {
            return None;
        }

        Some(Self {
            length: u16::from_le_bytes([bytes[0], bytes[1]]),
            maximum_length: u16::from_le_bytes([bytes[2], bytes[3]]),
            buffer: read_pointer(&bytes[pointer_size..], layout)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.buffer == 0 || self.length == 0
    }
}

/// Decode a little-endian pointer of the layout's width
pub fn read_pointer(bytes: &[u8], layout: PebLayout) -> Option<u64> {
    match layout {
        PebLayout::X86 => {
            let raw: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
            Some(u64::from(u32::from_le_bytes(raw)))
        }
        PebLayout::X64 => {
            let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
            Some(u64::from_le_bytes(raw))
        }
    }
}

pub fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Strip one trailing `\` from a directory path
pub fn trim_trailing_separator(mut path: String) -> String {
    if path.ends_with('\\') {
        path.pop();
    }
    path
}

/// Read `field` from the target's RTL_USER_PROCESS_PARAMETERS.
///
/// Returns `None` on any failed read, a null pointer, or an empty string.
pub fn read_process_parameter<M: RemoteMemory + ?Sized>(
    memory: &M,
    field: ParameterField,
) -> Option<String> {
    let layout = memory.layout();
    let offsets = PebOffsets::for_layout(layout);

    let peb = memory.peb_address().filter(|address| *address != 0)?;
    trace!(peb = format_args!("{peb:#x}"), ?layout, "Resolved PEB address");

    let raw = memory.read(
        peb.checked_add(offsets.process_parameters)?,
        layout.pointer_size(),
    )?;
    let parameters = read_pointer(&raw, layout).filter(|address| *address != 0)?;

    let raw = memory.read(
        parameters.checked_add(offsets.field(field))?,
        offsets.unicode_string_size,
    )?;
    let header = UnicodeStringHeader::parse(&raw, layout)?;
    if header.is_empty() {
        trace!(field = field.as_str(), "Parameter string is empty");
        return None;
    }

    let payload = memory.read(header.buffer, usize::from(header.length))?;
    let text = decode_utf16le(&payload);

    Some(match field {
        ParameterField::CurrentDirectory => trim_trailing_separator(text),
        ParameterField::CommandLine => text,
    })
}
