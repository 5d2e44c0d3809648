//! Caller/target pointer-width classification and the PEB offset tables.
//!
//! The offsets below are undocumented Windows internals. They have held
//! from Windows 7 through Windows 11 but are not a stable ABI, so every read
//! built on them is best-effort.

use crate::process::ParameterField;

/// Memory layout of the target's PEB and process parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PebLayout {
    X86,
    X64,
}

impl PebLayout {
    /// Layout matching the pointer width of the running binary
    pub const fn current() -> Self {
        if cfg!(target_pointer_width = "64") {
            PebLayout::X64
        } else {
            PebLayout::X86
        }
    }

    pub const fn pointer_size(self) -> usize {
        match self {
            PebLayout::X86 => 4,
            PebLayout::X64 => 8,
        }
    }
}

/// How the calling process relates to the process being inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBitness {
    /// Same pointer width on both sides
    Native,
    /// The target is a 32-bit process under WOW64
    TargetIsWow64,
    /// A 32-bit caller looking at a native 64-bit target
    CrossFrom32To64,
}

impl TargetBitness {
    pub fn classify(os_is_64bit: bool, caller_is_64bit: bool, target_is_wow64: bool) -> Self {
        if target_is_wow64 {
            TargetBitness::TargetIsWow64
        } else if os_is_64bit && !caller_is_64bit {
            TargetBitness::CrossFrom32To64
        } else {
            TargetBitness::Native
        }
    }

    /// Layout of the target's PEB as seen from a caller built for `caller`
    pub fn layout(self, caller: PebLayout) -> PebLayout {
        match self {
            TargetBitness::Native => caller,
            TargetBitness::TargetIsWow64 => PebLayout::X86,
            TargetBitness::CrossFrom32To64 => PebLayout::X64,
        }
    }
}

/// Byte offsets used to walk PEB -> ProcessParameters -> UNICODE_STRING
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PebOffsets {
    pub process_parameters: u64,
    pub current_directory: u64,
    pub command_line: u64,
    pub unicode_string_size: usize,
}

const X86_OFFSETS: PebOffsets = PebOffsets {
    process_parameters: 0x10,
    current_directory: 0x24,
    command_line: 0x40,
    unicode_string_size: 8,
};

const X64_OFFSETS: PebOffsets = PebOffsets {
    process_parameters: 0x20,
    current_directory: 0x38,
    command_line: 0x70,
    unicode_string_size: 16,
};

impl PebOffsets {
    pub const fn for_layout(layout: PebLayout) -> Self {
        match layout {
            PebLayout::X86 => X86_OFFSETS,
            PebLayout::X64 => X64_OFFSETS,
        }
    }

    pub const fn field(&self, field: ParameterField) -> u64 {
        match field {
            ParameterField::CommandLine => self.command_line,
            ParameterField::CurrentDirectory => self.current_directory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wow64_target_always_wins() {
        for os in [true, false] {
            for caller in [true, false] {
                assert_eq!(
                    TargetBitness::classify(os, caller, true),
                    TargetBitness::TargetIsWow64
                );
            }
        }
    }

    #[test]
    fn test_cross_bitness_only_for_32bit_caller_on_64bit_os() {
        assert_eq!(
            TargetBitness::classify(true, false, false),
            TargetBitness::CrossFrom32To64
        );
        assert_eq!(
            TargetBitness::classify(true, true, false),
            TargetBitness::Native
        );
        assert_eq!(
            TargetBitness::classify(false, false, false),
            TargetBitness::Native
        );
    }

    #[test]
    fn test_layout_selection() {
        assert_eq!(
            TargetBitness::TargetIsWow64.layout(PebLayout::X64),
            PebLayout::X86
        );
        assert_eq!(
            TargetBitness::CrossFrom32To64.layout(PebLayout::X86),
            PebLayout::X64
        );
        assert_eq!(TargetBitness::Native.layout(PebLayout::X86), PebLayout::X86);
        assert_eq!(TargetBitness::Native.layout(PebLayout::X64), PebLayout::X64);
    }

    #[test]
    fn test_offset_tables() {
        let x86 = PebOffsets::for_layout(PebLayout::X86);
        assert_eq!(x86.process_parameters, 0x10);
        assert_eq!(x86.field(ParameterField::CurrentDirectory), 0x24);
        assert_eq!(x86.field(ParameterField::CommandLine), 0x40);

        let x64 = PebOffsets::for_layout(PebLayout::X64);
        assert_eq!(x64.process_parameters, 0x20);
        assert_eq!(x64.field(ParameterField::CurrentDirectory), 0x38);
        assert_eq!(x64.field(ParameterField::CommandLine), 0x70);
        assert_eq!(x64.unicode_string_size, 16);
    }

    #[test]
    fn test_current_layout_matches_pointer_width() {
        assert_eq!(
            PebLayout::current().pointer_size(),
            std::mem::size_of::<usize>()
        );
    }
}
