// Byte order utilities
//
// Swap primitives and host byte order detection. Every leaf carries a
// declared `Endianness`; `Default` means "whatever the host uses".

use std::fmt;

/// Declared byte order of stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Host byte order
    #[default]
    Default,
    Big,
    Little,
}

impl Endianness {
    /// Returns the byte order of the machine running this code.
    pub const fn machine_default() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Maps `Default` onto the host order; `Big` and `Little` are returned as is.
    pub const fn resolve(self) -> Self {
        match self {
            Endianness::Default => Self::machine_default(),
            other => other,
        }
    }

    /// True when bytes in this order must be swapped to be read natively.
    pub fn needs_swap(self) -> bool {
        self.resolve() != Self::machine_default()
    }

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Default => "default",
            Endianness::Big => "big",
            Endianness::Little => "little",
        }
    }

    /// Parses the textual form used by the schema protocol.
    /// `"big"` and `"default"` are recognised; any other spelling is little.
    pub fn from_name(name: &str) -> Self {
        match name {
            "big" => Endianness::Big,
            "default" => Endianness::Default,
            _ => Endianness::Little,
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn swap16(value: u16) -> u16 {
    value.swap_bytes()
}

pub fn swap32(value: u32) -> u32 {
    value.swap_bytes()
}

pub fn swap64(value: u64) -> u64 {
    value.swap_bytes()
}

/// Reverses the bytes of every `width`-sized element in `bytes`.
/// Trailing bytes that do not fill a whole element are left untouched.
pub fn swap_elements_in_place(bytes: &mut [u8], width: usize) {
    if width < 2 {
        return;
    }
    for chunk in bytes.chunks_exact_mut(width) {
        chunk.reverse();
    }
}
