//! Error types reported by the encoder, decoder, relocation resolver and
//! bundle checker.

use alloc::string::String;
use core::fmt;

use crate::descriptor::Core;
use crate::ir::PointerMode;

/// The bundle limit that was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BundleLimit {
    /// Too many instructions for the issue width.
    Issue,
    /// Too many syllables, extension syllables included.
    Words,
}

impl fmt::Display for BundleLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleLimit::Issue => write!(f, "issue width"),
            BundleLimit::Words => write!(f, "bundle word count"),
        }
    }
}

/// Encoding, decoding or bundling error.
///
/// Every variant is recoverable: a failed call leaves the architecture
/// descriptor untouched and produces no output. Source locations are the
/// caller's business.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IsaError {
    /// Operand value not representable under the operand's width and flags.
    Range {
        /// The value that was rejected.
        value: i128,
        /// Smallest accepted value.
        min: i128,
        /// Largest accepted value.
        max: i128,
    },

    /// Operand value has non-zero bits below the operand's shift.
    Alignment {
        /// The value that was rejected.
        value: i128,
        /// Required alignment (a power of two).
        alignment: u64,
    },

    /// Pseudo-function only available in the other pointer-size mode.
    ModeMismatch {
        /// Name of the pseudo-function.
        function: String,
        /// The mode that was active.
        mode: PointerMode,
    },

    /// No pseudo-function of that name exists.
    UnknownPseudoFunction {
        /// The requested name.
        name: String,
    },

    /// The pseudo-function or relocation cannot be applied to the operand.
    UnsupportedRelocation {
        /// The requested pseudo-function or relocation name.
        name: String,
        /// Width of the operand it was applied to.
        bits: u32,
    },

    /// Register index outside the unit range of its class.
    OutOfRange {
        /// Register class name.
        class: String,
        /// The offending index.
        index: u16,
    },

    /// Register index does not satisfy the class alignment.
    MisalignedRegister {
        /// Register class name.
        class: String,
        /// The offending index.
        index: u16,
        /// Required alignment in register units.
        alignment: u8,
    },

    /// Register name not known to the register file.
    UnknownRegister {
        /// The unrecognized name.
        name: String,
    },

    /// No format matches the mnemonic and operand shape.
    NoSuchFormat {
        /// The mnemonic being encoded.
        mnemonic: String,
        /// What did not match.
        detail: String,
    },

    /// No format matches the bit pattern.
    IllegalInstruction {
        /// The leading syllable that failed to decode.
        word: u32,
    },

    /// The syllable stream ended in the middle of an instruction or bundle.
    Truncated {
        /// Syllables required.
        needed: usize,
        /// Syllables available.
        available: usize,
    },

    /// Two instructions over-subscribe a resource in the same cycle.
    ResourceConflict {
        /// Resource name.
        resource: String,
        /// Cycle of the conflict, relative to issue.
        cycle: usize,
        /// Index of the first instruction using the resource.
        first: usize,
        /// Index of the instruction that exceeded the capacity.
        second: usize,
    },

    /// Bundle exceeds the issue width or the word count.
    BundleOverflow {
        /// Which limit was exceeded.
        limit: BundleLimit,
        /// Actual count.
        count: usize,
        /// Architecture limit.
        max: usize,
    },

    /// The core's tables were not compiled in.
    UnsupportedCore {
        /// The requested core.
        core: Core,
    },
}

impl fmt::Display for IsaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsaError::Range { value, min, max } => {
                write!(f, "value {} out of range [{}..{}]", value, min, max)
            }
            IsaError::Alignment { value, alignment } => {
                write!(f, "value {} is not a multiple of {}", value, alignment)
            }
            IsaError::ModeMismatch { function, mode } => {
                write!(f, "pseudo-function '{}' is not available in {} mode", function, mode)
            }
            IsaError::UnknownPseudoFunction { name } => {
                write!(f, "unknown pseudo-function '{}'", name)
            }
            IsaError::UnsupportedRelocation { name, bits } => {
                write!(f, "'{}' cannot be applied to a {}-bit operand", name, bits)
            }
            IsaError::OutOfRange { class, index } => {
                write!(f, "register index {} out of range for class {}", index, class)
            }
            IsaError::MisalignedRegister {
                class,
                index,
                alignment,
            } => {
                write!(
                    f,
                    "register index {} in class {} must be a multiple of {}",
                    index, class, alignment
                )
            }
            IsaError::UnknownRegister { name } => write!(f, "unknown register '{}'", name),
            IsaError::NoSuchFormat { mnemonic, detail } => {
                write!(f, "no format for '{}': {}", mnemonic, detail)
            }
            IsaError::IllegalInstruction { word } => {
                write!(f, "illegal instruction 0x{:08x}", word)
            }
            IsaError::Truncated { needed, available } => {
                write!(
                    f,
                    "truncated input: {} syllables needed, {} available",
                    needed, available
                )
            }
            IsaError::ResourceConflict {
                resource,
                cycle,
                first,
                second,
            } => {
                write!(
                    f,
                    "resource {} over-subscribed at cycle {} by instructions {} and {}",
                    resource, cycle, first, second
                )
            }
            IsaError::BundleOverflow { limit, count, max } => {
                write!(f, "bundle exceeds {}: {} > {}", limit, count, max)
            }
            IsaError::UnsupportedCore { core } => {
                write!(f, "core {} is not enabled in this build", core)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for IsaError {}
