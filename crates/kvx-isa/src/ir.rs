//! Abstract instructions: the input of the encoder and the output of the
//! decoder.

use alloc::string::String;
#[allow(unused_imports)]
use alloc::vec::Vec;
use core::fmt;

use crate::register::Reg;

// ── PointerMode ─────────────────────────────────────────────────────────

/// Pointer-size mode the code is assembled for.
///
/// Selects between `MODE32`/`MODE64` codewords and gates pseudo-functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointerMode {
    /// 32-bit pointers (`-m32`).
    Bits32,
    /// 64-bit pointers.
    #[default]
    Bits64,
}

impl PointerMode {
    /// Pointer width in bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        match self {
            PointerMode::Bits32 => 32,
            PointerMode::Bits64 => 64,
        }
    }
}

impl fmt::Display for PointerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit", self.bits())
    }
}

// ── Mnemonic ────────────────────────────────────────────────────────────

/// Inline mnemonic storage.
///
/// Modifiers such as `.deqz` are separate operands, so the longest KVX
/// mnemonic fits comfortably in 16 bytes and no allocation is needed per
/// instruction.
#[derive(Clone, Copy)]
pub struct Mnemonic {
    buf: [u8; 16],
    len: u8,
    truncated: bool,
}

impl Mnemonic {
    /// Maximum mnemonic length in bytes.
    pub const MAX_LEN: usize = 16;

    /// An empty mnemonic.
    #[inline]
    pub const fn new() -> Self {
        Self {
            buf: [0; 16],
            len: 0,
            truncated: false,
        }
    }

    /// The mnemonic text.
    #[inline]
    pub fn as_str(&self) -> &str {
        // Only ever filled from a `&str` cut at a char boundary.
        core::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the mnemonic is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the source text was longer than [`Mnemonic::MAX_LEN`] and
    /// had to be cut. No table entry matches a truncated mnemonic.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl From<&str> for Mnemonic {
    /// Truncates to [`Mnemonic::MAX_LEN`] bytes on a char boundary.
    fn from(s: &str) -> Self {
        let mut len = s.len().min(Self::MAX_LEN);
        while !s.is_char_boundary(len) {
            len -= 1;
        }
        let mut buf = [0u8; 16];
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self {
            buf,
            len: len as u8,
            truncated: len < s.len(),
        }
    }
}

impl core::ops::Deref for Mnemonic {
    type Target = str;
    #[inline]
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq for Mnemonic {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.truncated == other.truncated && self.as_str() == other.as_str()
    }
}

impl Eq for Mnemonic {}

impl core::hash::Hash for Mnemonic {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
        self.truncated.hash(state);
    }
}

impl PartialEq<str> for Mnemonic {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Mnemonic {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Mnemonic {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Mnemonic {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Mnemonic {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.len() > Mnemonic::MAX_LEN {
            return Err(serde::de::Error::custom(alloc::format!(
                "mnemonic '{}' longer than {} bytes",
                s,
                Mnemonic::MAX_LEN
            )));
        }
        Ok(Mnemonic::from(s.as_str()))
    }
}

// ── Operands ────────────────────────────────────────────────────────────

/// A symbolic operand, resolved at link time.
///
/// `function` names the pseudo-function applied to the symbol (`@gotoff(x)`
/// has function `gotoff`). `None` means a plain symbol reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolRef {
    /// Pseudo-function name, without the leading `@`.
    pub function: Option<String>,
    /// Symbol name; empty for argument-less pseudo-functions.
    pub name: String,
    /// Constant added to the symbol value.
    pub addend: i64,
}

impl SymbolRef {
    /// A plain reference to `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            function: None,
            name: name.into(),
            addend: 0,
        }
    }

    /// `@function(name)`.
    pub fn with_function(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            function: Some(function.into()),
            name: name.into(),
            addend: 0,
        }
    }

    /// Sets the addend.
    #[must_use]
    pub fn addend(mut self, addend: i64) -> Self {
        self.addend = addend;
        self
    }
}

/// One operand of an abstract instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// A register, possibly a paired or quad view.
    Register(Reg),
    /// A literal integer, before bias and shift.
    Immediate(i128),
    /// A modifier suffix such as `.deqz`, or `""` for an empty variant.
    Modifier(String),
    /// A link-time symbol, optionally wrapped in a pseudo-function.
    Symbol(SymbolRef),
}

impl Operand {
    /// Register operand.
    #[inline]
    pub fn reg(reg: Reg) -> Self {
        Operand::Register(reg)
    }

    /// Immediate operand.
    #[inline]
    pub fn imm(value: i128) -> Self {
        Operand::Immediate(value)
    }

    /// Modifier operand.
    pub fn modifier(name: &str) -> Self {
        Operand::Modifier(name.into())
    }

    /// Symbol operand.
    #[inline]
    pub fn symbol(sym: SymbolRef) -> Self {
        Operand::Symbol(sym)
    }

    /// Short kind name used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operand::Register(_) => "register",
            Operand::Immediate(_) => "immediate",
            Operand::Modifier(_) => "modifier",
            Operand::Symbol(_) => "symbol",
        }
    }
}

impl Default for Operand {
    fn default() -> Self {
        Operand::Immediate(0)
    }
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Register(reg)
    }
}

impl From<SymbolRef> for Operand {
    fn from(sym: SymbolRef) -> Self {
        Operand::Symbol(sym)
    }
}

// ── OperandList ─────────────────────────────────────────────────────────

/// Inline operand list, at most [`OperandList::MAX_LEN`] entries.
///
/// No KVX format has more than seven operands.
pub struct OperandList {
    items: [Operand; 7],
    len: u8,
}

impl OperandList {
    /// Maximum number of operands.
    pub const MAX_LEN: usize = 7;

    /// An empty list.
    #[inline]
    pub fn new() -> Self {
        Self {
            items: core::array::from_fn(|_| Operand::default()),
            len: 0,
        }
    }

    /// Appends an operand.
    ///
    /// # Panics
    ///
    /// Panics if the list already holds seven operands.
    #[inline]
    pub fn push(&mut self, op: Operand) {
        assert!(
            (self.len as usize) < Self::MAX_LEN,
            "OperandList overflow: max {} operands",
            Self::MAX_LEN
        );
        self.items[self.len as usize] = op;
        self.len += 1;
    }

    /// Number of operands.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the list is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The operands as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Operand] {
        &self.items[..self.len as usize]
    }
}

impl core::ops::Deref for OperandList {
    type Target = [Operand];
    #[inline]
    fn deref(&self) -> &[Operand] {
        self.as_slice()
    }
}

impl Clone for OperandList {
    fn clone(&self) -> Self {
        let mut list = Self::new();
        for op in self.as_slice() {
            list.push(op.clone());
        }
        list
    }
}

impl PartialEq for OperandList {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for OperandList {}

impl core::hash::Hash for OperandList {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl fmt::Debug for OperandList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl Default for OperandList {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a OperandList {
    type Item = &'a Operand;
    type IntoIter = core::slice::Iter<'a, Operand>;
    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl FromIterator<Operand> for OperandList {
    /// # Panics
    ///
    /// Panics on more than seven operands.
    fn from_iter<I: IntoIterator<Item = Operand>>(iter: I) -> Self {
        let mut list = Self::new();
        for op in iter {
            list.push(op);
        }
        list
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for OperandList {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for op in self {
            seq.serialize_element(op)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for OperandList {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let ops: Vec<Operand> = Vec::deserialize(deserializer)?;
        if ops.len() > Self::MAX_LEN {
            return Err(serde::de::Error::custom(alloc::format!(
                "too many operands: {} > {}",
                ops.len(),
                Self::MAX_LEN
            )));
        }
        Ok(ops.into_iter().collect())
    }
}

// ── Instruction ─────────────────────────────────────────────────────────

/// A mnemonic with its ordered operands.
///
/// ```rust
/// use kvx_isa::{Instruction, Operand, Reg};
///
/// let insn = Instruction::new("addd")
///     .with(Operand::reg(Reg::gpr(0)))
///     .with(Operand::reg(Reg::gpr(1)))
///     .with(Operand::imm(10));
/// assert_eq!(insn.operands.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Mnemonic, without modifiers.
    pub mnemonic: Mnemonic,
    /// Operands in format order.
    pub operands: OperandList,
}

impl Instruction {
    /// An instruction with no operands yet.
    pub fn new(mnemonic: &str) -> Self {
        Self {
            mnemonic: Mnemonic::from(mnemonic),
            operands: OperandList::new(),
        }
    }

    /// Appends an operand.
    #[must_use]
    pub fn with(mut self, operand: Operand) -> Self {
        self.operands.push(operand);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonic_truncates_on_char_boundary() {
        let m = Mnemonic::from("abcdefghijklmno\u{e9}");
        assert_eq!(m.len(), 15);
        assert_eq!(m.as_str(), "abcdefghijklmno");
        assert!(m.is_truncated());
        assert_ne!(m, Mnemonic::from("abcdefghijklmno"));
    }

    #[test]
    fn mnemonic_compares_with_str() {
        let m = Mnemonic::from("addd");
        assert_eq!(m, "addd");
        assert!(!m.is_empty());
        assert!(!m.is_truncated());
    }

    #[test]
    fn operand_list_collects() {
        let list: OperandList = (0..3).map(Operand::imm).collect();
        assert_eq!(list.len(), 3);
        assert_eq!(list[2], Operand::Immediate(2));
    }

    #[test]
    #[should_panic(expected = "OperandList overflow")]
    fn operand_list_overflow_panics() {
        let _: OperandList = (0..8).map(Operand::imm).collect();
    }

    #[test]
    fn symbol_builder() {
        let sym = SymbolRef::with_function("foo", "gotoff").addend(8);
        assert_eq!(sym.function.as_deref(), Some("gotoff"));
        assert_eq!(sym.addend, 8);
    }

    #[test]
    fn pointer_mode_bits() {
        assert_eq!(PointerMode::Bits32.bits(), 32);
        assert_eq!(PointerMode::default(), PointerMode::Bits64);
        assert_eq!(alloc::format!("{}", PointerMode::Bits64), "64-bit");
    }
}
