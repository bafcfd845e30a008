//! Register banks, register classes and name lookup.
//!
//! Registers are identified by their bank and first physical unit. A paired
//! register `$r0r1` is `Reg { bank: Gpr, index: 0, count: 2 }` and shares
//! storage with `$r0` and `$r1`; register classes describe which unit ranges
//! an operand accepts and how a register maps to the encoded field.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::IsaError;

table_id! {
    /// Index of a [`RegisterClass`] in a [`RegisterFile`].
    RegClassId
}

/// Register bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bank {
    /// General-purpose registers `$r0..$r63`.
    Gpr,
    /// Coprocessor vector registers `$a0..`.
    Vector,
    /// System function registers (`$pc`, `$ra`, ...).
    System,
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bank::Gpr => write!(f, "gpr"),
            Bank::Vector => write!(f, "vector"),
            Bank::System => write!(f, "system"),
        }
    }
}

/// A register: `count` consecutive units of `bank` starting at `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reg {
    /// Register bank.
    pub bank: Bank,
    /// First physical unit.
    pub index: u16,
    /// Number of units (1, 2 or 4).
    pub count: u8,
}

impl Reg {
    /// Creates a register.
    #[inline]
    pub const fn new(bank: Bank, index: u16, count: u8) -> Self {
        Self { bank, index, count }
    }

    /// `$r<index>`.
    #[inline]
    pub const fn gpr(index: u16) -> Self {
        Self::new(Bank::Gpr, index, 1)
    }

    /// `$r<index>r<index+1>`.
    #[inline]
    pub const fn gpr_pair(index: u16) -> Self {
        Self::new(Bank::Gpr, index, 2)
    }

    /// `$r<index>..r<index+3>`.
    #[inline]
    pub const fn gpr_quad(index: u16) -> Self {
        Self::new(Bank::Gpr, index, 4)
    }

    /// `$a<index>`.
    #[inline]
    pub const fn vector(index: u16) -> Self {
        Self::new(Bank::Vector, index, 1)
    }

    /// System register number `index`.
    #[inline]
    pub const fn system(index: u16) -> Self {
        Self::new(Bank::System, index, 1)
    }

    /// Last physical unit covered.
    #[inline]
    pub const fn last(&self) -> u32 {
        self.index as u32 + self.count as u32 - 1
    }
}

/// Names of the units of one bank.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BankInfo {
    /// The bank described.
    pub bank: Bank,
    /// Name prefix, e.g. `$r`.
    pub prefix: String,
    /// Canonical name of every unit.
    pub names: Vec<String>,
}

impl BankInfo {
    /// A bank whose units are all named `<prefix><n>`.
    pub fn numbered(bank: Bank, prefix: &str, size: u16) -> Self {
        Self::named(bank, prefix, size, &[])
    }

    /// A bank whose first units carry the given names; the rest are
    /// numbered.
    pub fn named(bank: Bank, prefix: &str, size: u16, names: &[&str]) -> Self {
        let names = (0..size)
            .map(|i| match names.get(i as usize) {
                Some(name) => String::from(*name),
                None => format!("{}{}", prefix, i),
            })
            .collect();
        Self {
            bank,
            prefix: prefix.into(),
            names,
        }
    }

    /// Number of units.
    #[inline]
    pub fn size(&self) -> usize {
        self.names.len()
    }

    fn unit_name(&self, index: u32) -> String {
        match self.names.get(index as usize) {
            Some(name) => name.clone(),
            None => format!("{}{}", self.prefix, index),
        }
    }

    /// Parses `$r4`, `$r4r5`, `$r4r5r6r7`.
    fn parse_composite(&self, name: &str) -> Option<Reg> {
        let letters = self.prefix.strip_prefix('$')?;
        if letters.is_empty() {
            return None;
        }
        let tail = name.strip_prefix(self.prefix.as_str())?;
        let mut first: Option<u16> = None;
        let mut count = 0u8;
        for part in tail.split(letters) {
            let canonical = !part.is_empty()
                && part.bytes().all(|b| b.is_ascii_digit())
                && !(part.len() > 1 && part.starts_with('0'));
            if !canonical {
                return None;
            }
            let n: u16 = part.parse().ok()?;
            match first {
                None => first = Some(n),
                Some(f) if u32::from(n) == u32::from(f) + u32::from(count) => {}
                Some(_) => return None,
            }
            count = count.checked_add(1)?;
        }
        if !count.is_power_of_two() {
            return None;
        }
        first.map(|index| Reg::new(self.bank, index, count))
    }
}

/// A set of registers an operand may name.
///
/// Covers units `first..=last` of `bank`, `stride` units per register, with
/// the first unit a multiple of `align`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterClass {
    /// Class name used in diagnostics.
    pub name: String,
    /// Bank the class draws from.
    pub bank: Bank,
    /// Units per register.
    pub stride: u8,
    /// Required alignment of the first unit.
    pub align: u8,
    /// First unit of the class.
    pub first: u16,
    /// Last unit of the class.
    pub last: u16,
}

impl RegisterClass {
    /// Number of registers, i.e. distinct encodable field values.
    pub fn len(&self) -> usize {
        let units = u32::from(self.last) + 1 - u32::from(self.first);
        (units / u32::from(self.stride.max(1))) as usize
    }

    /// Whether the class is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `reg` has the shape of a member (same bank and width).
    #[inline]
    pub fn accepts_shape(&self, reg: Reg) -> bool {
        reg.bank == self.bank && reg.count == self.stride
    }
}

/// Banks, aliases and classes of one architecture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterFile {
    /// One entry per bank.
    pub banks: Vec<BankInfo>,
    /// Alternate names (`$sp` for `$r12`).
    pub aliases: Vec<(String, Bank, u16)>,
    /// Register classes, indexed by [`RegClassId`].
    pub classes: Vec<RegisterClass>,
}

impl RegisterFile {
    /// An empty register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a bank.
    pub fn add_bank(&mut self, info: BankInfo) {
        self.banks.push(info);
    }

    /// Adds an alternate name for one unit.
    pub fn add_alias(&mut self, alias: &str, bank: Bank, index: u16) {
        self.aliases.push((alias.into(), bank, index));
    }

    /// Adds a class and returns its id.
    pub fn add_class(
        &mut self,
        name: &str,
        bank: Bank,
        stride: u8,
        align: u8,
        first: u16,
        last: u16,
    ) -> RegClassId {
        let id = RegClassId(self.classes.len() as u16);
        self.classes.push(RegisterClass {
            name: name.into(),
            bank,
            stride,
            align,
            first,
            last,
        });
        id
    }

    /// Bank description.
    pub fn bank(&self, bank: Bank) -> Option<&BankInfo> {
        self.banks.iter().find(|b| b.bank == bank)
    }

    /// Class by id.
    ///
    /// # Panics
    ///
    /// Panics on an id from another register file.
    #[inline]
    pub fn class(&self, id: RegClassId) -> &RegisterClass {
        &self.classes[id.index()]
    }

    /// Validates `index` against a class and returns the register.
    pub fn resolve(&self, id: RegClassId, index: u16) -> Result<Reg, IsaError> {
        let class = self.class(id);
        let end = u32::from(index) + u32::from(class.stride) - 1;
        if index < class.first || end > u32::from(class.last) {
            return Err(IsaError::OutOfRange {
                class: class.name.clone(),
                index,
            });
        }
        if index % u16::from(class.align.max(1)) != 0 {
            return Err(IsaError::MisalignedRegister {
                class: class.name.clone(),
                index,
                alignment: class.align,
            });
        }
        Ok(Reg::new(class.bank, index, class.stride))
    }

    /// Every class that can encode `reg` as written: same bank and width,
    /// inside the class range and on its alignment.
    pub fn classify(&self, reg: Reg) -> Vec<RegClassId> {
        (0..self.classes.len())
            .map(|i| RegClassId(i as u16))
            .filter(|&id| self.class(id).accepts_shape(reg) && self.resolve(id, reg.index).is_ok())
            .collect()
    }

    /// Encoded field value of `reg` in class `id`.
    pub fn field(&self, id: RegClassId, reg: Reg) -> Result<u64, IsaError> {
        let class = self.class(id);
        if !class.accepts_shape(reg) {
            return Err(IsaError::OutOfRange {
                class: class.name.clone(),
                index: reg.index,
            });
        }
        let reg = self.resolve(id, reg.index)?;
        Ok(u64::from((reg.index - class.first) / u16::from(class.stride)))
    }

    /// Register encoded by `field` in class `id`, if the field is in range.
    pub fn from_field(&self, id: RegClassId, field: u64) -> Option<Reg> {
        let class = self.class(id);
        let stride = u64::from(class.stride);
        let index = u64::from(class.first).checked_add(field.checked_mul(stride)?)?;
        if index + stride - 1 > u64::from(class.last) {
            return None;
        }
        Some(Reg::new(class.bank, index as u16, class.stride))
    }

    /// Parses a register name: canonical unit names, aliases and
    /// composite names such as `$r0r1r2r3`.
    ///
    /// Only the syntax is checked; range and alignment are checked when
    /// the register is encoded against a class.
    pub fn lookup(&self, name: &str) -> Result<Reg, IsaError> {
        if let Some((_, bank, index)) = self.aliases.iter().find(|(alias, _, _)| alias == name) {
            return Ok(Reg::new(*bank, *index, 1));
        }
        for info in &self.banks {
            if let Some(index) = info.names.iter().position(|n| n == name) {
                return Ok(Reg::new(info.bank, index as u16, 1));
            }
        }
        self.banks
            .iter()
            .find_map(|info| info.parse_composite(name))
            .ok_or_else(|| IsaError::UnknownRegister { name: name.into() })
    }

    /// Canonical name: `$r3`, `$r0r1`, `$a2`, `$ra`.
    pub fn name(&self, reg: Reg) -> String {
        let Some(info) = self.bank(reg.bank) else {
            return format!("%{}{}", reg.bank, reg.index);
        };
        let mut out = String::new();
        for unit in u32::from(reg.index)..=reg.last() {
            let name = info.unit_name(unit);
            if out.is_empty() {
                out.push_str(&name);
            } else {
                out.push_str(name.trim_start_matches('$'));
            }
        }
        out
    }
}
