//! Instruction decoder.
//!
//! Classification is delegated to [`crate::encoding`]; this module pulls the
//! operand fields out of the word according to the encoding's
//! [`OperandFormat`].

use crate::encoding::{classify_opcode, OpcodeEncoding, OperandFormat};
use crate::state::GeneralRegister;

/// The eight operand addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum AddressingMode {
    /// 0: the register itself.
    Register,
    /// 1: `(r)`, the register holds the address.
    RegisterDeferred,
    /// 2: `(r)+`, address in the register, then the register advances.
    Autoincrement,
    /// 3: `@(r)+`, the register points at the address, then advances by a word.
    AutoincrementDeferred,
    /// 4: `-(r)`, the register retreats, then holds the address.
    Autodecrement,
    /// 5: `@-(r)`, the register retreats by a word, then points at the address.
    AutodecrementDeferred,
    /// 6: `X(r)`, register plus the next instruction word.
    Index,
    /// 7: `@X(r)`, register plus the next instruction word points at the address.
    IndexDeferred,
}

impl AddressingMode {
    /// Decodes the low three bits of a mode field.
    #[must_use]
    pub const fn from_field(bits: u16) -> Self {
        match bits & 0o7 {
            0 => Self::Register,
            1 => Self::RegisterDeferred,
            2 => Self::Autoincrement,
            3 => Self::AutoincrementDeferred,
            4 => Self::Autodecrement,
            5 => Self::AutodecrementDeferred,
            6 => Self::Index,
            _ => Self::IndexDeferred,
        }
    }

    /// Three-bit field value.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self as u16
    }

    /// Whether the mode reads an extra word from the instruction stream.
    #[must_use]
    pub const fn uses_index_word(self) -> bool {
        matches!(self, Self::Index | Self::IndexDeferred)
    }
}

/// A six-bit operand specifier: mode in bits 5..3, register in bits 2..0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AddrOp {
    /// Addressing mode.
    pub mode: AddressingMode,
    /// Base register.
    pub reg: GeneralRegister,
}

impl AddrOp {
    /// Builds an operand specifier.
    #[must_use]
    pub const fn new(mode: AddressingMode, reg: GeneralRegister) -> Self {
        Self { mode, reg }
    }

    /// Decodes the low six bits of `field`.
    #[must_use]
    pub const fn from_field(field: u16) -> Self {
        Self {
            mode: AddressingMode::from_field(field >> 3),
            reg: GeneralRegister::from_field(field),
        }
    }

    /// Six-bit field value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn field(self) -> u16 {
        (self.mode.bits() << 3) | self.reg.index() as u16
    }
}

/// Decoded operand fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operands {
    /// No operands.
    None,
    /// Source and destination.
    Double {
        /// Source, bits 11..6.
        src: AddrOp,
        /// Destination, bits 5..0.
        dst: AddrOp,
    },
    /// Register plus an operand, for both register-source and register-destination forms.
    RegisterOperand {
        /// Register, bits 8..6.
        reg: GeneralRegister,
        /// Operand, bits 5..0.
        operand: AddrOp,
    },
    /// `sob` register and unsigned backward word count.
    Sob {
        /// Counter register.
        reg: GeneralRegister,
        /// Words to branch back.
        words: u16,
    },
    /// Single operand.
    Single(AddrOp),
    /// Signed branch displacement in bytes, relative to the updated PC.
    Branch(i16),
    /// Eight-bit trap code.
    TrapCode(u8),
    /// Condition code operator.
    ConditionCode {
        /// `true` sets, `false` clears.
        set: bool,
        /// `N Z V C` mask in `PSW` bit order.
        mask: u16,
    },
    /// Register only.
    Register(GeneralRegister),
    /// Three-bit value (`spl` priority).
    Priority(u8),
    /// Six-bit `mark` parameter count.
    Mark(u16),
}

/// Signed byte displacement encoded in the low byte of a branch word.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub const fn branch_displacement(word: u16) -> i16 {
    (word as u8 as i8 as i16) * 2
}

/// Decodes operands laid out as `format`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn decode_operands(format: OperandFormat, word: u16) -> Operands {
    match format {
        OperandFormat::None => Operands::None,
        OperandFormat::Double => Operands::Double {
            src: AddrOp::from_field(word >> 6),
            dst: AddrOp::from_field(word),
        },
        OperandFormat::RegisterSource | OperandFormat::RegisterDestination => {
            Operands::RegisterOperand {
                reg: GeneralRegister::from_field(word >> 6),
                operand: AddrOp::from_field(word),
            }
        }
        OperandFormat::Sob => Operands::Sob {
            reg: GeneralRegister::from_field(word >> 6),
            words: word & 0o77,
        },
        OperandFormat::Single => Operands::Single(AddrOp::from_field(word)),
        OperandFormat::Branch => Operands::Branch(branch_displacement(word)),
        OperandFormat::TrapCode => Operands::TrapCode(word as u8),
        OperandFormat::ConditionCode => Operands::ConditionCode {
            set: word & 0o20 != 0,
            mask: word & 0o17,
        },
        OperandFormat::Register => Operands::Register(GeneralRegister::from_field(word)),
        OperandFormat::Priority => Operands::Priority((word & 0o7) as u8),
        OperandFormat::Mark => Operands::Mark(word & 0o77),
    }
}

/// A classified instruction word with its operand fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecodedInstruction {
    /// Raw instruction word.
    pub word: u16,
    /// Classified encoding.
    pub encoding: OpcodeEncoding,
    /// Operand fields.
    pub operands: Operands,
}

impl DecodedInstruction {
    /// Number of extra instruction-stream words consumed by the operands.
    #[must_use]
    pub const fn index_words(&self) -> u16 {
        const fn count(op: AddrOp) -> u16 {
            op.mode.uses_index_word() as u16
        }
        match self.operands {
            Operands::Double { src, dst } => count(src) + count(dst),
            Operands::RegisterOperand { operand, .. } | Operands::Single(operand) => count(operand),
            _ => 0,
        }
    }
}

/// Stateless instruction decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decoder;

impl Decoder {
    /// Decodes one instruction word. Never fails; unrecognised words decode
    /// as [`OpcodeEncoding::Unknown`] with no operands.
    #[must_use]
    pub fn decode(word: u16) -> DecodedInstruction {
        let encoding = classify_opcode(word);
        DecodedInstruction {
            word,
            encoding,
            operands: decode_operands(encoding.operand_format(), word),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{branch_displacement, AddrOp, AddressingMode, Decoder, Operands};
    use crate::encoding::OpcodeEncoding;
    use crate::state::GeneralRegister;

    #[test]
    fn operand_field_round_trips_for_all_six_bit_values() {
        for field in 0_u16..0o100 {
            assert_eq!(AddrOp::from_field(field).field(), field);
        }
        let op = AddrOp::from_field(0o27);
        assert_eq!(op.mode, AddressingMode::Autoincrement);
        assert_eq!(op.reg, GeneralRegister::PC);
    }

    #[test]
    fn branch_displacement_is_signed_words() {
        assert_eq!(branch_displacement(0o000401), 2);
        assert_eq!(branch_displacement(0o000777), -2);
        assert_eq!(branch_displacement(0o000600), -256);
        assert_eq!(branch_displacement(0o000577), 254);
    }

    #[test]
    fn double_operand_fields_are_split() {
        let decoded = Decoder::decode(0o016127);
        assert_eq!(decoded.encoding, OpcodeEncoding::Mov);
        assert_eq!(
            decoded.operands,
            Operands::Double {
                src: AddrOp::new(AddressingMode::Index, GeneralRegister::R1),
                dst: AddrOp::new(AddressingMode::Autoincrement, GeneralRegister::PC),
            }
        );
        assert_eq!(decoded.index_words(), 1);
    }

    #[test]
    fn condition_code_fields() {
        let decoded = Decoder::decode(0o000263);
        assert_eq!(
            decoded.operands,
            Operands::ConditionCode {
                set: true,
                mask: 0o3
            }
        );
    }

    #[test]
    fn unknown_words_have_no_operands() {
        let decoded = Decoder::decode(0o000007);
        assert_eq!(decoded.encoding, OpcodeEncoding::Unknown);
        assert_eq!(decoded.operands, Operands::None);
        assert_eq!(decoded.index_words(), 0);
    }

    #[test]
    fn exhaustive_decode_is_total() {
        for word in 0_u16..=u16::MAX {
            let decoded = Decoder::decode(word);
            assert_eq!(decoded.word, word);
            assert!(decoded.index_words() <= 2);
        }
    }
}
