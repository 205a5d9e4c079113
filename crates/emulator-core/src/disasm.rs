//! Instruction disassembly.
//!
//! Operands use the usual assembler syntax. Numbers are octal. With memory
//! available, index words are read from the instruction stream and
//! PC-relative operands are shown as absolute addresses; without it they are
//! shown symbolically (`X(r1)`, `#X`, `.+6`).

use std::fmt;

use crate::decoder::{AddrOp, AddressingMode, Decoder, Operands};
use crate::encoding::OpcodeEncoding;
use crate::memory::Memory;
use crate::state::GeneralRegister;

/// A single disassembled instruction row.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct DisassemblyRow {
    /// The starting address of this instruction.
    pub addr_start: u16,
    /// Length in bytes, including index words that could be read.
    pub len_bytes: u8,
    /// Opcode followed by the index words that were read.
    pub raw_words: Vec<u16>,
    /// Classified encoding.
    pub encoding: OpcodeEncoding,
    /// The instruction mnemonic (e.g. `mov`, `clc|clv`, `.word`).
    pub mnemonic: String,
    /// The formatted operands (e.g. `#1234, -(sp)`).
    pub operands: String,
    /// The word matches no known instruction.
    pub is_illegal: bool,
    /// The instruction decodes but raises an illegal instruction trap when run.
    pub is_unimplemented: bool,
}

impl fmt::Display for DisassemblyRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operands.is_empty() {
            f.write_str(&self.mnemonic)
        } else {
            write!(f, "{} {}", self.mnemonic, self.operands)
        }
    }
}

/// Instruction-stream reader. `pc` is the address of the next word.
struct Stream<'a> {
    pc: Option<u16>,
    memory: Option<&'a Memory>,
    words: Vec<u16>,
}

impl Stream<'_> {
    fn next_word(&mut self) -> Option<u16> {
        let pc = self.pc?;
        let word = self.memory?.peek_word(pc)?;
        self.pc = Some(pc.wrapping_add(2));
        self.words.push(word);
        Some(word)
    }
}

/// Disassembles a lone instruction word with no surrounding memory.
#[must_use]
pub fn disassemble_word(opcode: u16) -> DisassemblyRow {
    render(
        0,
        Stream {
            pc: None,
            memory: None,
            words: vec![opcode],
        },
    )
}

/// Disassembles the instruction at `pc`, reading index words from core.
///
/// Returns `None` when `pc` is odd or outside core.
#[must_use]
pub fn disassemble_one(pc: u16, memory: &Memory) -> Option<DisassemblyRow> {
    let opcode = memory.peek_word(pc)?;
    Some(render(
        pc,
        Stream {
            pc: Some(pc.wrapping_add(2)),
            memory: Some(memory),
            words: vec![opcode],
        },
    ))
}

/// Disassembles up to `count` consecutive instructions starting at `start`.
#[must_use]
pub fn disassemble_range(start: u16, count: usize, memory: &Memory) -> Vec<DisassemblyRow> {
    let mut rows = Vec::with_capacity(count);
    let mut pc = start;
    for _ in 0..count {
        let Some(row) = disassemble_one(pc, memory) else {
            break;
        };
        pc = pc.wrapping_add(u16::from(row.len_bytes));
        rows.push(row);
    }
    rows
}

#[allow(clippy::cast_possible_truncation)]
fn render(addr_start: u16, mut stream: Stream<'_>) -> DisassemblyRow {
    let opcode = stream.words[0];
    let decoded = Decoder::decode(opcode);
    let encoding = decoded.encoding;

    let mnemonic = match decoded.operands {
        Operands::ConditionCode { set, mask } => condition_code_mnemonic(set, mask),
        _ => encoding.mnemonic().to_string(),
    };
    let operands = match decoded.operands {
        Operands::None if encoding == OpcodeEncoding::Unknown => format!("{opcode:06o}"),
        Operands::None | Operands::ConditionCode { .. } => String::new(),
        Operands::Double { src, dst } => {
            let src = format_operand(src, &mut stream);
            let dst = format_operand(dst, &mut stream);
            format!("{src}, {dst}")
        }
        Operands::RegisterOperand { reg, operand } => {
            let operand = format_operand(operand, &mut stream);
            if encoding == OpcodeEncoding::Jsr || encoding == OpcodeEncoding::Xor {
                format!("{reg}, {operand}")
            } else {
                format!("{operand}, {reg}")
            }
        }
        Operands::Sob { reg, words } => {
            let displacement = -2 * i32::from(words);
            format!("{reg}, {}", branch_target(addr_start, &stream, displacement))
        }
        Operands::Single(dst) => format_operand(dst, &mut stream),
        Operands::Branch(displacement) => {
            branch_target(addr_start, &stream, i32::from(displacement))
        }
        Operands::TrapCode(code) => format!("{code:o}"),
        Operands::Register(reg) => reg.to_string(),
        Operands::Priority(level) => format!("{level}"),
        Operands::Mark(count) => format!("{count:o}"),
    };

    let words = stream.words;
    DisassemblyRow {
        addr_start,
        len_bytes: (words.len() * 2) as u8,
        raw_words: words,
        encoding,
        mnemonic,
        operands,
        is_illegal: encoding == OpcodeEncoding::Unknown,
        is_unimplemented: encoding != OpcodeEncoding::Unknown && !encoding.is_implemented(),
    }
}

/// Branch target: absolute when the address is known, `.`-relative otherwise.
fn branch_target(addr_start: u16, stream: &Stream<'_>, displacement: i32) -> String {
    if stream.memory.is_some() {
        let target = i32::from(addr_start) + 2 + displacement;
        return format!("{:o}", target.rem_euclid(0x1_0000));
    }
    let offset = displacement + 2;
    match offset {
        0 => ".".to_string(),
        o if o > 0 => format!(".+{o:o}"),
        o => format!(".-{:o}", -o),
    }
}

fn format_operand(op: AddrOp, stream: &mut Stream<'_>) -> String {
    let reg = op.reg;
    if reg == GeneralRegister::PC {
        match op.mode {
            AddressingMode::Autoincrement => {
                return stream
                    .next_word()
                    .map_or_else(|| "#X".to_string(), |word| format!("#{word:o}"));
            }
            AddressingMode::AutoincrementDeferred => {
                return stream
                    .next_word()
                    .map_or_else(|| "@#X".to_string(), |word| format!("@#{word:o}"));
            }
            AddressingMode::Index | AddressingMode::IndexDeferred => {
                let deferred = if op.mode == AddressingMode::IndexDeferred {
                    "@"
                } else {
                    ""
                };
                return match stream.next_word() {
                    Some(word) => {
                        let target = stream.pc.unwrap_or(0).wrapping_add(word);
                        format!("{deferred}{target:o}")
                    }
                    None => format!("{deferred}X(pc)"),
                };
            }
            _ => {}
        }
    }

    match op.mode {
        AddressingMode::Register => reg.to_string(),
        AddressingMode::RegisterDeferred => format!("({reg})"),
        AddressingMode::Autoincrement => format!("({reg})+"),
        AddressingMode::AutoincrementDeferred => format!("@({reg})+"),
        AddressingMode::Autodecrement => format!("-({reg})"),
        AddressingMode::AutodecrementDeferred => format!("@-({reg})"),
        AddressingMode::Index | AddressingMode::IndexDeferred => {
            let deferred = if op.mode == AddressingMode::IndexDeferred {
                "@"
            } else {
                ""
            };
            match stream.next_word() {
                Some(word) => format!("{deferred}{word:o}({reg})"),
                None => format!("{deferred}X({reg})"),
            }
        }
    }
}

fn condition_code_mnemonic(set: bool, mask: u16) -> String {
    match (set, mask & 0o17) {
        (_, 0) => "nop".to_string(),
        (false, 0o17) => "ccc".to_string(),
        (true, 0o17) => "scc".to_string(),
        (set, mask) => {
            let prefix = if set { "se" } else { "cl" };
            ['c', 'v', 'z', 'n']
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1_u16 << *bit) != 0)
                .map(|(_, flag)| format!("{prefix}{flag}"))
                .collect::<Vec<_>>()
                .join("|")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{disassemble_one, disassemble_range, disassemble_word};
    use crate::encoding::{OpcodeEncoding, DISPATCH_LAYERS};
    use crate::memory::Memory;

    fn memory_with(base: u16, words: &[u16]) -> Memory {
        let mut memory = Memory::new(0o10000);
        let bytes: Vec<u8> = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        memory.load_image(base, &bytes).unwrap();
        memory
    }

    #[test]
    fn disassemble_register_forms() {
        assert_eq!(disassemble_word(0o010001).to_string(), "mov r0, r1");
        assert_eq!(disassemble_word(0o110221).to_string(), "movb r2, (r1)+");
        assert_eq!(disassemble_word(0o005046).to_string(), "clr -(sp)");
        assert_eq!(disassemble_word(0o005337).to_string(), "dec @#X");
        assert_eq!(disassemble_word(0o000207).to_string(), "rts pc");
        assert_eq!(disassemble_word(0o070102).to_string(), "mul r2, r1");
        assert_eq!(disassemble_word(0o004567).to_string(), "jsr r5, X(pc)");
    }

    #[test]
    fn disassemble_branches_relative_without_memory() {
        assert_eq!(disassemble_word(0o000777).to_string(), "br .");
        assert_eq!(disassemble_word(0o001003).to_string(), "bne .+10");
        assert_eq!(disassemble_word(0o100775).to_string(), "bpl .-4");
        assert_eq!(disassemble_word(0o077102).to_string(), "sob r1, .-2");
    }

    #[test]
    fn disassemble_condition_codes() {
        assert_eq!(disassemble_word(0o000240).mnemonic, "nop");
        assert_eq!(disassemble_word(0o000241).mnemonic, "clc");
        assert_eq!(disassemble_word(0o000262).mnemonic, "sev");
        assert_eq!(disassemble_word(0o000254).mnemonic, "clz|cln");
        assert_eq!(disassemble_word(0o000277).mnemonic, "scc");
        assert_eq!(disassemble_word(0o000257).mnemonic, "ccc");
    }

    #[test]
    fn disassemble_illegal_and_unimplemented() {
        let row = disassemble_word(0o000007);
        assert!(row.is_illegal);
        assert!(!row.is_unimplemented);
        assert_eq!(row.to_string(), ".word 000007");

        let row = disassemble_word(0o104401);
        assert_eq!(row.to_string(), "trap 1");
        assert!(row.is_unimplemented);
        assert!(!row.is_illegal);
    }

    #[test]
    fn disassemble_reads_index_words_from_memory() {
        let memory = memory_with(
            0o1000,
            &[0o012737, 0o101, 0o177566, 0o016001, 0o4, 0o000772, 0o005067, 0o10],
        );
        let rows = disassemble_range(0o1000, 4, &memory);
        let text: Vec<String> = rows.iter().map(ToString::to_string).collect();
        assert_eq!(
            text,
            [
                "mov #101, @#177566",
                "mov 4(r0), r1",
                "br 1000",
                "clr 1030",
            ]
        );
        assert_eq!(rows[0].len_bytes, 6);
        assert_eq!(rows[0].raw_words, [0o012737, 0o101, 0o177566]);
        assert_eq!(rows[2].addr_start, 0o1012);
    }

    #[test]
    fn disassemble_one_needs_an_aligned_core_address() {
        let memory = memory_with(0o1000, &[0o000240]);
        assert!(disassemble_one(0o1001, &memory).is_none());
        assert!(disassemble_one(0o10000, &memory).is_none());
        assert_eq!(disassemble_one(0o1000, &memory).unwrap().mnemonic, "nop");
    }

    #[test]
    fn mnemonic_agrees_with_encoding_for_every_base_opcode() {
        for layer in DISPATCH_LAYERS {
            for (_, encoding) in layer.cases {
                if *encoding == OpcodeEncoding::ConditionCode {
                    continue;
                }
                let word = encoding.base_opcode().unwrap();
                let row = disassemble_word(word);
                assert_eq!(row.encoding, *encoding);
                assert_eq!(row.mnemonic, encoding.mnemonic(), "{word:06o}");
                assert_eq!(row.is_unimplemented, !encoding.is_implemented());
            }
        }
    }
}
