/// Every instruction the decoder can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[allow(missing_docs)]
pub enum OpcodeEncoding {
    // double operand
    Mov,
    Movb,
    Cmp,
    Cmpb,
    Bit,
    Bitb,
    Bic,
    Bicb,
    Bis,
    Bisb,
    Add,
    Sub,
    // register and operand
    Jsr,
    Mul,
    Div,
    Ash,
    Ashc,
    Xor,
    Sob,
    // branch and trap
    Br,
    Bne,
    Beq,
    Bge,
    Blt,
    Bgt,
    Ble,
    Bpl,
    Bmi,
    Bhi,
    Blos,
    Bvc,
    Bvs,
    Bcc,
    Bcs,
    Emt,
    Trap,
    // single operand
    Jmp,
    Swab,
    Clr,
    Clrb,
    Com,
    Comb,
    Inc,
    Incb,
    Dec,
    Decb,
    Neg,
    Negb,
    Adc,
    Adcb,
    Sbc,
    Sbcb,
    Tst,
    Tstb,
    Ror,
    Rorb,
    Rol,
    Rolb,
    Asr,
    Asrb,
    Asl,
    Aslb,
    Mark,
    Mfpi,
    Mtpi,
    Mfpd,
    Mtpd,
    Sxt,
    // condition codes
    ConditionCode,
    // register only
    Rts,
    Spl,
    // no operand
    Halt,
    Wait,
    Rti,
    Bpt,
    Iot,
    Reset,
    Rtt,
    // floating-point mode
    Setd,
    Seti,
    /// Anything no layer recognises.
    Unknown,
}

/// Operand layout of an instruction word, used for disassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandFormat {
    /// No operands.
    None,
    /// `ss dd` in bits 11..0.
    Double,
    /// Register in bits 8..6, source operand in bits 5..0 (`mul src, r`).
    RegisterSource,
    /// Register in bits 8..6, destination operand in bits 5..0 (`jsr r, dst`).
    RegisterDestination,
    /// Register in bits 8..6, backward word offset in bits 5..0.
    Sob,
    /// `dd` in bits 5..0.
    Single,
    /// Signed word offset in bits 7..0.
    Branch,
    /// Trap code in bits 7..0.
    TrapCode,
    /// Set/clear bit 4 and `N Z V C` mask in bits 3..0.
    ConditionCode,
    /// Register in bits 2..0.
    Register,
    /// Priority in bits 2..0.
    Priority,
    /// Parameter count in bits 5..0.
    Mark,
}

/// One layer of the decode cascade: `(word >> shift) & mask` is looked up in `cases`.
#[derive(Debug, Clone, Copy)]
pub struct DispatchLayer {
    /// Layer name for diagnostics.
    pub name: &'static str,
    /// Right shift applied to the word.
    pub shift: u32,
    /// Mask applied after shifting.
    pub mask: u16,
    /// `(key, encoding)` pairs.
    pub cases: &'static [(u16, OpcodeEncoding)],
}

impl DispatchLayer {
    /// Key this layer derives from `word`.
    #[must_use]
    pub const fn key(&self, word: u16) -> u16 {
        (word >> self.shift) & self.mask
    }

    /// Encoding matched by this layer, if any.
    #[must_use]
    pub fn lookup(&self, word: u16) -> Option<OpcodeEncoding> {
        let key = self.key(word);
        self.cases
            .iter()
            .find_map(|(case, encoding)| (*case == key).then_some(*encoding))
    }
}

/// Double operand class, keyed by bits 15..12.
pub const DOUBLE_OPERAND_TABLE: &[(u16, OpcodeEncoding)] = &[
    (0o01, OpcodeEncoding::Mov),
    (0o02, OpcodeEncoding::Cmp),
    (0o03, OpcodeEncoding::Bit),
    (0o04, OpcodeEncoding::Bic),
    (0o05, OpcodeEncoding::Bis),
    (0o06, OpcodeEncoding::Add),
    (0o11, OpcodeEncoding::Movb),
    (0o12, OpcodeEncoding::Cmpb),
    (0o13, OpcodeEncoding::Bitb),
    (0o14, OpcodeEncoding::Bicb),
    (0o15, OpcodeEncoding::Bisb),
    (0o16, OpcodeEncoding::Sub),
];

/// Register and operand class, keyed by bits 15..9.
pub const REGISTER_OPERAND_TABLE: &[(u16, OpcodeEncoding)] = &[
    (0o004, OpcodeEncoding::Jsr),
    (0o070, OpcodeEncoding::Mul),
    (0o071, OpcodeEncoding::Div),
    (0o072, OpcodeEncoding::Ash),
    (0o073, OpcodeEncoding::Ashc),
    (0o074, OpcodeEncoding::Xor),
    (0o077, OpcodeEncoding::Sob),
];

/// Branch and trap class, keyed by bits 15..8 (shifted by 6 with the low two bits cleared).
pub const BRANCH_TABLE: &[(u16, OpcodeEncoding)] = &[
    (0o0004, OpcodeEncoding::Br),
    (0o0010, OpcodeEncoding::Bne),
    (0o0014, OpcodeEncoding::Beq),
    (0o0020, OpcodeEncoding::Bge),
    (0o0024, OpcodeEncoding::Blt),
    (0o0030, OpcodeEncoding::Bgt),
    (0o0034, OpcodeEncoding::Ble),
    (0o1000, OpcodeEncoding::Bpl),
    (0o1004, OpcodeEncoding::Bmi),
    (0o1010, OpcodeEncoding::Bhi),
    (0o1014, OpcodeEncoding::Blos),
    (0o1020, OpcodeEncoding::Bvc),
    (0o1024, OpcodeEncoding::Bvs),
    (0o1030, OpcodeEncoding::Bcc),
    (0o1034, OpcodeEncoding::Bcs),
    (0o1040, OpcodeEncoding::Emt),
    (0o1044, OpcodeEncoding::Trap),
];

/// Single operand class, keyed by bits 15..6.
pub const SINGLE_OPERAND_TABLE: &[(u16, OpcodeEncoding)] = &[
    (0o0001, OpcodeEncoding::Jmp),
    (0o0003, OpcodeEncoding::Swab),
    (0o0050, OpcodeEncoding::Clr),
    (0o0051, OpcodeEncoding::Com),
    (0o0052, OpcodeEncoding::Inc),
    (0o0053, OpcodeEncoding::Dec),
    (0o0054, OpcodeEncoding::Neg),
    (0o0055, OpcodeEncoding::Adc),
    (0o0056, OpcodeEncoding::Sbc),
    (0o0057, OpcodeEncoding::Tst),
    (0o0060, OpcodeEncoding::Ror),
    (0o0061, OpcodeEncoding::Rol),
    (0o0062, OpcodeEncoding::Asr),
    (0o0063, OpcodeEncoding::Asl),
    (0o0064, OpcodeEncoding::Mark),
    (0o0065, OpcodeEncoding::Mfpi),
    (0o0066, OpcodeEncoding::Mtpi),
    (0o0067, OpcodeEncoding::Sxt),
    (0o1050, OpcodeEncoding::Clrb),
    (0o1051, OpcodeEncoding::Comb),
    (0o1052, OpcodeEncoding::Incb),
    (0o1053, OpcodeEncoding::Decb),
    (0o1054, OpcodeEncoding::Negb),
    (0o1055, OpcodeEncoding::Adcb),
    (0o1056, OpcodeEncoding::Sbcb),
    (0o1057, OpcodeEncoding::Tstb),
    (0o1060, OpcodeEncoding::Rorb),
    (0o1061, OpcodeEncoding::Rolb),
    (0o1062, OpcodeEncoding::Asrb),
    (0o1063, OpcodeEncoding::Aslb),
    (0o1065, OpcodeEncoding::Mfpd),
    (0o1066, OpcodeEncoding::Mtpd),
];

/// Condition code operators: `0o000240..=0o000277`.
pub const CONDITION_CODE_TABLE: &[(u16, OpcodeEncoding)] =
    &[(0o024, OpcodeEncoding::ConditionCode)];

/// Register-only class, keyed by bits 15..3.
pub const REGISTER_TABLE: &[(u16, OpcodeEncoding)] =
    &[(0o020, OpcodeEncoding::Rts), (0o023, OpcodeEncoding::Spl)];

/// Operand-free instructions, keyed by the whole word.
pub const ZERO_OPERAND_TABLE: &[(u16, OpcodeEncoding)] = &[
    (0o0, OpcodeEncoding::Halt),
    (0o1, OpcodeEncoding::Wait),
    (0o2, OpcodeEncoding::Rti),
    (0o3, OpcodeEncoding::Bpt),
    (0o4, OpcodeEncoding::Iot),
    (0o5, OpcodeEncoding::Reset),
    (0o6, OpcodeEncoding::Rtt),
    (0o170002, OpcodeEncoding::Seti),
    (0o170011, OpcodeEncoding::Setd),
];

/// Decode cascade in priority order. The first layer with a match wins.
pub const DISPATCH_LAYERS: [DispatchLayer; 7] = [
    DispatchLayer {
        name: "double operand",
        shift: 12,
        mask: 0o17,
        cases: DOUBLE_OPERAND_TABLE,
    },
    DispatchLayer {
        name: "register operand",
        shift: 9,
        mask: 0o177,
        cases: REGISTER_OPERAND_TABLE,
    },
    DispatchLayer {
        name: "branch",
        shift: 6,
        mask: 0o1774,
        cases: BRANCH_TABLE,
    },
    DispatchLayer {
        name: "single operand",
        shift: 6,
        mask: 0o1777,
        cases: SINGLE_OPERAND_TABLE,
    },
    DispatchLayer {
        name: "condition code",
        shift: 3,
        mask: 0o17774,
        cases: CONDITION_CODE_TABLE,
    },
    DispatchLayer {
        name: "register",
        shift: 3,
        mask: 0o17777,
        cases: REGISTER_TABLE,
    },
    DispatchLayer {
        name: "zero operand",
        shift: 0,
        mask: 0o177777,
        cases: ZERO_OPERAND_TABLE,
    },
];

/// Classifies an instruction word. Unrecognised words are [`OpcodeEncoding::Unknown`].
#[must_use]
pub fn classify_opcode(word: u16) -> OpcodeEncoding {
    DISPATCH_LAYERS
        .iter()
        .find_map(|layer| layer.lookup(word))
        .unwrap_or(OpcodeEncoding::Unknown)
}

impl OpcodeEncoding {
    /// Lower-case assembler mnemonic.
    #[must_use]
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Movb => "movb",
            Self::Cmp => "cmp",
            Self::Cmpb => "cmpb",
            Self::Bit => "bit",
            Self::Bitb => "bitb",
            Self::Bic => "bic",
            Self::Bicb => "bicb",
            Self::Bis => "bis",
            Self::Bisb => "bisb",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Jsr => "jsr",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Ash => "ash",
            Self::Ashc => "ashc",
            Self::Xor => "xor",
            Self::Sob => "sob",
            Self::Br => "br",
            Self::Bne => "bne",
            Self::Beq => "beq",
            Self::Bge => "bge",
            Self::Blt => "blt",
            Self::Bgt => "bgt",
            Self::Ble => "ble",
            Self::Bpl => "bpl",
            Self::Bmi => "bmi",
            Self::Bhi => "bhi",
            Self::Blos => "blos",
            Self::Bvc => "bvc",
            Self::Bvs => "bvs",
            Self::Bcc => "bcc",
            Self::Bcs => "bcs",
            Self::Emt => "emt",
            Self::Trap => "trap",
            Self::Jmp => "jmp",
            Self::Swab => "swab",
            Self::Clr => "clr",
            Self::Clrb => "clrb",
            Self::Com => "com",
            Self::Comb => "comb",
            Self::Inc => "inc",
            Self::Incb => "incb",
            Self::Dec => "dec",
            Self::Decb => "decb",
            Self::Neg => "neg",
            Self::Negb => "negb",
            Self::Adc => "adc",
            Self::Adcb => "adcb",
            Self::Sbc => "sbc",
            Self::Sbcb => "sbcb",
            Self::Tst => "tst",
            Self::Tstb => "tstb",
            Self::Ror => "ror",
            Self::Rorb => "rorb",
            Self::Rol => "rol",
            Self::Rolb => "rolb",
            Self::Asr => "asr",
            Self::Asrb => "asrb",
            Self::Asl => "asl",
            Self::Aslb => "aslb",
            Self::Mark => "mark",
            Self::Mfpi => "mfpi",
            Self::Mtpi => "mtpi",
            Self::Mfpd => "mfpd",
            Self::Mtpd => "mtpd",
            Self::Sxt => "sxt",
            Self::ConditionCode => "ccc",
            Self::Rts => "rts",
            Self::Spl => "spl",
            Self::Halt => "halt",
            Self::Wait => "wait",
            Self::Rti => "rti",
            Self::Bpt => "bpt",
            Self::Iot => "iot",
            Self::Reset => "reset",
            Self::Rtt => "rtt",
            Self::Setd => "setd",
            Self::Seti => "seti",
            Self::Unknown => ".word",
        }
    }

    /// Operand layout of this instruction.
    #[must_use]
    pub const fn operand_format(self) -> OperandFormat {
        match self {
            Self::Mov
            | Self::Movb
            | Self::Cmp
            | Self::Cmpb
            | Self::Bit
            | Self::Bitb
            | Self::Bic
            | Self::Bicb
            | Self::Bis
            | Self::Bisb
            | Self::Add
            | Self::Sub => OperandFormat::Double,
            Self::Mul | Self::Div | Self::Ash | Self::Ashc => OperandFormat::RegisterSource,
            Self::Jsr | Self::Xor => OperandFormat::RegisterDestination,
            Self::Sob => OperandFormat::Sob,
            Self::Br
            | Self::Bne
            | Self::Beq
            | Self::Bge
            | Self::Blt
            | Self::Bgt
            | Self::Ble
            | Self::Bpl
            | Self::Bmi
            | Self::Bhi
            | Self::Blos
            | Self::Bvc
            | Self::Bvs
            | Self::Bcc
            | Self::Bcs => OperandFormat::Branch,
            Self::Emt | Self::Trap => OperandFormat::TrapCode,
            Self::Mark => OperandFormat::Mark,
            Self::Jmp
            | Self::Swab
            | Self::Clr
            | Self::Clrb
            | Self::Com
            | Self::Comb
            | Self::Inc
            | Self::Incb
            | Self::Dec
            | Self::Decb
            | Self::Neg
            | Self::Negb
            | Self::Adc
            | Self::Adcb
            | Self::Sbc
            | Self::Sbcb
            | Self::Tst
            | Self::Tstb
            | Self::Ror
            | Self::Rorb
            | Self::Rol
            | Self::Rolb
            | Self::Asr
            | Self::Asrb
            | Self::Asl
            | Self::Aslb
            | Self::Mfpi
            | Self::Mtpi
            | Self::Mfpd
            | Self::Mtpd
            | Self::Sxt => OperandFormat::Single,
            Self::ConditionCode => OperandFormat::ConditionCode,
            Self::Rts => OperandFormat::Register,
            Self::Spl => OperandFormat::Priority,
            Self::Halt
            | Self::Wait
            | Self::Rti
            | Self::Bpt
            | Self::Iot
            | Self::Reset
            | Self::Rtt
            | Self::Setd
            | Self::Seti
            | Self::Unknown => OperandFormat::None,
        }
    }

    /// Whether the execute stage carries out this instruction rather than
    /// raising an illegal instruction trap.
    #[must_use]
    pub const fn is_implemented(self) -> bool {
        matches!(
            self,
            Self::Mov
                | Self::Movb
                | Self::Cmp
                | Self::Cmpb
                | Self::Bit
                | Self::Bitb
                | Self::Bic
                | Self::Bicb
                | Self::Bis
                | Self::Bisb
                | Self::Add
                | Self::Sub
                | Self::Jsr
                | Self::Mul
                | Self::Ash
                | Self::Br
                | Self::Bne
                | Self::Beq
                | Self::Bge
                | Self::Blt
                | Self::Bgt
                | Self::Ble
                | Self::Bpl
                | Self::Bmi
                | Self::Bhi
                | Self::Blos
                | Self::Bvc
                | Self::Bvs
                | Self::Bcc
                | Self::Bcs
                | Self::Jmp
                | Self::Clr
                | Self::Clrb
                | Self::Com
                | Self::Comb
                | Self::Inc
                | Self::Incb
                | Self::Dec
                | Self::Decb
                | Self::Tst
                | Self::Tstb
                | Self::ConditionCode
                | Self::Rts
                | Self::Setd
                | Self::Seti
        )
    }

    /// Lowest instruction word that classifies as this encoding.
    ///
    /// Operand fields are zero. `None` for [`OpcodeEncoding::Unknown`].
    #[must_use]
    pub fn base_opcode(self) -> Option<u16> {
        DISPATCH_LAYERS.iter().find_map(|layer| {
            layer
                .cases
                .iter()
                .find_map(|(key, encoding)| (*encoding == self).then_some(*key << layer.shift))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{classify_opcode, OpcodeEncoding, DISPATCH_LAYERS};

    #[test]
    fn layers_hold_unique_keys() {
        for layer in DISPATCH_LAYERS {
            let keys: HashSet<_> = layer.cases.iter().map(|(key, _)| *key).collect();
            assert_eq!(keys.len(), layer.cases.len(), "{}", layer.name);
        }
    }

    #[test]
    fn every_encoding_appears_once_across_layers() {
        let all: Vec<_> = DISPATCH_LAYERS
            .iter()
            .flat_map(|layer| layer.cases.iter().map(|(_, encoding)| *encoding))
            .collect();
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), all.len());
        assert_eq!(all.len(), 80);
        assert!(!unique.contains(&OpcodeEncoding::Unknown));
    }

    #[test]
    fn base_opcode_classifies_back_to_its_encoding() {
        for layer in DISPATCH_LAYERS {
            for (_, encoding) in layer.cases {
                let word = encoding.base_opcode().unwrap();
                assert_eq!(classify_opcode(word), *encoding, "{word:06o}");
            }
        }
        assert_eq!(OpcodeEncoding::Unknown.base_opcode(), None);
    }

    #[test]
    fn lookup_matches_known_words() {
        assert_eq!(classify_opcode(0o012737), OpcodeEncoding::Mov);
        assert_eq!(classify_opcode(0o112737), OpcodeEncoding::Movb);
        assert_eq!(classify_opcode(0o166767), OpcodeEncoding::Sub);
        assert_eq!(classify_opcode(0o004767), OpcodeEncoding::Jsr);
        assert_eq!(classify_opcode(0o072002), OpcodeEncoding::Ash);
        assert_eq!(classify_opcode(0o000777), OpcodeEncoding::Br);
        assert_eq!(classify_opcode(0o103777), OpcodeEncoding::Bcs);
        assert_eq!(classify_opcode(0o104400), OpcodeEncoding::Trap);
        assert_eq!(classify_opcode(0o000137), OpcodeEncoding::Jmp);
        assert_eq!(classify_opcode(0o105027), OpcodeEncoding::Clrb);
        assert_eq!(classify_opcode(0o000240), OpcodeEncoding::ConditionCode);
        assert_eq!(classify_opcode(0o000277), OpcodeEncoding::ConditionCode);
        assert_eq!(classify_opcode(0o000207), OpcodeEncoding::Rts);
        assert_eq!(classify_opcode(0o000234), OpcodeEncoding::Spl);
        assert_eq!(classify_opcode(0), OpcodeEncoding::Halt);
        assert_eq!(classify_opcode(0o000006), OpcodeEncoding::Rtt);
        assert_eq!(classify_opcode(0o170011), OpcodeEncoding::Setd);
        assert_eq!(classify_opcode(0o170002), OpcodeEncoding::Seti);
    }

    #[test]
    fn holes_in_the_opcode_space_are_unknown() {
        for word in [0o000007, 0o000210, 0o000227, 0o007000, 0o075000, 0o106400, 0o170000, 0o170012] {
            assert_eq!(classify_opcode(word), OpcodeEncoding::Unknown, "{word:06o}");
        }
    }

    #[test]
    fn byte_forms_sit_one_octal_digit_above_word_forms() {
        for (word, byte) in [
            (OpcodeEncoding::Clr, OpcodeEncoding::Clrb),
            (OpcodeEncoding::Tst, OpcodeEncoding::Tstb),
            (OpcodeEncoding::Mov, OpcodeEncoding::Movb),
            (OpcodeEncoding::Bis, OpcodeEncoding::Bisb),
        ] {
            assert_eq!(
                byte.base_opcode().unwrap() - word.base_opcode().unwrap(),
                0o100000
            );
            assert_eq!(byte.mnemonic(), format!("{}b", word.mnemonic()));
        }
    }
}
