use crate::record::Strand;
use std::borrow::Cow;

const LEN_BITS: u32 = 28;
const LEN_MASK: u32 = (1 << LEN_BITS) - 1;

/// A single CIGAR operation packed into a u32: op tag in the top four bits,
/// length in the low 28.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CigarOp {
    val: u32,
}

fn op_code(op: char) -> Option<u32> {
    match op {
        '=' => Some(0),
        'X' => Some(1),
        'I' => Some(2),
        'D' => Some(3),
        'M' => Some(4),
        'N' => Some(5),
        'S' => Some(6),
        'H' => Some(7),
        'P' => Some(8),
        _ => None,
    }
}

impl CigarOp {
    pub fn new(len: u32, op: char) -> Self {
        let code = op_code(op).unwrap_or_else(|| panic!("Invalid CIGAR operation: {op}"));
        assert!(len <= LEN_MASK, "CIGAR operation length too large: {len}");
        Self {
            val: (code << LEN_BITS) | len,
        }
    }

    pub fn op(&self) -> char {
        match self.val >> LEN_BITS {
            0 => '=',
            1 => 'X',
            2 => 'I',
            3 => 'D',
            4 => 'M',
            5 => 'N',
            6 => 'S',
            7 => 'H',
            8 => 'P',
            code => panic!("Invalid CIGAR operation code: {code}"),
        }
    }

    pub fn len(&self) -> u32 {
        self.val & LEN_MASK
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bases consumed on the target/reference sequence.
    pub fn target_delta(&self) -> u64 {
        match self.op() {
            'M' | '=' | 'X' | 'D' | 'N' => self.len() as u64,
            _ => 0,
        }
    }

    /// Bases consumed on the query sequence, signed by strand.
    pub fn query_delta(&self, strand: Strand) -> i64 {
        match self.op() {
            'M' | '=' | 'X' | 'I' | 'S' => self.len() as i64 * strand.flipper(),
            _ => 0,
        }
    }

    pub fn is_match_like(&self) -> bool {
        matches!(self.op(), 'M' | '=' | 'X')
    }

    pub fn is_clip(&self) -> bool {
        matches!(self.op(), 'S' | 'H')
    }

    /// Same length with `I` and `D` exchanged; other ops unchanged.
    fn indel_swapped(&self) -> Self {
        match self.op() {
            'I' => Self::new(self.len(), 'D'),
            'D' => Self::new(self.len(), 'I'),
            _ => *self,
        }
    }
}

impl std::fmt::Display for CigarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.len(), self.op())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CigarParseError {
    UnsupportedOperation(char),
    InvalidFormat,
}

impl std::fmt::Display for CigarParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CigarParseError::UnsupportedOperation(op) => {
                write!(f, "Unsupported CIGAR operation: {op}")
            }
            CigarParseError::InvalidFormat => write!(f, "Invalid CIGAR format"),
        }
    }
}

impl std::error::Error for CigarParseError {}

/// Lenient parse: malformed tokens are dropped, never a panic. Strict
/// validation is the caller's concern (`parse_cigar_strict`).
pub fn parse_cigar(cigar: &str) -> Vec<CigarOp> {
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            len = len.saturating_mul(10).saturating_add(d).min(LEN_MASK);
        } else {
            if op_code(c).is_some() && len > 0 {
                ops.push(CigarOp::new(len, c));
            }
            len = 0;
        }
    }
    ops
}

/// Strict parse: every token must be `<positive int><op>` with `op` in the
/// SAM set `{M,I,D,N,S,H,P,X,=}`.
pub fn parse_cigar_strict(cigar: &str) -> Result<Vec<CigarOp>, CigarParseError> {
    let mut ops = Vec::new();
    let mut len: u32 = 0;
    let mut have_digits = false;
    for c in cigar.chars() {
        if let Some(d) = c.to_digit(10) {
            len = len
                .checked_mul(10)
                .and_then(|l| l.checked_add(d))
                .filter(|&l| l <= LEN_MASK)
                .ok_or(CigarParseError::InvalidFormat)?;
            have_digits = true;
        } else {
            let code = op_code(c).ok_or(CigarParseError::UnsupportedOperation(c))?;
            if !have_digits {
                return Err(CigarParseError::InvalidFormat);
            }
            ops.push(CigarOp {
                val: (code << LEN_BITS) | len,
            });
            len = 0;
            have_digits = false;
        }
    }
    if have_digits {
        return Err(CigarParseError::InvalidFormat);
    }
    Ok(ops)
}

/// Reverse the operation order and swap `I`<->`D`, mapping a reverse-strand
/// alignment into the forward coordinates of its mate.
pub fn flip_cigar(ops: &[CigarOp]) -> Vec<CigarOp> {
    ops.iter().rev().map(|op| op.indel_swapped()).collect()
}

/// Swap `I`<->`D` in place without reordering, for perspectives where the
/// indel sense is inverted but the walk direction is not.
pub fn swap_indel_cigar(ops: &[CigarOp]) -> Vec<CigarOp> {
    ops.iter().map(|op| op.indel_swapped()).collect()
}

/// Textual `I`/`D` swap of a CIGAR string without reordering.
pub fn swap_indel_cigar_str(cigar: &str) -> String {
    cigar
        .chars()
        .map(|c| match c {
            'I' => 'D',
            'D' => 'I',
            _ => c,
        })
        .collect()
}

/// Orient an operation sequence for walking: flipped sequences get the full
/// reverse-and-swap treatment.
pub fn oriented_cigar(flip: bool, ops: &[CigarOp]) -> Cow<'_, [CigarOp]> {
    if flip {
        Cow::Owned(flip_cigar(ops))
    } else {
        Cow::Borrowed(ops)
    }
}

pub fn cigar_to_string(ops: &[CigarOp]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(ops.len() * 4);
    for op in ops {
        let _ = write!(out, "{op}");
    }
    out
}

/// Length of the leading soft/hard clip in read orientation: the first op
/// for a forward read, the last for a reverse read.
pub fn clip_len(ops: &[CigarOp], strand: Strand) -> u64 {
    let op = match strand {
        Strand::Forward => ops.first(),
        Strand::Reverse => ops.last(),
    };
    op.filter(|op| op.is_clip()).map_or(0, |op| op.len() as u64)
}

/// Bases the alignment spans on the reference.
pub fn length_on_ref(ops: &[CigarOp]) -> u64 {
    ops.iter().map(|op| op.target_delta()).sum()
}

/// Aligned read length, clips excluded.
pub fn length_sans_clipping(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| !op.is_clip())
        .map(|op| op.query_delta(Strand::Forward).unsigned_abs())
        .sum()
}

/// Full read length including soft clips.
pub fn total_query_length(ops: &[CigarOp]) -> u64 {
    ops.iter()
        .filter(|op| op.op() != 'H')
        .map(|op| op.query_delta(Strand::Forward).unsigned_abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_roundtrip() {
        for op in ['M', 'I', 'D', 'N', 'S', 'H', 'P', 'X', '='] {
            let packed = CigarOp::new(1234, op);
            assert_eq!(packed.op(), op);
            assert_eq!(packed.len(), 1234);
        }
    }

    #[test]
    fn test_parse_cigar() {
        let ops = parse_cigar("10M5D3I2S");
        assert_eq!(ops.len(), 4);
        assert_eq!(cigar_to_string(&ops), "10M5D3I2S");
    }

    #[test]
    fn test_parse_cigar_malformed_is_lenient() {
        // bad op chars and dangling counts are dropped, not fatal
        assert_eq!(parse_cigar(""), vec![]);
        assert_eq!(parse_cigar("MMM"), vec![]);
        assert_eq!(cigar_to_string(&parse_cigar("10M5Q3I")), "10M3I");
        assert_eq!(cigar_to_string(&parse_cigar("10M42")), "10M");
    }

    #[test]
    fn test_parse_cigar_strict_rejects() {
        assert_eq!(
            parse_cigar_strict("10M5Q"),
            Err(CigarParseError::UnsupportedOperation('Q'))
        );
        assert_eq!(
            parse_cigar_strict("10M42"),
            Err(CigarParseError::InvalidFormat)
        );
        assert_eq!(parse_cigar_strict("MM"), Err(CigarParseError::InvalidFormat));
        assert!(parse_cigar_strict("578=1X922=4D6=1I17=").is_ok());
    }

    #[test]
    fn test_flip_cigar() {
        let ops = parse_cigar("10M5D3I");
        let flipped = flip_cigar(&ops);
        assert_eq!(cigar_to_string(&flipped), "3D5I10M");
    }

    #[test]
    fn test_swap_indel_cigar_str() {
        assert_eq!(swap_indel_cigar_str("10M5D3I"), "10M5I3D");
        // no reordering, unlike flipping
        assert_eq!(swap_indel_cigar_str("1I2D3I"), "1D2I3D");
    }

    #[test]
    fn test_clip_helpers() {
        let ops = parse_cigar("5S10M2I3D8M4H");
        assert_eq!(clip_len(&ops, Strand::Forward), 5);
        assert_eq!(clip_len(&ops, Strand::Reverse), 4);
        assert_eq!(length_on_ref(&ops), 21);
        assert_eq!(length_sans_clipping(&ops), 20);
        assert_eq!(total_query_length(&ops), 25);
    }

    #[test]
    fn test_deltas() {
        assert_eq!(CigarOp::new(7, 'D').target_delta(), 7);
        assert_eq!(CigarOp::new(7, 'D').query_delta(Strand::Forward), 0);
        assert_eq!(CigarOp::new(7, 'I').target_delta(), 0);
        assert_eq!(CigarOp::new(7, 'I').query_delta(Strand::Reverse), -7);
        assert_eq!(CigarOp::new(7, 'N').target_delta(), 7);
        assert_eq!(CigarOp::new(7, 'P').target_delta(), 0);
        assert_eq!(CigarOp::new(7, 'P').query_delta(Strand::Forward), 0);
    }

    fn arb_ops() -> impl Strategy<Value = Vec<CigarOp>> {
        proptest::collection::vec(
            (1u32..10_000, prop::sample::select(vec!['M', 'I', 'D', 'N', 'S', 'X', '='])),
            0..64,
        )
        .prop_map(|pairs| pairs.into_iter().map(|(len, op)| CigarOp::new(len, op)).collect())
    }

    proptest! {
        #[test]
        fn prop_flip_is_an_involution(ops in arb_ops()) {
            prop_assert_eq!(flip_cigar(&flip_cigar(&ops)), ops);
        }

        #[test]
        fn prop_parse_display_roundtrip(ops in arb_ops()) {
            prop_assert_eq!(parse_cigar(&cigar_to_string(&ops)), ops);
        }
    }
}
