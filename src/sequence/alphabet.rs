use crate::sequence::rle_string::RleString;

pub const ALPHABET_SIZE: usize = 4;

static ALPHABET_CHARS: [u8; ALPHABET_SIZE] = [b'A', b'C', b'G', b'T'];

lazy_static! {
    static ref CHAR_TO_SYMBOL: [u8; 256] = {
        let mut table = [0u8; 256];
        for (i, c) in ALPHABET_CHARS.iter().enumerate() {
            table[*c as usize] = i as u8;
            table[c.to_ascii_lowercase() as usize] = i as u8;
        }
        table
    };
}

/**
 * The nucleotide alphabet used for POA base weights and pair-HMM symbols.
 * Bases outside ACGT collapse onto symbol 0.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Alphabet {}

impl Alphabet {
    pub fn size(&self) -> usize {
        ALPHABET_SIZE
    }

    pub fn symbol_to_char(&self, symbol: usize) -> u8 {
        ALPHABET_CHARS[symbol]
    }

    pub fn char_to_symbol(&self, c: u8) -> u8 {
        CHAR_TO_SYMBOL[c as usize]
    }
}

/**
 * One aligned unit of a run length encoded sequence: the base symbol plus
 * its repeat count. The repeat count is 1 everywhere when run length
 * encoding is off.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub base: u8,
    pub repeat_count: u8,
}

pub type SymbolString = Vec<Symbol>;

/**
 * Convert an RleString to the symbol string consumed by the pair-HMM.
 * Repeat counts are carried through only when repeat aware alignment is
 * requested, capped at max_repeat_count - 1 as the top bin.
 */
pub fn symbol_string_from_rle(
    rle: &RleString,
    alphabet: &Alphabet,
    use_repeat_counts: bool,
    max_repeat_count: usize,
) -> SymbolString {
    let max_count = (max_repeat_count.max(2) - 1) as u8;
    rle.bases()
        .iter()
        .zip(rle.repeat_counts().iter())
        .map(|(b, rc)| Symbol {
            base: alphabet.char_to_symbol(*b),
            repeat_count: if use_repeat_counts {
                (*rc).min(max_count)
            } else {
                1
            },
        })
        .collect()
}
