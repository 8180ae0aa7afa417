use std::fmt;

/**
 * A run length encoded sequence: a compressed base string plus a parallel
 * array of repeat counts. With run length encoding off the repeat counts
 * are all 1 and the compressed and expanded forms coincide.
 *
 * Equality and hashing are structural over both the compressed bases and
 * the repeat counts, so two strings with identical compressed bases but
 * different homopolymer lengths are distinct map keys.
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RleString {
    rle_bases: Vec<u8>,
    repeat_counts: Vec<u8>,
    non_rle_length: usize,
}

impl RleString {
    /**
     * Compress the given expanded sequence, runs longer than 255 are capped
     * into repeated entries.
     */
    pub fn construct(expanded: &[u8]) -> RleString {
        let mut rle_bases = Vec::new();
        let mut repeat_counts: Vec<u8> = Vec::new();
        for &c in expanded {
            match rle_bases.last() {
                Some(&last) if last == c && *repeat_counts.last().unwrap() < u8::MAX => {
                    *repeat_counts.last_mut().unwrap() += 1;
                }
                _ => {
                    rle_bases.push(c);
                    repeat_counts.push(1);
                }
            }
        }
        RleString {
            rle_bases,
            repeat_counts,
            non_rle_length: expanded.len(),
        }
    }

    /// Identity encoding, every position is its own run of length 1.
    pub fn construct_no_rle(expanded: &[u8]) -> RleString {
        RleString {
            rle_bases: expanded.to_vec(),
            repeat_counts: vec![1; expanded.len()],
            non_rle_length: expanded.len(),
        }
    }

    pub fn from_parts(rle_bases: Vec<u8>, repeat_counts: Vec<u8>) -> RleString {
        assert_eq!(rle_bases.len(), repeat_counts.len());
        let non_rle_length = repeat_counts.iter().map(|c| *c as usize).sum();
        RleString {
            rle_bases,
            repeat_counts,
            non_rle_length,
        }
    }

    /// Length in RLE units.
    pub fn len(&self) -> usize {
        self.rle_bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rle_bases.is_empty()
    }

    pub fn non_rle_length(&self) -> usize {
        self.non_rle_length
    }

    pub fn bases(&self) -> &[u8] {
        &self.rle_bases
    }

    pub fn repeat_counts(&self) -> &[u8] {
        &self.repeat_counts
    }

    pub fn expand(&self) -> Vec<u8> {
        let mut expanded = Vec::with_capacity(self.non_rle_length);
        for (b, rc) in self.rle_bases.iter().zip(self.repeat_counts.iter()) {
            for _ in 0..*rc {
                expanded.push(*b);
            }
        }
        expanded
    }

    /// Copy of the sub-sequence [start, start + length) in RLE coordinates.
    pub fn copy_substring(&self, start: usize, length: usize) -> RleString {
        assert!(start + length <= self.len());
        RleString {
            rle_bases: self.rle_bases[start..start + length].to_vec(),
            repeat_counts: self.repeat_counts[start..start + length].to_vec(),
            non_rle_length: self.repeat_counts[start..start + length]
                .iter()
                .map(|c| *c as usize)
                .sum(),
        }
    }

    /**
     * Map from each RLE position to the expanded coordinate of the first
     * base of its run.
     */
    pub fn rle_to_non_rle_coord_map(&self) -> Vec<usize> {
        let mut map = Vec::with_capacity(self.len());
        let mut j = 0;
        for rc in &self.repeat_counts {
            map.push(j);
            j += *rc as usize;
        }
        map
    }
}

impl fmt::Display for RleString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (b, rc) in self.rle_bases.iter().zip(self.repeat_counts.iter()) {
            write!(f, "{}{}", *b as char, rc)?;
        }
        Ok(())
    }
}
