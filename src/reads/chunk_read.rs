use crate::sequence::rle_string::RleString;

/**
 * A read trimmed to the current chunk window: its name, the run length
 * encoded sequence, optional per RLE-base phred qualities, and its mapped
 * orientation. Bubbles refer to reads by index into the chunk level read
 * table rather than holding references.
 */
#[derive(Debug, Clone)]
pub struct ChunkRead {
    pub read_name: String,
    pub rle_read: RleString,
    pub qualities: Option<Vec<u8>>,
    pub forward_strand: bool,
}

impl ChunkRead {
    pub fn new(
        read_name: String,
        rle_read: RleString,
        qualities: Option<Vec<u8>>,
        forward_strand: bool,
    ) -> ChunkRead {
        if let Some(quals) = &qualities {
            assert_eq!(quals.len(), rle_read.len());
        }
        ChunkRead {
            read_name,
            rle_read,
            qualities,
            forward_strand,
        }
    }

    /**
     * Mean phred quality over [start, start + length) of the RLE sequence,
     * or -1.0 when the read carries no qualities.
     */
    pub fn mean_quality(&self, start: usize, length: usize) -> f64 {
        match &self.qualities {
            Some(quals) if length > 0 => {
                let total: i64 = quals[start..start + length].iter().map(|q| *q as i64).sum();
                total as f64 / length as f64
            }
            Some(_) => -1.0,
            None => -1.0,
        }
    }
}
