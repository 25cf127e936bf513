//! Splits a resource into contiguous byte ranges.

/// Remaining work of one byte range.
///
/// `end` is inclusive (RFC 7233: `bytes=500-999` is 500 bytes). `None` marks an
/// open-ended range whose length is unknown. `begin` advances as bytes are
/// written, so a block always describes what is left to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub begin: u64,
    pub end: Option<u64>,
}

impl Block {
    pub fn new(begin: u64, end: u64) -> Self {
        Self {
            begin,
            end: Some(end),
        }
    }

    pub fn open_ended() -> Self {
        Self {
            begin: 0,
            end: None,
        }
    }

    /// Bytes still to fetch, or `None` when the range is open-ended.
    pub fn remaining(&self) -> Option<u64> {
        self.end.map(|end| (end + 1).saturating_sub(self.begin))
    }

    pub fn is_complete(&self) -> bool {
        self.remaining() == Some(0)
    }

    /// Value for the `Range` request header, if one should be sent.
    ///
    /// An open-ended block only carries a header once part of it has been
    /// written, so a retry does not refetch bytes already on disk.
    pub fn range_header(&self) -> Option<String> {
        match self.end {
            Some(end) => Some(format!("bytes={}-{}", self.begin, end)),
            None if self.begin > 0 => Some(format!("bytes={}-", self.begin)),
            None => None,
        }
    }
}

/// Partitions `[0, total_size - 1]` into at most `concurrency` blocks.
///
/// The last block absorbs the remainder of the integer division. When the
/// resource is smaller than `concurrency` the block count shrinks to
/// `total_size` so that every block holds at least one byte. An unknown size
/// (`None` or zero) yields a single open-ended block.
pub fn plan_blocks(total_size: Option<u64>, concurrency: usize) -> Vec<Block> {
    let total_size = match total_size {
        Some(size) if size > 0 => size,
        _ => return vec![Block::open_ended()],
    };

    let count = (concurrency.max(1) as u64).min(total_size);
    let block_size = total_size / count;

    let mut blocks = Vec::with_capacity(count as usize);
    for i in 0..count {
        let begin = i * block_size;
        let end = if i == count - 1 {
            total_size - 1
        } else {
            (i + 1) * block_size - 1
        };
        blocks.push(Block::new(begin, end));
    }
    blocks
}
