//! Byte layout of compressed trees
//!
//! A compressed tree is a pair of blobs. The primary blob holds one record per
//! internal node in pre-order; leaves are stored inline in their parent's
//! record as `f32` values. The auxiliary blob holds per-node statistics keyed
//! by node id. All integers and floats are little-endian.
//!
//! ```text
//! u8   node_type   bits 0-1 left-size width code, bits 2-3 split kind,
//!                  bit 4 left leaf, bit 5 right leaf, bits 6-7 reserved
//! u16  column      0xFFFF: the whole tree is one leaf, an f32 follows
//! u8   na_dir      0 none, 1 left, 2 right
//! ...  payload     threshold, bitset or nothing depending on the split kind
//! ...  left size   only when the left child is a record
//! ...  left child, right child
//! ```

use crate::errors::MalformedTreeError;

/// Column marker for a tree consisting of a single leaf
pub const SINGLE_LEAF_COLUMN: u16 = 0xFFFF;

/// Size of one auxiliary record: node id plus six `f32` statistics
pub const AUX_RECORD_LEN: usize = 4 + 6 * 4;

const WIDTH_MASK: u8 = 0b0000_0011;
const KIND_SHIFT: u8 = 2;
const KIND_MASK: u8 = 0b0000_1100;
const LEFT_LEAF: u8 = 0b0001_0000;
const RIGHT_LEAF: u8 = 0b0010_0000;
const RESERVED: u8 = 0b1100_0000;

/// How a split is stored in a node record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    /// `f32` threshold
    Numeric,
    /// 32-bit bitset starting at category 0
    SmallBitset,
    /// offset + length prefixed bitset
    LargeBitset,
    /// missing values versus everything else, no payload
    NaVsRest,
}

impl SplitKind {
    fn code(self) -> u8 {
        match self {
            SplitKind::Numeric => 0,
            SplitKind::SmallBitset => 1,
            SplitKind::LargeBitset => 2,
            SplitKind::NaVsRest => 3,
        }
    }

    fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => SplitKind::Numeric,
            1 => SplitKind::SmallBitset,
            2 => SplitKind::LargeBitset,
            _ => SplitKind::NaVsRest,
        }
    }
}

/// Decoded `node_type` byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeType {
    /// Number of bytes of the left-subtree size field (1..=4)
    pub size_width: usize,
    pub kind: SplitKind,
    pub left_leaf: bool,
    pub right_leaf: bool,
}

impl NodeType {
    /// Parse a node-type byte read at `offset`
    pub fn parse(byte: u8, offset: usize) -> Result<Self, MalformedTreeError> {
        if byte & RESERVED != 0 {
            return Err(MalformedTreeError::InvalidNodeType {
                node_type: byte,
                offset,
            });
        }
        Ok(Self {
            size_width: (byte & WIDTH_MASK) as usize + 1,
            kind: SplitKind::from_code((byte & KIND_MASK) >> KIND_SHIFT),
            left_leaf: byte & LEFT_LEAF != 0,
            right_leaf: byte & RIGHT_LEAF != 0,
        })
    }

    pub fn to_byte(self) -> u8 {
        debug_assert!((1..=4).contains(&self.size_width));
        let mut byte = (self.size_width.saturating_sub(1) as u8) & WIDTH_MASK;
        byte |= self.kind.code() << KIND_SHIFT;
        if self.left_leaf {
            byte |= LEFT_LEAF;
        }
        if self.right_leaf {
            byte |= RIGHT_LEAF;
        }
        byte
    }
}

/// Direction of missing values stored in a node record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaDir {
    /// No explicit direction (already fixed by an ancestor)
    None,
    Left,
    Right,
}

impl NaDir {
    pub fn parse(byte: u8, offset: usize) -> Result<Self, MalformedTreeError> {
        match byte {
            0 => Ok(NaDir::None),
            1 => Ok(NaDir::Left),
            2 => Ok(NaDir::Right),
            value => Err(MalformedTreeError::InvalidNaDirection { value, offset }),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            NaDir::None => 0,
            NaDir::Left => 1,
            NaDir::Right => 2,
        }
    }

    pub fn from_flags(na_left: bool, na_right: bool) -> Self {
        match (na_left, na_right) {
            (true, false) => NaDir::Left,
            (false, true) => NaDir::Right,
            _ => NaDir::None,
        }
    }
}

/// Smallest width code able to hold `size`
pub fn size_width_for(size: usize) -> usize {
    match size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        _ => 4,
    }
}
