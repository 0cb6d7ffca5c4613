//! Extensible bitmaps.
//!
//! A `SparseBitSet` stores a set of unsigned ordinals (type, role, or
//! category values) as an ordered list of 64-bit pages. Only pages with at
//! least one bit set are kept, so sparse sets of large ordinals stay small.
//!
//! Invariants:
//!
//! - every node's `startbit` is a multiple of `MAPSIZE`;
//! - nodes are strictly increasing by `startbit`;
//! - no node holds an all-zero word;
//! - `highbit` is the last node's `startbit + MAPSIZE`, or 0 when empty.
//!
//! `highbit` is kept as a `u64` so the page holding `u32::MAX` has an end.
//! The wire format stores it as a `u32`, so that last page cannot be
//! serialized.

use polscope_core::error::{ConsistencyError, ConstructionError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

/// Number of bits held by one node.
pub const MAPSIZE: u32 = 64;

/// One page of a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitmapNode {
    /// First bit covered by this node.
    pub startbit: u32,

    /// The bits; bit `i` represents ordinal `startbit + i`.
    pub map: u64,
}

impl BitmapNode {
    fn covers(&self, bit: u32) -> bool {
        self.startbit <= bit && bit - self.startbit < MAPSIZE
    }

    /// Exclusive end of the page.
    fn end(&self) -> u64 {
        u64::from(self.startbit) + u64::from(MAPSIZE)
    }
}

/// A sparse set of unsigned ordinals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparseBitSet {
    nodes: Vec<BitmapNode>,
    highbit: u64,
}

impl SparseBitSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get the exclusive upper bound of the last node, or 0 when empty.
    pub fn highbit(&self) -> u64 {
        self.highbit
    }

    /// Get the nodes in ascending order.
    pub fn nodes(&self) -> &[BitmapNode] {
        &self.nodes
    }

    /// Count the set bits.
    pub fn len(&self) -> usize {
        self.nodes.iter().map(|n| n.map.count_ones() as usize).sum()
    }

    /// Iterate over the set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.iter().flat_map(|node| {
            (0..MAPSIZE)
                .filter(move |i| node.map & (1u64 << i) != 0)
                .map(move |i| node.startbit + i)
        })
    }

    /// Test a bit.
    ///
    /// # Arguments
    ///
    /// * `bit` - The ordinal to test.
    ///
    /// # Returns
    ///
    /// `true` if the bit is set.
    pub fn get(&self, bit: u32) -> bool {
        if u64::from(bit) >= self.highbit {
            return false;
        }
        for node in &self.nodes {
            if node.startbit > bit {
                break;
            }
            if node.covers(bit) {
                return node.map & (1u64 << (bit - node.startbit)) != 0;
            }
        }
        false
    }

    /// Set or clear a bit.
    ///
    /// Clearing the last bit of a node removes the node; if that node was
    /// the last one, `highbit` drops to the end of the previous node.
    ///
    /// # Arguments
    ///
    /// * `bit` - The ordinal to change.
    /// * `value` - `true` to set, `false` to clear.
    pub fn set(&mut self, bit: u32, value: bool) {
        let pos = self.nodes.partition_point(|n| n.end() <= u64::from(bit));

        if let Some(node) = self.nodes.get_mut(pos).filter(|n| n.covers(bit)) {
            let mask = 1u64 << (bit - node.startbit);
            if value {
                node.map |= mask;
                return;
            }
            node.map &= !mask;
            if node.map == 0 {
                self.nodes.remove(pos);
                if pos == self.nodes.len() {
                    self.highbit = self.nodes.last().map(BitmapNode::end).unwrap_or(0);
                }
            }
            return;
        }

        if !value {
            return;
        }

        let startbit = bit & !(MAPSIZE - 1);
        let node = BitmapNode {
            startbit,
            map: 1u64 << (bit - startbit),
        };
        self.nodes.insert(pos, node);
        if pos + 1 == self.nodes.len() {
            self.highbit = node.end();
        }
    }

    /// Compute the union of two sets.
    ///
    /// # Arguments
    ///
    /// * `other` - The set to combine with.
    ///
    /// # Returns
    ///
    /// A new set holding every bit set in either operand.
    pub fn union(&self, other: &SparseBitSet) -> SparseBitSet {
        let mut nodes = Vec::with_capacity(self.nodes.len() + other.nodes.len());
        let (mut a, mut b) = (self.nodes.iter().peekable(), other.nodes.iter().peekable());

        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(x), Some(y)) if x.startbit == y.startbit => {
                    let merged = BitmapNode {
                        startbit: x.startbit,
                        map: x.map | y.map,
                    };
                    a.next();
                    b.next();
                    merged
                }
                (Some(x), Some(y)) if x.startbit < y.startbit => {
                    let node = **x;
                    a.next();
                    node
                }
                (Some(_), Some(y)) => {
                    let node = **y;
                    b.next();
                    node
                }
                (Some(x), None) => {
                    let node = **x;
                    a.next();
                    node
                }
                (None, Some(y)) => {
                    let node = **y;
                    b.next();
                    node
                }
                (None, None) => break,
            };
            nodes.push(next);
        }

        SparseBitSet {
            nodes,
            highbit: self.highbit.max(other.highbit),
        }
    }

    /// Compute the bits set in both sets.
    pub fn intersection(&self, other: &SparseBitSet) -> SparseBitSet {
        self.combine(other, |a, b| a & b)
    }

    /// Compute the bits set in `self` but not in `other`.
    pub fn difference(&self, other: &SparseBitSet) -> SparseBitSet {
        self.combine(other, |a, b| a & !b)
    }

    // Keeps self's page layout; absent pages in `other` read as zero.
    fn combine(&self, other: &SparseBitSet, op: impl Fn(u64, u64) -> u64) -> SparseBitSet {
        let mut nodes = Vec::new();
        let mut others = other.nodes.iter().peekable();

        for node in &self.nodes {
            while others.peek().is_some_and(|o| o.startbit < node.startbit) {
                others.next();
            }
            let counterpart = match others.peek() {
                Some(o) if o.startbit == node.startbit => o.map,
                _ => 0,
            };
            let map = op(node.map, counterpart);
            if map != 0 {
                nodes.push(BitmapNode {
                    startbit: node.startbit,
                    map,
                });
            }
        }

        let highbit = nodes.last().map(BitmapNode::end).unwrap_or(0);
        SparseBitSet { nodes, highbit }
    }

    /// Check whether two sets hold exactly the same bits.
    pub fn equals(&self, other: &SparseBitSet) -> bool {
        if self.highbit != other.highbit || self.nodes.len() != other.nodes.len() {
            return false;
        }
        self.nodes
            .iter()
            .zip(&other.nodes)
            .all(|(a, b)| a.startbit == b.startbit && a.map == b.map)
    }

    /// Check whether `self` is a superset of `other`.
    ///
    /// # Returns
    ///
    /// `true` if every bit set in `other` is also set in `self`.
    pub fn contains(&self, other: &SparseBitSet) -> bool {
        if self.highbit < other.highbit {
            return false;
        }

        let mut mine = self.nodes.iter().peekable();
        for theirs in &other.nodes {
            while mine.peek().is_some_and(|n| n.startbit < theirs.startbit) {
                mine.next();
            }
            match mine.peek() {
                Some(n) if n.startbit == theirs.startbit && n.map & theirs.map == theirs.map => {
                    mine.next();
                }
                _ => return false,
            }
        }
        true
    }

    /// Encode the set in its little-endian wire format.
    ///
    /// The layout is `u32 word_width, u32 highbit, u32 count` followed by
    /// `count` pairs of `u32 startbit, u64 map`.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<u8>)` - The encoded set.
    /// * `Err` - `ConstructionError::Unencodable` if the set has a bit in
    ///   the page starting at `u32::MAX - 63`, whose end does not fit in
    ///   the `u32` high bit field.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let highbit = u32::try_from(self.highbit)
            .map_err(|_| ConstructionError::Unencodable(self.highbit))?;

        let mut out = Vec::with_capacity(12 + self.nodes.len() * 12);
        out.extend_from_slice(&MAPSIZE.to_le_bytes());
        out.extend_from_slice(&highbit.to_le_bytes());
        out.extend_from_slice(&(self.nodes.len() as u32).to_le_bytes());
        for node in &self.nodes {
            out.extend_from_slice(&node.startbit.to_le_bytes());
            out.extend_from_slice(&node.map.to_le_bytes());
        }
        Ok(out)
    }

    /// Decode a set from its wire format.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The encoded set. Trailing bytes are ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(SparseBitSet)` - The decoded set.
    /// * `Err` - `ConstructionError::Truncated` if the input ends early, or a
    ///   `ConsistencyError` if the encoded nodes violate an invariant. No
    ///   partial set is ever returned.
    pub fn deserialize(bytes: &[u8]) -> Result<SparseBitSet> {
        let mut reader = Reader::new(bytes);

        let word_width = reader.u32()?;
        let highbit = reader.u32()?;
        let count = reader.u32()?;

        if word_width != MAPSIZE {
            return Err(ConsistencyError::WordWidth(word_width).into());
        }
        if highbit == 0 {
            return Ok(SparseBitSet::new());
        }
        if highbit % MAPSIZE != 0 {
            return Err(ConsistencyError::HighBit(highbit).into());
        }

        let mut nodes: Vec<BitmapNode> = Vec::new();
        for index in 0..count {
            let startbit = reader.u32()?;
            let node_error = |reason: String| ConsistencyError::BitmapNode { index, reason };

            if startbit % MAPSIZE != 0 {
                return Err(node_error(format!("start bit {} is not aligned", startbit)).into());
            }
            if startbit > highbit - MAPSIZE {
                return Err(node_error(format!(
                    "start bit {} is beyond the end of the bitmap ({})",
                    startbit,
                    highbit - MAPSIZE
                ))
                .into());
            }
            let map = reader.u64()?;
            if map == 0 {
                return Err(node_error(format!("empty map at start bit {}", startbit)).into());
            }
            if let Some(prev) = nodes.last() {
                if startbit <= prev.startbit {
                    return Err(node_error(format!(
                        "start bit {} does not follow {}",
                        startbit, prev.startbit
                    ))
                    .into());
                }
            }
            nodes.push(BitmapNode { startbit, map });
        }

        let normalized = nodes.last().map(BitmapNode::end).unwrap_or(0);
        if normalized != u64::from(highbit) {
            trace!(
                "Normalizing bitmap high bit from {} to {}",
                highbit,
                normalized
            );
        }

        Ok(SparseBitSet {
            nodes,
            highbit: normalized,
        })
    }
}

impl FromIterator<u32> for SparseBitSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        let mut set = SparseBitSet::new();
        for bit in iter {
            set.set(bit, true);
        }
        set
    }
}

impl fmt::Display for SparseBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: Vec<String> = self.iter().map(|b| b.to_string()).collect();
        write!(f, "{{{}}}", bits.join(","))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let chunk = self
            .bytes
            .get(self.offset..self.offset + N)
            .and_then(|s| <[u8; N]>::try_from(s).ok())
            .ok_or(ConstructionError::Truncated {
                offset: self.offset,
                needed: N,
            })?;
        self.offset += N;
        Ok(chunk)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take::<8>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polscope_core::Error;

    fn set_of(bits: &[u32]) -> SparseBitSet {
        bits.iter().copied().collect()
    }

    #[test]
    fn test_set_and_get() {
        let mut e = SparseBitSet::new();
        for bit in [0, 1, 63, 64, 200, 4095] {
            assert!(!e.get(bit));
            e.set(bit, true);
            assert!(e.get(bit));
        }
        assert_eq!(e.len(), 6);
        assert_eq!(e.highbit(), 4096);

        for bit in [0, 1, 63, 64, 200, 4095] {
            e.set(bit, false);
            assert!(!e.get(bit));
        }
        assert!(e.is_empty());
        assert_eq!(e.highbit(), 0);
    }

    #[test]
    fn test_clear_last_node_recomputes_highbit() {
        let mut e = set_of(&[3, 130]);
        assert_eq!(e.highbit(), 192);
        e.set(130, false);
        assert_eq!(e.highbit(), 64);
        assert_eq!(e.nodes().len(), 1);

        // Clearing an unset bit leaves the set alone.
        e.set(500, false);
        assert_eq!(e.highbit(), 64);
    }

    #[test]
    fn test_insert_before_existing_nodes() {
        let mut e = set_of(&[300]);
        e.set(5, true);
        assert_eq!(e.highbit(), 320);
        let starts: Vec<u32> = e.nodes().iter().map(|n| n.startbit).collect();
        assert_eq!(starts, vec![0, 256]);
    }

    #[test]
    fn test_get_beyond_highbit() {
        let e = set_of(&[10]);
        assert!(!e.get(64));
        assert!(!e.get(u32::MAX));
    }

    #[test]
    fn test_union() {
        let a = set_of(&[1, 70, 300]);
        let b = set_of(&[2, 70, 128]);
        let c = a.union(&b);
        assert_eq!(c.iter().collect::<Vec<_>>(), vec![1, 2, 70, 128, 300]);
        assert_eq!(c.highbit(), 320);
        assert!(c.equals(&b.union(&a)));

        let d = set_of(&[9000]);
        assert!(a.union(&b).union(&d).equals(&a.union(&b.union(&d))));
    }

    #[test]
    fn test_contains() {
        let a = set_of(&[1, 2, 70, 300]);
        assert!(a.contains(&a));
        assert!(a.contains(&set_of(&[2, 300])));
        assert!(a.contains(&SparseBitSet::new()));
        assert!(!a.contains(&set_of(&[3])));
        assert!(!a.contains(&set_of(&[1, 400])));
        assert!(!a.contains(&set_of(&[130])));
        assert!(!SparseBitSet::new().contains(&a));
    }

    #[test]
    fn test_equals() {
        assert!(set_of(&[1, 65]).equals(&set_of(&[65, 1])));
        assert!(!set_of(&[1, 65]).equals(&set_of(&[1])));
        assert!(!set_of(&[1]).equals(&set_of(&[2])));
        assert!(SparseBitSet::new().equals(&SparseBitSet::new()));
    }

    #[test]
    fn test_intersection_and_difference() {
        let a = set_of(&[1, 2, 70, 300]);
        let b = set_of(&[2, 70, 71, 500]);
        assert_eq!(a.intersection(&b).iter().collect::<Vec<_>>(), vec![2, 70]);
        assert_eq!(a.difference(&b).iter().collect::<Vec<_>>(), vec![1, 300]);
        assert_eq!(b.difference(&a).iter().collect::<Vec<_>>(), vec![71, 500]);
        assert_eq!(a.difference(&a).highbit(), 0);
    }

    #[test]
    fn test_serialize_layout() {
        // Two nodes at 0 and 64 from bits {0, 64, 65, 127}.
        let e = set_of(&[0, 64, 65, 127]);
        let bytes = e.serialize().unwrap();
        assert_eq!(bytes.len(), 12 + 2 * 12);
        assert_eq!(&bytes[0..4], &64u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &128u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());

        let back = SparseBitSet::deserialize(&bytes).unwrap();
        assert_eq!(back.nodes().len(), 2);
        assert_eq!(back.nodes()[0].startbit, 0);
        assert_eq!(back.nodes()[1].startbit, 64);
        assert_eq!(back.highbit(), 128);
        assert!(back.equals(&e));
    }

    fn encode(width: u32, highbit: u32, nodes: &[(u32, u64)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&highbit.to_le_bytes());
        out.extend_from_slice(&(nodes.len() as u32).to_le_bytes());
        for (start, map) in nodes {
            out.extend_from_slice(&start.to_le_bytes());
            out.extend_from_slice(&map.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_deserialize_empty() {
        let e = SparseBitSet::deserialize(&encode(64, 0, &[])).unwrap();
        assert!(e.is_empty());
        assert_eq!(e.highbit(), 0);
    }

    #[test]
    fn test_deserialize_rejects_bad_input() {
        let cases = vec![
            encode(32, 64, &[(0, 1)]),
            encode(64, 100, &[(0, 1)]),
            encode(64, 128, &[(3, 1)]),
            encode(64, 128, &[(128, 1)]),
            encode(64, 128, &[(0, 0)]),
            encode(64, 192, &[(64, 1), (0, 1)]),
            encode(64, 192, &[(64, 1), (64, 2)]),
        ];
        for bytes in cases {
            let err = SparseBitSet::deserialize(&bytes).unwrap_err();
            assert!(matches!(err, Error::Consistency(_)), "unexpected {:?}", err);
        }
    }

    #[test]
    fn test_deserialize_truncated() {
        let mut bytes = encode(64, 128, &[(0, 1), (64, 1)]);
        bytes.truncate(bytes.len() - 3);
        let err = SparseBitSet::deserialize(&bytes).unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::Truncated { .. })
        ));
        assert!(SparseBitSet::deserialize(&[64, 0]).is_err());
    }

    #[test]
    fn test_set_get_clear_at_top_of_range() {
        let last_page = u32::MAX - (MAPSIZE - 1);
        let mut e = SparseBitSet::new();

        e.set(u32::MAX, true);
        assert!(e.get(u32::MAX));
        assert!(!e.get(u32::MAX - 1));
        assert_eq!(e.highbit(), 1u64 << 32);
        assert_eq!(e.nodes()[0].startbit, last_page);

        e.set(last_page, true);
        assert!(e.get(last_page));
        assert_eq!(e.nodes().len(), 1);
        assert_eq!(e.iter().collect::<Vec<_>>(), vec![last_page, u32::MAX]);

        // A lower page is inserted in front without touching highbit.
        e.set(7, true);
        assert_eq!(e.nodes().len(), 2);
        assert_eq!(e.highbit(), 1u64 << 32);

        e.set(u32::MAX, false);
        e.set(last_page, false);
        assert_eq!(e.highbit(), 64);
        e.set(7, false);
        assert!(e.is_empty());
        assert_eq!(e.highbit(), 0);
    }

    #[test]
    fn test_set_operations_at_top_of_range() {
        let top = set_of(&[u32::MAX]);
        let low = set_of(&[1, u32::MAX - 64]);

        let all = top.union(&low);
        assert_eq!(all.highbit(), 1u64 << 32);
        assert!(all.contains(&top));
        assert!(all.contains(&low));
        assert!(!low.contains(&top));
        assert_eq!(all.difference(&low).iter().collect::<Vec<_>>(), vec![u32::MAX]);
        assert_eq!(all.intersection(&top).highbit(), 1u64 << 32);
        assert_eq!(all.difference(&top).highbit(), u64::from(u32::MAX - 63));
    }

    #[test]
    fn test_serialize_last_page_is_unencodable() {
        let err = set_of(&[u32::MAX]).serialize().unwrap_err();
        assert!(matches!(
            err,
            Error::Construction(ConstructionError::Unencodable(h)) if h == 1u64 << 32
        ));
        assert!(set_of(&[u32::MAX - 63]).serialize().is_err());
    }

    #[test]
    fn test_serialize_highest_encodable_page() {
        // The page starting at u32::MAX - 127 ends at u32::MAX - 63.
        let bit = u32::MAX - 64;
        let e = set_of(&[3, bit]);
        let bytes = e.serialize().unwrap();
        assert_eq!(&bytes[4..8], &(u32::MAX - 63).to_le_bytes());

        let back = SparseBitSet::deserialize(&bytes).unwrap();
        assert!(back.equals(&e));
        assert!(back.get(bit));
        assert_eq!(back.highbit(), u64::from(u32::MAX - 63));
    }

    #[test]
    fn test_display() {
        assert_eq!(set_of(&[3, 1, 64]).to_string(), "{1,3,64}");
    }
}
