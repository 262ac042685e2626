//! # Byte memory model
//!
//! The flat 64K address space of the analyzed program: one byte of content
//! and one attribute bitmask per address. Attributes record what the
//! analysis learned about each byte (loaded, code, instruction start, ...).

use bitflags::bitflags;

use crate::error::{Result, Z80Error};
use crate::{Address, MEMORY_SIZE};

bitflags! {
    /// Per-address analysis attributes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemAttribute: u8 {
        /// Byte is part of the loaded image
        const ASSIGNED = 0x01;
        /// Byte belongs to a decoded instruction
        const CODE = 0x02;
        /// Byte is the first byte of a decoded instruction
        const CODE_FIRST = 0x04;
        /// Byte is referenced as data
        const DATA = 0x08;
        /// Pass 1 visited this byte
        const FLOW_ANALYZED = 0x10;
        /// Instruction start of a return instruction seen by pass 2
        const RET_ANALYZED = 0x20;
    }
}

/// 64K byte image with a parallel attribute array.
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
    attributes: Vec<MemAttribute>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            bytes: vec![0; MEMORY_SIZE],
            attributes: vec![MemAttribute::empty(); MEMORY_SIZE],
        }
    }

    /// Merge a loaded region into the address space and mark it `ASSIGNED`.
    pub fn set_memory(&mut self, origin: Address, data: &[u8]) -> Result<()> {
        let start = origin as usize;
        let end = start + data.len();
        if end > MEMORY_SIZE {
            return Err(Z80Error::RegionOutOfRange {
                origin,
                len: data.len(),
            });
        }
        self.bytes[start..end].copy_from_slice(data);
        for attr in &mut self.attributes[start..end] {
            attr.insert(MemAttribute::ASSIGNED);
        }
        Ok(())
    }

    /// Byte at `address`. The address space wraps at 64K.
    #[inline]
    pub fn get_value_at(&self, address: Address) -> u8 {
        self.bytes[address as usize]
    }

    /// Little-endian word at `address`
    #[inline]
    pub fn get_word_at(&self, address: Address) -> u16 {
        let lo = self.get_value_at(address) as u16;
        let hi = self.get_value_at(address.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    /// Big-endian word at `address`
    #[inline]
    pub fn get_big_endian_word_at(&self, address: Address) -> u16 {
        let hi = self.get_value_at(address) as u16;
        let lo = self.get_value_at(address.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    /// `len` bytes starting at `address`, wrapping at 64K.
    pub fn get_data(&self, address: Address, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| self.get_value_at(address.wrapping_add(i as u16)))
            .collect()
    }

    /// Attributes at `address`; empty for addresses outside 64K.
    #[inline]
    pub fn get_attribute_at(&self, address: usize) -> MemAttribute {
        self.attributes
            .get(address)
            .copied()
            .unwrap_or(MemAttribute::empty())
    }

    /// OR `attr` into a single address.
    pub fn add_attribute_at(&mut self, address: usize, attr: MemAttribute) {
        self.add_attributes_at(address, 1, attr);
    }

    /// OR `attr` into `len` addresses. The part outside 64K is ignored.
    pub fn add_attributes_at(&mut self, address: usize, len: usize, attr: MemAttribute) {
        for a in self.clip(address, len) {
            a.insert(attr);
        }
    }

    /// Overwrite the attributes of `len` addresses.
    pub fn set_attributes_at(&mut self, address: usize, len: usize, attr: MemAttribute) {
        for a in self.clip(address, len) {
            *a = attr;
        }
    }

    /// Clear the given bits everywhere. Byte contents are kept.
    pub fn reset_attribute_flag(&mut self, mask: MemAttribute) {
        for a in &mut self.attributes {
            a.remove(mask);
        }
    }

    /// First address in `[start, start + len)` with any bit of `mask` set.
    pub fn search_addr_with_attribute(
        &self,
        mask: MemAttribute,
        start: usize,
        len: usize,
    ) -> Option<Address> {
        let end = (start + len).min(MEMORY_SIZE);
        (start.min(end)..end)
            .find(|&addr| self.attributes[addr].intersects(mask))
            .map(|addr| addr as Address)
    }

    /// Start of the instruction containing `address`: the nearest `CODE_FIRST`
    /// at or before it, looking back at most `max_back` bytes.
    pub fn instruction_start(&self, address: Address, max_back: usize) -> Option<Address> {
        (0..=max_back.min(address as usize))
            .map(|back| address as usize - back)
            .find(|&addr| self.attributes[addr].contains(MemAttribute::CODE_FIRST))
            .map(|addr| addr as Address)
    }

    fn clip(&mut self, address: usize, len: usize) -> &mut [MemAttribute] {
        let start = address.min(MEMORY_SIZE);
        let end = address.saturating_add(len).min(MEMORY_SIZE);
        &mut self.attributes[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_memory_marks_assigned() {
        let mut mem = Memory::new();
        mem.set_memory(0x8000, &[0x3E, 0x05, 0xC9]).unwrap();

        assert_eq!(mem.get_value_at(0x8001), 0x05);
        assert!(mem.get_attribute_at(0x8000).contains(MemAttribute::ASSIGNED));
        assert!(mem.get_attribute_at(0x8002).contains(MemAttribute::ASSIGNED));
        assert!(mem.get_attribute_at(0x8003).is_empty());
        assert!(mem.get_attribute_at(0x7FFF).is_empty());
    }

    #[test]
    fn test_set_memory_out_of_range() {
        let mut mem = Memory::new();
        assert!(mem.set_memory(0xFFFF, &[0x00]).is_ok());
        let err = mem.set_memory(0xFFFF, &[0x00, 0x00]).unwrap_err();
        assert!(matches!(
            err,
            Z80Error::RegionOutOfRange {
                origin: 0xFFFF,
                len: 2
            }
        ));
    }

    #[test]
    fn test_set_memory_merges_regions() {
        let mut mem = Memory::new();
        mem.set_memory(0x0000, &[0x11; 4]).unwrap();
        mem.add_attributes_at(0, 4, MemAttribute::CODE);
        mem.set_memory(0x0002, &[0x22; 4]).unwrap();

        assert_eq!(mem.get_data(0x0000, 6), vec![0x11, 0x11, 0x22, 0x22, 0x22, 0x22]);
        // Existing bits survive a reload
        assert!(mem.get_attribute_at(2).contains(MemAttribute::CODE | MemAttribute::ASSIGNED));
    }

    #[test]
    fn test_words() {
        let mut mem = Memory::new();
        mem.set_memory(0x1000, &[0x34, 0x12]).unwrap();
        assert_eq!(mem.get_word_at(0x1000), 0x1234);
        assert_eq!(mem.get_big_endian_word_at(0x1000), 0x3412);
    }

    #[test]
    fn test_word_wraps_at_top() {
        let mut mem = Memory::new();
        mem.set_memory(0xFFFF, &[0xCD]).unwrap();
        mem.set_memory(0x0000, &[0xAB]).unwrap();
        assert_eq!(mem.get_word_at(0xFFFF), 0xABCD);
    }

    #[test]
    fn test_attribute_out_of_range_is_empty() {
        let mem = Memory::new();
        assert_eq!(mem.get_attribute_at(0x10000), MemAttribute::empty());
        assert_eq!(mem.get_attribute_at(usize::MAX), MemAttribute::empty());
    }

    #[test]
    fn test_add_and_set_attributes() {
        let mut mem = Memory::new();
        mem.add_attributes_at(0x10, 3, MemAttribute::CODE);
        mem.add_attribute_at(0x10, MemAttribute::CODE_FIRST);
        assert_eq!(
            mem.get_attribute_at(0x10),
            MemAttribute::CODE | MemAttribute::CODE_FIRST
        );
        assert_eq!(mem.get_attribute_at(0x12), MemAttribute::CODE);

        mem.set_attributes_at(0x10, 2, MemAttribute::DATA);
        assert_eq!(mem.get_attribute_at(0x10), MemAttribute::DATA);
        assert_eq!(mem.get_attribute_at(0x12), MemAttribute::CODE);

        // Clipped at the top of memory
        mem.add_attributes_at(0xFFFE, 10, MemAttribute::DATA);
        assert!(mem.get_attribute_at(0xFFFF).contains(MemAttribute::DATA));
    }

    #[test]
    fn test_reset_attribute_flag() {
        let mut mem = Memory::new();
        mem.set_memory(0x4000, &[0; 8]).unwrap();
        mem.add_attributes_at(0x4000, 8, MemAttribute::CODE | MemAttribute::FLOW_ANALYZED);

        mem.reset_attribute_flag(MemAttribute::FLOW_ANALYZED | MemAttribute::CODE);

        assert_eq!(mem.get_attribute_at(0x4003), MemAttribute::ASSIGNED);
        assert_eq!(mem.get_value_at(0x4003), 0);
    }

    #[test]
    fn test_search_addr_with_attribute() {
        let mut mem = Memory::new();
        mem.add_attribute_at(0x105, MemAttribute::CODE_FIRST);

        assert_eq!(
            mem.search_addr_with_attribute(MemAttribute::CODE_FIRST, 0x100, 0x10),
            Some(0x105)
        );
        assert_eq!(
            mem.search_addr_with_attribute(MemAttribute::CODE_FIRST, 0x100, 5),
            None
        );
        assert_eq!(
            mem.search_addr_with_attribute(MemAttribute::CODE_FIRST | MemAttribute::DATA, 0x105, 1),
            Some(0x105)
        );
        assert_eq!(
            mem.search_addr_with_attribute(MemAttribute::CODE_FIRST, 0xFFFF, 100),
            None
        );
    }

    #[test]
    fn test_instruction_start() {
        let mut mem = Memory::new();
        mem.add_attributes_at(0x200, 3, MemAttribute::CODE);
        mem.add_attribute_at(0x200, MemAttribute::CODE_FIRST);

        assert_eq!(mem.instruction_start(0x202, 3), Some(0x200));
        assert_eq!(mem.instruction_start(0x200, 3), Some(0x200));
        assert_eq!(mem.instruction_start(0x204, 3), None);
        assert_eq!(mem.instruction_start(0x0001, 3), None);
    }
}
