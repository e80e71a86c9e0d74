//! Symbol resolution. A name is probed through the GNU hash (bloom filter,
//! then chain), the SysV hash, a linear `.dynsym` scan, a linear `.symtab`
//! scan, and finally the mini-debug map, in that order. The first four also
//! back the GOT locator, which needs the `.dynsym` index of a name.
//! reference: https://flapenguin.me/elf-dt-gnu-hash
use crate::elf::{ElfClass, ElfInfo, Reader, SymbolTableEntry, Table};

/// The GNU hash: djb2 without the xor variant.
pub fn elf_gnu_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 5381;
    for &c in name {
        h = h.wrapping_add(h << 5).wrapping_add(c as u32);
    }
    h
}

/// The original System V ABI hash.
pub fn elf_sysv_hash(name: &[u8]) -> u32 {
    let mut h: u32 = 0;
    for &c in name {
        h = (h << 4).wrapping_add(c as u32);
        let g = h & 0xf0000000;
        h ^= g;
        h ^= g >> 24;
    }
    h
}

fn read_symbol(reader: &Reader, table: Table, index: usize) -> Option<SymbolTableEntry> {
    if index >= table.count {
        return None;
    }
    let class = if reader.sixty_four_bit {
        ElfClass::Elf64
    } else {
        ElfClass::Elf32
    };
    let offset = table.offset + index * SymbolTableEntry::entry_size(class);
    SymbolTableEntry::new(reader, offset).ok()
}

fn symbol_name<'a>(reader: &Reader<'a>, strings: usize, sym: &SymbolTableEntry) -> Option<&'a [u8]> {
    reader
        .read_str_bytes(strings.saturating_add(sym.name as usize))
        .ok()
}

/// Probe the GNU hash table. `None` covers both "definitely absent" (bloom
/// miss, bucket below symoffset) and "chain exhausted"; either way the
/// caller moves on to the next probe.
fn gnu_hash_probe(
    reader: &Reader,
    base: usize,
    dynsym: Table,
    dynstr: usize,
    name: &[u8],
) -> Option<(u32, SymbolTableEntry)> {
    let nbuckets = reader.read_word(base).ok()?;
    let symoffset = reader.read_word(base + 4).ok()?;
    let bloom_size = reader.read_word(base + 8).ok()?;
    let bloom_shift = reader.read_word(base + 12).ok()?;
    if nbuckets == 0 || bloom_size == 0 {
        return None;
    }

    // The bloom words have the class width; two bits per symbol.
    let class_bits: u32 = if reader.sixty_four_bit { 64 } else { 32 };
    let word_size = (class_bits / 8) as usize;
    let hash = elf_gnu_hash(name);
    let bloom = base + 16;
    let index = ((hash / class_bits) % bloom_size) as usize;
    let word = reader.read_addr(bloom + index * word_size).ok()?;
    let mask = (1u64 << (hash % class_bits)) | (1u64 << ((hash >> bloom_shift) % class_bits));
    if (word & mask) != mask {
        return None;
    }

    let buckets = bloom + bloom_size as usize * word_size;
    let chain = buckets + nbuckets as usize * 4;
    let mut symix = reader
        .read_word(buckets + 4 * (hash % nbuckets) as usize)
        .ok()?;
    // Symbols below symoffset are not in the hash chain.
    if symix < symoffset {
        return None;
    }
    loop {
        if symix as usize >= dynsym.count {
            return None;
        }
        let chain_hash = reader
            .read_word(chain + 4 * (symix - symoffset) as usize)
            .ok()?;
        // The chain stores the hash with the low bit repurposed as the
        // end-of-chain marker.
        if (hash | 1) == (chain_hash | 1) {
            let sym = read_symbol(reader, dynsym, symix as usize)?;
            if symbol_name(reader, dynstr, &sym) == Some(name) {
                return Some((symix, sym));
            }
        }
        if chain_hash & 1 != 0 {
            return None;
        }
        symix += 1;
    }
}

/// Probe the SysV hash table: one bucket, then a chain indexed by symbol
/// index until the terminating zero.
fn sysv_hash_probe(
    reader: &Reader,
    hash_table: crate::elf::SysvHash,
    dynsym: Table,
    dynstr: usize,
    name: &[u8],
) -> Option<(u32, SymbolTableEntry)> {
    if hash_table.nbucket == 0 {
        return None;
    }
    let hash = elf_sysv_hash(name);
    let mut index = reader
        .read_word(hash_table.bucket + 4 * (hash % hash_table.nbucket) as usize)
        .ok()?;
    // Cap the walk at nchain so a crafted cyclic chain cannot hang a query.
    for _ in 0..hash_table.nchain {
        if index == 0 || index >= hash_table.nchain {
            return None;
        }
        if let Some(sym) = read_symbol(reader, dynsym, index as usize) {
            if symbol_name(reader, dynstr, &sym) == Some(name) {
                return Some((index, sym));
            }
        }
        index = reader
            .read_word(hash_table.chain + 4 * index as usize)
            .ok()?;
    }
    None
}

/// Find a name in `.dynsym`, returning its index and entry. Probes the hash
/// tables first and falls back to a linear scan, so a symbol the hashes
/// don't cover (e.g. an undefined import referenced by GOT relocations) is
/// still found.
pub(crate) fn find_dynamic_symbol(
    reader: &Reader,
    info: &ElfInfo,
    name: &[u8],
) -> Option<(u32, SymbolTableEntry)> {
    let dynsym = info.dynsym?;
    let dynstr = info.dynstr?;
    if let Some(base) = info.gnu_hash {
        if let Some(found) = gnu_hash_probe(reader, base, dynsym, dynstr, name) {
            return Some(found);
        }
    }
    if let Some(hash_table) = info.sysv_hash {
        if let Some(found) = sysv_hash_probe(reader, hash_table, dynsym, dynstr, name) {
            return Some(found);
        }
    }
    for i in 0..dynsym.count {
        let sym = read_symbol(reader, dynsym, i)?;
        if symbol_name(reader, dynstr, &sym) == Some(name) {
            return Some((i as u32, sym));
        }
    }
    None
}

/// Find a name in the non-dynamic `.symtab` (file mode only; the table is
/// not part of a loaded image).
pub(crate) fn find_symtab_symbol(
    reader: &Reader,
    info: &ElfInfo,
    name: &[u8],
) -> Option<SymbolTableEntry> {
    let symtab = info.symtab?;
    let strtab = info.strtab?;
    for i in 0..symtab.count {
        let sym = read_symbol(reader, symtab, i)?;
        if symbol_name(reader, strtab, &sym) == Some(name) {
            return Some(sym);
        }
    }
    None
}

/// First entry of `.dynsym` then `.symtab` whose name starts with `prefix`.
/// Prefixes can't be hashed, so this is linear only.
fn find_prefix_symbol(reader: &Reader, info: &ElfInfo, prefix: &[u8]) -> Option<SymbolTableEntry> {
    if let (Some(dynsym), Some(dynstr)) = (info.dynsym, info.dynstr) {
        for i in 0..dynsym.count {
            let sym = read_symbol(reader, dynsym, i)?;
            if symbol_name(reader, dynstr, &sym).is_some_and(|n| n.starts_with(prefix)) {
                return Some(sym);
            }
        }
    }
    if let (Some(symtab), Some(strtab)) = (info.symtab, info.strtab) {
        for i in 0..symtab.count {
            let sym = read_symbol(reader, symtab, i)?;
            if symbol_name(reader, strtab, &sym).is_some_and(|n| n.starts_with(prefix)) {
                return Some(sym);
            }
        }
    }
    None
}

/// The full resolution chain behind `symbol_offset`. Zero means not found
/// (and also a symbol whose offset is genuinely zero; callers that care must
/// distinguish some other way).
pub(crate) fn symbol_offset(bytes: &[u8], info: &ElfInfo, name: &str) -> u64 {
    if name.is_empty() || bytes.is_empty() || info.elf_class == ElfClass::None {
        return 0;
    }
    let reader = Reader::from_parts(bytes, info.elf_class, info.little_endian);
    if let Some((_, sym)) = find_dynamic_symbol(&reader, info, name.as_bytes()) {
        return sym.value.wrapping_sub(info.load_bias);
    }
    if let Some(sym) = find_symtab_symbol(&reader, info, name.as_bytes()) {
        return sym.value.wrapping_sub(info.load_bias);
    }
    if let Some(&value) = info.compressed_debug_symbols.get(name) {
        return value.wrapping_sub(info.load_bias);
    }
    0
}

pub(crate) fn first_symbol_offset_with_prefix(bytes: &[u8], info: &ElfInfo, prefix: &str) -> u64 {
    if prefix.is_empty() || bytes.is_empty() || info.elf_class == ElfClass::None {
        return 0;
    }
    let reader = Reader::from_parts(bytes, info.elf_class, info.little_endian);
    if let Some(sym) = find_prefix_symbol(&reader, info, prefix.as_bytes()) {
        return sym.value.wrapping_sub(info.load_bias);
    }
    for (name, &value) in &info.compressed_debug_symbols {
        if name.starts_with(prefix) {
            return value.wrapping_sub(info.load_bias);
        }
    }
    0
}
