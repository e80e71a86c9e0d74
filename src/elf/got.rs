//! GOT/PLT slot location. Given a symbol name, find its `.dynsym` index and
//! collect every relocation whose type marks a GOT or PLT slot for that
//! index. Callers use the returned offsets to patch indirection slots, so an
//! entry is only reported when both the symbol index and the relocation type
//! match.
use crate::elf::{ElfClass, ElfInfo, Reader, Relocation, Table, is_data_slot, is_jump_slot};
use crate::elf::lookup::find_dynamic_symbol;

/// File-relative offsets of every GOT/PLT slot for `name`: at most one PLT
/// jump slot first, then the matching data slots in table order. Empty when
/// the name is unknown or nothing references it.
pub(crate) fn symbol_got_offsets(bytes: &[u8], info: &ElfInfo, name: &str) -> Vec<u64> {
    if name.is_empty() || bytes.is_empty() || info.elf_class == ElfClass::None {
        return Vec::new();
    }
    let reader = Reader::from_parts(bytes, info.elf_class, info.little_endian);
    let Some((symidx, _)) = find_dynamic_symbol(&reader, info, name.as_bytes()) else {
        return Vec::new();
    };

    let mut result = Vec::new();
    if let Some(relplt) = info.relplt {
        scan_jump_slots(&reader, info, relplt, symidx, &mut result);
    }
    // With addends the dynamic relocations live in rela.dyn, without in
    // rel.dyn; only the matching table is scanned.
    let dynamic_table = if info.use_rela {
        info.reladyn
    } else {
        info.reldyn
    };
    if let Some(table) = dynamic_table {
        scan_data_slots(&reader, info, table, symidx, &mut result);
    }
    result
}

fn read_relocation(
    reader: &Reader,
    info: &ElfInfo,
    table: Table,
    index: usize,
) -> Option<Relocation> {
    let (entry_size, with_addend) = if info.use_rela {
        (Relocation::rela_entry_size(info.elf_class), true)
    } else {
        (Relocation::rel_entry_size(info.elf_class), false)
    };
    let offset = table.offset + index * entry_size;
    if with_addend {
        Relocation::with_addend(reader, offset).ok()
    } else {
        Relocation::with_no_addend(reader, offset).ok()
    }
}

/// A symbol has at most one PLT entry, so the scan stops at the first hit.
fn scan_jump_slots(
    reader: &Reader,
    info: &ElfInfo,
    table: Table,
    symidx: u32,
    result: &mut Vec<u64>,
) {
    for i in 0..table.count {
        let Some(rel) = read_relocation(reader, info, table, i) else {
            return;
        };
        if rel.symbol_index == symidx && is_jump_slot(info.elf_class, rel.rtype) {
            result.push(rel.offset.wrapping_sub(info.load_bias));
            return;
        }
    }
}

/// A symbol can have any number of GOT data slots; all are collected, in
/// table order, duplicates included.
fn scan_data_slots(
    reader: &Reader,
    info: &ElfInfo,
    table: Table,
    symidx: u32,
    result: &mut Vec<u64>,
) {
    for i in 0..table.count {
        let Some(rel) = read_relocation(reader, info, table, i) else {
            return;
        };
        if rel.symbol_index == symidx && is_data_slot(info.elf_class, rel.rtype) {
            result.push(rel.offset.wrapping_sub(info.load_bias));
        }
    }
}
