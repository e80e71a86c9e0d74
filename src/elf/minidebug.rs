//! Mini debug info: `.gnu_debugdata` holds an XZ-compressed nested ELF
//! whose `.symtab` carries the symbols stripped from the outer image, see
//! https://sourceware.org/gdb/current/onlinedocs/gdb.html/MiniDebugInfo.html
//! The section only exists on disk, so ingestion runs for file-mode attaches
//! only; the harvested name→value map then serves loaded-mode lookups too.
use crate::elf::{ElfClass, ElfInfo, Reader, SymbolTableEntry};
use crate::utils;
use std::error::Error;

const XZ_MAGIC: [u8; 6] = [0xfd, b'7', b'z', b'X', b'Z', 0x00];

/// Decompress an XZ stream to a byte vector. The one external collaborator
/// of this module; everything else is ELF.
pub fn decode_xz(input: &[u8]) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut cursor = input;
    let mut decompressed = Vec::new();
    lzma_rs::xz_decompress(&mut cursor, &mut decompressed)
        .map_err(|err| format!("{err:?}"))?;
    Ok(decompressed)
}

/// Decompress the recorded `.gnu_debugdata` slice and merge the nested
/// ELF's `.symtab` into `compressed_debug_symbols`. Failures leave the
/// outer view valid, just without debug symbols.
pub(crate) fn ingest(bytes: &[u8], info: &mut ElfInfo) {
    let Some((offset, size)) = info.mini_debug_info else {
        return;
    };
    // the slice was bounds-checked when the section was recorded
    let input = &bytes[offset..offset + size];
    if input.len() < XZ_MAGIC.len() || input[..XZ_MAGIC.len()] != XZ_MAGIC {
        utils::warn("mini debug info is not an XZ stream");
        return;
    }
    let decompressed = match decode_xz(input) {
        Ok(decompressed) => decompressed,
        Err(err) => {
            utils::warn(&format!("failed to decompress mini debug info: {err}"));
            return;
        }
    };
    harvest_symtab(&decompressed, info);
}

/// Re-run the image parser on the decompressed bytes (always file mode) and
/// copy out its `.symtab`. The nested ELF and its parse state are dropped
/// when this returns; debug symbol tables are large and not file-backed.
fn harvest_symtab(bytes: &[u8], info: &mut ElfInfo) {
    let embedded = ElfInfo::parse(bytes, false);
    if embedded.elf_class == ElfClass::None {
        utils::warn("mini debug info does not contain an ELF image");
        return;
    }
    let (Some(symtab), Some(strtab)) = (embedded.symtab, embedded.strtab) else {
        return;
    };
    log::debug!(
        "mini debug info: {} bytes, {} symtab entries",
        bytes.len(),
        symtab.count
    );
    let reader = Reader::from_parts(bytes, embedded.elf_class, embedded.little_endian);
    let entry_size = SymbolTableEntry::entry_size(embedded.elf_class);
    for i in 0..symtab.count {
        let Ok(sym) = SymbolTableEntry::new(&reader, symtab.offset + i * entry_size) else {
            break;
        };
        let Ok(name) = reader.read_str_bytes(strtab.saturating_add(sym.name as usize)) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        // last write wins on duplicate names
        info.compressed_debug_symbols
            .insert(String::from_utf8_lossy(name).into_owned(), sym.value);
    }
}
