//! Generic ELF support for both on-disk files and loaded images.
//! Quick ELF reference: https://gist.github.com/x0nu11byt3/bcb35c3de461e5fb66173071a2379779
//!
//! ELF files start with an ELF header which includes:
//! * A magic number to identify the file as an ELF file.
//! * The class (32- or 64-bit), which changes the layout of every record.
//! * The offset to and number of program headers.
//! * The offset to and number of section headers.
//!
//! Program headers identify segments, used by the OS to load the image into
//! memory. The `PT_LOAD` segments determine the load bias and loaded size;
//! `PT_DYNAMIC` points at the tag/value records used by the dynamic linker.
//!
//! Section headers identify named regions: the symbol tables (`.dynsym`,
//! `.symtab`), their string tables, the two hash tables over `.dynsym`, and
//! `.gnu_debugdata` (an XZ-compressed nested ELF carrying stripped symbols).
//!
//! The same table can be reached two ways depending on whether the attached
//! bytes are a file or a loaded image: `sh_offset` addresses the file,
//! `sh_addr` addresses the image. [`ElfInfo`] records which was used so that
//! queries never have to care.
pub mod dynamic;
pub mod elf_file;
pub mod got;
pub mod header;
pub mod info;
pub mod io;
pub mod lookup;
pub mod minidebug;
pub mod relocations;
pub mod sections;
pub mod segments;
pub mod symbols;
pub mod view;

pub use dynamic::*;
pub use elf_file::*;
pub use header::*;
pub use info::*;
pub use io::*;
pub use lookup::*;
pub use minidebug::decode_xz;
pub use relocations::*;
pub use sections::*;
pub use segments::*;
pub use symbols::*;
pub use view::*;
