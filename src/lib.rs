//! Read-only inspection of ELF images. An [`ElfView`] is attached to a byte
//! slice holding either an ELF file as it sits on disk or the same ELF as it
//! currently appears inside a process, and answers three questions: where is
//! a symbol (as a file-relative offset), where is the first symbol with a
//! given prefix, and which GOT/PLT slots reference a symbol. Symbols are
//! looked up through the GNU hash, the SysV hash, `.dynsym`, `.symtab`, and
//! finally the XZ-compressed `.gnu_debugdata` symbol table, in that order.
//!
//! The view never writes: callers that patch GOT slots or hook functions do
//! so through their own mapping of the returned offsets.
pub mod elf;
pub mod utils;

pub use elf::*;
