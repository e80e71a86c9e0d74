//! Builders for small synthetic ELF images. Tests assemble an image section
//! by section (dynamic symbols, hash tables, relocations, an optional
//! `.symtab` and `.gnu_debugdata`) and attach the resulting bytes. All
//! tables are emitted with `sh_addr == sh_offset` so the same bytes parse in
//! file and loaded mode.
#![allow(dead_code)] // not every test file uses every knob

use elfview::elf_gnu_hash;

pub const EM_386: u16 = 3;
pub const EM_ARM: u16 = 40;
pub const EM_X86_64: u16 = 62;
pub const EM_AARCH64: u16 = 183;

pub const R_X86_64_GLOB_DAT: u32 = 6;
pub const R_X86_64_JUMP_SLOT: u32 = 7;
pub const R_ARM_ABS32: u32 = 2;
pub const R_ARM_GLOB_DAT: u32 = 21;
pub const R_ARM_JUMP_SLOT: u32 = 22;

#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Class {
    Elf32,
    Elf64,
}

struct Sym {
    name: String,
    value: u64,
}

#[derive(Clone, Copy)]
pub struct Reloc {
    /// r_offset, an address inside the image.
    pub offset: u64,
    /// Index of the referenced symbol in .dynsym.
    pub sym: u32,
    pub rtype: u32,
}

pub struct ImageBuilder {
    class: Class,
    machine: u16,
    load_vaddr: u64,
    soname: Option<String>,
    dyn_syms: Vec<Sym>,
    local_syms: Vec<Sym>,
    plt_relocs: Vec<Reloc>,
    dyn_relocs: Vec<Reloc>,
    use_rela: bool,
    gnu_hash: bool,
    sysv_hash: bool,
    gnu_debugdata: Option<Vec<u8>>,
    extra_loads: Vec<(u64, u64)>,
}

impl ImageBuilder {
    pub fn new(class: Class, machine: u16) -> Self {
        ImageBuilder {
            class,
            machine,
            load_vaddr: 0,
            soname: None,
            dyn_syms: Vec::new(),
            local_syms: Vec::new(),
            plt_relocs: Vec::new(),
            dyn_relocs: Vec::new(),
            use_rela: class == Class::Elf64,
            gnu_hash: false,
            sysv_hash: false,
            gnu_debugdata: None,
            extra_loads: Vec::new(),
        }
    }

    /// Sets the PT_LOAD p_vaddr, i.e. the load bias of the image.
    pub fn load_vaddr(mut self, vaddr: u64) -> Self {
        self.load_vaddr = vaddr;
        self
    }

    /// Adds another PT_LOAD covering [vaddr, vaddr + memsz).
    pub fn extra_load(mut self, vaddr: u64, memsz: u64) -> Self {
        self.extra_loads.push((vaddr, memsz));
        self
    }

    pub fn soname(mut self, name: &str) -> Self {
        self.soname = Some(name.to_string());
        self
    }

    /// Adds a .dynsym entry; the first added symbol gets index 1 (index 0 is
    /// the null symbol).
    pub fn dyn_sym(mut self, name: &str, value: u64) -> Self {
        self.dyn_syms.push(Sym {
            name: name.to_string(),
            value,
        });
        self
    }

    /// Adds a .symtab entry.
    pub fn local_sym(mut self, name: &str, value: u64) -> Self {
        self.local_syms.push(Sym {
            name: name.to_string(),
            value,
        });
        self
    }

    pub fn use_rela(mut self, use_rela: bool) -> Self {
        self.use_rela = use_rela;
        self
    }

    pub fn plt_reloc(mut self, reloc: Reloc) -> Self {
        self.plt_relocs.push(reloc);
        self
    }

    pub fn dyn_reloc(mut self, reloc: Reloc) -> Self {
        self.dyn_relocs.push(reloc);
        self
    }

    pub fn with_gnu_hash(mut self) -> Self {
        self.gnu_hash = true;
        self
    }

    pub fn with_sysv_hash(mut self) -> Self {
        self.sysv_hash = true;
        self
    }

    pub fn gnu_debugdata(mut self, bytes: Vec<u8>) -> Self {
        self.gnu_debugdata = Some(bytes);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        Layout::new(self).emit(self)
    }
}

/// Per-class record sizes.
struct Sizes {
    ehdr: usize,
    phent: usize,
    shent: usize,
    dynent: usize,
    syment: usize,
    bloom_word: usize,
}

impl Sizes {
    fn of(class: Class) -> Sizes {
        match class {
            Class::Elf64 => Sizes {
                ehdr: 64,
                phent: 56,
                shent: 64,
                dynent: 16,
                syment: 24,
                bloom_word: 8,
            },
            Class::Elf32 => Sizes {
                ehdr: 52,
                phent: 32,
                shent: 40,
                dynent: 8,
                syment: 16,
                bloom_word: 4,
            },
        }
    }
}

/// Everything about where each piece lands, computed before any bytes are
/// emitted so the ELF header can point forward.
struct Layout {
    sizes: Sizes,
    phnum: usize,
    ph_off: usize,
    dynstr: Vec<u8>,
    dyn_name_offs: Vec<u32>,
    soname_off: u32,
    dynstr_off: usize,
    dynsym_off: usize,
    dynsym_count: usize,
    sysv_off: usize,
    sysv_size: usize,
    gnu_off: usize,
    gnu_size: usize,
    relent: usize,
    relplt_off: usize,
    relplt_size: usize,
    reldyn_off: usize,
    reldyn_size: usize,
    dynamic_off: usize,
    dynamic_count: usize,
    strtab: Vec<u8>,
    local_name_offs: Vec<u32>,
    symtab_off: usize,
    symtab_count: usize,
    strtab_off: usize,
    debugdata_off: usize,
    debugdata_size: usize,
    shstrtab: Vec<u8>,
    shstrtab_off: usize,
    sh_off: usize,
    shnum: usize,
    shstrndx: usize,
    total: usize,
}

fn intern(table: &mut Vec<u8>, name: &str) -> u32 {
    let off = table.len() as u32;
    table.extend_from_slice(name.as_bytes());
    table.push(0);
    off
}

impl Layout {
    fn new(b: &ImageBuilder) -> Layout {
        let sizes = Sizes::of(b.class);
        let phnum = 1 + b.extra_loads.len() + 1;
        let ph_off = sizes.ehdr;
        let mut cursor = ph_off + phnum * sizes.phent;

        let mut dynstr = vec![0u8];
        let dyn_name_offs: Vec<u32> = b
            .dyn_syms
            .iter()
            .map(|s| intern(&mut dynstr, &s.name))
            .collect();
        let soname_off = match &b.soname {
            Some(name) => intern(&mut dynstr, name),
            None => 0,
        };
        let dynstr_off = cursor;
        cursor += dynstr.len();

        let dynsym_count = 1 + b.dyn_syms.len();
        let dynsym_off = cursor;
        cursor += dynsym_count * sizes.syment;

        let (sysv_off, sysv_size) = if b.sysv_hash {
            let size = 8 + 4 + 4 * dynsym_count;
            let off = cursor;
            cursor += size;
            (off, size)
        } else {
            (0, 0)
        };

        let (gnu_off, gnu_size) = if b.gnu_hash {
            // header + one bloom word + one bucket + chain from symoffset 1
            let size = 16 + sizes.bloom_word + 4 + 4 * (dynsym_count - 1);
            let off = cursor;
            cursor += size;
            (off, size)
        } else {
            (0, 0)
        };

        let relent = match (b.class, b.use_rela) {
            (Class::Elf64, true) => 24,
            (Class::Elf64, false) => 16,
            (Class::Elf32, true) => 12,
            (Class::Elf32, false) => 8,
        };
        let relplt_off = cursor;
        let relplt_size = b.plt_relocs.len() * relent;
        cursor += relplt_size;
        let reldyn_off = cursor;
        let reldyn_size = b.dyn_relocs.len() * relent;
        cursor += reldyn_size;

        let mut dynamic_count = 2; // DT_PLTREL + DT_NULL
        if b.soname.is_some() {
            dynamic_count += 2; // DT_SONAME + DT_STRTAB
        }
        if !b.plt_relocs.is_empty() {
            dynamic_count += 2; // DT_JMPREL + DT_PLTRELSZ
        }
        if !b.dyn_relocs.is_empty() {
            dynamic_count += 2; // DT_REL[A] + DT_REL[A]SZ
        }
        let dynamic_off = cursor;
        cursor += dynamic_count * sizes.dynent;

        let mut strtab = vec![0u8];
        let local_name_offs: Vec<u32> = b
            .local_syms
            .iter()
            .map(|s| intern(&mut strtab, &s.name))
            .collect();
        let (symtab_off, symtab_count, strtab_off) = if b.local_syms.is_empty() {
            (0, 0, 0)
        } else {
            let symtab_off = cursor;
            let count = 1 + b.local_syms.len();
            cursor += count * sizes.syment;
            let strtab_off = cursor;
            cursor += strtab.len();
            (symtab_off, count, strtab_off)
        };

        let (debugdata_off, debugdata_size) = match &b.gnu_debugdata {
            Some(bytes) => {
                let off = cursor;
                cursor += bytes.len();
                (off, bytes.len())
            }
            None => (0, 0),
        };

        let mut shstrtab = vec![0u8];
        // names are interned while the headers are emitted; reserve the blob
        // size up front by interning the full set now
        for name in [
            ".dynstr",
            ".dynsym",
            ".hash",
            ".gnu.hash",
            ".rel.plt",
            ".rel.dyn",
            ".rela.plt",
            ".rela.dyn",
            ".symtab",
            ".strtab",
            ".gnu_debugdata",
            ".shstrtab",
        ] {
            intern(&mut shstrtab, name);
        }
        let shstrtab_off = cursor;
        cursor += shstrtab.len();

        let mut shnum = 3; // null + .dynstr + .dynsym
        if b.sysv_hash {
            shnum += 1;
        }
        if b.gnu_hash {
            shnum += 1;
        }
        if !b.plt_relocs.is_empty() {
            shnum += 1;
        }
        if !b.dyn_relocs.is_empty() {
            shnum += 1;
        }
        if !b.local_syms.is_empty() {
            shnum += 2;
        }
        if b.gnu_debugdata.is_some() {
            shnum += 1;
        }
        shnum += 1; // .shstrtab
        let shstrndx = shnum - 1;
        let sh_off = cursor;
        cursor += shnum * sizes.shent;

        Layout {
            sizes,
            phnum,
            ph_off,
            dynstr,
            dyn_name_offs,
            soname_off,
            dynstr_off,
            dynsym_off,
            dynsym_count,
            sysv_off,
            sysv_size,
            gnu_off,
            gnu_size,
            relent,
            relplt_off,
            relplt_size,
            reldyn_off,
            reldyn_size,
            dynamic_off,
            dynamic_count,
            strtab,
            local_name_offs,
            symtab_off,
            symtab_count,
            strtab_off,
            debugdata_off,
            debugdata_size,
            shstrtab,
            shstrtab_off,
            sh_off,
            shnum,
            shstrndx,
            total: cursor,
        }
    }

    fn emit(&self, b: &ImageBuilder) -> Vec<u8> {
        let mut e = Emitter {
            bytes: Vec::with_capacity(self.total),
            class: b.class,
        };
        self.emit_ehdr(b, &mut e);
        self.emit_phdrs(b, &mut e);
        e.bytes.extend_from_slice(&self.dynstr);
        self.emit_dynsym(b, &mut e);
        if b.sysv_hash {
            self.emit_sysv_hash(&mut e);
        }
        if b.gnu_hash {
            self.emit_gnu_hash(b, &mut e);
        }
        for reloc in &b.plt_relocs {
            e.reloc(reloc, b.use_rela);
        }
        for reloc in &b.dyn_relocs {
            e.reloc(reloc, b.use_rela);
        }
        self.emit_dynamic(b, &mut e);
        if !b.local_syms.is_empty() {
            assert_eq!(e.bytes.len(), self.symtab_off);
            e.sym_entry(0, 0); // null symbol
            for (sym, &name) in b.local_syms.iter().zip(&self.local_name_offs) {
                e.sym_entry(name, sym.value);
            }
            e.bytes.extend_from_slice(&self.strtab);
        }
        if let Some(bytes) = &b.gnu_debugdata {
            e.bytes.extend_from_slice(bytes);
        }
        e.bytes.extend_from_slice(&self.shstrtab);
        self.emit_shdrs(b, &mut e);
        assert_eq!(e.bytes.len(), self.total);
        e.bytes
    }

    fn emit_ehdr(&self, b: &ImageBuilder, e: &mut Emitter) {
        e.bytes.extend_from_slice(b"\x7fELF");
        e.bytes.push(match b.class {
            Class::Elf32 => 1,
            Class::Elf64 => 2,
        });
        e.bytes.push(1); // little endian
        e.bytes.push(1); // EV_CURRENT
        e.bytes.extend_from_slice(&[0u8; 9]); // abi + padding
        e.u16(3); // ET_DYN
        e.u16(b.machine);
        e.u32(1);
        e.addr(0); // e_entry
        e.addr(self.ph_off as u64);
        e.addr(self.sh_off as u64);
        e.u32(0); // e_flags
        e.u16(self.sizes.ehdr as u16);
        e.u16(self.sizes.phent as u16);
        e.u16(self.phnum as u16);
        e.u16(self.sizes.shent as u16);
        e.u16(self.shnum as u16);
        e.u16(self.shstrndx as u16);
    }

    fn emit_phdrs(&self, b: &ImageBuilder, e: &mut Emitter) {
        let pt_load = 1;
        let pt_dynamic = 2;
        e.phdr(pt_load, 0, b.load_vaddr, self.total as u64, self.total as u64);
        for &(vaddr, memsz) in &b.extra_loads {
            e.phdr(pt_load, 0, vaddr, 0, memsz);
        }
        e.phdr(
            pt_dynamic,
            self.dynamic_off as u64,
            self.dynamic_off as u64,
            (self.dynamic_count * self.sizes.dynent) as u64,
            (self.dynamic_count * self.sizes.dynent) as u64,
        );
    }

    fn emit_dynsym(&self, b: &ImageBuilder, e: &mut Emitter) {
        assert_eq!(e.bytes.len(), self.dynsym_off);
        e.sym_entry(0, 0); // index 0 is the null symbol
        for (sym, &name) in b.dyn_syms.iter().zip(&self.dyn_name_offs) {
            e.sym_entry(name, sym.value);
        }
    }

    /// One bucket; every symbol chained behind it so lookups work no matter
    /// what the name hashes to.
    fn emit_sysv_hash(&self, e: &mut Emitter) {
        assert_eq!(e.bytes.len(), self.sysv_off);
        let count = self.dynsym_count as u32;
        e.u32(1); // nbucket
        e.u32(count); // nchain
        e.u32(if count > 1 { 1 } else { 0 }); // bucket[0]
        for i in 0..count {
            let next = if i != 0 && i + 1 < count { i + 1 } else { 0 };
            e.u32(next);
        }
    }

    /// One bucket, symoffset 1, and a fully-set bloom word so the filter
    /// never rejects.
    fn emit_gnu_hash(&self, b: &ImageBuilder, e: &mut Emitter) {
        assert_eq!(e.bytes.len(), self.gnu_off);
        let count = self.dynsym_count as u32;
        e.u32(1); // nbuckets
        e.u32(1); // symoffset
        e.u32(1); // bloom_size
        e.u32(6); // bloom_shift
        e.addr(u64::MAX); // bloom word, all bits set
        e.u32(if count > 1 { 1 } else { 0 }); // bucket[0]
        for (i, sym) in b.dyn_syms.iter().enumerate() {
            let hash = elf_gnu_hash(sym.name.as_bytes());
            let last = i + 1 == b.dyn_syms.len();
            e.u32(if last { hash | 1 } else { hash & !1 });
        }
    }

    fn emit_dynamic(&self, b: &ImageBuilder, e: &mut Emitter) {
        assert_eq!(e.bytes.len(), self.dynamic_off);
        if b.soname.is_some() {
            e.dyn_entry(14, self.soname_off as u64); // DT_SONAME
            e.dyn_entry(5, self.dynstr_off as u64); // DT_STRTAB
        }
        e.dyn_entry(20, if b.use_rela { 7 } else { 17 }); // DT_PLTREL
        if !b.plt_relocs.is_empty() {
            e.dyn_entry(23, self.relplt_off as u64); // DT_JMPREL
            e.dyn_entry(2, self.relplt_size as u64); // DT_PLTRELSZ
        }
        if !b.dyn_relocs.is_empty() {
            if b.use_rela {
                e.dyn_entry(7, self.reldyn_off as u64); // DT_RELA
                e.dyn_entry(8, self.reldyn_size as u64); // DT_RELASZ
            } else {
                e.dyn_entry(17, self.reldyn_off as u64); // DT_REL
                e.dyn_entry(18, self.reldyn_size as u64); // DT_RELSZ
            }
        }
        e.dyn_entry(0, 0); // DT_NULL
    }

    fn emit_shdrs(&self, b: &ImageBuilder, e: &mut Emitter) {
        assert_eq!(e.bytes.len(), self.sh_off);
        const SHT_PROGBITS: u32 = 1;
        const SHT_SYMTAB: u32 = 2;
        const SHT_STRTAB: u32 = 3;
        const SHT_RELA: u32 = 4;
        const SHT_HASH: u32 = 5;
        const SHT_REL: u32 = 9;
        const SHT_DYNSYM: u32 = 11;
        const SHT_GNU_HASH: u32 = 0x6ffffff6;
        const ALLOC: u64 = 2;

        let name = |n: &str| self.shstr_index(n);
        let syment = self.sizes.syment as u64;

        e.shdr(0, 0, 0, 0, 0, 0, 0); // null section
        e.shdr(
            name(".dynstr"),
            SHT_STRTAB,
            ALLOC,
            self.dynstr_off as u64,
            self.dynstr_off as u64,
            self.dynstr.len() as u64,
            0,
        );
        e.shdr(
            name(".dynsym"),
            SHT_DYNSYM,
            ALLOC,
            self.dynsym_off as u64,
            self.dynsym_off as u64,
            (self.dynsym_count * self.sizes.syment) as u64,
            syment,
        );
        if b.sysv_hash {
            e.shdr(
                name(".hash"),
                SHT_HASH,
                ALLOC,
                self.sysv_off as u64,
                self.sysv_off as u64,
                self.sysv_size as u64,
                4,
            );
        }
        if b.gnu_hash {
            e.shdr(
                name(".gnu.hash"),
                SHT_GNU_HASH,
                ALLOC,
                self.gnu_off as u64,
                self.gnu_off as u64,
                self.gnu_size as u64,
                0,
            );
        }
        let (rel_type, plt_name, dyn_name) = if b.use_rela {
            (SHT_RELA, ".rela.plt", ".rela.dyn")
        } else {
            (SHT_REL, ".rel.plt", ".rel.dyn")
        };
        if !b.plt_relocs.is_empty() {
            e.shdr(
                name(plt_name),
                rel_type,
                ALLOC,
                self.relplt_off as u64,
                self.relplt_off as u64,
                self.relplt_size as u64,
                self.relent as u64,
            );
        }
        if !b.dyn_relocs.is_empty() {
            e.shdr(
                name(dyn_name),
                rel_type,
                ALLOC,
                self.reldyn_off as u64,
                self.reldyn_off as u64,
                self.reldyn_size as u64,
                self.relent as u64,
            );
        }
        if !b.local_syms.is_empty() {
            e.shdr(
                name(".symtab"),
                SHT_SYMTAB,
                0,
                0,
                self.symtab_off as u64,
                (self.symtab_count * self.sizes.syment) as u64,
                syment,
            );
            e.shdr(
                name(".strtab"),
                SHT_STRTAB,
                0,
                0,
                self.strtab_off as u64,
                self.strtab.len() as u64,
                0,
            );
        }
        if b.gnu_debugdata.is_some() {
            e.shdr(
                name(".gnu_debugdata"),
                SHT_PROGBITS,
                0,
                0,
                self.debugdata_off as u64,
                self.debugdata_size as u64,
                0,
            );
        }
        // kept addressable (addr == offset) so the same image parses in
        // loaded mode, where section names are read through sh_addr
        e.shdr(
            name(".shstrtab"),
            SHT_STRTAB,
            ALLOC,
            self.shstrtab_off as u64,
            self.shstrtab_off as u64,
            self.shstrtab.len() as u64,
            0,
        );
    }

    fn shstr_index(&self, name: &str) -> u32 {
        let mut needle = name.as_bytes().to_vec();
        needle.push(0);
        self.shstrtab
            .windows(needle.len())
            .position(|w| w == needle.as_slice())
            .expect("section name not interned") as u32
    }
}

struct Emitter {
    bytes: Vec<u8>,
    class: Class,
}

impl Emitter {
    fn u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// A class-width word.
    fn addr(&mut self, v: u64) {
        match self.class {
            Class::Elf64 => self.u64(v),
            Class::Elf32 => self.u32(v as u32),
        }
    }

    fn phdr(&mut self, ptype: u32, offset: u64, vaddr: u64, filesz: u64, memsz: u64) {
        match self.class {
            Class::Elf64 => {
                self.u32(ptype);
                self.u32(5); // p_flags, R+X
                self.u64(offset);
                self.u64(vaddr);
                self.u64(vaddr); // p_paddr
                self.u64(filesz);
                self.u64(memsz);
                self.u64(0x1000); // p_align
            }
            Class::Elf32 => {
                self.u32(ptype);
                self.u32(offset as u32);
                self.u32(vaddr as u32);
                self.u32(vaddr as u32);
                self.u32(filesz as u32);
                self.u32(memsz as u32);
                self.u32(5);
                self.u32(0x1000);
            }
        }
    }

    fn shdr(&mut self, name: u32, stype: u32, flags: u64, addr: u64, offset: u64, size: u64, entsize: u64) {
        match self.class {
            Class::Elf64 => {
                self.u32(name);
                self.u32(stype);
                self.u64(flags);
                self.u64(addr);
                self.u64(offset);
                self.u64(size);
                self.u32(0); // sh_link
                self.u32(0); // sh_info
                self.u64(8); // sh_addralign
                self.u64(entsize);
            }
            Class::Elf32 => {
                self.u32(name);
                self.u32(stype);
                self.u32(flags as u32);
                self.u32(addr as u32);
                self.u32(offset as u32);
                self.u32(size as u32);
                self.u32(0);
                self.u32(0);
                self.u32(4);
                self.u32(entsize as u32);
            }
        }
    }

    fn sym_entry(&mut self, name: u32, value: u64) {
        match self.class {
            Class::Elf64 => {
                self.u32(name);
                self.bytes.push(0x12); // STB_GLOBAL | STT_FUNC
                self.bytes.push(0); // st_other
                self.u16(1); // st_shndx
                self.u64(value);
                self.u64(0); // st_size
            }
            Class::Elf32 => {
                self.u32(name);
                self.u32(value as u32);
                self.u32(0); // st_size
                self.bytes.push(0x12);
                self.bytes.push(0);
                self.u16(1);
            }
        }
    }

    fn dyn_entry(&mut self, tag: u64, value: u64) {
        self.addr(tag);
        self.addr(value);
    }

    fn reloc(&mut self, reloc: &Reloc, with_addend: bool) {
        match self.class {
            Class::Elf64 => {
                self.u64(reloc.offset);
                self.u64(((reloc.sym as u64) << 32) | reloc.rtype as u64);
                if with_addend {
                    self.u64(0);
                }
            }
            Class::Elf32 => {
                self.u32(reloc.offset as u32);
                self.u32((reloc.sym << 8) | (reloc.rtype & 0xff));
                if with_addend {
                    self.u32(0);
                }
            }
        }
    }
}

/// Wraps raw bytes in an XZ container the way `.gnu_debugdata` is stored.
pub fn xz_compress(bytes: &[u8]) -> Vec<u8> {
    let mut input = bytes;
    let mut out = Vec::new();
    lzma_rs::xz_compress(&mut input, &mut out).expect("xz compression failed");
    out
}
