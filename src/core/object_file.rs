//! ELF object output for generated code.
//!
//! Wraps a finished function body in a relocatable x86-64 ELF object with a
//! single global text symbol, so it can be inspected with `objdump -d`.
//! Call targets are absolute addresses baked into the code, so the object is
//! a debugging artifact and not meant to be linked into another process.

use object::write::{Object, StandardSection, Symbol, SymbolSection};
use object::{Architecture, BinaryFormat, Endianness, SymbolFlags, SymbolKind, SymbolScope};

/// Alignment of the function in `.text`.
const FUNCTION_ALIGN: u64 = 16;

/// Build an ELF object containing `code` as the function `symbol`.
pub fn write_object(symbol: &str, code: &[u8]) -> Result<Vec<u8>, object::write::Error> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let text = obj.section_id(StandardSection::Text);
    let offset = obj.append_section_data(text, code, FUNCTION_ALIGN);
    obj.add_symbol(Symbol {
        name: symbol.as_bytes().to_vec(),
        value: offset,
        size: code.len() as u64,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(text),
        flags: SymbolFlags::None,
    });
    obj.write()
}
