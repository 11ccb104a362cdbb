//! Decoding of generated code for listings and tests.

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction, NasmFormatter};
use std::fmt::Write;

/// Decode `code` into instructions, assuming it starts at address 0.
pub fn decode(code: &[u8]) -> Vec<Instruction> {
    let mut decoder = Decoder::with_ip(64, code, 0, DecoderOptions::NONE);
    let mut instructions = Vec::new();
    while decoder.can_decode() {
        instructions.push(decoder.decode());
    }
    instructions
}

/// NASM-syntax listing of `code`, one instruction per line with offset and bytes.
pub fn listing(code: &[u8]) -> String {
    let mut formatter = NasmFormatter::new();
    let mut text = String::new();
    let mut out = String::new();

    for instr in decode(code) {
        let start = instr.ip() as usize;
        let bytes = &code[start..start + instr.len()];
        text.clear();
        formatter.format(&instr, &mut text);

        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        let _ = writeln!(out, "{start:04x}  {hex:<24} {text}");
    }
    out
}
