//! Mojibake repair for text that was UTF-8 on the wire but got read as Latin-1.
//!
//! The round trip is Latin-1 bytes → GBK text → GBK bytes → UTF-8 text.
//! Undecodable byte sequences are dropped at both decode stages. If a stage
//! cannot run at all (a character outside Latin-1, or one GBK cannot encode)
//! the input comes back untouched, which is what keeps correctly decoded
//! Chinese text intact.

use encoding_rs::{DecoderResult, Encoding, GBK, UTF_8};

/// Best-effort repair. Never fails; worst case returns `text` unchanged.
pub fn repair(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    try_repair(text).unwrap_or_else(|| text.to_string())
}

fn try_repair(text: &str) -> Option<String> {
    let latin1 = encode_latin1(text)?;
    let gbk_text = decode_ignoring(GBK, &latin1)?;
    let (gbk_bytes, _, had_errors) = GBK.encode(&gbk_text);
    if had_errors {
        return None;
    }
    decode_ignoring(UTF_8, &gbk_bytes)
}

fn encode_latin1(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

/// Decode `bytes`, skipping malformed sequences instead of substituting U+FFFD.
fn decode_ignoring(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder.max_utf8_buffer_length_without_replacement(bytes.len())?;
    let mut out = String::with_capacity(capacity);
    let mut input = bytes;

    loop {
        let (result, read) = decoder.decode_to_string_without_replacement(input, &mut out, true);
        input = &input[read..];
        match result {
            DecoderResult::InputEmpty => return Some(out),
            DecoderResult::Malformed(_, _) => continue,
            DecoderResult::OutputFull => {
                let more = decoder.max_utf8_buffer_length_without_replacement(input.len())?;
                out.reserve(more.max(1));
            }
        }
    }
}
