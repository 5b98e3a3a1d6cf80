//! Fuzz target for Payload::decode
//!
//! This fuzzer tests payload body decoding for every wire code with:
//! - Truncated bodies
//! - Absurd length prefixes and counts
//! - Bit-cursor confusion in packed-boolean sections
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error
//! or an opaque Unknown payload.

#![no_main]

use econet_proto::Payload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&code, body)) = data.split_first() else {
        return;
    };

    // Attempt to decode the body under every possible wire code
    // This should never panic, only return Err for invalid data
    if let Ok(payload) = Payload::decode(code, body) {
        let _ = payload.encode_body();
    }
});
