#![no_main]

use libfuzzer_sys::fuzz_target;
use mysql_codec::decode_greeting;

fuzz_target!(|data: &[u8]| {
    let Ok(rt) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };

    let mut reader = data;
    if let Ok(greeting) = rt.block_on(decode_greeting(&mut reader)) {
        // Anything that decodes must re-encode
        let _ = greeting.encode_to_bytes();
        let _ = greeting.challenge();
    }
});
