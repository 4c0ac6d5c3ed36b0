#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mysql_protocol::AuthResult;

fuzz_target!(|data: &[u8]| {
    let _ = AuthResult::decode(Bytes::copy_from_slice(data));
});
