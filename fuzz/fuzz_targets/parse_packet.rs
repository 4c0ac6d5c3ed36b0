#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use mysql_codec::{MessageAssembler, PacketCodec};
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Frame arbitrary bytes and feed every frame to the assembler
    let mut codec = PacketCodec::new();
    let mut assembler = MessageAssembler::new();
    let mut buf = BytesMut::from(data);

    while let Ok(Some(packet)) = codec.decode(&mut buf) {
        let _ = assembler.push(packet);
    }
});
