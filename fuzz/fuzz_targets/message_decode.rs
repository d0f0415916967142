//! Fuzz the tag-dispatched frame decoder: arbitrary bytes must never panic
//! or allocate unboundedly, only decode or error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use seqwire_proto::Message;

fuzz_target!(|data: &[u8]| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime");

    runtime.block_on(async {
        let mut reader = data;
        // Decode as many frames as the input holds; stop on the first error.
        while let Ok(msg) = Message::decode(&mut reader).await {
            // Re-encoding what we decoded must be infallible.
            let _ = msg.encode();
        }
    });
});
