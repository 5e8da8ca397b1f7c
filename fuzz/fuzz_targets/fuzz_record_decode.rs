// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for decoding stored record bytes

#![no_main]

use accountdb_storage::codec::{decode, encode};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail cleanly, never panic.
    if let Ok(user) = decode(data) {
        // Anything that decodes must survive a re-encode unchanged.
        let bytes = encode(&user).expect("decoded user re-encodes");
        assert_eq!(decode(&bytes).expect("re-encoded user decodes"), user);
    }
});
