#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::{pack, unpack};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(packed) = pack(s) {
            // Whatever parses must survive a round trip
            let text = unpack(&packed);
            assert_eq!(pack(&text).ok(), Some(packed));
        }
    }
});
