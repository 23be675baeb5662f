#![no_main]
use libfuzzer_sys::fuzz_target;
use mmdb_reader::DataDecoder;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the pointer base, the rest is the data section
    let base = data[0] as usize;
    let section = &data[1..];
    let decoder = DataDecoder::new(section, base.min(section.len()));

    let mut offset = 0;
    while offset < section.len() {
        match decoder.decode(offset) {
            Ok(decoded) if decoded.next_offset > offset => {
                let _ = serde_json::to_string(&decoded.value);
                offset = decoded.next_offset;
            }
            _ => break,
        }
    }
});
