//! Fuzz target for flattening and splitting per-object arrays.

#![no_main]

use arbitrary::Arbitrary;
use ibp_core::sequence::SequenceIndex;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    lengths: Vec<u8>,
    per_object: Vec<Vec<u16>>,
    flat: Vec<u16>,
}

fuzz_target!(|input: Input| {
    let lengths: Vec<usize> = input.lengths.iter().map(|&l| usize::from(l)).collect();
    let index = SequenceIndex::from_lengths(lengths);

    if let Ok(flat) = index.flatten("fuzz", &input.per_object) {
        let split = index.split("fuzz", &flat).expect("split of a flattened array");
        assert_eq!(split, input.per_object);
    }
    let _ = index.split("fuzz", &input.flat);
});
