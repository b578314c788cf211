//! Compile fuzz target: parse, resolve, derive settings and pack the SII image in memory.
//! Every stage must return an error instead of panicking on malformed input.
//! Build with: cargo fuzz run compile_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let s = match std::str::from_utf8(data) {
        Ok(x) => x,
        Err(_) => return,
    };
    if let Ok(compiled) = coedsl::compile(s) {
        let mut world = compiled.world;
        if coedsl::settings::derive(&world.dictionary, &mut world.settings).is_ok() {
            let _ = coedsl::sii::build_image(&world.settings);
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run compile_fuzz");
}
