//! Watermark a single image, then read the payload back.
//!
//! Usage:
//! ```sh
//! cargo run --example embed_one -- input.jpg output.jpg "my payload"
//! ```

use std::env;
use std::process;

use qr_watermark::{DecodeOptions, Decoder, EmbedOptions, Embedder};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <input> <output> <payload>", args[0]);
        process::exit(1);
    }

    let (input, output, payload) = (&args[1], &args[2], &args[3]);

    let embedder = Embedder::new(EmbedOptions::default()).expect("default options are valid");
    let result = embedder.embed_file(input.as_ref(), output.as_ref(), payload);
    if !result.success {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
    println!("Done: {}", result.message);

    let decoder = Decoder::new(DecodeOptions::default()).expect("default options are valid");
    let decoded = decoder.decode_file(output.as_ref());
    if decoded.found() {
        println!("Read back: {}", decoded.payloads.join(", "));
    } else {
        println!("Read back: nothing ({:?})", decoded.status);
    }
}
