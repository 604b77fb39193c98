#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_syntax::content::Content;
use pdf_syntax::ParseOptions;

fuzz_target!(|data: &[u8]| {
    let content = Content::parse(data, ParseOptions::default());
    if let Ok(written) = content.to_bytes() {
        let _ = Content::parse(&written, ParseOptions::default());
    }
});
