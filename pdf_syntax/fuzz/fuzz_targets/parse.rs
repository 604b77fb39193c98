#![no_main]
use libfuzzer_sys::fuzz_target;
use pdf_syntax::object::{collect_references, IndirectObjects};
use pdf_syntax::parser::parse_indirect_object;

fn harness(data: &[u8]) {
    if let Ok(Some((r, value))) = parse_indirect_object(data) {
        let _ = collect_references(&value);
        if let Ok(stream) = value.as_stream() {
            let _ = stream.decoded();
        }
        let mut objects = IndirectObjects::new();
        objects.replace_indirect_object_if_higher_generation(r.id, r.gen, value);
        let _ = objects.clone_indirect_object(r.id, true);
    }
}

fuzz_target!(|data: &[u8]| {
    let _ = harness(data);
});
