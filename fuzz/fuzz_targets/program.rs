#![no_main]

use jpq_lang::{Engine, JsonPath, NoVars, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|bytes: &[u8]| {
    let Ok(path) = JsonPath::from_bytes(bytes) else {
        return;
    };

    let _ = path.to_string();
    let _ = path.to_ast();

    let doc: Value = r#"{"a": [1, "x", {"b": null}], "c": {"d": true}}"#
        .parse()
        .expect("valid document");
    let _ = Engine::default().query_all(&path, &doc, &NoVars);
});
