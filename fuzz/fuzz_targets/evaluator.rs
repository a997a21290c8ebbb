#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use jpq_lang::{Engine, NoVars, Value, Wrapper};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Step {
    Key(String),
    AnyKey,
    AnyArray,
    Index(i8, Option<i8>),
    Descendants(Option<u8>, Option<u8>),
    Method(u8),
    Filter(Vec<Step>, u8, i16),
    Raw(String),
}

const METHODS: [&str; 10] = [
    "type", "size", "abs", "floor", "ceiling", "double", "datetime", "keyvalue", "min", "max",
];
const COMPARISONS: [&str; 6] = ["==", "!=", "<", "<=", ">", ">="];

impl Step {
    fn to_path(&self) -> String {
        match self {
            Step::Key(key) => format!(".{key:?}"),
            Step::AnyKey => ".*".to_string(),
            Step::AnyArray => "[*]".to_string(),
            Step::Index(from, None) => format!("[{from}]"),
            Step::Index(from, Some(to)) => format!("[{from} to {to}]"),
            Step::Descendants(first, last) => {
                let bound = |b: &Option<u8>| b.map(|b| b.to_string()).unwrap_or_default();
                format!(".**{{{},{}}}", bound(first), bound(last))
            }
            Step::Method(i) => format!(".{}()", METHODS[*i as usize % METHODS.len()]),
            Step::Filter(steps, op, value) => format!(
                " ? (@{} {} {})",
                steps.iter().map(Step::to_path).join(""),
                COMPARISONS[*op as usize % COMPARISONS.len()],
                value
            ),
            Step::Raw(raw) => raw.clone(),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    strict: bool,
    steps: Vec<Step>,
    document: String,
}

fuzz_target!(|context: Context| {
    let path = format!(
        "{}${}",
        if context.strict { "strict " } else { "" },
        context.steps.iter().map(Step::to_path).join("")
    );
    let Ok(path) = jpq_lang::compile(&path) else {
        return;
    };
    let doc = context
        .document
        .parse::<Value>()
        .unwrap_or_else(|_| Value::from(context.document.clone()));

    let engine = Engine::default();
    let exists = engine.exists(&path, &doc, &NoVars);
    let found = engine.query_all(&path, &doc, &NoVars);
    if let Ok(found) = &found {
        assert_eq!(exists.ok(), Some(!found.is_empty()));
    }
    let _ = engine.query_wrapped(&path, &doc, Wrapper::Conditional, &NoVars);
    let _ = engine.value(&path, &doc, &NoVars);

    let reparsed = jpq_lang::compile(&path.to_string()).expect("printed path must compile");
    assert_eq!(reparsed.as_bytes(), path.as_bytes());
});
