//! Block graph client core: a mirror of an authority-owned graph of code,
//! layer, variable and visual blocks, plus the evaluation result cache.

pub mod authority;
pub mod cache;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod session;
pub mod store;
pub mod tensor;
pub mod util;

use std::fs;

use crate::authority::RecordingAuthority;
use crate::protocol::Snapshot;
use crate::store::GraphStore;
use crate::util::timing::{ScopedTimer, measure_debug};

pub use crate::authority::AuthorityClient;
pub use crate::cache::ResultCache;
pub use crate::config::SessionConfig;
pub use crate::error::GraphError;
pub use crate::session::{ConnectionStatus, FetchStatus, Session};
pub use crate::tensor::Tensor;

const USAGE: &str = "usage: blockgraph-cli <inspect <snapshot.json> | decode <tensor.bin>>";

/// Entry point of `blockgraph-cli`. `args[0]` is the program name.
pub fn run(args: Vec<String>) -> Result<(), GraphError> {
    match (args.get(1).map(String::as_str), args.get(2)) {
        (Some("inspect"), Some(path)) => inspect(path),
        (Some("decode"), Some(path)) => decode(path),
        _ => Err(GraphError::InvalidArgument(USAGE.to_string())),
    }
}

fn inspect(path: &str) -> Result<(), GraphError> {
    let _timer = ScopedTimer::info(format!("inspect {}", path));
    let snapshot = Snapshot::from_json(&fs::read_to_string(path)?)?;
    let mut session = Session::new(RecordingAuthority::new(), SessionConfig::default());
    let report = session.on_snapshot(&snapshot);
    print!("{}", describe(session.store()));
    println!(
        "{} blocks, {} links, {} links skipped, {} variables",
        report.blocks,
        report.links,
        report.skipped_links,
        session.variables().len()
    );
    Ok(())
}

fn describe(store: &GraphStore) -> String {
    let mut out = String::new();
    for block in store.blocks() {
        let pos = block.position();
        out.push_str(&format!("{} @ ({}, {})\n", block.name, pos.x, pos.y));
        for port in block.ports() {
            out.push_str(&format!(
                "  {} {} [{}] links={}\n",
                port.direction,
                port.name(),
                port.id,
                port.links().len()
            ));
        }
    }
    let mut links: Vec<_> = store.links().collect();
    links.sort_by(|a, b| a.id.cmp(&b.id));
    for link in links {
        let ends: Vec<String> = link.ends().map(|e| e.to_string()).collect();
        out.push_str(&format!(
            "link {} {}{}{}\n",
            link.id,
            ends.join(" -> "),
            if link.is_implicit() { " (implicit)" } else { "" },
            if link.labels().is_empty() {
                String::new()
            } else {
                format!(" [{}]", link.labels().join(", "))
            }
        ));
    }
    out
}

fn decode(path: &str) -> Result<(), GraphError> {
    let bytes = fs::read(path)?;
    let tensor = measure_debug("decode tensor", || Tensor::decode(&bytes))?;
    println!("shape {}", tensor.shape_label());
    println!("{}", serde_json::to_string_pretty(&tensor.to_nested())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{BlockRecord, LinkRecord};

    #[test]
    fn test_usage_error() {
        let err = run(vec!["blockgraph-cli".to_string()]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidArgument(_)));
    }

    #[test]
    fn test_describe_lists_links() {
        let mut store = GraphStore::default();
        store.load_snapshot(&Snapshot {
            blocks: vec![
                BlockRecord::code("a", "y = 1", &[], &["y"]),
                BlockRecord::code("b", "z = x", &["x"], &[]),
            ],
            links: vec![LinkRecord::new("l1", ("a", "y"), ("b", "x")).implicit()],
            ..Snapshot::default()
        });
        let text = describe(&store);
        assert!(text.contains("code - a @ (0, 0)"));
        assert!(text.contains("link l1 a.y -> b.x (implicit)"));
    }
}
