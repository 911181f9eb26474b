use crate::output::{print_json, print_table};
use actions_core::handlers::HandlerKind;

pub fn run(json: bool) -> anyhow::Result<()> {
    if json {
        let value: Vec<serde_json::Value> = HandlerKind::all()
            .iter()
            .map(|kind| serde_json::json!({ "handler": kind.as_str(), "operations": kind.operations() }))
            .collect();
        return print_json(&value);
    }

    let rows = HandlerKind::all()
        .iter()
        .flat_map(|kind| {
            kind.operations()
                .iter()
                .map(move |op| vec![kind.as_str().to_string(), op.to_string()])
        })
        .collect();
    print_table(&["HANDLER", "OPERATION"], rows);
    Ok(())
}
