//! `treeshell tree` — print the address space.

use treeshell_config::AppConfig;

pub fn run(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let space = config.tree.build_space()?;
    println!("{} ({} nodes)", config.tree.app_id, space.len());

    for node in space.iter() {
        let indent = "  ".repeat(node.address.depth().saturating_sub(1));
        let kind = match &node.handler_id {
            Some(handler) => format!("[{handler}]"),
            None => "[menu]".to_string(),
        };
        println!("{indent}{:<10} {:<22} {kind}", node.address.to_string(), node.label);
        if !node.arg_schema.is_empty() {
            let args: Vec<String> = node
                .arg_schema
                .iter()
                .map(|(name, ty)| format!("{name}: {ty}"))
                .collect();
            println!("{indent}{:<10} args: {}", "", args.join(", "));
        }
    }

    Ok(())
}
