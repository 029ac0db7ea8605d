use acr_explorer::tree::{Expander, RootNode, TreeNode};
use anyhow::{bail, Result};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Attribute, Cell, Table};
use std::sync::Arc;

/// Print the tree depth-first, expanding at most `depth` levels below the root
pub async fn print_tree(root: &Arc<RootNode>, depth: usize) -> Result<()> {
    let expander = Expander::new();
    let mut stack = vec![(TreeNode::Root(root.clone()), 0usize)];

    while let Some((node, level)) = stack.pop() {
        println!("{}{}", "  ".repeat(level), node.label());
        if level >= depth || node.is_leaf() {
            continue;
        }

        let children = expander.expand(&node).await?;
        for child in children.into_iter().rev() {
            stack.push((child, level + 1));
        }
    }

    Ok(())
}

/// Print the children at `registry[/repository]` as a table
pub async fn list_children(root: &Arc<RootNode>, path: Option<&str>) -> Result<()> {
    let expander = Expander::new();
    let mut node = TreeNode::Root(root.clone());

    let segments: Vec<&str> = path
        .map(|p| p.trim_matches('/').splitn(2, '/').collect())
        .unwrap_or_default();
    for segment in segments.into_iter().filter(|s| !s.is_empty()) {
        let children = expander.expand(&node).await?;
        node = match children.into_iter().find(|child| child.label() == segment) {
            Some(child) => child,
            None => bail!("'{}' not found under '{}'", segment, node.label()),
        };
    }

    if node.is_leaf() {
        bail!("'{}' has no children", node.label());
    }

    let children = expander.expand(&node).await?;
    if children.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("NAME").add_attribute(Attribute::Bold),
            Cell::new("KIND").add_attribute(Attribute::Bold),
            Cell::new("REFERENCE").add_attribute(Attribute::Bold),
        ]);

    for child in &children {
        let (kind, reference) = match child {
            TreeNode::Registry(registry) => ("registry", registry.login_server().to_string()),
            TreeNode::Repository(repository) => (
                "repository",
                format!("{}/{}", repository.server_url(), repository.name()),
            ),
            TreeNode::Image(image) => ("image", image.image_reference()),
            TreeNode::Error(_) => ("error", "-".to_string()),
            TreeNode::Root(_) | TreeNode::NotSignedIn(_) | TreeNode::Loading(_) => {
                ("status", "-".to_string())
            }
        };
        table.add_row(vec![
            Cell::new(child.label()),
            Cell::new(kind),
            Cell::new(reference),
        ]);
    }

    println!("{}", table);
    Ok(())
}
