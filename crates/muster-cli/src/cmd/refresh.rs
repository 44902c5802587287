use muster_core::cache::InventoryCache;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let cache = InventoryCache::for_project(root);
    if cache.exists() {
        cache.invalidate()?;
        println!("inventory cache cleared; next command re-resolves");
    } else {
        println!("no inventory cache present");
    }
    Ok(())
}
