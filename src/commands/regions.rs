use tracing::info;

use super::CommandContext;
use crate::models::region::Region;
use crate::services::region_store::format_regions;

/// Print every stored region
pub fn show(context: &CommandContext) -> Result<(), String> {
    let config = context.load_config()?;
    let store = context.region_store(&config);
    let regions = store.load().map_err(|e| e.to_string())?;

    if regions.is_empty() {
        println!("No regions stored in {}", store.path().display());
        return Ok(());
    }

    println!("Regions in {}:", store.path().display());
    print!("{}", format_regions(&regions));
    Ok(())
}

/// Store a region given as position and size
pub fn set(context: &CommandContext, name: &str, region: Region) -> Result<(), String> {
    if !region.is_valid() {
        return Err(format!("Region {} has no area", region));
    }

    let config = context.load_config()?;
    let store = context.region_store(&config);
    store.set(name, region).map_err(|e| e.to_string())?;

    info!("Saved region {} = {} to {}", name, region, store.path().display());
    println!("{}: {}", name.trim(), region);
    Ok(())
}

/// Store a region given as two opposite corners, in either order
pub fn set_from_corners(
    context: &CommandContext,
    name: &str,
    first: (i32, i32),
    second: (i32, i32),
) -> Result<(), String> {
    let region = Region::from_corners(first.0, first.1, second.0, second.1);
    set(context, name, region)
}
