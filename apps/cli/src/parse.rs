//! 命令行参数解析

use anyhow::{Context, Result, bail};
use slide_control::mock::ContactSurface;

/// 解析逗号分隔的三维向量，例如 `0.1,0,0`
pub fn parse_vec3(text: &str) -> Result<[f64; 3]> {
    let values: Vec<f64> = text
        .split(',')
        .map(|s| s.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid vector '{}'", text))?;

    match values.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => bail!("Expected 3 comma-separated values, got {}", values.len()),
    }
}

/// 解析接触面 `axis:position:stiffness`，例如 `0:0.04:2000`
pub fn parse_surface(text: &str) -> Result<ContactSurface> {
    let parts: Vec<&str> = text.split(':').map(str::trim).collect();
    let [axis, position, stiffness] = parts.as_slice() else {
        bail!("Expected axis:position:stiffness, got '{}'", text);
    };

    let axis: usize = axis.parse().context("Invalid surface axis")?;
    if axis > 2 {
        bail!("Surface axis must be 0, 1 or 2, got {}", axis);
    }
    let position: f64 = position.parse().context("Invalid surface position")?;
    let stiffness: f64 = stiffness.parse().context("Invalid surface stiffness")?;
    if !stiffness.is_finite() || stiffness <= 0.0 {
        bail!("Surface stiffness must be positive");
    }

    Ok(ContactSurface::ahead(axis, position, stiffness))
}
