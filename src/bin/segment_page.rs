//! Segment a manga page image into panels and print the result as JSON.
//! Run with: cargo run --release --bin segment_page -- <image_path>

use anyhow::{Context, Result};
use manga_panels::{PanelSegmenter, SegmenterConfig};
use std::path::Path;
use tracing::info;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "manga_panels=info".into()),
        )
        .with_target(false)
        .init();

    // Get image path from args
    let args: Vec<String> = std::env::args().collect();
    let image_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "page.png".to_string()
    };

    if !Path::new(&image_path).exists() {
        eprintln!("Image not found: {}", image_path);
        std::process::exit(1);
    }

    info!("Loading image: {}", image_path);
    let bytes =
        std::fs::read(&image_path).with_context(|| format!("failed to read {image_path}"))?;

    let config = SegmenterConfig::from_env().context("invalid configuration")?;
    let segmenter = PanelSegmenter::new(config);
    let result = segmenter.segment_bytes(&bytes)?;

    println!("{}", serde_json::to_string_pretty(&result)?);

    eprintln!("\n=== Summary ===");
    eprintln!(
        "Page: {}x{}, panels: {}",
        result.original_image.width, result.original_image.height, result.total_panels
    );
    if result.panels.is_empty() {
        eprintln!("  (no panels detected; caller should fall back to the whole page)");
    }
    for panel in &result.panels {
        let b = &panel.bounding_box;
        eprintln!(
            "  {}. {} at ({}, {}) {}x{}",
            panel.reading_order_index + 1,
            panel.id,
            b.x,
            b.y,
            b.width,
            b.height
        );
    }

    Ok(())
}
