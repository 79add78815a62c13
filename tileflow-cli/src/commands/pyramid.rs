//! Pyramid command - print the tiles a view would request.
//!
//! Runs the desired-set computation alone, without loading anything.

use std::path::PathBuf;

use serde::Serialize;
use tileflow::config::LayerConfig;
use tileflow::source::pyramid::target_level;
use tileflow::source::{desired_tiles, PyramidQuery};
use tileflow::tile::zoom::sort_coarse_to_fine;
use tileflow::tile::RectCoord;

use super::common::{load_config, parse_bounds};
use crate::error::CliError;

/// Arguments for the pyramid command.
pub struct PyramidArgs {
    pub config: Option<PathBuf>,
    pub layer: Option<PathBuf>,
    pub bounds: Vec<f64>,
    pub zoom: f64,
    pub t: i32,
    pub json: bool,
}

#[derive(Serialize)]
struct PyramidReport {
    layer: String,
    bounds: RectCoord,
    zoom: f64,
    target_zoom_identifier: Option<i32>,
    tiles: Vec<TileLine>,
}

#[derive(Serialize)]
struct TileLine {
    priority: i32,
    zoom_identifier: i32,
    x: i32,
    y: i32,
    t: i32,
    url: String,
    bounds: RectCoord,
}

/// Run the pyramid command.
pub fn run(args: PyramidArgs) -> Result<(), CliError> {
    let config = load_config(args.config.as_deref(), args.layer.as_deref())?;
    let layer = &config.layer;
    let bounds = parse_bounds(&args.bounds)?;

    let mut levels = layer.zoom_level_infos();
    sort_coarse_to_fine(&mut levels);
    let zoom_info = config.source.resolve_zoom_info(layer.zoom_info());
    let query = PyramidQuery {
        visible_bounds: bounds,
        t: args.t,
        zoom: args.zoom,
        levels: &levels,
        zoom_info: &zoom_info,
        min_zoom_level_identifier: config.source.min_zoom_level_identifier,
        max_zoom_level_identifier: config.source.max_zoom_level_identifier,
    };

    let target = target_level(&query).map(|index| levels[index].zoom_level_identifier);
    let tiles: Vec<TileLine> = desired_tiles(&query)
        .into_iter()
        .map(|prioritized| {
            let tile = prioritized.tile;
            TileLine {
                priority: prioritized.priority,
                zoom_identifier: tile.zoom_identifier,
                x: tile.x,
                y: tile.y,
                t: tile.t,
                url: layer.tile_url(tile.x, tile.y, tile.t, tile.zoom_identifier),
                bounds: tile.bounds,
            }
        })
        .collect();

    let report = PyramidReport {
        layer: layer.layer_name.clone(),
        bounds,
        zoom: args.zoom,
        target_zoom_identifier: target,
        tiles,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Layer:  {}", report.layer);
    println!("Zoom:   {}", report.zoom);
    match report.target_zoom_identifier {
        Some(identifier) => println!("Target: level {}", identifier),
        None => {
            println!("Target: none (view is outside the layer's zoom range)");
            return Ok(());
        }
    }
    println!();
    println!("{:>8}  {:<16}  URL", "PRIORITY", "TILE");
    for line in &report.tiles {
        let tile = format!("{}/{}/{}@{}", line.zoom_identifier, line.x, line.y, line.t);
        println!("{:>8}  {:<16}  {}", line.priority, tile, line.url);
    }
    println!();
    println!("{} tiles", report.tiles.len());
    Ok(())
}
