use anyhow::Result;
use clap::Parser;

use routes_to_svg::{export_geojson, render_svg, Scene};

#[derive(Parser)]
struct Args {
    /// Path to a JSON file with `rows`, and optionally `config` and `legend`
    #[arg(long)]
    input: String,

    /// Output file to write
    #[arg(long, default_value = "routes.svg")]
    output: String,

    #[arg(long, default_value_t = 800.0)]
    width: f64,

    #[arg(long, default_value_t = 600.0)]
    height: f64,

    /// Write the routes as GeoJSON instead of drawing them
    #[clap(long)]
    geojson: bool,
}

fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    let args = Args::parse();
    let scene = Scene::parse(&std::fs::read_to_string(&args.input)?)?;
    let output = if args.geojson {
        export_geojson(scene)?
    } else {
        render_svg(scene, args.width, args.height)?
    };
    std::fs::write(&args.output, output)?;
    Ok(())
}
