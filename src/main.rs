use std::path::PathBuf;
use clap::Parser;
use color_eyre::Result;
use quadra::app::AppConfig;

/// Draw a spinning textured quad
#[derive(Parser, Debug)]
#[command(name = "quadra")]
#[command(version, about)]
struct Args {
    /// Image to put on the quad. A checkerboard is generated when omitted.
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Initial window width
    #[arg(long, default_value_t = 800)]
    width: u32,

    /// Initial window height
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Frames the CPU may record ahead of the GPU
    #[arg(long, default_value_t = 2)]
    frames_in_flight: usize,

    /// Skip the Khronos validation layer even in debug builds
    #[arg(long)]
    no_validation: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::init();

    let args = Args::parse();

    let mut config = AppConfig {
        width: args.width,
        height: args.height,
        texture_path: args.texture,
        ..AppConfig::default()
    };
    config.render.max_frames_in_flight = args.frames_in_flight.max(1);
    config.render.default_extent.width = args.width;
    config.render.default_extent.height = args.height;
    if args.no_validation {
        config.render.enable_validation = false;
    }

    quadra::app::run(config)
}
