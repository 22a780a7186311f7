use clap::Parser;
use glob::glob;
use ilbm::{Cursor, IlbmImage, PixelData, Renderer};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(name = "ilbm")]
struct Cli {
    #[arg(required = true)]
    path: String,

    #[arg(short = 'o', long = "output-dir", help = "Output directory for converted files")]
    output_dir: Option<String>,

    #[arg(long, help = "Print image metadata instead of converting")]
    info: bool,

    #[arg(
        long,
        default_value_t = 1,
        help = "Number of animation frames to render for color cycled images"
    )]
    frames: u32,

    #[arg(long, default_value_t = 60.0, help = "Frame rate used to time animation frames")]
    fps: f64,

    #[arg(long, help = "Blend between color cycling steps")]
    blend: bool,

    #[arg(long, help = "Decode the image without writing to a file")]
    void: bool,
}

fn get_files(path: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let absolute_pattern = if Path::new(path).is_relative() {
        base_dir.join(path).to_string_lossy().into_owned()
    } else {
        path.to_string()
    };

    for entry in glob(&absolute_pattern).expect("Failed to read glob pattern") {
        match entry {
            Ok(path) => {
                if !path.is_file() {
                    continue;
                }

                files.push(path);
            }
            Err(e) => println!("{:?}", e),
        }
    }

    files
}

fn get_output_path(
    file: &Path,
    output_dir: Option<&str>,
    frame_index: Option<u32>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let file_stem = file
        .file_stem()
        .ok_or("Invalid file name")?
        .to_str()
        .ok_or("Invalid file stem")?;

    let file_name = match frame_index {
        Some(index) => format!("{}_{:03}.png", file_stem, index),
        None => format!("{}.png", file_stem),
    };

    let output_path = if let Some(dir) = output_dir {
        let output_dir = Path::new(dir);

        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let output_dir = if output_dir.is_relative() {
            std::env::current_dir()?.join(output_dir)
        } else {
            output_dir.to_path_buf()
        };

        output_dir.join(file_name)
    } else {
        file.parent().unwrap_or_else(|| Path::new(".")).join(file_name)
    };

    Ok(output_path)
}

fn write_png(path: &Path, frame: &ilbm::ImageFrame) -> Result<(), Box<dyn std::error::Error>> {
    match frame.pixels() {
        PixelData::RGB8(pixels) => {
            image::RgbImage::from_raw(frame.width(), frame.height(), pixels.clone())
                .ok_or("Frame size does not match its pixel data")?
                .save(path)?;
        }
        PixelData::RGBA8(pixels) => {
            image::RgbaImage::from_raw(frame.width(), frame.height(), pixels.clone())
                .ok_or("Frame size does not match its pixel data")?
                .save(path)?;
        }
    }

    Ok(())
}

fn process_file(file: &Path, cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("File: {}", file.display());

    let data = fs::read(file)?;

    if cli.info {
        let info = ilbm::info(&data)?;
        println!("{:#?}", info);
        return Ok(());
    }

    let mut reader = Cursor::new(&data);
    let parsed = IlbmImage::read(&mut reader)?;
    let renderer = Renderer::new(&parsed);

    if cli.void {
        let _ = renderer.render_frame(0.0, cli.blend, 0);
        return Ok(());
    }

    let num_frames = if renderer.is_animated() { cli.frames.max(1) } else { 1 };
    let delay = (1000.0 / cli.fps) as u32;

    for index in 0..num_frames {
        let now = f64::from(index) / cli.fps;
        let frame = renderer.render_frame(now, cli.blend, delay);

        let frame_index = if num_frames > 1 { Some(index) } else { None };
        let output_path = get_output_path(file, cli.output_dir.as_deref(), frame_index)?;

        println!("Writing to: {}", output_path.display());
        write_png(&output_path, &frame)?;
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let files = get_files(&cli.path);

    if files.is_empty() {
        eprintln!("No files found matching pattern: {}", cli.path);
        return Ok(());
    }

    for file in files {
        if let Err(err) = process_file(&file, &cli) {
            eprintln!("Error processing file: {:?}", err);
            continue;
        }
    }

    Ok(())
}
