use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};

use qr_watermark::{
    default_output_path, DecodeOptions, DecodeResult, DecodeStatus, Decoder, EcLevel,
    EmbedOptions, EmbedResult, Embedder,
};

#[derive(Parser)]
#[command(
    name = "qr-watermark",
    about = "Embed and recover per-image QR-code watermarks",
    version,
    after_help = "Typical use:\n  qr-watermark embed frames -j 8 --box-ratio 40\n  \
                  qr-watermark decode frames_add_qrcode -j 8"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Add a QR watermark to an image or every image in a directory
    Embed(EmbedArgs),
    /// Read QR watermarks back from an image or every image in a directory
    Decode(DecodeArgs),
}

#[derive(Args)]
struct EmbedArgs {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: {name}_qr.jpg, or {dir}_add_qrcode)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Payload for single-file input (directories derive one per image)
    #[arg(short, long)]
    payload: Option<String>,

    /// Mark side is image width divided by this (smaller = larger mark)
    #[arg(long, default_value = "50")]
    box_ratio: u32,

    /// Gap between the mark and the image edges, in pixels
    #[arg(long, default_value = "5")]
    margin: u32,

    /// QR error-correction level (L, M, Q, H)
    #[arg(long, default_value = "L")]
    ec_level: EcLevel,

    /// Rendered pixels per QR module before resizing
    #[arg(long, default_value = "10")]
    module_size: u32,

    /// Quiet-zone width in modules
    #[arg(long, default_value = "1")]
    border: u32,

    /// QR version (minimum unless --no-fit)
    #[arg(long = "qr-version", default_value = "2")]
    qr_version: i16,

    /// Fail instead of growing the QR version for long payloads
    #[arg(long)]
    no_fit: bool,

    /// Number of worker threads
    #[arg(short = 'j', long, default_value = "1")]
    workers: usize,
}

#[derive(Args)]
struct DecodeArgs {
    /// Input image file or directory
    input: PathBuf,

    /// Fraction of width and height scanned from the bottom-right corner
    #[arg(long, default_value = "0.1")]
    region_fraction: f32,

    /// Upscaling factor applied to the region before decoding
    #[arg(long, default_value = "15")]
    scale_factor: f32,

    /// Number of worker threads
    #[arg(short = 'j', long, default_value = "1")]
    workers: usize,

    /// Box ratio used at embed time; enables region coverage checks
    #[arg(long)]
    box_ratio: Option<u32>,

    /// Margin used at embed time (with --box-ratio)
    #[arg(long, default_value = "5")]
    margin: u32,

    /// Print results as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let failed = match cli.command {
        Command::Embed(args) => run_embed(args, cli.quiet),
        Command::Decode(args) => run_decode(args, cli.quiet),
    };

    if failed {
        process::exit(1);
    }
}

fn ensure_exists(path: &Path) {
    if !path.exists() {
        eprintln!("Error: Input path does not exist: {}", path.display());
        process::exit(1);
    }
}

fn progress_printer(quiet: bool) -> impl Fn(usize, usize) + Sync {
    move |done, total| {
        if !quiet && (done == total || done % 50 == 0) {
            eprintln!("  [{done}/{total}]");
        }
    }
}

fn run_embed(args: EmbedArgs, quiet: bool) -> bool {
    ensure_exists(&args.input);

    let opts = EmbedOptions {
        box_ratio: args.box_ratio,
        margin: args.margin,
        ec_level: args.ec_level,
        module_size: args.module_size,
        border: args.border,
        version: args.qr_version,
        fit: !args.no_fit,
        workers: args.workers,
    };

    let embedder = match Embedder::new(opts) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let results = if args.input.is_dir() {
        let output_dir = args.output.unwrap_or_else(|| {
            let mut name = args.input.as_os_str().to_os_string();
            name.push("_add_qrcode");
            PathBuf::from(name)
        });
        let progress = progress_printer(quiet);
        match embedder.embed_directory(&args.input, &output_dir, Some(&progress)) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Fatal: {e}");
                process::exit(1);
            }
        }
    } else {
        let Some(payload) = args.payload else {
            eprintln!("Error: --payload is required for single-file input");
            eprintln!("Usage: qr-watermark embed <image> --payload <text> [-o <output>]");
            process::exit(1);
        };
        let output = args
            .output
            .unwrap_or_else(|| default_output_path(&args.input));
        vec![embedder.embed_file(&args.input, &output, &payload)]
    };

    let mut fail_count = 0u32;
    for r in &results {
        print_embed_result(r, quiet);
        if !r.success {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Embedded: {}", results.len() - fail_count as usize);
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    fail_count > 0
}

fn run_decode(args: DecodeArgs, quiet: bool) -> bool {
    ensure_exists(&args.input);

    let opts = DecodeOptions {
        region_fraction: args.region_fraction,
        scale_factor: args.scale_factor,
        workers: args.workers,
        expected_mark: args.box_ratio.map(|box_ratio| EmbedOptions {
            box_ratio,
            margin: args.margin,
            ..EmbedOptions::default()
        }),
    };

    let decoder = match Decoder::new(opts) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let results = if args.input.is_dir() {
        let progress = progress_printer(quiet || args.json);
        match decoder.decode_directory(&args.input, Some(&progress)) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("Fatal: {e}");
                process::exit(1);
            }
        }
    } else {
        vec![decoder.decode_file(&args.input)]
    };

    if args.json {
        match serde_json::to_string_pretty(&results) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: failed to serialize results: {e}");
                return true;
            }
        }
    } else {
        for r in &results {
            print_decode_result(r, quiet);
        }
    }

    let found = results.iter().filter(|r| r.found()).count();
    let unreadable = results
        .iter()
        .filter(|r| matches!(r.status, DecodeStatus::Unreadable(_)))
        .count();

    if results.len() > 1 && !quiet {
        eprintln!();
        eprint!("[Summary] Found: {found}");
        let missing = results.len() - found - unreadable;
        if missing > 0 {
            eprint!(", Not detected: {missing}");
        }
        if unreadable > 0 {
            eprint!(", Unreadable: {unreadable}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    unreadable > 0
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn print_embed_result(result: &EmbedResult, quiet: bool) {
    let filename = display_name(&result.path);
    if result.success {
        if !quiet {
            eprintln!("[OK] {filename} -> {}", result.output.display());
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }
}

fn print_decode_result(result: &DecodeResult, quiet: bool) {
    let filename = display_name(&result.path);
    match &result.status {
        DecodeStatus::Found => {
            if !quiet {
                println!("{filename}\t{}", result.payloads.join("\t"));
            }
        }
        DecodeStatus::NotDetected => {
            if !quiet {
                eprintln!("[MISS] {filename}: no watermark detected");
            }
        }
        DecodeStatus::Unreadable(reason) => {
            eprintln!("[FAIL] {filename}: {reason}");
        }
    }
}
