use log::{LevelFilter, Log, Metadata, Record};
use std::env;
use std::fs;
use std::process;

/// Writes every record to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn usage() -> ! {
    eprintln!("Usage: engrave [--no-combine] [--verbose] <input.yaml> [output.yaml]");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut combine = true;
    let mut verbose = false;
    let mut paths = Vec::new();

    // Parse flags
    for arg in &args {
        match arg.as_str() {
            "--no-combine" => combine = false,
            "--verbose" => verbose = true,
            flag if flag.starts_with("--") => {
                eprintln!("Unknown option '{}'", flag);
                usage();
            }
            path => paths.push(path),
        }
    }
    let (input_path, output_path) = match paths.as_slice() {
        [input] => (*input, None),
        [input, output] => (*input, Some(*output)),
        _ => usage(),
    };

    if verbose && log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }

    // Read input file
    let source = match fs::read_to_string(input_path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", input_path, e);
            process::exit(1);
        }
    };

    // Compile
    let report = engrave::parse(&source).and_then(|mut score| {
        engrave::validate(&score)?;
        score.metadata.options.combine = combine;
        engrave::to_yaml(&engrave::process(score)?)
    });

    let yaml = match report {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            process::exit(1);
        }
    };

    // Output
    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(path, &yaml) {
                eprintln!("Error writing to '{}': {}", path, e);
                process::exit(1);
            }
            eprintln!("Wrote report to {}", path);
        }
        None => {
            print!("{}", yaml);
        }
    }
}
