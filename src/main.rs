use clap::error::ErrorKind;
use clap::Parser;
use pdf2slides::Converter;
use std::path::PathBuf;
use std::process::ExitCode;

const USAGE: &str = "Usage: pdf2slides <input_pdf> <output_pptx>";

/// Convert every page of a PDF into a picture slide of a PPTX deck
#[derive(Parser, Debug)]
#[command(name = "pdf2slides", version, long_about = None)]
struct Cli {
    /// PDF document to convert
    #[arg(value_name = "INPUT_PDF")]
    input: PathBuf,

    /// Presentation file to write
    #[arg(value_name = "OUTPUT_PPTX")]
    output: PathBuf,
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = err.print();
                return ExitCode::SUCCESS;
            }
            _ => {
                log::debug!("Argument error: {}", err);
                println!("{}", USAGE);
                return ExitCode::from(1);
            }
        },
    };

    println!(
        "Converting {} -> {}",
        cli.input.display(),
        cli.output.display()
    );

    match Converter::new().convert(&cli.input, &cli.output) {
        Ok(summary) => {
            log::info!(
                "Wrote {} slides ({} bytes) to {}",
                summary.slide_count,
                summary.bytes_written,
                summary.output.display()
            );
            println!("SUCCESS");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Conversion failed: {}", e);
            println!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}
