use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "pdfocr",
    version,
    about = "Extract the text layer and OCR the embedded images of a PDF into one text file"
)]
pub struct Cli {
    /// PDF to extract from.
    pub input_pdf: PathBuf,

    /// Text file to create; overwritten on every run.
    pub output_txt: PathBuf,

    /// Scratch directory for extracted page images; removed when empty.
    pub image_dir: PathBuf,

    #[arg(long, default_value = "eng")]
    pub ocr_lang: String,

    #[arg(long = "pdftotext", default_value = "pdftotext")]
    pub pdftotext_program: PathBuf,

    #[arg(long = "pdfimages", default_value = "pdfimages")]
    pub pdfimages_program: PathBuf,

    #[arg(long = "tesseract", default_value = "tesseract")]
    pub tesseract_program: PathBuf,

    /// Write a JSON summary of the run to this path.
    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
