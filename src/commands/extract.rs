use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::model::{ExtractionPaths, ExtractionReport, ExtractionSummary};
use crate::tools::{ToolCommand, Toolchain, run_tool};
use crate::util::{
    ensure_directory, now_utc_string, path_with_suffix, sha256_file, write_json_pretty,
};


const REPORT_VERSION: u32 = 1;
const TEXT_LAYER_SUFFIX: &str = ".pdftxt";
const IMAGE_ROOT_NAME: &str = "page";
const OCR_BASE_NAME: &str = "ocr_temp";
const OCR_TEXT_SUFFIX: &str = ".txt";
const CHUNK_SEPARATOR: &[u8] = b"\n\n";

pub fn run(cli: Cli) -> Result<()> {
    let started_at = now_utc_string();
    let tools = Toolchain::from_cli(&cli);

    info!(
        input = %cli.input_pdf.display(),
        output = %cli.output_txt.display(),
        image_dir = %cli.image_dir.display(),
        "starting extraction"
    );

    let summary =
        extract_pdf_text_and_images(&tools, &cli.input_pdf, &cli.output_txt, &cli.image_dir)?;

    info!(
        text_layer_copied = summary.counts.text_layer_copied,
        images = summary.counts.images_found,
        ocr_blocks = summary.counts.ocr_blocks_appended,
        ocr_failures = summary.counts.ocr_failures,
        warnings = summary.warnings.len(),
        "extraction completed"
    );

    if let Some(report_path) = &cli.report_path {
        let report = build_report(&cli, &tools, started_at, summary);
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote extraction report");
    }

    Ok(())
}

pub fn extract_pdf_text_and_images(
    tools: &Toolchain,
    pdf_path: &Path,
    output_path: &Path,
    image_dir: &Path,
) -> Result<ExtractionSummary> {
    let mut summary = ExtractionSummary::default();
    let scratch = ScratchPaths::new(output_path, image_dir);

    if let Err(err) = ensure_directory(image_dir) {
        let reason = format!("{err:#}");
        warn!(reason = %reason, "continuing without image directory");
        summary
            .warnings
            .push(format!("image directory unavailable: {reason}"));
    }

    if let Err(reason) = invoke(&tools.text_layer_command(pdf_path, &scratch.text_layer)) {
        error!(reason = %reason, "error extracting text layer");
        summary
            .warnings
            .push(format!("text layer extraction failed: {reason}"));
    }

    if let Err(reason) = invoke(&tools.image_command(pdf_path, &scratch.image_root)) {
        error!(reason = %reason, "error extracting images");
        summary
            .warnings
            .push(format!("image extraction failed: {reason}"));
    }

    let output = match OutputText::create(output_path) {
        Ok(output) => output,
        Err(err) => {
            error!(path = %output_path.display(), "could not open output file");
            scratch.discard();
            return Err(err);
        }
    };

    // A failed write aborts the run, but scratch files must not survive into
    // the next one.
    if let Err(err) = stitch_output(tools, output, &scratch, &mut summary) {
        error!(path = %output_path.display(), "could not write output file");
        scratch.discard();
        return Err(err);
    }

    summary.image_dir_removed = match fs::remove_dir(&scratch.image_dir) {
        Ok(()) => true,
        Err(err) => {
            debug!(path = %image_dir.display(), error = %err, "image directory left in place");
            false
        }
    };

    Ok(summary)
}

fn stitch_output(
    tools: &Toolchain,
    mut output: OutputText,
    scratch: &ScratchPaths,
    summary: &mut ExtractionSummary,
) -> Result<()> {
    if let Some(text) = take_temp_text(&scratch.text_layer, &mut summary.warnings) {
        output.append(&text, false)?;
        summary.counts.text_layer_copied = true;
        summary.counts.text_layer_bytes = text.len() as u64;
    }

    let images = list_page_images(&scratch.image_dir).unwrap_or_else(|err| {
        let reason = format!("{err:#}");
        warn!(reason = %reason, "no images to OCR");
        Vec::new()
    });
    summary.counts.images_found = images.len();

    for image_path in &images {
        let appended = match invoke(&tools.ocr_command(image_path, &scratch.ocr_base)) {
            Ok(()) => match take_temp_text(&scratch.ocr_text, &mut summary.warnings) {
                Some(text) => output.append(&text, true).map(|()| true),
                None => {
                    debug!(image = %image_path.display(), "OCR produced no text file");
                    Ok(false)
                }
            },
            Err(reason) => {
                warn!(image = %image_path.display(), reason = %reason, "OCR failed");
                summary.counts.ocr_failures += 1;
                summary.warnings.push(format!(
                    "OCR failed for {}: {reason}",
                    image_path.display()
                ));
                let _ = fs::remove_file(&scratch.ocr_text);
                Ok(false)
            }
        };

        match fs::remove_file(image_path) {
            Ok(()) => summary.counts.images_removed += 1,
            Err(err) => {
                warn!(image = %image_path.display(), error = %err, "could not remove image");
                summary.warnings.push(format!(
                    "could not remove {}: {err}",
                    image_path.display()
                ));
            }
        }

        if appended? {
            summary.counts.ocr_blocks_appended += 1;
        }
    }

    output.finish()
}

struct ScratchPaths {
    text_layer: PathBuf,
    image_dir: PathBuf,
    image_root: PathBuf,
    ocr_base: PathBuf,
    ocr_text: PathBuf,
}

impl ScratchPaths {
    fn new(output_path: &Path, image_dir: &Path) -> Self {
        let ocr_base = image_dir.join(OCR_BASE_NAME);
        Self {
            text_layer: path_with_suffix(output_path, TEXT_LAYER_SUFFIX),
            image_dir: image_dir.to_path_buf(),
            image_root: image_dir.join(IMAGE_ROOT_NAME),
            ocr_text: path_with_suffix(&ocr_base, OCR_TEXT_SUFFIX),
            ocr_base,
        }
    }

    fn discard(&self) {
        let _ = fs::remove_file(&self.text_layer);
        let _ = fs::remove_file(&self.ocr_text);
        for image in list_page_images(&self.image_dir).unwrap_or_default() {
            let _ = fs::remove_file(image);
        }
        let _ = fs::remove_dir(&self.image_dir);
    }
}

// Chunks after the first are separated by a blank line.
struct OutputText {
    path: PathBuf,
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl OutputText {
    fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to open output file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            bytes_written: 0,
        })
    }

    fn append(&mut self, chunk: &[u8], separated: bool) -> Result<()> {
        if separated && self.bytes_written > 0 {
            self.write(CHUNK_SEPARATOR)?;
        }
        self.write(chunk)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .with_context(|| format!("failed to write output file: {}", self.path.display()))?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("failed to flush output file: {}", self.path.display()))
    }
}

// Missing file means the tool produced nothing; it is not an error.
fn take_temp_text(path: &Path, warnings: &mut Vec<String>) -> Option<Vec<u8>> {
    let text = match fs::read(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not read temporary text");
            warnings.push(format!("could not read {}: {err}", path.display()));
            return None;
        }
    };

    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove temporary text");
    }

    Some(text)
}

fn invoke(command: &ToolCommand) -> std::result::Result<(), String> {
    match run_tool(command) {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("{} exited with {status}", command.program().display())),
        Err(err) => Err(format!("{err:#}")),
    }
}

fn is_page_image(entry: &fs::DirEntry) -> bool {
    let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
    let has_png_extension = Path::new(&entry.file_name())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    is_file && has_png_extension
}

// Sorted by name: pdfimages zero-pads its numbering, so this is page order.
fn list_page_images(image_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(image_dir)
        .with_context(|| format!("failed to list page images in {}", image_dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry
            .with_context(|| format!("failed to read entry in {}", image_dir.display()))?;
        if is_page_image(&entry) {
            images.push(entry.path());
        }
    }
    images.sort_by_key(|path| path.file_name().map(ToOwned::to_owned));

    Ok(images)
}

fn build_report(
    cli: &Cli,
    tools: &Toolchain,
    started_at: String,
    summary: ExtractionSummary,
) -> ExtractionReport {
    let input_sha256 = match sha256_file(&cli.input_pdf) {
        Ok(digest) => Some(digest),
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(reason = %reason, "input hash unavailable");
            None
        }
    };

    ExtractionReport {
        report_version: REPORT_VERSION,
        status: "completed".to_string(),
        started_at,
        finished_at: now_utc_string(),
        command: render_extract_command(cli),
        paths: ExtractionPaths {
            input_pdf: cli.input_pdf.display().to_string(),
            output_txt: cli.output_txt.display().to_string(),
            image_dir: cli.image_dir.display().to_string(),
        },
        input_sha256,
        tool_versions: tools.versions(),
        counts: summary.counts,
        image_dir_removed: summary.image_dir_removed,
        warnings: summary.warnings,
    }
}

fn render_extract_command(cli: &Cli) -> String {
    let defaults = Toolchain::default();
    let mut command = ToolCommand::new("pdfocr");

    if cli.ocr_lang != defaults.ocr_lang {
        command = command.arg("--ocr-lang").arg(&cli.ocr_lang);
    }
    if cli.pdftotext_program != defaults.pdftotext {
        command = command.arg("--pdftotext").arg(&cli.pdftotext_program);
    }
    if cli.pdfimages_program != defaults.pdfimages {
        command = command.arg("--pdfimages").arg(&cli.pdfimages_program);
    }
    if cli.tesseract_program != defaults.tesseract {
        command = command.arg("--tesseract").arg(&cli.tesseract_program);
    }
    if let Some(path) = &cli.report_path {
        command = command.arg("--report-path").arg(path);
    }

    command
        .arg(&cli.input_pdf)
        .arg(&cli.output_txt)
        .arg(&cli.image_dir)
        .render()
}
