use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdfimages: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionPaths {
    pub input_pdf: String,
    pub output_txt: String,
    pub image_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionCounts {
    pub text_layer_copied: bool,
    pub text_layer_bytes: u64,
    pub images_found: usize,
    pub ocr_blocks_appended: usize,
    pub ocr_failures: usize,
    pub images_removed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionSummary {
    pub counts: ExtractionCounts,
    pub image_dir_removed: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub report_version: u32,
    pub status: String,
    pub started_at: String,
    pub finished_at: String,
    pub command: String,
    pub paths: ExtractionPaths,
    pub input_sha256: Option<String>,
    pub tool_versions: ToolVersions,
    pub counts: ExtractionCounts,
    pub image_dir_removed: bool,
    pub warnings: Vec<String>,
}
