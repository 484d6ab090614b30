use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::Cli;
use crate::model::ToolVersions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    // Quoting here is cosmetic; spawning never goes through a shell.
    pub fn render(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|part| {
                let text = part.to_string_lossy();
                if text.is_empty() || text.contains(char::is_whitespace) {
                    format!("\"{text}\"")
                } else {
                    text.into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn run_tool(command: &ToolCommand) -> Result<ExitStatus> {
    info!(command = %command.render(), "running external tool");

    Command::new(command.program())
        .args(command.args())
        .status()
        .with_context(|| format!("failed to execute {}", command.program().display()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub pdftotext: PathBuf,
    pub pdfimages: PathBuf,
    pub tesseract: PathBuf,
    pub ocr_lang: String,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            pdftotext: PathBuf::from("pdftotext"),
            pdfimages: PathBuf::from("pdfimages"),
            tesseract: PathBuf::from("tesseract"),
            ocr_lang: "eng".to_string(),
        }
    }
}

impl Toolchain {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            pdftotext: cli.pdftotext_program.clone(),
            pdfimages: cli.pdfimages_program.clone(),
            tesseract: cli.tesseract_program.clone(),
            ocr_lang: cli.ocr_lang.clone(),
        }
    }

    pub fn text_layer_command(&self, pdf_path: &Path, text_path: &Path) -> ToolCommand {
        ToolCommand::new(&self.pdftotext)
            .arg("-layout")
            .arg(pdf_path)
            .arg(text_path)
    }

    pub fn image_command(&self, pdf_path: &Path, image_root: &Path) -> ToolCommand {
        ToolCommand::new(&self.pdfimages)
            .arg("-png")
            .arg(pdf_path)
            .arg(image_root)
    }

    // tesseract appends `.txt` to `ocr_base` itself.
    pub fn ocr_command(&self, image_path: &Path, ocr_base: &Path) -> ToolCommand {
        ToolCommand::new(&self.tesseract)
            .arg(image_path)
            .arg(ocr_base)
            .arg("-l")
            .arg(&self.ocr_lang)
    }

    pub fn versions(&self) -> ToolVersions {
        ToolVersions {
            pdftotext: query_version(&ToolCommand::new(&self.pdftotext).arg("-v")),
            pdfimages: query_version(&ToolCommand::new(&self.pdfimages).arg("-v")),
            tesseract: query_version(&ToolCommand::new(&self.tesseract).arg("--version")),
        }
    }
}

// Poppler prints its version banner on stderr, tesseract on stdout.
fn query_version(command: &ToolCommand) -> Option<String> {
    let output = Command::new(command.program())
        .args(command.args())
        .output()
        .ok()?;

    [output.stdout.as_slice(), output.stderr.as_slice()]
        .into_iter()
        .map(String::from_utf8_lossy)
        .find_map(|banner| {
            banner
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .map(str::to_string)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(command: &ToolCommand) -> Vec<String> {
        command
            .args()
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn default_toolchain_builds_poppler_and_tesseract_invocations() {
        let tools = Toolchain::default();

        let text = tools.text_layer_command(Path::new("in.pdf"), Path::new("out.txt.pdftxt"));
        assert_eq!(text.program(), Path::new("pdftotext"));
        assert_eq!(args_of(&text), vec!["-layout", "in.pdf", "out.txt.pdftxt"]);

        let images = tools.image_command(Path::new("in.pdf"), Path::new("imgs/page"));
        assert_eq!(images.program(), Path::new("pdfimages"));
        assert_eq!(args_of(&images), vec!["-png", "in.pdf", "imgs/page"]);

        let ocr = tools.ocr_command(Path::new("imgs/page-000.png"), Path::new("imgs/ocr_temp"));
        assert_eq!(ocr.program(), Path::new("tesseract"));
        assert_eq!(
            args_of(&ocr),
            vec!["imgs/page-000.png", "imgs/ocr_temp", "-l", "eng"]
        );
    }

    #[test]
    fn paths_with_spaces_stay_single_arguments() {
        let tools = Toolchain::default();
        let command = tools.text_layer_command(
            Path::new("My Scans/report; final.pdf"),
            Path::new("out dir/a.txt.pdftxt"),
        );

        assert_eq!(command.args().len(), 3);
        assert_eq!(
            args_of(&command)[1],
            "My Scans/report; final.pdf".to_string()
        );
        assert_eq!(
            command.render(),
            "pdftotext -layout \"My Scans/report; final.pdf\" \"out dir/a.txt.pdftxt\""
        );
    }

    #[test]
    fn ocr_language_is_configurable() {
        let tools = Toolchain {
            ocr_lang: "deu+eng".to_string(),
            ..Toolchain::default()
        };
        let command = tools.ocr_command(Path::new("a.png"), Path::new("ocr_temp"));
        assert_eq!(args_of(&command)[3], "deu+eng");
    }

    #[test]
    fn run_tool_reports_missing_program_as_error() {
        let command = ToolCommand::new("pdfocr-definitely-not-installed-tool").arg("x");
        assert!(run_tool(&command).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_returns_child_exit_status() {
        let ok = run_tool(&ToolCommand::new("sh").arg("-c").arg("exit 0")).expect("spawn sh");
        assert!(ok.success());

        let failed = run_tool(&ToolCommand::new("sh").arg("-c").arg("exit 3")).expect("spawn sh");
        assert_eq!(failed.code(), Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn version_query_prefers_stdout_and_falls_back_to_stderr() {
        let stdout_banner = ToolCommand::new("sh")
            .arg("-c")
            .arg("echo 'tesseract 5.3.0'; echo ' leptonica' >&2");
        assert_eq!(
            query_version(&stdout_banner),
            Some("tesseract 5.3.0".to_string())
        );

        let stderr_banner = ToolCommand::new("sh")
            .arg("-c")
            .arg("printf '\\npdftotext version 24.02.0\\n' >&2");
        assert_eq!(
            query_version(&stderr_banner),
            Some("pdftotext version 24.02.0".to_string())
        );
    }

    #[test]
    fn missing_tools_have_no_version() {
        let tools = Toolchain {
            pdftotext: PathBuf::from("pdfocr-missing-pdftotext"),
            pdfimages: PathBuf::from("pdfocr-missing-pdfimages"),
            tesseract: PathBuf::from("pdfocr-missing-tesseract"),
            ocr_lang: "eng".to_string(),
        };
        let versions = tools.versions();
        assert!(versions.pdftotext.is_none());
        assert!(versions.pdfimages.is_none());
        assert!(versions.tesseract.is_none());
    }
}
