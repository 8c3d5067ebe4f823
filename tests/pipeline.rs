//! Full-pipeline tests with stand-in tools.
//!
//! mmdc, svgexport and pandoc are replaced by small `sh -c` scripts that copy
//! fixture files into place, so the orchestration (rendering, sizing, link
//! rewriting, temp files, formatting, output placement) is tested on any Unix
//! machine without Node or pandoc installed.

#![cfg(unix)]

use md2docx::{
    convert, convert_to_file, ConversionConfig, ConversionProgressCallback, DiagramError,
    ImageSize, Md2DocxError, SizingMethod, Stage, SvgStatus, ToolCommand,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

// ── Fixtures ─────────────────────────────────────────────────────────────────

struct Fixture {
    dir: tempfile::TempDir,
    png: PathBuf,
    docx: PathBuf,
    captured: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let assets = dir.path().join("fixtures");
        std::fs::create_dir_all(&assets).unwrap();

        let png = assets.join("wide.png");
        image::RgbImage::new(1600, 400).save(&png).unwrap();

        let docx = assets.join("pandoc.docx");
        write_minimal_docx(&docx);

        let captured = assets.join("captured.md");
        Self {
            dir,
            png,
            docx,
            captured,
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn source(&self, content: &str) -> PathBuf {
        let path = self.root().join("guide.md");
        std::fs::write(&path, content).unwrap();
        path
    }

    /// `mmdc -i IN -o OUT -b white`; fails for diagrams containing `bad`.
    fn mermaid(&self) -> ToolCommand {
        script(&format!(
            r#"grep -q bad "$2" && {{ echo "Parse error on line 2" >&2; exit 3; }}; cp '{}' "$4""#,
            self.png.display()
        ))
    }

    /// `svgexport IN OUT 800:`.
    fn svgexport(&self) -> ToolCommand {
        script(&format!(r#"cp '{}' "$2""#, self.png.display()))
    }

    /// `pandoc MD -o DOCX ...`; keeps a copy of the markdown it was given.
    fn pandoc(&self) -> ToolCommand {
        script(&format!(
            r#"cp "$1" '{}' && cp '{}' "$3""#,
            self.captured.display(),
            self.docx.display()
        ))
    }

    fn config(&self) -> ConversionConfig {
        ConversionConfig::builder()
            .mermaid(self.mermaid())
            .svgexport(self.svgexport())
            .pandoc(self.pandoc())
            .tool_timeout_secs(20)
            .build()
            .unwrap()
    }

    fn captured_markdown(&self) -> String {
        std::fs::read_to_string(&self.captured).unwrap()
    }
}

fn script(body: &str) -> ToolCommand {
    ToolCommand::new("sh")
        .with_arg("-c")
        .with_arg(body)
        .with_arg("stand-in")
}

fn write_minimal_docx(path: &Path) {
    let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(b"<Types/>").unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Guide</w:t></w:r></w:p>
<w:p><w:r><w:t>Body</w:t></w:r></w:p>
</w:body></w:document>"#,
    )
    .unwrap();
    zip.start_file("word/styles.xml", options).unwrap();
    zip.write_all(
        br#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/></w:style></w:styles>"#,
    )
    .unwrap();
    zip.finish().unwrap();
}

const GUIDE: &str = "# Guide
Intro paragraph
- [ ] todo

```mermaid
flowchart LR
  A --> B
```

```mermaid
graph TD
  bad syntax here
```

![Logo](logo.svg)
![Gone](missing.svg)
";

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ConversionProgressCallback for Recorder {
    fn on_stage(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("stage:{stage:?}"));
    }
    fn on_conversion_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start:{total}"));
    }
    fn on_diagram_complete(&self, n: usize, _total: usize, _size: Option<&ImageSize>) {
        self.events.lock().unwrap().push(format!("ok:{n}"));
    }
    fn on_diagram_error(&self, n: usize, _total: usize, _error: &str) {
        self.events.lock().unwrap().push(format!("err:{n}"));
    }
    fn on_svg_converted(&self, name: &str, status: &SvgStatus) {
        self.events
            .lock()
            .unwrap()
            .push(format!("svg:{name}:{status}"));
    }
    fn on_conversion_complete(&self, _output: &Path, bytes: u64) {
        self.events.lock().unwrap().push(format!("done:{}", bytes > 0));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn converts_with_partial_diagram_failure() {
    let fx = Fixture::new();
    std::fs::write(fx.root().join("logo.svg"), "<svg/>").unwrap();
    let source = fx.source(GUIDE);

    let output = convert(&source, &fx.config()).await.unwrap();

    assert_eq!(output.output_path, fx.root().join("guide.docx"));
    assert!(output.output_path.is_file());
    assert!(output.stats.output_bytes > 0);

    // Diagrams
    assert_eq!(output.stats.total_diagrams, 2);
    assert_eq!(output.stats.rendered_diagrams, 1);
    let first = &output.diagrams[0];
    assert_eq!(first.number, 1);
    assert_eq!(first.sizing, SizingMethod::Measured);
    assert!(matches!(first.size, Some(ImageSize::Width(_))));
    assert!(fx.root().join("images/diagram-1.png").is_file());

    let second = &output.diagrams[1];
    assert_eq!(second.sizing, SizingMethod::Skipped);
    match &second.error {
        Some(DiagramError::RenderFailed { index, detail }) => {
            assert_eq!(*index, 2);
            assert!(detail.contains("Parse error"), "got {detail}");
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(second.reference, "![Diagram 2](images/diagram-2.png)");

    // SVGs
    assert_eq!(output.svg_assets.len(), 2);
    assert_eq!(output.svg_assets[0].status, SvgStatus::Converted);
    assert_eq!(output.svg_assets[1].status, SvgStatus::Missing);
    assert!(fx.root().join("images/logo.png").is_file());

    // What pandoc saw
    let md = fx.captured_markdown();
    assert!(md.contains("# Guide\n\nIntro paragraph"), "{md}");
    assert!(md.contains("- ☐ todo"), "{md}");
    assert!(md.contains("![Diagram 1](images/diagram-1.png){width="), "{md}");
    assert!(md.contains("![Diagram 2](images/diagram-2.png)\n"), "{md}");
    assert!(md.contains("![Logo](images/logo.png){width=5.8in}"), "{md}");
    assert!(md.contains("![Gone](missing.svg)"), "{md}");
    assert!(!md.contains("```mermaid"), "{md}");

    // Formatting ran on the result
    let formatting = output.stats.formatting.as_ref().unwrap();
    assert_eq!(formatting.headings, 1);

    // No intermediate files left behind
    let leftovers: Vec<String> = std::fs::read_dir(fx.root())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("_temp_word") || n.starts_with(".md2docx-"))
        .collect();
    assert!(leftovers.is_empty(), "left behind: {leftovers:?}");
    assert!(output.temp_markdown.is_none());
}

#[tokio::test]
async fn progress_events_follow_the_pipeline() {
    let fx = Fixture::new();
    std::fs::write(fx.root().join("logo.svg"), "<svg/>").unwrap();
    let source = fx.source(GUIDE);

    let recorder = Arc::new(Recorder::default());
    let config = ConversionConfig::builder()
        .mermaid(fx.mermaid())
        .svgexport(fx.svgexport())
        .pandoc(fx.pandoc())
        .progress_callback(recorder.clone() as Arc<dyn ConversionProgressCallback>)
        .build()
        .unwrap();
    convert(&source, &config).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        [
            "stage:Preprocess",
            "start:2",
            "stage:Diagrams",
            "ok:1",
            "err:2",
            "stage:SvgAssets",
            "svg:logo.svg:converted",
            "svg:missing.svg:missing",
            "stage:Pandoc",
            "stage:Formatting",
            "done:true",
        ]
    );
}

#[tokio::test]
async fn concurrent_rendering_keeps_document_order() {
    let fx = Fixture::new();
    let mut source = String::new();
    for i in 0..6 {
        source.push_str(&format!("```mermaid\ngraph LR\n  N{i} --> M{i}\n```\n\n"));
    }
    let path = fx.source(&source);

    let config = ConversionConfig::builder()
        .mermaid(fx.mermaid())
        .pandoc(fx.pandoc())
        .concurrency(4)
        .build()
        .unwrap();
    let output = convert(&path, &config).await.unwrap();

    let numbers: Vec<usize> = output.diagrams.iter().map(|d| d.number).collect();
    assert_eq!(numbers, [1, 2, 3, 4, 5, 6]);

    let md = fx.captured_markdown();
    let positions: Vec<usize> = (1..=6)
        .map(|n| md.find(&format!("diagram-{n}.png")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn missing_renderer_is_not_fatal() {
    let fx = Fixture::new();
    let path = fx.source("```mermaid\nsequenceDiagram\n  A->>B: hi\n```\n");

    let config = ConversionConfig::builder()
        .mermaid(ToolCommand::new(fx.root().join("no-such-mmdc")))
        .pandoc(fx.pandoc())
        .build()
        .unwrap();
    let output = convert(&path, &config).await.unwrap();

    assert_eq!(output.stats.failed_diagrams, 1);
    assert!(matches!(
        output.diagrams[0].error,
        Some(DiagramError::RendererUnavailable { index: 1, .. })
    ));
    assert!(fx
        .captured_markdown()
        .contains("![Diagram 1](images/diagram-1.png)"));
}

#[tokio::test]
async fn missing_pandoc_is_fatal() {
    let fx = Fixture::new();
    let path = fx.source("# Title\n");

    let config = ConversionConfig::builder()
        .pandoc(ToolCommand::new(fx.root().join("no-such-pandoc")))
        .build()
        .unwrap();
    let err = convert(&path, &config).await.unwrap_err();
    assert!(matches!(err, Md2DocxError::ToolNotFound { .. }), "got {err:?}");
    assert!(!fx.root().join("guide.docx").exists());
}

#[tokio::test]
async fn pandoc_failure_leaves_no_output() {
    let fx = Fixture::new();
    let path = fx.source("# Title\n");

    let config = ConversionConfig::builder()
        .pandoc(script(r#"echo "Unknown extension" >&2; exit 2"#))
        .build()
        .unwrap();
    let err = convert(&path, &config).await.unwrap_err();
    match err {
        Md2DocxError::ToolFailed { status, stderr, .. } => {
            assert_eq!(status, Some(2));
            assert!(stderr.contains("Unknown extension"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!fx.root().join("guide.docx").exists());
}

#[tokio::test]
async fn explicit_output_and_kept_temp_markdown() {
    let fx = Fixture::new();
    let path = fx.source("# Title\ntext\n");
    let out = fx.root().join("build/nested/result.docx");

    let config = ConversionConfig::builder()
        .pandoc(fx.pandoc())
        .keep_temp(true)
        .format(false)
        .build()
        .unwrap();
    let output = convert_to_file(&path, &out, &config).await.unwrap();

    assert_eq!(output.output_path, out);
    assert!(out.is_file());
    assert!(output.stats.formatting.is_none());

    let kept = output.temp_markdown.unwrap();
    assert_eq!(kept.parent(), Some(fx.root()));
    assert_eq!(std::fs::read_to_string(kept).unwrap(), "# Title\n\ntext\n");
}

#[tokio::test]
async fn resource_path_is_canonical() {
    let fx = Fixture::new();
    fx.source("# Title\n");
    std::fs::create_dir_all(fx.root().join("sub")).unwrap();
    let indirect = fx.root().join("sub/../guide.md");
    let seen = fx.root().join("resource-path.txt");

    // `pandoc MD -o DOCX --from markdown --to docx --resource-path=DIR`
    let pandoc = script(&format!(
        r#"printf '%s' "$8" > '{}' && cp '{}' "$3""#,
        seen.display(),
        fx.docx.display()
    ));
    let config = ConversionConfig::builder()
        .pandoc(pandoc)
        .format(false)
        .build()
        .unwrap();
    convert(&indirect, &config).await.unwrap();

    let expected = std::fs::canonicalize(fx.root()).unwrap();
    assert_eq!(
        std::fs::read_to_string(&seen).unwrap(),
        format!("--resource-path={}", expected.display())
    );
}
