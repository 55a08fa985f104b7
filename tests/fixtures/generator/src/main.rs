//! Test fixture generator for doc-converter.
//!
//! Writes one input per supported format, plus a few broken or unsupported
//! files, into `tests/fixtures/output` for the integration tests.

use anyhow::{Context, Result};
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

fn main() -> Result<()> {
    let output_dir = Path::new("tests/fixtures/output");
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    println!("Generating test fixtures...\n");

    generate_simple_docx(output_dir)?;
    generate_multipage_docx(output_dir)?;
    generate_simple_txt(output_dir)?;
    generate_simple_html(output_dir)?;
    generate_pdf(output_dir, "simple.pdf", 1)?;
    generate_pdf(output_dir, "multipage.pdf", 3)?;

    // Error cases
    generate_corrupt_docx(output_dir)?;
    generate_unsupported(output_dir)?;

    println!("\nAll fixtures generated successfully!");
    Ok(())
}

fn heading(text: &str) -> Paragraph {
    Paragraph::new()
        .add_run(Run::new().add_text(text).bold().size(40))
        .align(AlignmentType::Center)
}

/// A short two-paragraph DOCX.
fn generate_simple_docx(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("simple.docx");
    println!("  Creating: {}", path.display());

    let docx = Docx::new()
        .add_paragraph(heading("Quarterly Report"))
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Revenue grew in every region. "))
                .add_run(Run::new().add_text("Details follow.").italic()),
        );

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// A DOCX with explicit page breaks, three pages long.
fn generate_multipage_docx(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("multipage.docx");
    println!("  Creating: {}", path.display());

    let mut docx = Docx::new();
    for page in 1..=3 {
        if page > 1 {
            docx = docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)));
        }
        docx = docx.add_paragraph(heading(&format!("Section {}", page)));
        for line in 1..=5 {
            let text = format!(
                "Section {} line {}: the quick brown fox jumps over the lazy dog.",
                page, line
            );
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(&text)));
        }
    }

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// Plain UTF-8 text, including non-ASCII characters.
fn generate_simple_txt(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("simple.txt");
    println!("  Creating: {}", path.display());

    let mut file = File::create(&path)?;
    writeln!(file, "Meeting notes")?;
    writeln!(file)?;
    writeln!(file, "- Budget approved for Zürich office")?;
    writeln!(file, "- Next review: 15 März")?;
    Ok(())
}

/// A self-contained HTML page.
fn generate_simple_html(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("simple.html");
    println!("  Creating: {}", path.display());

    fs::write(
        &path,
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Fixture</title>
<style>body { font-family: sans-serif; } td { border: 1px solid #999; padding: 4px; }</style>
</head>
<body>
<h1>Inventory</h1>
<table>
<tr><td>Widgets</td><td>12</td></tr>
<tr><td>Gadgets</td><td>7</td></tr>
</table>
</body>
</html>
"#,
    )?;
    Ok(())
}

/// A minimal valid PDF with `pages` text pages.
fn generate_pdf(output_dir: &Path, name: &str, pages: usize) -> Result<()> {
    let path = output_dir.join(name);
    println!("  Creating: {}", path.display());

    // Object layout: 1 catalog, 2 page tree, 3 font, then a page and its
    // content stream for each page.
    let mut objects: Vec<String> = Vec::new();
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", 4 + i * 2)).collect();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        pages
    ));
    objects.push("<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string());
    for i in 0..pages {
        let content_id = 5 + i * 2;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            content_id
        ));
        let stream = format!("BT /F1 24 Tf 72 720 Td (Page {}) Tj ET", i + 1);
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    pdf.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
    );
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );

    fs::write(&path, pdf)?;
    Ok(())
}

/// Not a ZIP archive, so LibreOffice cannot open it as DOCX.
fn generate_corrupt_docx(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("corrupt.docx");
    println!("  Creating: {}", path.display());

    fs::write(&path, b"PK? not really a zip archive")?;
    Ok(())
}

/// A file no conversion accepts.
fn generate_unsupported(output_dir: &Path) -> Result<()> {
    let path = output_dir.join("unsupported.xyz");
    println!("  Creating: {}", path.display());

    fs::write(&path, b"unknown format")?;
    Ok(())
}
