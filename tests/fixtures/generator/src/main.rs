//! Test fixture generator for docmorph.
//!
//! Builds a sample input tree with one or more documents per supported source
//! format, including nested folders and deliberately broken files, so batch
//! runs can be exercised by hand:
//!
//! ```text
//! cargo run -p fixture-generator
//! docmorph tests/fixtures/input /tmp/out --from xlsx --to csv --batch --keep-structure
//! ```

use anyhow::{Context, Result};
use docx_rs::{AlignmentType, Docx, Paragraph, Run, Table as DocxTable, TableCell, TableRow};
use rust_xlsxwriter::{Format, Workbook};
use std::fs::{self, File};
use std::path::Path;

fn main() -> Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/input".to_string());
    let output_dir = Path::new(&output_dir);
    fs::create_dir_all(output_dir)?;

    println!("Generating test fixtures in {}...\n", output_dir.display());

    // Word documents
    generate_simple_docx(output_dir)?;
    generate_tables_docx(&output_dir.join("reports"))?;

    // Spreadsheets
    generate_simple_xlsx(output_dir)?;
    generate_multisheet_xlsx(&output_dir.join("reports/2024"))?;

    // Markup
    generate_markdown(output_dir)?;
    generate_html(&output_dir.join("web"))?;

    // Broken inputs; a batch over these folders must skip them and go on
    generate_corrupt_xlsx(&output_dir.join("reports"))?;
    generate_empty_docx(output_dir)?;

    println!("\nAll fixtures generated successfully!");
    Ok(())
}

fn create(dir: &Path, name: &str) -> Result<std::path::PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(name);
    println!("  Creating: {}", path.display());
    Ok(path)
}

/// A two-paragraph DOCX.
fn generate_simple_docx(dir: &Path) -> Result<()> {
    let path = create(dir, "simple.docx")?;

    let docx = Docx::new()
        .add_paragraph(
            Paragraph::new()
                .add_run(Run::new().add_text("Meeting Notes").bold().size(36))
                .align(AlignmentType::Center),
        )
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("Budget review moved to Thursday.")),
        );

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// A DOCX with a heading and a small table.
fn generate_tables_docx(dir: &Path) -> Result<()> {
    let path = create(dir, "quarterly.docx")?;

    let header = TableRow::new(vec![
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Quarter").bold())),
        TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text("Revenue").bold())),
    ]);
    let mut rows = vec![header];
    for (quarter, revenue) in [("Q1", "1200"), ("Q2", "1350"), ("Q3", "1100"), ("Q4", "1600")] {
        rows.push(TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(quarter))),
            TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(revenue))),
        ]));
    }

    let docx = Docx::new()
        .add_paragraph(
            Paragraph::new().add_run(Run::new().add_text("Quarterly Revenue").bold().size(32)),
        )
        .add_table(DocxTable::new(rows))
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Figures in thousands.")));

    docx.build().pack(File::create(&path)?)?;
    Ok(())
}

/// A single-sheet workbook with a header row and mixed cell types.
fn generate_simple_xlsx(dir: &Path) -> Result<()> {
    let path = create(dir, "inventory.xlsx")?;

    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Inventory")?;

    for (col, title) in ["sku", "name", "quantity", "in_stock"].iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &bold)?;
    }
    let items = [
        ("A-100", "Stapler, heavy duty", 12.0, true),
        ("A-101", "Paper \"A4\"", 500.0, true),
        ("B-200", "Toner", 0.0, false),
    ];
    for (i, (sku, name, quantity, in_stock)) in items.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, *sku)?;
        sheet.write_string(row, 1, *name)?;
        sheet.write_number(row, 2, *quantity)?;
        sheet.write_boolean(row, 3, *in_stock)?;
    }

    workbook.save(&path)?;
    Ok(())
}

/// A workbook with several sheets; only the first one is exported to CSV.
fn generate_multisheet_xlsx(dir: &Path) -> Result<()> {
    let path = create(dir, "sales.xlsx")?;

    let mut workbook = Workbook::new();
    for (index, region) in ["North", "South", "East"].iter().enumerate() {
        let sheet = workbook.add_worksheet();
        sheet.set_name(*region)?;
        sheet.write_string(0, 0, "month")?;
        sheet.write_string(0, 1, "units")?;
        for month in 1..=12u32 {
            sheet.write_number(month, 0, f64::from(month))?;
            sheet.write_number(month, 1, f64::from(month * (index as u32 + 1) * 10))?;
        }
    }

    workbook.save(&path)?;
    Ok(())
}

fn generate_markdown(dir: &Path) -> Result<()> {
    let path = create(dir, "readme.md")?;
    fs::write(
        &path,
        "# Project Overview\n\n\
         Plain paragraph with *emphasis* and **strong** text.\n\n\
         - first item\n- second item\n\n\
         | key | value |\n|-----|-------|\n| a   | 1     |\n",
    )?;

    let path = create(&dir.join("notes"), "changelog.markdown")?;
    fs::write(&path, "## 1.0\n\nInitial release.\n")?;
    Ok(())
}

fn generate_html(dir: &Path) -> Result<()> {
    let path = create(dir, "page.html")?;
    fs::write(
        &path,
        "<!DOCTYPE html>\n<html><head><title>Status</title></head>\n\
         <body><h1>Service Status</h1><p>All systems operational.</p></body></html>\n",
    )?;

    let path = create(dir, "legacy.htm")?;
    fs::write(&path, "<html><body><p>Old extension.</p></body></html>\n")?;
    Ok(())
}

/// An XLSX that has the ZIP magic but nothing else.
fn generate_corrupt_xlsx(dir: &Path) -> Result<()> {
    let path = create(dir, "corrupt.xlsx")?;
    fs::write(&path, b"PK\x03\x04 this is not a real workbook")?;
    Ok(())
}

/// A zero-byte DOCX.
fn generate_empty_docx(dir: &Path) -> Result<()> {
    let path = create(dir, "empty.docx")?;
    File::create(&path)?;
    Ok(())
}
