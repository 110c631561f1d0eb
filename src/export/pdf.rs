use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::{
  BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect, Rgb,
};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{Column, Order};

const TITLE: &str = "Реестр счетов покупок (Registrum)";
const LAYER: &str = "Реестр";

// A4 landscape, half-inch margins.
const PAGE_WIDTH: f32 = 297.0;
const PAGE_HEIGHT: f32 = 210.0;
const MARGIN: f32 = 12.7;

const TITLE_SIZE: f32 = 16.0;
const HEADER_SIZE: f32 = 9.0;
const BODY_SIZE: f32 = 7.0;
const PADDING: f32 = 1.5;
const PT_TO_MM: f32 = 0.3528;
// Average glyph advance relative to the font size; used for wrapping and centring.
const GLYPH_WIDTH: f32 = 0.5;

pub const FONT_ENV: &str = "REGISTRUM_PDF_FONT";
const BUNDLED_FONT: &str = "assets/ChakraPetch-Regular.ttf";
const SYSTEM_FONTS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
  "/Library/Fonts/Arial Unicode.ttf",
];

/// TrueType font with Cyrillic glyphs: `REGISTRUM_PDF_FONT`, then
/// `assets/ChakraPetch-Regular.ttf` beside the executable, then a few common
/// system fonts.
pub fn find_font() -> Option<PathBuf> {
  if let Some(path) = env::var_os(FONT_ENV).map(PathBuf::from) {
    if path.is_file() {
      return Some(path);
    }
    warn!(path = %path.display(), "configured pdf font not found");
  }
  let bundled = env::current_exe()
    .ok()
    .and_then(|exe| exe.parent().map(|dir| dir.join(BUNDLED_FONT)));
  bundled
    .into_iter()
    .chain(SYSTEM_FONTS.iter().map(PathBuf::from))
    .find(|path| path.is_file())
}

/// Landscape table of the given rows: grey header repeated on every page,
/// grid lines, centred text wrapped inside each column. Without a font file
/// the built-in Helvetica is used and characters it cannot show become `?`.
pub fn export_orders(orders: &[&Order], path: &Path, font_file: Option<&Path>) -> Result<(), AppError> {
  let (doc, page, layer) = PdfDocument::new(TITLE, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
  let (font, latin_only) = match font_file {
    Some(file) => (doc.add_external_font(File::open(file)?)?, false),
    None => {
      warn!("no font with Cyrillic glyphs found, pdf uses Helvetica");
      (doc.add_builtin_font(BuiltinFont::Helvetica)?, true)
    }
  };

  let mut sheet = Sheet {
    layer: doc.get_page(page).get_layer(layer),
    font,
    latin_only,
    widths: column_widths(),
    top: PAGE_HEIGHT - MARGIN,
  };
  sheet.title();
  sheet.header_row();

  let mut pages = 1;
  for order in orders {
    let cells = wrap_cells(&order.values(), &sheet.widths, BODY_SIZE);
    if sheet.top - row_height(&cells, BODY_SIZE) < MARGIN {
      let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), LAYER);
      sheet.layer = doc.get_page(page).get_layer(layer);
      sheet.top = PAGE_HEIGHT - MARGIN;
      sheet.header_row();
      pages += 1;
    }
    sheet.row(&cells, BODY_SIZE, false);
  }

  doc.save(&mut BufWriter::new(File::create(path)?))?;
  debug!(rows = orders.len(), pages, path = %path.display(), "pdf written");
  Ok(())
}

struct Sheet {
  layer: PdfLayerReference,
  font: IndirectFontRef,
  latin_only: bool,
  widths: [f32; 10],
  top: f32,
}

impl Sheet {
  fn title(&mut self) {
    let size = TITLE_SIZE * PT_TO_MM;
    let x = MARGIN + ((PAGE_WIDTH - 2.0 * MARGIN) - text_width(TITLE, TITLE_SIZE)).max(0.0) / 2.0;
    self.layer.set_fill_color(black());
    self.layer.use_text(self.printable(TITLE), TITLE_SIZE, Mm(x), Mm(self.top - size), &self.font);
    self.top -= size * 1.5 + 12.0 * PT_TO_MM;
  }

  fn header_row(&mut self) {
    let captions = Column::ALL.map(Column::header);
    let cells = wrap_cells(&captions, &self.widths, HEADER_SIZE);
    self.row(&cells, HEADER_SIZE, true);
  }

  fn row(&mut self, cells: &[Vec<String>], size: f32, header: bool) {
    let height = row_height(cells, size);
    let bottom = self.top - height;
    let line_height = size * PT_TO_MM * 1.25;

    if header {
      self.layer.set_fill_color(grey());
      self
        .layer
        .add_rect(Rect::new(Mm(MARGIN), Mm(bottom), Mm(PAGE_WIDTH - MARGIN), Mm(self.top)));
      self.layer.set_fill_color(white());
    } else {
      self.layer.set_fill_color(black());
    }

    let mut left = MARGIN;
    for (lines, width) in cells.iter().zip(self.widths) {
      let block = lines.len() as f32 * line_height;
      let mut baseline = self.top - (height - block) / 2.0 - size * PT_TO_MM;
      for line in lines {
        let x = left + (width - text_width(line, size)).max(0.0) / 2.0;
        self.layer.use_text(self.printable(line), size, Mm(x), Mm(baseline), &self.font);
        baseline -= line_height;
      }
      left += width;
    }

    self.grid(bottom);
    self.top = bottom;
  }

  fn grid(&self, bottom: f32) {
    self.layer.set_outline_color(black());
    self.layer.set_outline_thickness(0.5);
    let right = PAGE_WIDTH - MARGIN;
    self.segment((MARGIN, self.top), (right, self.top));
    self.segment((MARGIN, bottom), (right, bottom));
    let mut x = MARGIN;
    self.segment((x, self.top), (x, bottom));
    for width in self.widths {
      x += width;
      self.segment((x, self.top), (x, bottom));
    }
  }

  fn segment(&self, from: (f32, f32), to: (f32, f32)) {
    self.layer.add_line(Line {
      points: vec![
        (Point::new(Mm(from.0), Mm(from.1)), false),
        (Point::new(Mm(to.0), Mm(to.1)), false),
      ],
      is_closed: false,
    });
  }

  fn printable(&self, text: &str) -> String {
    if self.latin_only {
      text.chars().map(|c| if (c as u32) < 0x100 { c } else { '?' }).collect()
    } else {
      text.to_string()
    }
  }
}

/// Justification gets the most room, the text-heavy columns a medium share.
fn column_widths() -> [f32; 10] {
  let weights: [f32; 10] = Column::ALL.map(|column| match column {
    Column::Justification => 0.30,
    Column::Comment | Column::Supplier | Column::Payer => 0.12,
    _ => 0.07,
  });
  let total: f32 = weights.iter().sum();
  let available = PAGE_WIDTH - 2.0 * MARGIN;
  weights.map(|weight| weight * available / total)
}

fn wrap_cells(values: &[&str; 10], widths: &[f32; 10], size: f32) -> Vec<Vec<String>> {
  values
    .iter()
    .zip(widths)
    .map(|(value, width)| wrap(value, chars_per_line(*width, size)))
    .collect()
}

fn row_height(cells: &[Vec<String>], size: f32) -> f32 {
  let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
  lines as f32 * size * PT_TO_MM * 1.25 + 2.0 * PADDING
}

fn chars_per_line(width: f32, size: f32) -> usize {
  (((width - 2.0 * PADDING) / (size * PT_TO_MM * GLYPH_WIDTH)) as usize).max(1)
}

fn text_width(text: &str, size: f32) -> f32 {
  text.chars().count() as f32 * size * PT_TO_MM * GLYPH_WIDTH
}

/// Greedy word wrap by character count. Explicit line breaks are kept and
/// words longer than a line are split.
fn wrap(text: &str, limit: usize) -> Vec<String> {
  let mut lines = Vec::new();
  for paragraph in text.lines() {
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
      let mut word: Vec<char> = word.chars().collect();
      while word.len() > limit {
        if !current.is_empty() {
          lines.push(std::mem::take(&mut current));
        }
        lines.push(word.drain(..limit).collect());
      }
      let word: String = word.into_iter().collect();
      if word.is_empty() {
        continue;
      }
      let needed = current.chars().count() + usize::from(!current.is_empty()) + word.chars().count();
      if needed > limit && !current.is_empty() {
        lines.push(std::mem::take(&mut current));
      }
      if !current.is_empty() {
        current.push(' ');
      }
      current.push_str(&word);
    }
    lines.push(current);
  }
  if lines.is_empty() {
    lines.push(String::new());
  }
  lines
}

fn black() -> Color {
  Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn white() -> Color {
  Color::Rgb(Rgb::new(0.96, 0.96, 0.96, None))
}

fn grey() -> Color {
  Color::Rgb(Rgb::new(0.5, 0.5, 0.5, None))
}
