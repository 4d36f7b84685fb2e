//! services/api/src/documents/pdf_writer.rs
//!
//! Minimal A4 text-to-PDF writer built on `lopdf`.
//!
//! Text is set in an embedded TrueType font when one can be loaded, so any
//! script the font covers survives the export. Without one the built-in
//! Helvetica with WinAnsi encoding is used and unmappable characters become `?`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use ttf_parser::{Face, GlyphId};

use super::export::ExportError;

//==============================================================================
// Page Geometry
//==============================================================================

pub const PAGE_WIDTH: i64 = 595;
pub const PAGE_HEIGHT: i64 = 842;
pub const MARGIN_LEFT: i64 = 50;
pub const MARGIN_RIGHT: i64 = 50;
pub const FIRST_BASELINE: i64 = 800;
pub const LINE_HEIGHT: i64 = 16;
pub const BOTTOM_MARGIN: i64 = 40;
pub const FONT_SIZE: i64 = 11;

/// Average glyph width of the built-in font, in em.
const BUILTIN_AVG_EM: f32 = 0.5;
const TAB_AS_SPACES: &str = "    ";
const FONT_RESOURCE: &str = "F1";

//==============================================================================
// Fonts
//==============================================================================

/// A TrueType font loaded from disk, validated at load time.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    name: String,
    data: Vec<u8>,
}

impl EmbeddedFont {
    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, ttf_parser::FaceParsingError> {
        Face::parse(&data, 0)?;
        let name: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
        Ok(Self {
            name: if name.is_empty() { "EmbeddedFont".to_string() } else { name },
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }
}

#[derive(Debug, Clone)]
pub enum PdfFont {
    Embedded(EmbeddedFont),
    Builtin,
}

impl PdfFont {
    /// Loads the first usable font among the configured path, the bundled
    /// `static/fonts/DejaVuSans.ttf` and the system DejaVu install.
    pub fn discover(configured: Option<&Path>) -> Self {
        for candidate in font_candidates(configured) {
            let Ok(data) = std::fs::read(&candidate) else {
                continue;
            };
            let stem = candidate
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            match EmbeddedFont::from_bytes(stem, data) {
                Ok(font) => {
                    info!("Using PDF font from {}", candidate.display());
                    return PdfFont::Embedded(font);
                }
                Err(e) => warn!("Ignoring unusable font {}: {}", candidate.display(), e),
            }
        }
        warn!("No TrueType font found; PDF exports fall back to Helvetica.");
        PdfFont::Builtin
    }
}

fn font_candidates(configured: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = configured.map(Path::to_path_buf).into_iter().collect();
    candidates.push(PathBuf::from("static/fonts/DejaVuSans.ttf"));
    candidates.push(PathBuf::from(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/static/fonts/DejaVuSans.ttf"
    )));
    candidates.push(PathBuf::from("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"));
    candidates
}

/// Measures and encodes text for one font.
trait GlyphEncoder {
    /// Advance width of `c` in points at `FONT_SIZE`.
    fn char_width(&self, c: char) -> f32;
    /// Bytes of a `Tj` string operand for `line`.
    fn encode(&mut self, line: &str) -> Vec<u8>;
    /// Adds the font objects to `doc` and returns the font dictionary id.
    fn font_object(&self, doc: &mut Document) -> ObjectId;
}

struct BuiltinEncoder;

impl GlyphEncoder for BuiltinEncoder {
    fn char_width(&self, _c: char) -> f32 {
        FONT_SIZE as f32 * BUILTIN_AVG_EM
    }

    fn encode(&mut self, line: &str) -> Vec<u8> {
        line.chars().map(win_ansi_byte).collect()
    }

    fn font_object(&self, doc: &mut Document) -> ObjectId {
        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })
    }
}

fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => c as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        _ => b'?',
    }
}

struct EmbeddedEncoder<'a> {
    font: &'a EmbeddedFont,
    face: Face<'a>,
    units_per_em: f32,
    /// Glyph id -> (first character seen, width in 1/1000 em).
    used: BTreeMap<u16, (char, i64)>,
}

impl<'a> EmbeddedEncoder<'a> {
    fn new(font: &'a EmbeddedFont, face: Face<'a>) -> Self {
        let units_per_em = f32::from(face.units_per_em().max(1));
        Self {
            font,
            face,
            units_per_em,
            used: BTreeMap::new(),
        }
    }

    fn glyph(&self, c: char) -> (u16, f32) {
        let gid = self.face.glyph_index(c).map(|g| g.0).unwrap_or(0);
        let advance = self
            .face
            .glyph_hor_advance(GlyphId(gid))
            .map(f32::from)
            .unwrap_or(self.units_per_em * BUILTIN_AVG_EM);
        (gid, advance)
    }

    fn scaled(&self, units: i16) -> i64 {
        (f32::from(units) * 1000.0 / self.units_per_em).round() as i64
    }
}

impl GlyphEncoder for EmbeddedEncoder<'_> {
    fn char_width(&self, c: char) -> f32 {
        let (_, advance) = self.glyph(c);
        advance * FONT_SIZE as f32 / self.units_per_em
    }

    fn encode(&mut self, line: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(line.len() * 2);
        for c in line.chars() {
            let (gid, advance) = self.glyph(c);
            let width = (advance * 1000.0 / self.units_per_em).round() as i64;
            self.used.entry(gid).or_insert((c, width));
            bytes.extend_from_slice(&gid.to_be_bytes());
        }
        bytes
    }

    fn font_object(&self, doc: &mut Document) -> ObjectId {
        let base_font = Object::Name(self.font.name.clone().into_bytes());
        let bbox = self.face.global_bounding_box();
        let cap_height = self.face.capital_height().unwrap_or(self.face.ascender());

        let font_file_id = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.font.data.len() as i64 },
            self.font.data.clone(),
        ));
        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => base_font.clone(),
            "Flags" => 32_i64,
            "FontBBox" => vec![
                Object::Integer(self.scaled(bbox.x_min)),
                Object::Integer(self.scaled(bbox.y_min)),
                Object::Integer(self.scaled(bbox.x_max)),
                Object::Integer(self.scaled(bbox.y_max)),
            ],
            "ItalicAngle" => 0_i64,
            "Ascent" => self.scaled(self.face.ascender()),
            "Descent" => self.scaled(self.face.descender()),
            "CapHeight" => self.scaled(cap_height),
            "StemV" => 80_i64,
            "FontFile2" => font_file_id,
        });

        let widths: Vec<Object> = self
            .used
            .iter()
            .flat_map(|(gid, (_, width))| {
                [
                    Object::Integer(i64::from(*gid)),
                    Object::Array(vec![Object::Integer(*width)]),
                ]
            })
            .collect();

        let cid_font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => base_font.clone(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0_i64,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000_i64,
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode_id = doc.add_object(Stream::new(Dictionary::new(), self.to_unicode_cmap().into_bytes()));

        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => base_font,
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(cid_font_id)],
            "ToUnicode" => to_unicode_id,
        })
    }
}

impl EmbeddedEncoder<'_> {
    /// CMap mapping each used glyph id back to its character, so viewers can
    /// copy and search the text.
    fn to_unicode_cmap(&self) -> String {
        let mut cmap = String::from(
            "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
        );
        let entries: Vec<(&u16, &(char, i64))> = self.used.iter().collect();
        for chunk in entries.chunks(100) {
            cmap.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (gid, (c, _)) in chunk {
                let mut units = [0u16; 2];
                let utf16: String = c
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{u:04X}"))
                    .collect();
                cmap.push_str(&format!("<{gid:04X}> <{utf16}>\n"));
            }
            cmap.push_str("endbfchar\n");
        }
        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        cmap
    }
}

//==============================================================================
// Layout
//==============================================================================

/// Splits a line into alternating runs of whitespace and non-whitespace.
fn tokens(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut previous: Option<bool> = None;
    for (i, c) in line.char_indices() {
        let is_space = c.is_whitespace();
        if previous.is_some_and(|p| p != is_space) {
            out.push(&line[start..i]);
            start = i;
        }
        previous = Some(is_space);
    }
    if start < line.len() {
        out.push(&line[start..]);
    }
    out
}

/// Wraps one logical line to `max_width` points. Tokens wider than a whole
/// line are broken by character. An empty line yields one empty line.
pub fn wrap_line<F>(line: &str, max_width: f32, char_width: F) -> Vec<String>
where
    F: Fn(char) -> f32,
{
    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0.0f32;

    for token in tokens(line) {
        let is_space = token.chars().all(char::is_whitespace);
        let token_width: f32 = token.chars().map(&char_width).sum();

        if !current.is_empty() && width + token_width > max_width {
            out.push(current.trim_end().to_string());
            current.clear();
            width = 0.0;
            if is_space {
                continue;
            }
        }

        if token_width > max_width && !is_space {
            for c in token.chars() {
                let w = char_width(c);
                if !current.is_empty() && width + w > max_width {
                    out.push(std::mem::take(&mut current));
                    width = 0.0;
                }
                current.push(c);
                width += w;
            }
            continue;
        }

        current.push_str(token);
        width += token_width;
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current.trim_end().to_string());
    }
    out
}

/// Assigns each line a baseline, starting a new page below the bottom margin.
fn paginate(lines: Vec<String>) -> Vec<Vec<(String, i64)>> {
    let mut pages = Vec::new();
    let mut current = Vec::new();
    let mut y = FIRST_BASELINE;
    for line in lines {
        if y < BOTTOM_MARGIN {
            pages.push(std::mem::take(&mut current));
            y = FIRST_BASELINE;
        }
        current.push((line, y));
        y -= LINE_HEIGHT;
    }
    if !current.is_empty() || pages.is_empty() {
        pages.push(current);
    }
    pages
}

//==============================================================================
// Rendering
//==============================================================================

pub fn render_pdf(text: &str, font: &PdfFont) -> Result<Vec<u8>, ExportError> {
    match font {
        PdfFont::Embedded(embedded) => match embedded.face() {
            Some(face) => render_with(text, &mut EmbeddedEncoder::new(embedded, face)),
            None => render_with(text, &mut BuiltinEncoder),
        },
        PdfFont::Builtin => render_with(text, &mut BuiltinEncoder),
    }
}

fn render_with<E: GlyphEncoder>(text: &str, encoder: &mut E) -> Result<Vec<u8>, ExportError> {
    let max_width = (PAGE_WIDTH - MARGIN_LEFT - MARGIN_RIGHT) as f32;
    let normalized = text.replace("\r\n", "\n").replace('\t', TAB_AS_SPACES);

    let mut lines = Vec::new();
    for line in normalized.split('\n') {
        lines.extend(wrap_line(line, max_width, |c| encoder.char_width(c)));
    }

    let mut contents = Vec::new();
    for page in paginate(lines) {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), Object::Integer(FONT_SIZE)]),
        ];
        for (line, y) in page {
            if line.is_empty() {
                continue;
            }
            operations.push(Operation::new(
                "Tm",
                [1, 0, 0, 1, MARGIN_LEFT, y].into_iter().map(Object::Integer).collect(),
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(encoder.encode(&line), StringFormat::Hexadecimal)],
            ));
        }
        operations.push(Operation::new("ET", vec![]));
        let encoded = Content { operations }
            .encode()
            .map_err(|e| ExportError::Pdf(e.to_string()))?;
        contents.push(encoded);
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = encoder.font_object(&mut doc);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
    });

    let mut kids = Vec::with_capacity(contents.len());
    for content in contents {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => [0, 0, PAGE_WIDTH, PAGE_HEIGHT]
                .into_iter()
                .map(Object::Integer)
                .collect::<Vec<_>>(),
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(out)
}
