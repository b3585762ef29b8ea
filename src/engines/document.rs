use super::{DocumentBuilder, DocumentError, EmbeddedImage, PageBox, Placement};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Fallback when a page carries no usable MediaBox (US Letter).
const DEFAULT_PAGE: PageBox = PageBox {
    width: 612.0,
    height: 792.0,
};

/// Guards against cyclic `Parent` chains in malformed files.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Page geometry of an uploaded PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub page_count: usize,
    /// One entry per page, in page order.
    pub pages: Vec<PageBox>,
}

/// Parse a PDF and read every page's size.
pub fn load_document(bytes: &[u8]) -> Result<LoadedDocument, DocumentError> {
    let doc = Document::load_mem(bytes).map_err(|e| DocumentError::Load(e.to_string()))?;
    let pages: Vec<PageBox> = doc
        .get_pages()
        .values()
        .map(|&id| media_box(&doc, id).unwrap_or(DEFAULT_PAGE))
        .collect();

    Ok(LoadedDocument {
        page_count: pages.len(),
        pages,
    })
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(n) => Some(*n as f32),
        Object::Real(n) => Some(*n),
        _ => None,
    }
}

/// MediaBox of a page, following inheritance through the page tree.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = node.get(b"MediaBox") {
            let value = match value {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            let coords: Vec<f32> = value
                .as_array()
                .ok()?
                .iter()
                .filter_map(number)
                .collect();
            return match coords.as_slice() {
                &[x0, y0, x1, y1] if x1 != x0 && y1 != y0 => Some(PageBox {
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                }),
                _ => None,
            };
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Builds a PDF where every page holds one JPEG image.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn image_stream(image: &EmbeddedImage) -> Result<Stream, DocumentError> {
    let color_space = match image.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        n => {
            return Err(DocumentError::Page(format!(
                "JPEG with {n} color components is not supported"
            )))
        }
    };

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(image.width)));
    dict.set("Height", Object::Integer(i64::from(image.height)));
    dict.set("ColorSpace", Object::Name(color_space.as_bytes().to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    dict.set("Length", Object::Integer(image.jpeg.len() as i64));

    Ok(Stream::new(dict, image.jpeg.clone()))
}

impl DocumentBuilder for PdfBuilder {
    fn add_image_page(
        &mut self,
        image: &EmbeddedImage,
        page: PageBox,
        placement: Placement,
    ) -> Result<usize, DocumentError> {
        if image.width == 0 || image.height == 0 || image.jpeg.is_empty() {
            return Err(DocumentError::Page("image is empty".to_string()));
        }
        if !(page.width > 0.0 && page.height > 0.0) {
            return Err(DocumentError::Page(format!(
                "page size {}x{} is not positive",
                page.width, page.height
            )));
        }

        let image_id = self.doc.add_object(image_stream(image)?);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Real(placement.width),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Real(placement.height),
                        Object::Real(placement.x),
                        Object::Real(placement.y),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| DocumentError::Page(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page.width),
                Object::Real(page.height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        self.kids.push(Object::Reference(page_id));
        Ok(self.kids.len())
    }

    fn page_count(&self) -> usize {
        self.kids.len()
    }

    fn serialize(mut self) -> Result<Vec<u8>, DocumentError> {
        if self.kids.is_empty() {
            return Err(DocumentError::Serialize("document has no pages".to_string()));
        }

        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.doc
            .save_to(&mut buf)
            .map_err(|e| DocumentError::Serialize(e.to_string()))?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{ImageCodec, ImageEngine};
    use crate::formats::{OutputFormat, Quality};
    use image::{DynamicImage, RgbImage};

    fn jpeg(width: u32, height: u32) -> EmbeddedImage {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([9, 99, 199])));
        let bytes = ImageEngine::new()
            .encode(&image, OutputFormat::Jpeg, Quality::new(85))
            .unwrap();
        EmbeddedImage {
            jpeg: bytes,
            width,
            height,
            components: 3,
        }
    }

    fn full_page(width: f32, height: f32) -> (PageBox, Placement) {
        (
            PageBox { width, height },
            Placement {
                x: 0.0,
                y: 0.0,
                width,
                height,
            },
        )
    }

    #[test]
    fn built_document_loads_back_with_page_sizes() {
        let mut builder = PdfBuilder::new();
        for (w, h) in [(120, 80), (50, 200), (300, 300)] {
            let (page, placement) = full_page(w as f32, h as f32);
            builder.add_image_page(&jpeg(w, h), page, placement).unwrap();
        }
        assert_eq!(builder.page_count(), 3);

        let bytes = builder.serialize().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));

        let loaded = load_document(&bytes).unwrap();
        assert_eq!(loaded.page_count, 3);
        assert_eq!(
            loaded.pages,
            vec![
                PageBox { width: 120.0, height: 80.0 },
                PageBox { width: 50.0, height: 200.0 },
                PageBox { width: 300.0, height: 300.0 },
            ]
        );
    }

    #[test]
    fn empty_document_cannot_be_serialized() {
        assert!(matches!(
            PdfBuilder::new().serialize(),
            Err(DocumentError::Serialize(_))
        ));
    }

    #[test]
    fn cmyk_jpeg_is_rejected() {
        let mut image = jpeg(10, 10);
        image.components = 4;
        let (page, placement) = full_page(10.0, 10.0);
        let err = PdfBuilder::new()
            .add_image_page(&image, page, placement)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Page(_)));
    }

    #[test]
    fn garbage_is_not_a_document() {
        assert!(matches!(
            load_document(b"%PDF-1.4 but not really"),
            Err(DocumentError::Load(_))
        ));
    }
}
