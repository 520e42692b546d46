//! EXIF writer (JPEG APP1 segment).
//!
//! Title goes to ImageDescription (0x010E), description to UserComment
//! (0x9286, `ASCII\0\0\0`-prefixed), and the comma-joined keyword list to the
//! Windows wide-string XPKeywords tag (0x9C9E, UTF-16LE). When keywords are
//! present and no description was supplied, the keyword join is also written
//! to UserComment — a quirk inherited from the tool this replaces, kept for
//! compatibility.
//!
//! Existing EXIF is loaded and merged so tags outside the three slots
//! survive the rewrite. An existing APP1 segment that cannot be parsed is
//! reported as malformed rather than silently replaced.

use std::fs;
use std::path::Path;

use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;

use super::{MetadataPayload, MetadataWriter, WriteError};

const TAG_XP_KEYWORDS: u16 = 0x9C9E;
const USER_COMMENT_CHARSET: &[u8] = b"ASCII\0\0\0";

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

/// Writes EXIF metadata into the JPEG APP1 segment.
pub struct ExifWriter;

impl MetadataWriter for ExifWriter {
    fn name(&self) -> &'static str {
        "EXIF"
    }

    fn write(&self, path: &Path, payload: &MetadataPayload) -> Result<(), WriteError> {
        let tags = collect_tags(payload).map_err(|detail| WriteError::Encoding {
            path: path.to_path_buf(),
            detail,
        })?;
        if tags.is_empty() {
            return Ok(());
        }

        let file_bytes = fs::read(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut jpeg =
            Jpeg::from_bytes(Bytes::from(file_bytes)).map_err(|e| WriteError::Malformed {
                path: path.to_path_buf(),
                detail: format!("not a valid JPEG: {e}"),
            })?;

        let orig_exif_pos = find_exif_segment_pos(&jpeg);
        let has_existing = jpeg.exif().map(|e| !e.is_empty()).unwrap_or(false);

        let mut metadata = match load_existing_metadata(path) {
            Some(m) => m,
            None if has_existing => {
                return Err(WriteError::Malformed {
                    path: path.to_path_buf(),
                    detail: "existing EXIF segment could not be parsed".to_string(),
                });
            }
            None => Metadata::new(),
        };

        for tag in tags {
            metadata.set_tag(tag);
        }

        let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
        if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
            return Err(WriteError::Encoding {
                path: path.to_path_buf(),
                detail: "serialized EXIF block is empty".to_string(),
            });
        }
        jpeg.set_exif(Some(Bytes::from(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())));

        // set_exif() inserts at position 3, which may be after other APP1
        // segments. Move the EXIF segment back to its original position so
        // parsers that expect EXIF first keep working.
        if let Some(new_pos) = find_exif_segment_pos(&jpeg) {
            let target_pos = orig_exif_pos.unwrap_or(1);
            if target_pos < new_pos {
                let segments = jpeg.segments_mut();
                let segment = segments.remove(new_pos);
                segments.insert(target_pos, segment);
            }
        }

        let output = jpeg.encoder().bytes();
        fs::write(path, &output).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Build the tag set for a payload. Absent fields contribute no tag at all,
/// so merging leaves their existing values alone.
fn collect_tags(payload: &MetadataPayload) -> Result<Vec<ExifTag>, String> {
    let mut tags = Vec::new();

    if let Some(ref title) = payload.title {
        tags.push(ExifTag::ImageDescription(title.clone()));
    }

    if let Some(ref description) = payload.description {
        tags.push(user_comment(description));
    }

    if !payload.keywords.is_empty() {
        let joined = payload.keywords.join(", ");
        let xp_tag = make_xp_tag(TAG_XP_KEYWORDS, &joined)
            .ok_or_else(|| "failed to encode XPKeywords".to_string())?;
        tags.push(xp_tag);
        // Keyword join doubles as the comment when no description was given.
        if payload.description.is_none() {
            tags.push(user_comment(&joined));
        }
    }

    Ok(tags)
}

fn user_comment(text: &str) -> ExifTag {
    let mut bytes = USER_COMMENT_CHARSET.to_vec();
    bytes.extend_from_slice(text.as_bytes());
    ExifTag::UserComment(bytes)
}

/// Encode a string as UTF-16LE bytes (used for XP* tags).
fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    // Null terminator
    bytes.push(0);
    bytes.push(0);
    bytes
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, value: &str) -> Option<ExifTag> {
    let raw_data = encode_utf16le(value);
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &raw_data,
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .ok()
}

/// Load existing EXIF metadata from a file path using little_exif.
/// Returns None if nothing usable was loaded.
fn load_existing_metadata(path: &Path) -> Option<Metadata> {
    let path_owned = path.to_path_buf();
    // Suppress panics from little_exif
    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(|_| {}));
    let result = std::panic::catch_unwind(move || Metadata::new_from_path(&path_owned));
    std::panic::set_hook(prev_hook);

    match result {
        Ok(Ok(m)) => {
            if m.data().is_empty() {
                log::debug!("little_exif loaded empty metadata");
                None
            } else {
                log::debug!("little_exif loaded {} existing EXIF tags", m.data().len());
                Some(m)
            }
        }
        Ok(Err(e)) => {
            log::debug!("little_exif could not parse EXIF: {e}");
            None
        }
        Err(_) => {
            log::debug!("little_exif panicked parsing EXIF");
            None
        }
    }
}

/// Find the position of the EXIF APP1 segment in a JPEG.
/// EXIF segments have marker 0xE1 (APP1) and contents starting with "Exif\0\0".
fn find_exif_segment_pos(jpeg: &Jpeg) -> Option<usize> {
    const EXIF_PREFIX: &[u8] = b"Exif\0\0";
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == 0xE1 && s.contents().starts_with(EXIF_PREFIX))
}
