//! IPTC-IIM writer (JPEG APP13 / Photoshop 3.0 segment).
//!
//! Title goes to ObjectName (2:05), description to Caption-Abstract (2:120),
//! and keywords to one Keywords record (2:25) per token. The existing APP13
//! segment is parsed first so that datasets for fields the payload does not
//! set — and every unrelated dataset and 8BIM resource — are carried forward
//! unchanged.
//!
//! The in-place rewrite goes through a `file~` backup of the original, which
//! is removed once the new file is in place; a failed removal is logged and
//! never fails the row.

use std::fs;
use std::path::{Path, PathBuf};

use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::Bytes;

use super::{MetadataPayload, MetadataWriter, WriteError};

const APP13_MARKER: u8 = 0xED;
const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

const RECORD_APPLICATION: u8 = 2;
const DATASET_RECORD_VERSION: u8 = 0;
const DATASET_OBJECT_NAME: u8 = 5;
const DATASET_KEYWORDS: u8 = 25;
const DATASET_CAPTION: u8 = 120;

/// Writes IPTC-IIM metadata into the JPEG APP13 segment.
pub struct IptcWriter;

impl MetadataWriter for IptcWriter {
    fn name(&self) -> &'static str {
        "IPTC"
    }

    fn write(&self, path: &Path, payload: &MetadataPayload) -> Result<(), WriteError> {
        let file_bytes = fs::read(path).map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut jpeg =
            Jpeg::from_bytes(Bytes::from(file_bytes)).map_err(|e| WriteError::Malformed {
                path: path.to_path_buf(),
                detail: format!("not a valid JPEG: {e}"),
            })?;

        let app13_pos = find_app13_pos(&jpeg);
        let existing = app13_pos.map(|pos| jpeg.segments()[pos].contents().to_vec());

        let contents = build_app13(existing.as_deref(), payload, path)?;
        let segment = JpegSegment::new_with_contents(APP13_MARKER, Bytes::from(contents));

        let segments = jpeg.segments_mut();
        match app13_pos {
            Some(pos) => segments[pos] = segment,
            // No existing APP13 — insert near the front, after the usual
            // APP0/APP1 metadata segments.
            None => segments.insert(segments.len().min(4), segment),
        }

        let output = jpeg.encoder().bytes();
        commit(path, &output)
    }
}

/// Find the position of the Photoshop APP13 segment, if any.
fn find_app13_pos(jpeg: &Jpeg) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == APP13_MARKER && s.contents().starts_with(PHOTOSHOP_HEADER))
}

/// One IPTC-IIM dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Dataset {
    record: u8,
    number: u8,
    value: Vec<u8>,
}

/// The 8BIM resources of an APP13 segment, split into the IPTC-IIM resource
/// and everything else (kept verbatim).
struct ResourceBlocks {
    others: Vec<u8>,
    iptc: Option<Vec<u8>>,
}

/// Walk the 8BIM resource blocks of an APP13 segment.
///
/// Each resource: `8BIM` + resource id (u16 BE) + pascal name (1-byte length
/// plus bytes, padded to even total) + data length (u32 BE) + data, padded to
/// even. Any structural violation makes the whole segment unparseable.
fn split_resources(segment: &[u8]) -> Result<ResourceBlocks, String> {
    let data = segment
        .strip_prefix(PHOTOSHOP_HEADER)
        .unwrap_or(segment);

    let mut blocks = ResourceBlocks {
        others: Vec::new(),
        iptc: None,
    };
    let mut pos = 0;
    while pos < data.len() {
        let start = pos;
        if pos + 12 > data.len() || &data[pos..pos + 4] != BIM_MARKER {
            return Err("malformed 8BIM resource block".to_string());
        }
        pos += 4;
        let resource_id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        let name_len = data[pos] as usize;
        let name_total = 1 + name_len + ((1 + name_len) % 2);
        pos += name_total;
        if pos + 4 > data.len() {
            return Err("truncated 8BIM resource header".to_string());
        }

        let data_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if pos + data_len > data.len() {
            return Err("truncated 8BIM resource data".to_string());
        }
        let resource_data = &data[pos..pos + data_len];
        pos += data_len + (data_len % 2);

        if resource_id == IPTC_RESOURCE_ID {
            blocks.iptc = Some(resource_data.to_vec());
        } else {
            let end = pos.min(data.len());
            blocks.others.extend_from_slice(&data[start..end]);
        }
    }
    Ok(blocks)
}

/// Parse raw IPTC-IIM bytes into datasets. Extended (long-form) datasets are
/// not supported and make the block unparseable.
fn parse_datasets(data: &[u8]) -> Option<Vec<Dataset>> {
    let mut datasets = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if pos + 5 > data.len() || data[pos] != 0x1C {
            return None;
        }
        let record = data[pos + 1];
        let number = data[pos + 2];
        let length = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
        if length & 0x8000 != 0 {
            return None;
        }
        let length = length as usize;
        pos += 5;
        if pos + length > data.len() {
            return None;
        }
        datasets.push(Dataset {
            record,
            number,
            value: data[pos..pos + length].to_vec(),
        });
        pos += length;
    }
    Some(datasets)
}

/// Merge existing datasets with the payload: fields the payload sets replace
/// their datasets (keywords wholesale), everything else is carried forward.
fn merge_datasets(existing: Vec<Dataset>, payload: &MetadataPayload) -> Vec<Dataset> {
    let mut merged = vec![Dataset {
        record: RECORD_APPLICATION,
        number: DATASET_RECORD_VERSION,
        value: vec![0x00, 0x02],
    }];

    for dataset in existing {
        if dataset.record == RECORD_APPLICATION {
            let replaced = match dataset.number {
                DATASET_RECORD_VERSION => true,
                DATASET_OBJECT_NAME => payload.title.is_some(),
                DATASET_CAPTION => payload.description.is_some(),
                DATASET_KEYWORDS => !payload.keywords.is_empty(),
                _ => false,
            };
            if replaced {
                continue;
            }
        }
        merged.push(dataset);
    }

    if let Some(ref title) = payload.title {
        merged.push(Dataset {
            record: RECORD_APPLICATION,
            number: DATASET_OBJECT_NAME,
            value: title.clone().into_bytes(),
        });
    }
    for keyword in &payload.keywords {
        merged.push(Dataset {
            record: RECORD_APPLICATION,
            number: DATASET_KEYWORDS,
            value: keyword.clone().into_bytes(),
        });
    }
    if let Some(ref description) = payload.description {
        merged.push(Dataset {
            record: RECORD_APPLICATION,
            number: DATASET_CAPTION,
            value: description.clone().into_bytes(),
        });
    }

    merged
}

fn encode_datasets(datasets: &[Dataset]) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    for dataset in datasets {
        // Lengths with the high bit set denote extended datasets, which the
        // parser above does not accept — stay within the standard form.
        if dataset.value.len() > 0x7FFF {
            return Err(format!(
                "dataset {}:{} exceeds 32767 bytes",
                dataset.record, dataset.number
            ));
        }
        let length = dataset.value.len() as u16;
        out.push(0x1C);
        out.push(dataset.record);
        out.push(dataset.number);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&dataset.value);
    }
    Ok(out)
}

/// Build the full APP13 segment contents: Photoshop header, preserved
/// resources, then the rebuilt IPTC-IIM resource.
fn build_app13(
    existing_segment: Option<&[u8]>,
    payload: &MetadataPayload,
    path: &Path,
) -> Result<Vec<u8>, WriteError> {
    let malformed = |detail: String| WriteError::Malformed {
        path: path.to_path_buf(),
        detail,
    };

    let (others, existing_datasets) = match existing_segment {
        Some(segment) => {
            let blocks = split_resources(segment).map_err(|detail| malformed(detail))?;
            let datasets = match blocks.iptc {
                Some(ref raw) => parse_datasets(raw)
                    .ok_or_else(|| malformed("IPTC-IIM datasets could not be parsed".to_string()))?,
                None => Vec::new(),
            };
            (blocks.others, datasets)
        }
        None => (Vec::new(), Vec::new()),
    };

    let merged = merge_datasets(existing_datasets, payload);
    let iptc_data = encode_datasets(&merged).map_err(|detail| WriteError::Encoding {
        path: path.to_path_buf(),
        detail,
    })?;

    let mut out = Vec::with_capacity(PHOTOSHOP_HEADER.len() + others.len() + iptc_data.len() + 16);
    out.extend_from_slice(PHOTOSHOP_HEADER);
    out.extend_from_slice(&others);
    out.extend_from_slice(BIM_MARKER);
    out.extend_from_slice(&IPTC_RESOURCE_ID.to_be_bytes());
    out.push(0x00); // pascal name (empty)
    out.push(0x00); // padding to even
    out.extend_from_slice(&(iptc_data.len() as u32).to_be_bytes());
    out.extend_from_slice(&iptc_data);
    if iptc_data.len() % 2 != 0 {
        out.push(0x00);
    }
    Ok(out)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push("~");
    path.with_file_name(name)
}

/// Replace `path` with `bytes` through a `file~` backup. On a failed write
/// the original is restored; on success the backup is removed, and a failed
/// removal is logged only.
fn commit(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if let Err(source) = fs::write(path, bytes) {
        if let Err(restore) = fs::rename(&backup, path) {
            log::error!(
                "failed to restore {} from {}: {restore}",
                path.display(),
                backup.display()
            );
        }
        return Err(WriteError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Err(e) = fs::remove_file(&backup) {
        log::warn!("failed to remove backup {}: {e}", backup.display());
    }
    Ok(())
}
