//! Image writer.
//!
//! Produces modules images readable by [`ImageReader`](crate::ImageReader),
//! and runtime installation layouts around them. Used by tests and tooling
//! that need real images without a full runtime build.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use jimagefs_common::constants::{
    COMPRESSED_MAGIC, HASH_MULTIPLIER, IMAGE_MAGIC, IMAGE_MAJOR_VERSION, IMAGE_MINOR_VERSION,
    MARKER_FILE, MODULES_FILE, ZIP_DECOMPRESSOR,
};
use jimagefs_common::error::{ImageFsError, Result};

use crate::decompress::COMPRESSED_HEADER_SIZE;
use crate::header::ByteOrder;
use crate::location::{
    ATTRIBUTE_BASE, ATTRIBUTE_COMPRESSED, ATTRIBUTE_COUNT, ATTRIBUTE_EXTENSION, ATTRIBUTE_MODULE,
    ATTRIBUTE_OFFSET, ATTRIBUTE_PARENT, ATTRIBUTE_UNCOMPRESSED,
};
use crate::strings::{hash_code, slot};

#[derive(Debug, Clone)]
struct PendingResource {
    name: String,
    content: Vec<u8>,
    compress: bool,
}

/// Builder for a modules image.
#[derive(Debug, Clone)]
pub struct ImageWriter {
    order: ByteOrder,
    resources: Vec<PendingResource>,
}

impl Default for ImageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter {
    /// Creates an empty writer using the native byte order.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: ByteOrder::native(),
            resources: Vec::new(),
        }
    }

    /// Sets the byte order of the produced image.
    #[must_use]
    pub const fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    /// Adds a resource stored as-is. `name` is `/module/path/file.ext`.
    pub fn add(&mut self, name: &str, content: Vec<u8>) -> &mut Self {
        self.resources.push(PendingResource {
            name: name.to_string(),
            content,
            compress: false,
        });
        self
    }

    /// Adds a resource stored behind a `zip` compression header.
    pub fn add_compressed(&mut self, name: &str, content: Vec<u8>) -> &mut Self {
        self.resources.push(PendingResource {
            name: name.to_string(),
            content,
            compress: true,
        });
        self
    }

    /// Serializes the image.
    ///
    /// # Errors
    ///
    /// Returns `ImageFsError::Format` if a name is not of the form
    /// `/module/file`, a name is duplicated, or the index overflows.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut strings = StringPool::default();
        let _ = strings.intern("");
        let zip_name = strings.intern(ZIP_DECOMPRESSOR);

        let mut locations = Vec::new();
        let mut location_offsets = Vec::with_capacity(self.resources.len());
        let mut content = Vec::new();

        for resource in &self.resources {
            let parts = split_name(&resource.name)?;
            let stored = if resource.compress {
                self.compressed_layer(&resource.content, zip_name)?
            } else {
                resource.content.clone()
            };

            let mut attributes = [0u64; ATTRIBUTE_COUNT];
            attributes[ATTRIBUTE_MODULE] = strings.intern(parts.module);
            attributes[ATTRIBUTE_PARENT] = strings.intern(parts.parent);
            attributes[ATTRIBUTE_BASE] = strings.intern(parts.base);
            attributes[ATTRIBUTE_EXTENSION] = strings.intern(parts.extension);
            attributes[ATTRIBUTE_OFFSET] = content.len() as u64;
            attributes[ATTRIBUTE_COMPRESSED] = if resource.compress {
                stored.len() as u64
            } else {
                0
            };
            attributes[ATTRIBUTE_UNCOMPRESSED] = resource.content.len() as u64;

            location_offsets.push(to_u32(locations.len())?);
            encode_attributes(&attributes, &mut locations);
            content.extend_from_slice(&stored);
        }

        let names: Vec<&str> = self.resources.iter().map(|r| r.name.as_str()).collect();
        let (redirect, slots) = build_perfect_hash(&names)?;

        let mut out = Vec::new();
        for field in [
            IMAGE_MAGIC,
            (u32::from(IMAGE_MAJOR_VERSION) << 16) | u32::from(IMAGE_MINOR_VERSION),
            0,
            to_u32(self.resources.len())?,
            to_u32(slots.len())?,
            to_u32(locations.len())?,
            to_u32(strings.bytes.len())?,
        ] {
            self.put_u32(&mut out, field);
        }
        for value in &redirect {
            self.put_i32(&mut out, *value);
        }
        for resource in &slots {
            self.put_u32(&mut out, location_offsets[*resource]);
        }
        out.extend_from_slice(&locations);
        out.extend_from_slice(&strings.bytes);
        out.extend_from_slice(&content);
        Ok(out)
    }

    /// Writes the image to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the file write fails.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|e| ImageFsError::io(path, e))
    }

    fn compressed_layer(&self, content: &[u8], decompressor: u64) -> Result<Vec<u8>> {
        let compression_failed =
            |e: std::io::Error| ImageFsError::format(format!("compression failed: {e}"));
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(content).map_err(compression_failed)?;
        let payload = encoder.finish().map_err(compression_failed)?;

        let mut out = Vec::with_capacity(payload.len() + COMPRESSED_HEADER_SIZE);
        self.put_u32(&mut out, COMPRESSED_MAGIC);
        self.put_u64(&mut out, payload.len() as u64);
        self.put_u64(&mut out, content.len() as u64);
        let name_offset = u32::try_from(decompressor)
            .map_err(|_| ImageFsError::format("string table exceeds 4 GiB"))?;
        self.put_u32(&mut out, name_offset);
        self.put_u32(&mut out, 0);
        out.push(1);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    fn put_u32(&self, out: &mut Vec<u8>, value: u32) {
        match self.order {
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put_i32(&self, out: &mut Vec<u8>, value: i32) {
        match self.order {
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn put_u64(&self, out: &mut Vec<u8>, value: u64) {
        match self.order {
            ByteOrder::Little => out.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::Big => out.extend_from_slice(&value.to_be_bytes()),
        }
    }
}

/// Creates a runtime installation at `home`: the marker file plus the
/// modules image produced by `writer`.
///
/// # Errors
///
/// Returns an error if the directories or files cannot be written.
pub fn write_runtime_home(home: &Path, writer: &ImageWriter) -> Result<()> {
    let marker = home.join(MARKER_FILE);
    if let Some(lib) = marker.parent() {
        std::fs::create_dir_all(lib).map_err(|e| ImageFsError::io(lib, e))?;
    }
    std::fs::write(&marker, b"PK\x05\x06").map_err(|e| ImageFsError::io(&marker, e))?;
    writer.write_to(&home.join(MODULES_FILE))
}

#[derive(Default)]
struct StringPool {
    bytes: Vec<u8>,
    offsets: HashMap<String, u64>,
}

impl StringPool {
    fn intern(&mut self, value: &str) -> u64 {
        if let Some(offset) = self.offsets.get(value) {
            return *offset;
        }
        let offset = self.bytes.len() as u64;
        self.bytes.extend_from_slice(value.as_bytes());
        self.bytes.push(0);
        let _ = self.offsets.insert(value.to_string(), offset);
        offset
    }
}

struct NameParts<'a> {
    module: &'a str,
    parent: &'a str,
    base: &'a str,
    extension: &'a str,
}

fn split_name(name: &str) -> Result<NameParts<'_>> {
    let invalid = || ImageFsError::format(format!("resource name must be /module/file: {name}"));
    let rest = name.strip_prefix('/').ok_or_else(invalid)?;
    let (module, path) = rest.split_once('/').ok_or_else(invalid)?;
    if module.is_empty() || path.is_empty() {
        return Err(invalid());
    }
    let (parent, file) = path.rsplit_once('/').unwrap_or(("", path));
    let (base, extension) = file.rsplit_once('.').unwrap_or((file, ""));
    Ok(NameParts {
        module,
        parent,
        base,
        extension,
    })
}

fn encode_attributes(attributes: &[u64; ATTRIBUTE_COUNT], out: &mut Vec<u8>) {
    for (kind, value) in attributes.iter().enumerate().skip(1) {
        if *value == 0 {
            continue;
        }
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let length = bytes.len() - skip;
        out.push(u8::try_from((kind << 3) | (length - 1)).unwrap_or_default());
        out.extend_from_slice(&bytes[skip..]);
    }
    out.push(0);
}

/// Places every name into a slot so that the reader's redirect lookup finds
/// it. Returns the redirect table and, per slot, the index of its name.
fn build_perfect_hash(names: &[&str]) -> Result<(Vec<i32>, Vec<usize>)> {
    let len = names.len();
    if len == 0 {
        return Ok((Vec::new(), Vec::new()));
    }
    let mut seen = HashSet::with_capacity(len);
    if let Some(duplicate) = names.iter().find(|name| !seen.insert(**name)) {
        return Err(ImageFsError::format(format!("duplicate resource name {duplicate}")));
    }

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); len];
    for (index, name) in names.iter().enumerate() {
        buckets[slot(hash_code(name, HASH_MULTIPLIER), len)].push(index);
    }
    let mut order: Vec<usize> = (0..len).filter(|b| !buckets[*b].is_empty()).collect();
    order.sort_by_key(|b| std::cmp::Reverse(buckets[*b].len()));

    let mut redirect = vec![0i32; len];
    let mut slots: Vec<Option<usize>> = vec![None; len];

    for bucket in order.iter().copied().filter(|b| buckets[*b].len() > 1) {
        let members = &buckets[bucket];
        let mut seed = 1i32;
        loop {
            let mut positions: Vec<usize> = members
                .iter()
                .map(|m| slot(hash_code(names[*m], seed), len))
                .collect();
            let free = positions.iter().all(|p| slots[*p].is_none());
            positions.sort_unstable();
            positions.dedup();
            if free && positions.len() == members.len() {
                for member in members {
                    slots[slot(hash_code(names[*member], seed), len)] = Some(*member);
                }
                redirect[bucket] = seed;
                break;
            }
            seed = seed
                .checked_add(1)
                .ok_or_else(|| ImageFsError::format("no perfect hash seed found"))?;
        }
    }

    let mut free_slots = (0..len).filter(|s| slots[*s].is_none()).collect::<Vec<_>>().into_iter();
    for bucket in order.iter().copied().filter(|b| buckets[*b].len() == 1) {
        let target = free_slots
            .next()
            .ok_or_else(|| ImageFsError::format("perfect hash ran out of slots"))?;
        slots[target] = Some(buckets[bucket][0]);
        let target = i32::try_from(target).map_err(|_| ImageFsError::format("table too large"))?;
        redirect[bucket] = -1 - target;
    }

    let slots = slots
        .into_iter()
        .map(|s| s.ok_or_else(|| ImageFsError::format("perfect hash left a slot empty")))
        .collect::<Result<Vec<_>>>()?;
    Ok((redirect, slots))
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| ImageFsError::format("image index exceeds 4 GiB"))
}
