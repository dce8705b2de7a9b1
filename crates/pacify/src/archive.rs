// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Sequential reading and rewriting of zip and tar containers.
//!
//! Both codecs drive an [`EntryVisitor`] over the entries of one container
//! in stream order. Nested containers are handled by the visitor itself,
//! which calls back into this module with the entry's bytes.

use std::io::{Read, Seek, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::model::{normalize_entry, ArchiveType};

#[cfg(test)]
#[path = "./archive_test.rs"]
mod archive_test;

/// Entry name of the jar manifest.
pub const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

const MANIFEST_DIR_ENTRY: &str = "META-INF/";

/// Receives the regular entries of a container.
///
/// Names are normalized (no leading `/` or `./`). Directory entries are
/// never offered.
pub trait EntryVisitor {
    /// Called for every regular entry; return true to receive its content.
    fn wants(&mut self, name: &str) -> bool;

    /// Process the content of a wanted entry. `Some` replaces the entry
    /// content when rewriting.
    fn visit(&mut self, name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>>;
}

/// Copy `reader` into `writer` entry by entry, replacing the content of the
/// entries the visitor changes.
///
/// Entries keep their order, except that java archives always start with
/// their manifest.
pub fn rewrite<R, W>(
    kind: ArchiveType,
    reader: R,
    writer: W,
    visitor: &mut dyn EntryVisitor,
) -> crate::Result<W>
where
    R: Read + Seek,
    W: Write + Seek,
{
    if kind.is_zip_family() {
        rewrite_zip(kind, reader, writer, visitor)
    } else {
        rewrite_tar(reader, writer, visitor)
    }
}

/// Offer every entry of `reader` to the visitor without writing anything.
pub fn for_each_entry<R>(kind: ArchiveType, reader: R, visitor: &mut dyn EntryVisitor) -> crate::Result<()>
where
    R: Read + Seek,
{
    if kind.is_zip_family() {
        let mut archive = ZipArchive::new(reader)?;
        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            if entry.is_dir() {
                continue;
            }
            let name = normalize_entry(entry.name());
            if visitor.wants(&name) {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                visitor.visit(&name, &data)?;
            }
        }
    } else {
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let name = normalize_entry(&entry.path()?.to_string_lossy());
            if visitor.wants(&name) {
                let mut data = Vec::new();
                entry.read_to_end(&mut data)?;
                visitor.visit(&name, &data)?;
            }
        }
    }
    Ok(())
}

/// Raw entry names in stream order, directories included.
pub fn entry_names<R>(kind: ArchiveType, reader: R) -> crate::Result<Vec<String>>
where
    R: Read + Seek,
{
    let mut names = Vec::new();
    if kind.is_zip_family() {
        let mut archive = ZipArchive::new(reader)?;
        for index in 0..archive.len() {
            names.push(archive.by_index_raw(index)?.name().to_string());
        }
    } else {
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries()? {
            names.push(entry?.path()?.to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Position of each source entry in the output.
fn output_order<R: Read + Seek>(kind: ArchiveType, archive: &mut ZipArchive<R>) -> crate::Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..archive.len()).collect();
    if !kind.keeps_manifest_first() {
        return Ok(order);
    }

    let mut manifest = None;
    let mut manifest_dir = None;
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index)?;
        let name = entry.name();
        if name.eq_ignore_ascii_case(MANIFEST_ENTRY) {
            manifest = Some(index);
        } else if name.eq_ignore_ascii_case(MANIFEST_DIR_ENTRY) {
            manifest_dir = Some(index);
        }
    }

    if let Some(manifest) = manifest {
        let mut leading = Vec::with_capacity(2);
        leading.extend(manifest_dir);
        leading.push(manifest);
        order.retain(|index| !leading.contains(index));
        leading.extend(order);
        order = leading;
    }
    Ok(order)
}

fn rewrite_zip<R, W>(
    kind: ArchiveType,
    reader: R,
    writer: W,
    visitor: &mut dyn EntryVisitor,
) -> crate::Result<W>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut output = ZipWriter::new(writer);

    for index in output_order(kind, &mut archive)? {
        let (name, is_dir, compression, mode) = {
            let entry = archive.by_index_raw(index)?;
            (
                entry.name().to_string(),
                entry.is_dir(),
                entry.compression(),
                entry.unix_mode(),
            )
        };

        let key = normalize_entry(&name);
        if is_dir || !visitor.wants(&key) {
            output.raw_copy_file(archive.by_index_raw(index)?)?;
            continue;
        }

        let mut data = Vec::new();
        archive.by_index(index)?.read_to_end(&mut data)?;
        match visitor.visit(&key, &data)? {
            None => output.raw_copy_file(archive.by_index_raw(index)?)?,
            Some(content) => {
                let mut options = SimpleFileOptions::default()
                    .compression_method(compression)
                    .large_file(content.len() as u64 >= u32::MAX as u64);
                if let Some(mode) = mode {
                    options = options.unix_permissions(mode);
                }
                output.start_file(name.as_str(), options)?;
                output.write_all(&content)?;
            }
        }
    }

    Ok(output.finish()?)
}

fn rewrite_tar<R, W>(reader: R, writer: W, visitor: &mut dyn EntryVisitor) -> crate::Result<W>
where
    R: Read,
    W: Write,
{
    let mut archive = tar::Archive::new(reader);
    let mut output = tar::Builder::new(writer);
    output.follow_symlinks(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut header = entry.header().clone();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;

        let key = normalize_entry(&name);
        let replaced = if header.entry_type().is_file() && visitor.wants(&key) {
            visitor.visit(&key, &data)?
        } else {
            None
        };

        let content = replaced.unwrap_or(data);
        header.set_size(content.len() as u64);
        output.append_data(&mut header, &name, content.as_slice())?;
    }

    Ok(output.into_inner()?)
}
