// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the unit tests.

use std::io::{Cursor, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::archive::{for_each_entry, EntryVisitor};
use crate::model::ArchiveType;

/// Build a zip in memory; names ending in `/` become directories.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    build_zip_bytes(
        &entries
            .iter()
            .map(|(name, content)| (*name, content.as_bytes().to_vec()))
            .collect::<Vec<_>>(),
    )
}

/// Like [`build_zip`] for binary content such as nested archives.
pub fn build_zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        if name.ends_with('/') {
            zip.add_directory(*name, options).unwrap();
        } else {
            zip.start_file(*name, options).unwrap();
            zip.write_all(content).unwrap();
        }
    }
    zip.finish().unwrap().into_inner()
}

pub fn build_tar(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, content) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, name, content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap()
}

struct Grab<'a> {
    wanted: &'a str,
    found: Option<Vec<u8>>,
}

impl EntryVisitor for Grab<'_> {
    fn wants(&mut self, name: &str) -> bool {
        name == self.wanted
    }

    fn visit(&mut self, _name: &str, data: &[u8]) -> crate::Result<Option<Vec<u8>>> {
        self.found = Some(data.to_vec());
        Ok(None)
    }
}

/// Raw content of one entry.
pub fn read_entry_bytes(kind: ArchiveType, data: &[u8], wanted: &str) -> Option<Vec<u8>> {
    let mut grab = Grab { wanted, found: None };
    for_each_entry(kind, Cursor::new(data), &mut grab).unwrap();
    grab.found
}

/// Text content of one entry.
pub fn read_entry(kind: ArchiveType, data: &[u8], wanted: &str) -> Option<String> {
    read_entry_bytes(kind, data, wanted).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file<C: AsRef<[u8]>>(root: &Path, relative: &str, content: C) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

pub fn read_file(root: &Path, relative: &str) -> String {
    std::fs::read_to_string(root.join(relative)).unwrap()
}
