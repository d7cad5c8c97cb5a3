//! Groups descriptors into size-bounded archive packages for the native
//! upload path.

use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::descriptor::FileDescriptor;
use crate::error::Result;

/// A group of descriptors to upload together as one native-path request.
/// `index` is this package's position among its siblings; only used for
/// naming the archive file and for diagnostics.
pub struct Package {
    pub index: usize,
    pub members: Vec<FileDescriptor>,
}

impl Package {
    /// Singleton packages are uploaded directly rather than zipped.
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Distributes `descriptors` into packages whose member-size sums are each
/// at most `max_package_size`, except a singleton package whose sole
/// member alone exceeds the limit. Preserves input order; no bin-packing
/// optimization is attempted — the first package able to hold a descriptor
/// gets it.
pub fn distribute_files(descriptors: Vec<FileDescriptor>, max_package_size: u64) -> Vec<Package> {
    let mut packages = Vec::new();
    let mut current: Vec<FileDescriptor> = Vec::new();
    let mut current_size: u64 = 0;

    let flush = |current: &mut Vec<FileDescriptor>, packages: &mut Vec<Package>| {
        if !current.is_empty() {
            let members = std::mem::take(current);
            packages.push(Package {
                index: packages.len(),
                members,
            });
        }
    };

    for descriptor in descriptors {
        if descriptor.size > max_package_size {
            flush(&mut current, &mut packages);
            current_size = 0;
            packages.push(Package {
                index: packages.len(),
                members: vec![descriptor],
            });
            continue;
        }

        if current_size + descriptor.size > max_package_size {
            flush(&mut current, &mut packages);
            current_size = 0;
        }

        current_size += descriptor.size;
        current.push(descriptor);
    }
    flush(&mut current, &mut packages);

    packages
}

/// Writes a deflate archive for a non-singleton package into `dir`, naming
/// each entry `join(directory_label, display_name)`. Marks every member
/// `inside_zip = true`. Returns the archive's path.
pub fn zip_package(package: &mut Package, dir: &std::path::Path) -> Result<PathBuf> {
    let archive_path = dir.join(format!("package-{}.zip", package.index));
    let file = File::create(&archive_path)?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for member in package.members.iter_mut() {
        let entry_name = member.relative_path();
        writer.start_file(entry_name.to_string_lossy(), options)?;

        let mut handle = member.open_handle()?;
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            writer.write_all(&buf[..n])?;
        }
        member.inside_zip = true;
    }

    writer.finish()?;
    Ok(archive_path)
}

#[cfg(test)]
mod test {
    use super::*;

    fn descriptor_of_size(name: &str, size: u64) -> FileDescriptor {
        let mut d = FileDescriptor::from_path(name);
        d.display_name = name.to_string();
        d.size = size;
        d
    }

    #[test]
    fn packs_descriptors_respecting_max_size() {
        let descriptors = vec![
            descriptor_of_size("a", 1024),
            descriptor_of_size("b", 1024),
            descriptor_of_size("c", 1024),
        ];
        let packages = distribute_files(descriptors, 2048);
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].members.len(), 2);
        assert_eq!(packages[1].members.len(), 1);
    }

    #[test]
    fn oversized_descriptor_becomes_its_own_singleton_package() {
        let descriptors = vec![
            descriptor_of_size("a", 100),
            descriptor_of_size("huge", 5000),
            descriptor_of_size("b", 100),
        ];
        let packages = distribute_files(descriptors, 2048);
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].members[0].display_name, "a");
        assert!(packages[1].is_singleton());
        assert_eq!(packages[1].members[0].display_name, "huge");
        assert_eq!(packages[2].members[0].display_name, "b");
    }

    #[test]
    fn preserves_input_order_across_packages() {
        let names = ["a", "b", "c", "d", "e"];
        let descriptors: Vec<_> = names
            .iter()
            .map(|n| descriptor_of_size(n, 700))
            .collect();
        let packages = distribute_files(descriptors, 1000);
        let flattened: Vec<_> = packages
            .iter()
            .flat_map(|p| p.members.iter().map(|m| m.display_name.as_str()))
            .collect();
        assert_eq!(flattened, names);
    }

    #[test]
    fn fifty_one_kib_files_at_twenty_kib_limit_makes_three_packages() {
        let descriptors: Vec<_> = (0..50).map(|i| descriptor_of_size("f", 1024).tap(i)).collect();
        let packages = distribute_files(descriptors, 20 * 1024);
        assert_eq!(packages.len(), 3);
        assert_eq!(packages[0].members.len(), 20);
        assert_eq!(packages[1].members.len(), 20);
        assert_eq!(packages[2].members.len(), 10);
    }

    trait Tap {
        fn tap(self, i: usize) -> Self;
    }
    impl Tap for FileDescriptor {
        fn tap(mut self, i: usize) -> Self {
            self.display_name = format!("f{i}");
            self
        }
    }

    #[test]
    fn zip_package_writes_entries_and_marks_inside_zip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        std::fs::write(&src, b"package me").unwrap();

        let mut d = FileDescriptor::from_path(&src);
        d.display_name = "src.txt".to_string();
        d.directory_label = "sub".to_string();
        let mut package = Package {
            index: 0,
            members: vec![d],
        };

        let archive = zip_package(&mut package, dir.path()).unwrap();
        assert!(archive.exists());
        assert!(package.members[0].inside_zip);

        let file = File::open(&archive).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let entry = zip.by_name("sub/src.txt").unwrap();
        assert_eq!(entry.size(), 10);
    }
}
