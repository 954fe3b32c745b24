// ABOUTME: Image archive handling for save_image.
// ABOUTME: Tar extraction and post-save archive disposal rules.

use super::traits::ImageError;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Directory an archive unpacks into: the archive path minus its
/// extension, or with `.contents` appended when there is none.
pub(crate) fn extraction_dir(archive_path: &Path) -> PathBuf {
    if archive_path.extension().is_some() {
        archive_path.with_extension("")
    } else {
        let mut raw = archive_path.as_os_str().to_os_string();
        raw.push(".contents");
        PathBuf::from(raw)
    }
}

pub(crate) fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<(), ImageError> {
    let context = format!("extracting {}", archive_path.display());

    std::fs::create_dir_all(dest_dir).map_err(|e| ImageError::provider(&context, e))?;
    let file = File::open(archive_path).map_err(|e| ImageError::provider(&context, e))?;
    tar::Archive::new(file)
        .unpack(dest_dir)
        .map_err(|e| ImageError::provider(&context, e))
}

/// Apply the extract/remove rules after an archive has been written.
///
/// The archive is deleted only after a successful extraction; it is kept
/// when `extract` is false or extraction failed, regardless of
/// `remove_orig`.
pub(crate) fn finish_save(
    archive_path: &Path,
    extract: bool,
    remove_orig: bool,
) -> Result<(), ImageError> {
    if !extract {
        return Ok(());
    }

    extract_archive(archive_path, &extraction_dir(archive_path))?;

    if remove_orig {
        std::fs::remove_file(archive_path).map_err(|e| {
            ImageError::provider(format!("removing {}", archive_path.display()), e)
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tar(path: &Path) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        let content = b"layer data";
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "layer.bin", content.as_slice())
            .unwrap();
        builder.finish().unwrap();
    }

    #[test]
    fn extraction_dir_strips_extension() {
        assert_eq!(
            extraction_dir(Path::new("/tmp/app.tar")),
            PathBuf::from("/tmp/app")
        );
        assert_eq!(
            extraction_dir(Path::new("/tmp/app")),
            PathBuf::from("/tmp/app.contents")
        );
    }

    #[test]
    fn extract_and_remove_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("image.tar");
        write_tar(&archive);

        finish_save(&archive, true, true).unwrap();

        assert!(!archive.exists(), "archive should be removed after extraction");
        assert!(dir.path().join("image").join("layer.bin").exists());
    }

    #[test]
    fn no_extract_keeps_archive_even_with_remove_orig() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("image.tar");
        write_tar(&archive);

        finish_save(&archive, false, true).unwrap();

        assert!(archive.exists(), "archive must survive when extract is off");
    }

    #[test]
    fn failed_extraction_keeps_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("image.tar");
        let mut file = File::create(&archive).unwrap();
        file.write_all(b"this is not a tar archive").unwrap();

        let err = finish_save(&archive, true, true).unwrap_err();
        assert!(matches!(err, ImageError::Provider { .. }));
        assert!(archive.exists(), "archive must survive a failed extraction");
    }

    #[test]
    fn extract_unpacks_into_sibling_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("image.tar");
        write_tar(&archive);

        extract_archive(&archive, &extraction_dir(&archive)).unwrap();

        let extracted = dir.path().join("image").join("layer.bin");
        assert_eq!(std::fs::read(extracted).unwrap(), b"layer data");
    }
}
