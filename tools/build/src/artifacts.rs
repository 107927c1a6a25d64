//! Publishing build products next to each other under the output directory,
//! plus the checksum and SBOM archive that accompany a successful build.

use std::{fs, io, path::{Path, PathBuf}};

use indexmap::IndexMap;
use sha2::{Digest as _, Sha256};

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ArtifactError {
    #[error("underlying I/O operation failed")]
    Io(#[from] std::io::Error),
    #[error("could not write ZIP file")]
    Zip(#[from] zip::result::ZipError),
    #[error("error reading ELF file from the build")]
    Goblin(#[from] goblin::error::Error),
    #[error("can't copy {} to {}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Copies everything a build session produced into `dest`, named after the
/// sample. Returns the paths written.
///
/// `original_dts` is published as `<sample>.dts.orig` when given; callers
/// pass it only when the final device tree was changed by overlays.
pub fn copy_artifacts(
    dest: &Path,
    sample_name: &str,
    log: &Path,
    original_dts: Option<&Path>,
    artifacts: &IndexMap<String, PathBuf>,
) -> Result<Vec<PathBuf>, ArtifactError> {
    crate::maybe_create_dir(dest)?;

    let mut copies = vec![(log.to_path_buf(), format!("{sample_name}.log"))];
    if let Some(orig) = original_dts {
        copies.push((orig.to_path_buf(), format!("{sample_name}.dts.orig")));
    }
    for (key, path) in artifacts {
        let name = match key.as_str() {
            "elf" => format!("{sample_name}.elf"),
            "dts" => format!("{sample_name}.dts"),
            "config" => format!("{sample_name}-config"),
            k if k.starts_with("spdx") => {
                let Some(file) = path.file_name() else {
                    continue;
                };
                format!("{sample_name}-{}", file.to_string_lossy())
            }
            _ => continue,
        };
        copies.push((path.clone(), name));
    }

    let mut written = vec![];
    for (from, name) in copies {
        let to = dest.join(name);
        fs::copy(&from, &to).map_err(|source| ArtifactError::Copy {
            from: from.clone(),
            to: to.clone(),
            source,
        })?;
        written.push(to);
    }
    Ok(written)
}

/// Hex SHA-256 digest of a file's contents.
pub fn file_digest(path: &Path) -> Result<String, ArtifactError> {
    let mut hasher = Sha256::new();
    let mut f = fs::File::open(path)?;
    io::copy(&mut f, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writes the digest of `file` to `out`, and returns it.
pub fn write_checksum(file: &Path, out: &Path) -> Result<String, ArtifactError> {
    let digest = file_digest(file)?;
    fs::write(out, &digest)?;
    Ok(digest)
}

/// Word size of an ELF image. Files that aren't ELF at all give `None`.
pub fn elf_class_bits(path: &Path) -> Result<Option<u32>, ArtifactError> {
    let bytes = fs::read(path)?;
    if !bytes.starts_with(&goblin::elf::header::ELFMAG[..]) {
        return Ok(None);
    }
    let elf = goblin::elf::Elf::parse(&bytes)?;
    Ok(Some(if elf.is_64 { 64 } else { 32 }))
}

/// Name of a file inside the SBOM archive: its board directory and file name.
///
/// Published paths look like `<out>/<board>/<sample>/<file>`, so the board is
/// the second component.
fn archive_entry_name(path: &Path) -> String {
    let base = path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    match path.iter().nth(1) {
        Some(dir) if path.iter().count() > 2 => format!("{}/{base}", dir.to_string_lossy()),
        _ => base,
    }
}

/// Collects the given files into a deflated ZIP archive at `zip_path`.
/// Files that don't exist are left out.
pub fn create_archive<'a>(
    zip_path: &Path,
    files: impl IntoIterator<Item = &'a Path>,
) -> Result<usize, ArtifactError> {
    let f = fs::File::create(zip_path)?;
    let mut z = zip::ZipWriter::new(f);
    let opts = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    let mut count = 0;
    for path in files {
        if !path.exists() {
            continue;
        }
        z.start_file(archive_entry_name(path), opts)?;
        let mut src = fs::File::open(path)?;
        io::copy(&mut src, &mut z)?;
        count += 1;
    }
    z.finish()?;
    Ok(count)
}
