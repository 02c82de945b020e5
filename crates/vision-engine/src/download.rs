use std::path::{Path, PathBuf};

use anyhow::Context;
use vision_contracts::history::GeneratedResult;

use crate::codec;

const FILE_STEM_MAX_CHARS: usize = 20;
const DOWNLOAD_EXTENSION: &str = "png";

/// File name for a downloaded entry: the first 20 characters of the prompt,
/// made filesystem-safe, plus `.png`.
pub fn download_file_name(prompt: &str) -> String {
    let stem: String = prompt
        .chars()
        .take(FILE_STEM_MAX_CHARS)
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ' ') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim();
    let stem = if stem.is_empty() { "image" } else { stem };
    format!("{stem}.{DOWNLOAD_EXTENSION}")
}

/// Writes the entry's decoded image into `dir`, never overwriting an existing
/// file. Returns the path written.
pub fn export_entry(entry: &GeneratedResult, dir: &Path) -> anyhow::Result<PathBuf> {
    let decoded = codec::decode_data_uri(&entry.image_data)
        .with_context(|| format!("history entry {} has unusable image data", entry.id))?;
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = unique_path(dir, &download_file_name(&entry.prompt));
    std::fs::write(&path, decoded.bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

fn unique_path(dir: &Path, file_name: &str) -> PathBuf {
    let candidate = dir.join(file_name);
    if !candidate.exists() {
        return candidate;
    }
    let stem = file_name
        .strip_suffix(&format!(".{DOWNLOAD_EXTENSION}"))
        .unwrap_or(file_name);
    (1..)
        .map(|idx| dir.join(format!("{stem} ({idx}).{DOWNLOAD_EXTENSION}")))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

#[cfg(test)]
mod tests {
    use vision_contracts::history::GeneratedResult;

    use super::{download_file_name, export_entry};
    use crate::codec::encode_bytes;

    #[test]
    fn file_name_is_truncated_and_sanitized() {
        assert_eq!(download_file_name("a red bicycle"), "a red bicycle.png");
        assert_eq!(
            download_file_name("today's weather in Rome as a painting"),
            "today_s weather in R.png"
        );
        assert_eq!(download_file_name("Edit: make/it\\blue"), "Edit_ make_it_blue.png");
        assert_eq!(download_file_name("   "), "image.png");
        assert_eq!(download_file_name("???"), "___.png");
    }

    #[test]
    fn export_writes_decoded_bytes_without_clobbering() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = GeneratedResult::new(encode_bytes(b"pixels", "image/png"), "boat", "Gemini Flash", None);

        let first = export_entry(&entry, temp.path())?;
        let second = export_entry(&entry, temp.path())?;

        assert_eq!(first, temp.path().join("boat.png"));
        assert_eq!(second, temp.path().join("boat (1).png"));
        assert_eq!(std::fs::read(&first)?, b"pixels");
        assert_eq!(std::fs::read(&second)?, b"pixels");
        Ok(())
    }

    #[test]
    fn export_rejects_corrupt_image_data() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let entry = GeneratedResult::new("not-a-data-uri", "boat", "Gemini Flash", None);
        assert!(export_entry(&entry, temp.path()).is_err());
        Ok(())
    }
}
