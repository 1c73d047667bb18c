use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::evaluation::Technique;

/// One folder's original image and its anonymized variants
#[derive(Debug, Clone, PartialEq)]
pub struct VariantSet {
    pub name: String,
    pub folder: PathBuf,
    pub original: PathBuf,
    pub variants: BTreeMap<Technique, PathBuf>,
}

/// Folders to evaluate under `root`.
///
/// With no `names`, every immediate subdirectory is returned. Named folders
/// that do not exist come back as errors so the caller can report and skip
/// them.
pub fn discover_folders(root: &Path, names: &[String]) -> Result<Vec<Result<PathBuf, ScanError>>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::FolderNotFound(root.to_path_buf()));
    }

    if !names.is_empty() {
        return Ok(names
            .iter()
            .map(|name| {
                let folder = root.join(name);
                if folder.is_dir() {
                    Ok(folder)
                } else {
                    Err(ScanError::FolderNotFound(folder))
                }
            })
            .collect());
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| ScanError::Io(e.into()))?;
        if entry.file_type().is_dir() {
            folders.push(entry.into_path());
        }
    }

    folders.sort();
    Ok(folders.into_iter().map(Ok).collect())
}

/// Image files directly inside `directory`, sorted by path
pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, ScanError> {
    let mut images = Vec::new();

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    images.push(path.to_path_buf());
                }
            }
        }
    }

    images.sort();

    Ok(images)
}

/// Assign the images of `folder` to the original and technique roles by
/// filename keyword. The first image (in path order) containing a keyword
/// takes the role.
pub fn find_variant_set(folder: &Path, config: &ScannerConfig) -> Result<VariantSet, ScanError> {
    if !folder.is_dir() {
        return Err(ScanError::FolderNotFound(folder.to_path_buf()));
    }

    let images = discover_images(folder, &config.image_extensions)?;
    let find = |keyword: &str| -> Option<PathBuf> {
        let keyword = keyword.to_lowercase();
        images
            .iter()
            .find(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().to_lowercase().contains(&keyword))
                    .unwrap_or(false)
            })
            .cloned()
    };

    let mut missing = Vec::new();

    let original = find(&config.original_keyword);
    if original.is_none() {
        missing.push(config.original_keyword.clone());
    }

    let mut variants = BTreeMap::new();
    for technique in Technique::ALL {
        let keyword = config.keyword(technique);
        match find(keyword) {
            Some(path) => {
                variants.insert(technique, path);
            }
            None => missing.push(keyword.to_string()),
        }
    }

    match original {
        Some(original) if missing.is_empty() => Ok(VariantSet {
            name: folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| folder.display().to_string()),
            folder: folder.to_path_buf(),
            original,
            variants,
        }),
        _ => Err(ScanError::MissingImages {
            folder: folder.to_path_buf(),
            missing,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            File::create(dir.join(name)).unwrap();
        }
    }

    #[test]
    fn test_discover_images() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["photo1.jpg", "photo2.PNG", "document.txt"]);

        fs::create_dir(dir.path().join("subdir")).unwrap();
        File::create(dir.path().join("subdir/photo3.jpeg")).unwrap();

        let extensions = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
        let images = discover_images(dir.path(), &extensions).unwrap();

        // Subdirectories are not searched
        assert_eq!(images.len(), 2);
    }

    #[test]
    fn test_find_variant_set() {
        let dir = tempdir().unwrap();
        touch(
            dir.path(),
            &["Elon_Original.jpg", "elon_pixel.png", "elon_black.png", "elon_blurred.png", "notes.txt"],
        );

        let set = find_variant_set(dir.path(), &ScannerConfig::default()).unwrap();

        assert_eq!(set.original.file_name().unwrap(), "Elon_Original.jpg");
        assert_eq!(set.variants[&Technique::Pixelation].file_name().unwrap(), "elon_pixel.png");
        assert_eq!(set.variants[&Technique::Occlusion].file_name().unwrap(), "elon_black.png");
        assert_eq!(set.variants[&Technique::Blur].file_name().unwrap(), "elon_blurred.png");
    }

    #[test]
    fn test_missing_variant_is_reported() {
        let dir = tempdir().unwrap();
        touch(dir.path(), &["original.png", "pixel.png", "blur.png"]);

        let err = find_variant_set(dir.path(), &ScannerConfig::default()).unwrap_err();

        match err {
            ScanError::MissingImages { missing, .. } => {
                // "blur.png" does not contain the "blurr" keyword
                assert_eq!(missing, vec!["black".to_string(), "blurr".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_discover_all_folders() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("multiple")).unwrap();
        fs::create_dir(dir.path().join("elon")).unwrap();
        touch(dir.path(), &["stray.png"]);

        let folders: Vec<PathBuf> = discover_folders(dir.path(), &[])
            .unwrap()
            .into_iter()
            .map(|f| f.unwrap())
            .collect();

        assert_eq!(folders, vec![dir.path().join("elon"), dir.path().join("multiple")]);
    }

    #[test]
    fn test_discover_named_folders() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("male")).unwrap();

        let names = vec!["male".to_string(), "missing".to_string()];
        let folders = discover_folders(dir.path(), &names).unwrap();

        assert!(folders[0].is_ok());
        assert!(matches!(folders[1], Err(ScanError::FolderNotFound(_))));
    }

    #[test]
    fn test_missing_root() {
        let dir = tempdir().unwrap();
        let result = discover_folders(&dir.path().join("nope"), &[]);
        assert!(matches!(result, Err(ScanError::FolderNotFound(_))));
    }
}
