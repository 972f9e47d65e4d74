//! Extension-based file classification.
//!
//! Every file is sorted into exactly one [`Category`] by its uppercased
//! extension. The table is built once from four fixed extension lists and
//! never changes afterwards; anything it does not know lands in
//! [`Category::Other`].
//!
//! # Examples
//!
//! ```
//! use dirsort::file_category::{Category, ClassificationRegistry, ImageKind};
//!
//! let registry = ClassificationRegistry::default();
//! assert_eq!(registry.classify("photo.png").category(), Category::Image(ImageKind::Png));
//! assert_eq!(registry.classify("notes").category(), Category::Other);
//! ```

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

pub const IMAGE_EXTENSIONS: [&str; 4] = ["JPEG", "JPG", "PNG", "SVG"];
pub const MEDIA_EXTENSIONS: [&str; 5] = ["MP3", "AVI", "MP4", "MOV", "MKV"];
pub const DOCUMENT_EXTENSIONS: [&str; 6] = ["DOC", "DOCX", "TXT", "PDF", "XLSX", "PPTX"];
pub const ARCHIVE_EXTENSIONS: [&str; 3] = ["ZIP", "GZ", "TAR"];

/// Top-level folders of the category tree under the output root.
pub const CATEGORY_ROOT_DIRS: [&str; 5] =
    ["images", "audio", "documents", "ARCHIVES", "MY_OTHER"];

/// Image sub-types that get their own folder under `images/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ImageKind {
    Jpeg,
    Jpg,
    Png,
    Svg,
}

impl ImageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "JPEG",
            ImageKind::Jpg => "JPG",
            ImageKind::Png => "PNG",
            ImageKind::Svg => "SVG",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "JPEG" => Some(ImageKind::Jpeg),
            "JPG" => Some(ImageKind::Jpg),
            "PNG" => Some(ImageKind::Png),
            "SVG" => Some(ImageKind::Svg),
            _ => None,
        }
    }
}

/// Audio sub-types with a dedicated folder under `audio/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AudioKind {
    Mp3,
}

impl AudioKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioKind::Mp3 => "MP3",
        }
    }
}

/// The closed set of destination classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Image(ImageKind),
    Audio(AudioKind),
    Document,
    Archive,
    Other,
}

impl Category {
    /// Returns the folder, relative to the output root, that files of this
    /// category are placed in.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::file_category::{AudioKind, Category, ImageKind};
    /// use std::path::PathBuf;
    ///
    /// assert_eq!(Category::Image(ImageKind::Png).dir_path(), PathBuf::from("images/PNG"));
    /// assert_eq!(Category::Audio(AudioKind::Mp3).dir_path(), PathBuf::from("audio/MP3"));
    /// assert_eq!(Category::Other.dir_path(), PathBuf::from("MY_OTHER"));
    /// ```
    pub fn dir_path(&self) -> std::path::PathBuf {
        match self {
            Category::Image(kind) => Path::new("images").join(kind.as_str()),
            Category::Audio(kind) => Path::new("audio").join(kind.as_str()),
            Category::Document => "documents".into(),
            Category::Archive => "ARCHIVES".into(),
            Category::Other => "MY_OTHER".into(),
        }
    }

    /// Short label used in summaries, e.g. `images/PNG`.
    pub fn label(&self) -> String {
        match self {
            Category::Image(kind) => format!("images/{}", kind.as_str()),
            Category::Audio(kind) => format!("audio/{}", kind.as_str()),
            Category::Document => "documents".to_string(),
            Category::Archive => "ARCHIVES".to_string(),
            Category::Other => "MY_OTHER".to_string(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Outcome of looking a filename up in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The name has no extension at all; never consults the table.
    NoExtension,
    /// The extension is registered.
    Known { extension: String, category: Category },
    /// The extension was looked up and not found.
    Unknown { extension: String },
}

impl Lookup {
    pub fn category(&self) -> Category {
        match self {
            Lookup::Known { category, .. } => *category,
            Lookup::NoExtension | Lookup::Unknown { .. } => Category::Other,
        }
    }

    /// The uppercased extension, empty when there is none.
    pub fn extension(&self) -> &str {
        match self {
            Lookup::NoExtension => "",
            Lookup::Known { extension, .. } | Lookup::Unknown { extension } => extension,
        }
    }
}

/// Returns the uppercased extension of a filename without its dot.
///
/// Dotfiles such as `.bashrc` and names ending in a dot have no extension.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_uppercase())
        .unwrap_or_default()
}

/// Immutable extension → category table.
#[derive(Debug, Clone)]
pub struct ClassificationRegistry {
    extension_map: HashMap<String, Category>,
}

impl ClassificationRegistry {
    /// Builds the registry from the four fixed extension lists.
    ///
    /// Images get their own sub-type, MP3 is the only audio format with a
    /// folder of its own, and the remaining media formats fall into
    /// [`Category::Other`] while still counting as known.
    pub fn new() -> Self {
        let mut extension_map = HashMap::new();
        for ext in IMAGE_EXTENSIONS {
            if let Some(kind) = ImageKind::from_extension(ext) {
                extension_map.insert(ext.to_string(), Category::Image(kind));
            }
        }
        for ext in MEDIA_EXTENSIONS {
            let category = match ext {
                "MP3" => Category::Audio(AudioKind::Mp3),
                _ => Category::Other,
            };
            extension_map.insert(ext.to_string(), category);
        }
        for ext in DOCUMENT_EXTENSIONS {
            extension_map.insert(ext.to_string(), Category::Document);
        }
        for ext in ARCHIVE_EXTENSIONS {
            extension_map.insert(ext.to_string(), Category::Archive);
        }
        Self { extension_map }
    }

    /// Looks up an extension, case-insensitively.
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        self.extension_map.get(&ext.to_uppercase()).copied()
    }

    /// Classifies a filename by its extension.
    pub fn classify(&self, file_name: &str) -> Lookup {
        let extension = extension_of(file_name);
        if extension.is_empty() {
            return Lookup::NoExtension;
        }
        match self.extension_to_category(&extension) {
            Some(category) => Lookup::Known {
                extension,
                category,
            },
            None => Lookup::Unknown { extension },
        }
    }
}

impl Default for ClassificationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
