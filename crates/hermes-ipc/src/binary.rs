use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Binary {
    Zend,
    Zenc,
}

impl Binary {
    pub const ALL: [Binary; 2] = [Binary::Zend, Binary::Zenc];

    pub fn name(self) -> &'static str {
        match self {
            Self::Zend => "zend",
            Self::Zenc => "zenc",
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved executable locations for both engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPaths {
    zend: PathBuf,
    zenc: PathBuf,
}

impl BinaryPaths {
    pub fn from_bin_dir(bin_dir: impl AsRef<Path>) -> Self {
        let bin_dir = bin_dir.as_ref();
        Self {
            zend: bin_dir.join(Binary::Zend.name()),
            zenc: bin_dir.join(Binary::Zenc.name()),
        }
    }

    pub fn with_override(mut self, binary: Binary, path: impl Into<PathBuf>) -> Self {
        match binary {
            Binary::Zend => self.zend = path.into(),
            Binary::Zenc => self.zenc = path.into(),
        }
        self
    }

    pub fn path(&self, binary: Binary) -> &Path {
        match binary {
            Binary::Zend => self.zend.as_path(),
            Binary::Zenc => self.zenc.as_path(),
        }
    }

    /// `bin/` next to the running executable, or `./bin` when the executable
    /// location cannot be determined.
    pub fn default_bin_dir() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|parent| parent.join("bin")))
            .unwrap_or_else(|| PathBuf::from("bin"))
    }
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self::from_bin_dir(Self::default_bin_dir())
    }
}
