use std::path::PathBuf;

use strum::IntoEnumIterator;
use strum_macros::EnumIter;

const SUBDIR: &str = "thumbcache";

#[derive(Debug, EnumIter)]
pub enum Dirs {
    Cache,
    Config,
}

impl Dirs {
    pub fn path(&self) -> PathBuf {
        let base = match *self {
            Dirs::Cache => dirs::cache_dir(),
            Dirs::Config => dirs::config_dir(),
        };
        base.unwrap_or_else(std::env::temp_dir).join(SUBDIR)
    }
}

impl Dirs {
    pub fn initialize_dirs() -> std::io::Result<()> {
        for dir in Dirs::iter() {
            let path = dir.path();
            if !path.exists() {
                std::fs::create_dir_all(path)?;
            }
        }
        Ok(())
    }
}
