//! `globsync init [--force]`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use globsync_core::config::CONFIG_FILE;

const STARTER_CONFIG: &str = r#"# Files to copy, relative to `dir`. Prefix a glob with `!` to exclude.
patterns:
  - "assets/**"
# Where copies go (default ./dist) and where they come from (default: here).
dest: ./dist
# dir: ./src
# true empties `dest` first, false leaves it alone, a glob list removes matches only.
clean: true
# false, true (module "manifest"), a module name, or { module, file }.
manifest: false
# silly | verbose | info | warn | error | silent
loglevel: info
"#;

/// Write a starter configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Where to write the file.
    #[arg(long, default_value = CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        if self.path.exists() && !self.force {
            bail!(
                "{} already exists; pass --force to overwrite",
                self.path.display()
            );
        }

        std::fs::write(&self.path, STARTER_CONFIG)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        println!("✓ Wrote {}", self.path.display());
        Ok(())
    }
}
