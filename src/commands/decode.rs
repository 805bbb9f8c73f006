use anyhow::{Result, bail};

use crate::naming::{FileRole, NamingScheme};

/// Explain how an encoded library filename will be interpreted.
pub fn describe(naming: &NamingScheme, filename: &str) -> Result<String> {
    match naming.classify(filename) {
        FileRole::AutoLink => {
            let name = naming.decode_auto_link_name(filename)?;
            Ok(format!(
                "auto-link -> <root>/{}",
                name.relative_path().display()
            ))
        }
        FileRole::Archive => {
            let identity = naming.decode_archive_identity(filename)?;
            Ok(format!("archive, identity '{}' -> <root>/{}", identity, identity))
        }
        FileRole::Manifest => Ok("manifest".to_string()),
        FileRole::Other => bail!("{} is not an encoded filename", filename),
    }
}

pub fn decode(naming: &NamingScheme, filename: &str) -> Result<()> {
    println!("{}: {}", filename, describe(naming, filename)?);
    Ok(())
}
